use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tiberius::Row;

use crate::{
    adapters::mssql::{self, MssqlPool, col_i64, col_string, col_timestamp_text, with_timeout},
    core::{
        backend::BackendDescriptor,
        models::{Asset, Page, Paged},
    },
    ports::{
        connector::Connector,
        repository::{AssetRepo, Health, RepoResult},
    },
};

// The public asset id lives in field 62 of the XML `Data` column.
const FIND_ALL_SQL: &str = "SELECT Data.value('(/data/field[@id=62])[1]', 'int') AS ID, \
        Name, ParentId, Changed, Id AS ServiceDeskID \
    FROM [dbo].[Asset] \
    WHERE Data.value('(/data/field[@id=62])[1]', 'int') IS NOT NULL AND ParentId IS NOT NULL \
    ORDER BY Id OFFSET @P1 ROWS FETCH NEXT @P2 ROWS ONLY; \
    SELECT count(*) FROM [dbo].[Asset] \
    WHERE Data.value('(/data/field[@id=62])[1]', 'int') IS NOT NULL AND ParentId IS NOT NULL";

const FIND_BY_ID_SQL: &str = "SELECT Data.value('(/data/field[@id=62])[1]', 'int') AS ID, \
        Name, ParentId AS ServiceDeskParentID, Changed, Id AS ServiceDeskID \
    FROM [dbo].[Asset] \
    WHERE Data.value('(/data/field[@id=62])[1]', 'int') = @P1";

/// Asset store over the service desk's SQL Server database.
pub struct AssetSqlRepo {
    pool: MssqlPool,
    timeout: Duration,
}

impl AssetSqlRepo {
    pub async fn connect(dsn: &str, timeout: Duration) -> RepoResult<Self> {
        let pool = mssql::connect_pool(dsn, timeout).await?;
        Ok(Self { pool, timeout })
    }
}

fn asset_from_row(row: &Row) -> RepoResult<Asset> {
    Ok(Asset {
        id: col_i64(row, 0)?,
        name: col_string(row, 1)?,
        service_desk_parent_id: col_i64(row, 2)?,
        changed: col_timestamp_text(row, 3)?,
        service_desk_id: col_i64(row, 4)?,
    })
}

#[async_trait]
impl Health for AssetSqlRepo {
    async fn health(&self) -> RepoResult<()> {
        mssql::ping(&self.pool, self.timeout).await
    }
}

#[async_trait]
impl AssetRepo for AssetSqlRepo {
    async fn find_all(&self, page: Page) -> RepoResult<Paged<Asset>> {
        with_timeout(self.timeout, async {
            let mut conn = self.pool.get().await?;
            let results = conn
                .query(FIND_ALL_SQL, &[&page.offset, &page.limit])
                .await?
                .into_results()
                .await?;
            let items = results
                .first()
                .map(|rows| rows.iter().map(asset_from_row).collect::<RepoResult<Vec<_>>>())
                .transpose()?
                .unwrap_or_default();
            let total = mssql::trailing_count(&results)?;
            Ok(Paged::new(items, total))
        })
        .await
    }

    async fn find_by_id(&self, id: i64) -> RepoResult<Option<Asset>> {
        with_timeout(self.timeout, async {
            let mut conn = self.pool.get().await?;
            let row = conn
                .query(FIND_BY_ID_SQL, &[&id])
                .await?
                .into_row()
                .await?;
            row.as_ref().map(asset_from_row).transpose()
        })
        .await
    }
}

/// Builds an [`AssetSqlRepo`] from the asset store descriptor.
pub struct AssetConnector {
    descriptor: BackendDescriptor,
}

impl AssetConnector {
    pub fn new(descriptor: BackendDescriptor) -> Self {
        Self { descriptor }
    }
}

#[async_trait]
impl Connector for AssetConnector {
    type Capability = dyn AssetRepo;

    fn descriptor(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    async fn connect(&self, timeout: Duration) -> RepoResult<Arc<dyn AssetRepo>> {
        let repo = AssetSqlRepo::connect(&self.descriptor.target, timeout).await?;
        Ok(Arc::new(repo))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queries_use_positional_parameters() {
        assert!(FIND_ALL_SQL.contains("OFFSET @P1 ROWS FETCH NEXT @P2 ROWS ONLY"));
        assert!(FIND_ALL_SQL.contains("SELECT count(*)"));
        assert!(FIND_BY_ID_SQL.ends_with("= @P1"));
    }

    #[tokio::test]
    async fn test_connect_to_unreachable_server_fails() {
        let descriptor = BackendDescriptor::new(
            crate::core::backend::Backend::Assets,
            "server=127.0.0.1;port=1;user id=u;password=p;database=IS",
            Duration::from_millis(500),
        );
        let connector = AssetConnector::new(descriptor);
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            connector.connect(Duration::from_millis(500)),
        )
        .await
        .unwrap();
        assert!(result.is_err());
    }
}
