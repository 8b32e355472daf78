//! Reference data store. The same `entities` catalogue lives either in SQL
//! Server or in PostgreSQL; the DSN prefix decides which dialect is used.
use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use sqlx::{PgPool, Row as _, postgres::PgPoolOptions};
use tiberius::Row;

use crate::{
    adapters::mssql::{self, MssqlPool, col_string, with_timeout},
    core::{
        backend::BackendDescriptor,
        models::{Entity, Page, Paged},
    },
    ports::{
        connector::Connector,
        repository::{Health, ReferenceRepo, RepoResult},
    },
};

const POSTGRES_PREFIX: &str = "postgres://";

const MSSQL_ENTITIES_SQL: &str = "SELECT [id], [description] FROM [dbo].[entities] \
    ORDER BY [id] OFFSET @P1 ROWS FETCH NEXT @P2 ROWS ONLY; \
    SELECT count(*) FROM [dbo].[entities]";
const MSSQL_ENTITY_SQL: &str = "SELECT [id], [description] FROM [dbo].[entities] WHERE [id] = @P1";

const PG_PING_SQL: &str = "SELECT version()";
const PG_ENTITIES_SQL: &str = "SELECT entity_id, description FROM entities LIMIT $1 OFFSET $2";
const PG_COUNT_SQL: &str = "SELECT count(*) FROM entities";
const PG_ENTITY_SQL: &str = "SELECT entity_id, description FROM entities WHERE entity_id = $1";

pub fn is_postgres_dsn(dsn: &str) -> bool {
    dsn.contains(POSTGRES_PREFIX)
}

fn entity_from_mssql(row: &Row) -> RepoResult<Entity> {
    // `id` may be numeric in older catalogues.
    let id = match col_string(row, 0) {
        Ok(id) => id,
        Err(_) => mssql::col_i64(row, 0)?.to_string(),
    };
    Ok(Entity {
        id,
        description: col_string(row, 1)?,
    })
}

/// Reference store on SQL Server.
pub struct ReferenceSqlRepo {
    pool: MssqlPool,
    timeout: Duration,
}

impl ReferenceSqlRepo {
    pub async fn connect(dsn: &str, timeout: Duration) -> RepoResult<Self> {
        let pool = mssql::connect_pool(dsn, timeout).await?;
        Ok(Self { pool, timeout })
    }
}

#[async_trait]
impl Health for ReferenceSqlRepo {
    async fn health(&self) -> RepoResult<()> {
        mssql::ping(&self.pool, self.timeout).await
    }
}

#[async_trait]
impl ReferenceRepo for ReferenceSqlRepo {
    async fn find_entities(&self, page: Page) -> RepoResult<Paged<Entity>> {
        with_timeout(self.timeout, async {
            let mut conn = self.pool.get().await?;
            let results = conn
                .query(MSSQL_ENTITIES_SQL, &[&page.offset, &page.limit])
                .await?
                .into_results()
                .await?;
            let items = match results.first() {
                Some(rows) => rows
                    .iter()
                    .map(entity_from_mssql)
                    .collect::<RepoResult<Vec<_>>>()?,
                None => Vec::new(),
            };
            Ok(Paged::new(items, mssql::trailing_count(&results)?))
        })
        .await
    }

    async fn find_entity(&self, id: &str) -> RepoResult<Option<Entity>> {
        with_timeout(self.timeout, async {
            let mut conn = self.pool.get().await?;
            let row = conn
                .query(MSSQL_ENTITY_SQL, &[&id])
                .await?
                .into_row()
                .await?;
            row.as_ref().map(entity_from_mssql).transpose()
        })
        .await
    }
}

/// Reference store on PostgreSQL.
pub struct ReferencePgRepo {
    pool: PgPool,
    timeout: Duration,
}

impl ReferencePgRepo {
    pub async fn connect(dsn: &str, timeout: Duration) -> RepoResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(mssql::MAX_CONNECTIONS)
            .acquire_timeout(timeout)
            .connect(dsn)
            .await?;
        let repo = Self { pool, timeout };
        repo.health().await?;
        Ok(repo)
    }
}

fn entity_from_pg(row: &sqlx::postgres::PgRow) -> RepoResult<Entity> {
    Ok(Entity {
        id: row.try_get("entity_id")?,
        description: row
            .try_get::<Option<String>, _>("description")?
            .unwrap_or_default(),
    })
}

#[async_trait]
impl Health for ReferencePgRepo {
    async fn health(&self) -> RepoResult<()> {
        with_timeout(self.timeout, async {
            sqlx::query_scalar::<_, String>(PG_PING_SQL)
                .fetch_one(&self.pool)
                .await?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl ReferenceRepo for ReferencePgRepo {
    async fn find_entities(&self, page: Page) -> RepoResult<Paged<Entity>> {
        with_timeout(self.timeout, async {
            let rows = sqlx::query(PG_ENTITIES_SQL)
                .bind(page.limit)
                .bind(page.offset)
                .fetch_all(&self.pool)
                .await?;
            let total: i64 = sqlx::query_scalar(PG_COUNT_SQL)
                .fetch_one(&self.pool)
                .await?;
            let items = rows
                .iter()
                .map(entity_from_pg)
                .collect::<RepoResult<Vec<_>>>()?;
            Ok(Paged::new(items, total))
        })
        .await
    }

    async fn find_entity(&self, id: &str) -> RepoResult<Option<Entity>> {
        with_timeout(self.timeout, async {
            let row = sqlx::query(PG_ENTITY_SQL)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
            row.as_ref().map(entity_from_pg).transpose()
        })
        .await
    }
}

/// Picks the dialect from the DSN on every connect.
pub struct ReferenceConnector {
    descriptor: BackendDescriptor,
}

impl ReferenceConnector {
    pub fn new(descriptor: BackendDescriptor) -> Self {
        Self { descriptor }
    }
}

#[async_trait]
impl Connector for ReferenceConnector {
    type Capability = dyn ReferenceRepo;

    fn descriptor(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    async fn connect(&self, timeout: Duration) -> RepoResult<Arc<dyn ReferenceRepo>> {
        let dsn = &self.descriptor.target;
        if is_postgres_dsn(dsn) {
            Ok(Arc::new(ReferencePgRepo::connect(dsn, timeout).await?))
        } else {
            Ok(Arc::new(ReferenceSqlRepo::connect(dsn, timeout).await?))
        }
    }
}
