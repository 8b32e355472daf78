//! CM_INFO customer store. Table and column names follow the assumed
//! `[dbo]` layout below; verify them against the target database.
use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tiberius::Row;

use crate::{
    adapters::mssql::{
        self, MssqlPool, col_bool, col_datetime, col_f64, col_i32, col_i64, col_string,
        col_timestamp_text, with_timeout,
    },
    core::{
        backend::BackendDescriptor,
        models::{
            CustomerConfig, FtpInfo, FtpServer, ManualCounting, Page, Paged, Project,
            VideocheckConfig,
        },
    },
    ports::{
        connector::Connector,
        repository::{CustomerRepo, Health, RepoResult},
    },
};

const CUSTOMER_COLUMNS: &str = "c.customer_id, c.customer_name, c.customer_type_id, \
    c.sd_service_id, c.sd_creator_id, c.sd_destination";

const PROJECT_COLUMNS: &str = "p.project_id, p.name, p.type_id, t.type_name, p.parent_id, \
    p.manager_id, ISNULL(m.full_name, ''), p.is_enabled, d.ip, d.port, d.db_name, d.login, \
    d.password, d.db_type";

const PROJECT_FROM: &str = "FROM [dbo].[projects] p \
    JOIN [dbo].[project_types] t ON t.type_id = p.type_id \
    JOIN [dbo].[project_databases] d ON d.project_id = p.project_id \
    LEFT JOIN [dbo].[managers] m ON m.manager_id = p.manager_id";

const FTP_SQL: &str = "SELECT main_server, main_user, main_password, main_root, \
        device_server, device_user, device_password, device_root, \
        proxy_server, proxy_user, proxy_password, proxy_root, \
        local_path, comment, verified, who_verified, when_verified \
    FROM [dbo].[project_ftp] WHERE project_id = @P1";

const MANUAL_COUNTINGS_SQL: &str = "SELECT chk_sum_in, f_sum_in, sigma_sum_in, \
        chk_sum_out, f_sum_out, sigma_sum_out, chk_time_start, chk_time_end, message, sernomer \
    FROM [dbo].[manual_countings] \
    WHERE project_id = @P1 AND controller_id = @P2 \
    ORDER BY chk_time_start DESC OFFSET @P3 ROWS FETCH NEXT @P4 ROWS ONLY; \
    SELECT count(*) FROM [dbo].[manual_countings] WHERE project_id = @P1 AND controller_id = @P2";

const VIDEOCHECK_COLUMNS: &str = "project_id, local_server, local_cam, local_ftp, options";

const VIDEOCHECK_INSERT_SQL: &str = "INSERT INTO [dbo].[videocheck_config] \
    (project_id, local_server, local_cam, local_ftp, options) VALUES (@P1, @P2, @P3, @P4, @P5)";

const VIDEOCHECK_MERGE_SQL: &str = "MERGE [dbo].[videocheck_config] AS target \
    USING (SELECT @P1 AS project_id, @P2 AS local_server, @P3 AS local_cam, @P4 AS local_ftp, \
        @P5 AS options) AS source \
    ON target.project_id = source.project_id \
    WHEN MATCHED THEN UPDATE SET local_server = source.local_server, \
        local_cam = source.local_cam, local_ftp = source.local_ftp, options = source.options \
    WHEN NOT MATCHED THEN INSERT (project_id, local_server, local_cam, local_ftp, options) \
        VALUES (source.project_id, source.local_server, source.local_cam, source.local_ftp, \
        source.options);";

const VIDEOCHECK_DELETE_SQL: &str = "DELETE FROM [dbo].[videocheck_config] WHERE project_id = @P1";

fn customer_configs_sql() -> String {
    format!(
        "SELECT {CUSTOMER_COLUMNS} FROM [dbo].[customer_configs] c \
         WHERE c.is_enabled = @P3 ORDER BY c.customer_id \
         OFFSET @P1 ROWS FETCH NEXT @P2 ROWS ONLY; \
         SELECT count(*) FROM [dbo].[customer_configs] c WHERE c.is_enabled = @P3"
    )
}

fn customer_config_sql() -> String {
    format!("SELECT {CUSTOMER_COLUMNS} FROM [dbo].[customer_configs] c WHERE c.customer_id = @P1")
}

fn projects_sql() -> String {
    format!(
        "SELECT {PROJECT_COLUMNS} {PROJECT_FROM} WHERE p.is_enabled = @P3 \
         ORDER BY p.project_id, d.db_type OFFSET @P1 ROWS FETCH NEXT @P2 ROWS ONLY; \
         SELECT count(*) {PROJECT_FROM} WHERE p.is_enabled = @P3"
    )
}

/// Without a database kind the lowest configured one is returned.
fn project_sql(with_db_type: bool) -> String {
    let filter = if with_db_type {
        " AND d.db_type = @P2"
    } else {
        ""
    };
    format!(
        "SELECT TOP 1 {PROJECT_COLUMNS} {PROJECT_FROM} WHERE p.project_id = @P1{filter} \
         ORDER BY d.db_type"
    )
}

fn videochecks_sql() -> String {
    format!(
        "SELECT {VIDEOCHECK_COLUMNS} FROM [dbo].[videocheck_config] ORDER BY project_id \
         OFFSET @P1 ROWS FETCH NEXT @P2 ROWS ONLY; \
         SELECT count(*) FROM [dbo].[videocheck_config]"
    )
}

fn videocheck_sql() -> String {
    format!("SELECT {VIDEOCHECK_COLUMNS} FROM [dbo].[videocheck_config] WHERE project_id = @P1")
}

fn customer_from_row(row: &Row) -> RepoResult<CustomerConfig> {
    Ok(CustomerConfig {
        customer_id: col_i64(row, 0)?,
        customer_name: col_string(row, 1)?,
        customer_type_id: col_i64(row, 2)?,
        sd_service_id: col_i64(row, 3)?,
        sd_creator_id: col_i64(row, 4)?,
        sd_destination: col_string(row, 5)?,
    })
}

fn project_from_row(row: &Row) -> RepoResult<Project> {
    Ok(Project {
        id: col_i64(row, 0)?,
        name: col_string(row, 1)?,
        type_id: col_i64(row, 2)?,
        type_name: col_string(row, 3)?,
        parent_id: col_i64(row, 4)?,
        manager_id: col_i64(row, 5)?,
        manager_name: col_string(row, 6)?,
        is_enabled: col_bool(row, 7)?,
        ip: col_string(row, 8)?,
        port: col_i32(row, 9)?,
        db_name: col_string(row, 10)?,
        login: col_string(row, 11)?,
        password: col_string(row, 12)?,
        db_type: col_i32(row, 13)?,
    })
}

fn ftp_server(row: &Row, first: usize) -> RepoResult<FtpServer> {
    Ok(FtpServer {
        server: col_string(row, first)?,
        user: col_string(row, first + 1)?,
        password: col_string(row, first + 2)?,
        root: col_string(row, first + 3)?,
    })
}

fn ftp_from_row(row: &Row) -> RepoResult<FtpInfo> {
    Ok(FtpInfo {
        main_ftp: ftp_server(row, 0)?,
        device_ftp: ftp_server(row, 4)?,
        proxy_ftp: ftp_server(row, 8)?,
        local_path_ftp: col_string(row, 12)?,
        comment: col_string(row, 13)?,
        verified: col_string(row, 14)?,
        who_verified: col_string(row, 15)?,
        when_verified: col_timestamp_text(row, 16)?,
    })
}

fn manual_counting_from_row(row: &Row) -> RepoResult<ManualCounting> {
    Ok(ManualCounting {
        chk_sum_in: col_i32(row, 0)?,
        f_sum_in: col_i32(row, 1)?,
        sigma_sum_in: col_f64(row, 2)?,
        chk_sum_out: col_i32(row, 3)?,
        f_sum_out: col_i32(row, 4)?,
        sigma_sum_out: col_f64(row, 5)?,
        chk_time_start: col_datetime(row, 6)?,
        chk_time_end: col_datetime(row, 7)?,
        message: col_string(row, 8)?,
        sernomer: col_string(row, 9)?,
    })
}

fn videocheck_from_row(row: &Row) -> RepoResult<VideocheckConfig> {
    Ok(VideocheckConfig {
        project_id: col_i64(row, 0)?,
        local_server: col_bool(row, 1)?,
        local_cam: col_bool(row, 2)?,
        local_ftp: col_bool(row, 3)?,
        options: col_string(row, 4)?,
    })
}

fn first_set<T>(
    results: &[Vec<Row>],
    map: impl Fn(&Row) -> RepoResult<T>,
) -> RepoResult<Vec<T>> {
    match results.first() {
        Some(rows) => rows.iter().map(map).collect(),
        None => Ok(Vec::new()),
    }
}

/// Business-configuration store (CM_INFO) over SQL Server.
pub struct CustomerSqlRepo {
    pool: MssqlPool,
    timeout: Duration,
}

impl CustomerSqlRepo {
    pub async fn connect(dsn: &str, timeout: Duration) -> RepoResult<Self> {
        let pool = mssql::connect_pool(dsn, timeout).await?;
        Ok(Self { pool, timeout })
    }

    async fn write_videocheck(&self, sql: &'static str, config: &VideocheckConfig) -> RepoResult<()> {
        with_timeout(self.timeout, async {
            let mut conn = self.pool.get().await?;
            conn.execute(
                sql,
                &[
                    &config.project_id,
                    &config.local_server,
                    &config.local_cam,
                    &config.local_ftp,
                    &config.options.as_str(),
                ],
            )
            .await?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl Health for CustomerSqlRepo {
    async fn health(&self) -> RepoResult<()> {
        mssql::ping(&self.pool, self.timeout).await
    }
}

#[async_trait]
impl CustomerRepo for CustomerSqlRepo {
    async fn find_customer_configs(
        &self,
        page: Page,
        enabled: bool,
    ) -> RepoResult<Paged<CustomerConfig>> {
        with_timeout(self.timeout, async {
            let mut conn = self.pool.get().await?;
            let results = conn
                .query(customer_configs_sql(), &[&page.offset, &page.limit, &enabled])
                .await?
                .into_results()
                .await?;
            let items = first_set(&results, customer_from_row)?;
            Ok(Paged::new(items, mssql::trailing_count(&results)?))
        })
        .await
    }

    async fn find_customer_config(&self, id: i64) -> RepoResult<Option<CustomerConfig>> {
        with_timeout(self.timeout, async {
            let mut conn = self.pool.get().await?;
            let row = conn
                .query(customer_config_sql(), &[&id])
                .await?
                .into_row()
                .await?;
            row.as_ref().map(customer_from_row).transpose()
        })
        .await
    }

    async fn find_projects(&self, page: Page, enabled: bool) -> RepoResult<Paged<Project>> {
        with_timeout(self.timeout, async {
            let mut conn = self.pool.get().await?;
            let results = conn
                .query(projects_sql(), &[&page.offset, &page.limit, &enabled])
                .await?
                .into_results()
                .await?;
            let items = first_set(&results, project_from_row)?;
            Ok(Paged::new(items, mssql::trailing_count(&results)?))
        })
        .await
    }

    async fn find_project(&self, id: i64, db_type: Option<i32>) -> RepoResult<Option<Project>> {
        with_timeout(self.timeout, async {
            let mut conn = self.pool.get().await?;
            let stream = match db_type {
                Some(db_type) => conn.query(project_sql(true), &[&id, &db_type]).await?,
                None => conn.query(project_sql(false), &[&id]).await?,
            };
            let row = stream.into_row().await?;
            row.as_ref().map(project_from_row).transpose()
        })
        .await
    }

    async fn find_ftp(&self, project_id: i64) -> RepoResult<Option<FtpInfo>> {
        with_timeout(self.timeout, async {
            let mut conn = self.pool.get().await?;
            let row = conn
                .query(FTP_SQL, &[&project_id])
                .await?
                .into_row()
                .await?;
            row.as_ref().map(ftp_from_row).transpose()
        })
        .await
    }

    async fn find_manual_countings(
        &self,
        project_id: i64,
        controller_id: i64,
        page: Page,
    ) -> RepoResult<Paged<ManualCounting>> {
        with_timeout(self.timeout, async {
            let mut conn = self.pool.get().await?;
            let results = conn
                .query(
                    MANUAL_COUNTINGS_SQL,
                    &[&project_id, &controller_id, &page.offset, &page.limit],
                )
                .await?
                .into_results()
                .await?;
            let items = first_set(&results, manual_counting_from_row)?;
            Ok(Paged::new(items, mssql::trailing_count(&results)?))
        })
        .await
    }

    async fn find_videocheck_configs(&self, page: Page) -> RepoResult<Paged<VideocheckConfig>> {
        with_timeout(self.timeout, async {
            let mut conn = self.pool.get().await?;
            let results = conn
                .query(videochecks_sql(), &[&page.offset, &page.limit])
                .await?
                .into_results()
                .await?;
            let items = first_set(&results, videocheck_from_row)?;
            Ok(Paged::new(items, mssql::trailing_count(&results)?))
        })
        .await
    }

    async fn find_videocheck_config(
        &self,
        project_id: i64,
    ) -> RepoResult<Option<VideocheckConfig>> {
        with_timeout(self.timeout, async {
            let mut conn = self.pool.get().await?;
            let row = conn
                .query(videocheck_sql(), &[&project_id])
                .await?
                .into_row()
                .await?;
            row.as_ref().map(videocheck_from_row).transpose()
        })
        .await
    }

    async fn store_videocheck_config(&self, config: &VideocheckConfig) -> RepoResult<()> {
        self.write_videocheck(VIDEOCHECK_INSERT_SQL, config).await
    }

    async fn upsert_videocheck_config(&self, config: &VideocheckConfig) -> RepoResult<()> {
        self.write_videocheck(VIDEOCHECK_MERGE_SQL, config).await
    }

    async fn delete_videocheck_config(&self, project_id: i64) -> RepoResult<u64> {
        with_timeout(self.timeout, async {
            let mut conn = self.pool.get().await?;
            let result = conn.execute(VIDEOCHECK_DELETE_SQL, &[&project_id]).await?;
            Ok(result.total())
        })
        .await
    }
}

pub struct CustomerConnector {
    descriptor: BackendDescriptor,
}

impl CustomerConnector {
    pub fn new(descriptor: BackendDescriptor) -> Self {
        Self { descriptor }
    }
}

#[async_trait]
impl Connector for CustomerConnector {
    type Capability = dyn CustomerRepo;

    fn descriptor(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    async fn connect(&self, timeout: Duration) -> RepoResult<Arc<dyn CustomerRepo>> {
        let repo = CustomerSqlRepo::connect(&self.descriptor.target, timeout).await?;
        Ok(Arc::new(repo))
    }
}
