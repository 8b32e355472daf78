use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::models::{
    Asset, ControllerTask, CustomerConfig, Entity, FtpInfo, ManualCounting, Page, Paged, Project,
    TaskStatus, VideocheckConfig,
};

/// Custom error type for backend operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RepoError {
    /// The backend could not be reached or the session could not be opened
    #[error("Connection error: {0}")]
    Connection(String),

    /// The operation did not complete within the configured budget
    #[error("Timeout error after {0:?}")]
    Timeout(Duration),

    /// The backend rejected or failed the query
    #[error("Query error: {0}")]
    Query(String),

    /// A row or payload could not be mapped onto the domain type
    #[error("Decode error: {0}")]
    Decode(String),

    /// Remote HTTP API answered with a non-success status
    #[error("Remote returned status {status}: {body}")]
    Status {
        /// Status code returned by the remote side
        status: u16,
        /// Response body, kept for diagnostics
        body: String,
    },

    /// No live handle is installed for the backend yet
    #[error("Backend is not connected")]
    NotConnected,
}

impl From<tiberius::error::Error> for RepoError {
    fn from(err: tiberius::error::Error) -> Self {
        match err {
            tiberius::error::Error::Io { .. } | tiberius::error::Error::Routing { .. } => {
                RepoError::Connection(err.to_string())
            }
            tiberius::error::Error::Conversion(_) => RepoError::Decode(err.to_string()),
            _ => RepoError::Query(err.to_string()),
        }
    }
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolClosed => {
                RepoError::Connection(err.to_string())
            }
            sqlx::Error::PoolTimedOut => RepoError::Connection("pool timed out".to_string()),
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                RepoError::Decode(err.to_string())
            }
            _ => RepoError::Query(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for RepoError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RepoError::Decode(err.to_string())
        } else if err.is_connect() || err.is_timeout() || err.is_builder() {
            RepoError::Connection(err.to_string())
        } else {
            RepoError::Query(err.to_string())
        }
    }
}

/// Result type alias for backend operations
pub type RepoResult<T> = Result<T, RepoError>;

/// Cheapest round-trip proving a backend is reachable.
///
/// Implementations must bound the call by their configured timeout, must not
/// mutate remote state, and report failures through the error value only.
#[async_trait]
pub trait Health: Send + Sync {
    async fn health(&self) -> RepoResult<()>;
}

/// Asset store (XML-column SQL Server database).
#[async_trait]
pub trait AssetRepo: Health {
    async fn find_all(&self, page: Page) -> RepoResult<Paged<Asset>>;

    /// Look up an asset by its public id. `Ok(None)` when nothing matches.
    async fn find_by_id(&self, id: i64) -> RepoResult<Option<Asset>>;
}

/// Business-configuration store: customers, projects and videocheck setup.
#[async_trait]
pub trait CustomerRepo: Health {
    async fn find_customer_configs(
        &self,
        page: Page,
        enabled: bool,
    ) -> RepoResult<Paged<CustomerConfig>>;

    async fn find_customer_config(&self, id: i64) -> RepoResult<Option<CustomerConfig>>;

    async fn find_projects(&self, page: Page, enabled: bool) -> RepoResult<Paged<Project>>;

    /// Look up a project, optionally narrowed to one database kind.
    async fn find_project(&self, id: i64, db_type: Option<i32>) -> RepoResult<Option<Project>>;

    async fn find_ftp(&self, project_id: i64) -> RepoResult<Option<FtpInfo>>;

    async fn find_manual_countings(
        &self,
        project_id: i64,
        controller_id: i64,
        page: Page,
    ) -> RepoResult<Paged<ManualCounting>>;

    async fn find_videocheck_configs(&self, page: Page) -> RepoResult<Paged<VideocheckConfig>>;

    async fn find_videocheck_config(&self, project_id: i64)
    -> RepoResult<Option<VideocheckConfig>>;

    async fn store_videocheck_config(&self, config: &VideocheckConfig) -> RepoResult<()>;

    async fn upsert_videocheck_config(&self, config: &VideocheckConfig) -> RepoResult<()>;

    /// Returns the number of deleted rows.
    async fn delete_videocheck_config(&self, project_id: i64) -> RepoResult<u64>;
}

/// Remote ticketing (service desk) API.
#[async_trait]
pub trait ServiceDeskRepo: Health {
    async fn find_tasks_by_serial(
        &self,
        serial: &str,
        page: Page,
    ) -> RepoResult<Paged<ControllerTask>>;

    async fn add_comment(&self, task_id: &str, comment: &str) -> RepoResult<()>;

    async fn set_status(&self, task_id: &str, status: &TaskStatus) -> RepoResult<()>;
}

/// Reference data store.
#[async_trait]
pub trait ReferenceRepo: Health {
    async fn find_entities(&self, page: Page) -> RepoResult<Paged<Entity>>;

    async fn find_entity(&self, id: &str) -> RepoResult<Option<Entity>>;
}
