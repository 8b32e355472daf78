//! Business records returned by the backends.
//!
//! Field names serialize in camelCase to keep the public JSON contract stable
//! for existing API consumers (one historical exception: `Project::db_type`).
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Offset/limit window applied to list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: i64,
    pub limit: i64,
}

impl Page {
    pub const DEFAULT_LIMIT: i64 = 10;

    pub fn new(offset: i64, limit: i64) -> Self {
        Self { offset, limit }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

/// One page of rows plus the total number of rows matching the query.
#[derive(Debug, Clone, PartialEq)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total: i64,
}

impl<T> Paged<T> {
    pub fn new(items: Vec<T>, total: i64) -> Self {
        Self { items, total }
    }

    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerConfig {
    pub customer_id: i64,
    pub customer_name: String,
    pub customer_type_id: i64,
    pub sd_service_id: i64,
    pub sd_creator_id: i64,
    pub sd_destination: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub type_id: i64,
    pub type_name: String,
    pub parent_id: i64,
    pub manager_id: i64,
    pub manager_name: String,
    pub is_enabled: bool,
    pub ip: String,
    pub port: i32,
    pub db_name: String,
    pub login: String,
    pub password: String,
    #[serde(rename = "db_type")]
    pub db_type: i32,
}

/// Database kinds a project may be registered with.
pub const PROJECT_DB_TYPES: [i32; 5] = [1, 2, 3, 4, 10];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FtpServer {
    pub server: String,
    pub user: String,
    pub password: String,
    pub root: String,
}

/// FTP endpoints configured for a project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FtpInfo {
    /// Settings for external access, mostly from the operator network.
    pub main_ftp: FtpServer,
    /// Settings used by devices uploading video.
    pub device_ftp: FtpServer,
    /// Settings used by an on-site agent.
    pub proxy_ftp: FtpServer,
    pub local_path_ftp: String,
    pub comment: String,
    pub verified: String,
    pub who_verified: String,
    pub when_verified: String,
}

/// Manual counting record of a controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualCounting {
    #[serde(rename = "chkSumin")]
    pub chk_sum_in: i32,
    #[serde(rename = "fSumIn")]
    pub f_sum_in: i32,
    #[serde(rename = "sigmaSumIn")]
    pub sigma_sum_in: f64,
    #[serde(rename = "chkSumOut")]
    pub chk_sum_out: i32,
    #[serde(rename = "fSumOut")]
    pub f_sum_out: i32,
    #[serde(rename = "sigmaSumOut")]
    pub sigma_sum_out: f64,
    #[serde(rename = "chkTimeStart")]
    pub chk_time_start: DateTime<Utc>,
    #[serde(rename = "chkTimeEnd")]
    pub chk_time_end: DateTime<Utc>,
    pub message: String,
    pub sernomer: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideocheckConfig {
    pub project_id: i64,
    pub local_server: bool,
    pub local_cam: bool,
    pub local_ftp: bool,
    pub options: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: i64,
    pub name: String,
    pub service_desk_parent_id: i64,
    pub changed: String,
    pub service_desk_id: i64,
}

/// A ticketing task serialized back to its original JSON text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerTask {
    pub task: String,
}

/// Status change requested for a ticketing task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskStatus {
    pub comment: String,
    pub is_private_comment: bool,
    pub status_id: i32,
    pub result_field_name: String,
    pub result_field_value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskComment {
    pub comment: String,
}

/// Reference data entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub description: String,
}
