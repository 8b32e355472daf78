use serde::Deserialize;

use crate::{
    adapters::http::response::{ApiError, ApiResult},
    core::models::{PROJECT_DB_TYPES, Page},
};

/// Query string of list endpoints. Values are kept as text so malformed
/// numbers fall back to defaults instead of failing the request.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub offset: Option<String>,
    pub limit: Option<String>,
    pub active: Option<String>,
}

impl ListParams {
    pub fn page(&self) -> Page {
        let offset = self
            .offset
            .as_deref()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|v| *v >= 0)
            .unwrap_or(0);
        let limit = self
            .limit
            .as_deref()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(Page::DEFAULT_LIMIT);
        Page::new(offset, limit)
    }

    /// `active` flag, true unless a recognizable false value is given.
    pub fn active(&self) -> bool {
        self.active.as_deref().and_then(parse_bool).unwrap_or(true)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

pub fn parse_id(raw: &str, what: &str) -> ApiResult<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ApiError::BadRequest(format!("{what} must be an integer, got '{raw}'")))
}

/// Split a project key `<id>[:<dbType>]`. The separator may arrive still
/// percent-encoded.
pub fn parse_project_key(raw: &str) -> ApiResult<(i64, Option<i32>)> {
    let normalized = raw.replace("%3A", ":").replace("%3a", ":");
    let (id, db_type) = match normalized.split_once(':') {
        Some((id, db_type)) => (id, Some(db_type)),
        None => (normalized.as_str(), None),
    };
    let id = parse_id(id, "project id")?;

    let db_type = match db_type.map(str::trim).filter(|t| !t.is_empty()) {
        None => None,
        Some(raw_type) => {
            let db_type = raw_type
                .parse::<i32>()
                .ok()
                .filter(|t| PROJECT_DB_TYPES.contains(t))
                .ok_or_else(|| {
                    ApiError::BadRequest(
                        "dbType wrong format, allow only 1,2,3,4,10".to_string(),
                    )
                })?;
            Some(db_type)
        }
    };
    Ok((id, db_type))
}
