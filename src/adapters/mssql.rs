//! Shared SQL Server plumbing: a two-connection bb8 pool over tiberius, DSN
//! normalization and typed column readers that tolerate the integer widths
//! the legacy schemas use.
use std::{future::Future, time::Duration};

use bb8::{Pool, RunError};
use bb8_tiberius::ConnectionManager;
use chrono::{DateTime, NaiveDateTime, Utc};
use tiberius::{Config, Row};

use crate::ports::repository::{RepoError, RepoResult};

/// Upper bound of open sessions per SQL Server backend.
pub const MAX_CONNECTIONS: u32 = 2;

pub const PING_QUERY: &str = "SELECT @@VERSION AS [v]";

pub type MssqlPool = Pool<ConnectionManager>;

/// Rewrite an ADO DSN so tiberius understands it: a separate `port=` key is
/// folded into `server=tcp:host,port`.
pub fn normalize_ado_dsn(dsn: &str) -> String {
    let mut port = None;
    let mut parts: Vec<(String, String)> = Vec::new();

    for part in dsn.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = match part.split_once('=') {
            Some((k, v)) => (k.trim(), v.trim()),
            None => continue,
        };
        if key.eq_ignore_ascii_case("port") {
            port = Some(value.to_string());
        } else {
            parts.push((key.to_string(), value.to_string()));
        }
    }

    if let Some(port) = port {
        for (key, value) in parts.iter_mut() {
            let is_server = ["server", "data source", "address"]
                .iter()
                .any(|k| key.eq_ignore_ascii_case(k));
            if is_server && !value.contains(',') {
                let host = value.trim_start_matches("tcp:");
                *value = format!("tcp:{host},{port}");
            }
        }
    }

    parts
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(";")
}

fn tiberius_config(dsn: &str) -> RepoResult<Config> {
    let normalized = normalize_ado_dsn(dsn);
    let mut config = Config::from_ado_string(&normalized)
        .map_err(|e| RepoError::Connection(format!("invalid DSN: {e}")))?;
    if !normalized
        .to_ascii_lowercase()
        .contains("trustservercertificate")
    {
        config.trust_cert();
    }
    Ok(config)
}

/// Build the pool and prove one session works.
pub async fn connect_pool(dsn: &str, timeout: Duration) -> RepoResult<MssqlPool> {
    let manager = ConnectionManager::new(tiberius_config(dsn)?);
    let pool = Pool::builder()
        .max_size(MAX_CONNECTIONS)
        .connection_timeout(timeout)
        .build(manager)
        .await?;
    ping(&pool, timeout).await?;
    Ok(pool)
}

/// Cheapest round-trip on a pooled session.
pub async fn ping(pool: &MssqlPool, timeout: Duration) -> RepoResult<()> {
    with_timeout(timeout, async {
        let mut conn = pool.get().await?;
        conn.simple_query(PING_QUERY)
            .await?
            .into_first_result()
            .await?;
        Ok(())
    })
    .await
}

/// Bound a backend call by `timeout`.
pub async fn with_timeout<T, F>(timeout: Duration, fut: F) -> RepoResult<T>
where
    F: Future<Output = RepoResult<T>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| RepoError::Timeout(timeout))?
}

impl From<bb8_tiberius::Error> for RepoError {
    fn from(err: bb8_tiberius::Error) -> Self {
        match err {
            bb8_tiberius::Error::Tiberius(e) => e.into(),
            bb8_tiberius::Error::Io(e) => RepoError::Connection(e.to_string()),
        }
    }
}

impl From<RunError<bb8_tiberius::Error>> for RepoError {
    fn from(err: RunError<bb8_tiberius::Error>) -> Self {
        match err {
            RunError::User(e) => e.into(),
            RunError::TimedOut => {
                RepoError::Connection("timed out waiting for a pooled connection".into())
            }
        }
    }
}

/// Total from the trailing `SELECT count(*)` result set, 0 when absent.
pub fn trailing_count(results: &[Vec<Row>]) -> RepoResult<i64> {
    match results.get(1).and_then(|rows| rows.first()) {
        Some(row) => col_i64(row, 0),
        None => Ok(0),
    }
}

fn decode(idx: usize, err: tiberius::error::Error) -> RepoError {
    RepoError::Decode(format!("column {idx}: {err}"))
}

/// Integer column of any width; NULL reads as 0.
pub fn col_i64(row: &Row, idx: usize) -> RepoResult<i64> {
    if let Ok(v) = row.try_get::<i64, _>(idx) {
        return Ok(v.unwrap_or_default());
    }
    if let Ok(v) = row.try_get::<i32, _>(idx) {
        return Ok(v.map(i64::from).unwrap_or_default());
    }
    if let Ok(v) = row.try_get::<i16, _>(idx) {
        return Ok(v.map(i64::from).unwrap_or_default());
    }
    row.try_get::<u8, _>(idx)
        .map(|v| v.map(i64::from).unwrap_or_default())
        .map_err(|e| decode(idx, e))
}

pub fn col_i32(row: &Row, idx: usize) -> RepoResult<i32> {
    let value = col_i64(row, idx)?;
    i32::try_from(value).map_err(|e| RepoError::Decode(format!("column {idx}: {e}")))
}

/// Text column; NULL reads as an empty string.
pub fn col_string(row: &Row, idx: usize) -> RepoResult<String> {
    row.try_get::<&str, _>(idx)
        .map(|v| v.unwrap_or_default().to_string())
        .map_err(|e| decode(idx, e))
}

/// `bit` column, or an integer flag; NULL reads as false.
pub fn col_bool(row: &Row, idx: usize) -> RepoResult<bool> {
    if let Ok(v) = row.try_get::<bool, _>(idx) {
        return Ok(v.unwrap_or_default());
    }
    col_i64(row, idx).map(|v| v != 0)
}

pub fn col_f64(row: &Row, idx: usize) -> RepoResult<f64> {
    if let Ok(v) = row.try_get::<f64, _>(idx) {
        return Ok(v.unwrap_or_default());
    }
    if let Ok(v) = row.try_get::<f32, _>(idx) {
        return Ok(v.map(f64::from).unwrap_or_default());
    }
    col_i64(row, idx).map(|v| v as f64)
}

/// `datetime`/`datetime2` column, interpreted as UTC.
pub fn col_datetime(row: &Row, idx: usize) -> RepoResult<DateTime<Utc>> {
    if let Ok(Some(v)) = row.try_get::<DateTime<Utc>, _>(idx) {
        return Ok(v);
    }
    row.try_get::<NaiveDateTime, _>(idx)
        .map_err(|e| decode(idx, e))?
        .map(|v| v.and_utc())
        .ok_or_else(|| RepoError::Decode(format!("column {idx}: unexpected NULL")))
}

/// Date column rendered as RFC 3339 text, or a text column passed through.
pub fn col_timestamp_text(row: &Row, idx: usize) -> RepoResult<String> {
    match col_datetime(row, idx) {
        Ok(v) => Ok(v.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)),
        Err(_) => col_string(row, idx),
    }
}
