//! Videocheck configuration CRUD. Reads are public, writes are secured.
use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::{HeaderMap, HeaderValue, StatusCode, header::LOCATION},
};

use crate::{
    adapters::http::{
        AppState,
        params::{ListParams, parse_id},
        response::{ApiError, ApiResult, ListEnvelope, StatusBody, non_empty},
    },
    core::models::VideocheckConfig,
};

const NOT_FOUND: &str = "videocheck configs not found";

fn location(project_id: i64) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&format!("/v2/videochecks/configs/{project_id}")) {
        headers.insert(LOCATION, value);
    }
    headers
}

fn body(payload: Result<Json<VideocheckConfig>, JsonRejection>) -> ApiResult<VideocheckConfig> {
    payload
        .map(|Json(config)| config)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<ListEnvelope<VideocheckConfig>>> {
    let repo = state.customers()?;
    let page = params.page();
    non_empty(repo.find_videocheck_configs(page).await?, page, NOT_FOUND)
}

pub async fn get_one(
    State(state): State<AppState>,
    Path(pid): Path<String>,
) -> ApiResult<Json<VideocheckConfig>> {
    let repo = state.customers()?;
    let pid = parse_id(&pid, "pid")?;
    repo.find_videocheck_config(pid)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(NOT_FOUND.to_string()))
}

pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<VideocheckConfig>, JsonRejection>,
) -> ApiResult<(StatusCode, HeaderMap, Json<StatusBody>)> {
    let repo = state.customers()?;
    let config = body(payload)?;
    if config.project_id == 0 {
        return Err(ApiError::BadRequest("empty projectId not allowed".to_string()));
    }
    repo.store_videocheck_config(&config).await?;
    tracing::info!(project_id = config.project_id, "Videocheck config stored");
    Ok((
        StatusCode::CREATED,
        location(config.project_id),
        StatusBody::new(StatusCode::CREATED, config.project_id.to_string()),
    ))
}

/// Insert or replace the config of `pid`. The path id wins over the body's.
pub async fn upsert(
    State(state): State<AppState>,
    Path(pid): Path<String>,
    payload: Result<Json<VideocheckConfig>, JsonRejection>,
) -> ApiResult<(HeaderMap, Json<StatusBody>)> {
    let repo = state.customers()?;
    let mut config = body(payload)?;
    if config.project_id == 0 {
        return Err(ApiError::BadRequest("empty pid not allowed".to_string()));
    }
    config.project_id = parse_id(&pid, "pid")?;
    repo.upsert_videocheck_config(&config).await?;
    tracing::info!(project_id = config.project_id, "Videocheck config upserted");
    Ok((
        location(config.project_id),
        StatusBody::new(StatusCode::OK, "updated"),
    ))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(pid): Path<String>,
) -> ApiResult<Json<StatusBody>> {
    let repo = state.customers()?;
    let pid = parse_id(&pid, "pid")?;
    let deleted = repo.delete_videocheck_config(pid).await?;
    if deleted == 0 {
        return Err(ApiError::NotFound(NOT_FOUND.to_string()));
    }
    Ok(StatusBody::new(
        StatusCode::OK,
        format!("delete {deleted} records"),
    ))
}
