//! Customer, project, FTP and manual counting lookups of the configuration
//! store.
use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::{
    adapters::http::{
        AppState,
        params::{ListParams, parse_id, parse_project_key},
        response::{ApiError, ApiResult, ListEnvelope, non_empty},
    },
    core::models::{CustomerConfig, FtpInfo, ManualCounting, Project},
};

const CUSTOMER_NOT_FOUND: &str = "customer configs not found";
const PROJECT_NOT_FOUND: &str = "project not found";
const FTP_NOT_FOUND: &str = "project' ftp settings not found";

pub async fn list_configs(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<ListEnvelope<CustomerConfig>>> {
    let repo = state.customers()?;
    let page = params.page();
    let configs = repo.find_customer_configs(page, params.active()).await?;
    non_empty(configs, page, CUSTOMER_NOT_FOUND)
}

pub async fn get_config(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<CustomerConfig>> {
    let repo = state.customers()?;
    let id = parse_id(&id, "customer id")?;
    repo.find_customer_config(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(CUSTOMER_NOT_FOUND.to_string()))
}

/// Unlike other lists, an empty project page is a regular 200.
pub async fn list_projects(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<ListEnvelope<Project>>> {
    let repo = state.customers()?;
    let page = params.page();
    let projects = repo.find_projects(page, params.active()).await?;
    Ok(Json(ListEnvelope::new(projects, page)))
}

pub async fn get_project(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<Project>> {
    let repo = state.customers()?;
    let (id, db_type) = parse_project_key(&key)?;
    repo.find_project(id, db_type)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(PROJECT_NOT_FOUND.to_string()))
}

pub async fn get_ftp(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<FtpInfo>> {
    let repo = state.customers()?;
    let id = parse_id(&id, "project id")?;
    repo.find_ftp(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(FTP_NOT_FOUND.to_string()))
}

pub async fn list_manual_countings(
    State(state): State<AppState>,
    Path((id, cid)): Path<(String, String)>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<ListEnvelope<ManualCounting>>> {
    let repo = state.customers()?;
    let project_id = parse_id(&id, "project id")?;
    let controller_id = parse_id(&cid, "controller id")?;
    let page = params.page();
    let countings = repo
        .find_manual_countings(project_id, controller_id, page)
        .await?;
    non_empty(countings, page, PROJECT_NOT_FOUND)
}
