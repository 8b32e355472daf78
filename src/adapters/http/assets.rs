use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::{
    adapters::http::{
        AppState,
        params::{ListParams, parse_id},
        response::{ApiError, ApiResult, ListEnvelope, non_empty},
    },
    core::models::Asset,
};

const NOT_FOUND: &str = "assets not found";

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<ListEnvelope<Asset>>> {
    let repo = state.assets()?;
    let page = params.page();
    let assets = repo.find_all(page).await?;
    non_empty(assets, page, NOT_FOUND)
}

pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Asset>> {
    let repo = state.assets()?;
    let id = parse_id(&id, "asset id")?;
    repo.find_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(NOT_FOUND.to_string()))
}
