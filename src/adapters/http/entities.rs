use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::{
    adapters::http::{
        AppState,
        params::ListParams,
        response::{ApiError, ApiResult, ListEnvelope, non_empty},
    },
    core::models::Entity,
};

const NOT_FOUND: &str = "entities not found";

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<ListEnvelope<Entity>>> {
    let repo = state.reference()?;
    let page = params.page();
    non_empty(repo.find_entities(page).await?, page, NOT_FOUND)
}

pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Entity>> {
    let repo = state.reference()?;
    let id = id.trim();
    if id.is_empty() {
        return Err(ApiError::BadRequest("empty entity id not allowed".to_string()));
    }
    repo.find_entity(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("entity not found".to_string()))
}
