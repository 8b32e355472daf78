//! Ticketing tasks of a controller.
use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
};

use crate::{
    adapters::http::{
        AppState,
        params::ListParams,
        response::{ApiError, ApiResult, ListEnvelope, StatusBody},
    },
    core::models::{ControllerTask, Page, TaskComment, TaskStatus},
};

fn task_id(raw: &str) -> ApiResult<&str> {
    let id = raw.trim();
    if id.is_empty() {
        return Err(ApiError::BadRequest("empty id not allowed".to_string()));
    }
    Ok(id)
}

/// Tasks mentioning the controller serial. The ticketing API is always read
/// from its first page, so the reported offset is 0.
pub async fn list_by_serial(
    State(state): State<AppState>,
    Path(sn): Path<String>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<ListEnvelope<ControllerTask>>> {
    let repo = state.service_desk()?;
    let sn = sn.trim();
    if sn.is_empty() {
        return Err(ApiError::BadRequest("empty sn not allowed".to_string()));
    }
    let page = Page::new(0, params.page().limit);
    let tasks = repo.find_tasks_by_serial(sn, page).await?;
    if tasks.items.is_empty() {
        return Err(ApiError::NotFound(
            "tasks for controller not found".to_string(),
        ));
    }
    Ok(Json(ListEnvelope::new(tasks, page)))
}

pub async fn add_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<TaskComment>, JsonRejection>,
) -> ApiResult<Json<StatusBody>> {
    let repo = state.service_desk()?;
    let id = task_id(&id)?;
    let Json(comment) = payload.map_err(|r| ApiError::BadRequest(r.body_text()))?;
    repo.add_comment(id, &comment.comment).await?;
    Ok(StatusBody::new(StatusCode::OK, "success"))
}

pub async fn set_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<TaskStatus>, JsonRejection>,
) -> ApiResult<Json<StatusBody>> {
    let repo = state.service_desk()?;
    let id = task_id(&id)?;
    let Json(status) = payload.map_err(|r| ApiError::BadRequest(r.body_text()))?;
    repo.set_status(id, &status).await?;
    tracing::info!(task_id = %id, status_id = status.status_id, "Task status changed");
    Ok(StatusBody::new(StatusCode::OK, "success"))
}
