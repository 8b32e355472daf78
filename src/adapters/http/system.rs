use axum::{
    Json,
    extract::State,
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::{
    adapters::http::{AppState, response::ApiError},
    metrics::BuildInfo,
};

pub async fn index() -> Json<serde_json::Value> {
    let build = BuildInfo::current();
    Json(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": build.version,
        "githash": build.githash,
        "build": build.build,
    }))
}

/// Latest aggregator report: 200 when healthy, 503 otherwise.
pub async fn health(State(state): State<AppState>) -> Response {
    let report = state.service.health_report();
    let status = if report.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report)).into_response()
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => ApiError::NotFound("metrics recorder not installed".to_string()).into_response(),
    }
}
