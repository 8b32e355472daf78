//! Axum middleware shared by every route.
//!
//! Request ids and timing apply to the whole router. Bearer authentication is
//! attached with `route_layer` to the secured group only.
use std::sync::Arc;

use axum::{
    extract::{MatchedPath, Request, State},
    http::{HeaderValue, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::Instrument;

use crate::{adapters::http::response::ApiError, metrics::RequestTimer, tracing_setup};

pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Reject requests whose `Authorization: Bearer <token>` header does not
/// carry the configured token.
///
/// A missing or malformed header is a bad request; a wrong token, or no
/// token configured at all, is unauthorized.
pub async fn bearer_auth_middleware(
    State(token): State<Option<Arc<str>>>,
    req: Request,
    next: Next,
) -> Response {
    let presented = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|value| !value.is_empty());

    let Some(presented) = presented else {
        return ApiError::BadRequest("missing or malformed bearer token".to_string())
            .into_response();
    };

    match token.as_deref() {
        Some(expected) if expected == presented => next.run(req).await,
        _ => ApiError::Unauthorized("invalid or expired token".to_string()).into_response(),
    }
}

/// Generate a per-request UUID and expose it via tracing plus `X-Request-ID`.
pub async fn request_id_middleware(req: Request, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let span = tracing_setup::create_request_span(
        req.method().as_str(),
        req.uri().path(),
        &request_id,
    );

    let mut response = next.run(req).instrument(span).await;

    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, header_value);
    }
    response
}

/// Observe `api_request_duration_seconds` under the matched route template
/// and log completion.
pub async fn request_timing_middleware(req: Request, next: Next) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let method = req.method().clone();
    let mut timer = RequestTimer::new(method.as_str(), &route);

    let response = next.run(req).await;
    timer.set_status(response.status().as_u16());

    tracing::info!(
        method = %method,
        route = %route,
        status = response.status().as_u16(),
        elapsed_ms = timer.elapsed().as_millis() as u64,
        "Request completed"
    );
    response
}
