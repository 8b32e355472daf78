//! REST surface of the gateway.
//!
//! Handlers resolve their backend through [`Service`], which only hands out a
//! capability for ready backends. A missing capability answers 503 without
//! touching the backend.
mod assets;
mod customers;
mod entities;
pub mod params;
pub mod response;
mod system;
mod tasks;
mod videochecks;

use std::sync::Arc;

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    adapters::{
        http::response::{ApiError, ApiResult},
        middleware::{bearer_auth_middleware, request_id_middleware, request_timing_middleware},
    },
    core::{Service, backend::Backend},
    ports::repository::{AssetRepo, CustomerRepo, ReferenceRepo, ServiceDeskRepo},
};

/// Shared state of every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<Service>,
    /// Bearer token of the secured routes; `None` rejects every secured call
    pub token: Option<Arc<str>>,
    /// Prometheus renderer; `/metrics` answers 404 without one
    pub metrics: Option<PrometheusHandle>,
    pub allow_origins: Vec<String>,
}

impl AppState {
    pub fn new(service: Arc<Service>) -> Self {
        Self {
            service,
            token: None,
            metrics: None,
            allow_origins: Vec::new(),
        }
    }

    pub fn with_token(mut self, token: Option<&str>) -> Self {
        self.token = token.filter(|t| !t.is_empty()).map(Arc::from);
        self
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    pub fn with_allow_origins(mut self, origins: Vec<String>) -> Self {
        self.allow_origins = origins;
        self
    }

    pub(crate) fn assets(&self) -> ApiResult<Arc<dyn AssetRepo>> {
        self.service
            .assets()
            .ok_or(ApiError::Unavailable(Backend::Assets))
    }

    pub(crate) fn customers(&self) -> ApiResult<Arc<dyn CustomerRepo>> {
        self.service
            .customers()
            .ok_or(ApiError::Unavailable(Backend::Customers))
    }

    pub(crate) fn reference(&self) -> ApiResult<Arc<dyn ReferenceRepo>> {
        self.service
            .reference()
            .ok_or(ApiError::Unavailable(Backend::Reference))
    }

    pub(crate) fn service_desk(&self) -> ApiResult<Arc<dyn ServiceDeskRepo>> {
        self.service
            .service_desk()
            .ok_or(ApiError::Unavailable(Backend::ServiceDesk))
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() || origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        let values: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(%origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(values)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::HEAD,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
}

/// Build the complete router.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/", get(system::index))
        .route("/health", get(system::health))
        .route("/metrics", get(system::metrics))
        .route("/v2/videochecks/configs", get(videochecks::list))
        .route("/v2/videochecks/configs/{pid}", get(videochecks::get_one))
        .route("/v2/entities", get(entities::list))
        .route("/v2/entities/{id}", get(entities::get_one));

    let secured = Router::new()
        .route("/v2/assets", get(assets::list))
        .route("/v2/assets/{id}", get(assets::get_one))
        .route("/v2/customers/configs", get(customers::list_configs))
        .route("/v2/customers/{id}/configs", get(customers::get_config))
        .route("/v2/projects", get(customers::list_projects))
        .route("/v2/projects/{id}", get(customers::get_project))
        .route("/v2/projects/{id}/ftpinfo", get(customers::get_ftp))
        .route(
            "/v2/projects/{id}/controllers/{cid}/manualcnts",
            get(customers::list_manual_countings),
        )
        .route("/v2/videochecks/configs", post(videochecks::create))
        .route(
            "/v2/videochecks/configs/{pid}",
            put(videochecks::upsert).delete(videochecks::delete),
        )
        .route("/v2/tasks/controllers/{sn}", get(tasks::list_by_serial))
        .route("/v2/tasks/{id}/comment", put(tasks::add_comment))
        .route("/v2/tasks/{id}/status", put(tasks::set_status))
        .route_layer(middleware::from_fn_with_state(
            state.token.clone(),
            bearer_auth_middleware,
        ));

    let cors = cors_layer(&state.allow_origins);

    public
        .merge(secured)
        .with_state(state)
        .layer(middleware::from_fn(request_timing_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
