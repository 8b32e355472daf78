//! Metrics for common-api.
//!
//! Two families are published through the `metrics` facade and rendered by the
//! Prometheus exporter on `GET /metrics`:
//! * `service_up` (gauge) - 1 when a backend answered its last probe, 0
//!   otherwise. Labels: `scope`, `destination`, `version`, `githash`, `build`.
//!   The composite sample uses scope `general` and destination `localhost`.
//! * `api_request_duration_seconds` (histogram) - latency of served requests.
//!   Labels: `method`, `route` (matched pattern, never the raw path), `status`.
use std::time::{Duration, Instant};

use eyre::{Result, WrapErr};
use metrics::{Unit, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;

use crate::ports::metrics_sink::GaugeSink;

pub const SERVICE_UP: &str = "service_up";
pub const API_REQUEST_DURATION_SECONDS: &str = "api_request_duration_seconds";

/// Scope and destination of the composite liveness sample.
pub const GENERAL_SCOPE: &str = "general";
pub const GENERAL_DESTINATION: &str = "localhost";

const REQUEST_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Build identity stamped onto every `service_up` sample.
///
/// `GIT_HASH` and `BUILD` are read from the environment at compile time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    pub version: &'static str,
    pub githash: &'static str,
    pub build: &'static str,
}

impl BuildInfo {
    pub const fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            githash: match option_env!("GIT_HASH") {
                Some(hash) => hash,
                None => "unknown",
            },
            build: match option_env!("BUILD") {
                Some(build) => build,
                None => "dev",
            },
        }
    }
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self::current()
    }
}

static DESCRIBED: Lazy<()> = Lazy::new(|| {
    describe_gauge!(
        SERVICE_UP,
        "Backend liveness (1 reachable, 0 unreachable); scope=general is the composite"
    );
    describe_histogram!(
        API_REQUEST_DURATION_SECONDS,
        Unit::Seconds,
        "Latency of HTTP requests served by the API."
    );
});

/// Register metric descriptions (idempotent).
pub fn init_metrics() {
    Lazy::force(&DESCRIBED);
}

/// Install the global Prometheus recorder and return the handle `/metrics`
/// renders from. Must be called once, before any metric is recorded.
pub fn install_recorder() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(API_REQUEST_DURATION_SECONDS.to_string()),
            REQUEST_BUCKETS,
        )
        .wrap_err("Invalid histogram buckets")?
        .install_recorder()
        .wrap_err("Failed to install Prometheus recorder")?;
    init_metrics();
    tracing::info!("Prometheus recorder installed");
    Ok(handle)
}

/// [`GaugeSink`] writing the `service_up` family through the `metrics` facade.
#[derive(Debug, Clone, Default)]
pub struct PrometheusSink {
    build: BuildInfo,
}

impl PrometheusSink {
    pub fn new(build: BuildInfo) -> Self {
        Self { build }
    }
}

impl GaugeSink for PrometheusSink {
    fn set_service_up(&self, scope: &str, destination: &str, up: bool) {
        gauge!(
            SERVICE_UP,
            "scope" => scope.to_string(),
            "destination" => destination.to_string(),
            "version" => self.build.version,
            "githash" => self.build.githash,
            "build" => self.build.build
        )
        .set(if up { 1.0 } else { 0.0 });
    }
}

/// Record a completed request's duration.
pub fn record_request_duration(method: &str, route: &str, status: u16, duration: Duration) {
    histogram!(
        API_REQUEST_DURATION_SECONDS,
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());
}

/// RAII helper measuring request duration; the status is filled in once the
/// response is known. A timer dropped without a status records `500`.
pub struct RequestTimer {
    start: Instant,
    method: String,
    route: String,
    status: u16,
}

impl RequestTimer {
    pub fn new(method: &str, route: &str) -> Self {
        Self {
            start: Instant::now(),
            method: method.to_string(),
            route: route.to_string(),
            status: 500,
        }
    }

    pub fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        record_request_duration(&self.method, &self.route, self.status, self.start.elapsed());
    }
}
