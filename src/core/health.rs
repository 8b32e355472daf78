use std::{
    sync::{Arc, RwLock},
    time::Duration,
};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{core::backend::Backend, ports::repository::Health};

/// One backend the health aggregator probes on every tick.
#[derive(Clone)]
pub struct ProbeTarget {
    pub backend: Backend,
    /// Value of the gauge `destination` label
    pub destination: String,
    /// Upper bound for a single probe
    pub timeout: Duration,
    pub probe: Arc<dyn Health>,
}

/// Outcome for one backend within a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendStatus {
    pub backend: Backend,
    pub destination: String,
    pub ready: bool,
    /// `None` when the backend was not ready and therefore not probed
    pub healthy: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Composite liveness computed by one aggregator tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub checked_at: DateTime<Utc>,
    /// Representative failure of the tick; the last one in enumeration order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub backends: Vec<BackendStatus>,
}

impl HealthReport {
    /// Report derived from readiness alone, served before the first tick.
    pub fn from_readiness(
        readiness: &[(Backend, bool)],
        destinations: &[(Backend, String)],
    ) -> Self {
        let backends: Vec<BackendStatus> = readiness
            .iter()
            .map(|(backend, ready)| BackendStatus {
                backend: *backend,
                destination: destinations
                    .iter()
                    .find(|(b, _)| b == backend)
                    .map(|(_, d)| d.clone())
                    .unwrap_or_default(),
                ready: *ready,
                healthy: None,
                error: None,
            })
            .collect();
        let last_error = backends
            .iter()
            .rev()
            .find(|s| !s.ready)
            .map(|s| format!("{} is not connected", s.backend));
        Self {
            healthy: last_error.is_none(),
            checked_at: Utc::now(),
            last_error,
            backends,
        }
    }
}

/// Latest report, shared between the aggregator and `GET /health`.
#[derive(Debug, Default)]
pub struct HealthState {
    latest: RwLock<Option<HealthReport>>,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, report: HealthReport) {
        *self
            .latest
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(report);
    }

    pub fn latest(&self) -> Option<HealthReport> {
        self.latest
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}
