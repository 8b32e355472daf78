use std::{sync::Arc, time::Duration};

use chrono::Utc;
use futures_util::future::join_all;
use tokio::time::{MissedTickBehavior, interval, timeout};

use crate::{
    core::{
        Service,
        health::{BackendStatus, HealthReport, HealthState, ProbeTarget},
        readiness::ReadinessRegistry,
        supervisor::Recover,
    },
    metrics::{GENERAL_DESTINATION, GENERAL_SCOPE},
    ports::metrics_sink::GaugeSink,
    utils::ShutdownToken,
};

/// Periodic prober of every ready backend.
///
/// Each tick probes the ready backends in parallel (each bounded by its own
/// timeout), writes one `service_up` sample per probed backend plus the
/// composite `general` sample, and publishes a [`HealthReport`]. A backend
/// that is not ready is skipped: its probe is not called and its gauge keeps
/// the value written when it went down.
pub struct HealthAggregator {
    targets: Vec<ProbeTarget>,
    readiness: Arc<ReadinessRegistry>,
    sink: Arc<dyn GaugeSink>,
    state: Arc<HealthState>,
    interval: Duration,
    recovery: Option<Arc<dyn Recover>>,
}

impl HealthAggregator {
    pub fn new(
        targets: Vec<ProbeTarget>,
        readiness: Arc<ReadinessRegistry>,
        sink: Arc<dyn GaugeSink>,
        state: Arc<HealthState>,
        interval: Duration,
    ) -> Self {
        Self {
            targets,
            readiness,
            sink,
            state,
            interval,
            recovery: None,
        }
    }

    /// Demote and reconnect a ready backend whose probe fails.
    pub fn with_recovery(mut self, recovery: Arc<dyn Recover>) -> Self {
        self.recovery = Some(recovery);
        self
    }

    /// Aggregator over every backend of `service`, with recovery when the
    /// service was configured for it.
    pub fn for_service(service: &Arc<Service>) -> Self {
        let options = service.options();
        let aggregator = Self::new(
            service.probe_targets(),
            service.readiness().clone(),
            service.sink(),
            service.health_state(),
            options.health_interval,
        );
        if options.reconnect_on_failure {
            aggregator.with_recovery(service.clone())
        } else {
            aggregator
        }
    }

    /// Run one tick and publish its report.
    pub async fn check_once(&self) -> HealthReport {
        let probes = self.targets.iter().map(|target| async move {
            let ready = self.readiness.is_ready(target.backend);
            if !ready {
                return (target, false, None);
            }
            let outcome = match timeout(target.timeout, target.probe.health()).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(err)) => Err(err.to_string()),
                Err(_) => Err(format!("probe timed out after {:?}", target.timeout)),
            };
            (target, true, Some(outcome))
        });
        let results = join_all(probes).await;

        let mut healthy = true;
        let mut last_error = None;
        let mut backends = Vec::with_capacity(results.len());
        let mut failed = Vec::new();

        for (target, ready, outcome) in results {
            let status = match outcome {
                None => {
                    healthy = false;
                    tracing::debug!(backend = %target.backend, "Backend not ready, probe skipped");
                    BackendStatus {
                        backend: target.backend,
                        destination: target.destination.clone(),
                        ready,
                        healthy: None,
                        error: None,
                    }
                }
                Some(Ok(())) => {
                    self.sink
                        .set_service_up(target.backend.scope(), &target.destination, true);
                    BackendStatus {
                        backend: target.backend,
                        destination: target.destination.clone(),
                        ready,
                        healthy: Some(true),
                        error: None,
                    }
                }
                Some(Err(error)) => {
                    healthy = false;
                    self.sink
                        .set_service_up(target.backend.scope(), &target.destination, false);
                    tracing::warn!(
                        backend = %target.backend,
                        destination = %target.destination,
                        error = %error,
                        "Health probe failed"
                    );
                    last_error = Some(format!("{}: {error}", target.backend));
                    failed.push(target.backend);
                    BackendStatus {
                        backend: target.backend,
                        destination: target.destination.clone(),
                        ready,
                        healthy: Some(false),
                        error: Some(error),
                    }
                }
            };
            backends.push(status);
        }

        self.sink
            .set_service_up(GENERAL_SCOPE, GENERAL_DESTINATION, healthy);

        if let Some(recovery) = &self.recovery {
            for backend in failed {
                recovery.recover(backend);
            }
        }

        let report = HealthReport {
            healthy,
            checked_at: Utc::now(),
            last_error,
            backends,
        };
        self.state.publish(report.clone());
        report
    }

    /// Tick until shutdown. The first tick runs one interval after start.
    pub async fn run(self, mut shutdown: ShutdownToken) {
        let period = self.interval.max(Duration::from_millis(1));
        tracing::info!(
            ?period,
            backends = self.targets.len(),
            recovery = self.recovery.is_some(),
            "Starting health aggregator"
        );

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The immediate first tick of `interval` is consumed here.
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait_for_shutdown() => break,
                _ = ticker.tick() => {}
            }

            let report = tokio::select! {
                biased;
                _ = shutdown.wait_for_shutdown() => break,
                report = self.check_once() => report,
            };
            tracing::debug!(
                healthy = report.healthy,
                last_error = report.last_error.as_deref().unwrap_or(""),
                "Health check cycle completed"
            );
        }

        tracing::info!("Health aggregator stopped");
    }
}
