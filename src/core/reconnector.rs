//! Fixed-period reconnection of a backend that failed to come up.
//!
//! A [`Reconnector`] has two states, polling and terminated. While polling it
//! tries to build the capability once per period, with the period doubling as
//! the construction timeout. The first success installs the capability, then
//! flips the readiness flag, then ends the task. A shutdown signal ends it at
//! any point, abandoning an in-flight attempt.
use std::{
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout};

use crate::{
    core::{backend::Backend, readiness::ReadinessRegistry, slot::BackendSlot},
    ports::connector::Connector,
    utils::ShutdownToken,
};

/// How a reconnector finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectOutcome {
    /// Capability installed and backend marked ready after `attempts` tries
    Connected { attempts: u32 },
    /// Shutdown observed before any attempt succeeded
    Cancelled { attempts: u32 },
}

pub struct Reconnector<T: ?Sized + Send + Sync + 'static> {
    connector: Arc<dyn Connector<Capability = T>>,
    slot: Arc<BackendSlot<T>>,
    readiness: Arc<ReadinessRegistry>,
    period: Duration,
    attempts: Arc<AtomicU32>,
}

impl<T: ?Sized + Send + Sync + 'static> Reconnector<T> {
    pub fn new(
        connector: Arc<dyn Connector<Capability = T>>,
        slot: Arc<BackendSlot<T>>,
        readiness: Arc<ReadinessRegistry>,
        period: Duration,
    ) -> Self {
        Self {
            connector,
            slot,
            readiness,
            period,
            attempts: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn backend(&self) -> Backend {
        self.connector.descriptor().backend
    }

    /// Shared attempt counter, readable while the task runs.
    pub fn attempts(&self) -> Arc<AtomicU32> {
        self.attempts.clone()
    }

    /// Poll until connected or cancelled. Consumes the reconnector, so a
    /// terminated instance can never run again.
    pub async fn run(self, mut shutdown: ShutdownToken) -> ReconnectOutcome {
        let backend = self.backend();
        let target = self.connector.descriptor().redacted();
        // Zero would make `interval` panic; clamp to the smallest tick.
        let period = self.period.max(Duration::from_millis(1));

        tracing::info!(%backend, target = %target, ?period, "Starting reconnector");

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait_for_shutdown() => break,
                _ = ticker.tick() => {}
            }

            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            tracing::debug!(%backend, attempt, "Reconnection attempt");

            let result = tokio::select! {
                biased;
                _ = shutdown.wait_for_shutdown() => break,
                result = timeout(period, self.connector.connect(period)) => result,
            };

            match result {
                Ok(Ok(capability)) => {
                    self.slot.install(capability);
                    self.readiness.set_ready(backend, true);
                    tracing::info!(%backend, target = %target, attempt, "Backend reconnected");
                    return ReconnectOutcome::Connected { attempts: attempt };
                }
                Ok(Err(err)) => {
                    tracing::warn!(
                        %backend,
                        target = %target,
                        attempt,
                        error = %err,
                        "Reconnection failed, retrying in {:?}",
                        period
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        %backend,
                        target = %target,
                        attempt,
                        "Reconnection timed out after {:?}",
                        period
                    );
                }
            }
        }

        let attempts = self.attempts.load(Ordering::SeqCst);
        tracing::info!(%backend, attempts, "Reconnector stopped by shutdown");
        ReconnectOutcome::Cancelled { attempts }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::{
        core::backend::BackendDescriptor,
        ports::repository::{Health, RepoError, RepoResult},
        utils::{GracefulShutdown, ShutdownReason},
    };

    struct Probe;

    #[async_trait]
    impl Health for Probe {
        async fn health(&self) -> RepoResult<()> {
            Ok(())
        }
    }

    /// Fails until `succeed_on` calls have been made.
    struct FlakyConnector {
        descriptor: BackendDescriptor,
        calls: AtomicU32,
        succeed_on: u32,
    }

    impl FlakyConnector {
        fn new(succeed_on: u32) -> Self {
            Self {
                descriptor: BackendDescriptor::new(
                    Backend::Reference,
                    "server=unreachable;database=evolution",
                    Duration::from_secs(1),
                ),
                calls: AtomicU32::new(0),
                succeed_on,
            }
        }
    }

    #[async_trait]
    impl Connector for FlakyConnector {
        type Capability = dyn Health;

        fn descriptor(&self) -> &BackendDescriptor {
            &self.descriptor
        }

        async fn connect(&self, _timeout: Duration) -> RepoResult<Arc<dyn Health>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call >= self.succeed_on {
                Ok(Arc::new(Probe))
            } else {
                Err(RepoError::Connection(format!("refused (call {call})")))
            }
        }
    }

    fn reconnector(
        connector: Arc<FlakyConnector>,
    ) -> (
        Reconnector<dyn Health>,
        Arc<BackendSlot<dyn Health>>,
        Arc<ReadinessRegistry>,
    ) {
        let slot = Arc::new(BackendSlot::empty());
        let readiness = Arc::new(ReadinessRegistry::new());
        let r = Reconnector::new(
            connector,
            slot.clone(),
            readiness.clone(),
            Duration::from_secs(1),
        );
        (r, slot, readiness)
    }

    #[tokio::test(start_paused = true)]
    async fn test_connects_on_third_attempt_then_stops() {
        let connector = Arc::new(FlakyConnector::new(3));
        let (r, slot, readiness) = reconnector(connector.clone());
        let shutdown = GracefulShutdown::new();

        let outcome = r.run(shutdown.shutdown_token()).await;

        assert_eq!(outcome, ReconnectOutcome::Connected { attempts: 3 });
        assert!(readiness.is_ready(Backend::Reference));
        assert!(slot.is_installed());

        // Nothing is left ticking: no fourth call however long we wait.
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(connector.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_waits_one_period() {
        let connector = Arc::new(FlakyConnector::new(1));
        let (r, _slot, readiness) = reconnector(connector.clone());
        let shutdown = GracefulShutdown::new();

        let started = Instant::now();
        let handle = tokio::spawn(r.run(shutdown.shutdown_token()));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(connector.calls.load(Ordering::SeqCst), 0);
        assert!(!readiness.is_ready(Backend::Reference));

        let outcome = handle.await.unwrap();
        assert_eq!(outcome, ReconnectOutcome::Connected { attempts: 1 });
        assert!(started.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_before_success_never_marks_ready() {
        let connector = Arc::new(FlakyConnector::new(u32::MAX));
        let (r, slot, readiness) = reconnector(connector.clone());
        let shutdown = GracefulShutdown::new();

        let handle = tokio::spawn(r.run(shutdown.shutdown_token()));
        tokio::time::sleep(Duration::from_millis(2500)).await;
        shutdown.trigger_shutdown(ShutdownReason::Graceful);

        let outcome = handle.await.unwrap();
        assert_eq!(outcome, ReconnectOutcome::Cancelled { attempts: 2 });
        assert!(!readiness.is_ready(Backend::Reference));
        assert!(!slot.is_installed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_already_triggered_terminates_immediately() {
        let connector = Arc::new(FlakyConnector::new(1));
        let (r, _slot, readiness) = reconnector(connector.clone());
        let shutdown = GracefulShutdown::new();
        shutdown.trigger_shutdown(ShutdownReason::Graceful);

        let outcome = r.run(shutdown.shutdown_token()).await;
        assert_eq!(outcome, ReconnectOutcome::Cancelled { attempts: 0 });
        assert_eq!(connector.calls.load(Ordering::SeqCst), 0);
        assert!(!readiness.is_ready(Backend::Reference));
    }
}
