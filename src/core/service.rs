//! Backend lifecycle owner.
//!
//! [`Service`] brings every backend up at startup, hands the ones that fail to
//! a [`Reconnector`], and gives the HTTP layer live capability handles only
//! for backends that are ready. It never blocks on a failing backend: startup
//! returns as soon as every first attempt has finished.
use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use futures_util::future::join_all;
use tokio::time::timeout;

use crate::{
    config::ServerConfig,
    core::{
        backend::{Backend, BackendDescriptor},
        health::{HealthReport, HealthState, ProbeTarget},
        readiness::ReadinessRegistry,
        reconnector::Reconnector,
        slot::BackendSlot,
        supervisor::{Recover, Supervisor},
    },
    ports::{
        connector::Connector,
        metrics_sink::GaugeSink,
        repository::{
            AssetRepo, CustomerRepo, Health, ReferenceRepo, RepoError, RepoResult,
            ServiceDeskRepo,
        },
    },
    utils::{GracefulShutdown, ShutdownToken},
};

/// One connector per backend.
pub struct Connectors {
    pub assets: Arc<dyn Connector<Capability = dyn AssetRepo>>,
    pub customers: Arc<dyn Connector<Capability = dyn CustomerRepo>>,
    pub reference: Arc<dyn Connector<Capability = dyn ReferenceRepo>>,
    pub service_desk: Arc<dyn Connector<Capability = dyn ServiceDeskRepo>>,
}

/// Lifecycle knobs taken from configuration.
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub health_interval: Duration,
    pub reconnect_on_failure: bool,
    pub shutdown_grace: Duration,
}

impl ServiceOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            health_interval: Duration::from_secs(config.health_check.interval_secs),
            reconnect_on_failure: config.health_check.reconnect_on_failure,
            shutdown_grace: Duration::from_secs(config.httpd.shutdown_grace_secs),
        }
    }
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            health_interval: Duration::from_secs(30),
            reconnect_on_failure: false,
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

/// Type-erased view of one backend: its connector and its slot.
#[async_trait]
trait Binding: Send + Sync {
    fn descriptor(&self) -> &BackendDescriptor;

    /// One construction attempt bounded by the descriptor timeout; installs
    /// the capability on success.
    async fn connect_and_install(&self) -> RepoResult<()>;

    fn probe(&self) -> Arc<dyn Health>;

    fn launch_reconnector(
        &self,
        supervisor: &Supervisor,
        readiness: Arc<ReadinessRegistry>,
        shutdown: ShutdownToken,
    ) -> bool;
}

struct TypedBinding<T: ?Sized + Send + Sync + 'static> {
    connector: Arc<dyn Connector<Capability = T>>,
    slot: Arc<BackendSlot<T>>,
}

#[async_trait]
impl<T> Binding for TypedBinding<T>
where
    T: Health + ?Sized + 'static,
{
    fn descriptor(&self) -> &BackendDescriptor {
        self.connector.descriptor()
    }

    async fn connect_and_install(&self) -> RepoResult<()> {
        let budget = self.descriptor().timeout;
        let capability = timeout(budget, self.connector.connect(budget))
            .await
            .map_err(|_| RepoError::Timeout(budget))??;
        self.slot.install(capability);
        Ok(())
    }

    fn probe(&self) -> Arc<dyn Health> {
        self.slot.clone()
    }

    fn launch_reconnector(
        &self,
        supervisor: &Supervisor,
        readiness: Arc<ReadinessRegistry>,
        shutdown: ShutdownToken,
    ) -> bool {
        let descriptor = self.descriptor();
        let reconnector = Reconnector::new(
            self.connector.clone(),
            self.slot.clone(),
            readiness,
            descriptor.timeout,
        );
        supervisor.spawn_reconnector(descriptor.backend, reconnector.run(shutdown))
    }
}

pub struct Service {
    readiness: Arc<ReadinessRegistry>,
    assets: Arc<BackendSlot<dyn AssetRepo>>,
    customers: Arc<BackendSlot<dyn CustomerRepo>>,
    reference: Arc<BackendSlot<dyn ReferenceRepo>>,
    service_desk: Arc<BackendSlot<dyn ServiceDeskRepo>>,
    bindings: Vec<Arc<dyn Binding>>,
    supervisor: Supervisor,
    health: Arc<HealthState>,
    sink: Arc<dyn GaugeSink>,
    shutdown: ShutdownToken,
    options: ServiceOptions,
}

impl Service {
    /// Bring every backend up, launching a reconnector for each one that fails.
    ///
    /// All readiness flags are cleared first. A backend that comes up has its
    /// capability installed before its flag is set. The reconnection period of
    /// a backend equals its configured timeout.
    pub async fn start(
        connectors: Connectors,
        sink: Arc<dyn GaugeSink>,
        options: ServiceOptions,
        shutdown: &GracefulShutdown,
    ) -> Self {
        let readiness = Arc::new(ReadinessRegistry::new());
        for backend in Backend::ALL {
            readiness.set_ready(backend, false);
        }

        let assets = Arc::new(BackendSlot::<dyn AssetRepo>::empty());
        let customers = Arc::new(BackendSlot::<dyn CustomerRepo>::empty());
        let reference = Arc::new(BackendSlot::<dyn ReferenceRepo>::empty());
        let service_desk = Arc::new(BackendSlot::<dyn ServiceDeskRepo>::empty());

        let bindings: Vec<Arc<dyn Binding>> = vec![
            Arc::new(TypedBinding {
                connector: connectors.assets,
                slot: assets.clone(),
            }),
            Arc::new(TypedBinding {
                connector: connectors.customers,
                slot: customers.clone(),
            }),
            Arc::new(TypedBinding {
                connector: connectors.reference,
                slot: reference.clone(),
            }),
            Arc::new(TypedBinding {
                connector: connectors.service_desk,
                slot: service_desk.clone(),
            }),
        ];

        let service = Self {
            readiness,
            assets,
            customers,
            reference,
            service_desk,
            bindings,
            supervisor: Supervisor::new(),
            health: Arc::new(HealthState::new()),
            sink,
            shutdown: shutdown.shutdown_token(),
            options,
        };

        let attempts = join_all(
            service
                .bindings
                .iter()
                .map(|binding| binding.connect_and_install()),
        )
        .await;

        for (binding, result) in service.bindings.iter().zip(attempts) {
            let descriptor = binding.descriptor();
            let backend = descriptor.backend;
            let destination = descriptor.destination();
            match result {
                Ok(()) => {
                    service.readiness.set_ready(backend, true);
                    service
                        .sink
                        .set_service_up(backend.scope(), &destination, true);
                    tracing::info!(%backend, destination = %destination, "Backend connected");
                }
                Err(err) => {
                    service
                        .sink
                        .set_service_up(backend.scope(), &destination, false);
                    tracing::error!(
                        %backend,
                        target = %descriptor.redacted(),
                        error = %err,
                        "Backend unavailable at startup, reconnecting every {:?}",
                        descriptor.timeout
                    );
                    binding.launch_reconnector(
                        &service.supervisor,
                        service.readiness.clone(),
                        service.shutdown.clone(),
                    );
                }
            }
        }

        service
    }

    pub fn readiness(&self) -> &Arc<ReadinessRegistry> {
        &self.readiness
    }

    pub fn is_ready(&self, backend: Backend) -> bool {
        self.readiness.is_ready(backend)
    }

    pub fn assets(&self) -> Option<Arc<dyn AssetRepo>> {
        self.ready_capability(Backend::Assets, &self.assets)
    }

    pub fn customers(&self) -> Option<Arc<dyn CustomerRepo>> {
        self.ready_capability(Backend::Customers, &self.customers)
    }

    pub fn reference(&self) -> Option<Arc<dyn ReferenceRepo>> {
        self.ready_capability(Backend::Reference, &self.reference)
    }

    pub fn service_desk(&self) -> Option<Arc<dyn ServiceDeskRepo>> {
        self.ready_capability(Backend::ServiceDesk, &self.service_desk)
    }

    fn ready_capability<T: ?Sized>(
        &self,
        backend: Backend,
        slot: &BackendSlot<T>,
    ) -> Option<Arc<T>> {
        if self.readiness.is_ready(backend) {
            slot.get()
        } else {
            None
        }
    }

    pub fn options(&self) -> &ServiceOptions {
        &self.options
    }

    pub fn sink(&self) -> Arc<dyn GaugeSink> {
        self.sink.clone()
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    pub fn health_state(&self) -> Arc<HealthState> {
        self.health.clone()
    }

    /// Targets the aggregator probes, in [`Backend::ALL`] order.
    pub fn probe_targets(&self) -> Vec<ProbeTarget> {
        self.bindings
            .iter()
            .map(|binding| {
                let descriptor = binding.descriptor();
                ProbeTarget {
                    backend: descriptor.backend,
                    destination: descriptor.destination(),
                    timeout: descriptor.timeout,
                    probe: binding.probe(),
                }
            })
            .collect()
    }

    /// Latest aggregator report, or one derived from readiness before the
    /// first tick.
    pub fn health_report(&self) -> HealthReport {
        self.health.latest().unwrap_or_else(|| {
            let destinations: Vec<(Backend, String)> = self
                .bindings
                .iter()
                .map(|b| (b.descriptor().backend, b.descriptor().destination()))
                .collect();
            HealthReport::from_readiness(&self.readiness.snapshot(), &destinations)
        })
    }

    /// Wait for background tasks after the shutdown signal has been sent.
    pub async fn shutdown(&self) -> bool {
        let finished = self.supervisor.close(self.options.shutdown_grace).await;
        if finished {
            tracing::info!("Background tasks stopped");
        } else {
            tracing::warn!(
                remaining = self.supervisor.task_count(),
                "Background tasks still running after {:?}",
                self.options.shutdown_grace
            );
        }
        finished
    }
}

impl Recover for Service {
    fn recover(&self, backend: Backend) -> bool {
        let Some(binding) = self
            .bindings
            .iter()
            .find(|b| b.descriptor().backend == backend)
        else {
            return false;
        };
        // The reconnector's first attempt waits one period, so demoting right
        // after the supervisor accepts it cannot race an install.
        let launched = binding.launch_reconnector(
            &self.supervisor,
            self.readiness.clone(),
            self.shutdown.clone(),
        );
        if launched {
            self.readiness.set_ready(backend, false);
            tracing::warn!(%backend, "Backend demoted after failed probe, reconnecting");
        }
        launched
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::{
        core::{
            models::{
                Asset, ControllerTask, CustomerConfig, Entity, FtpInfo, ManualCounting, Page,
                Paged, Project, TaskStatus, VideocheckConfig,
            },
            reconnector::ReconnectOutcome,
        },
        utils::ShutdownReason,
    };

    #[derive(Default)]
    struct RecordingSink {
        samples: Mutex<Vec<(String, bool)>>,
    }

    impl GaugeSink for RecordingSink {
        fn set_service_up(&self, scope: &str, _destination: &str, up: bool) {
            self.samples.lock().unwrap().push((scope.to_string(), up));
        }
    }

    struct Stub;

    #[async_trait]
    impl Health for Stub {
        async fn health(&self) -> RepoResult<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl AssetRepo for Stub {
        async fn find_all(&self, _page: Page) -> RepoResult<Paged<Asset>> {
            Ok(Paged::empty())
        }
        async fn find_by_id(&self, _id: i64) -> RepoResult<Option<Asset>> {
            Ok(None)
        }
    }

    #[async_trait]
    impl CustomerRepo for Stub {
        async fn find_customer_configs(
            &self,
            _page: Page,
            _enabled: bool,
        ) -> RepoResult<Paged<CustomerConfig>> {
            Ok(Paged::empty())
        }
        async fn find_customer_config(&self, _id: i64) -> RepoResult<Option<CustomerConfig>> {
            Ok(None)
        }
        async fn find_projects(&self, _page: Page, _enabled: bool) -> RepoResult<Paged<Project>> {
            Ok(Paged::empty())
        }
        async fn find_project(
            &self,
            _id: i64,
            _db_type: Option<i32>,
        ) -> RepoResult<Option<Project>> {
            Ok(None)
        }
        async fn find_ftp(&self, _project_id: i64) -> RepoResult<Option<FtpInfo>> {
            Ok(None)
        }
        async fn find_manual_countings(
            &self,
            _project_id: i64,
            _controller_id: i64,
            _page: Page,
        ) -> RepoResult<Paged<ManualCounting>> {
            Ok(Paged::empty())
        }
        async fn find_videocheck_configs(
            &self,
            _page: Page,
        ) -> RepoResult<Paged<VideocheckConfig>> {
            Ok(Paged::empty())
        }
        async fn find_videocheck_config(
            &self,
            _project_id: i64,
        ) -> RepoResult<Option<VideocheckConfig>> {
            Ok(None)
        }
        async fn store_videocheck_config(&self, _config: &VideocheckConfig) -> RepoResult<()> {
            Ok(())
        }
        async fn upsert_videocheck_config(&self, _config: &VideocheckConfig) -> RepoResult<()> {
            Ok(())
        }
        async fn delete_videocheck_config(&self, _project_id: i64) -> RepoResult<u64> {
            Ok(0)
        }
    }

    #[async_trait]
    impl ReferenceRepo for Stub {
        async fn find_entities(&self, _page: Page) -> RepoResult<Paged<Entity>> {
            Ok(Paged::empty())
        }
        async fn find_entity(&self, _id: &str) -> RepoResult<Option<Entity>> {
            Ok(None)
        }
    }

    #[async_trait]
    impl ServiceDeskRepo for Stub {
        async fn find_tasks_by_serial(
            &self,
            _serial: &str,
            _page: Page,
        ) -> RepoResult<Paged<ControllerTask>> {
            Ok(Paged::empty())
        }
        async fn add_comment(&self, _task_id: &str, _comment: &str) -> RepoResult<()> {
            Ok(())
        }
        async fn set_status(&self, _task_id: &str, _status: &TaskStatus) -> RepoResult<()> {
            Ok(())
        }
    }

    /// Succeeds or fails every time, per `up`.
    struct Fixed {
        descriptor: BackendDescriptor,
        up: bool,
    }

    impl Fixed {
        fn new(backend: Backend, up: bool) -> Self {
            Self {
                descriptor: BackendDescriptor::new(
                    backend,
                    "server=stub;database=stub",
                    Duration::from_secs(1),
                ),
                up,
            }
        }

        fn build<T: ?Sized>(&self, capability: Arc<T>) -> RepoResult<Arc<T>> {
            if self.up {
                Ok(capability)
            } else {
                Err(RepoError::Connection("refused".into()))
            }
        }
    }

    macro_rules! fixed_connector {
        ($trait:ident) => {
            #[async_trait]
            impl Connector for FixedFor<dyn $trait> {
                type Capability = dyn $trait;

                fn descriptor(&self) -> &BackendDescriptor {
                    &self.0.descriptor
                }

                async fn connect(&self, _timeout: Duration) -> RepoResult<Arc<dyn $trait>> {
                    self.0.build(Arc::new(Stub) as Arc<dyn $trait>)
                }
            }
        };
    }

    struct FixedFor<T: ?Sized>(Fixed, std::marker::PhantomData<fn() -> Arc<T>>);

    impl<T: ?Sized> FixedFor<T> {
        fn new(backend: Backend, up: bool) -> Arc<Self> {
            Arc::new(Self(Fixed::new(backend, up), std::marker::PhantomData))
        }
    }

    fixed_connector!(AssetRepo);
    fixed_connector!(CustomerRepo);
    fixed_connector!(ReferenceRepo);
    fixed_connector!(ServiceDeskRepo);

    fn connectors(reference_up: bool) -> Connectors {
        Connectors {
            assets: FixedFor::<dyn AssetRepo>::new(Backend::Assets, true),
            customers: FixedFor::<dyn CustomerRepo>::new(Backend::Customers, true),
            reference: FixedFor::<dyn ReferenceRepo>::new(Backend::Reference, reference_up),
            service_desk: FixedFor::<dyn ServiceDeskRepo>::new(Backend::ServiceDesk, true),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_marks_reachable_backends_ready() {
        let shutdown = GracefulShutdown::new();
        let sink = Arc::new(RecordingSink::default());
        let service = Service::start(
            connectors(false),
            sink.clone(),
            ServiceOptions::default(),
            &shutdown,
        )
        .await;

        assert!(service.assets().is_some());
        assert!(service.customers().is_some());
        assert!(service.service_desk().is_some());
        assert!(service.reference().is_none());
        assert!(!service.is_ready(Backend::Reference));
        assert!(service.supervisor().is_reconnecting(Backend::Reference));

        let samples = sink.samples.lock().unwrap().clone();
        assert!(samples.contains(&("reference_db".to_string(), false)));
        assert!(samples.contains(&("assets_db".to_string(), true)));

        let report = service.health_report();
        assert!(!report.healthy);

        shutdown.trigger_shutdown(ShutdownReason::Graceful);
        assert!(service.shutdown().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recover_demotes_and_refuses_duplicates() {
        let shutdown = GracefulShutdown::new();
        let service = Service::start(
            connectors(false),
            Arc::new(RecordingSink::default()),
            ServiceOptions::default(),
            &shutdown,
        )
        .await;

        // Reference already has a reconnector from startup.
        assert!(!service.recover(Backend::Reference));

        assert!(service.is_ready(Backend::Assets));
        assert!(service.recover(Backend::Assets));
        assert!(!service.is_ready(Backend::Assets));
        assert!(service.assets().is_none());

        // The stub connector succeeds on the next tick.
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(service.is_ready(Backend::Assets));

        shutdown.trigger_shutdown(ShutdownReason::Graceful);
        assert!(service.shutdown().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refused_recovery_keeps_backend_ready() {
        let shutdown = GracefulShutdown::new();
        let service = Service::start(
            connectors(true),
            Arc::new(RecordingSink::default()),
            ServiceOptions::default(),
            &shutdown,
        )
        .await;

        // Another reconnector already holds the backend.
        let mut token = shutdown.shutdown_token();
        assert!(service.supervisor().spawn_reconnector(Backend::Assets, async move {
            token.wait_for_shutdown().await;
            ReconnectOutcome::Cancelled { attempts: 0 }
        }));

        assert!(!service.recover(Backend::Assets));
        assert!(service.is_ready(Backend::Assets));
        assert!(service.assets().is_some());

        shutdown.trigger_shutdown(ShutdownReason::Graceful);
        assert!(service.shutdown().await);
    }
}
