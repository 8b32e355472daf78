//! Stub backends shared by the integration tests.
#![allow(dead_code)]

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use common_api::{
    core::{
        Backend, BackendDescriptor, Connectors,
        models::{
            Asset, ControllerTask, CustomerConfig, Entity, FtpInfo, ManualCounting, Page, Paged,
            Project, TaskStatus, VideocheckConfig,
        },
    },
    ports::{
        AssetRepo, Connector, CustomerRepo, GaugeSink, Health, ReferenceRepo, RepoError,
        RepoResult, ServiceDeskRepo,
    },
};

/// Records every gauge write.
#[derive(Default)]
pub struct RecordingSink {
    pub samples: Mutex<Vec<(String, String, bool)>>,
}

impl GaugeSink for RecordingSink {
    fn set_service_up(&self, scope: &str, destination: &str, up: bool) {
        self.samples
            .lock()
            .unwrap()
            .push((scope.to_string(), destination.to_string(), up));
    }
}

/// In-memory backend implementing every repository trait.
#[derive(Default)]
pub struct MemoryStore {
    pub assets: Vec<Asset>,
    pub projects: Vec<Project>,
    pub entities: Vec<Entity>,
    pub videochecks: Mutex<Vec<VideocheckConfig>>,
    pub comments: Mutex<Vec<(String, String)>>,
}

fn page_of<T: Clone>(items: &[T], page: Page) -> Paged<T> {
    let window = items
        .iter()
        .skip(page.offset as usize)
        .take(page.limit as usize)
        .cloned()
        .collect();
    Paged::new(window, items.len() as i64)
}

#[async_trait]
impl Health for MemoryStore {
    async fn health(&self) -> RepoResult<()> {
        Ok(())
    }
}

#[async_trait]
impl AssetRepo for MemoryStore {
    async fn find_all(&self, page: Page) -> RepoResult<Paged<Asset>> {
        Ok(page_of(&self.assets, page))
    }

    async fn find_by_id(&self, id: i64) -> RepoResult<Option<Asset>> {
        Ok(self.assets.iter().find(|a| a.id == id).cloned())
    }
}

#[async_trait]
impl CustomerRepo for MemoryStore {
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

    async fn find_projects(&self, page: Page, enabled: bool) -> RepoResult<Paged<Project>> {
        let matching: Vec<Project> = self
            .projects
            .iter()
            .filter(|p| p.is_enabled == enabled)
            .cloned()
            .collect();
        Ok(page_of(&matching, page))
    }

    async fn find_project(&self, id: i64, db_type: Option<i32>) -> RepoResult<Option<Project>> {
        Ok(self
            .projects
            .iter()
            .find(|p| p.id == id && db_type.is_none_or(|t| t == p.db_type))
            .cloned())
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

    async fn find_videocheck_configs(&self, page: Page) -> RepoResult<Paged<VideocheckConfig>> {
        Ok(page_of(&self.videochecks.lock().unwrap(), page))
    }

    async fn find_videocheck_config(
        &self,
        project_id: i64,
    ) -> RepoResult<Option<VideocheckConfig>> {
        Ok(self
            .videochecks
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.project_id == project_id)
            .cloned())
    }

    async fn store_videocheck_config(&self, config: &VideocheckConfig) -> RepoResult<()> {
        let mut configs = self.videochecks.lock().unwrap();
        if configs.iter().any(|c| c.project_id == config.project_id) {
            return Err(RepoError::Query("duplicate project_id".into()));
        }
        configs.push(config.clone());
        Ok(())
    }

    async fn upsert_videocheck_config(&self, config: &VideocheckConfig) -> RepoResult<()> {
        let mut configs = self.videochecks.lock().unwrap();
        configs.retain(|c| c.project_id != config.project_id);
        configs.push(config.clone());
        Ok(())
    }

    async fn delete_videocheck_config(&self, project_id: i64) -> RepoResult<u64> {
        let mut configs = self.videochecks.lock().unwrap();
        let before = configs.len();
        configs.retain(|c| c.project_id != project_id);
        Ok((before - configs.len()) as u64)
    }
}

#[async_trait]
impl ReferenceRepo for MemoryStore {
    async fn find_entities(&self, page: Page) -> RepoResult<Paged<Entity>> {
        Ok(page_of(&self.entities, page))
    }

    async fn find_entity(&self, id: &str) -> RepoResult<Option<Entity>> {
        Ok(self.entities.iter().find(|e| e.id == id).cloned())
    }
}

#[async_trait]
impl ServiceDeskRepo for MemoryStore {
    async fn find_tasks_by_serial(
        &self,
        _serial: &str,
        _page: Page,
    ) -> RepoResult<Paged<ControllerTask>> {
        Ok(Paged::empty())
    }

    async fn add_comment(&self, task_id: &str, comment: &str) -> RepoResult<()> {
        self.comments
            .lock()
            .unwrap()
            .push((task_id.to_string(), comment.to_string()));
        Ok(())
    }

    async fn set_status(&self, _task_id: &str, _status: &TaskStatus) -> RepoResult<()> {
        Ok(())
    }
}

/// Connector that refuses the first `fail_first` attempts.
pub struct StubConnector<T: ?Sized> {
    descriptor: BackendDescriptor,
    capability: Arc<T>,
    fail_first: u32,
    attempts: AtomicU32,
}

impl<T: ?Sized> StubConnector<T> {
    pub fn new(backend: Backend, capability: Arc<T>, fail_first: u32, period: Duration) -> Self {
        Self {
            descriptor: BackendDescriptor::new(
                backend,
                format!("server=stub-{backend};database=stub"),
                period,
            ),
            capability,
            fail_first,
            attempts: AtomicU32::new(0),
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<T: ?Sized + Send + Sync + 'static> Connector for StubConnector<T> {
    type Capability = T;

    fn descriptor(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    async fn connect(&self, _timeout: Duration) -> RepoResult<Arc<T>> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.fail_first {
            Err(RepoError::Connection(format!("attempt {attempt} refused")))
        } else {
            Ok(self.capability.clone())
        }
    }
}

/// Connectors over one shared store, all succeeding at the first attempt
/// except the backends listed in `down`, which never come up within a test.
pub fn connectors(store: Arc<MemoryStore>, down: &[Backend]) -> Connectors {
    let period = Duration::from_secs(30);
    let fail = |backend: Backend| if down.contains(&backend) { u32::MAX } else { 0 };
    Connectors {
        assets: Arc::new(StubConnector::<dyn AssetRepo>::new(
            Backend::Assets,
            store.clone(),
            fail(Backend::Assets),
            period,
        )),
        customers: Arc::new(StubConnector::<dyn CustomerRepo>::new(
            Backend::Customers,
            store.clone(),
            fail(Backend::Customers),
            period,
        )),
        reference: Arc::new(StubConnector::<dyn ReferenceRepo>::new(
            Backend::Reference,
            store.clone(),
            fail(Backend::Reference),
            period,
        )),
        service_desk: Arc::new(StubConnector::<dyn ServiceDeskRepo>::new(
            Backend::ServiceDesk,
            store,
            fail(Backend::ServiceDesk),
            period,
        )),
    }
}
