use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::{Map, Value};

use crate::{
    config::ServiceDeskConfig,
    core::{
        backend::{Backend, BackendDescriptor},
        models::{ControllerTask, Page, Paged, TaskStatus},
    },
    ports::{
        connector::Connector,
        repository::{Health, RepoError, RepoResult, ServiceDeskRepo},
    },
};

/// Idle keep-alive connections kept per ticketing host.
const MAX_IDLE_PER_HOST: usize = 10;

/// Client of the ticketing system's REST API (basic auth, JSON bodies).
#[derive(Clone)]
pub struct ServiceDeskApi {
    base_url: String,
    user: String,
    pass: String,
    client: Client,
}

impl ServiceDeskApi {
    /// Build the client. No request is sent: reachability is only proven by
    /// the first probe.
    pub fn new(
        base_url: impl Into<String>,
        user: impl Into<String>,
        pass: impl Into<String>,
        timeout: Duration,
    ) -> RepoResult<Self> {
        // The ticketing host serves a certificate for a different name.
        let client = Client::builder()
            .danger_accept_invalid_certs(true)
            .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
            .pool_idle_timeout(timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user: user.into(),
            pass: pass.into(),
            client,
        })
    }

    fn task_url(&self, task_id: &str) -> String {
        format!("{}/api/task/{task_id}", self.base_url)
    }

    async fn put_task(&self, task_id: &str, body: &Map<String, Value>) -> RepoResult<()> {
        let url = self.task_url(task_id);
        let response = self
            .client
            .put(&url)
            .basic_auth(&self.user, Some(&self.pass))
            .header(reqwest::header::ACCEPT, "application/json")
            .json(body)
            .send()
            .await?;
        expect_ok(response, &url).await?;
        Ok(())
    }
}

/// Map any status other than 200 to [`RepoError::Status`] carrying the body.
async fn expect_ok(response: Response, url: &str) -> RepoResult<Response> {
    let status = response.status();
    if status == StatusCode::OK {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::warn!(target_url = %url, status = status.as_u16(), body = %body, "Ticketing API rejected request");
    Err(RepoError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Body of a status change. Values are sent as strings, as the ticketing API
/// expects.
pub fn status_body(status: &TaskStatus) -> Map<String, Value> {
    let mut body = Map::new();
    if !status.comment.is_empty() {
        body.insert("Comment".into(), Value::String(status.comment.clone()));
        body.insert(
            "IsPrivateComment".into(),
            Value::String(status.is_private_comment.to_string()),
        );
    }
    if status.status_id != 0 {
        body.insert("StatusId".into(), Value::String(status.status_id.to_string()));
    }
    if !status.result_field_name.is_empty() {
        body.insert(
            status.result_field_name.clone(),
            Value::String(status.result_field_value.clone()),
        );
    }
    body
}

/// Extract `Paginator.Count` and the task list; each task is kept as its
/// serialized JSON text.
pub fn parse_task_search(payload: &Value) -> RepoResult<Paged<ControllerTask>> {
    let total = payload
        .get("Paginator")
        .and_then(|p| p.get("Count"))
        .and_then(|c| c.as_f64())
        .ok_or_else(|| RepoError::Decode("missing Paginator.Count".into()))?;
    let tasks = payload
        .get("Tasks")
        .and_then(Value::as_array)
        .ok_or_else(|| RepoError::Decode("missing Tasks array".into()))?;

    let items = tasks
        .iter()
        .map(|task| ControllerTask {
            task: task.to_string(),
        })
        .collect();
    Ok(Paged::new(items, total as i64))
}

#[async_trait]
impl Health for ServiceDeskApi {
    async fn health(&self) -> RepoResult<()> {
        let url = format!("{}/api/tasktype", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("fields", "Id")])
            .basic_auth(&self.user, Some(&self.pass))
            .send()
            .await?;
        expect_ok(response, &url).await?;
        Ok(())
    }
}

#[async_trait]
impl ServiceDeskRepo for ServiceDeskApi {
    async fn find_tasks_by_serial(
        &self,
        serial: &str,
        page: Page,
    ) -> RepoResult<Paged<ControllerTask>> {
        let url = format!("{}/api/task", self.base_url);
        let page_size = page.limit.to_string();
        let response = self
            .client
            .get(&url)
            .query(&[("search", serial), ("pagesize", page_size.as_str()), ("page", "1")])
            .basic_auth(&self.user, Some(&self.pass))
            .send()
            .await?;
        let payload: Value = expect_ok(response, &url).await?.json().await?;
        parse_task_search(&payload)
    }

    async fn add_comment(&self, task_id: &str, comment: &str) -> RepoResult<()> {
        let mut body = Map::new();
        body.insert("Comment".into(), Value::String(comment.to_string()));
        self.put_task(task_id, &body).await
    }

    async fn set_status(&self, task_id: &str, status: &TaskStatus) -> RepoResult<()> {
        self.put_task(task_id, &status_body(status)).await
    }
}

pub struct ServiceDeskConnector {
    descriptor: BackendDescriptor,
    user: String,
    pass: String,
}

impl ServiceDeskConnector {
    pub fn from_config(config: &ServiceDeskConfig) -> Self {
        Self {
            descriptor: BackendDescriptor::new(
                Backend::ServiceDesk,
                config.url.clone(),
                config.timeout(),
            ),
            user: config.user.clone(),
            pass: config.pass.clone(),
        }
    }
}

#[async_trait]
impl Connector for ServiceDeskConnector {
    type Capability = dyn ServiceDeskRepo;

    fn descriptor(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    async fn connect(&self, timeout: Duration) -> RepoResult<Arc<dyn ServiceDeskRepo>> {
        let api = ServiceDeskApi::new(&self.descriptor.target, &self.user, &self.pass, timeout)?;
        Ok(Arc::new(api))
    }
}
