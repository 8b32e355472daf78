//! Consul agent registration.
//!
//! Registration is best effort: every failure is logged and the gateway keeps
//! serving.
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;

use crate::config::ConsulConfig;

const AGENT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentCheck {
    #[serde(rename = "HTTP")]
    pub http: String,
    pub interval: String,
    pub timeout: String,
    pub deregister_critical_service_after: String,
}

/// Body of `PUT /v1/agent/service/register`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentRegistration {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    pub address: String,
    pub port: u16,
    pub tags: Vec<String>,
    pub check: AgentCheck,
}

pub struct ServiceRegistry {
    client: Client,
    agent: String,
    registration: AgentRegistration,
}

/// Split `host:port`; a bare or unspecified host falls back to localhost.
fn split_host_port(addr: &str) -> Option<(String, u16)> {
    let (host, port) = addr.rsplit_once(':')?;
    let port = port.parse::<u16>().ok()?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let host = match host {
        "" | "0.0.0.0" | "::" => "127.0.0.1",
        other => other,
    };
    Some((host.to_string(), port))
}

impl ServiceRegistry {
    /// Build the registration, or `None` when Consul is disabled or the
    /// advertised address cannot be parsed.
    pub fn from_config(config: &ConsulConfig, listen_addr: &str) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let advertise = config.advertise_address.as_deref().unwrap_or(listen_addr);
        let Some((address, port)) = split_host_port(advertise) else {
            tracing::warn!(%advertise, "Consul registration skipped, bad advertise address");
            return None;
        };
        let client = match Client::builder().timeout(AGENT_TIMEOUT).build() {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!(error = %e, "Consul registration skipped, client build failed");
                return None;
            }
        };

        let id = config
            .service_id
            .clone()
            .unwrap_or_else(|| format!("{}-{address}-{port}", config.service_name));
        let interval = format!("{}s", config.check_interval_secs.max(1));
        let registration = AgentRegistration {
            id,
            name: config.service_name.clone(),
            address: address.clone(),
            port,
            tags: vec![format!("v{}", env!("CARGO_PKG_VERSION"))],
            check: AgentCheck {
                http: format!("http://{address}:{port}/health"),
                timeout: interval.clone(),
                interval,
                deregister_critical_service_after: "10m".to_string(),
            },
        };

        Some(Self {
            client,
            agent: config.address.trim_end_matches('/').to_string(),
            registration,
        })
    }

    pub fn registration(&self) -> &AgentRegistration {
        &self.registration
    }

    pub async fn register(&self) {
        let url = format!("{}/v1/agent/service/register", self.agent);
        match self.client.put(&url).json(&self.registration).send().await {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!(service_id = %self.registration.id, agent = %self.agent, "Registered in Consul");
            }
            Ok(resp) => {
                tracing::warn!(status = resp.status().as_u16(), agent = %self.agent, "Consul rejected registration");
            }
            Err(e) => tracing::warn!(error = %e, agent = %self.agent, "Consul registration failed"),
        }
    }

    pub async fn deregister(&self) {
        let url = format!(
            "{}/v1/agent/service/deregister/{}",
            self.agent, self.registration.id
        );
        match self.client.put(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!(service_id = %self.registration.id, "Deregistered from Consul");
            }
            Ok(resp) => {
                tracing::warn!(status = resp.status().as_u16(), "Consul rejected deregistration");
            }
            Err(e) => tracing::warn!(error = %e, "Consul deregistration failed"),
        }
    }
}
