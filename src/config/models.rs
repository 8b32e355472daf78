//! Configuration data structures for common-api.
//!
//! These types map directly to TOML (also JSON / YAML) configuration files and
//! to `COMMONAPI__SECTION__KEY` environment overrides. Every section carries
//! defaults so a minimal file only needs the backend DSNs.
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::backend::{Backend, BackendDescriptor};

fn default_listen_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_sql_timeout_secs() -> u64 {
    30
}

/// HTTP server settings
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct HttpdConfig {
    pub listen_addr: String,
    /// Origins allowed by CORS; empty means any origin
    pub allow_origins: Vec<String>,
    /// Bearer token required on secured routes; secured routes reject every
    /// request when unset
    pub token: Option<String>,
    /// How long shutdown waits for background tasks
    pub shutdown_grace_secs: u64,
}

impl Default for HttpdConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            allow_origins: Vec::new(),
            token: None,
            shutdown_grace_secs: 10,
        }
    }
}

/// Settings of one SQL backend
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct SqlBackendConfig {
    /// ADO-style DSN (`server=...;user id=...;password=...;port=...;database=...`)
    /// or, for the reference store only, a `postgres://` URL
    pub dsn: String,
    /// Query timeout; also the reconnection period after a failed start
    #[serde(default = "default_sql_timeout_secs")]
    pub sql_timeout_secs: u64,
}

impl SqlBackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.sql_timeout_secs)
    }
}

/// Settings of the ticketing HTTP API
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ServiceDeskConfig {
    pub url: String,
    pub user: String,
    pub pass: String,
    pub http_timeout_secs: u64,
}

impl Default for ServiceDeskConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            user: String::new(),
            pass: String::new(),
            http_timeout_secs: 30,
        }
    }
}

impl ServiceDeskConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct HealthCheckConfig {
    pub interval_secs: u64,
    /// Demote a ready backend that fails its probe and reconnect it.
    /// Off by default: a failing probe only lowers the gauges.
    pub reconnect_on_failure: bool,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            reconnect_on_failure: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
    /// JSON lines when true, pretty console output otherwise
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

/// Optional Consul agent registration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ConsulConfig {
    pub enabled: bool,
    /// Agent base URL
    pub address: String,
    pub service_name: String,
    /// Defaults to `<service_name>-<advertise_address>`
    pub service_id: Option<String>,
    /// `host:port` other services reach this instance on; defaults to the
    /// listen address
    pub advertise_address: Option<String>,
    pub check_interval_secs: u64,
}

impl Default for ConsulConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: "http://127.0.0.1:8500".to_string(),
            service_name: "commonapi".to_string(),
            service_id: None,
            advertise_address: None,
            check_interval_secs: 10,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ServerConfig {
    #[serde(default)]
    pub httpd: HttpdConfig,
    #[serde(default)]
    pub assets: SqlBackendConfig,
    #[serde(default)]
    pub customers: SqlBackendConfig,
    #[serde(default)]
    pub reference: SqlBackendConfig,
    #[serde(default)]
    pub service_desk: ServiceDeskConfig,
    #[serde(default)]
    pub health_check: HealthCheckConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub consul: ConsulConfig,
}

impl ServerConfig {
    /// Create a new server configuration builder
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Descriptor of every backend, in [`Backend::ALL`] order.
    pub fn descriptors(&self) -> Vec<BackendDescriptor> {
        Backend::ALL
            .into_iter()
            .map(|backend| self.descriptor(backend))
            .collect()
    }

    pub fn descriptor(&self, backend: Backend) -> BackendDescriptor {
        match backend {
            Backend::Assets => {
                BackendDescriptor::new(backend, &self.assets.dsn, self.assets.timeout())
            }
            Backend::Customers => {
                BackendDescriptor::new(backend, &self.customers.dsn, self.customers.timeout())
            }
            Backend::Reference => {
                BackendDescriptor::new(backend, &self.reference.dsn, self.reference.timeout())
            }
            Backend::ServiceDesk => BackendDescriptor::new(
                backend,
                &self.service_desk.url,
                self.service_desk.timeout(),
            ),
        }
    }
}

/// Builder for ServerConfig, mostly used by tests and embedders
#[derive(Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    /// Set the listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.httpd.listen_addr = addr.into();
        self
    }

    /// Set the bearer token for secured routes
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.config.httpd.token = Some(token.into());
        self
    }

    pub fn assets_dsn(mut self, dsn: impl Into<String>, timeout_secs: u64) -> Self {
        self.config.assets = SqlBackendConfig {
            dsn: dsn.into(),
            sql_timeout_secs: timeout_secs,
        };
        self
    }

    pub fn customers_dsn(mut self, dsn: impl Into<String>, timeout_secs: u64) -> Self {
        self.config.customers = SqlBackendConfig {
            dsn: dsn.into(),
            sql_timeout_secs: timeout_secs,
        };
        self
    }

    pub fn reference_dsn(mut self, dsn: impl Into<String>, timeout_secs: u64) -> Self {
        self.config.reference = SqlBackendConfig {
            dsn: dsn.into(),
            sql_timeout_secs: timeout_secs,
        };
        self
    }

    pub fn service_desk(
        mut self,
        url: impl Into<String>,
        user: impl Into<String>,
        pass: impl Into<String>,
    ) -> Self {
        self.config.service_desk.url = url.into();
        self.config.service_desk.user = user.into();
        self.config.service_desk.pass = pass.into();
        self
    }

    /// Set health check configuration
    pub fn health_check(mut self, health_check: HealthCheckConfig) -> Self {
        self.config.health_check = health_check;
        self
    }

    /// Build the server configuration
    pub fn build(self) -> ServerConfig {
        self.config
    }
}
