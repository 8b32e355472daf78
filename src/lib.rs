//! common-api - a REST gateway over heterogeneous business backends.
//!
//! The service exposes one HTTP surface over four independently failing
//! backends: an asset store and a business-configuration store (both SQL
//! Server), a reference store (SQL Server or PostgreSQL, picked from the DSN)
//! and a remote ticketing HTTP API. Every endpoint maps onto a single backend
//! query or command.
//!
//! # Backend lifecycle
//! - Every backend is constructed at startup. A backend that cannot be reached
//!   is marked *not ready* and handed to a [`core::Reconnector`] which polls
//!   at a fixed period until construction succeeds, then installs the live
//!   handle and flips the ready flag.
//! - The [`core::ReadinessRegistry`] is the single source of truth the HTTP
//!   layer consults before dispatching. Requests against a backend that is not
//!   ready receive `503 Service Unavailable`.
//! - The [`adapters::HealthAggregator`] probes every ready backend on a fixed
//!   tick, publishes a `service_up` gauge per backend plus a composite
//!   `general` gauge, and keeps the last report for `GET /health`.
//!
//! # Architecture
//! The crate separates **ports** (traits) from **adapters** (implementations)
//! while keeping the lifecycle logic inside `core`.
//!
//! # Quick Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use common_api::{
//!     config::loader::load_config, core::{Connectors, Service, ServiceOptions},
//!     metrics::PrometheusSink, utils::GracefulShutdown,
//! };
//!
//! # #[tokio::main] async fn main() -> eyre::Result<()> {
//! let cfg = load_config("config.toml").await?;
//! let shutdown = GracefulShutdown::new();
//! let connectors = Connectors::from_config(&cfg)?;
//! let service = Service::start(
//!     connectors,
//!     Arc::new(PrometheusSink::default()),
//!     ServiceOptions::from_config(&cfg),
//!     &shutdown,
//! )
//! .await;
//! // Handlers fetch live handles through the service; `None` means "not ready yet".
//! let _assets = service.assets();
//! # Ok(()) }
//! ```
//!
//! # Error Handling
//! Backend operations return [`ports::repository::RepoError`]; application
//! glue returns `eyre::Result<T>` with context attached through `WrapErr`.
pub mod config;
pub mod metrics;
pub mod ports;
pub mod tracing_setup;
pub mod utils;

pub mod adapters;
pub mod core;

pub use crate::{
    adapters::HealthAggregator,
    core::{Backend, Connectors, ReadinessRegistry, Service},
    utils::GracefulShutdown,
};
