pub mod asset_repo;
pub mod connectors;
pub mod customer_repo;
pub mod health_checker;
pub mod http;
pub mod middleware;
pub mod mssql;
pub mod reference_repo;
pub mod service_desk_api;
pub mod service_registry;

/// Re-export commonly used types from adapters
pub use health_checker::HealthAggregator;
pub use http::{AppState, router};
pub use service_registry::ServiceRegistry;
