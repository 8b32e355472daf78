pub mod backend;
pub mod health;
pub mod models;
pub mod readiness;
pub mod reconnector;
pub mod service;
pub mod slot;
pub mod supervisor;

pub use backend::{Backend, BackendDescriptor};
pub use health::{HealthReport, HealthState, ProbeTarget};
pub use readiness::ReadinessRegistry;
pub use reconnector::{ReconnectOutcome, Reconnector};
pub use service::{Connectors, Service, ServiceOptions};
pub use slot::BackendSlot;
pub use supervisor::{Recover, Supervisor};
