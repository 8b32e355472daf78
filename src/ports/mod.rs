pub mod connector;
pub mod metrics_sink;
pub mod repository;

pub use connector::Connector;
pub use metrics_sink::GaugeSink;
pub use repository::{
    AssetRepo, CustomerRepo, Health, ReferenceRepo, RepoError, RepoResult, ServiceDeskRepo,
};
