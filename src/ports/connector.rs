use std::{sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::{core::backend::BackendDescriptor, ports::repository::RepoResult};

/// Connector defines the port for constructing a live backend capability.
///
/// A connector is cheap and reusable: it only holds the descriptor. Each call
/// to [`Connector::connect`] opens a fresh pool or client and proves it works.
/// Failure is always recoverable; the caller decides whether to retry.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Capability produced by this connector, usually a `dyn` repository trait
    type Capability: ?Sized + Send + Sync + 'static;

    /// Target this connector dials, used for logs and metric labels
    fn descriptor(&self) -> &BackendDescriptor;

    /// Build the capability
    ///
    /// # Arguments
    /// * `timeout` - Upper bound for establishing the first session
    ///
    /// # Returns
    /// A ready-to-use capability, or the reason it could not be built
    async fn connect(&self, timeout: Duration) -> RepoResult<Arc<Self::Capability>>;
}
