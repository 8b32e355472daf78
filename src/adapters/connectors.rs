use std::sync::Arc;

use eyre::Result;

use crate::{
    adapters::{
        asset_repo::AssetConnector, customer_repo::CustomerConnector,
        reference_repo::ReferenceConnector, service_desk_api::ServiceDeskConnector,
    },
    config::{ServerConfig, ServerConfigValidator},
    core::{Connectors, backend::Backend},
};

impl Connectors {
    /// Production connectors for every backend named in `config`.
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        ServerConfigValidator::validate(config)?;
        Ok(Self {
            assets: Arc::new(AssetConnector::new(config.descriptor(Backend::Assets))),
            customers: Arc::new(CustomerConnector::new(config.descriptor(Backend::Customers))),
            reference: Arc::new(ReferenceConnector::new(config.descriptor(Backend::Reference))),
            service_desk: Arc::new(ServiceDeskConnector::from_config(&config.service_desk)),
        })
    }
}
