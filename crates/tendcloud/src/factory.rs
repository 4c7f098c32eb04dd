//! Gateway factory for the configured provider backend

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tendcloud_core::{CoreError, GatewayFactory, ProviderSettings};
use tendcloud_provider::{CacheGateway, QueueGateway, RelationalGateway, SimCloud};
use tokio::sync::Mutex;
use tracing::info;

use crate::config::{ProviderBackend, ProviderConfig};

/// Hands out simulated clouds, one per region, kept for the daemon's lifetime
pub struct SimGatewayFactory {
    settle_polls: u32,
    regions: Mutex<HashMap<String, Arc<SimCloud>>>,
}

impl SimGatewayFactory {
    pub fn new(settle_polls: u32) -> Self {
        Self {
            settle_polls,
            regions: Mutex::new(HashMap::new()),
        }
    }

    async fn cloud(&self, settings: &ProviderSettings) -> Result<Arc<SimCloud>, CoreError> {
        if settings.region.is_empty() {
            return Err(CoreError::Config("provider region is not set".to_string()));
        }

        let mut regions = self.regions.lock().await;
        let cloud = regions.entry(settings.region.clone()).or_insert_with(|| {
            info!(region = %settings.region, "starting simulated cloud");
            Arc::new(SimCloud::with_settle_polls(self.settle_polls))
        });
        Ok(Arc::clone(cloud))
    }
}

#[async_trait]
impl GatewayFactory for SimGatewayFactory {
    async fn queue(&self, settings: &ProviderSettings) -> Result<Arc<dyn QueueGateway>, CoreError> {
        Ok(self.cloud(settings).await?)
    }

    async fn relational(
        &self,
        settings: &ProviderSettings,
    ) -> Result<Arc<dyn RelationalGateway>, CoreError> {
        Ok(self.cloud(settings).await?)
    }

    async fn cache(&self, settings: &ProviderSettings) -> Result<Arc<dyn CacheGateway>, CoreError> {
        Ok(self.cloud(settings).await?)
    }
}

/// Build the factory for the configured backend
pub fn create_factory(config: &ProviderConfig) -> Arc<dyn GatewayFactory> {
    match config.backend {
        ProviderBackend::Simulated => Arc::new(SimGatewayFactory::new(config.settle_polls)),
    }
}
