//! Reconciliation passes
//!
//! A pass loads the desired state, lists the existing clusters of every
//! configured family (aborting on listing failures or duplicate names), then
//! converges the families in order: queue, relational, cache.

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use chrono::Utc;
use tendcloud_api::pass::PassResult;
use tendcloud_provider::{CacheGateway, QueueGateway, RelationalGateway};
use tracing::{error, info, instrument};

use crate::config::{DesiredState, ProviderSettings};
use crate::engine::{Engine, Report};
use crate::error::CoreError;
use crate::family::{CacheFamily, QueueFamily, RelationalFamily};
use crate::resource::ResourceKind;
use crate::waiter::Poller;

/// Where the desired state comes from
#[async_trait]
pub trait DesiredSource: Send + Sync {
    /// Read and parse the desired state
    async fn load(&self) -> Result<DesiredState, CoreError>;

    /// Last modification time of the desired state
    async fn modified(&self) -> Result<SystemTime, CoreError>;
}

/// Factory trait for provider gateways
///
/// Allows injection of real or simulated providers per region.
#[async_trait]
pub trait GatewayFactory: Send + Sync {
    async fn queue(&self, settings: &ProviderSettings)
    -> Result<Arc<dyn QueueGateway>, CoreError>;

    async fn relational(
        &self,
        settings: &ProviderSettings,
    ) -> Result<Arc<dyn RelationalGateway>, CoreError>;

    async fn cache(&self, settings: &ProviderSettings)
    -> Result<Arc<dyn CacheGateway>, CoreError>;
}

/// A cluster family together with its child families
#[async_trait]
pub trait FamilyPass: Send + Sync {
    fn kind(&self) -> ResourceKind;

    /// List existing clusters; errors abort the pass before any mutation
    async fn fetch(&mut self, engine: &Engine) -> Result<(), CoreError>;

    /// Converge the clusters, then the children of serving clusters
    async fn reconcile(&self, engine: &Engine, report: &mut Report);
}

/// Runs complete reconciliation passes
pub struct Reconciler {
    source: Arc<dyn DesiredSource>,
    factory: Arc<dyn GatewayFactory>,
    engine: Engine,
}

impl Reconciler {
    #[must_use]
    pub fn new(
        source: Arc<dyn DesiredSource>,
        factory: Arc<dyn GatewayFactory>,
        poller: Poller,
    ) -> Self {
        Self {
            source,
            factory,
            engine: Engine::new(poller),
        }
    }

    #[must_use]
    pub fn source(&self) -> &dyn DesiredSource {
        self.source.as_ref()
    }

    /// Run one pass and report what happened
    ///
    /// A fatal error stops the pass; messages emitted before it are kept.
    #[instrument(skip(self))]
    pub async fn run_pass(&self) -> PassResult {
        let started_at = Utc::now();
        let mut report = Report::new();

        let error = match self.run(&mut report).await {
            Ok(()) => None,
            Err(e) => {
                error!(error = %e, "pass aborted");
                Some(e.to_string())
            }
        };

        PassResult {
            started_at,
            finished_at: Utc::now(),
            error,
            messages: report.into_messages(),
        }
    }

    async fn run(&self, report: &mut Report) -> Result<(), CoreError> {
        let state = self.source.load().await?;
        let mut families = self.families(&state).await?;

        for family in &mut families {
            family.fetch(&self.engine).await?;
        }
        for family in &families {
            info!(kind = %family.kind(), "reconciling family");
            family.reconcile(&self.engine, report).await;
        }
        Ok(())
    }

    async fn families(&self, state: &DesiredState) -> Result<Vec<Box<dyn FamilyPass>>, CoreError> {
        let provider = &state.provider;
        let poller = *self.engine.poller();
        let mut families: Vec<Box<dyn FamilyPass>> = Vec::new();

        if let Some(section) = &state.queue {
            let gateway = self.factory.queue(provider).await?;
            families.push(Box::new(QueueFamily::new(
                gateway,
                provider.clone(),
                section.clone(),
                poller,
            )));
        }
        if let Some(section) = &state.relational {
            let gateway = self.factory.relational(provider).await?;
            families.push(Box::new(RelationalFamily::new(
                gateway,
                provider.clone(),
                section.clone(),
            )));
        }
        if let Some(section) = &state.cache {
            let gateway = self.factory.cache(provider).await?;
            families.push(Box::new(CacheFamily::new(
                gateway,
                provider.clone(),
                section.clone(),
            )));
        }

        Ok(families)
    }
}
