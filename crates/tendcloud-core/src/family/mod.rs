//! Resource families
//!
//! A [`Family`] knows how to list, validate, create, modify and tag one kind
//! of resource. The generic executors in [`crate::executor`] drive it. Cluster
//! families also implement [`crate::pass::FamilyPass`] to run their own child
//! families once the clusters are serving.

pub mod cache;
pub mod cache_account;
pub mod database;
pub mod db_account;
pub mod group;
pub mod queue;
pub mod relational;
pub mod topic;

use std::fmt;

use async_trait::async_trait;

use tendcloud_provider::ProviderError;

use crate::config::ProviderSettings;
use crate::resource::{DesiredResource, ExistingResource, ResourceKind, Target};
use crate::validate::Checks;

pub use cache::CacheFamily;
pub use cache_account::CacheAccountFamily;
pub use database::DatabaseFamily;
pub use db_account::DbAccountFamily;
pub use group::GroupFamily;
pub use queue::QueueFamily;
pub use relational::RelationalFamily;
pub use topic::TopicFamily;

/// Phase a follow-up step belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Create,
    Modify,
}

/// One named provider mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step<A> {
    /// Step key reported in outcome maps
    pub key: &'static str,
    pub action: A,
}

impl<A> Step<A> {
    pub fn new(key: &'static str, action: A) -> Self {
        Self { key, action }
    }
}

/// Status handling for resources that go through provider-side transitions
#[async_trait]
pub trait Lifecycle: Send + Sync {
    /// Current status, or `None` when the provider no longer lists the resource
    async fn status(&self, id: &str) -> Result<Option<String>, ProviderError>;

    /// Whether `status` accepts configuration changes
    fn is_serving(&self, status: &str) -> bool;

    /// Bring a non-serving resource up before it is modified
    async fn start(&self, _target: &Target) -> Result<(), ProviderError> {
        Ok(())
    }

    /// Run right after creation, before the first wait
    ///
    /// Returns an outcome message to record under the `deploy` step.
    async fn deploy(&self, _target: &Target) -> Result<Option<String>, ProviderError> {
        Ok(None)
    }

    /// Apply ownership markers once a created resource is serving
    ///
    /// Returns an outcome message to record under the `create-tag` step.
    async fn claim(&self, _target: &Target) -> Result<Option<String>, ProviderError> {
        Ok(None)
    }
}

/// Declarative operations of one resource family
#[async_trait]
pub trait Family: Send + Sync {
    type Spec: fmt::Debug + Send + Sync;
    type Snapshot: fmt::Debug + Send + Sync;
    type Action: fmt::Debug + Send + Sync;

    fn kind(&self) -> ResourceKind;

    /// Existing resources owned by this controller
    async fn list(&self) -> Result<Vec<ExistingResource<Self::Snapshot>>, ProviderError>;

    /// Reason why `existing` cannot be brought to `desired` in place
    fn immutable_conflict(
        &self,
        _desired: &DesiredResource<Self::Spec>,
        _existing: &ExistingResource<Self::Snapshot>,
    ) -> Option<String> {
        None
    }

    /// Pre-flight checks for a resource about to be created
    fn check_create(&self, desired: &DesiredResource<Self::Spec>, checks: &mut Checks);

    /// Pre-flight checks for a resource about to be modified
    fn check_modify(
        &self,
        desired: &DesiredResource<Self::Spec>,
        _existing: &ExistingResource<Self::Snapshot>,
        checks: &mut Checks,
    ) {
        self.check_create(desired, checks);
    }

    /// Whether every mutable field already matches
    fn is_unchanged(
        &self,
        desired: &DesiredResource<Self::Spec>,
        existing: &ExistingResource<Self::Snapshot>,
    ) -> bool;

    /// Tag a resource for manual removal
    async fn mark_removing(
        &self,
        existing: &ExistingResource<Self::Snapshot>,
    ) -> Result<(), ProviderError>;

    /// Create a resource and return its provider id
    async fn create(&self, desired: &DesiredResource<Self::Spec>) -> Result<String, ProviderError>;

    /// Ordered mutations bringing `existing` to `desired`
    ///
    /// Each step is followed by a serving wait for families with a lifecycle.
    /// The first failing step stops the rest.
    fn plan_modify(
        &self,
        desired: &DesiredResource<Self::Spec>,
        existing: &ExistingResource<Self::Snapshot>,
    ) -> Vec<Step<Self::Action>>;

    /// Independent steps run after the main phase succeeded
    fn plan_followups(
        &self,
        _phase: Phase,
        _desired: &DesiredResource<Self::Spec>,
    ) -> Vec<Step<Self::Action>> {
        Vec::new()
    }

    /// Run one step and return its outcome message
    async fn apply(
        &self,
        target: &Target,
        desired: &DesiredResource<Self::Spec>,
        action: &Self::Action,
    ) -> Result<String, ProviderError>;

    /// Status handling, if the family has provider-side transitions
    fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        None
    }
}

/// Require the placement every cluster create needs
pub(crate) fn check_placement(provider: &ProviderSettings, checks: &mut Checks) {
    checks.require(provider.primary_zone().is_some(), "check-zone", || {
        "no availability zone configured.".to_string()
    });
    checks.require(
        !provider.vpc.id.is_empty() && provider.vswitch().is_some(),
        "check-network",
        || "no vpc or vswitch configured.".to_string(),
    );
}

/// Logical names configured exactly once, in configuration order
pub(crate) fn unique_names<'a, T>(
    items: &'a [T],
    name: impl Fn(&'a T) -> &'a str,
) -> Vec<&'a str> {
    let names: Vec<&str> = items.iter().map(name).collect();
    names
        .iter()
        .filter(|n| names.iter().filter(|m| m == n).count() == 1)
        .copied()
        .collect()
}
