//! Sharded cache clusters

use std::sync::Arc;

use async_trait::async_trait;
use tendcloud_provider::tags::ownership_tags;
use tendcloud_provider::types::{CacheInstance, NewCacheInstance, cache_status};
use tendcloud_provider::{CacheGateway, ProviderError, Tag, TagsExt};
use tracing::warn;

use super::cache_account::{self, CacheAccountFamily};
use super::{Family, Lifecycle, Phase, Step, check_placement, unique_names};
use crate::config::{CacheSection, ProviderSettings};
use crate::engine::{Engine, Report, Scope};
use crate::error::CoreError;
use crate::outcome::success;
use crate::pass::FamilyPass;
use crate::resource::{DesiredResource, ExistingResource, ResourceKind, Target};
use crate::validate::Checks;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSpec {
    pub shard_class: String,
    pub shard_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSnapshot {
    pub shard_class: String,
    pub shard_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheAction {
    ShardClass,
    /// Grow by this many shards
    AddShards(u32),
    Whitelist,
    ResetPassword,
}

pub struct CacheFamily {
    gateway: Arc<dyn CacheGateway>,
    provider: ProviderSettings,
    section: CacheSection,
    existing: Vec<ExistingResource<CacheSnapshot>>,
}

impl CacheFamily {
    #[must_use]
    pub fn new(
        gateway: Arc<dyn CacheGateway>,
        provider: ProviderSettings,
        section: CacheSection,
    ) -> Self {
        Self {
            gateway,
            provider,
            section,
            existing: Vec::new(),
        }
    }

    /// Desired clusters from configuration
    #[must_use]
    pub fn desired(&self) -> Vec<DesiredResource<CacheSpec>> {
        self.section
            .instances
            .iter()
            .map(|instance| {
                let desired = DesiredResource::new(
                    &instance.name,
                    CacheSpec {
                        shard_class: instance.shard_class.clone(),
                        shard_count: instance.shard_count,
                    },
                );
                match &instance.password {
                    Some(password) => desired.with_secret(password),
                    None => desired,
                }
            })
            .collect()
    }

    fn decode(record: CacheInstance) -> Option<ExistingResource<CacheSnapshot>> {
        let Some(name) = record.tags.logical_name().map(str::to_string) else {
            warn!(id = %record.id, "owned cache instance has no logical name, ignoring");
            return None;
        };
        Some(ExistingResource {
            removing: record.tags.is_removing(),
            endpoint: Some(record.endpoint()),
            status: Some(record.status),
            snapshot: CacheSnapshot {
                shard_class: record.shard_class,
                shard_count: record.shard_count,
            },
            id: record.id,
            name,
        })
    }
}

#[async_trait]
impl Lifecycle for CacheFamily {
    async fn status(&self, id: &str) -> Result<Option<String>, ProviderError> {
        let found = self
            .gateway
            .list_instances(&[Tag::delegate()], &[id.to_string()])
            .await?;
        Ok(found.into_iter().next().map(|instance| instance.status))
    }

    fn is_serving(&self, status: &str) -> bool {
        status == cache_status::NORMAL
    }
}

#[async_trait]
impl Family for CacheFamily {
    type Spec = CacheSpec;
    type Snapshot = CacheSnapshot;
    type Action = CacheAction;

    fn kind(&self) -> ResourceKind {
        ResourceKind::CacheCluster
    }

    async fn list(&self) -> Result<Vec<ExistingResource<CacheSnapshot>>, ProviderError> {
        let records = self.gateway.list_instances(&[Tag::delegate()], &[]).await?;
        Ok(records.into_iter().filter_map(Self::decode).collect())
    }

    fn check_create(&self, desired: &DesiredResource<CacheSpec>, checks: &mut Checks) {
        let capacity = &self.section.spec;
        let spec = &desired.spec;
        checks.require(
            capacity.shard_class.contains(&spec.shard_class),
            "check-shard-class",
            || format!("shard class {} is not allowed.", spec.shard_class),
        );
        checks.within(
            "check-shard-count",
            "shard count",
            spec.shard_count,
            capacity.shard_count,
        );
        check_placement(&self.provider, checks);
    }

    fn check_modify(
        &self,
        desired: &DesiredResource<CacheSpec>,
        existing: &ExistingResource<CacheSnapshot>,
        checks: &mut Checks,
    ) {
        let capacity = &self.section.spec;
        let spec = &desired.spec;
        checks.require(
            capacity.shard_class.contains(&spec.shard_class),
            "check-shard-class",
            || format!("shard class {} is not allowed.", spec.shard_class),
        );
        checks.within(
            "check-shard-count",
            "shard count",
            spec.shard_count,
            capacity.shard_count,
        );

        let current = existing.snapshot.shard_count;
        let max = capacity.max_shard_increase;
        checks.require(
            spec.shard_count >= current && spec.shard_count - current <= max,
            "check-shard-count-increase",
            || {
                format!(
                    "shard count can only grow by 0 to {max} per change, current is {current} - expect is {}.",
                    spec.shard_count
                )
            },
        );
    }

    fn is_unchanged(
        &self,
        desired: &DesiredResource<CacheSpec>,
        existing: &ExistingResource<CacheSnapshot>,
    ) -> bool {
        desired.spec.shard_class == existing.snapshot.shard_class
            && desired.spec.shard_count == existing.snapshot.shard_count
    }

    async fn mark_removing(
        &self,
        existing: &ExistingResource<CacheSnapshot>,
    ) -> Result<(), ProviderError> {
        self.gateway
            .tag_instance(&existing.id, &[Tag::removing()])
            .await
    }

    async fn create(&self, desired: &DesiredResource<CacheSpec>) -> Result<String, ProviderError> {
        let request = NewCacheInstance {
            zone_id: self.provider.primary_zone().unwrap_or_default().to_string(),
            secondary_zone_id: self.provider.secondary_zone().map(str::to_string),
            name: desired.name.clone(),
            resource_group_id: self.provider.resource_group_id.clone(),
            vpc_id: self.provider.vpc.id.clone(),
            vswitch_id: self.provider.vswitch().unwrap_or_default().to_string(),
            shard_class: desired.spec.shard_class.clone(),
            shard_count: desired.spec.shard_count,
            password: desired.secret.clone(),
            extra: self.section.default.create.clone(),
            tags: ownership_tags(&desired.name),
        };
        self.gateway.create_instance(&request).await
    }

    fn plan_modify(
        &self,
        desired: &DesiredResource<CacheSpec>,
        existing: &ExistingResource<CacheSnapshot>,
    ) -> Vec<Step<CacheAction>> {
        let mut steps = Vec::new();
        if desired.spec.shard_class != existing.snapshot.shard_class {
            steps.push(Step::new("update-instance-class", CacheAction::ShardClass));
        }
        if desired.spec.shard_count > existing.snapshot.shard_count {
            steps.push(Step::new(
                "update-shard-count",
                CacheAction::AddShards(desired.spec.shard_count - existing.snapshot.shard_count),
            ));
        }
        steps
    }

    fn plan_followups(
        &self,
        phase: Phase,
        desired: &DesiredResource<CacheSpec>,
    ) -> Vec<Step<CacheAction>> {
        let mut steps = vec![Step::new("whitelist", CacheAction::Whitelist)];
        if phase == Phase::Modify && desired.secret.is_some() {
            steps.push(Step::new("reset-password", CacheAction::ResetPassword));
        }
        steps
    }

    async fn apply(
        &self,
        target: &Target,
        desired: &DesiredResource<CacheSpec>,
        action: &CacheAction,
    ) -> Result<String, ProviderError> {
        match action {
            CacheAction::ShardClass => {
                self.gateway
                    .modify_instance_class(&target.id, &desired.spec.shard_class)
                    .await?;
                Ok(success("update instance-class"))
            }
            CacheAction::AddShards(count) => {
                self.gateway.add_shards(&target.id, *count).await?;
                Ok(success("update shard-count"))
            }
            CacheAction::Whitelist => {
                self.gateway
                    .modify_security_ips(
                        &target.id,
                        &self.provider.vpc.cluster_ips,
                        &self.section.default.whitelist,
                    )
                    .await?;
                Ok(success("update whitelist"))
            }
            CacheAction::ResetPassword => {
                let Some(password) = &desired.secret else {
                    return Ok("no password configured, reset skipped.".to_string());
                };
                // the default account carries the instance id as its name
                self.gateway
                    .reset_account_password(&target.id, &target.id, password)
                    .await?;
                Ok(success("reset password"))
            }
        }
    }

    fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        Some(self)
    }
}

#[async_trait]
impl FamilyPass for CacheFamily {
    fn kind(&self) -> ResourceKind {
        ResourceKind::CacheCluster
    }

    async fn fetch(&mut self, engine: &Engine) -> Result<(), CoreError> {
        let existing = engine.fetch(&*self).await?;
        self.existing = existing;
        Ok(())
    }

    async fn reconcile(&self, engine: &Engine, report: &mut Report) {
        let desired = self.desired();
        engine
            .converge(self, &Scope::top(), &desired, &self.existing, report)
            .await;

        let names = unique_names(&self.section.instances, |i| i.name.as_str());
        for parent in engine.ready_parents(self, &names, report).await {
            let Some(config) = self.section.instances.iter().find(|i| i.name == parent.name) else {
                warn!(name = %parent.name, "serving instance has no configuration");
                continue;
            };
            let accounts = CacheAccountFamily::new(Arc::clone(&self.gateway), parent.target());
            engine
                .reconcile_children(
                    &accounts,
                    &Scope::child_of(&parent),
                    &cache_account::desired(config),
                    report,
                )
                .await;
        }
    }
}
