//! Message queue clusters
//!
//! Clusters are bought with an order that returns no id; the new cluster is
//! found again by its ownership tags. A purchased cluster stays stopped until
//! it is deployed into the VPC.

use std::sync::Arc;

use async_trait::async_trait;
use tendcloud_provider::tags::ownership_tags;
use tendcloud_provider::types::{
    PaidType, QueueDeploy, QueueInstance, QueueOrder, QueueTagTarget, QueueUpgrade,
    QueueWhitelistUpdate, WhitelistOp, queue_status,
};
use tendcloud_provider::{ProviderError, QueueGateway, Tag, TagsExt};
use tracing::{debug, warn};

use super::group::{self, GroupFamily};
use super::topic::{self, TopicFamily};
use super::{Family, Lifecycle, Phase, Step, check_placement, unique_names};
use crate::config::{ProviderSettings, QueueCapacity, QueueSection};
use crate::engine::{Engine, Report, Scope};
use crate::error::CoreError;
use crate::outcome::success;
use crate::pass::FamilyPass;
use crate::resource::{DesiredResource, ExistingResource, ResourceKind, Target};
use crate::validate::{Bounds, Checks};
use crate::waiter::Poller;

/// Listing attempts while waiting for an ordered cluster to show up
const ORDER_LOOKUP_ATTEMPTS: u32 = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSpec {
    pub paid_type: PaidType,
    pub spec_type: String,
    pub io_max_spec: String,
    pub disk_size: u32,
    /// Partitions purchased on top of the spec type's included minimum
    pub partition_num: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSnapshot {
    pub paid_type: PaidType,
    pub spec_type: String,
    pub io_max_spec: String,
    pub disk_size: u32,
    pub topic_num_limit: u32,
    pub status_code: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueAction {
    Upgrade,
    Whitelist,
}

pub struct QueueFamily {
    gateway: Arc<dyn QueueGateway>,
    provider: ProviderSettings,
    section: QueueSection,
    poller: Poller,
    existing: Vec<ExistingResource<QueueSnapshot>>,
}

impl QueueFamily {
    #[must_use]
    pub fn new(
        gateway: Arc<dyn QueueGateway>,
        provider: ProviderSettings,
        section: QueueSection,
        poller: Poller,
    ) -> Self {
        Self {
            gateway,
            provider,
            section,
            poller,
            existing: Vec::new(),
        }
    }

    #[must_use]
    pub fn desired(&self) -> Vec<DesiredResource<QueueSpec>> {
        self.section
            .instances
            .iter()
            .map(|instance| {
                DesiredResource::new(
                    &instance.name,
                    QueueSpec {
                        paid_type: instance.paid_type,
                        spec_type: instance.spec_type.clone(),
                        io_max_spec: instance.io_max_spec.clone(),
                        disk_size: instance.disk_size,
                        partition_num: instance.partition_num,
                    },
                )
            })
            .collect()
    }

    fn capacity(&self, spec: &QueueSpec) -> Option<&QueueCapacity> {
        self.section.capacity(&spec.spec_type, &spec.io_max_spec)
    }

    fn decode(record: QueueInstance) -> Option<ExistingResource<QueueSnapshot>> {
        let Some(name) = record.tags.logical_name().map(str::to_string) else {
            warn!(id = %record.id, "owned queue instance has no logical name, ignoring");
            return None;
        };
        Some(ExistingResource {
            removing: record.tags.is_removing(),
            status: Some(record.status_code.to_string()),
            endpoint: record.endpoint,
            snapshot: QueueSnapshot {
                paid_type: record.paid_type,
                spec_type: record.spec_type,
                io_max_spec: record.io_max_spec,
                disk_size: record.disk_size,
                topic_num_limit: record.topic_num_limit,
                status_code: record.status_code,
            },
            id: record.id,
            name,
        })
    }

    /// Capacity table checks shared by create and modify
    fn check_capacity(&self, spec: &QueueSpec, checks: &mut Checks) {
        let Some(types) = self.section.spec.get(&spec.spec_type) else {
            checks.fail(
                "check-spec-type",
                format!("spec type {} is not configured.", spec.spec_type),
            );
            return;
        };
        let Some(capacity) = types.get(&spec.io_max_spec) else {
            checks.fail(
                "check-io-max-spec",
                format!(
                    "io spec {} is not configured for spec type {}.",
                    spec.io_max_spec, spec.spec_type
                ),
            );
            return;
        };
        checks.within(
            "check-partition-number",
            "partition number",
            spec.partition_num,
            Bounds::new(0, capacity.partition_num.span()),
        );
        checks.within("check-disk-size", "disk size", spec.disk_size, capacity.disk_size);
    }

    fn whitelist_update(
        &self,
        instance_id: &str,
        op: WhitelistOp,
        ips: Vec<String>,
    ) -> QueueWhitelistUpdate {
        QueueWhitelistUpdate {
            instance_id: instance_id.to_string(),
            op,
            group: self.section.whitelist_group.clone(),
            ips,
            extra: self.section.default.whitelist.clone(),
        }
    }
}

#[async_trait]
impl Lifecycle for QueueFamily {
    async fn status(&self, id: &str) -> Result<Option<String>, ProviderError> {
        let found = self
            .gateway
            .list_instances(&[Tag::delegate()], &[id.to_string()])
            .await?;
        Ok(found
            .into_iter()
            .next()
            .map(|instance| instance.status_code.to_string()))
    }

    fn is_serving(&self, status: &str) -> bool {
        status.parse::<i32>() == Ok(queue_status::SERVING)
    }

    /// Deploying a stopped cluster starts it
    async fn start(&self, target: &Target) -> Result<(), ProviderError> {
        let deploy = QueueDeploy {
            instance_id: target.id.clone(),
            name: target.name.clone(),
            vpc_id: self.provider.vpc.id.clone(),
            vswitch_id: self.provider.vswitch().unwrap_or_default().to_string(),
            extra: self.section.default.deploy.clone(),
        };
        self.gateway.deploy_instance(&deploy).await
    }

    async fn deploy(&self, target: &Target) -> Result<Option<String>, ProviderError> {
        self.start(target).await?;
        Ok(Some(success("deploy instance")))
    }
}

#[async_trait]
impl Family for QueueFamily {
    type Spec = QueueSpec;
    type Snapshot = QueueSnapshot;
    type Action = QueueAction;

    fn kind(&self) -> ResourceKind {
        ResourceKind::QueueCluster
    }

    async fn list(&self) -> Result<Vec<ExistingResource<QueueSnapshot>>, ProviderError> {
        let records = self.gateway.list_instances(&[Tag::delegate()], &[]).await?;
        Ok(records.into_iter().filter_map(Self::decode).collect())
    }

    fn immutable_conflict(
        &self,
        desired: &DesiredResource<QueueSpec>,
        existing: &ExistingResource<QueueSnapshot>,
    ) -> Option<String> {
        (desired.spec.paid_type != existing.snapshot.paid_type).then(|| {
            format!(
                "paid type cannot change from {} to {}.",
                existing.snapshot.paid_type, desired.spec.paid_type
            )
        })
    }

    fn check_create(&self, desired: &DesiredResource<QueueSpec>, checks: &mut Checks) {
        self.check_capacity(&desired.spec, checks);
        check_placement(&self.provider, checks);
    }

    fn check_modify(
        &self,
        desired: &DesiredResource<QueueSpec>,
        existing: &ExistingResource<QueueSnapshot>,
        checks: &mut Checks,
    ) {
        self.check_capacity(&desired.spec, checks);

        let current = existing.snapshot.disk_size;
        checks.require(
            desired.spec.disk_size >= current,
            "check-disk-downgrade",
            || {
                format!(
                    "unable to reduce disk size, current is {current} - expect is {}.",
                    desired.spec.disk_size
                )
            },
        );

        let status = existing.snapshot.status_code;
        checks.require(
            status == queue_status::STOPPED || status == queue_status::SERVING,
            "check-instance-status",
            || format!("illegal status {status} of instance."),
        );
    }

    fn is_unchanged(
        &self,
        desired: &DesiredResource<QueueSpec>,
        existing: &ExistingResource<QueueSnapshot>,
    ) -> bool {
        let Some(capacity) = self.capacity(&desired.spec) else {
            return false;
        };
        let spec = &desired.spec;
        let snapshot = &existing.snapshot;
        spec.spec_type == snapshot.spec_type
            && spec.io_max_spec == snapshot.io_max_spec
            && spec.disk_size == snapshot.disk_size
            && spec.partition_num + capacity.partition_num.min == snapshot.topic_num_limit
    }

    async fn mark_removing(
        &self,
        existing: &ExistingResource<QueueSnapshot>,
    ) -> Result<(), ProviderError> {
        self.gateway
            .tag_resource(
                &QueueTagTarget::Instance(existing.id.clone()),
                &[Tag::removing()],
            )
            .await
    }

    async fn create(&self, desired: &DesiredResource<QueueSpec>) -> Result<String, ProviderError> {
        let tags = ownership_tags(&desired.name);
        let order = QueueOrder {
            paid_type: desired.spec.paid_type,
            spec_type: desired.spec.spec_type.clone(),
            io_max_spec: desired.spec.io_max_spec.clone(),
            disk_size: desired.spec.disk_size,
            partition_num: desired.spec.partition_num,
            extra: self.section.default.create.clone(),
            tags: tags.clone(),
        };
        self.gateway.create_order(&order).await?;

        let lookup = self.poller.with_attempts(ORDER_LOOKUP_ATTEMPTS);
        let found = lookup
            .poll(
                || self.gateway.list_instances(&tags, &[]),
                |found: &Vec<QueueInstance>| found.len() == 1,
            )
            .await;
        match found.and_then(|found| found.into_iter().next()) {
            Some(instance) => {
                debug!(name = %desired.name, id = %instance.id, "ordered instance listed");
                Ok(instance.id)
            }
            None => Err(ProviderError::Unavailable(format!(
                "ordered instance not listed within {:?}",
                lookup.ceiling()
            ))),
        }
    }

    fn plan_modify(
        &self,
        desired: &DesiredResource<QueueSpec>,
        existing: &ExistingResource<QueueSnapshot>,
    ) -> Vec<Step<QueueAction>> {
        if self.is_unchanged(desired, existing) {
            return Vec::new();
        }
        vec![Step::new("upgrade", QueueAction::Upgrade)]
    }

    fn plan_followups(
        &self,
        _phase: Phase,
        _desired: &DesiredResource<QueueSpec>,
    ) -> Vec<Step<QueueAction>> {
        vec![Step::new("whitelist", QueueAction::Whitelist)]
    }

    async fn apply(
        &self,
        target: &Target,
        desired: &DesiredResource<QueueSpec>,
        action: &QueueAction,
    ) -> Result<String, ProviderError> {
        match action {
            QueueAction::Upgrade => {
                let upgrade = QueueUpgrade {
                    instance_id: target.id.clone(),
                    paid_type: desired.spec.paid_type,
                    spec_type: desired.spec.spec_type.clone(),
                    io_max_spec: desired.spec.io_max_spec.clone(),
                    disk_size: desired.spec.disk_size,
                    partition_num: desired.spec.partition_num,
                };
                self.gateway.upgrade_instance(&upgrade).await?;
                Ok(success("upgrade instance"))
            }
            QueueAction::Whitelist => {
                let current = self
                    .gateway
                    .allowed_ips(&target.id, &self.section.whitelist_group)
                    .await?;
                if !current.is_empty() {
                    let update = self.whitelist_update(&target.id, WhitelistOp::Delete, current);
                    self.gateway.update_allowed_ips(&update).await?;
                }
                let wanted = &self.provider.vpc.cluster_ips;
                if !wanted.is_empty() {
                    let update = self.whitelist_update(&target.id, WhitelistOp::Add, wanted.clone());
                    self.gateway.update_allowed_ips(&update).await?;
                }
                Ok(success("update whitelist"))
            }
        }
    }

    fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        Some(self)
    }
}

#[async_trait]
impl FamilyPass for QueueFamily {
    fn kind(&self) -> ResourceKind {
        ResourceKind::QueueCluster
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
            let scope = Scope::child_of(&parent);

            let topics = TopicFamily::new(Arc::clone(&self.gateway), parent.target());
            engine
                .reconcile_children(&topics, &scope, &topic::desired(config), report)
                .await;

            let groups = GroupFamily::new(Arc::clone(&self.gateway), parent.target());
            engine
                .reconcile_children(&groups, &scope, &group::desired(config), report)
                .await;
        }
    }
}
