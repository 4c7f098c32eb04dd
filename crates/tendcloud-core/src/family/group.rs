//! Consumer groups on a message queue cluster
//!
//! Groups carry nothing that can be changed after creation, so a matched
//! group is always left untouched.

use std::sync::Arc;

use async_trait::async_trait;
use tendcloud_provider::tags::child_tags;
use tendcloud_provider::types::{NewConsumerGroup, QueueTagTarget};
use tendcloud_provider::{ProviderError, QueueGateway, Tag, TagsExt};

use super::{Family, Step};
use crate::config::QueueInstanceConfig;
use crate::resource::{DesiredResource, ExistingResource, ResourceKind, Target};
use crate::validate::Checks;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSpec {
    pub domain: String,
    pub remark: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupAction {}

#[must_use]
pub fn desired(instance: &QueueInstanceConfig) -> Vec<DesiredResource<GroupSpec>> {
    instance
        .domains
        .iter()
        .flat_map(|(domain, config)| {
            config.groups.iter().map(move |group| {
                DesiredResource::new(
                    &group.name,
                    GroupSpec {
                        domain: domain.clone(),
                        remark: group.remark.clone().unwrap_or_else(|| group.name.clone()),
                    },
                )
            })
        })
        .collect()
}

pub struct GroupFamily {
    gateway: Arc<dyn QueueGateway>,
    parent: Target,
}

impl GroupFamily {
    #[must_use]
    pub fn new(gateway: Arc<dyn QueueGateway>, parent: Target) -> Self {
        Self { gateway, parent }
    }
}

#[async_trait]
impl Family for GroupFamily {
    type Spec = GroupSpec;
    type Snapshot = ();
    type Action = GroupAction;

    fn kind(&self) -> ResourceKind {
        ResourceKind::ConsumerGroup
    }

    async fn list(&self) -> Result<Vec<ExistingResource<()>>, ProviderError> {
        let groups = self.gateway.list_groups(&self.parent.id).await?;
        Ok(groups
            .into_iter()
            .filter(|group| group.tags.is_delegated())
            .map(|group| ExistingResource {
                id: group.name.clone(),
                removing: group.tags.is_removing(),
                name: group.name,
                snapshot: (),
                status: None,
                endpoint: None,
            })
            .collect())
    }

    fn check_create(&self, _desired: &DesiredResource<GroupSpec>, _checks: &mut Checks) {}

    fn is_unchanged(
        &self,
        _desired: &DesiredResource<GroupSpec>,
        _existing: &ExistingResource<()>,
    ) -> bool {
        true
    }

    async fn mark_removing(&self, existing: &ExistingResource<()>) -> Result<(), ProviderError> {
        let target = QueueTagTarget::Group {
            instance_id: self.parent.id.clone(),
            name: existing.name.clone(),
        };
        self.gateway.tag_resource(&target, &[Tag::removing()]).await
    }

    async fn create(&self, desired: &DesiredResource<GroupSpec>) -> Result<String, ProviderError> {
        let group = NewConsumerGroup {
            instance_id: self.parent.id.clone(),
            name: desired.name.clone(),
            remark: desired.spec.remark.clone(),
            tags: child_tags(&desired.spec.domain, &self.parent.name),
        };
        self.gateway.create_group(&group).await?;
        Ok(desired.name.clone())
    }

    fn plan_modify(
        &self,
        _desired: &DesiredResource<GroupSpec>,
        _existing: &ExistingResource<()>,
    ) -> Vec<Step<GroupAction>> {
        Vec::new()
    }

    async fn apply(
        &self,
        _target: &Target,
        _desired: &DesiredResource<GroupSpec>,
        action: &GroupAction,
    ) -> Result<String, ProviderError> {
        match *action {}
    }
}

#[cfg(test)]
mod tests {
    use tendcloud_provider::SimCloud;
    use tendcloud_provider::tags::ownership_tags;
    use tendcloud_provider::types::{ConsumerGroup, PaidType, QueueInstance, queue_status};

    use super::*;

    async fn seeded() -> Arc<SimCloud> {
        let sim = Arc::new(SimCloud::new());
        sim.seed_queue(QueueInstance {
            id: "alikafka-1".to_string(),
            paid_type: PaidType::Postpaid,
            spec_type: "professional".to_string(),
            io_max_spec: "standard".to_string(),
            disk_size: 500,
            topic_num_limit: 50,
            status_code: queue_status::SERVING,
            endpoint: None,
            tags: ownership_tags("events"),
        })
        .await;
        sim.seed_group(
            "alikafka-1",
            ConsumerGroup {
                name: "legacy".to_string(),
                remark: "legacy".to_string(),
                tags: Vec::new(),
            },
        )
        .await;
        sim
    }

    #[tokio::test]
    async fn test_created_group_is_listed_and_tagged() {
        let sim = seeded().await;
        let family = GroupFamily::new(sim.clone(), Target::new("alikafka-1", "events"));
        let group = DesiredResource::new(
            "billing-consumers",
            GroupSpec {
                domain: "billing".to_string(),
                remark: "billing-consumers".to_string(),
            },
        );

        family.create(&group).await.unwrap();
        let listed = family.list().await.unwrap();
        // undelegated groups are not managed
        assert_eq!(listed.len(), 1);
        assert!(family.is_unchanged(&group, &listed[0]));

        family.mark_removing(&listed[0]).await.unwrap();
        assert!(family.list().await.unwrap()[0].removing);
    }
}
