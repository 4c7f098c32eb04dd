//! Topics on a message queue cluster

use std::sync::Arc;

use async_trait::async_trait;
use tendcloud_provider::tags::{TAG_DOMAIN, child_tags};
use tendcloud_provider::types::{NewTopic, QueueTagTarget};
use tendcloud_provider::{ProviderError, QueueGateway, Tag, TagsExt};

use super::{Family, Step};
use crate::config::QueueInstanceConfig;
use crate::outcome::success;
use crate::resource::{DesiredResource, ExistingResource, ResourceKind, Target};
use crate::validate::Checks;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSpec {
    pub domain: String,
    pub partition_num: u32,
    pub remark: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSnapshot {
    pub partition_num: u32,
    pub domain: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicAction {
    AddPartitions(u32),
}

/// Topics of every domain; the remark defaults to the topic name
#[must_use]
pub fn desired(instance: &QueueInstanceConfig) -> Vec<DesiredResource<TopicSpec>> {
    instance
        .domains
        .iter()
        .flat_map(|(domain, config)| {
            config.topics.iter().map(move |topic| {
                DesiredResource::new(
                    &topic.name,
                    TopicSpec {
                        domain: domain.clone(),
                        partition_num: topic.partition_num,
                        remark: topic.remark.clone().unwrap_or_else(|| topic.name.clone()),
                    },
                )
            })
        })
        .collect()
}

pub struct TopicFamily {
    gateway: Arc<dyn QueueGateway>,
    parent: Target,
}

impl TopicFamily {
    #[must_use]
    pub fn new(gateway: Arc<dyn QueueGateway>, parent: Target) -> Self {
        Self { gateway, parent }
    }

    fn tag_target(&self, name: &str) -> QueueTagTarget {
        QueueTagTarget::Topic {
            instance_id: self.parent.id.clone(),
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl Family for TopicFamily {
    type Spec = TopicSpec;
    type Snapshot = TopicSnapshot;
    type Action = TopicAction;

    fn kind(&self) -> ResourceKind {
        ResourceKind::Topic
    }

    async fn list(&self) -> Result<Vec<ExistingResource<TopicSnapshot>>, ProviderError> {
        let topics = self.gateway.list_topics(&self.parent.id).await?;
        Ok(topics
            .into_iter()
            .filter(|topic| topic.tags.is_delegated())
            .map(|topic| ExistingResource {
                id: topic.name.clone(),
                removing: topic.tags.is_removing(),
                snapshot: TopicSnapshot {
                    partition_num: topic.partition_num,
                    domain: topic.tags.tag_value(TAG_DOMAIN).map(str::to_string),
                },
                name: topic.name,
                status: None,
                endpoint: None,
            })
            .collect())
    }

    fn check_create(&self, desired: &DesiredResource<TopicSpec>, checks: &mut Checks) {
        checks.require(
            desired.spec.partition_num >= 1,
            "check-partition-number",
            || "partition number must be at least 1.".to_string(),
        );
    }

    fn check_modify(
        &self,
        desired: &DesiredResource<TopicSpec>,
        existing: &ExistingResource<TopicSnapshot>,
        checks: &mut Checks,
    ) {
        let current = existing.snapshot.partition_num;
        checks.require(
            desired.spec.partition_num >= current,
            "check-partition-number",
            || {
                format!(
                    "unable to reduce partition number, current is {current} - expect is {}.",
                    desired.spec.partition_num
                )
            },
        );
    }

    fn is_unchanged(
        &self,
        desired: &DesiredResource<TopicSpec>,
        existing: &ExistingResource<TopicSnapshot>,
    ) -> bool {
        desired.spec.partition_num == existing.snapshot.partition_num
    }

    async fn mark_removing(
        &self,
        existing: &ExistingResource<TopicSnapshot>,
    ) -> Result<(), ProviderError> {
        self.gateway
            .tag_resource(&self.tag_target(&existing.name), &[Tag::removing()])
            .await
    }

    async fn create(&self, desired: &DesiredResource<TopicSpec>) -> Result<String, ProviderError> {
        let topic = NewTopic {
            instance_id: self.parent.id.clone(),
            name: desired.name.clone(),
            remark: desired.spec.remark.clone(),
            partition_num: desired.spec.partition_num,
            tags: child_tags(&desired.spec.domain, &self.parent.name),
        };
        self.gateway.create_topic(&topic).await?;
        Ok(desired.name.clone())
    }

    fn plan_modify(
        &self,
        desired: &DesiredResource<TopicSpec>,
        existing: &ExistingResource<TopicSnapshot>,
    ) -> Vec<Step<TopicAction>> {
        let added = desired
            .spec
            .partition_num
            .saturating_sub(existing.snapshot.partition_num);
        if added == 0 {
            return Vec::new();
        }
        vec![Step::new("partition", TopicAction::AddPartitions(added))]
    }

    async fn apply(
        &self,
        target: &Target,
        _desired: &DesiredResource<TopicSpec>,
        action: &TopicAction,
    ) -> Result<String, ProviderError> {
        match *action {
            TopicAction::AddPartitions(count) => {
                self.gateway
                    .add_partitions(&self.parent.id, &target.name, count)
                    .await?;
                Ok(success("add partitions"))
            }
        }
    }
}
