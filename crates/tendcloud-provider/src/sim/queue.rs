//! Simulated message queue gateway

use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{SimCloud, SimQueue, settle};
use crate::error::ProviderError;
use crate::tags::{Tag, TagsExt, merge_tags};
use crate::traits::QueueGateway;
use crate::types::{
    ConsumerGroup, NewConsumerGroup, NewTopic, QueueDeploy, QueueInstance, QueueOrder,
    QueueTagTarget, QueueUpgrade, QueueWhitelistUpdate, Topic, WhitelistOp, queue_status,
};

/// Topics every simulated cluster gets on top of purchased partitions
pub const TOPIC_BASE: u32 = 50;

fn not_found(id: &str) -> ProviderError {
    ProviderError::api("InstanceNotExist", format!("instance {id} does not exist"))
}

#[async_trait]
impl QueueGateway for SimCloud {
    async fn list_instances(
        &self,
        tags: &[Tag],
        ids: &[String],
    ) -> Result<Vec<QueueInstance>, ProviderError> {
        let mut state = self.state.lock().await;
        state.check("queue.list_instances")?;

        let mut found = Vec::new();
        for queue in state.queues.values_mut() {
            if !queue.record.tags.matches_all(tags)
                || (!ids.is_empty() && !ids.contains(&queue.record.id))
            {
                continue;
            }
            if let Some(code) = settle(&mut queue.settling) {
                queue.record.status_code = code;
            }
            found.push(queue.record.clone());
        }
        Ok(found)
    }

    #[instrument(skip(self))]
    async fn create_order(&self, order: &QueueOrder) -> Result<(), ProviderError> {
        let mut state = self.state.lock().await;
        let name = order.tags.logical_name().unwrap_or("-").to_string();
        state.mutate("queue.create_order", &name)?;

        let id = state.next_id("alikafka");
        let record = QueueInstance {
            id: id.clone(),
            paid_type: order.paid_type,
            spec_type: order.spec_type.clone(),
            io_max_spec: order.io_max_spec.clone(),
            disk_size: order.disk_size,
            topic_num_limit: order.partition_num + TOPIC_BASE,
            status_code: queue_status::STOPPED,
            endpoint: None,
            tags: order.tags.clone(),
        };
        state.queues.insert(
            id.clone(),
            SimQueue {
                record,
                settling: None,
                whitelist: BTreeMap::new(),
                topics: BTreeMap::new(),
                groups: BTreeMap::new(),
            },
        );

        debug!(id = %id, "queue order placed");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn deploy_instance(&self, deploy: &QueueDeploy) -> Result<(), ProviderError> {
        let mut state = self.state.lock().await;
        state.mutate("queue.deploy_instance", &deploy.instance_id)?;
        let settling = state.settling(queue_status::SERVING);

        let queue = state
            .queues
            .get_mut(&deploy.instance_id)
            .ok_or_else(|| not_found(&deploy.instance_id))?;
        if queue.record.status_code != queue_status::STOPPED {
            return Err(ProviderError::Rejected(format!(
                "instance {} is not stopped",
                deploy.instance_id
            )));
        }
        queue.record.status_code = queue_status::CHANGING;
        queue.record.endpoint = Some(format!("{}.queue.sim.internal:9092", deploy.instance_id));
        queue.settling = settling;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn upgrade_instance(&self, upgrade: &QueueUpgrade) -> Result<(), ProviderError> {
        let mut state = self.state.lock().await;
        state.mutate("queue.upgrade_instance", &upgrade.instance_id)?;
        let settling = state.settling(queue_status::SERVING);

        let queue = state
            .queues
            .get_mut(&upgrade.instance_id)
            .ok_or_else(|| not_found(&upgrade.instance_id))?;
        if queue.record.status_code != queue_status::SERVING {
            return Err(ProviderError::api(
                "InstanceStatusNotSupport",
                "upgrade requires a serving instance",
            )
            .with_recommend("wait until the instance is serving"));
        }
        if upgrade.disk_size < queue.record.disk_size {
            return Err(ProviderError::api(
                "DiskSizeDowngrade",
                "disk size cannot be reduced",
            ));
        }
        queue.record.spec_type.clone_from(&upgrade.spec_type);
        queue.record.io_max_spec.clone_from(&upgrade.io_max_spec);
        queue.record.disk_size = upgrade.disk_size;
        queue.record.topic_num_limit = upgrade.partition_num + TOPIC_BASE;
        queue.record.status_code = queue_status::CHANGING;
        queue.settling = settling;
        Ok(())
    }

    async fn allowed_ips(
        &self,
        instance_id: &str,
        group: &str,
    ) -> Result<Vec<String>, ProviderError> {
        let mut state = self.state.lock().await;
        state.check("queue.allowed_ips")?;
        let queue = state
            .queues
            .get(instance_id)
            .ok_or_else(|| not_found(instance_id))?;
        Ok(queue.whitelist.get(group).cloned().unwrap_or_default())
    }

    #[instrument(skip(self))]
    async fn update_allowed_ips(&self, update: &QueueWhitelistUpdate) -> Result<(), ProviderError> {
        let mut state = self.state.lock().await;
        state.mutate("queue.update_allowed_ips", &update.instance_id)?;
        let queue = state
            .queues
            .get_mut(&update.instance_id)
            .ok_or_else(|| not_found(&update.instance_id))?;

        let entries = queue.whitelist.entry(update.group.clone()).or_default();
        match update.op {
            WhitelistOp::Add => {
                for ip in &update.ips {
                    if !entries.contains(ip) {
                        entries.push(ip.clone());
                    }
                }
            }
            WhitelistOp::Delete => entries.retain(|ip| !update.ips.contains(ip)),
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn tag_resource(
        &self,
        target: &QueueTagTarget,
        tags: &[Tag],
    ) -> Result<(), ProviderError> {
        let mut state = self.state.lock().await;
        let (instance_id, label) = match target {
            QueueTagTarget::Instance(id) => (id.clone(), id.clone()),
            QueueTagTarget::Topic { instance_id, name }
            | QueueTagTarget::Group { instance_id, name } => {
                (instance_id.clone(), format!("{instance_id}/{name}"))
            }
        };
        state.mutate("queue.tag_resource", &label)?;

        let queue = state
            .queues
            .get_mut(&instance_id)
            .ok_or_else(|| not_found(&instance_id))?;
        let current = match target {
            QueueTagTarget::Instance(_) => &mut queue.record.tags,
            QueueTagTarget::Topic { name, .. } => {
                &mut queue
                    .topics
                    .get_mut(name)
                    .ok_or_else(|| ProviderError::NotFound(format!("topic {name}")))?
                    .tags
            }
            QueueTagTarget::Group { name, .. } => {
                &mut queue
                    .groups
                    .get_mut(name)
                    .ok_or_else(|| ProviderError::NotFound(format!("group {name}")))?
                    .tags
            }
        };
        merge_tags(current, tags);
        Ok(())
    }

    async fn list_topics(&self, instance_id: &str) -> Result<Vec<Topic>, ProviderError> {
        let mut state = self.state.lock().await;
        state.check("queue.list_topics")?;
        let queue = state
            .queues
            .get(instance_id)
            .ok_or_else(|| not_found(instance_id))?;
        Ok(queue.topics.values().cloned().collect())
    }

    #[instrument(skip(self))]
    async fn create_topic(&self, topic: &NewTopic) -> Result<(), ProviderError> {
        let mut state = self.state.lock().await;
        state.mutate(
            "queue.create_topic",
            &format!("{}/{}", topic.instance_id, topic.name),
        )?;
        let queue = state
            .queues
            .get_mut(&topic.instance_id)
            .ok_or_else(|| not_found(&topic.instance_id))?;
        if queue.topics.contains_key(&topic.name) {
            return Err(ProviderError::api(
                "TopicAlreadyExist",
                format!("topic {} already exists", topic.name),
            ));
        }
        queue.topics.insert(
            topic.name.clone(),
            Topic {
                name: topic.name.clone(),
                remark: topic.remark.clone(),
                partition_num: topic.partition_num,
                tags: topic.tags.clone(),
            },
        );
        Ok(())
    }

    #[instrument(skip(self))]
    async fn add_partitions(
        &self,
        instance_id: &str,
        topic: &str,
        count: u32,
    ) -> Result<(), ProviderError> {
        let mut state = self.state.lock().await;
        state.mutate("queue.add_partitions", &format!("{instance_id}/{topic}"))?;
        let entry = state
            .queues
            .get_mut(instance_id)
            .ok_or_else(|| not_found(instance_id))?
            .topics
            .get_mut(topic)
            .ok_or_else(|| ProviderError::NotFound(format!("topic {topic}")))?;
        entry.partition_num += count;
        Ok(())
    }

    async fn list_groups(&self, instance_id: &str) -> Result<Vec<ConsumerGroup>, ProviderError> {
        let mut state = self.state.lock().await;
        state.check("queue.list_groups")?;
        let queue = state
            .queues
            .get(instance_id)
            .ok_or_else(|| not_found(instance_id))?;
        Ok(queue.groups.values().cloned().collect())
    }

    #[instrument(skip(self))]
    async fn create_group(&self, group: &NewConsumerGroup) -> Result<(), ProviderError> {
        let mut state = self.state.lock().await;
        state.mutate(
            "queue.create_group",
            &format!("{}/{}", group.instance_id, group.name),
        )?;
        let queue = state
            .queues
            .get_mut(&group.instance_id)
            .ok_or_else(|| not_found(&group.instance_id))?;
        if queue.groups.contains_key(&group.name) {
            return Err(ProviderError::api(
                "GroupAlreadyExist",
                format!("group {} already exists", group.name),
            ));
        }
        queue.groups.insert(
            group.name.clone(),
            ConsumerGroup {
                name: group.name.clone(),
                remark: group.remark.clone(),
                tags: group.tags.clone(),
            },
        );
        Ok(())
    }
}
