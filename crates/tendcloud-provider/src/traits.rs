//! Provider gateway traits
//!
//! One trait per resource family. Every call either succeeds or returns a
//! [`ProviderError`] carrying a message and an optional remediation hint.
//! List calls return raw provider records; decoding ownership metadata is
//! done with [`crate::tags`].

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::tags::Tag;
use crate::types::{
    CacheAccount, CacheInstance, ConsumerGroup, Database, DbAccount, DbCluster, DbEndpoint, Extra,
    NewCacheAccount, NewCacheInstance, NewConsumerGroup, NewDatabase, NewDbAccount, NewDbCluster,
    NewTopic, QueueDeploy, QueueInstance, QueueOrder, QueueTagTarget, QueueUpgrade,
    QueueWhitelistUpdate, ServerlessConf, Topic,
};

/// Message queue clusters with their topics and consumer groups
#[async_trait]
pub trait QueueGateway: Send + Sync {
    /// List clusters carrying every tag in `tags`, optionally restricted to `ids`
    async fn list_instances(
        &self,
        tags: &[Tag],
        ids: &[String],
    ) -> Result<Vec<QueueInstance>, ProviderError>;

    /// Place a purchase order; the cluster id is only known after listing
    async fn create_order(&self, order: &QueueOrder) -> Result<(), ProviderError>;

    /// Deploy a purchased cluster or start a stopped one
    async fn deploy_instance(&self, deploy: &QueueDeploy) -> Result<(), ProviderError>;

    async fn upgrade_instance(&self, upgrade: &QueueUpgrade) -> Result<(), ProviderError>;

    /// IPs currently allowed by the named whitelist group
    async fn allowed_ips(&self, instance_id: &str, group: &str)
    -> Result<Vec<String>, ProviderError>;

    async fn update_allowed_ips(&self, update: &QueueWhitelistUpdate) -> Result<(), ProviderError>;

    async fn tag_resource(&self, target: &QueueTagTarget, tags: &[Tag])
    -> Result<(), ProviderError>;

    async fn list_topics(&self, instance_id: &str) -> Result<Vec<Topic>, ProviderError>;

    async fn create_topic(&self, topic: &NewTopic) -> Result<(), ProviderError>;

    /// Add `count` partitions to an existing topic
    async fn add_partitions(
        &self,
        instance_id: &str,
        topic: &str,
        count: u32,
    ) -> Result<(), ProviderError>;

    async fn list_groups(&self, instance_id: &str) -> Result<Vec<ConsumerGroup>, ProviderError>;

    async fn create_group(&self, group: &NewConsumerGroup) -> Result<(), ProviderError>;
}

/// Serverless relational clusters with their accounts and databases
#[async_trait]
pub trait RelationalGateway: Send + Sync {
    async fn list_clusters(
        &self,
        tags: &[Tag],
        ids: &[String],
    ) -> Result<Vec<DbCluster>, ProviderError>;

    async fn serverless_conf(&self, cluster_id: &str) -> Result<ServerlessConf, ProviderError>;

    async fn endpoints(&self, cluster_id: &str) -> Result<Vec<DbEndpoint>, ProviderError>;

    /// Create a cluster and return its id; new clusters carry no tags
    async fn create_cluster(&self, cluster: &NewDbCluster) -> Result<String, ProviderError>;

    async fn modify_serverless(
        &self,
        cluster_id: &str,
        conf: &ServerlessConf,
    ) -> Result<(), ProviderError>;

    async fn modify_security_ips(
        &self,
        cluster_id: &str,
        ips: &[String],
        extra: &Extra,
    ) -> Result<(), ProviderError>;

    async fn tag_cluster(&self, cluster_id: &str, tags: &[Tag]) -> Result<(), ProviderError>;

    async fn list_accounts(&self, cluster_id: &str) -> Result<Vec<DbAccount>, ProviderError>;

    async fn create_account(&self, account: &NewDbAccount) -> Result<(), ProviderError>;

    async fn reset_account_password(
        &self,
        cluster_id: &str,
        account: &str,
        password: &str,
    ) -> Result<(), ProviderError>;

    async fn modify_account_description(
        &self,
        cluster_id: &str,
        account: &str,
        description: &str,
    ) -> Result<(), ProviderError>;

    async fn grant_privilege(
        &self,
        cluster_id: &str,
        account: &str,
        databases: &[String],
        privilege: &str,
    ) -> Result<(), ProviderError>;

    async fn revoke_privilege(
        &self,
        cluster_id: &str,
        account: &str,
        databases: &[String],
    ) -> Result<(), ProviderError>;

    async fn list_databases(&self, cluster_id: &str) -> Result<Vec<Database>, ProviderError>;

    async fn create_database(&self, database: &NewDatabase) -> Result<(), ProviderError>;

    async fn modify_database_description(
        &self,
        cluster_id: &str,
        database: &str,
        description: &str,
    ) -> Result<(), ProviderError>;
}

/// Sharded cache clusters with their accounts
#[async_trait]
pub trait CacheGateway: Send + Sync {
    async fn list_instances(
        &self,
        tags: &[Tag],
        ids: &[String],
    ) -> Result<Vec<CacheInstance>, ProviderError>;

    /// Create a cluster and return its id
    async fn create_instance(&self, instance: &NewCacheInstance) -> Result<String, ProviderError>;

    async fn modify_instance_class(
        &self,
        instance_id: &str,
        shard_class: &str,
    ) -> Result<(), ProviderError>;

    /// Add `count` shards to the cluster
    async fn add_shards(&self, instance_id: &str, count: u32) -> Result<(), ProviderError>;

    async fn modify_security_ips(
        &self,
        instance_id: &str,
        ips: &[String],
        extra: &Extra,
    ) -> Result<(), ProviderError>;

    async fn reset_account_password(
        &self,
        instance_id: &str,
        account: &str,
        password: &str,
    ) -> Result<(), ProviderError>;

    async fn tag_instance(&self, instance_id: &str, tags: &[Tag]) -> Result<(), ProviderError>;

    async fn list_accounts(&self, instance_id: &str) -> Result<Vec<CacheAccount>, ProviderError>;

    async fn create_account(&self, account: &NewCacheAccount) -> Result<(), ProviderError>;

    async fn modify_account_description(
        &self,
        instance_id: &str,
        account: &str,
        description: &str,
    ) -> Result<(), ProviderError>;
}
