//! Request and record types exchanged with provider gateways

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tags::Tag;

/// Free-form request fields merged in from configuration defaults
pub type Extra = BTreeMap<String, serde_json::Value>;

// ============================================================================
// Message queue
// ============================================================================

/// Billing mode of a queue cluster (fixed at creation)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaidType {
    Prepaid,
    Postpaid,
}

impl fmt::Display for PaidType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaidType::Prepaid => f.write_str("prepaid"),
            PaidType::Postpaid => f.write_str("postpaid"),
        }
    }
}

/// Queue cluster status codes
pub mod queue_status {
    /// Purchased but not deployed, or stopped
    pub const STOPPED: i32 = 0;
    /// Deploying or upgrading
    pub const CHANGING: i32 = 1;
    /// Serving
    pub const SERVING: i32 = 2;
}

/// Queue cluster as listed by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueInstance {
    pub id: String,
    pub paid_type: PaidType,
    pub spec_type: String,
    pub io_max_spec: String,
    pub disk_size: u32,
    /// Topic quota, which is the partition allowance plus the spec minimum
    pub topic_num_limit: u32,
    pub status_code: i32,
    pub endpoint: Option<String>,
    pub tags: Vec<Tag>,
}

/// Purchase order for a new queue cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueOrder {
    pub paid_type: PaidType,
    pub spec_type: String,
    pub io_max_spec: String,
    pub disk_size: u32,
    pub partition_num: u32,
    pub extra: Extra,
    pub tags: Vec<Tag>,
}

/// Upgrade order for an existing queue cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueUpgrade {
    pub instance_id: String,
    pub paid_type: PaidType,
    pub spec_type: String,
    pub io_max_spec: String,
    pub disk_size: u32,
    pub partition_num: u32,
}

/// Deploys (starts) a purchased or stopped queue cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueDeploy {
    pub instance_id: String,
    pub name: String,
    pub vpc_id: String,
    pub vswitch_id: String,
    pub extra: Extra,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WhitelistOp {
    Add,
    Delete,
}

/// Change to a queue cluster's allowed IP group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueWhitelistUpdate {
    pub instance_id: String,
    pub op: WhitelistOp,
    pub group: String,
    pub ips: Vec<String>,
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub name: String,
    pub remark: String,
    pub partition_num: u32,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTopic {
    pub instance_id: String,
    pub name: String,
    pub remark: String,
    pub partition_num: u32,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumerGroup {
    pub name: String,
    pub remark: String,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewConsumerGroup {
    pub instance_id: String,
    pub name: String,
    pub remark: String,
    pub tags: Vec<Tag>,
}

/// Resource addressed by a queue tagging call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueTagTarget {
    Instance(String),
    Topic { instance_id: String, name: String },
    Group { instance_id: String, name: String },
}

// ============================================================================
// Relational database
// ============================================================================

/// Relational cluster status codes
pub mod relational_status {
    pub const CREATING: &str = "Creating";
    pub const CHANGING: &str = "ClassChanging";
    pub const RUNNING: &str = "Running";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbCluster {
    pub id: String,
    pub description: String,
    pub status: String,
    pub tags: Vec<Tag>,
}

/// Serverless scaling settings of a relational cluster
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerlessConf {
    pub scale_min: u32,
    pub scale_max: u32,
    pub scale_ro_num_min: u32,
    pub scale_ro_num_max: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbEndpoint {
    /// `Cluster`, `Primary` or `Custom`
    pub endpoint_type: String,
    pub connection_string: String,
    pub port: u16,
}

impl DbEndpoint {
    /// `host:port`
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.connection_string, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDbCluster {
    pub zone_id: String,
    pub description: String,
    pub resource_group_id: Option<String>,
    pub vpc_id: String,
    pub vswitch_id: String,
    pub security_ips: Vec<String>,
    pub serverless: ServerlessConf,
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbPrivilege {
    pub database: String,
    pub privilege: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbAccount {
    pub name: String,
    pub description: String,
    pub privileges: Vec<DbPrivilege>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDbAccount {
    pub cluster_id: String,
    pub name: String,
    pub password: String,
    /// `Normal` or `Super`
    pub account_type: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Database {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDatabase {
    pub cluster_id: String,
    pub name: String,
    pub description: String,
    /// Account granted ownership of the new database
    pub owner: String,
    pub extra: Extra,
}

// ============================================================================
// Cache
// ============================================================================

/// Cache cluster status codes
pub mod cache_status {
    pub const CREATING: &str = "Creating";
    pub const CHANGING: &str = "Changing";
    pub const NORMAL: &str = "Normal";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheInstance {
    pub id: String,
    pub name: String,
    pub shard_class: String,
    pub shard_count: u32,
    pub status: String,
    pub connection_domain: String,
    pub port: u16,
    pub tags: Vec<Tag>,
}

impl CacheInstance {
    /// `host:port`
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.connection_domain, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCacheInstance {
    pub zone_id: String,
    pub secondary_zone_id: Option<String>,
    pub name: String,
    pub resource_group_id: Option<String>,
    pub vpc_id: String,
    pub vswitch_id: String,
    pub shard_class: String,
    pub shard_count: u32,
    pub password: Option<String>,
    pub extra: Extra,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheAccount {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCacheAccount {
    pub instance_id: String,
    pub name: String,
    pub password: String,
    /// `RoleReadOnly` or `RoleReadWrite`
    pub privilege: String,
    pub description: String,
}
