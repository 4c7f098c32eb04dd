//! Desired state document
//!
//! Deserialized from the desired-state TOML file. Each family section is
//! optional; a family without a section is not reconciled at all, while a
//! section with no instances removes every owned cluster of that family.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use tendcloud_provider::types::{Extra, PaidType};

use crate::validate::Bounds;

/// Complete desired state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DesiredState {
    #[serde(default)]
    pub provider: ProviderSettings,
    #[serde(default)]
    pub queue: Option<QueueSection>,
    #[serde(default)]
    pub relational: Option<RelationalSection>,
    #[serde(default)]
    pub cache: Option<CacheSection>,
}

/// Placement shared by every family
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub resource_group_id: Option<String>,
    /// Availability zones; the first is primary, the second secondary
    #[serde(default)]
    pub zones: Vec<String>,
    #[serde(default)]
    pub vpc: VpcSettings,
}

impl ProviderSettings {
    #[must_use]
    pub fn primary_zone(&self) -> Option<&str> {
        self.zones.first().map(String::as_str)
    }

    #[must_use]
    pub fn secondary_zone(&self) -> Option<&str> {
        self.zones.get(1).map(String::as_str)
    }

    #[must_use]
    pub fn vswitch(&self) -> Option<&str> {
        self.vpc.vswitch_ids.first().map(String::as_str)
    }
}

/// Network placement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VpcSettings {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub vswitch_ids: Vec<String>,
    /// Client IPs allowed on every cluster's whitelist
    #[serde(default)]
    pub cluster_ips: Vec<String>,
}

/// Free-form request fields per call type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionDefaults {
    #[serde(default)]
    pub create: Extra,
    #[serde(default)]
    pub deploy: Extra,
    #[serde(default)]
    pub whitelist: Extra,
    #[serde(default)]
    pub database: Extra,
}

/// Password-bearing account entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountConfig {
    pub password: String,
}

// ============================================================================
// Message queue
// ============================================================================

fn default_whitelist_group() -> String {
    "managed".to_string()
}

/// Allowed ranges for one `spec_type`/`io_max_spec` combination
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCapacity {
    pub partition_num: Bounds,
    pub disk_size: Bounds,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueSection {
    /// Capacity table keyed by spec type, then IO spec
    #[serde(default)]
    pub spec: BTreeMap<String, BTreeMap<String, QueueCapacity>>,
    #[serde(default)]
    pub default: SectionDefaults,
    /// Whitelist group managed on every cluster
    #[serde(default = "default_whitelist_group")]
    pub whitelist_group: String,
    #[serde(default)]
    pub instances: Vec<QueueInstanceConfig>,
}

impl QueueSection {
    #[must_use]
    pub fn capacity(&self, spec_type: &str, io_max_spec: &str) -> Option<&QueueCapacity> {
        self.spec.get(spec_type)?.get(io_max_spec)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueInstanceConfig {
    pub name: String,
    pub paid_type: PaidType,
    pub spec_type: String,
    pub io_max_spec: String,
    pub disk_size: u32,
    /// Partitions purchased on top of the spec type's included minimum
    pub partition_num: u32,
    #[serde(default)]
    pub domains: BTreeMap<String, QueueDomain>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueDomain {
    #[serde(default)]
    pub topics: Vec<TopicConfig>,
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicConfig {
    pub name: String,
    pub partition_num: u32,
    #[serde(default)]
    pub remark: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupConfig {
    pub name: String,
    #[serde(default)]
    pub remark: Option<String>,
}

// ============================================================================
// Relational database
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationalCapacity {
    pub scale: Bounds,
    pub scale_ro_num: Bounds,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationalSection {
    #[serde(default)]
    pub spec: RelationalCapacity,
    #[serde(default)]
    pub default: SectionDefaults,
    #[serde(default)]
    pub instances: Vec<RelationalInstanceConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationalInstanceConfig {
    pub name: String,
    pub scale_min: u32,
    pub scale_max: u32,
    pub scale_ro_num_min: u32,
    pub scale_ro_num_max: u32,
    /// Cluster account named after the instance
    #[serde(default)]
    pub account: Option<AccountConfig>,
    #[serde(default)]
    pub domains: BTreeMap<String, RelationalDomain>,
}

/// Account named after the domain plus the databases it owns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationalDomain {
    #[serde(default)]
    pub account: Option<AccountConfig>,
    #[serde(default)]
    pub databases: Vec<DatabaseConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub name: String,
}

// ============================================================================
// Cache
// ============================================================================

fn default_max_shard_increase() -> u32 {
    32
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheCapacity {
    /// Allowed shard classes
    #[serde(default)]
    pub shard_class: Vec<String>,
    #[serde(default)]
    pub shard_count: Bounds,
    /// Largest shard count growth applied in one change
    #[serde(default = "default_max_shard_increase")]
    pub max_shard_increase: u32,
}

impl Default for CacheCapacity {
    fn default() -> Self {
        Self {
            shard_class: Vec::new(),
            shard_count: Bounds::default(),
            max_shard_increase: default_max_shard_increase(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheSection {
    #[serde(default)]
    pub spec: CacheCapacity,
    #[serde(default)]
    pub default: SectionDefaults,
    #[serde(default)]
    pub instances: Vec<CacheInstanceConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheInstanceConfig {
    pub name: String,
    pub shard_class: String,
    pub shard_count: u32,
    /// Password of the instance's default account
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub domains: BTreeMap<String, CacheDomain>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheDomain {
    #[serde(default)]
    pub account: Option<AccountConfig>,
}
