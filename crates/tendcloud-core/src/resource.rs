//! Resource model shared by every family
//!
//! A desired resource is what configuration asks for; an existing resource
//! is what the provider lists, already decoded from its ownership metadata.

use std::fmt;

/// Resource family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    QueueCluster,
    RelationalCluster,
    CacheCluster,
    Topic,
    ConsumerGroup,
    DatabaseAccount,
    Database,
    CacheAccount,
}

impl ResourceKind {
    /// Stable identifier used in pass reports
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QueueCluster => "queue-cluster",
            Self::RelationalCluster => "relational-cluster",
            Self::CacheCluster => "cache-cluster",
            Self::Topic => "topic",
            Self::ConsumerGroup => "consumer-group",
            Self::DatabaseAccount => "database-account",
            Self::Database => "database",
            Self::CacheAccount => "cache-account",
        }
    }

    /// Word used in outcome strings (`create instance successful.`)
    #[must_use]
    pub fn noun(&self) -> &'static str {
        match self {
            Self::QueueCluster | Self::RelationalCluster | Self::CacheCluster => "instance",
            Self::Topic => "topic",
            Self::ConsumerGroup => "group",
            Self::DatabaseAccount | Self::CacheAccount => "account",
            Self::Database => "database",
        }
    }

    /// Whether this family lives under a parent cluster
    #[must_use]
    pub fn is_child(&self) -> bool {
        !matches!(
            self,
            Self::QueueCluster | Self::RelationalCluster | Self::CacheCluster
        )
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resource as configuration wants it
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredResource<S> {
    /// Logical name, unique within the family (and parent, for children)
    pub name: String,
    pub spec: S,
    /// Password applied on create and reset on modify
    pub secret: Option<String>,
}

impl<S> DesiredResource<S> {
    pub fn new(name: impl Into<String>, spec: S) -> Self {
        Self {
            name: name.into(),
            spec,
            secret: None,
        }
    }

    #[must_use]
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }
}

/// A provider resource owned by this controller
#[derive(Debug, Clone, PartialEq)]
pub struct ExistingResource<C> {
    /// Provider id (children use their name)
    pub id: String,
    /// Logical name recovered from ownership metadata
    pub name: String,
    /// Already tagged for manual removal
    pub removing: bool,
    /// Mutable and immutable fields as listed
    pub snapshot: C,
    /// Provider status, for families with a lifecycle
    pub status: Option<String>,
    /// Connection endpoint, when the provider reports one
    pub endpoint: Option<String>,
}

impl<C> ExistingResource<C> {
    /// Id and name pair used by executors
    #[must_use]
    pub fn target(&self) -> Target {
        Target {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}

/// Identity of a resource being acted on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub id: String,
    pub name: String,
}

impl Target {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_labels() {
        assert_eq!(ResourceKind::ConsumerGroup.to_string(), "consumer-group");
        assert_eq!(ResourceKind::RelationalCluster.noun(), "instance");
        assert_eq!(ResourceKind::DatabaseAccount.noun(), "account");
        assert!(ResourceKind::Topic.is_child());
        assert!(!ResourceKind::CacheCluster.is_child());
    }
}
