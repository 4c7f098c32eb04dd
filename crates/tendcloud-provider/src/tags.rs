//! Ownership metadata encoding
//!
//! Clusters, topics and consumer groups carry key/value tags. Accounts and
//! databases have no tags, so the same metadata is stored as a JSON document
//! in their description field.

use serde::{Deserialize, Serialize};

/// Marks a resource as managed by this controller
pub const TAG_DELEGATE: &str = "delegate";
/// Logical name of a cluster
pub const TAG_UNAME: &str = "uname";
/// Resource queued for manual removal
pub const TAG_REMOVING: &str = "removing";
/// Domain a child resource belongs to
pub const TAG_DOMAIN: &str = "domain";
/// Parent cluster logical name of a child resource
pub const TAG_INSTANCE: &str = "instance";

const TRUE: &str = "true";

/// Provider-side key/value tag
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// `delegate=true`
    #[must_use]
    pub fn delegate() -> Self {
        Self::new(TAG_DELEGATE, TRUE)
    }

    /// `uname=<name>`
    pub fn uname(name: impl Into<String>) -> Self {
        Self::new(TAG_UNAME, name)
    }

    /// `removing=true`
    #[must_use]
    pub fn removing() -> Self {
        Self::new(TAG_REMOVING, TRUE)
    }

    /// `domain=<domain>`
    pub fn domain(domain: impl Into<String>) -> Self {
        Self::new(TAG_DOMAIN, domain)
    }

    /// `instance=<parent>`
    pub fn instance(parent: impl Into<String>) -> Self {
        Self::new(TAG_INSTANCE, parent)
    }
}

/// Tags marking a cluster as owned and naming it
pub fn ownership_tags(name: &str) -> Vec<Tag> {
    vec![Tag::delegate(), Tag::uname(name)]
}

/// Tags for a child resource created under `parent`
pub fn child_tags(domain: &str, parent: &str) -> Vec<Tag> {
    vec![Tag::delegate(), Tag::domain(domain), Tag::instance(parent)]
}

/// Lookups over a tag list
pub trait TagsExt {
    /// Value of the first tag with `key`
    fn tag_value(&self, key: &str) -> Option<&str>;

    /// Whether every filter tag is present with the same value
    fn matches_all(&self, filter: &[Tag]) -> bool;

    /// Whether the resource is managed by this controller
    fn is_delegated(&self) -> bool {
        self.tag_value(TAG_DELEGATE) == Some(TRUE)
    }

    /// Whether the resource was already tagged for removal
    fn is_removing(&self) -> bool {
        self.tag_value(TAG_REMOVING) == Some(TRUE)
    }

    /// Logical name recovered from the `uname` tag
    fn logical_name(&self) -> Option<&str> {
        self.tag_value(TAG_UNAME)
    }
}

impl TagsExt for [Tag] {
    fn tag_value(&self, key: &str) -> Option<&str> {
        self.iter()
            .find(|t| t.key == key)
            .map(|t| t.value.as_str())
    }

    fn matches_all(&self, filter: &[Tag]) -> bool {
        filter.iter().all(|f| self.tag_value(&f.key) == Some(f.value.as_str()))
    }
}

/// Merge `tags` into `existing`, overwriting values of matching keys
pub fn merge_tags(existing: &mut Vec<Tag>, tags: &[Tag]) {
    for tag in tags {
        match existing.iter_mut().find(|t| t.key == tag.key) {
            Some(current) => current.value.clone_from(&tag.value),
            None => existing.push(tag.clone()),
        }
    }
}

/// Raw description document as stored by the provider
#[derive(Debug, Default, Serialize, Deserialize)]
struct RawDescription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    delegate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    instance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    removing: Option<String>,
}

/// Decoded ownership metadata of an account or database
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildDescription {
    pub domain: Option<String>,
    pub instance: Option<String>,
    pub removing: bool,
}

impl ChildDescription {
    pub fn new(domain: impl Into<String>, instance: impl Into<String>) -> Self {
        Self {
            domain: Some(domain.into()),
            instance: Some(instance.into()),
            removing: false,
        }
    }

    /// Decode a description field
    ///
    /// Returns `None` for descriptions that are not JSON or not marked as
    /// delegated; such resources are not managed by this controller.
    pub fn parse(description: &str) -> Option<Self> {
        let raw: RawDescription = serde_json::from_str(description).ok()?;
        if raw.delegate.as_deref() != Some(TRUE) {
            return None;
        }
        Some(Self {
            domain: raw.domain,
            instance: raw.instance,
            removing: raw.removing.as_deref() == Some(TRUE),
        })
    }

    /// Copy of this description marked for removal
    #[must_use]
    pub fn marked_removing(&self) -> Self {
        Self {
            removing: true,
            ..self.clone()
        }
    }

    /// Encode for storage in a description field
    #[must_use]
    pub fn encode(&self) -> String {
        let raw = RawDescription {
            delegate: Some(TRUE.to_string()),
            domain: self.domain.clone(),
            instance: self.instance.clone(),
            removing: self.removing.then(|| TRUE.to_string()),
        };
        // A struct of optional strings always serializes.
        serde_json::to_string(&raw).unwrap_or_default()
    }
}
