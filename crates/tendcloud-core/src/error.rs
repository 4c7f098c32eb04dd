//! Core error types for tendcloud-core

use thiserror::Error;

use tendcloud_provider::ProviderError;

use crate::resource::ResourceKind;

/// Errors that abort a reconciliation pass or a controller request
///
/// Per-resource failures never surface here; they are recorded as outcome
/// strings in the pass report instead.
#[derive(Error, Debug, Clone)]
pub enum CoreError {
    /// Desired state document is invalid
    #[error("configuration error: {0}")]
    Config(String),

    /// Desired state could not be read
    #[error("failed to load desired state: {0}")]
    Load(String),

    /// Listing existing resources of a family failed
    #[error("failed to list existing {kind} resources: {source}")]
    ListFailed {
        /// Family being listed
        kind: ResourceKind,
        /// Provider failure
        source: ProviderError,
    },

    /// More than one existing resource shares a logical name
    #[error("duplicate existing {kind} resources: {}", names.join(", "))]
    DuplicateExisting {
        /// Family with the duplicates
        kind: ResourceKind,
        /// Offending logical names
        names: Vec<String>,
    },

    /// Provider call outside of a reconcile step failed
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Actor communication error
    #[error("actor communication error: {0}")]
    Actor(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_existing_lists_names() {
        let err = CoreError::DuplicateExisting {
            kind: ResourceKind::CacheCluster,
            names: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "duplicate existing cache-cluster resources: a, b"
        );
    }

    #[test]
    fn test_list_failed_includes_source() {
        let err = CoreError::ListFailed {
            kind: ResourceKind::QueueCluster,
            source: ProviderError::Timeout,
        };
        assert!(err.to_string().ends_with("request timed out"));
    }
}
