//! Error types for tendcloud-provider

use thiserror::Error;

/// Errors returned by provider gateway calls
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Provider API reported a failure
    #[error("{message}")]
    Api {
        /// Provider error code
        code: String,
        /// Human-readable message
        message: String,
        /// Remediation hint supplied by the provider
        recommend: Option<String>,
    },

    /// Referenced resource does not exist
    #[error("resource not found: {0}")]
    NotFound(String),

    /// Request was refused because of the resource's current state
    #[error("{0}")]
    Rejected(String),

    /// Provider returned a record the adapter cannot decode
    #[error("malformed provider record: {0}")]
    Malformed(String),

    /// Resource or service is temporarily unavailable
    #[error("{0}")]
    Unavailable(String),

    /// Request timed out
    #[error("request timed out")]
    Timeout,
}

impl ProviderError {
    /// Build an API error without a remediation hint
    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        ProviderError::Api {
            code: code.into(),
            message: message.into(),
            recommend: None,
        }
    }

    /// Attach a remediation hint (only API errors carry one)
    #[must_use]
    pub fn with_recommend(self, hint: impl Into<String>) -> Self {
        match self {
            ProviderError::Api { code, message, .. } => ProviderError::Api {
                code,
                message,
                recommend: Some(hint.into()),
            },
            other => other,
        }
    }

    /// Remediation hint, if the provider supplied one
    #[must_use]
    pub fn recommend(&self) -> Option<&str> {
        match self {
            ProviderError::Api { recommend, .. } => recommend.as_deref(),
            _ => None,
        }
    }

    /// Check if error is retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Timeout | ProviderError::Unavailable(_) => true,
            ProviderError::Api { code, .. } => {
                code.starts_with("Throttling") || code.starts_with("ServiceUnavailable")
            }
            _ => false,
        }
    }
}
