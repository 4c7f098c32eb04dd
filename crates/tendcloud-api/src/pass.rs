//! Reconciliation pass report types
//!
//! One [`PassResult`] is produced per reconciliation pass. It is logged as a
//! single structured record and served by the daemon's status API.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Action class a message reports on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum PassAction {
    /// Existing resources tagged for manual removal
    Removing,
    /// Existing resources brought in line with desired state
    Modify,
    /// Desired resources created
    Create,
    /// Parent readiness checks before child reconciliation
    Check,
    /// Child resource listing
    Obtain,
}

impl std::fmt::Display for PassAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Removing => "removing",
            Self::Modify => "modify",
            Self::Create => "create",
            Self::Check => "check",
            Self::Obtain => "obtain",
        };
        f.write_str(s)
    }
}

/// Per-resource, per-step outcome strings
///
/// Keyed by logical name, then by step key (`create`, `whitelist`,
/// `reset-password`, ...). Resources that were visited but produced no step
/// still get an (empty) entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = Object)]
pub struct Outcomes(BTreeMap<String, BTreeMap<String, String>>);

impl Outcomes {
    /// Create an empty outcome map
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure an entry exists for `name`
    pub fn touch(&mut self, name: &str) {
        self.0.entry(name.to_string()).or_default();
    }

    /// Record the outcome of one step, replacing any previous text
    pub fn record(&mut self, name: &str, step: &str, message: impl Into<String>) {
        self.0
            .entry(name.to_string())
            .or_default()
            .insert(step.to_string(), message.into());
    }

    /// Outcome text of one step
    #[must_use]
    pub fn get(&self, name: &str, step: &str) -> Option<&str> {
        self.0.get(name)?.get(step).map(String::as_str)
    }

    /// All steps recorded for `name`
    #[must_use]
    pub fn steps(&self, name: &str) -> Option<&BTreeMap<String, String>> {
        self.0.get(name)
    }

    /// Whether `name` has an entry
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Logical names with an entry, in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// One reported block of a pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ActionMessage {
    /// Resource family (`queue-cluster`, `topic`, ...)
    pub kind: String,
    /// Parent resource id, for child resource messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    /// Parent logical name, for child resource messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Parent connection endpoint, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub action: PassAction,
    pub outcomes: Outcomes,
    /// Free-form message for failures not tied to a single resource
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl ActionMessage {
    /// Message without parent context
    #[must_use]
    pub fn new(kind: impl Into<String>, action: PassAction, outcomes: Outcomes) -> Self {
        Self {
            kind: kind.into(),
            resource_id: None,
            name: None,
            endpoint: None,
            action,
            outcomes,
            note: None,
        }
    }

    /// Attach a free-form note
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Structured record of one reconciliation pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PassResult {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Set when the pass aborted before completing every phase
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub messages: Vec<ActionMessage>,
}

impl PassResult {
    /// Whether the pass stopped on a fatal error
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.error.is_some()
    }

    /// Messages of one family and action class, in emission order
    pub fn messages_for<'a>(
        &'a self,
        kind: &'a str,
        action: PassAction,
    ) -> impl Iterator<Item = &'a ActionMessage> + 'a {
        self.messages
            .iter()
            .filter(move |m| m.kind == kind && m.action == action)
    }

    /// Outcome map of the first message matching `kind` and `action`
    #[must_use]
    pub fn outcomes<'a>(&'a self, kind: &'a str, action: PassAction) -> Option<&'a Outcomes> {
        self.messages_for(kind, action).next().map(|m| &m.outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcomes_record_and_touch() {
        let mut outcomes = Outcomes::new();
        outcomes.touch("a");
        outcomes.record("b", "create", "create instance successful.");
        outcomes.record("b", "create", "create failure: quota");

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.steps("a").unwrap().is_empty());
        assert_eq!(outcomes.get("b", "create"), Some("create failure: quota"));
        assert_eq!(outcomes.get("b", "whitelist"), None);
    }

    #[test]
    fn test_pass_result_serializes_flat_outcomes() {
        let mut outcomes = Outcomes::new();
        outcomes.record("orders", "removing", "removing instance successful.");
        let result = PassResult {
            started_at: Utc::now(),
            finished_at: Utc::now(),
            error: None,
            messages: vec![ActionMessage::new(
                "cache-cluster",
                PassAction::Removing,
                outcomes,
            )],
        };

        let json = serde_json::to_value(&result).unwrap();
        let message = &json["messages"][0];
        assert_eq!(message["action"], "removing");
        assert_eq!(
            message["outcomes"]["orders"]["removing"],
            "removing instance successful."
        );
        assert!(message.get("resource_id").is_none());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_messages_for_filters_kind_and_action() {
        let result = PassResult {
            started_at: Utc::now(),
            finished_at: Utc::now(),
            error: Some("boom".to_string()),
            messages: vec![
                ActionMessage::new("topic", PassAction::Create, Outcomes::new()),
                ActionMessage::new("topic", PassAction::Modify, Outcomes::new()),
                ActionMessage::new("queue-cluster", PassAction::Create, Outcomes::new()),
            ],
        };

        assert!(result.is_aborted());
        assert_eq!(result.messages_for("topic", PassAction::Create).count(), 1);
        assert!(result.outcomes("database", PassAction::Create).is_none());
    }

    #[test]
    fn test_outcomes_lookup_with_borrowed_kind() {
        let mut outcomes = Outcomes::new();
        outcomes.record("orders", "partition", "update partition successful.");
        let result = PassResult {
            started_at: Utc::now(),
            finished_at: Utc::now(),
            error: None,
            messages: vec![ActionMessage::new("topic", PassAction::Modify, outcomes)],
        };

        let kind = String::from("topic");
        let found = result.outcomes(&kind, PassAction::Modify).unwrap();
        assert_eq!(found.get("orders", "partition"), Some("update partition successful."));
    }

    #[test]
    fn test_outcomes_schema_is_object() {
        use utoipa::PartialSchema;

        let schema = serde_json::to_value(Outcomes::schema()).unwrap();
        assert_eq!(schema["type"], "object");
    }
}
