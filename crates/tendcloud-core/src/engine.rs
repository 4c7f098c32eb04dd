//! Per-family reconcile phases
//!
//! `Engine` fetches existing resources, classifies them against the desired
//! set and runs the remove, modify and create executors in that order,
//! emitting one [`ActionMessage`] per non-empty phase.

use std::collections::HashSet;

use tendcloud_api::pass::{ActionMessage, Outcomes, PassAction};
use tracing::{debug, info, warn};

use crate::classify::classify;
use crate::error::CoreError;
use crate::executor::Executor;
use crate::family::Family;
use crate::outcome::{PhaseOutcomes, failure, step};
use crate::resource::{DesiredResource, ExistingResource, ResourceKind};
use crate::waiter::Poller;

/// Parent context attached to reported messages
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    pub resource_id: Option<String>,
    pub name: Option<String>,
    pub endpoint: Option<String>,
}

impl Scope {
    /// Scope of top-level cluster families
    #[must_use]
    pub fn top() -> Self {
        Self::default()
    }

    /// Scope of children under `parent`
    #[must_use]
    pub fn child_of<C>(parent: &ExistingResource<C>) -> Self {
        Self {
            resource_id: Some(parent.id.clone()),
            name: Some(parent.name.clone()),
            endpoint: parent.endpoint.clone(),
        }
    }

    /// Build a message carrying this scope
    #[must_use]
    pub fn message(&self, kind: ResourceKind, action: PassAction, outcomes: Outcomes) -> ActionMessage {
        ActionMessage {
            resource_id: self.resource_id.clone(),
            name: self.name.clone(),
            endpoint: self.endpoint.clone(),
            ..ActionMessage::new(kind.as_str(), action, outcomes)
        }
    }
}

/// Messages collected during a pass
#[derive(Debug, Default)]
pub struct Report {
    messages: Vec<ActionMessage>,
}

impl Report {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ActionMessage) {
        self.messages.push(message);
    }

    #[must_use]
    pub fn messages(&self) -> &[ActionMessage] {
        &self.messages
    }

    #[must_use]
    pub fn into_messages(self) -> Vec<ActionMessage> {
        self.messages
    }
}

/// Names listed more than once
fn duplicate_names<C>(existing: &[ExistingResource<C>]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for resource in existing {
        if !seen.insert(resource.name.as_str()) && !duplicates.contains(&resource.name) {
            duplicates.push(resource.name.clone());
        }
    }
    duplicates
}

/// Runs the reconcile phases of one family at a time
#[derive(Debug, Clone, Copy, Default)]
pub struct Engine {
    poller: Poller,
}

impl Engine {
    #[must_use]
    pub fn new(poller: Poller) -> Self {
        Self { poller }
    }

    #[must_use]
    pub fn poller(&self) -> &Poller {
        &self.poller
    }

    /// List existing top-level resources
    ///
    /// A listing failure or two owned resources sharing a logical name abort
    /// the pass.
    pub async fn fetch<F: Family>(
        &self,
        family: &F,
    ) -> Result<Vec<ExistingResource<F::Snapshot>>, CoreError> {
        let kind = family.kind();
        let existing = family
            .list()
            .await
            .map_err(|source| CoreError::ListFailed { kind, source })?;

        let duplicates = duplicate_names(&existing);
        if !duplicates.is_empty() {
            return Err(CoreError::DuplicateExisting {
                kind,
                names: duplicates,
            });
        }

        debug!(kind = %kind, count = existing.len(), "fetched existing resources");
        Ok(existing)
    }

    /// Classify and run the remove, modify and create phases
    pub async fn converge<F: Family>(
        &self,
        family: &F,
        scope: &Scope,
        desired: &[DesiredResource<F::Spec>],
        existing: &[ExistingResource<F::Snapshot>],
        report: &mut Report,
    ) {
        if desired.is_empty() && existing.is_empty() {
            return;
        }

        let kind = family.kind();
        let mut outcomes = PhaseOutcomes::default();
        let plan = classify(
            desired,
            existing,
            |d, e| family.immutable_conflict(d, e),
            &mut outcomes,
        );
        info!(
            kind = %kind,
            parent = scope.name.as_deref().unwrap_or("-"),
            remove = plan.remove.len(),
            modify = plan.modify.len(),
            create = plan.create.len(),
            "classified"
        );

        let executor = Executor::new(family, self.poller);
        executor.remove_all(&plan.remove, &mut outcomes.removing).await;
        executor.modify_all(&plan.modify, &mut outcomes.modify).await;
        executor.create_all(&plan.create, &mut outcomes.create).await;

        let PhaseOutcomes {
            removing,
            modify,
            create,
        } = outcomes;
        for (action, outcomes) in [
            (PassAction::Removing, removing),
            (PassAction::Modify, modify),
            (PassAction::Create, create),
        ] {
            if !outcomes.is_empty() {
                report.push(scope.message(kind, action, outcomes));
            }
        }
    }

    /// Reconcile a child family under one parent
    ///
    /// Unlike [`Engine::fetch`], failures here are reported as an `obtain`
    /// message and the rest of the pass continues. Duplicate existing names
    /// skip only this child family.
    pub async fn reconcile_children<F: Family>(
        &self,
        family: &F,
        scope: &Scope,
        desired: &[DesiredResource<F::Spec>],
        report: &mut Report,
    ) {
        let kind = family.kind();
        let existing = match family.list().await {
            Ok(existing) => existing,
            Err(e) => {
                warn!(kind = %kind, parent = ?scope.name, error = %e, "child listing failed");
                let action = format!("obtain {}", kind.noun());
                report.push(
                    scope
                        .message(kind, PassAction::Obtain, Outcomes::new())
                        .with_note(failure(&action, &e)),
                );
                return;
            }
        };

        let duplicates = duplicate_names(&existing);
        if !duplicates.is_empty() {
            warn!(kind = %kind, parent = ?scope.name, names = ?duplicates, "duplicate existing children");
            let mut outcomes = Outcomes::new();
            for name in &duplicates {
                outcomes.record(
                    name,
                    step::DUPLICATE_EXISTING,
                    "multiple existing resources share this name, family skipped.",
                );
            }
            report.push(scope.message(kind, PassAction::Obtain, outcomes));
            return;
        }

        self.converge(family, scope, desired, &existing, report)
            .await;
    }

    /// Re-list clusters and keep those ready for child reconciliation
    ///
    /// `names` are the desired clusters that configure children. Clusters
    /// that are missing, duplicated, removing or not serving are reported in
    /// a `check` message and skipped.
    pub async fn ready_parents<F: Family>(
        &self,
        family: &F,
        names: &[&str],
        report: &mut Report,
    ) -> Vec<ExistingResource<F::Snapshot>>
    where
        F::Snapshot: Clone,
    {
        if names.is_empty() {
            return Vec::new();
        }

        let kind = family.kind();
        let listed = match family.list().await {
            Ok(listed) => listed,
            Err(e) => {
                warn!(kind = %kind, error = %e, "parent re-listing failed");
                report.push(
                    Scope::top()
                        .message(kind, PassAction::Check, Outcomes::new())
                        .with_note(failure(&format!("check {}", kind.noun()), &e)),
                );
                return Vec::new();
            }
        };

        let mut outcomes = Outcomes::new();
        let mut ready = Vec::new();
        for name in names {
            let matches: Vec<_> = listed.iter().filter(|e| e.name == *name).collect();
            match matches.as_slice() {
                [] => outcomes.record(name, step::CHECK, "instance not found, children skipped."),
                [one] if one.removing => outcomes.record(
                    name,
                    step::CHECK,
                    "instance is marked removing, children skipped.",
                ),
                [one] => {
                    let status = one.status.as_deref();
                    match (family.lifecycle(), status) {
                        (Some(lifecycle), Some(status)) if !lifecycle.is_serving(status) => {
                            outcomes.record(
                                name,
                                step::CHECK,
                                format!("instance is {status}, not serving, children skipped."),
                            );
                        }
                        _ => ready.push((*one).clone()),
                    }
                }
                many => outcomes.record(
                    name,
                    step::CHECK,
                    format!("{} instances share this name, children skipped.", many.len()),
                ),
            }
        }

        if !outcomes.is_empty() {
            report.push(Scope::top().message(kind, PassAction::Check, outcomes));
        }
        ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn existing(name: &str) -> ExistingResource<()> {
        ExistingResource {
            id: format!("id-{name}"),
            name: name.to_string(),
            removing: false,
            snapshot: (),
            status: None,
            endpoint: Some(format!("{name}.internal:6379")),
        }
    }

    #[test]
    fn test_duplicate_names() {
        let listed = vec![existing("a"), existing("b"), existing("a"), existing("a")];
        assert_eq!(duplicate_names(&listed), vec!["a".to_string()]);
        assert!(duplicate_names(&listed[..2]).is_empty());
    }

    #[test]
    fn test_child_scope_carries_parent() {
        let scope = Scope::child_of(&existing("sessions"));
        let message = scope.message(ResourceKind::CacheAccount, PassAction::Create, Outcomes::new());

        assert_eq!(message.kind, "cache-account");
        assert_eq!(message.resource_id.as_deref(), Some("id-sessions"));
        assert_eq!(message.name.as_deref(), Some("sessions"));
        assert_eq!(message.endpoint.as_deref(), Some("sessions.internal:6379"));
    }
}
