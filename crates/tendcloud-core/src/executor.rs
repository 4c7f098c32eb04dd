//! Generic remove, modify and create executors
//!
//! Executors never return errors. Every provider failure becomes an outcome
//! string for the affected resource and the executor moves on to the next
//! resource.

use tendcloud_api::pass::Outcomes;
use tracing::{debug, info, instrument, warn};

use crate::family::{Family, Phase, Step};
use crate::outcome::{failure, step, success};
use crate::resource::{DesiredResource, ExistingResource, Target};
use crate::validate::{Checks, Verdict, Violation};
use crate::waiter::{Poller, wait_serving};

const UNCHANGED: &str = "modify ignored, configuration unchanged.";

fn record_violations(outcomes: &mut Outcomes, name: &str, violations: Vec<Violation>) {
    for violation in violations {
        outcomes.record(name, &violation.key, violation.message);
    }
}

/// Drives one family through the three action phases
pub struct Executor<'a, F: Family> {
    family: &'a F,
    poller: Poller,
}

impl<'a, F: Family> Executor<'a, F> {
    pub fn new(family: &'a F, poller: Poller) -> Self {
        Self { family, poller }
    }

    fn noun(&self) -> &'static str {
        self.family.kind().noun()
    }

    fn not_serving(&self) -> String {
        format!(
            "{} not serving within {:?}, remaining steps skipped.",
            self.noun(),
            self.poller.ceiling()
        )
    }

    /// Validate a create candidate
    pub fn screen_create(&self, desired: &DesiredResource<F::Spec>) -> Verdict {
        let mut checks = Checks::new();
        self.family.check_create(desired, &mut checks);
        checks.into()
    }

    /// Validate a modify candidate; unchanged resources short-circuit
    pub fn screen_modify(
        &self,
        desired: &DesiredResource<F::Spec>,
        existing: &ExistingResource<F::Snapshot>,
    ) -> Verdict {
        if self.family.is_unchanged(desired, existing) {
            return Verdict::Unchanged;
        }
        let mut checks = Checks::new();
        self.family.check_modify(desired, existing, &mut checks);
        checks.into()
    }

    /// Tag every target for manual removal
    #[instrument(skip_all, fields(kind = %self.family.kind()))]
    pub async fn remove_all(
        &self,
        targets: &[&ExistingResource<F::Snapshot>],
        outcomes: &mut Outcomes,
    ) {
        let action = format!("removing {}", self.noun());
        for existing in targets {
            match self.family.mark_removing(existing).await {
                Ok(()) => {
                    info!(id = %existing.id, name = %existing.name, "tagged for removal");
                    outcomes.record(&existing.name, step::REMOVING, success(&action));
                }
                Err(e) => {
                    warn!(id = %existing.id, name = %existing.name, error = %e, "removal tagging failed");
                    outcomes.record(&existing.name, step::REMOVING, failure(&action, &e));
                }
            }
        }
    }

    /// Bring every matched pair in line with its desired state
    #[instrument(skip_all, fields(kind = %self.family.kind()))]
    pub async fn modify_all(
        &self,
        candidates: &[(&DesiredResource<F::Spec>, &ExistingResource<F::Snapshot>)],
        outcomes: &mut Outcomes,
    ) {
        for (desired, existing) in candidates {
            self.modify_one(desired, existing, outcomes).await;
        }
    }

    async fn modify_one(
        &self,
        desired: &DesiredResource<F::Spec>,
        existing: &ExistingResource<F::Snapshot>,
        outcomes: &mut Outcomes,
    ) {
        let name = desired.name.as_str();
        match self.screen_modify(desired, existing) {
            Verdict::Unchanged => {
                debug!(name, "configuration unchanged");
                outcomes.record(name, step::NO_OP, UNCHANGED);
                return;
            }
            Verdict::Rejected(violations) => {
                info!(name, count = violations.len(), "modify rejected by checks");
                record_violations(outcomes, name, violations);
                return;
            }
            Verdict::Proceed => outcomes.touch(name),
        }

        let target = existing.target();
        if !self.ensure_serving(&target, existing, outcomes).await {
            return;
        }
        for step in self.family.plan_modify(desired, existing) {
            if !self.run_step(&target, desired, &step, true, outcomes).await {
                return;
            }
        }
        self.run_followups(Phase::Modify, &target, desired, outcomes)
            .await;
    }

    /// Create every candidate, then run its setup steps
    #[instrument(skip_all, fields(kind = %self.family.kind()))]
    pub async fn create_all(
        &self,
        candidates: &[&DesiredResource<F::Spec>],
        outcomes: &mut Outcomes,
    ) {
        for desired in candidates {
            self.create_one(desired, outcomes).await;
        }
    }

    async fn create_one(&self, desired: &DesiredResource<F::Spec>, outcomes: &mut Outcomes) {
        let name = desired.name.as_str();
        if let Verdict::Rejected(violations) = self.screen_create(desired) {
            info!(name, count = violations.len(), "create rejected by checks");
            record_violations(outcomes, name, violations);
            return;
        }

        let action = format!("create {}", self.noun());
        let id = match self.family.create(desired).await {
            Ok(id) => {
                info!(name, id = %id, "created");
                outcomes.record(name, step::CREATE, success(&action));
                id
            }
            Err(e) => {
                warn!(name, error = %e, "create failed");
                outcomes.record(name, step::CREATE, failure(&action, &e));
                return;
            }
        };

        let target = Target::new(id, name);
        if let Some(lifecycle) = self.family.lifecycle() {
            match lifecycle.deploy(&target).await {
                Ok(Some(message)) => outcomes.record(name, step::DEPLOY, message),
                Ok(None) => {}
                Err(e) => {
                    warn!(name, error = %e, "deploy failed");
                    outcomes.record(name, step::DEPLOY, failure("deploy", &e));
                    return;
                }
            }
            if !wait_serving(lifecycle, &self.poller, &target).await {
                outcomes.record(name, step::WAIT, self.not_serving());
                return;
            }
            match lifecycle.claim(&target).await {
                Ok(Some(message)) => outcomes.record(name, step::CREATE_TAG, message),
                Ok(None) => {}
                Err(e) => {
                    warn!(name, error = %e, "ownership tagging failed");
                    outcomes.record(name, step::CREATE_TAG, failure(step::CREATE_TAG, &e));
                    return;
                }
            }
        }

        self.run_followups(Phase::Create, &target, desired, outcomes)
            .await;
    }

    /// Start a non-serving resource and wait for it
    async fn ensure_serving(
        &self,
        target: &Target,
        existing: &ExistingResource<F::Snapshot>,
        outcomes: &mut Outcomes,
    ) -> bool {
        let Some(lifecycle) = self.family.lifecycle() else {
            return true;
        };
        match existing.status.as_deref() {
            None => return true,
            Some(status) if lifecycle.is_serving(status) => return true,
            Some(status) => info!(name = %target.name, status, "not serving, starting before modify"),
        }

        if let Err(e) = lifecycle.start(target).await {
            let action = format!("start {}", self.noun());
            outcomes.record(&target.name, step::START, failure(&action, &e));
            return false;
        }
        if !wait_serving(lifecycle, &self.poller, target).await {
            outcomes.record(&target.name, step::START, self.not_serving());
            return false;
        }
        true
    }

    /// Apply one step, then optionally wait for the resource to settle
    async fn run_step(
        &self,
        target: &Target,
        desired: &DesiredResource<F::Spec>,
        step: &Step<F::Action>,
        settle: bool,
        outcomes: &mut Outcomes,
    ) -> bool {
        match self.family.apply(target, desired, &step.action).await {
            Ok(message) => {
                info!(name = %target.name, step = step.key, "step applied");
                outcomes.record(&target.name, step.key, message);
            }
            Err(e) => {
                warn!(name = %target.name, step = step.key, error = %e, "step failed");
                outcomes.record(&target.name, step.key, failure(step.key, &e));
                return false;
            }
        }

        if !settle {
            return true;
        }
        if let Some(lifecycle) = self.family.lifecycle()
            && !wait_serving(lifecycle, &self.poller, target).await
        {
            outcomes.record(&target.name, step::WAIT, self.not_serving());
            return false;
        }
        true
    }

    async fn run_followups(
        &self,
        phase: Phase,
        target: &Target,
        desired: &DesiredResource<F::Spec>,
        outcomes: &mut Outcomes,
    ) {
        for step in self.family.plan_followups(phase, desired) {
            self.run_step(target, desired, &step, false, outcomes).await;
        }
    }
}
