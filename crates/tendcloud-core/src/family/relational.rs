//! Serverless relational clusters
//!
//! New clusters come back untagged, so ownership tags are applied once the
//! cluster is serving. A cluster whose tagging fails stays invisible to later
//! passes and has to be tagged or removed by hand.

use std::sync::Arc;

use async_trait::async_trait;
use tendcloud_provider::tags::ownership_tags;
use tendcloud_provider::types::{DbCluster, NewDbAccount, NewDbCluster, ServerlessConf, relational_status};
use tendcloud_provider::{ProviderError, RelationalGateway, Tag, TagsExt};
use tracing::warn;

use super::database::{self, DatabaseFamily};
use super::db_account::{self, DbAccountFamily};
use super::{Family, Lifecycle, Phase, Step, check_placement, unique_names};
use crate::config::{ProviderSettings, RelationalSection};
use crate::engine::{Engine, Report, Scope};
use crate::error::CoreError;
use crate::outcome::success;
use crate::pass::FamilyPass;
use crate::resource::{DesiredResource, ExistingResource, ResourceKind, Target};
use crate::validate::{Bounds, Checks};

const CLUSTER_ENDPOINT: &str = "Cluster";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationalSpec {
    pub serverless: ServerlessConf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationalSnapshot {
    pub serverless: ServerlessConf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationalAction {
    Serverless,
    Whitelist,
    Retag,
    /// Create or reset the account named after the instance
    Account,
}

pub struct RelationalFamily {
    gateway: Arc<dyn RelationalGateway>,
    provider: ProviderSettings,
    section: RelationalSection,
    existing: Vec<ExistingResource<RelationalSnapshot>>,
}

fn check_range(checks: &mut Checks, key: &str, field: &str, min: u32, max: u32, bounds: Bounds) {
    checks.require(
        bounds.contains(min) && bounds.contains(max) && min <= max,
        key,
        || {
            format!(
                "{field} [{min}, {max}] must lie within [{}, {}] with min not above max.",
                bounds.min, bounds.max
            )
        },
    );
}

impl RelationalFamily {
    #[must_use]
    pub fn new(
        gateway: Arc<dyn RelationalGateway>,
        provider: ProviderSettings,
        section: RelationalSection,
    ) -> Self {
        Self {
            gateway,
            provider,
            section,
            existing: Vec::new(),
        }
    }

    #[must_use]
    pub fn desired(&self) -> Vec<DesiredResource<RelationalSpec>> {
        self.section
            .instances
            .iter()
            .map(|instance| {
                let desired = DesiredResource::new(
                    &instance.name,
                    RelationalSpec {
                        serverless: ServerlessConf {
                            scale_min: instance.scale_min,
                            scale_max: instance.scale_max,
                            scale_ro_num_min: instance.scale_ro_num_min,
                            scale_ro_num_max: instance.scale_ro_num_max,
                        },
                    },
                );
                match &instance.account {
                    Some(account) => desired.with_secret(&account.password),
                    None => desired,
                }
            })
            .collect()
    }

    fn check_capacity(&self, spec: &RelationalSpec, checks: &mut Checks) {
        let capacity = self.section.spec;
        let conf = spec.serverless;
        check_range(
            checks,
            "check-scale",
            "scale",
            conf.scale_min,
            conf.scale_max,
            capacity.scale,
        );
        check_range(
            checks,
            "check-scale-ro-num",
            "read-only node count",
            conf.scale_ro_num_min,
            conf.scale_ro_num_max,
            capacity.scale_ro_num,
        );
    }

    async fn decode(&self, record: DbCluster) -> Result<Option<ExistingResource<RelationalSnapshot>>, ProviderError> {
        let Some(name) = record.tags.logical_name().map(str::to_string) else {
            warn!(id = %record.id, "owned cluster has no logical name, ignoring");
            return Ok(None);
        };
        let serverless = self.gateway.serverless_conf(&record.id).await?;
        let endpoints = self.gateway.endpoints(&record.id).await?;
        let endpoint = endpoints
            .iter()
            .find(|e| e.endpoint_type == CLUSTER_ENDPOINT)
            .or_else(|| endpoints.first())
            .map(|e| e.address());

        Ok(Some(ExistingResource {
            removing: record.tags.is_removing(),
            status: Some(record.status),
            snapshot: RelationalSnapshot { serverless },
            endpoint,
            id: record.id,
            name,
        }))
    }
}

#[async_trait]
impl Lifecycle for RelationalFamily {
    async fn status(&self, id: &str) -> Result<Option<String>, ProviderError> {
        // freshly created clusters are not tagged yet
        let found = self.gateway.list_clusters(&[], &[id.to_string()]).await?;
        Ok(found.into_iter().next().map(|cluster| cluster.status))
    }

    fn is_serving(&self, status: &str) -> bool {
        status == relational_status::RUNNING
    }

    async fn claim(&self, target: &Target) -> Result<Option<String>, ProviderError> {
        self.gateway
            .tag_cluster(&target.id, &ownership_tags(&target.name))
            .await?;
        Ok(Some(success("tag instance for create")))
    }
}

#[async_trait]
impl Family for RelationalFamily {
    type Spec = RelationalSpec;
    type Snapshot = RelationalSnapshot;
    type Action = RelationalAction;

    fn kind(&self) -> ResourceKind {
        ResourceKind::RelationalCluster
    }

    async fn list(&self) -> Result<Vec<ExistingResource<RelationalSnapshot>>, ProviderError> {
        let records = self.gateway.list_clusters(&[Tag::delegate()], &[]).await?;
        let mut existing = Vec::with_capacity(records.len());
        for record in records {
            if let Some(resource) = self.decode(record).await? {
                existing.push(resource);
            }
        }
        Ok(existing)
    }

    fn check_create(&self, desired: &DesiredResource<RelationalSpec>, checks: &mut Checks) {
        self.check_capacity(&desired.spec, checks);
        check_placement(&self.provider, checks);
    }

    fn check_modify(
        &self,
        desired: &DesiredResource<RelationalSpec>,
        _existing: &ExistingResource<RelationalSnapshot>,
        checks: &mut Checks,
    ) {
        self.check_capacity(&desired.spec, checks);
    }

    fn is_unchanged(
        &self,
        desired: &DesiredResource<RelationalSpec>,
        existing: &ExistingResource<RelationalSnapshot>,
    ) -> bool {
        desired.spec.serverless == existing.snapshot.serverless
    }

    async fn mark_removing(
        &self,
        existing: &ExistingResource<RelationalSnapshot>,
    ) -> Result<(), ProviderError> {
        self.gateway
            .tag_cluster(&existing.id, &[Tag::removing()])
            .await
    }

    async fn create(
        &self,
        desired: &DesiredResource<RelationalSpec>,
    ) -> Result<String, ProviderError> {
        let request = NewDbCluster {
            zone_id: self.provider.primary_zone().unwrap_or_default().to_string(),
            description: desired.name.clone(),
            resource_group_id: self.provider.resource_group_id.clone(),
            vpc_id: self.provider.vpc.id.clone(),
            vswitch_id: self.provider.vswitch().unwrap_or_default().to_string(),
            security_ips: self.provider.vpc.cluster_ips.clone(),
            serverless: desired.spec.serverless,
            extra: self.section.default.create.clone(),
        };
        self.gateway.create_cluster(&request).await
    }

    fn plan_modify(
        &self,
        _desired: &DesiredResource<RelationalSpec>,
        _existing: &ExistingResource<RelationalSnapshot>,
    ) -> Vec<Step<RelationalAction>> {
        vec![Step::new("update", RelationalAction::Serverless)]
    }

    fn plan_followups(
        &self,
        phase: Phase,
        desired: &DesiredResource<RelationalSpec>,
    ) -> Vec<Step<RelationalAction>> {
        let mut steps = Vec::new();
        if phase == Phase::Modify {
            steps.push(Step::new("whitelist", RelationalAction::Whitelist));
            steps.push(Step::new("update-tag", RelationalAction::Retag));
        }
        if desired.secret.is_some() {
            steps.push(Step::new("account", RelationalAction::Account));
        }
        steps
    }

    async fn apply(
        &self,
        target: &Target,
        desired: &DesiredResource<RelationalSpec>,
        action: &RelationalAction,
    ) -> Result<String, ProviderError> {
        match action {
            RelationalAction::Serverless => {
                self.gateway
                    .modify_serverless(&target.id, &desired.spec.serverless)
                    .await?;
                Ok(success("update instance"))
            }
            RelationalAction::Whitelist => {
                self.gateway
                    .modify_security_ips(
                        &target.id,
                        &self.provider.vpc.cluster_ips,
                        &self.section.default.whitelist,
                    )
                    .await?;
                Ok(success("update whitelist"))
            }
            RelationalAction::Retag => {
                self.gateway
                    .tag_cluster(&target.id, &ownership_tags(&target.name))
                    .await?;
                Ok(success("tag instance for update"))
            }
            RelationalAction::Account => {
                let password = desired.secret.as_deref().unwrap_or_default();
                let accounts = self.gateway.list_accounts(&target.id).await?;
                if accounts.iter().any(|a| a.name == target.name) {
                    self.gateway
                        .reset_account_password(&target.id, &target.name, password)
                        .await?;
                    Ok(success("reset password"))
                } else {
                    let request = NewDbAccount {
                        cluster_id: target.id.clone(),
                        name: target.name.clone(),
                        password: password.to_string(),
                        account_type: "Normal".to_string(),
                        description: None,
                    };
                    self.gateway.create_account(&request).await?;
                    Ok(success("create account"))
                }
            }
        }
    }

    fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        Some(self)
    }
}

#[async_trait]
impl FamilyPass for RelationalFamily {
    fn kind(&self) -> ResourceKind {
        ResourceKind::RelationalCluster
    }

    async fn fetch(&mut self, engine: &Engine) -> Result<(), CoreError> {
        let existing = engine.fetch(&*self).await?;
        self.existing = existing;
        Ok(())
    }

    async fn reconcile(&self, engine: &Engine, report: &mut Report) {
        let desired = self.desired();
        engine
            .converge(self, &Scope::top(), &desired, &self.existing, report)
            .await;

        let names = unique_names(&self.section.instances, |i| i.name.as_str());
        for parent in engine.ready_parents(self, &names, report).await {
            let Some(config) = self.section.instances.iter().find(|i| i.name == parent.name) else {
                warn!(name = %parent.name, "serving cluster has no configuration");
                continue;
            };
            let scope = Scope::child_of(&parent);

            // accounts first, databases are created with their domain account as owner
            let accounts = DbAccountFamily::new(
                Arc::clone(&self.gateway),
                parent.target(),
                db_account::grants(config),
            );
            engine
                .reconcile_children(&accounts, &scope, &db_account::desired(config), report)
                .await;

            let databases = DatabaseFamily::new(
                Arc::clone(&self.gateway),
                parent.target(),
                database::owners(config),
                self.section.default.database.clone(),
            );
            engine
                .reconcile_children(&databases, &scope, &database::desired(config), report)
                .await;
        }
    }
}
