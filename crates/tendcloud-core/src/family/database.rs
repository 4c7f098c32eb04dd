//! Databases on a relational cluster

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use tendcloud_provider::types::{Extra, NewDatabase};
use tendcloud_provider::{ChildDescription, ProviderError, RelationalGateway};

use super::{Family, Step};
use crate::config::RelationalInstanceConfig;
use crate::outcome::success;
use crate::resource::{DesiredResource, ExistingResource, ResourceKind, Target};
use crate::validate::Checks;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSpec {
    /// Owning domain; its account becomes the database owner
    pub domain: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSnapshot {
    pub description: ChildDescription,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseAction {
    Describe,
}

/// Databases of every domain
#[must_use]
pub fn desired(instance: &RelationalInstanceConfig) -> Vec<DesiredResource<DatabaseSpec>> {
    instance
        .domains
        .iter()
        .flat_map(|(domain, config)| {
            config.databases.iter().map(move |database| {
                DesiredResource::new(
                    &database.name,
                    DatabaseSpec {
                        domain: domain.clone(),
                    },
                )
            })
        })
        .collect()
}

/// Domains that configure an account able to own databases
#[must_use]
pub fn owners(instance: &RelationalInstanceConfig) -> BTreeSet<String> {
    instance
        .domains
        .iter()
        .filter(|(_, config)| config.account.is_some())
        .map(|(domain, _)| domain.clone())
        .collect()
}

pub struct DatabaseFamily {
    gateway: Arc<dyn RelationalGateway>,
    parent: Target,
    owners: BTreeSet<String>,
    defaults: Extra,
}

impl DatabaseFamily {
    #[must_use]
    pub fn new(
        gateway: Arc<dyn RelationalGateway>,
        parent: Target,
        owners: BTreeSet<String>,
        defaults: Extra,
    ) -> Self {
        Self {
            gateway,
            parent,
            owners,
            defaults,
        }
    }

    fn description(&self, domain: &str) -> ChildDescription {
        ChildDescription::new(domain, &self.parent.name)
    }
}

#[async_trait]
impl Family for DatabaseFamily {
    type Spec = DatabaseSpec;
    type Snapshot = DatabaseSnapshot;
    type Action = DatabaseAction;

    fn kind(&self) -> ResourceKind {
        ResourceKind::Database
    }

    async fn list(&self) -> Result<Vec<ExistingResource<DatabaseSnapshot>>, ProviderError> {
        let databases = self.gateway.list_databases(&self.parent.id).await?;
        Ok(databases
            .into_iter()
            .filter_map(|database| {
                let description = ChildDescription::parse(&database.description)?;
                Some(ExistingResource {
                    id: database.name.clone(),
                    name: database.name,
                    removing: description.removing,
                    snapshot: DatabaseSnapshot { description },
                    status: None,
                    endpoint: None,
                })
            })
            .collect())
    }

    fn check_create(&self, desired: &DesiredResource<DatabaseSpec>, checks: &mut Checks) {
        checks.require(
            self.owners.contains(&desired.spec.domain),
            "check-account",
            || format!("domain {} has no account to own the database.", desired.spec.domain),
        );
    }

    fn is_unchanged(
        &self,
        desired: &DesiredResource<DatabaseSpec>,
        existing: &ExistingResource<DatabaseSnapshot>,
    ) -> bool {
        existing.snapshot.description == self.description(&desired.spec.domain)
    }

    async fn mark_removing(
        &self,
        existing: &ExistingResource<DatabaseSnapshot>,
    ) -> Result<(), ProviderError> {
        let description = existing.snapshot.description.marked_removing().encode();
        self.gateway
            .modify_database_description(&self.parent.id, &existing.name, &description)
            .await
    }

    async fn create(&self, desired: &DesiredResource<DatabaseSpec>) -> Result<String, ProviderError> {
        let request = NewDatabase {
            cluster_id: self.parent.id.clone(),
            name: desired.name.clone(),
            description: self.description(&desired.spec.domain).encode(),
            owner: desired.spec.domain.clone(),
            extra: self.defaults.clone(),
        };
        self.gateway.create_database(&request).await?;
        Ok(desired.name.clone())
    }

    fn plan_modify(
        &self,
        _desired: &DesiredResource<DatabaseSpec>,
        _existing: &ExistingResource<DatabaseSnapshot>,
    ) -> Vec<Step<DatabaseAction>> {
        vec![Step::new("describe", DatabaseAction::Describe)]
    }

    async fn apply(
        &self,
        target: &Target,
        desired: &DesiredResource<DatabaseSpec>,
        action: &DatabaseAction,
    ) -> Result<String, ProviderError> {
        match action {
            DatabaseAction::Describe => {
                let description = self.description(&desired.spec.domain).encode();
                self.gateway
                    .modify_database_description(&self.parent.id, &target.name, &description)
                    .await?;
                Ok(success("update database description"))
            }
        }
    }
}
