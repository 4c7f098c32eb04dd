//! Per-domain accounts on a relational cluster
//!
//! Accounts have no tags; ownership lives in the description document.
//! Modifying an account resets its password and rebuilds its privileges:
//! everything it holds is revoked, then read-write is granted on the
//! domain's databases that exist.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tendcloud_provider::types::NewDbAccount;
use tendcloud_provider::{ChildDescription, ProviderError, RelationalGateway};

use super::{Family, Step};
use crate::config::RelationalInstanceConfig;
use crate::outcome::success;
use crate::resource::{DesiredResource, ExistingResource, ResourceKind, Target};
use crate::validate::Checks;

const PRIVILEGE: &str = "ReadWrite";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbAccountSpec {
    pub domain: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbAccountSnapshot {
    pub description: ChildDescription,
    /// Databases the account currently holds privileges on
    pub databases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbAccountAction {
    ResetPassword,
    Revoke(Vec<String>),
    Grant,
}

/// Accounts named after each domain that configures one
#[must_use]
pub fn desired(instance: &RelationalInstanceConfig) -> Vec<DesiredResource<DbAccountSpec>> {
    instance
        .domains
        .iter()
        .filter_map(|(domain, config)| {
            let account = config.account.as_ref()?;
            Some(
                DesiredResource::new(
                    domain,
                    DbAccountSpec {
                        domain: domain.clone(),
                    },
                )
                .with_secret(format!("{domain}{}", account.password)),
            )
        })
        .collect()
}

/// Databases each domain account should hold read-write on
#[must_use]
pub fn grants(instance: &RelationalInstanceConfig) -> BTreeMap<String, Vec<String>> {
    instance
        .domains
        .iter()
        .filter(|(_, config)| config.account.is_some())
        .map(|(domain, config)| {
            let databases = config.databases.iter().map(|d| d.name.clone()).collect();
            (domain.clone(), databases)
        })
        .collect()
}

pub struct DbAccountFamily {
    gateway: Arc<dyn RelationalGateway>,
    parent: Target,
    grants: BTreeMap<String, Vec<String>>,
}

impl DbAccountFamily {
    #[must_use]
    pub fn new(
        gateway: Arc<dyn RelationalGateway>,
        parent: Target,
        grants: BTreeMap<String, Vec<String>>,
    ) -> Self {
        Self {
            gateway,
            parent,
            grants,
        }
    }
}

#[async_trait]
impl Family for DbAccountFamily {
    type Spec = DbAccountSpec;
    type Snapshot = DbAccountSnapshot;
    type Action = DbAccountAction;

    fn kind(&self) -> ResourceKind {
        ResourceKind::DatabaseAccount
    }

    async fn list(&self) -> Result<Vec<ExistingResource<DbAccountSnapshot>>, ProviderError> {
        let accounts = self.gateway.list_accounts(&self.parent.id).await?;
        Ok(accounts
            .into_iter()
            .filter_map(|account| {
                let description = ChildDescription::parse(&account.description)?;
                let databases = account
                    .privileges
                    .iter()
                    .map(|p| p.database.clone())
                    .collect();
                Some(ExistingResource {
                    id: account.name.clone(),
                    name: account.name,
                    removing: description.removing,
                    snapshot: DbAccountSnapshot {
                        description,
                        databases,
                    },
                    status: None,
                    endpoint: None,
                })
            })
            .collect())
    }

    fn check_create(&self, desired: &DesiredResource<DbAccountSpec>, checks: &mut Checks) {
        checks.require(
            desired
                .secret
                .as_deref()
                .is_some_and(|s| s.len() > desired.spec.domain.len()),
            "check-password",
            || "account password is empty.".to_string(),
        );
    }

    fn is_unchanged(
        &self,
        _desired: &DesiredResource<DbAccountSpec>,
        _existing: &ExistingResource<DbAccountSnapshot>,
    ) -> bool {
        false
    }

    async fn mark_removing(
        &self,
        existing: &ExistingResource<DbAccountSnapshot>,
    ) -> Result<(), ProviderError> {
        let description = existing.snapshot.description.marked_removing().encode();
        self.gateway
            .modify_account_description(&self.parent.id, &existing.name, &description)
            .await
    }

    async fn create(&self, desired: &DesiredResource<DbAccountSpec>) -> Result<String, ProviderError> {
        let request = NewDbAccount {
            cluster_id: self.parent.id.clone(),
            name: desired.name.clone(),
            password: desired.secret.clone().unwrap_or_default(),
            account_type: "Normal".to_string(),
            description: Some(
                ChildDescription::new(&desired.spec.domain, &self.parent.name).encode(),
            ),
        };
        self.gateway.create_account(&request).await?;
        Ok(desired.name.clone())
    }

    fn plan_modify(
        &self,
        _desired: &DesiredResource<DbAccountSpec>,
        existing: &ExistingResource<DbAccountSnapshot>,
    ) -> Vec<Step<DbAccountAction>> {
        let mut steps = vec![Step::new("reset-password", DbAccountAction::ResetPassword)];
        if !existing.snapshot.databases.is_empty() {
            steps.push(Step::new(
                "revoke",
                DbAccountAction::Revoke(existing.snapshot.databases.clone()),
            ));
        }
        steps.push(Step::new("grant", DbAccountAction::Grant));
        steps
    }

    async fn apply(
        &self,
        target: &Target,
        desired: &DesiredResource<DbAccountSpec>,
        action: &DbAccountAction,
    ) -> Result<String, ProviderError> {
        match action {
            DbAccountAction::ResetPassword => {
                let password = desired.secret.as_deref().unwrap_or_default();
                self.gateway
                    .reset_account_password(&self.parent.id, &target.name, password)
                    .await?;
                Ok(success("reset password"))
            }
            DbAccountAction::Revoke(databases) => {
                self.gateway
                    .revoke_privilege(&self.parent.id, &target.name, databases)
                    .await?;
                Ok(success("revoke privileges"))
            }
            DbAccountAction::Grant => {
                let wanted = self
                    .grants
                    .get(&desired.spec.domain)
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                // databases created later in this pass get their grant on creation
                let live = self.gateway.list_databases(&self.parent.id).await?;
                let databases: Vec<String> = wanted
                    .iter()
                    .filter(|name| live.iter().any(|d| &d.name == *name))
                    .cloned()
                    .collect();
                if databases.is_empty() {
                    return Ok("no existing databases to grant.".to_string());
                }
                self.gateway
                    .grant_privilege(&self.parent.id, &target.name, &databases, PRIVILEGE)
                    .await?;
                Ok(success("grant privileges"))
            }
        }
    }
}
