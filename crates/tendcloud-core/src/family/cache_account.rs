//! Per-domain accounts on a cache cluster

use std::sync::Arc;

use async_trait::async_trait;
use tendcloud_provider::types::NewCacheAccount;
use tendcloud_provider::{CacheGateway, ChildDescription, ProviderError};

use super::{Family, Step};
use crate::config::CacheInstanceConfig;
use crate::outcome::success;
use crate::resource::{DesiredResource, ExistingResource, ResourceKind, Target};
use crate::validate::Checks;

const PRIVILEGE: &str = "RoleReadWrite";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheAccountSpec {
    pub domain: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheAccountSnapshot {
    pub description: ChildDescription,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheAccountAction {
    ResetPassword,
}

/// Accounts of each configured domain; the password is the domain name
/// followed by the configured password
#[must_use]
pub fn desired(instance: &CacheInstanceConfig) -> Vec<DesiredResource<CacheAccountSpec>> {
    instance
        .domains
        .iter()
        .filter_map(|(domain, config)| {
            let account = config.account.as_ref()?;
            Some(
                DesiredResource::new(
                    domain,
                    CacheAccountSpec {
                        domain: domain.clone(),
                    },
                )
                .with_secret(format!("{domain}{}", account.password)),
            )
        })
        .collect()
}

pub struct CacheAccountFamily {
    gateway: Arc<dyn CacheGateway>,
    parent: Target,
}

impl CacheAccountFamily {
    #[must_use]
    pub fn new(gateway: Arc<dyn CacheGateway>, parent: Target) -> Self {
        Self { gateway, parent }
    }
}

#[async_trait]
impl Family for CacheAccountFamily {
    type Spec = CacheAccountSpec;
    type Snapshot = CacheAccountSnapshot;
    type Action = CacheAccountAction;

    fn kind(&self) -> ResourceKind {
        ResourceKind::CacheAccount
    }

    async fn list(&self) -> Result<Vec<ExistingResource<CacheAccountSnapshot>>, ProviderError> {
        let accounts = self.gateway.list_accounts(&self.parent.id).await?;
        Ok(accounts
            .into_iter()
            .filter_map(|account| {
                let description = ChildDescription::parse(&account.description)?;
                Some(ExistingResource {
                    id: account.name.clone(),
                    name: account.name,
                    removing: description.removing,
                    snapshot: CacheAccountSnapshot { description },
                    status: None,
                    endpoint: None,
                })
            })
            .collect())
    }

    fn check_create(&self, desired: &DesiredResource<CacheAccountSpec>, checks: &mut Checks) {
        checks.require(
            desired.secret.as_deref().is_some_and(|s| s.len() > desired.spec.domain.len()),
            "check-password",
            || "account password is empty.".to_string(),
        );
    }

    fn is_unchanged(
        &self,
        _desired: &DesiredResource<CacheAccountSpec>,
        _existing: &ExistingResource<CacheAccountSnapshot>,
    ) -> bool {
        false
    }

    async fn mark_removing(
        &self,
        existing: &ExistingResource<CacheAccountSnapshot>,
    ) -> Result<(), ProviderError> {
        let description = existing.snapshot.description.marked_removing().encode();
        self.gateway
            .modify_account_description(&self.parent.id, &existing.name, &description)
            .await
    }

    async fn create(
        &self,
        desired: &DesiredResource<CacheAccountSpec>,
    ) -> Result<String, ProviderError> {
        let request = NewCacheAccount {
            instance_id: self.parent.id.clone(),
            name: desired.name.clone(),
            password: desired.secret.clone().unwrap_or_default(),
            privilege: PRIVILEGE.to_string(),
            description: ChildDescription::new(&desired.spec.domain, &self.parent.name).encode(),
        };
        self.gateway.create_account(&request).await?;
        Ok(desired.name.clone())
    }

    fn plan_modify(
        &self,
        _desired: &DesiredResource<CacheAccountSpec>,
        _existing: &ExistingResource<CacheAccountSnapshot>,
    ) -> Vec<Step<CacheAccountAction>> {
        vec![Step::new("reset-password", CacheAccountAction::ResetPassword)]
    }

    async fn apply(
        &self,
        target: &Target,
        desired: &DesiredResource<CacheAccountSpec>,
        action: &CacheAccountAction,
    ) -> Result<String, ProviderError> {
        match action {
            CacheAccountAction::ResetPassword => {
                let password = desired.secret.as_deref().unwrap_or_default();
                self.gateway
                    .reset_account_password(&self.parent.id, &target.name, password)
                    .await?;
                Ok(success("reset password"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::config::{AccountConfig, CacheDomain};

    #[test]
    fn test_desired_prefixes_password_with_domain() {
        let mut domains = BTreeMap::new();
        domains.insert(
            "billing".to_string(),
            CacheDomain {
                account: Some(AccountConfig {
                    password: "Secret1".to_string(),
                }),
            },
        );
        domains.insert("search".to_string(), CacheDomain { account: None });
        let instance = CacheInstanceConfig {
            name: "sessions".to_string(),
            shard_class: "small".to_string(),
            shard_count: 1,
            password: None,
            domains,
        };

        let accounts = desired(&instance);

        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].name, "billing");
        assert_eq!(accounts[0].secret.as_deref(), Some("billingSecret1"));
    }
}
