//! Simulated cache gateway

use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{SimCache, SimCacheAccount, SimCloud, settle};
use crate::error::ProviderError;
use crate::tags::{Tag, TagsExt, merge_tags};
use crate::traits::CacheGateway;
use crate::types::{CacheAccount, CacheInstance, Extra, NewCacheAccount, NewCacheInstance, cache_status};

const DEFAULT_PORT: u16 = 6379;

fn not_found(id: &str) -> ProviderError {
    ProviderError::api("InvalidInstanceId.NotFound", format!("instance {id} does not exist"))
        .with_recommend("check the instance id")
}

fn ensure_normal(cache: &SimCache) -> Result<(), ProviderError> {
    if cache.record.status == cache_status::NORMAL {
        Ok(())
    } else {
        Err(ProviderError::api(
            "IncorrectDBInstanceState",
            format!("instance {} is {}", cache.record.id, cache.record.status),
        ))
    }
}

#[async_trait]
impl CacheGateway for SimCloud {
    async fn list_instances(
        &self,
        tags: &[Tag],
        ids: &[String],
    ) -> Result<Vec<CacheInstance>, ProviderError> {
        let mut state = self.state.lock().await;
        state.check("cache.list_instances")?;

        let mut found = Vec::new();
        for cache in state.caches.values_mut() {
            if !cache.record.tags.matches_all(tags)
                || (!ids.is_empty() && !ids.contains(&cache.record.id))
            {
                continue;
            }
            if let Some(status) = settle(&mut cache.settling) {
                cache.record.status = status;
            }
            found.push(cache.record.clone());
        }
        Ok(found)
    }

    #[instrument(skip(self, instance), fields(name = %instance.name))]
    async fn create_instance(&self, instance: &NewCacheInstance) -> Result<String, ProviderError> {
        let mut state = self.state.lock().await;
        state.mutate("cache.create_instance", &instance.name)?;

        if instance.shard_count == 0 {
            return Err(ProviderError::api(
                "InvalidShardCount",
                "shard count must be at least 1",
            ));
        }

        let id = state.next_id("r");
        let settling = state.settling(cache_status::NORMAL.to_string());
        let mut passwords = BTreeMap::new();
        if let Some(password) = &instance.password {
            passwords.insert(id.clone(), password.clone());
        }
        let record = CacheInstance {
            id: id.clone(),
            name: instance.name.clone(),
            shard_class: instance.shard_class.clone(),
            shard_count: instance.shard_count,
            status: cache_status::CREATING.to_string(),
            connection_domain: format!("{id}.cache.sim.internal"),
            port: DEFAULT_PORT,
            tags: instance.tags.clone(),
        };
        state.caches.insert(
            id.clone(),
            SimCache {
                record,
                settling,
                security_ips: Vec::new(),
                passwords,
                accounts: BTreeMap::new(),
            },
        );

        debug!(id = %id, "created cache instance");
        Ok(id)
    }

    #[instrument(skip(self))]
    async fn modify_instance_class(
        &self,
        instance_id: &str,
        shard_class: &str,
    ) -> Result<(), ProviderError> {
        let mut state = self.state.lock().await;
        state.mutate("cache.modify_instance_class", instance_id)?;
        let settling = state.settling(cache_status::NORMAL.to_string());

        let cache = state
            .caches
            .get_mut(instance_id)
            .ok_or_else(|| not_found(instance_id))?;
        ensure_normal(cache)?;
        cache.record.shard_class = shard_class.to_string();
        cache.record.status = cache_status::CHANGING.to_string();
        cache.settling = settling;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn add_shards(&self, instance_id: &str, count: u32) -> Result<(), ProviderError> {
        let mut state = self.state.lock().await;
        state.mutate("cache.add_shards", instance_id)?;
        let settling = state.settling(cache_status::NORMAL.to_string());

        let cache = state
            .caches
            .get_mut(instance_id)
            .ok_or_else(|| not_found(instance_id))?;
        ensure_normal(cache)?;
        if count == 0 {
            return Err(ProviderError::api("InvalidShardCount", "nothing to add"));
        }
        cache.record.shard_count += count;
        cache.record.status = cache_status::CHANGING.to_string();
        cache.settling = settling;
        Ok(())
    }

    #[instrument(skip(self, _extra))]
    async fn modify_security_ips(
        &self,
        instance_id: &str,
        ips: &[String],
        _extra: &Extra,
    ) -> Result<(), ProviderError> {
        let mut state = self.state.lock().await;
        state.mutate("cache.modify_security_ips", instance_id)?;
        let cache = state
            .caches
            .get_mut(instance_id)
            .ok_or_else(|| not_found(instance_id))?;
        cache.security_ips = ips.to_vec();
        Ok(())
    }

    #[instrument(skip(self, password))]
    async fn reset_account_password(
        &self,
        instance_id: &str,
        account: &str,
        password: &str,
    ) -> Result<(), ProviderError> {
        let mut state = self.state.lock().await;
        state.mutate("cache.reset_account_password", &format!("{instance_id}/{account}"))?;
        let cache = state
            .caches
            .get_mut(instance_id)
            .ok_or_else(|| not_found(instance_id))?;

        if let Some(child) = cache.accounts.get_mut(account) {
            child.password = password.to_string();
        } else {
            cache
                .passwords
                .insert(account.to_string(), password.to_string());
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn tag_instance(&self, instance_id: &str, tags: &[Tag]) -> Result<(), ProviderError> {
        let mut state = self.state.lock().await;
        state.mutate("cache.tag_instance", instance_id)?;
        let cache = state
            .caches
            .get_mut(instance_id)
            .ok_or_else(|| not_found(instance_id))?;
        merge_tags(&mut cache.record.tags, tags);
        Ok(())
    }

    async fn list_accounts(&self, instance_id: &str) -> Result<Vec<CacheAccount>, ProviderError> {
        let mut state = self.state.lock().await;
        state.check("cache.list_accounts")?;
        let cache = state
            .caches
            .get(instance_id)
            .ok_or_else(|| not_found(instance_id))?;
        Ok(cache.accounts.values().map(|a| a.account.clone()).collect())
    }

    #[instrument(skip(self, account), fields(name = %account.name))]
    async fn create_account(&self, account: &NewCacheAccount) -> Result<(), ProviderError> {
        let mut state = self.state.lock().await;
        state.mutate(
            "cache.create_account",
            &format!("{}/{}", account.instance_id, account.name),
        )?;
        let cache = state
            .caches
            .get_mut(&account.instance_id)
            .ok_or_else(|| not_found(&account.instance_id))?;
        if cache.accounts.contains_key(&account.name) {
            return Err(ProviderError::api(
                "InvalidAccountName.Duplicate",
                format!("account {} already exists", account.name),
            ));
        }
        cache.accounts.insert(
            account.name.clone(),
            SimCacheAccount {
                account: CacheAccount {
                    name: account.name.clone(),
                    description: account.description.clone(),
                },
                password: account.password.clone(),
            },
        );
        Ok(())
    }

    #[instrument(skip(self))]
    async fn modify_account_description(
        &self,
        instance_id: &str,
        account: &str,
        description: &str,
    ) -> Result<(), ProviderError> {
        let mut state = self.state.lock().await;
        state.mutate(
            "cache.modify_account_description",
            &format!("{instance_id}/{account}"),
        )?;
        let child = state
            .caches
            .get_mut(instance_id)
            .ok_or_else(|| not_found(instance_id))?
            .accounts
            .get_mut(account)
            .ok_or_else(|| ProviderError::NotFound(format!("account {account}")))?;
        child.account.description = description.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_instance(name: &str) -> NewCacheInstance {
        NewCacheInstance {
            zone_id: "zone-a".to_string(),
            secondary_zone_id: None,
            name: name.to_string(),
            resource_group_id: None,
            vpc_id: "vpc-1".to_string(),
            vswitch_id: "vsw-1".to_string(),
            shard_class: "redis.shard.small".to_string(),
            shard_count: 2,
            password: Some("secret".to_string()),
            extra: Extra::new(),
            tags: vec![Tag::delegate(), Tag::uname(name)],
        }
    }

    #[tokio::test]
    async fn test_create_settles_after_polls() {
        let cloud = SimCloud::with_settle_polls(1);
        let id = cloud.create_instance(&new_instance("sessions")).await.unwrap();

        let ids = vec![id.clone()];
        let first = cloud.list_instances(&[], &ids).await.unwrap();
        assert_eq!(first[0].status, cache_status::CREATING);
        let second = cloud.list_instances(&[], &ids).await.unwrap();
        assert_eq!(second[0].status, cache_status::NORMAL);

        assert_eq!(
            cloud.calls().await,
            vec!["cache.create_instance:sessions".to_string()]
        );
    }

    #[tokio::test]
    async fn test_list_filters_by_tags() {
        let cloud = SimCloud::new();
        cloud.create_instance(&new_instance("a")).await.unwrap();
        cloud.create_instance(&new_instance("b")).await.unwrap();

        let found = cloud
            .list_instances(&[Tag::uname("b")], &[])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "b");
    }

    #[tokio::test]
    async fn test_add_shards_requires_normal_state() {
        let cloud = SimCloud::with_settle_polls(3);
        let id = cloud.create_instance(&new_instance("a")).await.unwrap();

        let err = cloud.add_shards(&id, 2).await.unwrap_err();
        assert!(matches!(err, ProviderError::Api { ref code, .. } if code == "IncorrectDBInstanceState"));
    }
}
