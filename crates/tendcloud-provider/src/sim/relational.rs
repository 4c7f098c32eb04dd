//! Simulated relational database gateway

use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{SimCloud, SimCluster, SimDbAccount, settle};
use crate::error::ProviderError;
use crate::tags::{Tag, TagsExt, merge_tags};
use crate::traits::RelationalGateway;
use crate::types::{
    Database, DbAccount, DbCluster, DbEndpoint, DbPrivilege, Extra, NewDatabase, NewDbAccount,
    NewDbCluster, ServerlessConf, relational_status,
};

fn not_found(id: &str) -> ProviderError {
    ProviderError::api("InvalidDBClusterId.NotFound", format!("cluster {id} does not exist"))
        .with_recommend("check the cluster id")
}

fn account_not_found(name: &str) -> ProviderError {
    ProviderError::api("InvalidAccountName.NotFound", format!("account {name} does not exist"))
}

#[async_trait]
impl RelationalGateway for SimCloud {
    async fn list_clusters(
        &self,
        tags: &[Tag],
        ids: &[String],
    ) -> Result<Vec<DbCluster>, ProviderError> {
        let mut state = self.state.lock().await;
        state.check("relational.list_clusters")?;

        let mut found = Vec::new();
        for cluster in state.clusters.values_mut() {
            if !cluster.record.tags.matches_all(tags)
                || (!ids.is_empty() && !ids.contains(&cluster.record.id))
            {
                continue;
            }
            if let Some(status) = settle(&mut cluster.settling) {
                cluster.record.status = status;
            }
            found.push(cluster.record.clone());
        }
        Ok(found)
    }

    async fn serverless_conf(&self, cluster_id: &str) -> Result<ServerlessConf, ProviderError> {
        let mut state = self.state.lock().await;
        state.check("relational.serverless_conf")?;
        state
            .clusters
            .get(cluster_id)
            .map(|c| c.serverless)
            .ok_or_else(|| not_found(cluster_id))
    }

    async fn endpoints(&self, cluster_id: &str) -> Result<Vec<DbEndpoint>, ProviderError> {
        let mut state = self.state.lock().await;
        state.check("relational.endpoints")?;
        state
            .clusters
            .get(cluster_id)
            .map(|c| c.endpoints.clone())
            .ok_or_else(|| not_found(cluster_id))
    }

    #[instrument(skip(self, cluster), fields(description = %cluster.description))]
    async fn create_cluster(&self, cluster: &NewDbCluster) -> Result<String, ProviderError> {
        let mut state = self.state.lock().await;
        state.mutate("relational.create_cluster", &cluster.description)?;

        let id = state.next_id("pc");
        let settling = state.settling(relational_status::RUNNING.to_string());
        let record = DbCluster {
            id: id.clone(),
            description: cluster.description.clone(),
            status: relational_status::CREATING.to_string(),
            tags: Vec::new(),
        };
        let endpoints = vec![DbEndpoint {
            endpoint_type: "Cluster".to_string(),
            connection_string: format!("{id}.rwlb.sim.internal"),
            port: 3306,
        }];
        state.clusters.insert(
            id.clone(),
            SimCluster {
                record,
                settling,
                serverless: cluster.serverless,
                endpoints,
                security_ips: cluster.security_ips.clone(),
                accounts: BTreeMap::new(),
                databases: BTreeMap::new(),
            },
        );

        debug!(id = %id, "created relational cluster");
        Ok(id)
    }

    #[instrument(skip(self))]
    async fn modify_serverless(
        &self,
        cluster_id: &str,
        conf: &ServerlessConf,
    ) -> Result<(), ProviderError> {
        let mut state = self.state.lock().await;
        state.mutate("relational.modify_serverless", cluster_id)?;
        let settling = state.settling(relational_status::RUNNING.to_string());

        let cluster = state
            .clusters
            .get_mut(cluster_id)
            .ok_or_else(|| not_found(cluster_id))?;
        if cluster.record.status != relational_status::RUNNING {
            return Err(ProviderError::api(
                "OperationDenied.DBClusterStatus",
                format!("cluster {cluster_id} is {}", cluster.record.status),
            ));
        }
        if conf.scale_min > conf.scale_max || conf.scale_ro_num_min > conf.scale_ro_num_max {
            return Err(ProviderError::api(
                "InvalidParameter.Scale",
                "minimum scale exceeds maximum",
            ));
        }
        cluster.serverless = *conf;
        cluster.record.status = relational_status::CHANGING.to_string();
        cluster.settling = settling;
        Ok(())
    }

    #[instrument(skip(self, _extra))]
    async fn modify_security_ips(
        &self,
        cluster_id: &str,
        ips: &[String],
        _extra: &Extra,
    ) -> Result<(), ProviderError> {
        let mut state = self.state.lock().await;
        state.mutate("relational.modify_security_ips", cluster_id)?;
        let cluster = state
            .clusters
            .get_mut(cluster_id)
            .ok_or_else(|| not_found(cluster_id))?;
        cluster.security_ips = ips.to_vec();
        Ok(())
    }

    #[instrument(skip(self))]
    async fn tag_cluster(&self, cluster_id: &str, tags: &[Tag]) -> Result<(), ProviderError> {
        let mut state = self.state.lock().await;
        state.mutate("relational.tag_cluster", cluster_id)?;
        let cluster = state
            .clusters
            .get_mut(cluster_id)
            .ok_or_else(|| not_found(cluster_id))?;
        merge_tags(&mut cluster.record.tags, tags);
        Ok(())
    }

    async fn list_accounts(&self, cluster_id: &str) -> Result<Vec<DbAccount>, ProviderError> {
        let mut state = self.state.lock().await;
        state.check("relational.list_accounts")?;
        let cluster = state
            .clusters
            .get(cluster_id)
            .ok_or_else(|| not_found(cluster_id))?;
        Ok(cluster.accounts.values().map(|a| a.account.clone()).collect())
    }

    #[instrument(skip(self, account), fields(name = %account.name))]
    async fn create_account(&self, account: &NewDbAccount) -> Result<(), ProviderError> {
        let mut state = self.state.lock().await;
        state.mutate(
            "relational.create_account",
            &format!("{}/{}", account.cluster_id, account.name),
        )?;
        let cluster = state
            .clusters
            .get_mut(&account.cluster_id)
            .ok_or_else(|| not_found(&account.cluster_id))?;
        if cluster.accounts.contains_key(&account.name) {
            return Err(ProviderError::api(
                "InvalidAccountName.Duplicate",
                format!("account {} already exists", account.name),
            ));
        }
        cluster.accounts.insert(
            account.name.clone(),
            SimDbAccount {
                account: DbAccount {
                    name: account.name.clone(),
                    description: account.description.clone().unwrap_or_default(),
                    privileges: Vec::new(),
                },
                password: account.password.clone(),
            },
        );
        Ok(())
    }

    #[instrument(skip(self, password))]
    async fn reset_account_password(
        &self,
        cluster_id: &str,
        account: &str,
        password: &str,
    ) -> Result<(), ProviderError> {
        let mut state = self.state.lock().await;
        state.mutate(
            "relational.reset_account_password",
            &format!("{cluster_id}/{account}"),
        )?;
        let entry = state
            .clusters
            .get_mut(cluster_id)
            .ok_or_else(|| not_found(cluster_id))?
            .accounts
            .get_mut(account)
            .ok_or_else(|| account_not_found(account))?;
        entry.password = password.to_string();
        Ok(())
    }

    #[instrument(skip(self))]
    async fn modify_account_description(
        &self,
        cluster_id: &str,
        account: &str,
        description: &str,
    ) -> Result<(), ProviderError> {
        let mut state = self.state.lock().await;
        state.mutate(
            "relational.modify_account_description",
            &format!("{cluster_id}/{account}"),
        )?;
        let entry = state
            .clusters
            .get_mut(cluster_id)
            .ok_or_else(|| not_found(cluster_id))?
            .accounts
            .get_mut(account)
            .ok_or_else(|| account_not_found(account))?;
        entry.account.description = description.to_string();
        Ok(())
    }

    #[instrument(skip(self))]
    async fn grant_privilege(
        &self,
        cluster_id: &str,
        account: &str,
        databases: &[String],
        privilege: &str,
    ) -> Result<(), ProviderError> {
        let mut state = self.state.lock().await;
        state.mutate(
            "relational.grant_privilege",
            &format!("{cluster_id}/{account}"),
        )?;
        let cluster = state
            .clusters
            .get_mut(cluster_id)
            .ok_or_else(|| not_found(cluster_id))?;
        if let Some(missing) = databases.iter().find(|d| !cluster.databases.contains_key(*d)) {
            return Err(ProviderError::api(
                "InvalidDBName.NotFound",
                format!("database {missing} does not exist"),
            ));
        }
        let entry = cluster
            .accounts
            .get_mut(account)
            .ok_or_else(|| account_not_found(account))?;
        for database in databases {
            entry.account.privileges.retain(|p| &p.database != database);
            entry.account.privileges.push(DbPrivilege {
                database: database.clone(),
                privilege: privilege.to_string(),
            });
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn revoke_privilege(
        &self,
        cluster_id: &str,
        account: &str,
        databases: &[String],
    ) -> Result<(), ProviderError> {
        let mut state = self.state.lock().await;
        state.mutate(
            "relational.revoke_privilege",
            &format!("{cluster_id}/{account}"),
        )?;
        let entry = state
            .clusters
            .get_mut(cluster_id)
            .ok_or_else(|| not_found(cluster_id))?
            .accounts
            .get_mut(account)
            .ok_or_else(|| account_not_found(account))?;
        entry
            .account
            .privileges
            .retain(|p| !databases.contains(&p.database));
        Ok(())
    }

    async fn list_databases(&self, cluster_id: &str) -> Result<Vec<Database>, ProviderError> {
        let mut state = self.state.lock().await;
        state.check("relational.list_databases")?;
        let cluster = state
            .clusters
            .get(cluster_id)
            .ok_or_else(|| not_found(cluster_id))?;
        Ok(cluster.databases.values().cloned().collect())
    }

    #[instrument(skip(self))]
    async fn create_database(&self, database: &NewDatabase) -> Result<(), ProviderError> {
        let mut state = self.state.lock().await;
        state.mutate(
            "relational.create_database",
            &format!("{}/{}", database.cluster_id, database.name),
        )?;
        let cluster = state
            .clusters
            .get_mut(&database.cluster_id)
            .ok_or_else(|| not_found(&database.cluster_id))?;
        if cluster.databases.contains_key(&database.name) {
            return Err(ProviderError::api(
                "InvalidDBName.Duplicate",
                format!("database {} already exists", database.name),
            ));
        }
        let owner = cluster
            .accounts
            .get_mut(&database.owner)
            .ok_or_else(|| account_not_found(&database.owner))?;
        owner.account.privileges.push(DbPrivilege {
            database: database.name.clone(),
            privilege: "ReadWrite".to_string(),
        });
        cluster.databases.insert(
            database.name.clone(),
            Database {
                name: database.name.clone(),
                description: database.description.clone(),
            },
        );
        Ok(())
    }

    #[instrument(skip(self))]
    async fn modify_database_description(
        &self,
        cluster_id: &str,
        database: &str,
        description: &str,
    ) -> Result<(), ProviderError> {
        let mut state = self.state.lock().await;
        state.mutate(
            "relational.modify_database_description",
            &format!("{cluster_id}/{database}"),
        )?;
        let entry = state
            .clusters
            .get_mut(cluster_id)
            .ok_or_else(|| not_found(cluster_id))?
            .databases
            .get_mut(database)
            .ok_or_else(|| {
                ProviderError::api(
                    "InvalidDBName.NotFound",
                    format!("database {database} does not exist"),
                )
            })?;
        entry.description = description.to_string();
        Ok(())
    }
}
