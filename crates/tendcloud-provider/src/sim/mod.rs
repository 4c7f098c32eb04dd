//! In-memory simulated cloud
//!
//! `SimCloud` implements every gateway trait against shared in-memory state.
//! Resources that are created or reconfigured sit in a transitional status
//! for a configurable number of status polls before reaching their serving
//! status. One-shot failures can be injected per operation, and every
//! mutating call is appended to a call log.

mod cache;
pub mod queue;
mod relational;

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::ProviderError;
use crate::types::{
    CacheAccount, CacheInstance, ConsumerGroup, Database, DbAccount, DbCluster, DbEndpoint,
    QueueInstance, ServerlessConf, Topic,
};

/// Pending transition to a stable status
#[derive(Debug, Clone)]
struct Settling<S> {
    polls_left: u32,
    target: S,
}

/// Advance a pending transition by one status poll
///
/// Returns the target status once the transition completes.
fn settle<S: Clone>(slot: &mut Option<Settling<S>>) -> Option<S> {
    let pending = slot.as_mut()?;
    if pending.polls_left > 0 {
        pending.polls_left -= 1;
        return None;
    }
    let target = pending.target.clone();
    *slot = None;
    Some(target)
}

#[derive(Debug)]
struct SimQueue {
    record: QueueInstance,
    settling: Option<Settling<i32>>,
    whitelist: BTreeMap<String, Vec<String>>,
    topics: BTreeMap<String, Topic>,
    groups: BTreeMap<String, ConsumerGroup>,
}

#[derive(Debug)]
struct SimDbAccount {
    account: DbAccount,
    password: String,
}

#[derive(Debug)]
struct SimCluster {
    record: DbCluster,
    settling: Option<Settling<String>>,
    serverless: ServerlessConf,
    endpoints: Vec<DbEndpoint>,
    security_ips: Vec<String>,
    accounts: BTreeMap<String, SimDbAccount>,
    databases: BTreeMap<String, Database>,
}

#[derive(Debug)]
struct SimCacheAccount {
    account: CacheAccount,
    password: String,
}

#[derive(Debug)]
struct SimCache {
    record: CacheInstance,
    settling: Option<Settling<String>>,
    security_ips: Vec<String>,
    /// Passwords of built-in accounts, keyed by account name
    passwords: BTreeMap<String, String>,
    accounts: BTreeMap<String, SimCacheAccount>,
}

#[derive(Debug, Default)]
struct SimState {
    next_id: u64,
    settle_polls: u32,
    queues: BTreeMap<String, SimQueue>,
    clusters: BTreeMap<String, SimCluster>,
    caches: BTreeMap<String, SimCache>,
    faults: HashMap<String, VecDeque<ProviderError>>,
    calls: Vec<String>,
}

impl SimState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{:04}", self.next_id)
    }

    /// Fail with an injected error for `op`, if one is queued
    fn check(&mut self, op: &str) -> Result<(), ProviderError> {
        match self.faults.get_mut(op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Check for an injected failure, then log a mutating call
    fn mutate(&mut self, op: &str, target: &str) -> Result<(), ProviderError> {
        self.check(op)?;
        self.calls.push(format!("{op}:{target}"));
        Ok(())
    }

    fn settling<S>(&self, target: S) -> Option<Settling<S>> {
        Some(Settling {
            polls_left: self.settle_polls,
            target,
        })
    }
}

/// In-memory cloud implementing all provider gateways
#[derive(Debug, Clone, Default)]
pub struct SimCloud {
    state: Arc<Mutex<SimState>>,
}

impl SimCloud {
    /// Create an empty cloud where transitions complete on the first poll
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty cloud where transitions need `polls` extra status polls
    #[must_use]
    pub fn with_settle_polls(polls: u32) -> Self {
        let state = SimState {
            settle_polls: polls,
            ..SimState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Make the next call of `op` (e.g. `cache.create_instance`) fail
    ///
    /// Multiple failures for the same operation are consumed in order.
    pub async fn fail_next(&self, op: &str, err: ProviderError) {
        let mut state = self.state.lock().await;
        state.faults.entry(op.to_string()).or_default().push_back(err);
    }

    /// Mutating calls made so far, as `op:target`
    pub async fn calls(&self) -> Vec<String> {
        self.state.lock().await.calls.clone()
    }

    /// Mutating calls whose operation starts with `prefix`
    pub async fn calls_matching(&self, prefix: &str) -> Vec<String> {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub async fn clear_calls(&self) {
        self.state.lock().await.calls.clear();
    }

    // ------------------------------------------------------------------------
    // Seeding
    // ------------------------------------------------------------------------

    /// Insert a queue cluster as if it already existed
    pub async fn seed_queue(&self, record: QueueInstance) {
        let mut state = self.state.lock().await;
        state.queues.insert(
            record.id.clone(),
            SimQueue {
                record,
                settling: None,
                whitelist: BTreeMap::new(),
                topics: BTreeMap::new(),
                groups: BTreeMap::new(),
            },
        );
    }

    pub async fn seed_topic(&self, instance_id: &str, topic: Topic) {
        let mut state = self.state.lock().await;
        if let Some(queue) = state.queues.get_mut(instance_id) {
            queue.topics.insert(topic.name.clone(), topic);
        }
    }

    pub async fn seed_group(&self, instance_id: &str, group: ConsumerGroup) {
        let mut state = self.state.lock().await;
        if let Some(queue) = state.queues.get_mut(instance_id) {
            queue.groups.insert(group.name.clone(), group);
        }
    }

    /// Insert a relational cluster as if it already existed
    pub async fn seed_cluster(
        &self,
        record: DbCluster,
        serverless: ServerlessConf,
        endpoints: Vec<DbEndpoint>,
    ) {
        let mut state = self.state.lock().await;
        state.clusters.insert(
            record.id.clone(),
            SimCluster {
                record,
                settling: None,
                serverless,
                endpoints,
                security_ips: Vec::new(),
                accounts: BTreeMap::new(),
                databases: BTreeMap::new(),
            },
        );
    }

    pub async fn seed_db_account(&self, cluster_id: &str, account: DbAccount, password: &str) {
        let mut state = self.state.lock().await;
        if let Some(cluster) = state.clusters.get_mut(cluster_id) {
            cluster.accounts.insert(
                account.name.clone(),
                SimDbAccount {
                    account,
                    password: password.to_string(),
                },
            );
        }
    }

    pub async fn seed_database(&self, cluster_id: &str, database: Database) {
        let mut state = self.state.lock().await;
        if let Some(cluster) = state.clusters.get_mut(cluster_id) {
            cluster.databases.insert(database.name.clone(), database);
        }
    }

    /// Insert a cache cluster as if it already existed
    pub async fn seed_cache(&self, record: CacheInstance) {
        let mut state = self.state.lock().await;
        state.caches.insert(
            record.id.clone(),
            SimCache {
                record,
                settling: None,
                security_ips: Vec::new(),
                passwords: BTreeMap::new(),
                accounts: BTreeMap::new(),
            },
        );
    }

    pub async fn seed_cache_account(&self, instance_id: &str, account: CacheAccount) {
        let mut state = self.state.lock().await;
        if let Some(cache) = state.caches.get_mut(instance_id) {
            cache.accounts.insert(
                account.name.clone(),
                SimCacheAccount {
                    account,
                    password: String::new(),
                },
            );
        }
    }

    // ------------------------------------------------------------------------
    // Inspection (never advances pending transitions)
    // ------------------------------------------------------------------------

    pub async fn queue(&self, id: &str) -> Option<QueueInstance> {
        self.state
            .lock()
            .await
            .queues
            .get(id)
            .map(|q| q.record.clone())
    }

    pub async fn queue_whitelist(&self, id: &str, group: &str) -> Vec<String> {
        self.state
            .lock()
            .await
            .queues
            .get(id)
            .and_then(|q| q.whitelist.get(group).cloned())
            .unwrap_or_default()
    }

    pub async fn topic(&self, instance_id: &str, name: &str) -> Option<Topic> {
        self.state
            .lock()
            .await
            .queues
            .get(instance_id)
            .and_then(|q| q.topics.get(name).cloned())
    }

    pub async fn cluster(&self, id: &str) -> Option<DbCluster> {
        self.state
            .lock()
            .await
            .clusters
            .get(id)
            .map(|c| c.record.clone())
    }

    pub async fn cluster_serverless(&self, id: &str) -> Option<ServerlessConf> {
        self.state
            .lock()
            .await
            .clusters
            .get(id)
            .map(|c| c.serverless)
    }

    pub async fn cluster_security_ips(&self, id: &str) -> Vec<String> {
        self.state
            .lock()
            .await
            .clusters
            .get(id)
            .map(|c| c.security_ips.clone())
            .unwrap_or_default()
    }

    pub async fn db_account(&self, cluster_id: &str, name: &str) -> Option<DbAccount> {
        self.state
            .lock()
            .await
            .clusters
            .get(cluster_id)
            .and_then(|c| c.accounts.get(name).map(|a| a.account.clone()))
    }

    pub async fn db_account_password(&self, cluster_id: &str, name: &str) -> Option<String> {
        self.state
            .lock()
            .await
            .clusters
            .get(cluster_id)
            .and_then(|c| c.accounts.get(name).map(|a| a.password.clone()))
    }

    pub async fn database(&self, cluster_id: &str, name: &str) -> Option<Database> {
        self.state
            .lock()
            .await
            .clusters
            .get(cluster_id)
            .and_then(|c| c.databases.get(name).cloned())
    }

    pub async fn cache(&self, id: &str) -> Option<CacheInstance> {
        self.state
            .lock()
            .await
            .caches
            .get(id)
            .map(|c| c.record.clone())
    }

    /// Cache clusters whose `uname` tag equals `name`
    pub async fn caches_named(&self, name: &str) -> Vec<CacheInstance> {
        use crate::tags::TagsExt;

        self.state
            .lock()
            .await
            .caches
            .values()
            .filter(|c| c.record.tags.logical_name() == Some(name))
            .map(|c| c.record.clone())
            .collect()
    }

    pub async fn cache_security_ips(&self, id: &str) -> Vec<String> {
        self.state
            .lock()
            .await
            .caches
            .get(id)
            .map(|c| c.security_ips.clone())
            .unwrap_or_default()
    }

    /// Password of a cache account, built-in (named after the instance) or child
    pub async fn cache_password(&self, instance_id: &str, account: &str) -> Option<String> {
        let state = self.state.lock().await;
        let cache = state.caches.get(instance_id)?;
        match cache.accounts.get(account) {
            Some(child) => Some(child.password.clone()),
            None => cache.passwords.get(account).cloned(),
        }
    }

    pub async fn cache_account(&self, instance_id: &str, name: &str) -> Option<CacheAccount> {
        self.state
            .lock()
            .await
            .caches
            .get(instance_id)
            .and_then(|c| c.accounts.get(name).map(|a| a.account.clone()))
    }
}
