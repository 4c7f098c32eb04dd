use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;

use tendcloud_api::pass::PassAction;
use tendcloud_core::*;
use tendcloud_provider::tags::ownership_tags;
use tendcloud_provider::types::{CacheInstance, PaidType, QueueInstance, cache_status, queue_status};
use tendcloud_provider::{
    CacheGateway, ProviderError, QueueGateway, RelationalGateway, SimCloud, Tag,
};

const PROVIDER: &str = r#"
[provider]
region = "cn-hangzhou"
zones = ["zone-a", "zone-b"]

[provider.vpc]
id = "vpc-1"
vswitch_ids = ["vsw-1"]
cluster_ips = ["10.0.0.0/16"]
"#;

const CACHE_SPEC: &str = r#"
[cache.spec]
shard_class = ["redis.shard.small", "redis.shard.large"]
shard_count = { min = 1, max = 64 }
"#;

// Mock implementations
struct StaticSource {
    state: Mutex<DesiredState>,
    modified: Mutex<SystemTime>,
}

impl StaticSource {
    fn new(document: &str) -> Self {
        Self {
            state: Mutex::new(parse(document)),
            modified: Mutex::new(SystemTime::now()),
        }
    }

    fn replace(&self, document: &str) {
        *self.state.lock().unwrap() = parse(document);
        *self.modified.lock().unwrap() = SystemTime::now();
    }
}

#[async_trait]
impl DesiredSource for StaticSource {
    async fn load(&self) -> Result<DesiredState, CoreError> {
        Ok(self.state.lock().unwrap().clone())
    }

    async fn modified(&self) -> Result<SystemTime, CoreError> {
        Ok(*self.modified.lock().unwrap())
    }
}

struct SimFactory(Arc<SimCloud>);

#[async_trait]
impl GatewayFactory for SimFactory {
    async fn queue(&self, _settings: &ProviderSettings) -> Result<Arc<dyn QueueGateway>, CoreError> {
        Ok(self.0.clone())
    }

    async fn relational(
        &self,
        _settings: &ProviderSettings,
    ) -> Result<Arc<dyn RelationalGateway>, CoreError> {
        Ok(self.0.clone())
    }

    async fn cache(&self, _settings: &ProviderSettings) -> Result<Arc<dyn CacheGateway>, CoreError> {
        Ok(self.0.clone())
    }
}

fn parse(document: &str) -> DesiredState {
    toml::from_str(document).unwrap()
}

fn reconciler(sim: &Arc<SimCloud>, source: Arc<StaticSource>) -> Reconciler {
    Reconciler::new(
        source,
        Arc::new(SimFactory(Arc::clone(sim))),
        Poller::new(Duration::from_millis(1), 5),
    )
}

fn cache_document(instances: &str) -> String {
    format!("{PROVIDER}{CACHE_SPEC}{instances}")
}

fn cache_record(id: &str, name: &str, shard_count: u32) -> CacheInstance {
    CacheInstance {
        id: id.to_string(),
        name: name.to_string(),
        shard_class: "redis.shard.small".to_string(),
        shard_count,
        status: cache_status::NORMAL.to_string(),
        connection_domain: format!("{id}.cache.sim.internal"),
        port: 6379,
        tags: ownership_tags(name),
    }
}

#[tokio::test]
async fn test_missing_cluster_is_created() {
    let sim = Arc::new(SimCloud::new());
    let source = Arc::new(StaticSource::new(&cache_document(
        r#"
[[cache.instances]]
name = "A"
shard_class = "redis.shard.small"
shard_count = 4
"#,
    )));

    let result = reconciler(&sim, source).run_pass().await;

    assert!(!result.is_aborted());
    let created = result
        .outcomes("cache-cluster", PassAction::Create)
        .unwrap();
    assert_eq!(created.get("A", "create"), Some("create instance successful."));
    assert_eq!(created.get("A", "whitelist"), Some("update whitelist successful."));

    let caches = sim.caches_named("A").await;
    assert_eq!(caches.len(), 1);
    assert_eq!(caches[0].shard_count, 4);
    assert_eq!(sim.cache_security_ips(&caches[0].id).await, vec!["10.0.0.0/16"]);
}

#[tokio::test]
async fn test_undesired_cluster_is_tagged_once() {
    let sim = Arc::new(SimCloud::new());
    sim.seed_cache(cache_record("r-1", "A", 4)).await;
    let source = Arc::new(StaticSource::new(&cache_document("")));
    let reconciler = reconciler(&sim, source);

    let first = reconciler.run_pass().await;
    let removed = first
        .outcomes("cache-cluster", PassAction::Removing)
        .unwrap();
    assert_eq!(removed.get("A", "removing"), Some("removing instance successful."));
    assert_eq!(sim.calls().await, vec!["cache.tag_instance:r-1"]);

    sim.clear_calls().await;
    let second = reconciler.run_pass().await;
    let removed = second
        .outcomes("cache-cluster", PassAction::Removing)
        .unwrap();
    assert!(removed.get("A", "already-removing").is_some());
    assert!(sim.calls().await.is_empty());
}

#[tokio::test]
async fn test_duplicate_desired_names_are_excluded() {
    let sim = Arc::new(SimCloud::new());
    let source = Arc::new(StaticSource::new(&cache_document(
        r#"
[[cache.instances]]
name = "A"
shard_class = "redis.shard.small"
shard_count = 4

[[cache.instances]]
name = "A"
shard_class = "redis.shard.large"
shard_count = 8
"#,
    )));

    let result = reconciler(&sim, source).run_pass().await;

    let created = result
        .outcomes("cache-cluster", PassAction::Create)
        .unwrap();
    assert!(created.get("A", "duplicate-configuration").is_some());
    assert!(created.get("A", "create").is_none());
    assert!(sim.calls_matching("cache.create_instance").await.is_empty());
}

#[tokio::test]
async fn test_duplicate_existing_names_abort_pass() {
    let sim = Arc::new(SimCloud::new());
    sim.seed_cache(cache_record("r-1", "A", 4)).await;
    sim.seed_cache(cache_record("r-2", "A", 4)).await;
    let source = Arc::new(StaticSource::new(&cache_document(
        r#"
[[cache.instances]]
name = "B"
shard_class = "redis.shard.small"
shard_count = 2
"#,
    )));

    let result = reconciler(&sim, source).run_pass().await;

    assert!(result.is_aborted());
    assert!(result.error.as_deref().unwrap().contains("duplicate existing"));
    assert!(result.messages.is_empty());
    assert!(sim.calls().await.is_empty());
}

#[tokio::test]
async fn test_list_failure_aborts_before_any_family_mutates() {
    let sim = Arc::new(SimCloud::new());
    sim.fail_next(
        "cache.list_instances",
        ProviderError::Unavailable("throttled".to_string()),
    )
    .await;
    let document = format!(
        "{}{}",
        cache_document(""),
        r#"
[relational.spec]
scale = { min = 1, max = 32 }
scale_ro_num = { min = 0, max = 7 }

[[relational.instances]]
name = "orders"
scale_min = 1
scale_max = 8
scale_ro_num_min = 0
scale_ro_num_max = 2
"#
    );
    let source = Arc::new(StaticSource::new(&document));

    let result = reconciler(&sim, source).run_pass().await;

    assert!(result.is_aborted());
    // the relational family is listed first but must not create anything
    assert!(sim.calls().await.is_empty());
}

#[tokio::test]
async fn test_unchanged_cluster_makes_no_calls() {
    let sim = Arc::new(SimCloud::new());
    sim.seed_cache(cache_record("r-1", "A", 4)).await;
    let source = Arc::new(StaticSource::new(&cache_document(
        r#"
[[cache.instances]]
name = "A"
shard_class = "redis.shard.small"
shard_count = 4
"#,
    )));

    let result = reconciler(&sim, source).run_pass().await;

    let modified = result
        .outcomes("cache-cluster", PassAction::Modify)
        .unwrap();
    assert_eq!(
        modified.get("A", "no-op"),
        Some("modify ignored, configuration unchanged.")
    );
    assert!(sim.calls().await.is_empty());
}

#[tokio::test]
async fn test_shard_growth_is_applied() {
    let sim = Arc::new(SimCloud::new());
    sim.seed_cache(cache_record("r-1", "A", 4)).await;
    let source = Arc::new(StaticSource::new(&cache_document(
        r#"
[[cache.instances]]
name = "A"
shard_class = "redis.shard.small"
shard_count = 6
"#,
    )));

    let result = reconciler(&sim, source).run_pass().await;

    let modified = result
        .outcomes("cache-cluster", PassAction::Modify)
        .unwrap();
    assert_eq!(
        modified.get("A", "update-shard-count"),
        Some("update shard-count successful.")
    );
    assert_eq!(sim.cache("r-1").await.unwrap().shard_count, 6);
}

#[tokio::test]
async fn test_provider_failure_is_isolated_per_resource() {
    let sim = Arc::new(SimCloud::new());
    sim.fail_next(
        "cache.create_instance",
        ProviderError::api("QuotaExceeded", "quota exceeded").with_recommend("raise the quota"),
    )
    .await;
    let source = Arc::new(StaticSource::new(&cache_document(
        r#"
[[cache.instances]]
name = "A"
shard_class = "redis.shard.small"
shard_count = 2

[[cache.instances]]
name = "B"
shard_class = "redis.shard.small"
shard_count = 2
"#,
    )));

    let result = reconciler(&sim, source).run_pass().await;

    assert!(!result.is_aborted());
    let created = result
        .outcomes("cache-cluster", PassAction::Create)
        .unwrap();
    assert_eq!(
        created.get("A", "create"),
        Some("create instance failure: quota exceeded\nraise the quota")
    );
    assert_eq!(created.get("B", "create"), Some("create instance successful."));
    assert!(sim.caches_named("A").await.is_empty());
    assert_eq!(sim.caches_named("B").await.len(), 1);
}

#[tokio::test]
async fn test_invalid_capacity_skips_every_step() {
    let sim = Arc::new(SimCloud::new());
    let source = Arc::new(StaticSource::new(&cache_document(
        r#"
[[cache.instances]]
name = "A"
shard_class = "redis.shard.huge"
shard_count = 128
"#,
    )));

    let result = reconciler(&sim, source).run_pass().await;

    let created = result
        .outcomes("cache-cluster", PassAction::Create)
        .unwrap();
    assert!(created.get("A", "check-shard-class").is_some());
    assert!(created.get("A", "check-shard-count").is_some());
    assert!(sim.calls().await.is_empty());
}

#[tokio::test]
async fn test_cache_accounts_follow_domains() {
    let sim = Arc::new(SimCloud::new());
    let source = Arc::new(StaticSource::new(&cache_document(
        r#"
[[cache.instances]]
name = "A"
shard_class = "redis.shard.small"
shard_count = 2

[cache.instances.domains.billing.account]
password = "Secret1"
"#,
    )));
    let reconciler = reconciler(&sim, Arc::clone(&source));

    let result = reconciler.run_pass().await;
    let accounts = result
        .outcomes("cache-account", PassAction::Create)
        .unwrap();
    assert_eq!(accounts.get("billing", "create"), Some("create account successful."));

    let id = sim.caches_named("A").await[0].id.clone();
    assert!(sim.cache_account(&id, "billing").await.is_some());
    assert_eq!(sim.cache_password(&id, "billing").await.as_deref(), Some("billingSecret1"));

    // dropping the domain tags the account instead of deleting it
    source.replace(&cache_document(
        r#"
[[cache.instances]]
name = "A"
shard_class = "redis.shard.small"
shard_count = 2
"#,
    ));
    let result = reconciler.run_pass().await;
    let removed = result
        .outcomes("cache-account", PassAction::Removing)
        .unwrap();
    assert_eq!(removed.get("billing", "removing"), Some("removing account successful."));
    assert!(sim.cache_account(&id, "billing").await.is_some());
}

#[tokio::test]
async fn test_queue_cluster_is_ordered_deployed_and_populated() {
    let sim = Arc::new(SimCloud::new());
    let document = format!(
        "{PROVIDER}{}",
        r#"
[queue.spec.alikafka_pre."alikafka.io.standard"]
partition_num = { min = 50, max = 1000 }
disk_size = { min = 500, max = 3000 }

[[queue.instances]]
name = "events"
paid_type = "postpaid"
spec_type = "alikafka_pre"
io_max_spec = "alikafka.io.standard"
disk_size = 500
partition_num = 0

[[queue.instances.domains.billing.topics]]
name = "invoices"
partition_num = 12

[[queue.instances.domains.billing.groups]]
name = "invoice-workers"
"#
    );
    let source = Arc::new(StaticSource::new(&document));
    let reconciler = reconciler(&sim, source);

    let result = reconciler.run_pass().await;

    assert!(!result.is_aborted());
    let created = result
        .outcomes("queue-cluster", PassAction::Create)
        .unwrap();
    assert_eq!(created.get("events", "create"), Some("create instance successful."));
    assert_eq!(created.get("events", "deploy"), Some("deploy instance successful."));
    assert_eq!(created.get("events", "whitelist"), Some("update whitelist successful."));

    let topics = result.outcomes("topic", PassAction::Create).unwrap();
    assert_eq!(topics.get("invoices", "create"), Some("create topic successful."));
    let groups = result
        .outcomes("consumer-group", PassAction::Create)
        .unwrap();
    assert_eq!(groups.get("invoice-workers", "create"), Some("create group successful."));

    let listed = QueueGateway::list_instances(&*sim, &ownership_tags("events"), &[])
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    let id = &listed[0].id;
    assert_eq!(sim.topic(id, "invoices").await.unwrap().partition_num, 12);
    assert_eq!(sim.queue_whitelist(id, "managed").await, vec!["10.0.0.0/16"]);

    // a second pass finds everything in place
    sim.clear_calls().await;
    let again = reconciler.run_pass().await;
    let modified = again
        .outcomes("queue-cluster", PassAction::Modify)
        .unwrap();
    assert!(modified.get("events", "no-op").is_some());
    assert!(sim.calls().await.is_empty());
}

#[tokio::test]
async fn test_relational_cluster_is_claimed_then_populated() {
    let sim = Arc::new(SimCloud::new());
    let document = format!(
        "{PROVIDER}{}",
        r#"
[relational.spec]
scale = { min = 1, max = 32 }
scale_ro_num = { min = 0, max = 7 }

[[relational.instances]]
name = "orders"
scale_min = 1
scale_max = 8
scale_ro_num_min = 0
scale_ro_num_max = 2

[relational.instances.domains.billing]
account = { password = "Secret1" }
databases = [{ name = "invoices" }]
"#
    );
    let source = Arc::new(StaticSource::new(&document));

    let result = reconciler(&sim, source).run_pass().await;

    assert!(!result.is_aborted());
    let created = result
        .outcomes("relational-cluster", PassAction::Create)
        .unwrap();
    assert_eq!(created.get("orders", "create"), Some("create instance successful."));
    assert_eq!(
        created.get("orders", "create-tag"),
        Some("tag instance for create successful.")
    );

    let clusters = RelationalGateway::list_clusters(&*sim, &ownership_tags("orders"), &[])
        .await
        .unwrap();
    assert_eq!(clusters.len(), 1);
    let id = &clusters[0].id;

    let accounts = result
        .outcomes("database-account", PassAction::Create)
        .unwrap();
    assert_eq!(accounts.get("billing", "create"), Some("create account successful."));
    let databases = result.outcomes("database", PassAction::Create).unwrap();
    assert_eq!(databases.get("invoices", "create"), Some("create database successful."));

    assert!(sim.db_account(id, "billing").await.is_some());
    assert!(sim.database(id, "invoices").await.is_some());
}

#[tokio::test]
async fn test_children_wait_for_serving_parent() {
    let sim = Arc::new(SimCloud::new());
    let mut record = cache_record("r-1", "A", 2);
    record.status = cache_status::CHANGING.to_string();
    sim.seed_cache(record).await;
    let source = Arc::new(StaticSource::new(&cache_document(
        r#"
[[cache.instances]]
name = "A"
shard_class = "redis.shard.small"
shard_count = 2

[cache.instances.domains.billing.account]
password = "Secret1"
"#,
    )));

    let result = reconciler(&sim, source).run_pass().await;

    let checked = result
        .outcomes("cache-cluster", PassAction::Check)
        .unwrap();
    assert_eq!(
        checked.get("A", "check"),
        Some("instance is Changing, not serving, children skipped.")
    );
    assert!(result.outcomes("cache-account", PassAction::Create).is_none());
    assert!(sim.calls_matching("cache.create_account").await.is_empty());
}

#[tokio::test]
async fn test_removing_tag_is_never_modified() {
    let sim = Arc::new(SimCloud::new());
    sim.seed_cache(cache_record("r-1", "A", 2)).await;
    CacheGateway::tag_instance(&*sim, "r-1", &[Tag::removing()])
        .await
        .unwrap();
    sim.clear_calls().await;
    let source = Arc::new(StaticSource::new(&cache_document(
        r#"
[[cache.instances]]
name = "A"
shard_class = "redis.shard.small"
shard_count = 8
"#,
    )));

    let result = reconciler(&sim, source).run_pass().await;

    let modified = result
        .outcomes("cache-cluster", PassAction::Modify)
        .unwrap();
    assert!(modified.get("A", "already-removing").is_some());
    assert!(sim.calls().await.is_empty());
    assert_eq!(sim.cache("r-1").await.unwrap().shard_count, 2);
}

#[tokio::test]
async fn test_cache_without_logical_name_is_not_adopted() {
    let sim = Arc::new(SimCloud::new());
    let mut record = cache_record("r-9", "A", 2);
    record.tags = vec![Tag::delegate()];
    sim.seed_cache(record).await;
    let source = Arc::new(StaticSource::new(&cache_document(
        r#"
[[cache.instances]]
name = "A"
shard_class = "redis.shard.small"
shard_count = 4
"#,
    )));

    let result = reconciler(&sim, source).run_pass().await;

    assert!(!result.is_aborted());
    assert!(result.outcomes("cache-cluster", PassAction::Modify).is_none());
    assert!(result.outcomes("cache-cluster", PassAction::Removing).is_none());
    let created = result
        .outcomes("cache-cluster", PassAction::Create)
        .unwrap();
    assert_eq!(created.get("A", "create"), Some("create instance successful."));

    let untouched = sim.cache("r-9").await.unwrap();
    assert_eq!(untouched.shard_count, 2);
    assert!(sim.calls_matching("cache.add_shards:r-9").await.is_empty());
    assert!(sim.calls_matching("cache.modify_security_ips:r-9").await.is_empty());
}

const QUEUE_EVENTS: &str = r#"
[queue.spec.alikafka_pre."alikafka.io.standard"]
partition_num = { min = 50, max = 1000 }
disk_size = { min = 500, max = 3000 }

[[queue.instances]]
name = "events"
paid_type = "postpaid"
spec_type = "alikafka_pre"
io_max_spec = "alikafka.io.standard"
disk_size = 800
partition_num = 0
"#;

fn queue_record(id: &str, name: &str, status_code: i32) -> QueueInstance {
    QueueInstance {
        id: id.to_string(),
        paid_type: PaidType::Postpaid,
        spec_type: "alikafka_pre".to_string(),
        io_max_spec: "alikafka.io.standard".to_string(),
        disk_size: 500,
        topic_num_limit: 50,
        status_code,
        endpoint: None,
        tags: ownership_tags(name),
    }
}

#[tokio::test]
async fn test_stopped_queue_is_deployed_before_upgrade() {
    let sim = Arc::new(SimCloud::new());
    sim.seed_queue(queue_record("alikafka-9", "events", queue_status::STOPPED))
        .await;
    let source = Arc::new(StaticSource::new(&format!("{PROVIDER}{QUEUE_EVENTS}")));

    let result = reconciler(&sim, source).run_pass().await;

    let modified = result
        .outcomes("queue-cluster", PassAction::Modify)
        .unwrap();
    assert_eq!(modified.get("events", "start"), None);
    assert_eq!(modified.get("events", "upgrade"), Some("upgrade instance successful."));

    let calls = sim.calls().await;
    let deploy = calls
        .iter()
        .position(|c| c == "queue.deploy_instance:alikafka-9")
        .unwrap();
    let upgrade = calls
        .iter()
        .position(|c| c == "queue.upgrade_instance:alikafka-9")
        .unwrap();
    assert!(deploy < upgrade);
    assert_eq!(sim.queue("alikafka-9").await.unwrap().disk_size, 800);
}

#[tokio::test]
async fn test_never_serving_cluster_skips_modify_steps() {
    let sim = Arc::new(SimCloud::new());
    let mut record = cache_record("r-1", "A", 2);
    record.status = cache_status::CHANGING.to_string();
    sim.seed_cache(record).await;
    let source = Arc::new(StaticSource::new(&cache_document(
        r#"
[[cache.instances]]
name = "A"
shard_class = "redis.shard.small"
shard_count = 4
"#,
    )));

    let result = reconciler(&sim, source).run_pass().await;

    let modified = result
        .outcomes("cache-cluster", PassAction::Modify)
        .unwrap();
    assert_eq!(
        modified.get("A", "start"),
        Some("instance not serving within 5ms, remaining steps skipped.")
    );
    assert_eq!(modified.get("A", "update-shard-count"), None);
    assert_eq!(modified.get("A", "whitelist"), None);
    assert!(sim.calls().await.is_empty());
    assert_eq!(sim.cache("r-1").await.unwrap().shard_count, 2);
}
