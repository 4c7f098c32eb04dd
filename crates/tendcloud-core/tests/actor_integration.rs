use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use kameo::actor::Spawn;

use tendcloud_api::pass::PassAction;
use tendcloud_core::*;
use tendcloud_provider::{CacheGateway, QueueGateway, RelationalGateway, SimCloud};

const DOCUMENT: &str = r#"
[provider]
region = "cn-hangzhou"
zones = ["zone-a"]

[provider.vpc]
id = "vpc-1"
vswitch_ids = ["vsw-1"]

[cache.spec]
shard_class = ["redis.shard.small"]
shard_count = { min = 1, max = 64 }

[[cache.instances]]
name = "sessions"
shard_class = "redis.shard.small"
shard_count = 2
"#;

// Mock implementations
struct FixedSource {
    modified: SystemTime,
    loads: AtomicUsize,
}

#[async_trait]
impl DesiredSource for FixedSource {
    async fn load(&self) -> Result<DesiredState, CoreError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        toml::from_str(DOCUMENT).map_err(|e| CoreError::Load(e.to_string()))
    }

    async fn modified(&self) -> Result<SystemTime, CoreError> {
        Ok(self.modified)
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

fn spawn_controller(
    sim: &Arc<SimCloud>,
    source: Arc<FixedSource>,
) -> kameo::actor::ActorRef<ControllerActor> {
    let reconciler = Reconciler::new(
        source,
        Arc::new(SimFactory(Arc::clone(sim))),
        Poller::new(Duration::from_millis(1), 5),
    );
    ControllerActor::spawn(ControllerActorArgs {
        reconciler: Arc::new(reconciler),
    })
}

fn source(modified: SystemTime) -> Arc<FixedSource> {
    Arc::new(FixedSource {
        modified,
        loads: AtomicUsize::new(0),
    })
}

/// Poll the actor until the running pass has finished
async fn finished_pass(actor: &kameo::actor::ActorRef<ControllerActor>) -> PassResult {
    for _ in 0..200 {
        let last = actor.ask(GetLastPass).await.unwrap();
        if !last.in_flight
            && let Some(result) = last.result
        {
            return result;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("pass did not finish");
}

#[tokio::test]
async fn test_no_pass_before_first_trigger() {
    let sim = Arc::new(SimCloud::new());
    let actor = spawn_controller(&sim, source(SystemTime::now()));

    let last = actor.ask(GetLastPass).await.unwrap();
    assert!(!last.in_flight);
    assert!(last.result.is_none());

    actor.stop_gracefully().await.ok();
}

#[tokio::test]
async fn test_trigger_runs_pass_and_stores_result() {
    let sim = Arc::new(SimCloud::new());
    let actor = spawn_controller(&sim, source(SystemTime::now()));

    let started = actor.ask(TriggerPass).await.unwrap();
    assert!(started.started);

    let result = finished_pass(&actor).await;
    assert!(!result.is_aborted());
    let created = result
        .outcomes("cache-cluster", PassAction::Create)
        .unwrap();
    assert_eq!(created.get("sessions", "create"), Some("create instance successful."));
    assert_eq!(sim.caches_named("sessions").await.len(), 1);

    actor.stop_gracefully().await.ok();
}

#[tokio::test]
async fn test_tick_only_runs_for_newer_state() {
    let sim = Arc::new(SimCloud::new());
    let source = source(SystemTime::now() - Duration::from_secs(3600));
    let actor = spawn_controller(&sim, Arc::clone(&source));

    // nothing ran yet, so the first tick is eligible
    let first = actor.ask(Tick).await.unwrap();
    assert!(first.started);
    finished_pass(&actor).await;

    // the state was modified before that pass started
    let second = actor.ask(Tick).await.unwrap();
    assert!(!second.started);
    assert_eq!(source.loads.load(Ordering::SeqCst), 1);

    // a forced trigger ignores modification times
    let forced = actor.ask(TriggerPass).await.unwrap();
    assert!(forced.started);
    finished_pass(&actor).await;
    assert_eq!(source.loads.load(Ordering::SeqCst), 2);

    actor.stop_gracefully().await.ok();
}

#[tokio::test]
async fn test_trigger_during_pass_is_dropped() {
    // a slow settle keeps the create waiting long enough to overlap
    let sim = Arc::new(SimCloud::with_settle_polls(3));
    let source = source(SystemTime::now());
    let actor = spawn_controller(&sim, Arc::clone(&source));

    assert!(actor.ask(TriggerPass).await.unwrap().started);
    let overlapping = actor.ask(TriggerPass).await.unwrap();
    assert!(!overlapping.started);

    finished_pass(&actor).await;
    assert_eq!(source.loads.load(Ordering::SeqCst), 1);

    actor.stop_gracefully().await.ok();
}
