//! HTTP router configuration

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tendcloud_api::pass::{ActionMessage, Outcomes, PassAction, PassResult};
use tendcloud_api::responses::{HealthResponse, LastPassResponse, TriggerResponse};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::api::{ApiError, passes, system};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "tendcloud",
        description = "Status API of the tendcloud reconciliation daemon"
    ),
    paths(system::health, passes::last_pass, passes::trigger),
    components(schemas(
        HealthResponse,
        LastPassResponse,
        TriggerResponse,
        PassResult,
        ActionMessage,
        PassAction,
        Outcomes,
        ApiError
    )),
    tags(
        (name = "system", description = "Daemon liveness"),
        (name = "passes", description = "Reconciliation passes")
    )
)]
pub struct ApiDoc;

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // System endpoints
        .route("/health", get(system::health))
        // Passes
        .route("/passes", post(passes::trigger))
        .route("/passes/last", get(passes::last_pass))
        // Docs
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use kameo::actor::Spawn;
    use tendcloud_core::{ControllerActor, ControllerActorArgs, Poller, Reconciler};
    use tower::ServiceExt;

    use super::*;
    use crate::factory::SimGatewayFactory;
    use crate::source::TomlFileSource;

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

    struct Harness {
        router: Router,
        _dir: tempfile::TempDir,
    }

    fn harness(settle_polls: u32) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.toml");
        std::fs::write(&path, DOCUMENT).unwrap();

        let reconciler = Reconciler::new(
            Arc::new(TomlFileSource::new(&path)),
            Arc::new(SimGatewayFactory::new(settle_polls)),
            Poller::new(Duration::from_millis(20), 50),
        );
        let controller = ControllerActor::spawn(ControllerActorArgs {
            reconciler: Arc::new(reconciler),
        });
        let state = Arc::new(AppState::new(controller));

        Harness {
            router: create_router(state),
            _dir: dir,
        }
    }

    async fn send(router: &Router, method: &str, uri: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_health() {
        let h = harness(0);
        let (status, body) = send(&h.router, "GET", "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_last_pass_empty_before_first_pass() {
        let h = harness(0);
        let (status, body) = send(&h.router, "GET", "/passes/last").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["in_flight"], false);
        assert!(body.get("result").is_none());
    }

    #[tokio::test]
    async fn test_trigger_then_read_result() {
        let h = harness(0);

        let (status, body) = send(&h.router, "POST", "/passes").await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["started"], true);

        let mut last = serde_json::Value::Null;
        for _ in 0..200 {
            let (_, body) = send(&h.router, "GET", "/passes/last").await;
            if body["in_flight"] == false && body.get("result").is_some() {
                last = body;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let result = &last["result"];
        assert!(result["error"].is_null());
        let messages = result["messages"].as_array().unwrap();
        assert!(messages.iter().any(|m| {
            m["kind"] == "cache-cluster"
                && m["action"] == "create"
                && m["outcomes"]["sessions"]["create"] == "create instance successful."
        }));
    }

    #[tokio::test]
    async fn test_trigger_while_running_conflicts() {
        let h = harness(3);

        let (first, _) = send(&h.router, "POST", "/passes").await;
        let (second, body) = send(&h.router, "POST", "/passes").await;

        assert_eq!(first, StatusCode::ACCEPTED);
        assert_eq!(second, StatusCode::CONFLICT);
        assert_eq!(body["started"], false);
    }

    #[tokio::test]
    async fn test_docs_served() {
        let h = harness(0);
        let (status, _) = send(&h.router, "GET", "/docs").await;
        assert_eq!(status, StatusCode::OK);
    }
}
