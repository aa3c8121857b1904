use anyhow::{Context, Result};
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use crate::controller::PollingController;
use crate::models::{PollingState, Snapshot};

#[derive(Debug, Serialize)]
pub struct PollingResponse {
    pub state: PollingState,
    /// Whether the request changed the polling state.
    pub changed: bool,
}

pub async fn get_stats(State(controller): State<Arc<PollingController>>) -> Json<Snapshot> {
    Json(controller.snapshot().await)
}

pub async fn get_polling(State(controller): State<Arc<PollingController>>) -> Json<PollingResponse> {
    Json(PollingResponse { state: controller.state(), changed: false })
}

pub async fn start_polling(State(controller): State<Arc<PollingController>>) -> Json<PollingResponse> {
    let changed = controller.start();
    Json(PollingResponse { state: controller.state(), changed })
}

pub async fn stop_polling(State(controller): State<Arc<PollingController>>) -> Json<PollingResponse> {
    let changed = controller.stop();
    Json(PollingResponse { state: controller.state(), changed })
}

pub fn create_router(controller: Arc<PollingController>) -> Router {
    Router::new()
        .route("/api/stats", get(get_stats))
        .route("/api/polling", get(get_polling))
        .route("/api/polling/start", post(start_polling))
        .route("/api/polling/stop", post(stop_polling))
        .with_state(controller)
}

pub async fn start_server(port: u16, controller: Arc<PollingController>) -> Result<()> {
    let app = create_router(controller);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind API port {port}"))?;
    info!("Dashboard API: http://localhost:{}/api/stats", addr.port());
    axum::serve(listener, app).await.context("API server failed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::CycleExecutor;
    use crate::models::ProbeReport;
    use crate::probe::Prober;
    use crate::registry::HostRegistry;
    use crate::store::StatusStore;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    struct UpProber;

    #[async_trait::async_trait]
    impl Prober for UpProber {
        async fn probe(&self, _host: &str) -> ProbeReport {
            ProbeReport::online(None, "ok")
        }

        fn name(&self) -> &'static str {
            "up"
        }
    }

    fn controller() -> Arc<PollingController> {
        let hosts = Arc::new(HostRegistry::from_lines(["gateway", "nas"]));
        let store = Arc::new(StatusStore::new(&hosts));
        let executor = Arc::new(CycleExecutor::new(Arc::new(UpProber), store, 4, Duration::from_secs(1)));
        Arc::new(PollingController::new(hosts, executor, Duration::from_secs(3600)))
    }

    async fn call(router: Router, method: &str, uri: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_stats_before_first_cycle() {
        let (status, body) = call(create_router(controller()), "GET", "/api/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["hosts"][0]["host"], "gateway");
        assert_eq!(body["hosts"][0]["status"], "unknown");
        assert_eq!(body["hosts"].as_array().unwrap().len(), 2);
        assert!(body["last_checked_at"].is_null());
    }

    #[tokio::test]
    async fn test_start_and_stop_endpoints() {
        let controller = controller();
        let router = create_router(Arc::clone(&controller));

        let (_, body) = call(router.clone(), "POST", "/api/polling/start").await;
        assert_eq!(body["state"], "running");
        assert_eq!(body["changed"], true);

        let (_, body) = call(router.clone(), "POST", "/api/polling/start").await;
        assert_eq!(body["changed"], false);

        let (_, body) = call(router.clone(), "POST", "/api/polling/stop").await;
        assert_eq!(body["changed"], true);

        controller.wait_stopped().await;
        let (_, body) = call(router, "GET", "/api/polling").await;
        assert_eq!(body["state"], "stopped");
    }
}
