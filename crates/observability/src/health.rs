//! Health / metrics HTTP surface
//!
//! - `GET /healthz` liveness, 200 or 503
//! - `GET /readyz` readiness, 200 or 503
//! - `GET /metrics` JSON counters
//!
//! Predicates are evaluated per request through a [`HealthProbe`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

/// Source of health answers
pub trait HealthProbe: Send + Sync + 'static {
    /// Process is alive (runtime running)
    fn liveness(&self) -> bool;

    /// Ready to process messages
    fn readiness(&self) -> bool;

    /// Counter snapshot served on `/metrics`
    fn metrics(&self) -> Value;
}

type SharedProbe = Arc<dyn HealthProbe>;

/// Body of `/healthz` and `/readyz`
#[derive(Debug, Clone, Serialize)]
pub struct CheckResponse {
    pub status: &'static str,
    pub check: &'static str,
}

/// Build the router (exposed for in-process tests)
pub fn router(probe: SharedProbe) -> Router {
    Router::new()
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
        .fallback(not_found_handler)
        .with_state(probe)
}

fn check_response(healthy: bool, check: &'static str) -> (StatusCode, Json<CheckResponse>) {
    if healthy {
        (StatusCode::OK, Json(CheckResponse { status: "ok", check }))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(CheckResponse {
                status: "unhealthy",
                check,
            }),
        )
    }
}

async fn liveness_handler(State(probe): State<SharedProbe>) -> (StatusCode, Json<CheckResponse>) {
    check_response(probe.liveness(), "liveness")
}

async fn readiness_handler(
    State(probe): State<SharedProbe>,
) -> (StatusCode, Json<CheckResponse>) {
    check_response(probe.readiness(), "readiness")
}

async fn metrics_handler(State(probe): State<SharedProbe>) -> Json<Value> {
    Json(probe.metrics())
}

async fn not_found_handler() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" })))
}

/// Running health server
pub struct HealthServer {
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl HealthServer {
    /// Bind and start serving in a background task
    #[instrument(name = "health_server_start", skip(probe))]
    pub async fn start(host: &str, port: u16, probe: SharedProbe) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind((host, port))
            .await
            .with_context(|| format!("Failed to bind health server on {host}:{port}"))?;
        let local_addr = listener
            .local_addr()
            .context("Failed to read health server address")?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = router(probe);

        let task = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = server.await {
                error!(error = %e, "Health server failed");
            }
        });

        info!(addr = %local_addr, "Health server listening");

        Ok(Self {
            local_addr,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    /// Bound address (resolves port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and wait for the server task
    ///
    /// Idempotent.
    #[instrument(name = "health_server_stop", skip(self), fields(addr = %self.local_addr))]
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(Duration::from_secs(2), &mut task).await {
                Ok(_) => debug!("Health server stopped"),
                Err(_) => {
                    warn!("Health server did not stop in time, aborting");
                    task.abort();
                }
            }
        }
    }
}

impl Drop for HealthServer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tower::ServiceExt;

    #[derive(Default)]
    struct FlagProbe {
        live: AtomicBool,
        ready: AtomicBool,
    }

    impl HealthProbe for FlagProbe {
        fn liveness(&self) -> bool {
            self.live.load(Ordering::SeqCst)
        }

        fn readiness(&self) -> bool {
            self.ready.load(Ordering::SeqCst)
        }

        fn metrics(&self) -> Value {
            json!({ "messages_processed": 7 })
        }
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_liveness_ok_and_unhealthy() {
        let probe = Arc::new(FlagProbe::default());

        let (status, body) = get_json(router(probe.clone()), "/healthz").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body, json!({"status": "unhealthy", "check": "liveness"}));

        probe.live.store(true, Ordering::SeqCst);
        let (status, body) = get_json(router(probe), "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok", "check": "liveness"}));
    }

    #[tokio::test]
    async fn test_readiness_shape() {
        let probe = Arc::new(FlagProbe::default());
        probe.live.store(true, Ordering::SeqCst);

        let (status, body) = get_json(router(probe.clone()), "/readyz").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body, json!({"status": "unhealthy", "check": "readiness"}));

        probe.ready.store(true, Ordering::SeqCst);
        let (status, body) = get_json(router(probe), "/readyz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok", "check": "readiness"}));
    }

    #[tokio::test]
    async fn test_metrics_and_not_found() {
        let probe = Arc::new(FlagProbe::default());

        let (status, body) = get_json(router(probe.clone()), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["messages_processed"], 7);

        let (status, _) = get_json(router(probe), "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_server_serves_over_tcp_and_stops() {
        let probe = Arc::new(FlagProbe::default());
        probe.live.store(true, Ordering::SeqCst);

        let mut server = HealthServer::start("127.0.0.1", 0, probe).await.unwrap();
        let addr = server.local_addr();
        assert_ne!(addr.port(), 0);

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /healthz HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains(r#"{"status":"ok","check":"liveness"}"#));

        server.stop().await;
        server.stop().await;
        assert!(tokio::net::TcpStream::connect(addr).await.is_err());
    }
}
