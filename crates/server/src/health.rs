//! HTTP transport for the liveness signal.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use tagdeploy_core::LivenessMonitor;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn health(State(monitor): State<LivenessMonitor>) -> (StatusCode, Json<HealthResponse>) {
    if monitor.is_alive() {
        (StatusCode::OK, Json(HealthResponse { status: "ok" }))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse { status: "down" }),
        )
    }
}

pub fn router(monitor: LivenessMonitor) -> Router {
    Router::new()
        .route("/health", get(health))
        .with_state(monitor)
}

/// Serves `GET /health` until stopped.
pub struct HealthServer {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl HealthServer {
    /// Bind `addr` and start serving in the background.
    pub async fn start(addr: SocketAddr, monitor: LivenessMonitor) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind liveness endpoint to {}", addr))?;
        let local_addr = listener.local_addr().context("Failed to read bound address")?;

        let shutdown = CancellationToken::new();
        let signal = shutdown.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router(monitor))
                .with_graceful_shutdown(async move { signal.cancelled().await })
                .await
            {
                warn!("Liveness endpoint failed: {}", e);
            }
        });

        info!("Liveness endpoint listening on {}", local_addr);
        Ok(Self {
            local_addr,
            shutdown,
            handle,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting requests and wait for in-flight ones.
    pub async fn stop(self) {
        self.shutdown.cancel();
        if let Err(e) = self.handle.await {
            warn!("Liveness endpoint task failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn get_health(app: Router) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn flags(consumer: bool, workers: bool) -> (Arc<AtomicBool>, Arc<AtomicBool>) {
        (
            Arc::new(AtomicBool::new(consumer)),
            Arc::new(AtomicBool::new(workers)),
        )
    }

    #[tokio::test]
    async fn test_health_ok() {
        let (consumer, workers) = flags(true, true);
        let app = router(LivenessMonitor::from_flags(consumer, workers));

        let (status, body) = get_health(app).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_health_down_when_consumer_stops() {
        let (consumer, workers) = flags(true, true);
        let monitor = LivenessMonitor::from_flags(Arc::clone(&consumer), workers);

        consumer.store(false, Ordering::SeqCst);
        let (status, body) = get_health(router(monitor)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "down");
    }

    #[tokio::test]
    async fn test_health_down_when_pool_stopped() {
        let (consumer, workers) = flags(true, false);
        let (status, _) = get_health(router(LivenessMonitor::from_flags(consumer, workers))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_server_start_and_stop() {
        let (consumer, workers) = flags(true, true);
        let monitor = LivenessMonitor::from_flags(consumer, workers);
        let server = HealthServer::start("127.0.0.1:0".parse().unwrap(), monitor)
            .await
            .unwrap();

        let addr = server.local_addr();
        assert_ne!(addr.port(), 0);
        tokio::net::TcpStream::connect(addr).await.unwrap();

        tokio::time::timeout(std::time::Duration::from_secs(5), server.stop())
            .await
            .expect("stop hung");
        assert!(tokio::net::TcpStream::connect(addr).await.is_err());
    }
}
