use std::future::Future;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::{
    extract::{State, WebSocketUpgrade},
    http::{Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::broadcast::{handle_display_socket, BroadcastScheduler};
use crate::config::ServerConfig;
use crate::db::{create_pool, run_migrations};
use crate::snapshot::{SnapshotAssembler, SnapshotSource};
use crate::store::SqliteStore;

/// State shared across handlers
pub struct AppState<S> {
    pub scheduler: BroadcastScheduler<S>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            scheduler: self.scheduler.clone(),
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    service: String,
    version: String,
}

/// Relay server instance
pub struct RelayServer {
    config: ServerConfig,
}

/// A relay whose listener is bound but not yet serving.
pub struct BoundRelay {
    listener: tokio::net::TcpListener,
    router: Router,
    local_addr: SocketAddr,
}

impl RelayServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Open the database, build the scheduler and bind the listener.
    pub async fn bind(self) -> Result<BoundRelay> {
        let pool = create_pool(&self.config.db_path)
            .await
            .with_context(|| format!("Failed to open database {}", self.config.db_path.display()))?;
        run_migrations(&pool)
            .await
            .context("Failed to run database migrations")?;

        let assembler = SnapshotAssembler::new(SqliteStore::new(pool));
        let scheduler = BroadcastScheduler::new(assembler, self.config.broadcast_interval);
        let router = create_router(AppState { scheduler });

        let addr = self.config.bind_addr();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind to {}", addr))?;
        let local_addr = listener
            .local_addr()
            .context("Failed to read listener address")?;

        tracing::info!("Relay server listening on {}", local_addr);
        tracing::info!("Database: {}", self.config.db_path.display());
        tracing::info!(
            interval_ms = self.config.broadcast_interval.as_millis() as u64,
            "Broadcast interval"
        );

        Ok(BoundRelay {
            listener,
            router,
            local_addr,
        })
    }

    /// Serve until Ctrl-C.
    pub async fn run(self) -> Result<()> {
        self.bind().await?.serve(shutdown_signal()).await
    }
}

impl BoundRelay {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn serve<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .context("Server error")?;

        tracing::info!("Relay server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Create the Axum router with all routes and middleware
pub fn create_router<S: SnapshotSource>(state: AppState<S>) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/snapshot", get(snapshot_handler::<S>));

    Router::new()
        .route("/ws", get(ws_handler::<S>))
        .nest("/api", api_routes)
        .fallback(not_found_handler)
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET])
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

async fn ws_handler<S: SnapshotSource>(
    ws: WebSocketUpgrade,
    State(state): State<AppState<S>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_display_socket(socket, state.scheduler))
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "signage-relay".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// One ad-hoc assembly, outside the broadcast cycle.
async fn snapshot_handler<S: SnapshotSource>(State(state): State<AppState<S>>) -> Response {
    match state.scheduler.source().assemble().await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => {
            crate::log_error!(e, "snapshot endpoint");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(e.to_error_response())).into_response()
        },
    }
}

async fn not_found_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "error": "Not found",
            "code": "NOT_FOUND"
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{DataType, Snapshot};
    use crate::test_utils::test_helpers::TestContext;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    fn router(ctx: &TestContext) -> Router {
        let assembler = SnapshotAssembler::new(SqliteStore::new(ctx.pool().clone()));
        create_router(AppState {
            scheduler: BroadcastScheduler::new(assembler, Duration::from_secs(1)),
        })
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let ctx = TestContext::new().await;
        let (status, body) = get_json(router(&ctx), "/api/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "signage-relay");
    }

    #[tokio::test]
    async fn test_snapshot_endpoint_returns_current_state() {
        let ctx = TestContext::new().await;
        SqliteStore::new(ctx.pool().clone())
            .set_data("humidity", "40", DataType::Int)
            .await
            .unwrap();

        let (status, body) = get_json(router(&ctx), "/api/snapshot").await;

        assert_eq!(status, StatusCode::OK);
        let snapshot: Snapshot = serde_json::from_value(body.clone()).unwrap();
        assert_eq!(snapshot.data[0].name, "humidity");
        assert!(body.get("playlist").is_none());
    }

    #[tokio::test]
    async fn test_snapshot_endpoint_reports_store_failure() {
        let ctx = TestContext::new().await;
        let app = router(&ctx);
        ctx.pool().close().await;

        let (status, body) = get_json(app, "/api/snapshot").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "DATABASE_ERROR");
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let ctx = TestContext::new().await;
        let (status, body) = get_json(router(&ctx), "/api/nope").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }
}
