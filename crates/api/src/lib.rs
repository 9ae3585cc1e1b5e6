//! Crank Twin Telemetry Server
//!
//! Serves the live state stream over WebSocket, plus health, metrics and
//! current-state HTTP endpoints. The simulation itself runs on a dedicated
//! tick thread; this crate wires it to the network and owns the process
//! lifecycle.

use axum::{routing::get, Router};
use broadcast::ConsumerRegistry;
use crank_physics::{EngineHandle, PhysicsEngine};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tick_scheduler::{TickScheduler, TickStats};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod config;
mod error;
pub mod routes;

pub use config::{ServerConfig, DEFAULT_CONFIG_FILE, ENV_PREFIX};
pub use error::ServerError;

/// Application state shared across handlers
pub struct AppState {
    /// Control input and snapshot access
    pub engine: Arc<EngineHandle>,
    /// Live broadcast consumers
    pub registry: Arc<ConsumerRegistry>,
    /// Prometheus renderer, if a recorder was installed
    pub metrics: Option<PrometheusHandle>,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(
        engine: Arc<EngineHandle>,
        registry: Arc<ConsumerRegistry>,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            engine,
            registry,
            metrics,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: Instant::now(),
        }
    }
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(routes::ws::ws_handler))
        .route("/ws", get(routes::ws::ws_handler))
        .route("/health", get(routes::health::get_health))
        .route("/metrics", get(routes::health::get_metrics))
        .route("/api/v1/state", get(routes::state::get_state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::new().allow_origin(Any)),
        )
        .with_state(state)
}

/// Initialize logging (`RUST_LOG` overrides the INFO default)
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(Level::INFO.as_str().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

/// Install the global Prometheus recorder
pub fn init_metrics() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Metrics recorder unavailable: {}", e);
            None
        }
    }
}

/// Engine, registry and scheduler wired together, not yet running
pub struct Backend {
    state: Arc<AppState>,
    scheduler: TickScheduler,
}

impl Backend {
    pub fn new(config: &ServerConfig, metrics: Option<PrometheusHandle>) -> Self {
        let engine = PhysicsEngine::new();
        let registry = Arc::new(ConsumerRegistry::new(config.max_pending_per_consumer));
        let state = Arc::new(AppState::new(engine.handle(), Arc::clone(&registry), metrics));
        let scheduler = TickScheduler::new(engine, registry, config.scheduler_config());
        Self { state, scheduler }
    }

    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// Start the tick thread and serve `listener` until `signal` resolves.
    ///
    /// On shutdown the tick loop is stopped and joined; consumer writes
    /// still in flight are abandoned.
    pub async fn serve<F>(self, listener: TcpListener, signal: F) -> Result<TickStats, ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let tick_thread = self.scheduler.spawn(Arc::clone(&shutdown))?;

        let app = create_router(self.state);
        let stop = {
            let shutdown = Arc::clone(&shutdown);
            async move {
                signal.await;
                info!("Shutting down...");
                shutdown.store(true, Ordering::Relaxed);
            }
        };

        let served = axum::serve(listener, app).with_graceful_shutdown(stop).await;
        // Also stops the tick loop when serve failed rather than being signalled
        shutdown.store(true, Ordering::Relaxed);

        let stats = tokio::task::spawn_blocking(move || tick_thread.join())
            .await
            .map_err(|_| ServerError::TickThread)?
            .map_err(|_| ServerError::TickThread)?;
        served?;

        info!(ticks = stats.ticks, overruns = stats.overruns, "Clean exit");
        Ok(stats)
    }
}

/// Resolves on SIGINT or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Run the server
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let metrics = init_metrics();
    let backend = Backend::new(&config, metrics);

    // Failing to bind is the only fatal startup path
    let listener = TcpListener::bind(&config.bind_addr).await?;
    let addr = listener.local_addr()?;
    info!("WebSocket server listening on ws://{}/ws", addr);
    info!("Health check: http://{}/health", addr);

    backend.serve(listener, shutdown_signal()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use crank_physics::constants::RPM_MAX;
    use crank_physics::ReplayMode;
    use tower::ServiceExt;

    fn test_state() -> (Arc<AppState>, PhysicsEngine) {
        let engine = PhysicsEngine::with_rpm(1200.0);
        let state = Arc::new(AppState::new(
            engine.handle(),
            Arc::new(ConsumerRegistry::default()),
            None,
        ));
        (state, engine)
    }

    #[tokio::test]
    async fn test_health_ok() {
        let (state, _engine) = test_state();
        let response = create_router(state)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_state_endpoint_reports_snapshot() {
        let (state, mut engine) = test_state();
        let published = engine.step_at(4242);

        let response = create_router(state)
            .oneshot(Request::get("/api/v1/state").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["data"]["timestamp_ms"], 4242);
        assert_eq!(value["meta"]["replay_mode"], "live");
        assert_eq!(value["meta"]["ticks"], 1);
        assert!((value["data"]["rpm"].as_f64().unwrap() - published.rpm as f64).abs() < 1e-3);
    }

    #[test]
    fn test_apply_set_rpm_clamps() {
        let (state, _engine) = test_state();
        let id = state.registry.register().id();

        routes::ws::apply_message(
            &state,
            id,
            r#"{"type":"set_rpm","payload":{"rpm_target":9999}}"#,
        );
        assert_eq!(state.engine.rpm_target(), RPM_MAX);
    }

    #[test]
    fn test_apply_replay_records_mode() {
        let (state, _engine) = test_state();
        let id = state.registry.register().id();

        routes::ws::apply_message(
            &state,
            id,
            r#"{"type":"replay","payload":{"mode":"freeze"}}"#,
        );
        assert_eq!(state.engine.replay_request().mode, ReplayMode::Freeze);
    }

    #[test]
    fn test_apply_garbage_is_ignored() {
        let (state, _engine) = test_state();
        let id = state.registry.register().id();
        let before = state.engine.rpm_target();

        routes::ws::apply_message(&state, id, "{not json");
        routes::ws::apply_message(&state, id, r#"{"type":"warp","payload":{}}"#);
        assert_eq!(state.engine.rpm_target(), before);
        assert_eq!(state.engine.replay_request_count(), 0);
    }
}
