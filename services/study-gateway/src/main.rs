//! Scripture Study Gateway
//!
//! Single-binary service that:
//! 1. Generates study content through a pool of Gemini API keys, rotating
//!    round-robin and skipping keys that hit their quota
//! 2. Falls back to API.Bible scripture search when every key has failed
//! 3. Reports per-key and fallback health for operators

mod admin;
mod api;
mod config;
mod error;
mod metrics;
#[cfg(test)]
mod test_support;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderValue, Method, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gemini_client::{GeminiClient, GenerationSettings};
use key_pool::{HealthLimits, HealthReporter, KeyPool, Orchestrator, OrchestratorSettings};
use metrics_exporter_prometheus::PrometheusHandle;
use scripture::{ApiBibleClient, ScriptureAdapter};

use crate::api::{ApiState, GenerateRequest};
use crate::config::Config;
use crate::metrics::ServiceMetrics;

/// How long in-flight requests may run after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared application state accessible from all handlers
#[derive(Clone)]
struct AppState {
    api: ApiState,
    prometheus: PrometheusHandle,
}

/// Build the public router.
///
/// `max_connections` bounds concurrently processed requests; excess requests
/// queue rather than fail.
fn build_router(state: AppState, max_connections: usize, cors: CorsLayer) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/health/keys", get(key_health_handler))
        .route("/api/generate", post(generate_handler))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .layer(cors)
        .with_state(state)
}

/// CORS for browser clients. `"*"` anywhere in the list allows any origin.
fn build_cors(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(origin, error = %e, "skipping invalid cors origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting scripture-study-gateway");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle =
        metrics::install_recorder().context("failed to install Prometheus recorder")?;

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let mut config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.server.listen_addr,
        gemini_keys = config.gemini.api_keys.len(),
        model = %config.gemini.model,
        scripture_configured = config.scripture.api_key.is_some(),
        "configuration loaded"
    );

    let http = reqwest::Client::builder()
        .user_agent(concat!("scripture-study-gateway/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")?;

    let gemini = GeminiClient::new(
        http.clone(),
        config.gemini.base_url.clone(),
        GenerationSettings {
            model: config.gemini.model.clone(),
            temperature: config.gemini.temperature,
        },
    );

    let secondary = match config.scripture.api_key.take() {
        Some(key) => {
            let client = ApiBibleClient::new(
                http,
                config.scripture.base_url.clone(),
                config.scripture.bible_id.clone(),
                key.expose().clone(),
            );
            ScriptureAdapter::new(
                Arc::new(client),
                config.scripture.search_limit,
                config.scripture.timeout(),
            )
        }
        None => {
            warn!("BIBLE_API_KEY not set, scripture fallback disabled");
            ScriptureAdapter::unconfigured()
        }
    };

    let pool = Arc::new(KeyPool::new(
        std::mem::take(&mut config.gemini.api_keys),
        config.rotation.failure_ttl(),
    ));

    let orchestrator = Arc::new(
        Orchestrator::new(
            pool.clone(),
            Arc::new(gemini),
            secondary,
            OrchestratorSettings {
                quota_backoff: config.rotation.quota_backoff(),
                attempt_timeout: config.rotation.attempt_timeout(),
            },
        )
        .context("failed to build orchestrator")?,
    );

    let reporter = Arc::new(HealthReporter::new(
        orchestrator.clone(),
        HealthLimits {
            credential_daily_limit: config.rotation.assumed_daily_limit,
            secondary_daily_limit: config.scripture.assumed_daily_limit,
            ..HealthLimits::default()
        },
    ));

    let reset_task = config.rotation.reset_interval().map(|interval| {
        info!(
            interval_secs = interval.as_secs(),
            "failed-set reset task enabled"
        );
        key_pool::spawn_reset_task(pool.clone(), interval)
    });

    if let Some(admin_addr) = config.server.admin_listen_addr {
        let admin_listener = TcpListener::bind(admin_addr)
            .await
            .with_context(|| format!("failed to bind admin listener to {admin_addr}"))?;
        let admin_app = admin::build_admin_router(admin::AdminState::new(orchestrator.clone()));
        info!(addr = %admin_addr, "admin API listening");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(admin_listener, admin_app).await {
                error!(error = %e, "admin listener failed");
            }
        });
    }

    let service_metrics = ServiceMetrics::new();
    let in_flight = service_metrics.in_flight.clone();

    let app_state = AppState {
        api: ApiState {
            orchestrator,
            reporter,
            default_max_tokens: config.gemini.default_max_tokens,
            metrics: service_metrics,
        },
        prometheus: prometheus_handle,
    };

    let app = build_router(
        app_state,
        config.server.max_connections,
        build_cors(&config.server.cors_origins),
    );

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    // The drain timer starts when the shutdown signal fires, not when the
    // server starts: notify the server to drain, then race it against
    // DRAIN_TIMEOUT.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => {
            info!("all in-flight requests drained");
        }
        Ok(Ok(Err(e))) => {
            error!(error = %e, "server error during shutdown");
        }
        Ok(Err(e)) => {
            error!(error = %e, "server task panicked");
        }
        Err(_) => {
            let remaining = in_flight.load(Ordering::Relaxed);
            warn!(
                remaining,
                drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "drain timeout exceeded, forcing shutdown"
            );
        }
    }

    if let Some(task) = reset_task {
        task.abort();
    }

    info!("shutdown complete");
    Ok(())
}

/// Liveness: uptime and request counters. Always 200 while the process serves.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let metrics = &state.api.metrics;
    let orchestrator = &state.api.orchestrator;

    let body = serde_json::json!({
        "status": "healthy",
        "uptime_seconds": metrics.started_at.elapsed().as_secs(),
        "requests_served": metrics.requests_total.load(Ordering::Relaxed),
        "errors_total": metrics.errors_total.load(Ordering::Relaxed),
        "pool_size": orchestrator.pool().len(),
        "secondary_configured": orchestrator.secondary().is_configured(),
    });

    (
        axum::http::StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus metrics endpoint in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        axum::http::StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

async fn key_health_handler(State(state): State<AppState>) -> Response {
    api::key_health(&state.api).await
}

async fn generate_handler(
    State(state): State<AppState>,
    body: Result<Json<GenerateRequest>, JsonRejection>,
) -> Response {
    let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
    api::generate(&state.api, body, request_id).await
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
