//! # Authorization HTTP Server
//!
//! HTTP surface for the topicgate decision engine, for brokers that call
//! out over REST instead of linking the library.
//!
//! ## Endpoints
//!
//! - `POST /v1/authenticate` - Login check; always defers and schedules verification
//! - `POST /v1/acl` - Topic/operation check
//! - `POST /v1/superuser` - Elevated check
//! - `GET /health` - Health check
//! - `GET /metrics` - Prometheus metrics
//!
//! ## Configuration
//!
//! A TOML file; path given as the first argument, `topicgate.toml` by
//! default. `RUST_LOG` controls the log level (default: info).

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    serve, Router,
};
use serde::{Deserialize, Serialize};
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use topicgate_authz::{Access, AuthzConfig, AuthzEngine, Decision, HttpGateway};

/// Shared application state
#[derive(Clone)]
struct AppState {
    engine: Arc<AuthzEngine>,
    start_time: std::time::Instant,
}

/// Login check request
#[derive(Debug, Deserialize)]
struct AuthenticateRequest {
    username: String,
    password: String,
}

/// ACL check request
#[derive(Debug, Deserialize)]
struct AclRequest {
    username: String,
    #[serde(default)]
    topic: Option<String>,
    /// Requested access code: 1 read, 2 write, 3 read/write, 4 superuser
    acc: i32,
}

/// Elevated check request
#[derive(Debug, Deserialize)]
struct SuperuserRequest {
    username: String,
}

/// Decision response
#[derive(Debug, Serialize)]
struct DecisionResponse {
    username: String,
    decision: Decision,
}

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    uptime_seconds: u64,
    version: String,
}

/// Metrics response (Prometheus format)
struct MetricsResponse {
    metrics: String,
}

impl IntoResponse for MetricsResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            self.metrics,
        )
            .into_response()
    }
}

/// POST /v1/authenticate - Login check
async fn authenticate(
    State(state): State<AppState>,
    Json(req): Json<AuthenticateRequest>,
) -> Json<DecisionResponse> {
    let decision = state.engine.authenticate(&req.username, &req.password).await;

    Json(DecisionResponse {
        username: req.username,
        decision,
    })
}

/// POST /v1/acl - Topic/operation check
async fn acl_check(
    State(state): State<AppState>,
    Json(req): Json<AclRequest>,
) -> Json<DecisionResponse> {
    let decision = state
        .engine
        .authorize(&req.username, req.topic.as_deref(), Access::from(req.acc))
        .await;

    info!(
        username = %req.username,
        topic = ?req.topic,
        acc = req.acc,
        %decision,
        "acl decision"
    );

    Json(DecisionResponse {
        username: req.username,
        decision,
    })
}

/// POST /v1/superuser - Elevated check
async fn superuser_check(
    State(state): State<AppState>,
    Json(req): Json<SuperuserRequest>,
) -> Json<DecisionResponse> {
    let decision = state.engine.check_superuser(&req.username).await;

    Json(DecisionResponse {
        username: req.username,
        decision,
    })
}

/// GET /health - Health check endpoint
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = state.start_time.elapsed().as_secs();

    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime_seconds: uptime,
        version: topicgate_authz::VERSION.to_string(),
    })
}

/// GET /metrics - Prometheus metrics endpoint
async fn metrics(State(state): State<AppState>) -> MetricsResponse {
    let uptime = state.start_time.elapsed().as_secs();

    let mut body = format!(
        "# HELP authz_uptime_seconds Server uptime in seconds\n\
         # TYPE authz_uptime_seconds gauge\n\
         authz_uptime_seconds {}\n\n",
        uptime
    );
    if let Some(engine_metrics) = state.engine.export_prometheus().await {
        body.push_str(&engine_metrics);
    }

    MetricsResponse { metrics: body }
}

/// Create the HTTP router with all endpoints
fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace = TraceLayer::new_for_http().on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/v1/authenticate", post(authenticate))
        .route("/v1/acl", post(acl_check))
        .route("/v1/superuser", post(superuser_check))
        .route("/health", get(health_check))
        .layer(ServiceBuilder::new().layer(trace).layer(cors))
        .with_state(state)
}

/// Create the metrics router
fn create_metrics_router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }

    info!("Starting graceful shutdown");
}

/// Main server entrypoint
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting topicgate authorization server v{}",
        topicgate_authz::VERSION
    );

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "topicgate.toml".to_string());
    let config = AuthzConfig::load(&config_path)
        .with_context(|| format!("loading configuration from {config_path}"))?;

    info!("Configuration:");
    info!("  Port: {}", config.server.port);
    info!("  Metrics Port: {}", config.server.metrics_port);
    info!("  Gateway: {}:{}", config.gateway.host, config.gateway.port);

    // A partially built role table must never serve requests; both the
    // table and the gateway are fatal on error.
    let roles = config
        .build_role_table()
        .context("building role access table")?;
    let gateway = HttpGateway::new(config.gateway_config()?).context("building gateway client")?;

    let engine = AuthzEngine::new(config.engine_config(), roles, Arc::new(gateway));
    info!("Authorization engine initialized");

    // Create shared state
    let state = AppState {
        engine: Arc::new(engine),
        start_time: std::time::Instant::now(),
    };

    let app = create_router(state.clone());
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server address")?;

    let metrics_app = create_metrics_router(state.clone());
    let metrics_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.metrics_port)
        .parse()
        .context("invalid metrics address")?;

    info!("Starting HTTP server on {}", addr);
    info!("Starting metrics server on {}", metrics_addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("binding HTTP server")?;
    let metrics_listener = tokio::net::TcpListener::bind(metrics_addr)
        .await
        .context("binding metrics server")?;

    let server = serve(listener, app.into_make_service()).with_graceful_shutdown(shutdown_signal());
    let metrics_server =
        serve(metrics_listener, metrics_app.into_make_service())
            .with_graceful_shutdown(shutdown_signal());

    tokio::try_join!(async { server.await }, async { metrics_server.await })
        .context("server error")?;

    state.engine.shutdown();
    info!("Servers shut down gracefully");
    Ok(())
}
