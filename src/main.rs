mod config;
mod engine;
mod hf_engine;
mod normalize;
mod types;

use anyhow::Context;
use axum::{
    Router,
    extract::State,
    http::{Method, header},
    response::Json,
    routing::{get, post},
};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::{Config, CorsPolicy};
use engine::SentimentEngine;
use hf_engine::HfInferenceEngine;
use types::{Greeting, PredictRequest, PredictResponse};

const GREETING: &str = "Welcome to the Sentiment Analysis API (HF Inference)";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    init_tracing(config.log_json);

    // Refuse to start without a usable credential, before anything is bound
    let app = build_app(&config)?;

    if let Some(addr) = config.metrics_address()? {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("failed to install Prometheus exporter")?;
        tracing::info!("Metrics exposed on http://{}", addr);
    }

    let listener = TcpListener::bind(&config.server_address())
        .await
        .with_context(|| format!("failed to bind {}", config.server_address()))?;
    tracing::info!("Server running on http://{}", config.server_address());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Validates the configuration and wires the relay into the router.
fn build_app(config: &Config) -> anyhow::Result<Router> {
    let relay_config = config.relay_config()?;
    let cors = config.cors_policy()?;
    tracing::info!(
        model_url = %relay_config.model_url,
        timeout = ?relay_config.timeout,
        cors = ?cors,
        "Starting sentiment relay"
    );

    let engine = HfInferenceEngine::new(relay_config)?;
    Ok(app(AppState::new(Arc::new(engine)), &cors))
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,sentiment_relay=debug".into());
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

#[derive(Clone)]
struct AppState {
    engine: Arc<dyn SentimentEngine + Send + Sync>,
}

impl AppState {
    fn new(engine: Arc<dyn SentimentEngine + Send + Sync>) -> Self {
        Self { engine }
    }
}

fn app(state: AppState, cors: &CorsPolicy) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/predict", post(predict_handler))
        .layer(cors_layer(cors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(policy: &CorsPolicy) -> CorsLayer {
    match policy {
        CorsPolicy::AllowAll => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
        // Credentials rule out wildcard methods and headers
        CorsPolicy::AllowOrigins(origins) => CorsLayer::new()
            .allow_origin(origins.clone())
            .allow_credentials(true)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]),
    }
}

async fn root_handler() -> Json<Greeting> {
    Json(Greeting { message: GREETING })
}

/// Relay errors are part of the response body; the status is always 200.
#[tracing::instrument(skip(state, request), fields(text_len = request.text.len()))]
async fn predict_handler(
    State(state): State<AppState>,
    Json(request): Json<PredictRequest>,
) -> Json<PredictResponse> {
    tracing::debug!("Processing prediction request");
    Json(state.engine.predict(&request.text).await)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        _ = terminate => tracing::info!("Received SIGTERM signal"),
    }
}
