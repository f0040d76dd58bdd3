//! Implementation of the `hypnobot serve` command: the HTTP API.

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use clap::Args;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::domain::errors::PipelineError;
use crate::domain::models::{ChatResult, Config};
use crate::infrastructure::logging::SecretScrubber;
use crate::services::pipeline::HypnoPipeline;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Interface to bind (defaults to server.host)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind (defaults to server.port)
    #[arg(short, long)]
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub user_input: String,
}

type ApiError = (StatusCode, Json<Value>);

pub async fn execute(args: ServeArgs, config: Config) -> Result<()> {
    let pipeline = HypnoPipeline::from_config(&config).context("Failed to initialize the pipeline")?;

    let host = args.host.unwrap_or(config.server.host);
    let port = args.port.unwrap_or(config.server.port);
    let addr = format!("{host}:{port}");

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("HypnoBot API listening on {}", addr);

    axum::serve(listener, router(Arc::new(pipeline)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("HypnoBot API stopped");
    Ok(())
}

/// Routes of the chat API around a shared pipeline.
pub fn router(pipeline: Arc<HypnoPipeline>) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/health", get(health_check))
        .with_state(pipeline)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

async fn chat(
    State(pipeline): State<Arc<HypnoPipeline>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResult>, ApiError> {
    if request.user_input.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "user_input must not be empty" })),
        ));
    }

    match pipeline.process(&request.user_input).await {
        Ok(result) => Ok(Json(result)),
        Err(err) => {
            let status = match &err {
                PipelineError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
                PipelineError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            error!(error = %SecretScrubber::new().scrub(&err.to_string()), "Chat request failed");
            Err((status, Json(json!({ "error": "Internal server error" }))))
        }
    }
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
