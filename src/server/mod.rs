//! HTTP boundary for the transcript pipeline.

use anyhow::Context;
use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod error;

pub use error::ApiError;

use crate::config::ServerConfig;
use crate::pipeline::{PipelineError, TranscriptPipeline};

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<TranscriptPipeline>,
}

/// `POST /transcript` body
#[derive(Debug, Deserialize)]
struct TranscriptRequest {
    #[serde(default)]
    video_url: Option<String>,
}

/// Build the Axum router with all routes.
pub fn router(pipeline: Arc<TranscriptPipeline>) -> Router {
    Router::new()
        .route("/", get(health_handler))
        .route("/transcript", post(transcript_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { pipeline })
}

/// Bind and serve until ctrl-c
pub async fn serve(config: &ServerConfig, pipeline: Arc<TranscriptPipeline>) -> crate::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(pipeline))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

/// GET /
async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// POST /transcript
///
/// The body is parsed leniently: anything that does not carry a non-empty
/// `video_url` string is answered with `video_url_required`.
async fn transcript_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let video_url = serde_json::from_slice::<TranscriptRequest>(&body)
        .ok()
        .and_then(|request| request.video_url)
        .filter(|url| !url.trim().is_empty());

    let Some(video_url) = video_url else {
        return ApiError::video_url_required().into_response();
    };

    match state.pipeline.clone().run_in_task(video_url.clone()).await {
        Ok(result) => Json(result).into_response(),
        Err(e) => {
            if let PipelineError::Internal { detail, .. } = &e {
                tracing::error!("Internal failure for {}: {}", video_url, detail);
            }
            ApiError::from_pipeline(&e, &video_url).into_response()
        }
    }
}
