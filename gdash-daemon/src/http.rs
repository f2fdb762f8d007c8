//! HTTP surface of the insights service.
//!
//! Handlers stay thin: request decoding at the boundary, aggregation in
//! `gdash_core::insights`, buffer access through [`LogBuffer`].

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::Serialize;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};

use gdash_core::insights;
use gdash_core::model::{WeatherInsights, WeatherLog};
use gdash_core::store::LogBuffer;

/// Shared state for HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub buffer: Arc<LogBuffer>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Buffer view, wire-compatible with the dashboard consumer: snake_case
/// keys, last five items, averages omitted when absent.
#[derive(Serialize)]
pub struct BufferSummary {
    pub count: usize,
    pub items: Vec<WeatherLog>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_temp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_humidity: Option<f64>,
}

#[derive(Serialize)]
pub struct PushResponse {
    pub status: &'static str,
    pub stored: usize,
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// POST /insights/from-logs - insights over the posted batch
async fn insights_from_logs(Json(logs): Json<Vec<WeatherLog>>) -> Json<WeatherInsights> {
    Json(insights::generate(&logs))
}

/// GET /insights/from-logs - summary of the accumulation buffer
async fn buffer_summary(State(state): State<AppState>) -> Json<BufferSummary> {
    let logs = state.buffer.snapshot();
    let report = insights::generate(&logs);

    let start = logs.len().saturating_sub(5);
    let items = logs[start..].to_vec();

    Json(BufferSummary {
        count: logs.len(),
        items,
        avg_temp: report.average_temperature,
        avg_humidity: report.average_humidity,
    })
}

/// POST /insights/push - append one log to the buffer
async fn push_log(
    State(state): State<AppState>,
    Json(log): Json<WeatherLog>,
) -> Json<PushResponse> {
    let stored = state.buffer.append(log);
    Json(PushResponse { status: "ok", stored })
}

/// Create the HTTP router. CORS is permissive: the dashboard frontend
/// calls this API from another origin.
pub fn create_router(buffer: Arc<LogBuffer>) -> Router {
    let state = AppState { buffer };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/insights/from-logs", get(buffer_summary).post(insights_from_logs))
        .route("/insights/push", post(push_log))
        .layer(cors)
        .with_state(state)
}

/// Serve the insights API until `shutdown` signals.
pub async fn serve(
    bind: &str,
    buffer: Arc<LogBuffer>,
    mut shutdown: watch::Receiver<()>,
) -> Result<()> {
    let app = create_router(buffer);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind insights API to {bind}"))?;
    log::info!("Insights API listening on {bind}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.changed().await.ok();
            log::info!("Insights API shutting down");
        })
        .await
        .context("Insights API server error")?;

    Ok(())
}
