//! HTTP request handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::api::AppContext;
use crate::queue::QueuedSong;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: String,
}

#[derive(Debug, Serialize)]
pub struct QueueResponse {
    capacity: usize,
    queue: Vec<QueuedSong>,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    removed: usize,
}

#[derive(Debug, Serialize)]
pub struct PoolResponse {
    available: bool,
    rebuilding: bool,
    generation: Option<u64>,
    valid_count: usize,
    requestable_count: usize,
    built_at: Option<DateTime<Utc>>,
}

type ApiError = (StatusCode, Json<StatusResponse>);

fn api_error(code: StatusCode, status: impl Into<String>) -> ApiError {
    (
        code,
        Json(StatusResponse {
            status: status.into(),
        }),
    )
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "chaos-rq".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// Queue Endpoints
// ============================================================================

/// GET /queue - Queued requests in order
pub async fn get_queue(State(ctx): State<AppContext>) -> Json<QueueResponse> {
    let queue = ctx.state.queue.lock().await;
    Json(QueueResponse {
        capacity: queue.capacity(),
        queue: queue.entries().cloned().collect(),
    })
}

/// POST /queue/next - Take the head entry
pub async fn pop_next(State(ctx): State<AppContext>) -> Result<Json<QueuedSong>, ApiError> {
    match ctx.state.pop_next().await {
        Some(song) => {
            info!("Consumer took {} ({})", song.level_id, song.difficulty);
            Ok(Json(song))
        }
        None => Err(api_error(StatusCode::NOT_FOUND, "queue is empty")),
    }
}

/// DELETE /queue/:queue_entry_id
pub async fn remove_entry(
    State(ctx): State<AppContext>,
    Path(queue_entry_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    match ctx.state.remove_entry(queue_entry_id).await {
        Some(song) => {
            info!("Removed {} requested by {}", song.level_id, song.source);
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("queue entry not found: {}", queue_entry_id),
        )),
    }
}

/// POST /queue/clear
pub async fn clear_queue(State(ctx): State<AppContext>) -> Json<ClearResponse> {
    let removed = ctx.state.clear_queue().await;
    info!("Cleared request queue ({} entries)", removed);
    Json(ClearResponse { removed })
}

// ============================================================================
// Pool Endpoints
// ============================================================================

/// GET /pool - Published generation summary
pub async fn get_pool(State(ctx): State<AppContext>) -> Json<PoolResponse> {
    let rebuilding = ctx.state.pool.is_rebuilding();
    let response = match ctx.state.pool.snapshot() {
        Some(generation) => PoolResponse {
            available: true,
            rebuilding,
            generation: Some(generation.generation()),
            valid_count: generation.valid_count(),
            requestable_count: generation.requestable_count(),
            built_at: Some(generation.built_at()),
        },
        None => PoolResponse {
            available: false,
            rebuilding,
            generation: None,
            valid_count: 0,
            requestable_count: 0,
            built_at: None,
        },
    };
    Json(response)
}

/// POST /pool/rebuild - Run a filter pass now
pub async fn rebuild_pool(State(ctx): State<AppContext>) -> Result<Json<PoolResponse>, ApiError> {
    match ctx.state.rebuild_pool().await {
        Ok(generation) => Ok(Json(PoolResponse {
            available: true,
            rebuilding: false,
            generation: Some(generation.generation()),
            valid_count: generation.valid_count(),
            requestable_count: generation.requestable_count(),
            built_at: Some(generation.built_at()),
        })),
        Err(e) => {
            error!("Pool rebuild failed: {}", e);
            Err(api_error(
                StatusCode::SERVICE_UNAVAILABLE,
                format!("error: {}", e),
            ))
        }
    }
}
