use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::info;

use super::AppState;
use crate::error::AppError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/integrity", get(integrity))
        .route("/repair", post(repair))
        .route("/statistics", get(statistics))
        .route("/info", get(database_info))
}

pub async fn integrity(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let report = state.repo.integrity().await?;
    Ok(Json(json!({"success": true, "data": report})))
}

/// Re-run schema sync, then report what is still missing.
pub async fn repair(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let (sync, integrity) = state.repo.repair().await?;
    info!(
        "Schema repair: {} tables created, {} altered, healthy: {}",
        sync.created(),
        sync.altered(),
        integrity.is_healthy()
    );
    Ok(Json(json!({
        "success": true,
        "data": {"sync": sync, "integrity": integrity},
    })))
}

pub async fn statistics(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let stats = state.repo.statistics().await?;
    Ok(Json(json!({"success": true, "data": stats})))
}

pub async fn database_info(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let info = state.repo.database_info().await?;
    Ok(Json(json!({"success": true, "data": info})))
}
