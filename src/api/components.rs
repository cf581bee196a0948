//! Storage-unit components: ingestion from the Perfect World client and the web view.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{AppState, JsonBody};
use crate::db::repo::{ComponentAction, ComponentError};
use crate::error::AppError;

pub fn ingest_router() -> Router<AppState> {
    Router::new()
        .route("/batch", post(upsert_batch))
        .route("/single", post(upsert_single))
        .route("/delete/:assetid", delete(delete_component))
        .route("/delete/:assetid/:steam_id", delete(delete_owned_component))
}

pub fn web_router() -> Router<AppState> {
    Router::new()
        .route("/components/:steam_id", get(list_components))
        .route("/components/stats/:steam_id", get(component_stats))
}

/// The ingestion client reads `{code, message, result}` with `code` 0 on success.
fn coded(status: StatusCode, message: impl Into<String>, result: Value) -> Response {
    let code = if status.is_success() { 0 } else { status.as_u16() };
    let message: String = message.into();
    (status, Json(json!({"code": code, "message": message, "result": result}))).into_response()
}

fn rejected(message: &str) -> Response {
    coded(StatusCode::BAD_REQUEST, message, Value::Null)
}

// =========================================================================
// Ingestion
// =========================================================================

pub async fn upsert_batch(State(state): State<AppState>, body: JsonBody) -> Result<Response, AppError> {
    let body = body.ok().map(|Json(v)| v).unwrap_or(Value::Null);
    let items = match body.get("items") {
        None => return Ok(rejected("缺少必要参数 items")),
        Some(Value::Array(items)) if items.is_empty() => return Ok(rejected("items 不能为空")),
        Some(Value::Array(items)) => items,
        Some(_) => return Ok(rejected("items 必须是数组类型")),
    };

    let report = state.repo.upsert_components(items).await?;
    Ok(coded(StatusCode::OK, "success", json!(report)))
}

pub async fn upsert_single(State(state): State<AppState>, body: JsonBody) -> Result<Response, AppError> {
    let payload = match body {
        Ok(Json(Value::Object(map))) if !map.is_empty() => Value::Object(map),
        _ => return Ok(rejected("缺少请求数据")),
    };

    match state.repo.upsert_component(&payload).await {
        Ok((assetid, action)) => {
            let message = match action {
                ComponentAction::Insert => "记录插入成功",
                ComponentAction::Update => "记录更新成功",
            };
            Ok(coded(
                StatusCode::OK,
                message,
                json!({"assetid": assetid, "action": action}),
            ))
        }
        Err(ComponentError::MissingAssetId) => Ok(rejected("缺少主键 assetid")),
        Err(ComponentError::Rejected(msg)) => {
            warn!("Component write rejected: {}", msg);
            Ok(coded(StatusCode::INTERNAL_SERVER_ERROR, msg, Value::Null))
        }
        Err(ComponentError::Query(e)) => Err(e.into()),
    }
}

pub async fn delete_component(
    Path(assetid): Path<String>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    if state.repo.delete_component(&assetid, None).await? == 0 {
        return Ok(coded(StatusCode::NOT_FOUND, "记录不存在", Value::Null));
    }
    info!("Deleted component {}", assetid);
    Ok(coded(StatusCode::OK, "删除成功", Value::Null))
}

pub async fn delete_owned_component(
    Path((assetid, steam_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let deleted = state.repo.delete_component(&assetid, Some(&steam_id)).await?;
    if deleted == 0 {
        return Ok(coded(StatusCode::NOT_FOUND, "记录不存在", Value::Null));
    }
    Ok(coded(StatusCode::OK, "删除成功", json!({"deleted_count": deleted})))
}

// =========================================================================
// Web view
// =========================================================================

#[derive(Debug, Deserialize)]
pub struct ComponentQuery {
    pub search: Option<String>,
    #[serde(default = "first_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

fn first_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    20
}

pub async fn list_components(
    Path(steam_id): Path<String>,
    Query(query): Query<ComponentQuery>,
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    let page = query.page.max(1);
    let page_size = query.page_size.clamp(1, 1000);
    let (data, total) = state
        .repo
        .list_components(&steam_id, query.search.as_deref(), page, page_size)
        .await?;
    Ok(Json(json!({
        "success": true,
        "data": data,
        "total": total,
        "page": page,
        "page_size": page_size,
    })))
}

pub async fn component_stats(
    Path(steam_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    let stats = state.repo.component_stats(&steam_id).await?;
    Ok(Json(json!({"success": true, "data": stats})))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coded_uses_zero_on_success() {
        let response = coded(StatusCode::OK, "success", Value::Null);
        assert_eq!(response.status(), StatusCode::OK);

        let response = rejected("items 不能为空");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
