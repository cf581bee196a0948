//! Settings endpoints: the key/value config API and data-source management.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{decode, json_body, rows_json, AppState, JsonBody};
use crate::collector::{now_iso, CollectError};
use crate::db::repo::DataSourceInput;
use crate::domain::build_views;
use crate::domain::datasource::{find_account_config, CONFIG_KEY};
use crate::domain::primitives::lenient;
use crate::error::AppError;

pub fn config_router() -> Router<AppState> {
    Router::new()
        .route("/config_v1/:key1/:key2/:value", post(set_config_value))
        .route("/get_config/:key1/:key2", post(config_values))
        .route("/save", post(save_config))
        .route("/list", get(list_configs))
        .route("/delete/:id", delete(delete_config))
}

pub fn datasource_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_data_sources).post(create_data_source))
        .route("/test", post(test_connection))
        .route("/:id", put(update_data_source).delete(delete_data_source))
        .route("/:id/toggle", put(toggle_data_source))
        .route("/:id/collect", post(collect_now))
}

pub fn prefect_world_router() -> Router<AppState> {
    Router::new().route("/config/:steam_id", get(prefect_world_config))
}

/// Where an account's credentials live in the config table.
pub(crate) struct AccountConfig {
    pub key1: &'static str,
    pub key2: Option<&'static str>,
    /// Platform name in the "no config at all" message.
    pub label: &'static str,
    /// Platform name in the "no config for this account" message.
    pub account_label: &'static str,
}

pub(crate) const STEAM_ACCOUNT: AccountConfig = AccountConfig {
    key1: "steam",
    key2: Some(CONFIG_KEY),
    label: "Steam",
    account_label: "",
};

pub(crate) const PERFECT_WORLD_ACCOUNT: AccountConfig = AccountConfig {
    key1: "perfectworld",
    key2: None,
    label: "完美世界",
    account_label: "完美世界",
};

/// The stored config JSON whose `steamID` matches. 404 when there is none.
pub(crate) async fn account_config(
    state: &AppState,
    account: &AccountConfig,
    steam_id: &str,
) -> Result<Value, AppError> {
    let values = state.repo.config_texts(account.key1, account.key2).await?;
    if values.is_empty() {
        return Err(AppError::NotFound(format!("未找到{}配置", account.label)));
    }
    find_account_config(&values, steam_id).ok_or_else(|| {
        AppError::NotFound(format!(
            "未找到Steam ID为 {} 的{}配置",
            steam_id, account.account_label
        ))
    })
}

/// Text field of a config object, empty when absent.
pub(crate) fn config_text(config: &Value, key: &str) -> String {
    config
        .get(key)
        .and_then(lenient::value_to_string)
        .unwrap_or_default()
}

/// `{success, message}` with an explicit status, the shape the settings pages expect.
fn reply(status: StatusCode, success: bool, message: impl Into<String>) -> Response {
    let message: String = message.into();
    (status, Json(json!({"success": success, "message": message}))).into_response()
}

fn bad_request(message: &str) -> Response {
    reply(StatusCode::BAD_REQUEST, false, message)
}

/// Restart or stop schedules after the config table changed.
async fn resync(state: &AppState) {
    if state.config.collector_url.is_none() {
        return;
    }
    if let Err(e) = state.scheduler.sync_with_config().await {
        warn!("Failed to resync collectors: {}", e);
    }
}

// =========================================================================
// Key/value config
// =========================================================================

pub async fn set_config_value(
    Path((key1, key2, value)): Path<(String, String, String)>,
    State(state): State<AppState>,
) -> Result<Json<&'static str>, AppError> {
    let updated = state.repo.set_config_value(&key1, &key2, &value).await?;
    info!("Config {}/{} set ({} rows)", key1, key2, updated);
    Ok(Json("更新成功"))
}

pub async fn config_values(
    Path((key1, key2)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    Ok(rows_json(&state.repo.config_values(&key1, &key2).await?))
}

#[derive(Debug, Deserialize)]
struct SaveBody {
    #[serde(rename = "dataName", deserialize_with = "lenient::opt_string", default)]
    data_name: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    key1: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    key2: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    value: Option<String>,
}

pub async fn save_config(
    State(state): State<AppState>,
    body: JsonBody,
) -> Result<Response, AppError> {
    let body = json_body(body).ok().map(decode::<SaveBody>).transpose()?;
    let Some(SaveBody {
        data_name: Some(data_name),
        key1: Some(key1),
        key2: Some(key2),
        value: Some(value),
    }) = body
    else {
        return Ok(bad_request("缺少必要参数"));
    };
    state.repo.save_config(&data_name, &key1, &key2, &value).await?;
    Ok(reply(StatusCode::OK, true, "保存成功"))
}

#[derive(Debug, Default, Deserialize)]
pub struct ConfigQuery {
    pub key1: Option<String>,
    pub key2: Option<String>,
}

pub async fn list_configs(
    Query(query): Query<ConfigQuery>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let key1 = query.key1.as_deref().filter(|k| !k.is_empty());
    let key2 = query.key2.as_deref().filter(|k| !k.is_empty());
    if key1.is_none() && key2.is_none() {
        return Ok(bad_request("至少需要提供 key1 或 key2 参数"));
    }
    let data = state.repo.list_configs(key1, key2).await?;
    Ok(Json(json!({"success": true, "data": data})).into_response())
}

pub async fn delete_config(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let removed = state.repo.delete_config(id).await?;
    info!("Deleted config {} ({} rows)", id, removed);
    Ok(reply(StatusCode::OK, true, "删除成功"))
}

// =========================================================================
// Data sources
// =========================================================================

pub async fn list_data_sources(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let rows = state.repo.config_rows().await?;
    let views = build_views(&rows, &now_iso());
    Ok(Json(json!({
        "success": true,
        "data": views,
        "message": "获取数据源成功",
    })))
}

pub async fn create_data_source(
    State(state): State<AppState>,
    body: JsonBody,
) -> Result<Response, AppError> {
    let input: DataSourceInput = match json_body(body) {
        Ok(value) => decode(value)?,
        Err(_) => DataSourceInput::default(),
    };
    let Some(data_name) = input.data_name.clone().filter(|n| !n.trim().is_empty()) else {
        return Ok(bad_request("数据源名称不能为空"));
    };

    let data_id = state.repo.create_data_source(&input).await?;
    resync(&state).await;
    let body = json!({
        "success": true,
        "message": "数据源添加成功",
        "data": {
            "dataID": data_id,
            "dataName": data_name,
            "type": input.source_type.clone().unwrap_or_default(),
            "configJson": input.config_json(),
            "status": input.status(),
            "enabled": input.is_enabled(),
        },
    });
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

pub async fn update_data_source(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    body: JsonBody,
) -> Result<Response, AppError> {
    let Ok(value) = json_body(body) else {
        return Ok(bad_request("请求数据不能为空"));
    };
    let input: DataSourceInput = decode(value)?;
    if state.repo.data_source_head(id).await?.is_none() {
        return Ok(reply(StatusCode::NOT_FOUND, false, "数据源不存在"));
    }
    if state.repo.update_data_source(id, &input).await? == 0 {
        return Ok(reply(StatusCode::INTERNAL_SERVER_ERROR, false, "更新数据源失败"));
    }
    resync(&state).await;
    Ok(reply(StatusCode::OK, true, "数据源更新成功"))
}

pub async fn delete_data_source(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    if !state.repo.delete_data_source(id).await? {
        return Ok(reply(StatusCode::NOT_FOUND, false, "数据源不存在"));
    }
    resync(&state).await;
    Ok(reply(StatusCode::OK, true, "数据源删除成功"))
}

pub async fn toggle_data_source(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let Some(head) = state.repo.data_source_head(id).await? else {
        return Ok(reply(StatusCode::NOT_FOUND, false, "数据源不存在"));
    };
    let enabled = !head.enabled();
    state.repo.set_data_source_enabled(id, enabled).await?;
    resync(&state).await;

    let message = if enabled { "数据源已启用" } else { "数据源已禁用" };
    Ok(Json(json!({
        "success": true,
        "message": message,
        "data": {"dataID": id, "enabled": enabled},
    }))
    .into_response())
}

#[derive(Debug, Default, Deserialize)]
struct TestBody {
    #[serde(rename = "apiUrl", deserialize_with = "lenient::opt_string", default)]
    api_url: Option<String>,
}

pub async fn test_connection(
    State(state): State<AppState>,
    body: JsonBody,
) -> Result<Response, AppError> {
    let body: TestBody = match json_body(body) {
        Ok(value) => decode(value)?,
        Err(_) => TestBody::default(),
    };
    let Some(api_url) = body.api_url else {
        return Ok(bad_request("API地址不能为空"));
    };

    match state.scheduler.test_connection(&api_url).await {
        Ok(report) => Ok(Json(json!({
            "success": true,
            "message": "连接测试成功",
            "data": report,
        }))
        .into_response()),
        Err(e) => {
            warn!("Connection test to {} failed: {}", api_url, e);
            Ok(reply(StatusCode::OK, false, format!("连接测试失败: {}", e)))
        }
    }
}

pub async fn collect_now(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    match state.repo.data_source_head(id).await? {
        None => return Ok(reply(StatusCode::NOT_FOUND, false, "数据源不存在")),
        Some(head) if !head.enabled() => {
            return Ok(reply(StatusCode::BAD_REQUEST, false, "数据源未启用，无法采集"))
        }
        Some(_) => {}
    }
    if state.config.collector_url.is_none() {
        return Ok(reply(StatusCode::BAD_REQUEST, false, "未配置采集服务"));
    }
    let response = match state.scheduler.run_once(id).await {
        Ok(report) => Json(json!({
            "success": true,
            "message": format!("数据源 {} 采集完成", report.data_name),
            "data": report,
        }))
        .into_response(),
        Err(e @ CollectError::UnknownSource(_)) => reply(StatusCode::NOT_FOUND, false, e.to_string()),
        Err(e @ CollectError::Disabled(_)) => reply(StatusCode::BAD_REQUEST, false, e.to_string()),
        Err(e) => {
            warn!("Manual collection of data source {} failed: {}", id, e);
            reply(StatusCode::INTERNAL_SERVER_ERROR, false, format!("采集失败: {}", e))
        }
    };
    Ok(response)
}

// =========================================================================
// Account credentials
// =========================================================================

pub async fn prefect_world_config(
    Path(steam_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    let config = account_config(&state, &PERFECT_WORLD_ACCOUNT, &steam_id).await?;
    let status = config
        .get("status")
        .and_then(lenient::value_to_string)
        .unwrap_or_else(|| "1".to_string());
    Ok(Json(json!({
        "success": true,
        "data": {
            "steamId": steam_id,
            "appversion": config_text(&config, "appversion"),
            "device": config_text(&config, "device"),
            "gameType": config_text(&config, "gameType"),
            "platform": config_text(&config, "platform"),
            "token": config_text(&config, "token"),
            "tdSign": config_text(&config, "tdSign"),
            "dataName": config_text(&config, "dataName"),
            "status": status,
        },
    })))
}
