//! Inventory dashboard: held items per account, grouped views, statistics and
//! marketplace price refreshes.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use super::settings::{account_config, config_text, STEAM_ACCOUNT};
use super::{json_body, steam, AppState, JsonBody};
use crate::db::repo::InventorySearch;
use crate::domain::primitives::lenient;
use crate::domain::PriceRefresh;
use crate::error::AppError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/steam_ids", get(list_owners))
        .route("/inventory/:steam_id", get(list_held))
        .route("/inventory/grouped/:steam_id", get(grouped))
        .route("/inventory/stats/:steam_id", get(stats))
        .route("/inventory/buy_price/:user/:assetid", put(steam::update_buy_price))
        .route("/steam_config/:steam_id", get(steam_config))
        .route(
            "/inventory/batch_update_yyyp_price",
            post(|state: State<AppState>, body: JsonBody| {
                refresh_prices(state, body, PriceRefresh::from_yyyp)
            }),
        )
        .route(
            "/inventory/batch_update_buff_price",
            post(|state: State<AppState>, body: JsonBody| {
                refresh_prices(state, body, PriceRefresh::from_buff)
            }),
        )
}

pub async fn list_owners(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let owners = state.repo.inventory_owners().await?;
    Ok(Json(json!({"success": true, "data": owners})))
}

#[derive(Debug, Deserialize)]
pub struct HeldQuery {
    pub search: Option<String>,
    pub weapon_type: Option<String>,
    pub float_range: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    100
}

pub async fn list_held(
    Path(steam_id): Path<String>,
    Query(query): Query<HeldQuery>,
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    let search = InventorySearch {
        search: query.search,
        weapon_type: query.weapon_type,
        float_range: query.float_range,
    };
    let (items, total) = state
        .repo
        .inventory_page(&steam_id, &search, query.limit, query.offset)
        .await?;
    Ok(Json(json!({"success": true, "data": items, "total": total})))
}

pub async fn grouped(
    Path(steam_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    let groups = state.repo.grouped_inventory(&steam_id).await?;
    let total = groups.len();
    Ok(Json(json!({"success": true, "data": groups, "total": total})))
}

pub async fn stats(
    Path(steam_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    let stats = state.repo.inventory_stats(&steam_id).await?;
    Ok(Json(json!({"success": true, "data": stats})))
}

/// Cookie and name of the Steam data source bound to an account.
pub async fn steam_config(
    Path(steam_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    let config = account_config(&state, &STEAM_ACCOUNT, &steam_id).await?;
    let cookie = Some(config_text(&config, "cookies"))
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| config_text(&config, "cookie"));
    let status = config
        .get("status")
        .and_then(lenient::value_to_string)
        .unwrap_or_else(|| "1".to_string());
    Ok(Json(json!({
        "success": true,
        "data": {
            "steamId": steam_id,
            "cookie": cookie,
            "dataName": config_text(&config, "dataName"),
            "status": status,
        },
    })))
}

async fn refresh_prices(
    State(state): State<AppState>,
    body: JsonBody,
    parse: fn(&Value) -> PriceRefresh,
) -> Result<Json<Value>, AppError> {
    let body = json_body(body).map_err(|_| missing_weapon_list())?;
    let list = match body.get("weapon_list") {
        None => return Err(missing_weapon_list()),
        Some(Value::Array(list)) => list,
        Some(_) => return Err(AppError::BadRequest("weapon_list 必须是数组".to_string())),
    };
    let refreshes: Vec<PriceRefresh> = list.iter().map(parse).collect();
    let report = state.repo.refresh_inventory_prices(&refreshes).await?;
    Ok(Json(json!({"success": true, "data": report})))
}

fn missing_weapon_list() -> AppError {
    AppError::BadRequest("缺少必要参数 weapon_list".to_string())
}
