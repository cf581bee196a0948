//! YouPin898 scraper endpoints: orders, leases and the message box.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{decode, insert_status, json_body, AppState, JsonBody};
use crate::db::repo::Ledger;
use crate::domain::primitives::lenient;
use crate::domain::{LeaseEntry, LeaseUpdate, OrderEntry, StatusChange, TradeSide, YyypOrderPayload};
use crate::error::AppError;

pub fn buy_router() -> Router<AppState> {
    Router::new()
        .route("/getWeaponNotEndStatusList/:user", get(open_buy_ids))
        .route("/selectNotEndID/:user", get(open_buy_ids))
        .route("/selectApexTime/:user", get(latest_buy_time))
        .route("/getCount/:user", get(count_buys))
        .route("/updateBuyData", post(update_buy))
        .route("/insert_webside_buydata", post(insert_buy))
        .route("/insert_main_buydata", post(insert_main_buy))
}

pub fn sell_router() -> Router<AppState> {
    Router::new()
        .route("/getWeaponNotEndStatusList/:user", get(open_sell_ids))
        .route("/updateSellData", post(update_sell))
        .route("/selectApexTime/:user", get(latest_sell_time))
        .route("/getCount/:user", get(count_sells))
        .route("/insert_webside_selldata", post(insert_sell))
        .route("/insert_main_selldata", post(insert_main_sell))
}

pub fn lent_router() -> Router<AppState> {
    Router::new()
        .route("/getNowLentingList", get(active_leases))
        .route("/getTimeOutLent", get(overdue_leases))
        .route("/selectApexTime/:user", get(latest_lease_start))
        .route("/getCount/:user", get(count_leases))
        .route("/updateLentData", post(update_lease))
        .route("/insert_webside_lentdata", post(insert_lease))
}

pub fn message_router() -> Router<AppState> {
    Router::new().route("/insert_message_box_data", post(insert_message))
}

/// IDs wrapped one per row, the shape the scraper iterates.
fn id_rows(ids: Vec<String>) -> Json<Value> {
    Json(Value::Array(ids.into_iter().map(|id| json!([id])).collect()))
}

/// Echo of a stored order for insert responses.
pub(crate) fn order_summary(entry: &OrderEntry) -> Value {
    json!({
        "id": entry.id,
        "weapon_name": entry.weapon_name,
        "item_name": entry.item_name,
        "price": entry.price,
    })
}

fn yyyp_entry(body: JsonBody, side: TradeSide) -> Result<OrderEntry, AppError> {
    let payload: YyypOrderPayload = decode(json_body(body)?)?;
    payload
        .into_entry(side)
        .ok_or_else(|| AppError::BadRequest("缺少订单ID".to_string()))
}

/// Body of `updateBuyData` / `updateSellData`.
#[derive(Debug, Deserialize)]
struct StatusBody {
    #[serde(rename = "ID", deserialize_with = "lenient::opt_string", default)]
    id: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    weapon_status: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    weapon_status_sub: Option<String>,
}

impl StatusBody {
    fn into_change(self) -> Option<StatusChange> {
        Some(StatusChange {
            id: self.id?,
            status: self.weapon_status?,
            status_sub: self.weapon_status_sub,
        })
    }
}

async fn update_status(
    state: &AppState,
    ledger: Ledger,
    body: JsonBody,
    missing_message: &str,
) -> Result<Json<Value>, AppError> {
    let body: StatusBody = decode(json_body(body)?)?;
    let change = body
        .into_change()
        .ok_or_else(|| AppError::BadRequest("缺少必需参数ID或weapon_status".to_string()))?;

    let update = state.repo.update_order_status(ledger, &change).await?;
    if !update.found {
        warn!("Status update for unknown order {}", change.id);
        return Err(AppError::NotFound(missing_message.to_string()));
    }
    Ok(Json(json!({"success": true, "message": "更新成功"})))
}

// =========================================================================
// Buy
// =========================================================================

pub async fn open_buy_ids(
    Path(user): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    Ok(id_rows(state.repo.open_order_ids(Ledger::YyypBuy, &user).await?))
}

pub async fn latest_buy_time(
    Path(user): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    let latest = state.repo.latest_order_time(Ledger::YyypBuy, &user).await?;
    Ok(Json(latest.map(Value::String).unwrap_or_else(|| json!(0))))
}

pub async fn count_buys(
    Path(user): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<String>, AppError> {
    let count = state.repo.count_orders(Ledger::YyypBuy, &user).await?;
    Ok(Json(count.to_string()))
}

pub async fn update_buy(
    State(state): State<AppState>,
    body: JsonBody,
) -> Result<Json<Value>, AppError> {
    update_status(&state, Ledger::YyypBuy, body, "记录不存在").await
}

pub async fn insert_buy(
    State(state): State<AppState>,
    body: JsonBody,
) -> Result<Json<Value>, AppError> {
    let entry = yyyp_entry(body, TradeSide::Buy)?;
    let write = state.repo.record_order(Ledger::YyypBuy, &entry).await?;
    info!("YouPin purchase {} stored ({:?})", entry.id, write);
    Ok(Json(json!({
        "success": true,
        "message": "悠悠有品购买数据插入成功",
        "data": order_summary(&entry),
    })))
}

pub async fn insert_main_buy(
    State(state): State<AppState>,
    body: JsonBody,
) -> Result<Json<Value>, AppError> {
    let entry = yyyp_entry(body, TradeSide::Buy)?;
    state.repo.record_unified(TradeSide::Buy, &entry).await?;
    Ok(Json(json!({
        "success": true,
        "message": "主购买数据插入成功",
        "data": order_summary(&entry),
    })))
}

// =========================================================================
// Sell
// =========================================================================

pub async fn open_sell_ids(
    Path(user): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    Ok(id_rows(state.repo.open_order_ids(Ledger::YyypSell, &user).await?))
}

pub async fn latest_sell_time(
    Path(user): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<String>, AppError> {
    let latest = state.repo.latest_order_time(Ledger::YyypSell, &user).await?;
    Ok(Json(latest.unwrap_or_else(|| "0".to_string())))
}

pub async fn count_sells(
    Path(user): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<String>, AppError> {
    let count = state.repo.count_orders(Ledger::YyypSell, &user).await?;
    Ok(Json(count.to_string()))
}

pub async fn update_sell(
    State(state): State<AppState>,
    body: JsonBody,
) -> Result<Json<Value>, AppError> {
    update_status(&state, Ledger::YyypSell, body, "yyyp_sell表中记录不存在").await
}

pub async fn insert_sell(
    State(state): State<AppState>,
    body: JsonBody,
) -> Result<Json<Value>, AppError> {
    let entry = yyyp_entry(body, TradeSide::Sell)?;
    let write = state.repo.record_order(Ledger::YyypSell, &entry).await?;
    info!("YouPin sale {} stored ({:?})", entry.id, write);

    let mut data = order_summary(&entry);
    data["price_original"] = json!(entry.price_original);
    Ok(Json(json!({
        "success": true,
        "message": "悠悠有品销售数据插入成功",
        "data": data,
    })))
}

pub async fn insert_main_sell(
    State(state): State<AppState>,
    body: JsonBody,
) -> Result<Json<Value>, AppError> {
    let entry = yyyp_entry(body, TradeSide::Sell)?;
    state.repo.record_unified(TradeSide::Sell, &entry).await?;
    Ok(Json(json!({
        "success": true,
        "message": "主销售数据插入成功",
        "data": order_summary(&entry),
    })))
}

// =========================================================================
// Leases
// =========================================================================

pub async fn active_leases(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    Ok(id_rows(state.repo.active_lease_ids().await?))
}

pub async fn overdue_leases(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let today = chrono::Local::now().format("%Y-%m-%d").to_string();
    Ok(id_rows(state.repo.overdue_lease_ids(&today).await?))
}

pub async fn latest_lease_start(
    Path(user): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<String>, AppError> {
    Ok(Json(state.repo.latest_lease_start(&user).await?))
}

pub async fn count_leases(
    Path(user): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<i64>, AppError> {
    Ok(Json(state.repo.count_leases(&user).await?))
}

pub async fn update_lease(
    State(state): State<AppState>,
    body: JsonBody,
) -> Response {
    let update = json_body(body).and_then(decode::<LeaseUpdate>);
    let result = match update {
        Ok(update) => state.repo.update_lease(&update).await.map_err(AppError::from),
        Err(e) => Err(e),
    };
    match result {
        Ok(true) => Json("update_info").into_response(),
        Ok(false) => (StatusCode::INTERNAL_SERVER_ERROR, Json("update_error")).into_response(),
        Err(e) => {
            warn!("Lease update failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, Json("update_error")).into_response()
        }
    }
}

pub async fn insert_lease(
    State(state): State<AppState>,
    body: JsonBody,
) -> Result<Json<&'static str>, AppError> {
    let entry: LeaseEntry = decode(json_body(body)?)?;
    Ok(insert_status(state.repo.insert_lease(&entry).await, "lease"))
}

// =========================================================================
// Message box
// =========================================================================

pub async fn insert_message(
    State(state): State<AppState>,
    body: JsonBody,
) -> Result<Json<&'static str>, AppError> {
    let payload = json_body(body)?;
    Ok(insert_status(state.repo.insert_message(&payload).await, "message"))
}
