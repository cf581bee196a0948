//! Steam endpoints: market trades, inventory and inventory history.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::{decode, invalid_json, json_body, AppState, JsonBody};
use crate::db::repo::{HistoryInsert, HistoryQuery};
use crate::db::SqlValue;
use crate::domain::money::round_money;
use crate::domain::primitives::lenient;
use crate::domain::{HistoryEntry, InventoryItem, MarketTrade, TradeSide};
use crate::error::AppError;

pub fn market_router() -> Router<AppState> {
    Router::new()
        .route("/countData/:user", get(count_market_trades))
        .route("/insertNewData", post(insert_market_trade))
}

pub fn inventory_router() -> Router<AppState> {
    Router::new()
        .route("/inventory", post(insert_inventory_item))
        .route("/inventory/batch", post(replace_inventory))
        .route("/inventory/:user", get(list_inventory))
        .route("/inventory/count/:user", get(count_inventory))
        .route("/inventory/user/:user", delete(delete_inventory))
        .route("/inventory/buy_price/:user/:assetid", put(update_buy_price))
}

pub fn history_router() -> Router<AppState> {
    Router::new()
        .route("/insert", post(insert_history))
        .route("/getLatestData/:steam_id", get(latest_history))
        .route("/getHistory/:steam_id/:offset/:limit", get(list_history))
        .route(
            "/getHistoryByType/:steam_id/:trade_type/:offset/:limit",
            get(list_history_by_type),
        )
        .route(
            "/getHistoryByTimeRange/:steam_id/:start_date/:end_date/:offset/:limit",
            get(list_history_by_time_range),
        )
        .route("/getStatistics/:steam_id", get(history_statistics))
        .route("/count/:steam_id", get(count_history))
}

// =========================================================================
// Market
// =========================================================================

pub async fn count_market_trades(
    Path(user): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    let count = state.repo.count_market_trades(&user).await?;
    Ok(Json(json!({"count": count})))
}

pub async fn insert_market_trade(
    State(state): State<AppState>,
    body: JsonBody,
) -> Result<Json<Value>, AppError> {
    let trade: MarketTrade = decode(json_body(body)?)?;
    let Some((side, outcome)) = state.repo.record_market_trade(&trade).await? else {
        return Err(AppError::BadRequest("无效的交易类型".to_string()));
    };
    info!("Steam market trade {:?} saved ({:?})", trade.id, outcome);

    let (message, operation_type) = match side {
        TradeSide::Buy => ("购买数据插入成功", "购买"),
        TradeSide::Sell => ("销售数据插入成功", "销售"),
    };
    Ok(Json(json!({
        "success": true,
        "message": message,
        "data": {
            "id": trade.id,
            "trade_type": trade.trade_type,
            "operation_type": operation_type,
            "weapon_name": trade.weapon_name,
            "item_name": trade.item_name,
            "price": trade.price,
        },
    })))
}

// =========================================================================
// Inventory
// =========================================================================

pub async fn insert_inventory_item(
    State(state): State<AppState>,
    body: JsonBody,
) -> Result<Json<Value>, AppError> {
    let item = InventoryItem::from_payload(&json_body(body)?);
    state.repo.insert_inventory_item(&item).await?;
    Ok(Json(json!({
        "success": true,
        "message": "库存数据插入成功",
        "data": {
            "assetid": item.assetid,
            "weapon_name": item.weapon_name,
            "item_name": item.item_name,
            "weapon_float": item.weapon_float,
        },
    })))
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    100
}

pub async fn list_inventory(
    Path(user): Path<String>,
    Query(page): Query<PageQuery>,
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    let rows = state.repo.list_inventory(&user, page.limit, page.offset).await?;
    let data: Vec<Value> = rows.iter().map(|r| r.to_object()).collect();
    let count = data.len();
    Ok(Json(json!({"success": true, "data": data, "count": count})))
}

pub async fn count_inventory(
    Path(user): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    let count = state.repo.count_inventory(&user).await?;
    Ok(Json(json!({"success": true, "data": {"user_id": user, "count": count}})))
}

pub async fn delete_inventory(
    Path(user): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    let deleted = state.repo.delete_inventory(&user).await?;
    let message = if deleted == 0 {
        "没有需要删除的记录".to_string()
    } else {
        format!("成功删除 {} 条库存记录", deleted)
    };
    Ok(Json(json!({"success": true, "message": message, "deleted_count": deleted})))
}

#[derive(Debug, Deserialize)]
struct BatchBody {
    #[serde(rename = "steamId", deserialize_with = "lenient::opt_string", default)]
    steam_id: Option<String>,
    #[serde(default)]
    items: Option<Vec<Value>>,
}

pub async fn replace_inventory(
    State(state): State<AppState>,
    body: JsonBody,
) -> Result<Json<Value>, AppError> {
    let body: BatchBody = decode(json_body(body)?)?;
    let (Some(steam_id), Some(items)) = (body.steam_id, body.items.filter(|i| !i.is_empty())) else {
        return Err(AppError::BadRequest("steamId和items不能为空".to_string()));
    };
    let report = state.repo.replace_inventory(&steam_id, &items).await?;
    info!(
        "Inventory of {} replaced: {}/{} stored",
        steam_id, report.success_count, report.total
    );
    Ok(Json(json!({"success": true, "message": "批量插入完成", "data": report})))
}

/// A buy price as stored: two decimals, no trailing zeros. Blank means clear.
fn buy_price_value(price: &Value) -> Result<SqlValue, AppError> {
    if lenient::value_to_string(price).is_none() {
        return Ok(SqlValue::Null);
    }
    let price = lenient::value_to_f64(price).ok_or_else(invalid_json)?;
    Ok(SqlValue::Text(round_money(price, 2).normalize().to_string()))
}

pub async fn update_buy_price(
    Path((user, assetid)): Path<(String, String)>,
    State(state): State<AppState>,
    body: JsonBody,
) -> Result<Json<Value>, AppError> {
    let body = json_body(body)?;
    let price = body.get("buy_price").ok_or_else(invalid_json)?;
    let affected = state
        .repo
        .update_buy_price(&user, &assetid, buy_price_value(price)?)
        .await?;
    if affected == 0 {
        return Err(AppError::NotFound("未找到匹配的记录".to_string()));
    }
    Ok(Json(json!({"success": true, "message": "更新成功", "affected": affected})))
}

// =========================================================================
// Inventory history
// =========================================================================

pub async fn insert_history(
    State(state): State<AppState>,
    body: JsonBody,
) -> Result<Json<Value>, AppError> {
    let payload = json_body(body)?;
    let entry = HistoryEntry::from_payload(&payload)
        .ok_or_else(|| AppError::BadRequest("缺少必要字段".to_string()))?;
    let message = match state.repo.insert_history(&entry).await? {
        HistoryInsert::Inserted => "库存历史记录插入成功",
        HistoryInsert::AlreadyExists => "记录已存在，跳过插入",
    };
    Ok(Json(json!({"success": true, "message": message, "data": {"id": entry.id()}})))
}

pub async fn latest_history(
    Path(steam_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let Some(latest) = state.repo.latest_history(&steam_id).await? else {
        let body = json!({"success": false, "message": "没有找到记录"});
        return Ok((StatusCode::NOT_FOUND, Json(body)).into_response());
    };
    Ok(Json(json!({
        "success": true,
        "trade_id": latest.trade_id,
        "trade_time": latest.trade_time,
        "trade_type": latest.trade_type,
        "trade_partner": latest.trade_partner,
    }))
    .into_response())
}

async fn history_page(
    state: &AppState,
    steam_id: &str,
    query: HistoryQuery,
    offset: i64,
    limit: i64,
) -> Result<Json<Value>, AppError> {
    let records = state.repo.list_history(steam_id, &query, offset, limit).await?;
    let count = records.len();
    Ok(Json(json!({"success": true, "data": records, "count": count})))
}

pub async fn list_history(
    Path((steam_id, offset, limit)): Path<(String, i64, i64)>,
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    history_page(&state, &steam_id, HistoryQuery::All, offset, limit).await
}

pub async fn list_history_by_type(
    Path((steam_id, trade_type, offset, limit)): Path<(String, String, i64, i64)>,
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    history_page(&state, &steam_id, HistoryQuery::ByType(trade_type), offset, limit).await
}

/// Dates are `YYYY-MM-DD`, both ends inclusive.
pub async fn list_history_by_time_range(
    Path((steam_id, start_date, end_date, offset, limit)): Path<(String, String, String, i64, i64)>,
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    let query = HistoryQuery::TimeRange(start_date, end_date);
    history_page(&state, &steam_id, query, offset, limit).await
}

pub async fn history_statistics(
    Path(steam_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    let stats = state.repo.history_statistics(&steam_id).await?;
    Ok(Json(json!({"success": true, "data": stats})))
}

pub async fn count_history(
    Path(steam_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    let count = state.repo.count_history(&steam_id).await?;
    Ok(Json(json!({"success": true, "count": count})))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buy_price_rounds_and_normalizes() {
        assert_eq!(buy_price_value(&json!(12.346)).unwrap(), SqlValue::Text("12.35".to_string()));
        assert_eq!(buy_price_value(&json!("8.10")).unwrap(), SqlValue::Text("8.1".to_string()));
        assert_eq!(buy_price_value(&json!(14)).unwrap(), SqlValue::Text("14".to_string()));
    }

    #[test]
    fn test_blank_buy_price_clears() {
        assert_eq!(buy_price_value(&Value::Null).unwrap(), SqlValue::Null);
        assert_eq!(buy_price_value(&json!("None")).unwrap(), SqlValue::Null);
        assert!(buy_price_value(&json!("abc")).is_err());
        assert!(buy_price_value(&json!("NaN")).is_err());
        assert!(buy_price_value(&json!("inf")).is_err());
    }
}
