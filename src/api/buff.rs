//! BUFF163 scraper endpoints, one router per trade side.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::youpin::order_summary;
use super::{decode, json_body, AppState, JsonBody};
use crate::db::repo::Ledger;
use crate::domain::primitives::lenient;
use crate::domain::{BuffOrderPayload, StatusChange};
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuffSide {
    Buy,
    Sell,
}

impl BuffSide {
    fn ledger(self) -> Ledger {
        match self {
            BuffSide::Buy => Ledger::BuffBuy,
            BuffSide::Sell => Ledger::BuffSell,
        }
    }

    fn inserted_message(self) -> &'static str {
        match self {
            BuffSide::Buy => "BUFF购买数据插入成功",
            BuffSide::Sell => "BUFF销售数据插入成功",
        }
    }
}

pub fn router(side: BuffSide) -> Router<AppState> {
    Router::new()
        .route(
            "/selectNotEnd/:user",
            get(move |user: Path<String>, state: State<AppState>| open_orders(user, state, side)),
        )
        .route(
            "/ApexTimeUrl/:user",
            get(move |user: Path<String>, state: State<AppState>| {
                latest_order_time(user, state, side)
            }),
        )
        .route(
            "/getLatestData/:user",
            get(move |user: Path<String>, state: State<AppState>| latest_order(user, state, side)),
        )
        .route(
            "/updateOrderStatus",
            post(move |state: State<AppState>, body: JsonBody| {
                update_order_status(state, body, side)
            }),
        )
        .route(
            "/insert_db",
            post(move |state: State<AppState>, body: JsonBody| insert_order(state, body, side)),
        )
        .route(
            "/countData/:user",
            get(move |user: Path<String>, state: State<AppState>| count_orders(user, state, side)),
        )
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    #[serde(deserialize_with = "lenient::opt_string", default)]
    item_id: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    state: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    state_sub: Option<String>,
}

async fn open_orders(
    Path(user): Path<String>,
    State(state): State<AppState>,
    side: BuffSide,
) -> Result<Json<Value>, AppError> {
    let ids = state.repo.open_order_ids(side.ledger(), &user).await?;
    Ok(Json(json!({"not_end_orders": ids})))
}

async fn latest_order_time(
    Path(user): Path<String>,
    State(state): State<AppState>,
    side: BuffSide,
) -> Result<Json<Value>, AppError> {
    let time = state.repo.latest_order_time(side.ledger(), &user).await?;
    Ok(Json(json!({"last_order_time": time})))
}

async fn latest_order(
    Path(user): Path<String>,
    State(state): State<AppState>,
    side: BuffSide,
) -> Result<Json<Value>, AppError> {
    let latest = state.repo.latest_order(side.ledger(), &user).await?;
    Ok(Json(match latest {
        Some(order) => json!(order),
        None => json!({"ID": null, "order_time": null}),
    }))
}

async fn update_order_status(
    State(state): State<AppState>,
    body: JsonBody,
    side: BuffSide,
) -> Result<Json<Value>, AppError> {
    let body: StatusBody = decode(json_body(body)?)?;
    let (Some(id), Some(status)) = (body.item_id, body.state) else {
        return Err(AppError::BadRequest("缺少必需参数item_id或state".to_string()));
    };
    let change = StatusChange {
        id,
        status,
        status_sub: body.state_sub,
    };
    // A BUFF order may only exist as a mirror, so a missing ledger row is not an error.
    let update = state.repo.update_order_status(side.ledger(), &change).await?;
    info!(
        "BUFF order {} -> {} (ledger row: {}, mirrors: {})",
        change.id, change.status, update.found, update.mirrored
    );
    Ok(Json(json!({"success": true, "message": "更新成功"})))
}

async fn insert_order(
    State(state): State<AppState>,
    body: JsonBody,
    side: BuffSide,
) -> Result<Json<Value>, AppError> {
    let payload: BuffOrderPayload = decode(json_body(body)?)?;
    let entry = payload
        .into_entry()
        .ok_or_else(|| AppError::BadRequest("缺少订单item_id".to_string()))?;
    state.repo.record_order(side.ledger(), &entry).await?;
    Ok(Json(json!({
        "success": true,
        "message": side.inserted_message(),
        "data": order_summary(&entry),
    })))
}

async fn count_orders(
    Path(user): Path<String>,
    State(state): State<AppState>,
    side: BuffSide,
) -> Result<Json<Value>, AppError> {
    let count = state.repo.count_orders(side.ledger(), &user).await?;
    Ok(Json(json!({"count": count})))
}
