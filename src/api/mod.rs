pub mod admin;
pub mod browse;
pub mod buff;
pub mod catalog;
pub mod components;
pub mod health;
pub mod inventory;
pub mod settings;
pub mod steam;
pub mod youpin;

use crate::collector::CollectorScheduler;
use crate::config::Config;
use crate::db::{DbRow, InsertOutcome, QueryError, Repository};
use crate::error::AppError;
use axum::extract::rejection::JsonRejection;
use axum::{routing::get, Json, Router};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::error;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Config,
    pub scheduler: Arc<CollectorScheduler>,
}

impl AppState {
    pub fn new(repo: Arc<Repository>, config: Config, scheduler: Arc<CollectorScheduler>) -> Self {
        Self {
            repo,
            config,
            scheduler,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/indexPage/ApiTest", get(health::api_test))
        .nest("/configV1", settings::config_router())
        .nest("/dataSourcePageV1/api/datasource", settings::datasource_router())
        .nest("/youpin898BuyV1", youpin::buy_router())
        .nest("/youpin898SellV1", youpin::sell_router())
        .nest("/youpin898LentV1", youpin::lent_router())
        .nest("/youpin898MessageBoxV1", youpin::message_router())
        .nest("/youpin898SelectWeaponV1", catalog::yyyp_router())
        .nest("/buff163BuyV1", buff::router(buff::BuffSide::Buy))
        .nest("/buff163SellV1", buff::router(buff::BuffSide::Sell))
        .nest("/buff163SelectWeaponV1", catalog::buff_router())
        .nest("/steamMarketV1", steam::market_router())
        .nest("/steamInventoryV1", steam::inventory_router())
        .nest("/steamInventoryHistoryV1", steam::history_router())
        .nest("/webInventoryV1", inventory::router())
        .nest("/steamSelectWeaponHashNameV1", catalog::hash_name_router())
        .nest("/webSelectWeaponV1", catalog::web_router())
        .nest("/prefectWorldStockComponentsV1", components::ingest_router())
        .nest("/prefectWorldConfigV1", settings::prefect_world_router())
        .nest("/webStockComponentsV1", components::web_router())
        .nest("/webBuyV1", browse::board_router(browse::Board::Buy))
        .nest("/webSellV1", browse::board_router(browse::Board::Sell))
        .nest("/webLentV1", browse::board_router(browse::Board::Lent))
        .nest("/webBuyPageV1", browse::type_wear_router(browse::Board::Buy))
        .nest("/webSellPageV1", browse::type_wear_router(browse::Board::Sell))
        .nest("/webLentPageV1", browse::type_wear_router(browse::Board::Lent))
        .nest("/webSteamMarketV1", browse::steam_market_router())
        .nest("/admin", admin::router())
        .layer(cors)
        .with_state(state)
}

/// A JSON body whose rejection is turned into the API's own 400.
pub(crate) type JsonBody = Result<Json<Value>, JsonRejection>;

/// Unwrap a JSON body, treating a malformed, null or empty object body as invalid.
pub(crate) fn json_body(body: JsonBody) -> Result<Value, AppError> {
    match body {
        Ok(Json(Value::Null)) | Err(_) => Err(invalid_json()),
        Ok(Json(Value::Object(map))) if map.is_empty() => Err(invalid_json()),
        Ok(Json(value)) => Ok(value),
    }
}

/// Decode a body value into a payload type.
pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> Result<T, AppError> {
    serde_json::from_value(value).map_err(|e| AppError::BadRequest(format!("无效的JSON数据: {}", e)))
}

pub(crate) fn invalid_json() -> AppError {
    AppError::BadRequest("无效的JSON数据".to_string())
}

/// Rows as arrays in column order.
pub(crate) fn rows_json(rows: &[DbRow]) -> Json<Value> {
    Json(Value::Array(rows.iter().map(DbRow::to_array).collect()))
}

/// The scraper-facing insert contract: a status string, always with 200.
pub(crate) fn insert_status(result: Result<InsertOutcome, QueryError>, what: &str) -> Json<&'static str> {
    Json(match result {
        Ok(InsertOutcome::Inserted) => "写入成功",
        Ok(InsertOutcome::Duplicate) => "重复数据",
        Err(e) => {
            error!("Failed to insert {}: {}", what, e);
            "写入失败"
        }
    })
}
