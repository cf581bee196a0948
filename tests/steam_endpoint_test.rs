use axum::http::StatusCode;
use serde_json::{json, Value};
use skinledger::api::{self, AppState};
use skinledger::config::Config;
use skinledger::db::init_db;
use skinledger::{CollectorScheduler, MockCollector, Repository};
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

async fn setup_test_app() -> (axum::Router, Arc<Repository>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path, 30_000).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));

    let config = Config {
        port: 0,
        database_path: db_path,
        log_level: "info".to_string(),
        http_proxy: None,
        collect_workers: 2,
        collector_url: None,
        busy_timeout_ms: 30_000,
    };
    let scheduler = Arc::new(CollectorScheduler::new(
        Arc::new(MockCollector::new()),
        repo.clone(),
        config.collect_workers,
    ));
    let state = AppState::new(repo.clone(), config, scheduler);
    (api::create_router(state), repo, temp_dir)
}

async fn request(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = axum::http::Request::builder().method(method).uri(uri);
    let req = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(axum::body::Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(axum::body::Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn inventory_payload(assetid: &str, item_name: &str, float: &str) -> Value {
    json!({
        "assetid": assetid,
        "instanceid": "0",
        "classid": "310776",
        "steamId": "7656",
        "tags": {
            "parsed_name": {
                "weapon_type": "步枪",
                "weapon_name": "AK-47",
                "item_name": item_name
            },
            "Exterior": {"localized_tag_name": "久经沙场"}
        },
        "asset_properties": [
            {"propertyid": 1, "int_value": "7"},
            {"propertyid": 2, "float_value": float}
        ],
        "trade_lock_info": "2024-06-01 可交易"
    })
}

#[tokio::test]
async fn test_market_trade_sides() {
    let (app, _repo, _temp) = setup_test_app().await;

    let (status, body) = request(
        &app,
        "POST",
        "/steamMarketV1/insertNewData",
        Some(json!({"ID": "m1", "trade_type": "+", "item_name": "P250 | 沙丘", "price": "0.5", "steamId": "7656"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "购买数据插入成功");
    assert_eq!(body["data"]["operation_type"], "购买");

    let (_, body) = request(
        &app,
        "POST",
        "/steamMarketV1/insertNewData",
        Some(json!({"ID": "m2", "trade_type": "-", "price": 3, "steamId": "7656"})),
    )
    .await;
    assert_eq!(body["message"], "销售数据插入成功");

    let (status, body) = request(
        &app,
        "POST",
        "/steamMarketV1/insertNewData",
        Some(json!({"ID": "m3", "trade_type": "?"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "无效的交易类型");

    let (_, count) = request(&app, "GET", "/steamMarketV1/countData/7656", None).await;
    assert_eq!(count["count"], 2);
}

#[tokio::test]
async fn test_inventory_insert_list_and_delete() {
    let (app, _repo, _temp) = setup_test_app().await;

    let (status, body) = request(
        &app,
        "POST",
        "/steamInventoryV1/inventory",
        Some(inventory_payload("a1", "AK-47 | 红线 (久经沙场)", "0.2512")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "库存数据插入成功");
    assert_eq!(body["data"]["weapon_float"], "0.2512");

    let (_, listing) = request(&app, "GET", "/steamInventoryV1/inventory/7656?limit=10", None).await;
    assert_eq!(listing["count"], 1);
    assert_eq!(listing["data"][0]["assetid"], "a1");
    assert_eq!(listing["data"][0]["float_range"], "久经沙场");
    assert_eq!(listing["data"][0]["remark"], "2024-06-01 可交易");

    let (_, count) = request(&app, "GET", "/steamInventoryV1/inventory/count/7656", None).await;
    assert_eq!(count["data"]["count"], 1);

    let (_, deleted) = request(&app, "DELETE", "/steamInventoryV1/inventory/user/7656", None).await;
    assert_eq!(deleted["deleted_count"], 1);
    assert_eq!(deleted["message"], "成功删除 1 条库存记录");

    let (_, deleted) = request(&app, "DELETE", "/steamInventoryV1/inventory/user/7656", None).await;
    assert_eq!(deleted["message"], "没有需要删除的记录");
}

#[tokio::test]
async fn test_inventory_batch_fills_prices() {
    let (app, repo, _temp) = setup_test_app().await;

    // A purchase with the same float supplies the buy price.
    request(
        &app,
        "POST",
        "/youpin898BuyV1/insert_main_buydata",
        Some(json!({
            "ID": "B1",
            "item_name": "AK-47 | 红线 (久经沙场)",
            "weapon_float": 0.2512,
            "price": 88.5,
            "from": "yyyp"
        })),
    )
    .await;

    let items = json!([
        inventory_payload("a1", "AK-47 | 红线 (久经沙场)", "0.2512"),
        inventory_payload("a2", "2023年巴黎锦标赛纪念徽章", ""),
        inventory_payload("a3", "库存存储组件", ""),
        inventory_payload("a4", "沙漠之鹰 | 炽烈之炎", ""),
    ]);
    let (status, body) = request(
        &app,
        "POST",
        "/steamInventoryV1/inventory/batch",
        Some(json!({"steamId": "7656", "items": items})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "批量插入完成");
    assert_eq!(body["data"]["success_count"], 4);
    assert_eq!(body["data"]["price_filled_count"], 3);
    assert_eq!(body["data"]["price_not_filled_count"], 1);

    let prices = repo
        .facade()
        .select(
            "SELECT \"assetid\", \"buy_price\" FROM \"steam_inventory\" ORDER BY \"assetid\"",
            &[],
        )
        .await
        .unwrap();
    let prices: Vec<Option<String>> = prices.iter().map(|r| r.text("buy_price")).collect();
    assert_eq!(
        prices,
        vec![
            Some("88.5".to_string()),
            Some("0".to_string()),
            Some("14".to_string()),
            None
        ]
    );
}

#[tokio::test]
async fn test_inventory_batch_requires_items() {
    let (app, _repo, _temp) = setup_test_app().await;

    let (status, body) = request(
        &app,
        "POST",
        "/steamInventoryV1/inventory/batch",
        Some(json!({"steamId": "7656", "items": []})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "steamId和items不能为空");
}

#[tokio::test]
async fn test_buy_price_update() {
    let (app, repo, _temp) = setup_test_app().await;
    request(
        &app,
        "POST",
        "/steamInventoryV1/inventory",
        Some(inventory_payload("a1", "沙漠之鹰 | 炽烈之炎", "0.1")),
    )
    .await;

    let (status, body) = request(
        &app,
        "PUT",
        "/steamInventoryV1/inventory/buy_price/7656/a1",
        Some(json!({"buy_price": "120.456"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["affected"], 1);

    let row = repo
        .facade()
        .select_one("SELECT \"buy_price\" FROM \"steam_inventory\" WHERE \"assetid\" = 'a1'", &[])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.text("buy_price").as_deref(), Some("120.46"));

    let (status, body) = request(
        &app,
        "PUT",
        "/steamInventoryV1/inventory/buy_price/7656/missing",
        Some(json!({"buy_price": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "未找到匹配的记录");

    let (status, _) = request(
        &app,
        "PUT",
        "/steamInventoryV1/inventory/buy_price/7656/a1",
        Some(json!({"buy_price": "NaN"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_history_insert_is_idempotent() {
    let (app, _repo, _temp) = setup_test_app().await;
    let event = json!({
        "trade_id": "t1",
        "steamId": "7656",
        "trade_time": "2024年5月1日 10:00",
        "trade_time_timestamp": "2024-05-01 10:00:00",
        "trade_type": "market_buy",
        "trade_partner": "Steam 市场",
        "items_received_count": 1,
        "items_received": [{"name": "AK-47 | 红线"}]
    });

    let (status, body) = request(&app, "POST", "/steamInventoryHistoryV1/insert", Some(event.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "库存历史记录插入成功");
    assert_eq!(body["data"]["id"], "7656_t1");

    let (status, body) = request(&app, "POST", "/steamInventoryHistoryV1/insert", Some(event)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "记录已存在，跳过插入");

    let (_, latest) = request(&app, "GET", "/steamInventoryHistoryV1/getLatestData/7656", None).await;
    assert_eq!(latest["trade_id"], "t1");
    assert_eq!(latest["trade_time"], "2024-05-01 10:00:00");

    let (_, history) = request(&app, "GET", "/steamInventoryHistoryV1/getHistory/7656/0/10", None).await;
    assert_eq!(history["count"], 1);
    assert_eq!(history["data"][0]["items_received"][0]["name"], "AK-47 | 红线");

    let (_, stats) = request(&app, "GET", "/steamInventoryHistoryV1/getStatistics/7656", None).await;
    assert_eq!(stats["data"]["total_count"], 1);
    assert_eq!(stats["data"]["market_buy"], 1);
    assert_eq!(stats["data"]["unpack"], 0);

    let (_, count) = request(&app, "GET", "/steamInventoryHistoryV1/count/7656", None).await;
    assert_eq!(count["count"], 1);
}

#[tokio::test]
async fn test_history_missing_fields_and_latest() {
    let (app, _repo, _temp) = setup_test_app().await;

    let (status, body) = request(
        &app,
        "POST",
        "/steamInventoryHistoryV1/insert",
        Some(json!({"trade_id": "t1"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "缺少必要字段");

    let (status, body) = request(&app, "GET", "/steamInventoryHistoryV1/getLatestData/nobody", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "没有找到记录");
}

#[tokio::test]
async fn test_history_filtered_by_type_and_date() {
    let (app, _repo, _temp) = setup_test_app().await;
    let events = [
        ("t1", "2024-05-01 10:00:00", "market_buy"),
        ("t2", "2024-05-03 09:30:00", "market_sell"),
        ("t3", "2024-05-07 18:00:00", "market_buy"),
    ];
    for (trade_id, timestamp, trade_type) in events {
        let (status, _) = request(
            &app,
            "POST",
            "/steamInventoryHistoryV1/insert",
            Some(json!({
                "trade_id": trade_id,
                "steamId": "7656",
                "trade_time": timestamp,
                "trade_time_timestamp": timestamp,
                "trade_type": trade_type,
                "trade_partner": "Steam 市场"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = request(
        &app,
        "GET",
        "/steamInventoryHistoryV1/getHistoryByType/7656/market_buy/0/10",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["count"], 2);
    assert_eq!(body["data"][0]["trade_id"], "t3");
    assert_eq!(body["data"][1]["trade_id"], "t1");

    let (_, body) = request(
        &app,
        "GET",
        "/steamInventoryHistoryV1/getHistoryByType/7656/market_buy/1/10",
        None,
    )
    .await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["data"][0]["trade_id"], "t1");

    let (status, body) = request(
        &app,
        "GET",
        "/steamInventoryHistoryV1/getHistoryByTimeRange/7656/2024-05-01/2024-05-03/0/10",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["data"][0]["trade_id"], "t2");
    assert_eq!(body["data"][1]["trade_id"], "t1");

    let (_, body) = request(
        &app,
        "GET",
        "/steamInventoryHistoryV1/getHistoryByTimeRange/other/2024-05-01/2024-05-31/0/10",
        None,
    )
    .await;
    assert_eq!(body["count"], 0);
}
