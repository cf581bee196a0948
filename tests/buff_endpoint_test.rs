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

fn buff_order(item_id: &str, state: &str, created_at: &str) -> Value {
    json!({
        "item_id": item_id,
        "weapon_type": "手枪",
        "item_name": "沙漠之鹰 | 炽烈之炎",
        "weaponitem_name": "沙漠之鹰",
        "float_range": "略有磨损",
        "price": "245.0",
        "state": state,
        "state_sub": "等待卖家发货",
        "created_at": created_at,
        "pay_method_text": "支付宝",
        "seller_id": "U123",
        "weapon_float": "0.0901",
        "data_user": "buffer"
    })
}

#[tokio::test]
async fn test_buy_insert_and_queries() {
    let (app, _repo, _temp) = setup_test_app().await;

    let (status, body) = request(
        &app,
        "POST",
        "/buff163BuyV1/insert_db",
        Some(buff_order("B1", "待收货", "2024-05-01 10:00:00")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "BUFF购买数据插入成功");

    request(
        &app,
        "POST",
        "/buff163BuyV1/insert_db",
        Some(buff_order("B2", "已完成", "2024-06-01 10:00:00")),
    )
    .await;

    let (_, open) = request(&app, "GET", "/buff163BuyV1/selectNotEnd/buffer", None).await;
    assert_eq!(open["not_end_orders"], json!(["B1"]));

    let (_, apex) = request(&app, "GET", "/buff163BuyV1/ApexTimeUrl/buffer", None).await;
    assert_eq!(apex["last_order_time"], "2024-06-01 10:00:00");

    let (_, latest) = request(&app, "GET", "/buff163BuyV1/getLatestData/buffer", None).await;
    assert_eq!(latest["ID"], "B2");

    let (_, count) = request(&app, "GET", "/buff163BuyV1/countData/buffer", None).await;
    assert_eq!(count["count"], 2);

    // Both orders are mirrored into the unified buy table.
    let (_, unified) = request(&app, "GET", "/webBuyV1/countBuyNumber", None).await;
    assert_eq!(unified["count"], 2);
}

#[tokio::test]
async fn test_latest_order_empty_is_null() {
    let (app, _repo, _temp) = setup_test_app().await;

    let (status, latest) = request(&app, "GET", "/buff163SellV1/getLatestData/nobody", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(latest, json!({"ID": null, "order_time": null}));
}

#[tokio::test]
async fn test_status_update_reaches_mirror() {
    let (app, repo, _temp) = setup_test_app().await;
    request(
        &app,
        "POST",
        "/buff163SellV1/insert_db",
        Some(buff_order("S1", "待发货", "2024-05-01 10:00:00")),
    )
    .await;

    let (status, body) = request(
        &app,
        "POST",
        "/buff163SellV1/updateOrderStatus",
        Some(json!({"item_id": "S1", "state": "已完成", "state_sub": "交易成功"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let row = repo
        .facade()
        .select_one(
            "SELECT \"status\", \"status_sub\" FROM \"sell\" WHERE \"ID\" = 'S1' AND \"from\" = 'buff'",
            &[],
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.text("status").as_deref(), Some("已完成"));
    assert_eq!(row.text("status_sub").as_deref(), Some("交易成功"));
}

#[tokio::test]
async fn test_status_update_requires_item_id() {
    let (app, _repo, _temp) = setup_test_app().await;

    let (status, body) = request(
        &app,
        "POST",
        "/buff163BuyV1/updateOrderStatus",
        Some(json!({"state": "已完成"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "缺少必需参数item_id或state");
}
