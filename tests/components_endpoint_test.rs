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

fn component(assetid: &str, instanceid: &str, name: &str, price: &str) -> Value {
    json!({
        "assetid": assetid,
        "instanceid": instanceid,
        "classid": "310776",
        "item_name": name,
        "weapon_type": "步枪",
        "buy_price": price,
        "order_time": "2024-05-01 10:00:00",
        "data_user": "7656"
    })
}

#[tokio::test]
async fn test_batch_validates_items() {
    let (app, _repo, _temp) = setup_test_app().await;
    let uri = "/prefectWorldStockComponentsV1/batch";

    let (status, body) = request(&app, "POST", uri, Some(json!({"data": []}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"code": 400, "message": "缺少必要参数 items", "result": null}));

    let (_, body) = request(&app, "POST", uri, Some(json!({"items": []}))).await;
    assert_eq!(body["message"], "items 不能为空");

    let (_, body) = request(&app, "POST", uri, Some(json!({"items": {"assetid": "1"}}))).await;
    assert_eq!(body["message"], "items 必须是数组类型");
}

#[tokio::test]
async fn test_batch_reports_failures_per_item() {
    let (app, _repo, _temp) = setup_test_app().await;

    let items = json!([
        component("A1", "I1", "AK-47 | 红线 (久经沙场)", "88.5"),
        {"instanceid": "I2", "item_name": "no asset id"}
    ]);
    let (status, body) = request(
        &app,
        "POST",
        "/prefectWorldStockComponentsV1/batch",
        Some(json!({"items": items})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 0);
    let report = &body["result"];
    assert_eq!(report["total"], 2);
    assert_eq!(report["success"], 1);
    assert_eq!(report["insert_count"], 1);
    assert_eq!(report["failed"], 1);
    assert_eq!(report["failed_items"][0]["index"], 1);
    assert_eq!(report["failed_items"][0]["error"], "缺少主键 assetid");
}

#[tokio::test]
async fn test_single_insert_then_update() {
    let (app, _repo, _temp) = setup_test_app().await;
    let uri = "/prefectWorldStockComponentsV1/single";

    let (_, body) = request(&app, "POST", uri, Some(component("A1", "I1", "AK-47 | 红线", "80"))).await;
    assert_eq!(body["message"], "记录插入成功");
    assert_eq!(body["result"], json!({"assetid": "A1", "action": "insert"}));

    let (_, body) = request(&app, "POST", uri, Some(json!({"assetid": "A1", "buy_price": 95}))).await;
    assert_eq!(body["message"], "记录更新成功");
    assert_eq!(body["result"]["action"], "update");

    let (_, listed) = request(&app, "GET", "/webStockComponentsV1/components/7656", None).await;
    assert_eq!(listed["total"], 1);
    assert_eq!(listed["data"][0]["buy_price"], "95");
    assert_eq!(listed["data"][0]["item_name"], "AK-47 | 红线");

    let (status, body) = request(&app, "POST", uri, Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "缺少请求数据");

    let (status, body) = request(&app, "POST", uri, Some(json!({"instanceid": "I9"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "缺少主键 assetid");
}

#[tokio::test]
async fn test_web_listing_and_stats() {
    let (app, _repo, _temp) = setup_test_app().await;
    let items = json!([
        component("A1", "I1", "AK-47 | 红线", "80"),
        component("A2", "I2", "AWP | 二西莫夫", "120"),
        component("A3", "I3", "AK-47 | 火蛇", "")
    ]);
    request(&app, "POST", "/prefectWorldStockComponentsV1/batch", Some(json!({"items": items}))).await;

    let (_, page) = request(
        &app,
        "GET",
        "/webStockComponentsV1/components/7656?search=AK&page=1&page_size=1",
        None,
    )
    .await;
    assert_eq!(page["total"], 2);
    assert_eq!(page["data"].as_array().unwrap().len(), 1);
    assert_eq!(page["page_size"], 1);

    let (_, stats) = request(&app, "GET", "/webStockComponentsV1/components/stats/7656", None).await;
    assert_eq!(stats["data"]["totalCount"], 3);
    assert_eq!(stats["data"]["totalCost"], 200.0);

    let (_, other) = request(&app, "GET", "/webStockComponentsV1/components/stats/nobody", None).await;
    assert_eq!(other["data"]["totalCount"], 0);
}

#[tokio::test]
async fn test_delete_scoped_to_owner() {
    let (app, _repo, _temp) = setup_test_app().await;
    request(
        &app,
        "POST",
        "/prefectWorldStockComponentsV1/single",
        Some(component("A1", "I1", "AK-47 | 红线", "80")),
    )
    .await;

    let (status, _) = request(&app, "DELETE", "/prefectWorldStockComponentsV1/delete/A1/other", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = request(&app, "DELETE", "/prefectWorldStockComponentsV1/delete/A1/7656", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["deleted_count"], 1);

    let (status, body) = request(&app, "DELETE", "/prefectWorldStockComponentsV1/delete/A1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 404);
}
