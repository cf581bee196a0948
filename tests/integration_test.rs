use axum::http::StatusCode;
use serde_json::{json, Value};
use skinledger::api::{self, AppState};
use skinledger::config::Config;
use skinledger::db::init_db;
use skinledger::{CollectorScheduler, MockCollector, Repository};
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

async fn setup_test_app() -> (axum::Router, TempDir) {
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
    let state = AppState::new(repo, config, scheduler);

    (api::create_router(state), temp_dir)
}

async fn get_json(app: &axum::Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let request = axum::http::Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _temp) = setup_test_app().await;

    let (status, body) = get_json(&app, "GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_api_test_endpoint() {
    let (app, _temp) = setup_test_app().await;

    let (status, body) = get_json(&app, "GET", "/indexPage/ApiTest").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "API is running successfully!");
}

#[tokio::test]
async fn test_fresh_database_is_healthy() {
    let (app, _temp) = setup_test_app().await;

    let (status, body) = get_json(&app, "GET", "/admin/integrity").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["missing_tables"], json!([]));
    assert_eq!(body["data"]["missing_columns"], json!({}));

    let (_, repaired) = get_json(&app, "POST", "/admin/repair").await;
    assert_eq!(repaired["data"]["sync"]["tables"]["buy"]["outcome"], "unchanged");
}

#[tokio::test]
async fn test_statistics_and_info_cover_registry() {
    let (app, _temp) = setup_test_app().await;

    let (_, stats) = get_json(&app, "GET", "/admin/statistics").await;
    assert_eq!(stats["data"]["total"], 0);
    assert_eq!(stats["data"]["tables"]["config"], 0);
    assert_eq!(stats["data"]["tables"]["steam_stockComponents"], 0);

    let (_, info) = get_json(&app, "GET", "/admin/info").await;
    let columns = info["data"]["tables"]["yyyp_weapon_classID"].as_array().unwrap();
    assert_eq!(columns[0]["name"], "Id");
    assert_eq!(columns[0]["pk"], 1);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let (app, _temp) = setup_test_app().await;

    let request = axum::http::Request::builder()
        .uri("/nope")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
