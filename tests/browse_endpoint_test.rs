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

async fn seed_buy(app: &axum::Router, id: &str, weapon: &str, ty: &str, wear: &str, price: f64, status: &str, time: &str) {
    let order = json!({
        "ID": id,
        "item_name": format!("{} | 测试 ({})", weapon, wear),
        "weapon_name": weapon,
        "weapon_type": ty,
        "float_range": wear,
        "price": price,
        "status": status,
        "order_time": time,
        "from": "yyyp"
    });
    let (status, _) = request(app, "POST", "/youpin898BuyV1/insert_main_buydata", Some(order)).await;
    assert_eq!(status, StatusCode::OK);
}

async fn seeded_app() -> (axum::Router, TempDir) {
    let (app, _repo, temp) = setup_test_app().await;
    seed_buy(&app, "B1", "AK-47", "步枪", "久经沙场", 100.0, "已完成", "2024-01-05 10:00:00").await;
    seed_buy(&app, "B2", "AK-47", "步枪", "崭新出厂", 50.0, "已取消", "2024-02-01 10:00:00").await;
    seed_buy(&app, "B3", "USP", "手枪", "久经沙场", 30.0, "待收货", "2024-03-01 10:00:00").await;
    (app, temp)
}

#[tokio::test]
async fn test_buy_board_paging_and_filters() {
    let (app, _temp) = seeded_app().await;

    let (_, count) = request(&app, "GET", "/webBuyV1/countBuyNumber", None).await;
    assert_eq!(count["count"], 3);

    let (_, page) = request(&app, "GET", "/webBuyV1/getBuyData/0/2", None).await;
    let rows = page.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][0], "B3");
    assert_eq!(rows[1][0], "B2");

    let (_, found) = request(&app, "GET", "/webBuyV1/selectBuyWeaponName/AK", None).await;
    assert_eq!(found.as_array().unwrap().len(), 2);

    let (_, completed) = request(
        &app,
        "GET",
        "/webBuyV1/getBuyDataByStatus/%E5%B7%B2%E5%AE%8C%E6%88%90/0/10",
        None,
    )
    .await;
    assert_eq!(completed.as_array().unwrap().len(), 1);
    assert_eq!(completed[0][0], "B1");

    let (_, ranged) = request(
        &app,
        "GET",
        "/webBuyV1/getBuyDataByTimeRange/2024-01-01/2024-02-28/0/10",
        None,
    )
    .await;
    assert_eq!(ranged.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_buy_stats_exclude_cancelled_amounts() {
    let (app, _temp) = seeded_app().await;

    let (status, stats) = request(&app, "GET", "/webBuyV1/getBuyStats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_count"], 3);
    assert_eq!(stats["total_amount"], 130.0);
    assert_eq!(stats["avg_price"], 65.0);
    assert_eq!(stats["completed_count"], 1);
    assert_eq!(stats["cancelled_count"], 1);
    assert_eq!(stats["pending_count"], 1);

    let (_, all) = request(&app, "GET", "/webBuyV1/getBuyStatsByStatus/all", None).await;
    assert_eq!(all["total_count"], 3);

    let (_, ranged) = request(&app, "GET", "/webBuyV1/getBuyStatsByTimeRange/2024-03-01/2024-03-31", None).await;
    assert_eq!(ranged["total_count"], 1);
    assert_eq!(ranged["total_amount"], 30.0);

    let (_, searched) = request(&app, "GET", "/webBuyV1/getBuyStatsBySearch/USP", None).await;
    assert_eq!(searched["pending_count"], 1);
}

#[tokio::test]
async fn test_type_and_wear_pages() {
    let (app, _temp) = seeded_app().await;

    let (_, types) = request(&app, "GET", "/webBuyPageV1/getWeaponTypes", None).await;
    assert_eq!(types["data"], json!(["手枪", "步枪"]));

    let (_, wears) = request(&app, "GET", "/webBuyPageV1/getFloatRanges", None).await;
    assert_eq!(wears["data"].as_array().unwrap().len(), 2);

    let (_, page) = request(
        &app,
        "POST",
        "/webBuyPageV1/searchByTypeAndWear",
        Some(json!({"weapon_type": "步枪", "page": "1", "page_size": 1})),
    )
    .await;
    assert_eq!(page["total"], 2);
    assert_eq!(page["data"].as_array().unwrap().len(), 1);
    assert_eq!(page["page_size"], 1);

    // Without a type or wear nothing is searched.
    let (_, empty) = request(
        &app,
        "POST",
        "/webBuyPageV1/searchByTypeAndWear",
        Some(json!({"weapon_type": "", "page": 1})),
    )
    .await;
    assert_eq!(empty["total"], 0);

    let (_, stats) = request(
        &app,
        "POST",
        "/webBuyPageV1/getStatsByTypeAndWear",
        Some(json!({"float_range": "久经沙场"})),
    )
    .await;
    assert_eq!(stats["data"]["totalCount"], 2);
    assert_eq!(stats["data"]["totalAmount"], 130.0);
}

#[tokio::test]
async fn test_lease_board_stats() {
    let (app, _repo, _temp) = setup_test_app().await;
    let lease = json!({
        "ID": "L1",
        "item_name": "AWP | 二西莫夫",
        "weapon_name": "AWP",
        "price": "2.5",
        "status": "租赁中",
        "lean_start_time": "2024-01-01 00:00:00",
        "totalLeaseDays": 4,
        "data_user": "7656"
    });
    request(&app, "POST", "/youpin898LentV1/insert_webside_lentdata", Some(lease)).await;

    let (_, count) = request(&app, "GET", "/webLentV1/countLentNumber", None).await;
    assert_eq!(count["count"], 1);

    let (_, stats) = request(&app, "GET", "/webLentV1/getLentStats", None).await;
    assert_eq!(stats["total_count"], 1);
    assert_eq!(stats["total_amount"], 10.0);
    assert_eq!(stats["total_lease_days"], 4);
    assert_eq!(stats["renting_count"], 1);
}

#[tokio::test]
async fn test_unpaged_time_range_and_total_stats() {
    let (app, _temp) = seeded_app().await;

    let (status, rows) = request(&app, "GET", "/webBuyV1/searchBuyByTimeRange/2024-02-01/2024-03-01", None).await;
    assert_eq!(status, StatusCode::OK);
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][0], "B3");

    let (_, rows) = request(&app, "GET", "/webSellV1/searchSellByTimeRange/2024-01-01/2024-12-31", None).await;
    assert_eq!(rows, json!([]));

    let (status, totals) = request(&app, "POST", "/webBuyV1/getBuyTotalStats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(totals, json!([3, 180.0]));

    let (status, _) = request(&app, "POST", "/webSellV1/getSellTotalStats", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

async fn seed_market(app: &axum::Router, id: &str, side: &str, game: &str, price: f64, date: &str) {
    let trade = json!({
        "ID": id,
        "trade_type": side,
        "item_name": format!("AK-47 | 红线 {}", id),
        "weapon_name": "AK-47",
        "weapon_type": "步枪",
        "exterior_wear": "久经沙场",
        "game_name": game,
        "price": price,
        "trade_date": date,
        "steamId": "7656"
    });
    let (status, _) = request(app, "POST", "/steamMarketV1/insertNewData", Some(trade)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_steam_market_board() {
    let (app, _repo, _temp) = setup_test_app().await;
    seed_market(&app, "s1", "+", "Counter-Strike 2", 10.0, "2024-05-01").await;
    seed_market(&app, "s2", "+", "Dota 2", 4.0, "2024-05-03").await;
    seed_market(&app, "s3", "-", "Counter-Strike 2", 25.5, "2024-05-04").await;

    let (_, names) = request(&app, "GET", "/webSteamMarketV1/getBuyGameNames", None).await;
    assert_eq!(names, json!(["Counter-Strike 2", "Dota 2"]));

    let (_, count) = request(&app, "GET", "/webSteamMarketV1/countSteamBuyNumber", None).await;
    assert_eq!(count["count"], 2);

    let (_, page) = request(&app, "GET", "/webSteamMarketV1/getSteamBuyData/0/10", None).await;
    let rows = page.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][0], "s2");
    assert_eq!(rows[0][7], "Steam");
    assert_eq!(rows[0][9], "已完成");
    assert_eq!(rows[0][10], "Dota 2");

    let (_, by_game) = request(
        &app,
        "GET",
        "/webSteamMarketV1/getSteamBuyDataByGameName/Dota%202/0/10",
        None,
    )
    .await;
    assert_eq!(by_game.as_array().unwrap().len(), 1);

    let (_, completed) = request(
        &app,
        "GET",
        "/webSteamMarketV1/getSteamBuyDataByStatus/%E5%B7%B2%E5%AE%8C%E6%88%90/0/10",
        None,
    )
    .await;
    assert_eq!(completed.as_array().unwrap().len(), 2);
    let (_, pending) = request(
        &app,
        "GET",
        "/webSteamMarketV1/getSteamBuyDataByStatus/%E5%BE%85%E6%94%B6%E8%B4%A7/0/10",
        None,
    )
    .await;
    assert_eq!(pending, json!([]));

    let (_, stats) = request(&app, "GET", "/webSteamMarketV1/getSteamBuyStats", None).await;
    assert_eq!(stats["total_count"], 2);
    assert_eq!(stats["total_amount"], 14.0);
    assert_eq!(stats["avg_price"], 7.0);
    assert_eq!(stats["completed_count"], 2);
    assert_eq!(stats["cancelled_count"], 0);

    let (_, stats) = request(
        &app,
        "GET",
        "/webSteamMarketV1/getSteamBuyStatsByGameName/Counter-Strike%202",
        None,
    )
    .await;
    assert_eq!(stats["total_count"], 1);

    let (_, ranged) = request(
        &app,
        "GET",
        "/webSteamMarketV1/searchSteamSellByTimeRange/2024-05-01/2024-05-31",
        None,
    )
    .await;
    assert_eq!(ranged.as_array().unwrap().len(), 1);

    let (_, summary) = request(&app, "GET", "/webSteamMarketV1/getSteamMarketStats", None).await;
    assert_eq!(summary["buy_count"], 2);
    assert_eq!(summary["buy_total"], 14.0);
    assert_eq!(summary["sell_total"], 25.5);
    assert_eq!(summary["net_profit"], 11.5);
    assert_eq!(summary["total_transactions"], 3);
}

#[tokio::test]
async fn test_lent_type_and_wear_page() {
    let (app, repo, _temp) = setup_test_app().await;
    for (id, ty, wear, unit_price, days, status) in [
        ("R1", "步枪", "久经沙场", 1.5, 10, "租赁中"),
        ("R2", "步枪", "崭新出厂", 2.0, 5, "已完成"),
        ("R3", "手枪", "久经沙场", 0.5, 2, "租赁中"),
    ] {
        repo.facade()
            .execute(
                "INSERT INTO \"lease\" (\"ID\", \"weapon_type\", \"float_range\", \"unit_price\", \"lease_day\", \"status\", \"create_time\") VALUES (?, ?, ?, ?, ?, ?, '2024-05-01 10:00:00')",
                &[id.into(), ty.into(), wear.into(), unit_price.into(), (days as i64).into(), status.into()],
            )
            .await
            .unwrap();
    }

    let (_, types) = request(&app, "GET", "/webLentPageV1/getWeaponTypes", None).await;
    assert_eq!(types["data"], json!(["手枪", "步枪"]));

    let (_, found) = request(
        &app,
        "POST",
        "/webLentPageV1/searchByTypeAndWear",
        Some(json!({"weapon_type": "步枪", "page": 1, "page_size": 10})),
    )
    .await;
    assert_eq!(found["total"], 2);
    assert_eq!(found["data"].as_array().unwrap().len(), 2);
    assert_eq!(found["data"][0].as_array().unwrap().len(), 15);

    let (_, stats) = request(
        &app,
        "POST",
        "/webLentPageV1/getStatsByTypeAndWear",
        Some(json!({"weapon_type": "步枪"})),
    )
    .await;
    assert_eq!(stats["success"], true);
    assert_eq!(stats["data"]["totalCount"], 2);
    assert_eq!(stats["data"]["totalAmount"], 25.0);
    assert_eq!(stats["data"]["avgPrice"], 1.75);
    assert_eq!(stats["data"]["totalLeaseDays"], 15);
    assert_eq!(stats["data"]["avgLeaseDays"], 7.5);
    assert_eq!(stats["data"]["rentingCount"], 1);
}
