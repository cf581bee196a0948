//! Weapon catalogs: YouPin class ids, BUFF goods ids and Steam hash names.

use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{decode, json_body, AppState, JsonBody};
use crate::db::repo::{BuffIdEntry, HashNameEntry, WeaponSearch};
use crate::db::InsertOutcome;
use crate::error::AppError;

pub fn yyyp_router() -> Router<AppState> {
    Router::new()
        .route("/getWeaponList", get(list_yyyp_weapons))
        .route("/getWeaponById/:id", get(get_yyyp_weapon))
        .route("/getWeaponByType/:weapon_type", get(yyyp_weapons_by_type))
        .route("/searchWeapon", post(search_yyyp_weapons))
        .route("/batchInsertOrUpdate", post(upsert_yyyp_weapons))
        .route("/insertWeapon", post(insert_yyyp_weapon))
        .route("/deleteWeapon/:id", delete(delete_yyyp_weapon))
        .route("/getWeaponCount", get(count_yyyp_weapons))
}

pub fn buff_router() -> Router<AppState> {
    Router::new()
        .route("/getWeaponByBuffId/:id", get(weapon_by_buff_id))
        .route("/searchWeapon", post(search_weapons))
        .route("/batchInsertOrUpdate", post(upsert_buff_ids))
}

pub fn hash_name_router() -> Router<AppState> {
    Router::new().route("/batchInsertSteamHashName", post(insert_hash_names))
}

pub fn web_router() -> Router<AppState> {
    Router::new().route("/searchWeapon", get(search_listing_names))
}

fn listing(data: Vec<Value>) -> Json<Value> {
    let count = data.len();
    Json(json!({"success": true, "data": data, "count": count}))
}

fn weapon_not_found() -> AppError {
    AppError::NotFound("武器不存在".to_string())
}

/// Search criteria from an optional body; no body searches everything.
fn search_from(body: JsonBody) -> Result<WeaponSearch, AppError> {
    match json_body(body) {
        Ok(value) => decode(value),
        Err(_) => Ok(WeaponSearch::default()),
    }
}

// =========================================================================
// YouPin
// =========================================================================

pub async fn list_yyyp_weapons(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let weapons = state.repo.search_yyyp_weapons(&WeaponSearch::default()).await?;
    Ok(listing(weapons))
}

pub async fn get_yyyp_weapon(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    let weapon = state.repo.yyyp_weapon(id).await?.ok_or_else(weapon_not_found)?;
    Ok(Json(json!({"success": true, "data": weapon})))
}

pub async fn yyyp_weapons_by_type(
    Path(weapon_type): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    Ok(listing(state.repo.yyyp_weapons_by_type(&weapon_type).await?))
}

pub async fn search_yyyp_weapons(
    State(state): State<AppState>,
    body: JsonBody,
) -> Result<Json<Value>, AppError> {
    let search = search_from(body)?;
    Ok(listing(state.repo.search_yyyp_weapons(&search).await?))
}

pub async fn upsert_yyyp_weapons(
    State(state): State<AppState>,
    body: JsonBody,
) -> Result<Json<Value>, AppError> {
    let Ok(Json(Value::Array(weapons))) = body else {
        return Err(AppError::BadRequest("无效的JSON数据，需要数组格式".to_string()));
    };
    let report = state.repo.upsert_yyyp_weapons(&weapons).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("成功处理 {}/{} 条数据", report.success_count(), weapons.len()),
        "success_count": report.success_count(),
        "total_count": weapons.len(),
    })))
}

pub async fn insert_yyyp_weapon(
    State(state): State<AppState>,
    body: JsonBody,
) -> Result<Json<Value>, AppError> {
    let weapon = json_body(body)?;
    let (outcome, stored) = state.repo.insert_yyyp_weapon(&weapon).await?;
    if outcome == InsertOutcome::Duplicate {
        return Err(AppError::BadRequest("武器ID已存在，请使用更新接口".to_string()));
    }
    Ok(Json(json!({"success": true, "message": "武器数据插入成功", "data": stored})))
}

pub async fn delete_yyyp_weapon(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    if !state.repo.delete_yyyp_weapon(id).await? {
        return Err(weapon_not_found());
    }
    Ok(Json(json!({"success": true, "message": "武器数据删除成功"})))
}

pub async fn count_yyyp_weapons(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let count = state.repo.count_yyyp_weapons().await?;
    Ok(Json(json!({"success": true, "count": count})))
}

// =========================================================================
// BUFF
// =========================================================================

pub async fn weapon_by_buff_id(
    Path(buff_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    let weapon = state
        .repo
        .weapon_by_buff_id(buff_id)
        .await?
        .ok_or_else(weapon_not_found)?;
    Ok(Json(json!({"success": true, "data": weapon})))
}

pub async fn search_weapons(
    State(state): State<AppState>,
    body: JsonBody,
) -> Result<Json<Value>, AppError> {
    let search = search_from(body)?;
    Ok(listing(state.repo.search_weapons(&search).await?))
}

pub async fn upsert_buff_ids(
    State(state): State<AppState>,
    body: JsonBody,
) -> Result<Json<Value>, AppError> {
    let Ok(Json(items @ Value::Array(_))) = body else {
        return Err(AppError::BadRequest("无效的JSON数据，需要数组格式".to_string()));
    };
    let entries: Vec<BuffIdEntry> = decode(items)?;
    let report = state.repo.upsert_buff_ids(&entries).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!(
            "成功更新 {}/{} 条BUFF数据的buff_id",
            report.success_count(),
            entries.len()
        ),
        "success_count": report.success_count(),
        "total_count": entries.len(),
        "data": report,
    })))
}

// =========================================================================
// Steam hash names
// =========================================================================

pub async fn insert_hash_names(
    State(state): State<AppState>,
    body: JsonBody,
) -> Result<Json<Value>, AppError> {
    let body = json_body(body)?;
    let weapons = match body.get("weapons") {
        None => {
            return Err(AppError::BadRequest(
                "请求数据格式错误，需要weapons字段".to_string(),
            ))
        }
        Some(Value::Array(items)) if items.is_empty() => {
            return Err(AppError::BadRequest("weapons数组不能为空".to_string()))
        }
        Some(items @ Value::Array(_)) => items.clone(),
        Some(_) => return Err(AppError::BadRequest("weapons字段必须是数组".to_string())),
    };
    let entries: Vec<HashNameEntry> = decode(weapons)?;
    let report = state.repo.insert_steam_hash_names(&entries).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("成功处理 {} 条数据", report.inserted),
        "success_count": report.inserted,
        "total_count": entries.len(),
    })))
}

#[derive(Debug, Deserialize)]
pub struct KeywordQuery {
    #[serde(default)]
    pub keyword: String,
}

pub async fn search_listing_names(
    Query(params): Query<KeywordQuery>,
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    let names = state.repo.search_listing_names(&params.keyword).await?;
    Ok(Json(json!({"success": true, "data": names})))
}
