//! Dashboard boards over the unified buy, sell and lease tables and the Steam
//! market tables.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{decode, json_body, rows_json, AppState, JsonBody};
use crate::db::repo::{
    StatsFilter, View, BUY_VIEW, LEASE_VIEW, LENT_VIEW, SELL_VIEW, STEAM_BUY_VIEW, STEAM_SELL_VIEW,
};
use crate::domain::money::to_f64;
use crate::domain::primitives::lenient;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Board {
    Buy,
    Sell,
    Lent,
    SteamBuy,
    SteamSell,
}

impl Board {
    fn view(self) -> &'static View {
        match self {
            Board::Buy => &BUY_VIEW,
            Board::Sell => &SELL_VIEW,
            Board::Lent => &LENT_VIEW,
            Board::SteamBuy => &STEAM_BUY_VIEW,
            Board::SteamSell => &STEAM_SELL_VIEW,
        }
    }

    /// The type/wear page reads the `lease` ledger rather than youpin leases.
    fn type_wear_view(self) -> &'static View {
        match self {
            Board::Lent => &LEASE_VIEW,
            other => other.view(),
        }
    }

    fn is_steam(self) -> bool {
        matches!(self, Board::SteamBuy | Board::SteamSell)
    }

    /// Route name fragment, e.g. `countBuyNumber`.
    fn noun(self) -> &'static str {
        match self {
            Board::Buy => "Buy",
            Board::Sell => "Sell",
            Board::Lent => "Lent",
            Board::SteamBuy => "SteamBuy",
            Board::SteamSell => "SteamSell",
        }
    }
}

pub fn board_router(board: Board) -> Router<AppState> {
    let n = board.noun();
    let router = Router::new()
        .route(
            &format!("/count{}Number", n),
            get(move |state: State<AppState>| count(state, board)),
        )
        .route(
            &format!("/get{}Data/:offset/:limit", n),
            get(move |p: Path<(i64, i64)>, state: State<AppState>| page(p, state, board)),
        )
        .route(
            &format!("/select{}WeaponName/:name", n),
            get(move |p: Path<String>, state: State<AppState>| search_name(p, state, board)),
        )
        .route(
            &format!("/get{}DataByStatus/:status/:offset/:limit", n),
            get(move |p: Path<(String, i64, i64)>, state: State<AppState>| {
                page_by_status(p, state, board)
            }),
        )
        .route(
            &format!("/get{}DataByTimeRange/:start/:end/:offset/:limit", n),
            get(move |p: Path<(String, String, i64, i64)>, state: State<AppState>| {
                page_by_time_range(p, state, board)
            }),
        )
        .route(
            &format!("/get{}Stats", n),
            get(move |state: State<AppState>| stats(state, board, StatsFilter::All)),
        )
        .route(
            &format!("/get{}StatsByTimeRange/:start/:end", n),
            get(move |Path((start, end)): Path<(String, String)>, state: State<AppState>| {
                stats(state, board, StatsFilter::TimeRange(start, end))
            }),
        )
        .route(
            &format!("/get{}StatsBySearch/:name", n),
            get(move |Path(name): Path<String>, state: State<AppState>| {
                stats(state, board, StatsFilter::Search(name))
            }),
        )
        .route(
            &format!("/get{}StatsByStatus/:status", n),
            get(move |Path(status): Path<String>, state: State<AppState>| {
                stats(state, board, StatsFilter::Status(status))
            }),
        )
        .route(
            &format!("/search{}ByTimeRange/:start/:end", n),
            get(move |p: Path<(String, String)>, state: State<AppState>| {
                search_by_time_range(p, state, board)
            }),
        );

    let router = if board == Board::Buy {
        router.route(
            "/getBuyTotalStats",
            post(move |state: State<AppState>| total_stats(state, board)),
        )
    } else {
        router
    };

    if !board.is_steam() {
        return router;
    }
    router
        .route(
            &format!("/get{}DataByGameName/:game_name/:offset/:limit", n),
            get(move |p: Path<(String, i64, i64)>, state: State<AppState>| {
                page_by_game_name(p, state, board)
            }),
        )
        .route(
            &format!("/get{}StatsByGameName/:game_name", n),
            get(move |Path(game): Path<String>, state: State<AppState>| {
                stats(state, board, StatsFilter::GameName(game))
            }),
        )
}

/// Steam purchases and sales side by side, plus their game-name lists.
pub fn steam_market_router() -> Router<AppState> {
    Router::new()
        .route(
            "/getBuyGameNames",
            get(|state: State<AppState>| game_names(state, Board::SteamBuy)),
        )
        .route(
            "/getSellGameNames",
            get(|state: State<AppState>| game_names(state, Board::SteamSell)),
        )
        .route("/getSteamMarketStats", get(market_summary))
        .merge(board_router(Board::SteamBuy))
        .merge(board_router(Board::SteamSell))
}

pub fn type_wear_router(board: Board) -> Router<AppState> {
    Router::new()
        .route(
            "/getWeaponTypes",
            get(move |state: State<AppState>| distinct(state, board, "weapon_type")),
        )
        .route(
            "/getFloatRanges",
            get(move |state: State<AppState>| distinct(state, board, "float_range")),
        )
        .route(
            "/searchByTypeAndWear",
            post(move |state: State<AppState>, body: JsonBody| {
                search_type_and_wear(state, body, board)
            }),
        )
        .route(
            "/getStatsByTypeAndWear",
            post(move |state: State<AppState>, body: JsonBody| {
                type_wear_stats(state, body, board)
            }),
        )
}

// =========================================================================
// Boards
// =========================================================================

async fn count(State(state): State<AppState>, board: Board) -> Result<Json<Value>, AppError> {
    let count = state.repo.count(board.view()).await?;
    Ok(Json(json!({"count": count})))
}

async fn page(
    Path((offset, limit)): Path<(i64, i64)>,
    State(state): State<AppState>,
    board: Board,
) -> Result<Json<Value>, AppError> {
    Ok(rows_json(&state.repo.page(board.view(), offset, limit).await?))
}

async fn search_name(
    Path(name): Path<String>,
    State(state): State<AppState>,
    board: Board,
) -> Result<Json<Value>, AppError> {
    Ok(rows_json(&state.repo.search_name(board.view(), &name).await?))
}

async fn page_by_status(
    Path((status, offset, limit)): Path<(String, i64, i64)>,
    State(state): State<AppState>,
    board: Board,
) -> Result<Json<Value>, AppError> {
    let rows = state
        .repo
        .page_by_status(board.view(), &status, offset, limit)
        .await?;
    Ok(rows_json(&rows))
}

async fn page_by_time_range(
    Path((start, end, offset, limit)): Path<(String, String, i64, i64)>,
    State(state): State<AppState>,
    board: Board,
) -> Result<Json<Value>, AppError> {
    let rows = state
        .repo
        .page_by_time_range(board.view(), &start, &end, offset, limit)
        .await?;
    Ok(rows_json(&rows))
}

async fn stats(
    State(state): State<AppState>,
    board: Board,
    filter: StatsFilter,
) -> Result<Json<Value>, AppError> {
    let stats = match board {
        Board::Lent => json!(state.repo.lease_stats(&filter).await?),
        _ => json!(state.repo.trade_stats(board.view(), &filter).await?),
    };
    Ok(Json(stats))
}

async fn search_by_time_range(
    Path((start, end)): Path<(String, String)>,
    State(state): State<AppState>,
    board: Board,
) -> Result<Json<Value>, AppError> {
    let rows = state
        .repo
        .search_by_time_range(board.view(), &start, &end)
        .await?;
    Ok(rows_json(&rows))
}

/// `[count, total]`, cancelled orders included.
async fn total_stats(State(state): State<AppState>, board: Board) -> Result<Json<Value>, AppError> {
    let (count, total) = state.repo.total_stats(board.view()).await?;
    Ok(Json(json!([count, to_f64(total)])))
}

async fn page_by_game_name(
    Path((game_name, offset, limit)): Path<(String, i64, i64)>,
    State(state): State<AppState>,
    board: Board,
) -> Result<Json<Value>, AppError> {
    let rows = state
        .repo
        .page_by_game_name(board.view(), &game_name, offset, limit)
        .await?;
    Ok(rows_json(&rows))
}

async fn game_names(State(state): State<AppState>, board: Board) -> Result<Json<Value>, AppError> {
    Ok(Json(json!(state.repo.game_names(board.view()).await?)))
}

async fn market_summary(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    Ok(Json(json!(state.repo.market_summary().await?)))
}

// =========================================================================
// Type / wear pages
// =========================================================================

#[derive(Debug, Deserialize)]
struct TypeWearBody {
    #[serde(deserialize_with = "lenient::opt_string", default)]
    weapon_type: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    float_range: Option<String>,
    #[serde(deserialize_with = "lenient::opt_i64", default)]
    page: Option<i64>,
    #[serde(deserialize_with = "lenient::opt_i64", default)]
    page_size: Option<i64>,
}

async fn distinct(
    State(state): State<AppState>,
    board: Board,
    column: &'static str,
) -> Result<Json<Value>, AppError> {
    let values = state.repo.distinct_values(board.type_wear_view(), column).await?;
    Ok(Json(json!({"success": true, "data": values})))
}

async fn search_type_and_wear(
    State(state): State<AppState>,
    body: JsonBody,
    board: Board,
) -> Result<Json<Value>, AppError> {
    let body: TypeWearBody = decode(json_body(body)?)?;
    let page = body.page.unwrap_or(1).max(1);
    let page_size = body.page_size.unwrap_or(20).max(1);
    let result = state
        .repo
        .search_type_and_wear(
            board.type_wear_view(),
            body.weapon_type.as_deref(),
            body.float_range.as_deref(),
            page,
            page_size,
        )
        .await?;
    let data: Vec<Value> = result.rows.iter().map(|r| r.to_array()).collect();
    Ok(Json(json!({
        "success": true,
        "data": data,
        "total": result.total,
        "page": result.page,
        "page_size": result.page_size,
    })))
}

async fn type_wear_stats(
    State(state): State<AppState>,
    body: JsonBody,
    board: Board,
) -> Result<Json<Value>, AppError> {
    let body: TypeWearBody = decode(json_body(body)?)?;
    let (weapon_type, float_range) = (body.weapon_type.as_deref(), body.float_range.as_deref());
    let stats = match board {
        Board::Lent => json!(state.repo.lease_type_wear_stats(weapon_type, float_range).await?),
        _ => json!(
            state
                .repo
                .type_wear_stats(board.type_wear_view(), weapon_type, float_range)
                .await?
        ),
    };
    Ok(Json(json!({"success": true, "data": stats})))
}
