//! Database initialization: pool, pragmas and schema sync.

use super::entities::REGISTRY;
use super::facade::{QueryError, QueryFacade};
use super::sync::SchemaSync;
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use tracing::info;

/// Open (or create) the SQLite file and bring every declared table up to date.
pub async fn init_db(db_path: &str, busy_timeout_ms: u64) -> Result<SqlitePool, QueryError> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).ok();
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .after_connect(move |conn, _meta| {
            Box::pin(async move { configure_pragmas_conn(conn, busy_timeout_ms).await })
        })
        .connect(&format!("sqlite:{}?mode=rwc", db_path))
        .await?;

    run_schema_sync(&pool).await?;

    info!("Database initialized successfully at {}", db_path);
    Ok(pool)
}

async fn run_schema_sync(pool: &SqlitePool) -> Result<(), QueryError> {
    info!("Synchronizing schema for {} tables...", REGISTRY.len());
    SchemaSync::new(QueryFacade::new(pool.clone()))
        .sync_all(REGISTRY)
        .await?;
    Ok(())
}

async fn configure_pragmas_conn(
    conn: &mut SqliteConnection,
    busy_timeout_ms: u64,
) -> Result<(), sqlx::Error> {
    use sqlx::Row;

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&mut *conn)
        .await?;

    // journal_mode returns the mode actually in effect
    let row = sqlx::query("PRAGMA journal_mode = WAL")
        .fetch_one(&mut *conn)
        .await?;
    let journal_mode: String = row.get(0);
    info!("SQLite journal_mode set to: {}", journal_mode);

    sqlx::query(&format!("PRAGMA busy_timeout = {}", busy_timeout_ms))
        .execute(&mut *conn)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&mut *conn)
        .await?;

    Ok(())
}
