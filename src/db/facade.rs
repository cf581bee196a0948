//! Query facade over the shared SQLite pool.
//!
//! Every statement is parameterized. Failures are classified from the typed
//! database error: unique-key conflicts become [`QueryError::Duplicate`],
//! busy/locked databases and pool exhaustion become [`QueryError::TimedOut`].

use super::record::{Record, Statement};
use super::schema::{quote_ident, TableSchema};
use super::value::{bind_all, DbRow, SqlValue};
use sqlx::error::ErrorKind;
use sqlx::sqlite::{Sqlite, SqliteConnection, SqlitePool};
use sqlx::Transaction;
use thiserror::Error;
use tracing::{debug, error};

// SQLite extended result codes.
const SQLITE_CONSTRAINT_PRIMARYKEY: &str = "1555";
const SQLITE_CONSTRAINT_UNIQUE: &str = "2067";
const SQLITE_BUSY_CODES: [&str; 4] = ["5", "261", "517", "773"];
const SQLITE_LOCKED_CODES: [&str; 3] = ["6", "262", "518"];

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("duplicate key: {0}")]
    Duplicate(String),
    #[error("database timed out: {0}")]
    TimedOut(String),
    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl From<sqlx::Error> for QueryError {
    fn from(err: sqlx::Error) -> Self {
        classify(err)
    }
}

/// Classify a driver error.
pub fn classify(err: sqlx::Error) -> QueryError {
    if let sqlx::Error::Database(db) = &err {
        let code = db.code();
        let code = code.as_deref().unwrap_or_default();
        if db.kind() == ErrorKind::UniqueViolation
            || code == SQLITE_CONSTRAINT_PRIMARYKEY
            || code == SQLITE_CONSTRAINT_UNIQUE
        {
            return QueryError::Duplicate(db.message().to_string());
        }
        if SQLITE_BUSY_CODES.contains(&code) || SQLITE_LOCKED_CODES.contains(&code) {
            return QueryError::TimedOut(db.message().to_string());
        }
    }
    match err {
        sqlx::Error::PoolTimedOut => QueryError::TimedOut("connection pool timed out".to_string()),
        other => QueryError::Sqlx(other),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Duplicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Inserted,
    Updated,
    Unchanged,
}

/// WHERE / ORDER BY / LIMIT / OFFSET for ORM lookups.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    conditions: Vec<String>,
    params: Vec<SqlValue>,
    order_by: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a raw condition with its parameters. Conditions are AND-ed.
    pub fn condition(mut self, clause: impl Into<String>, params: Vec<SqlValue>) -> Self {
        self.conditions.push(clause.into());
        self.params.extend(params);
        self
    }

    pub fn eq(self, column: &str, value: impl Into<SqlValue>) -> Self {
        let clause = format!("{} = ?", quote_ident(column));
        self.condition(clause, vec![value.into()])
    }

    pub fn order_by(mut self, order: impl Into<String>) -> Self {
        self.order_by = Some(order.into());
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }

    /// ` WHERE ...` for the accumulated conditions, or empty.
    pub fn where_sql(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }

    fn tail_sql(&self) -> String {
        let mut sql = String::new();
        if let Some(order) = &self.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(order);
        }
        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset)),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {}", limit)),
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {}", offset)),
            (None, None) => {}
        }
        sql
    }
}

async fn fetch_rows(
    conn: &mut SqliteConnection,
    sql: &str,
    params: &[SqlValue],
) -> Result<Vec<DbRow>, QueryError> {
    let rows = bind_all(sqlx::query(sql), params)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| log_failure(sql, e))?;
    rows.iter()
        .map(|row| DbRow::decode(row).map_err(|e| log_failure(sql, e)))
        .collect()
}

async fn run(
    conn: &mut SqliteConnection,
    sql: &str,
    params: &[SqlValue],
) -> Result<u64, QueryError> {
    bind_all(sqlx::query(sql), params)
        .execute(&mut *conn)
        .await
        .map(|r| r.rows_affected())
        .map_err(|e| log_failure(sql, e))
}

fn log_failure(sql: &str, err: sqlx::Error) -> QueryError {
    let classified = classify(err);
    match &classified {
        QueryError::Duplicate(msg) => debug!("Duplicate key on `{}`: {}", sql, msg),
        QueryError::TimedOut(msg) => error!("Database timed out on `{}`: {}", sql, msg),
        QueryError::Sqlx(e) => error!("Query failed `{}`: {}", sql, e),
    }
    classified
}

fn insert_outcome(result: Result<u64, QueryError>) -> Result<InsertOutcome, QueryError> {
    match result {
        Ok(_) => Ok(InsertOutcome::Inserted),
        Err(QueryError::Duplicate(_)) => Ok(InsertOutcome::Duplicate),
        Err(e) => Err(e),
    }
}

async fn find_rows_in(
    conn: &mut SqliteConnection,
    schema: &'static TableSchema,
    filter: &Filter,
) -> Result<Vec<DbRow>, QueryError> {
    let sql = format!(
        "SELECT {} FROM {}{}{}",
        schema.select_list(),
        schema.quoted_name(),
        filter.where_sql(),
        filter.tail_sql()
    );
    fetch_rows(conn, &sql, &filter.params).await
}

async fn exists_in(conn: &mut SqliteConnection, record: &Record) -> Result<bool, QueryError> {
    if !record.has_complete_key() {
        return Ok(false);
    }
    let filter = record
        .key_values()
        .into_iter()
        .fold(Filter::new(), |f, (col, v)| f.eq(col, v));
    let sql = format!(
        "SELECT 1 FROM {}{} LIMIT 1",
        record.schema().quoted_name(),
        filter.where_sql()
    );
    Ok(!fetch_rows(conn, &sql, &filter.params).await?.is_empty())
}

/// Insert when the key is missing or unknown, otherwise write the dirty columns.
pub async fn save_in(
    conn: &mut SqliteConnection,
    record: &mut Record,
) -> Result<SaveOutcome, QueryError> {
    if !exists_in(conn, record).await? {
        let Statement { sql, params } = record.insert_statement();
        run(conn, &sql, &params).await?;
        record.mark_persisted();
        return Ok(SaveOutcome::Inserted);
    }

    let Some(Statement { sql, params }) = record.update_statement() else {
        return Ok(SaveOutcome::Unchanged);
    };
    if run(conn, &sql, &params).await? == 0 {
        return Ok(SaveOutcome::Unchanged);
    }
    record.mark_persisted();
    Ok(SaveOutcome::Updated)
}

/// Plain INSERT of a record, reporting a key conflict as an outcome.
pub async fn insert_record_in(
    conn: &mut SqliteConnection,
    record: &mut Record,
) -> Result<InsertOutcome, QueryError> {
    let Statement { sql, params } = record.insert_statement();
    let outcome = insert_outcome(run(conn, &sql, &params).await)?;
    if outcome == InsertOutcome::Inserted {
        record.mark_persisted();
    }
    Ok(outcome)
}

pub async fn execute_in(
    conn: &mut SqliteConnection,
    sql: &str,
    params: &[SqlValue],
) -> Result<u64, QueryError> {
    run(conn, sql, params).await
}

pub async fn select_in(
    conn: &mut SqliteConnection,
    sql: &str,
    params: &[SqlValue],
) -> Result<Vec<DbRow>, QueryError> {
    fetch_rows(conn, sql, params).await
}

/// Connection wrapper used by every repository method.
#[derive(Debug, Clone)]
pub struct QueryFacade {
    pool: SqlitePool,
}

impl QueryFacade {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, QueryError> {
        self.pool.begin().await.map_err(classify)
    }

    async fn conn(&self) -> Result<sqlx::pool::PoolConnection<Sqlite>, QueryError> {
        self.pool.acquire().await.map_err(|e| {
            let classified = classify(e);
            error!("Failed to acquire connection: {}", classified);
            classified
        })
    }

    pub async fn select(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<DbRow>, QueryError> {
        let mut conn = self.conn().await?;
        fetch_rows(&mut conn, sql, params).await
    }

    pub async fn select_one(
        &self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<Option<DbRow>, QueryError> {
        Ok(self.select(sql, params).await?.into_iter().next())
    }

    pub async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64, QueryError> {
        let mut conn = self.conn().await?;
        run(&mut conn, sql, params).await
    }

    pub async fn insert(&self, sql: &str, params: &[SqlValue]) -> Result<InsertOutcome, QueryError> {
        insert_outcome(self.execute(sql, params).await)
    }

    pub async fn update(&self, sql: &str, params: &[SqlValue]) -> Result<u64, QueryError> {
        self.execute(sql, params).await
    }

    pub async fn delete(&self, sql: &str, params: &[SqlValue]) -> Result<u64, QueryError> {
        self.execute(sql, params).await
    }

    /// First column of the first row as an integer.
    pub async fn scalar_i64(&self, sql: &str, params: &[SqlValue]) -> Result<Option<i64>, QueryError> {
        Ok(self
            .select_one(sql, params)
            .await?
            .and_then(|row| row.at(0).and_then(SqlValue::as_i64)))
    }

    pub async fn scalar_f64(&self, sql: &str, params: &[SqlValue]) -> Result<Option<f64>, QueryError> {
        Ok(self
            .select_one(sql, params)
            .await?
            .and_then(|row| row.at(0).and_then(SqlValue::as_f64)))
    }

    pub async fn find_by_id(
        &self,
        schema: &'static TableSchema,
        keys: &[(&str, SqlValue)],
    ) -> Result<Option<Record>, QueryError> {
        let filter = keys
            .iter()
            .fold(Filter::new(), |f, (col, v)| f.eq(col, v.clone()))
            .limit(1);
        Ok(self.find_all(schema, &filter).await?.into_iter().next())
    }

    pub async fn find_all(
        &self,
        schema: &'static TableSchema,
        filter: &Filter,
    ) -> Result<Vec<Record>, QueryError> {
        let rows = self.find_rows(schema, filter).await?;
        Ok(rows.iter().map(|r| Record::from_row(schema, r)).collect())
    }

    /// Like [`QueryFacade::find_all`], keeping the raw rows.
    pub async fn find_rows(
        &self,
        schema: &'static TableSchema,
        filter: &Filter,
    ) -> Result<Vec<DbRow>, QueryError> {
        let mut conn = self.conn().await?;
        find_rows_in(&mut conn, schema, filter).await
    }

    pub async fn count(&self, schema: &'static TableSchema, filter: &Filter) -> Result<i64, QueryError> {
        let sql = format!(
            "SELECT COUNT(*) FROM {}{}",
            schema.quoted_name(),
            filter.where_sql()
        );
        Ok(self.scalar_i64(&sql, &filter.params).await?.unwrap_or(0))
    }

    pub async fn exists(&self, record: &Record) -> Result<bool, QueryError> {
        let mut conn = self.conn().await?;
        exists_in(&mut conn, record).await
    }

    pub async fn save(&self, record: &mut Record) -> Result<SaveOutcome, QueryError> {
        let mut conn = self.conn().await?;
        save_in(&mut conn, record).await
    }

    pub async fn insert_record(&self, record: &mut Record) -> Result<InsertOutcome, QueryError> {
        let mut conn = self.conn().await?;
        insert_record_in(&mut conn, record).await
    }

    /// Delete by key. Returns false when no row matched or the table has no key.
    pub async fn delete_record(&self, record: &Record) -> Result<bool, QueryError> {
        match record.delete_statement() {
            Some(Statement { sql, params }) => Ok(self.execute(&sql, &params).await? > 0),
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::entities::{BUY, YYYP_LENT};
    use crate::db::init_db;
    use tempfile::TempDir;

    async fn facade() -> (QueryFacade, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path, 30000).await.expect("init_db failed");
        (QueryFacade::new(pool), temp_dir)
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_classified() {
        let (db, _tmp) = facade().await;
        let sql = "INSERT INTO yyyp_lent (ID, status) VALUES (?, ?)";
        let params = vec![SqlValue::from("L1"), SqlValue::from("租赁中")];
        assert_eq!(db.insert(sql, &params).await.unwrap(), InsertOutcome::Inserted);
        assert_eq!(db.insert(sql, &params).await.unwrap(), InsertOutcome::Duplicate);

        match db.execute(sql, &params).await {
            Err(QueryError::Duplicate(_)) => {}
            other => panic!("expected Duplicate, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_other_errors_are_not_duplicates() {
        let (db, _tmp) = facade().await;
        match db.execute("INSERT INTO no_such_table VALUES (1)", &[]).await {
            Err(QueryError::Sqlx(_)) => {}
            other => panic!("expected Sqlx error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_save_inserts_then_updates_dirty_fields() {
        let (db, _tmp) = facade().await;
        let mut record = Record::new(&YYYP_LENT)
            .with("ID", "L1")
            .with("status", "租赁中")
            .with("price", 2.5);
        assert_eq!(db.save(&mut record).await.unwrap(), SaveOutcome::Inserted);
        assert_eq!(db.save(&mut record).await.unwrap(), SaveOutcome::Unchanged);

        record.set("status", "完成");
        assert_eq!(db.save(&mut record).await.unwrap(), SaveOutcome::Updated);

        let loaded = db
            .find_by_id(&YYYP_LENT, &[("ID", SqlValue::from("L1"))])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.get("status"), Some(&SqlValue::from("完成")));
        assert_eq!(loaded.get("price"), Some(&SqlValue::Real(2.5)));
    }

    #[tokio::test]
    async fn test_fresh_record_over_existing_row_updates() {
        let (db, _tmp) = facade().await;
        let mut first = Record::new(&BUY)
            .with("ID", "B1")
            .with("from", "buff")
            .with("status", "待收货")
            .with("price", 10.0);
        db.save(&mut first).await.unwrap();

        let mut second = Record::new(&BUY)
            .with("ID", "B1")
            .with("from", "buff")
            .with("status", "已完成");
        assert_eq!(db.save(&mut second).await.unwrap(), SaveOutcome::Updated);

        let loaded = db
            .find_by_id(
                &BUY,
                &[("ID", SqlValue::from("B1")), ("from", SqlValue::from("buff"))],
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.get("status"), Some(&SqlValue::from("已完成")));
        assert_eq!(loaded.get("price"), Some(&SqlValue::Real(10.0)));
    }

    #[tokio::test]
    async fn test_find_all_count_and_delete() {
        let (db, _tmp) = facade().await;
        for (id, user) in [("a", "u1"), ("b", "u1"), ("c", "u2")] {
            let mut r = Record::new(&YYYP_LENT).with("ID", id).with("data_user", user);
            db.save(&mut r).await.unwrap();
        }
        let filter = Filter::new().eq("data_user", "u1").order_by("\"ID\" DESC");
        let found = db.find_all(&YYYP_LENT, &filter).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].get("ID"), Some(&SqlValue::from("b")));
        assert_eq!(db.count(&YYYP_LENT, &filter).await.unwrap(), 2);

        assert!(db.delete_record(&found[0]).await.unwrap());
        assert!(!db.delete_record(&found[0]).await.unwrap());
        assert!(!db.exists(&found[0]).await.unwrap());
    }
}
