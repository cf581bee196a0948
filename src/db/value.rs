//! Dynamically typed SQLite values and their JSON bridge.

use super::schema::ColumnType;
use serde_json::Value;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};

/// A single SQLite storage-class value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Convert JSON into a value for a column of the given type.
    ///
    /// Blank strings become NULL. Numeric strings are parsed for numeric
    /// columns; anything unparseable is kept as text and left to SQLite's
    /// column affinity.
    pub fn from_json(value: &Value, ty: ColumnType) -> Self {
        match value {
            Value::Null => SqlValue::Null,
            Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
            Value::Number(n) => match ty {
                ColumnType::Text | ColumnType::DateTime => SqlValue::Text(n.to_string()),
                ColumnType::Integer => match n.as_i64() {
                    Some(i) => SqlValue::Integer(i),
                    None => n.as_f64().map(SqlValue::Real).unwrap_or(SqlValue::Null),
                },
                ColumnType::Real => n.as_f64().map(SqlValue::Real).unwrap_or(SqlValue::Null),
            },
            Value::String(s) => Self::from_text(s, ty),
            Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
        }
    }

    /// Convert a string for a column of the given type.
    pub fn from_text(s: &str, ty: ColumnType) -> Self {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return SqlValue::Null;
        }
        match ty {
            ColumnType::Integer => trimmed
                .parse::<i64>()
                .map(SqlValue::Integer)
                .unwrap_or_else(|_| SqlValue::Text(s.to_string())),
            ColumnType::Real => trimmed
                .parse::<f64>()
                .map(SqlValue::Real)
                .unwrap_or_else(|_| SqlValue::Text(s.to_string())),
            ColumnType::Text | ColumnType::DateTime => SqlValue::Text(s.to_string()),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            SqlValue::Null => Value::Null,
            SqlValue::Integer(i) => Value::from(*i),
            SqlValue::Real(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            SqlValue::Text(s) => Value::String(s.clone()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(i) => Some(*i),
            SqlValue::Real(f) => Some(*f as i64),
            SqlValue::Text(s) => s.trim().parse().ok(),
            SqlValue::Null => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SqlValue::Integer(i) => Some(*i as f64),
            SqlValue::Real(f) => Some(*f),
            SqlValue::Text(s) => s.trim().parse().ok(),
            SqlValue::Null => None,
        }
    }

    /// Render as display text, the way the value would print in a JSON string.
    pub fn to_text(&self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            SqlValue::Integer(i) => Some(i.to_string()),
            SqlValue::Real(f) => Some(f.to_string()),
            SqlValue::Text(s) => Some(s.clone()),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        SqlValue::Text(s.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(s: String) -> Self {
        SqlValue::Text(s)
    }
}

impl From<i64> for SqlValue {
    fn from(i: i64) -> Self {
        SqlValue::Integer(i)
    }
}

impl From<f64> for SqlValue {
    fn from(f: f64) -> Self {
        SqlValue::Real(f)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// Bind a value onto a query.
pub fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &SqlValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Integer(i) => query.bind(*i),
        SqlValue::Real(f) => query.bind(*f),
        SqlValue::Text(s) => query.bind(s.clone()),
    }
}

pub fn bind_all<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &[SqlValue],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for value in params {
        query = bind_value(query, value);
    }
    query
}

/// A fetched row that keeps its column order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DbRow {
    columns: Vec<(String, SqlValue)>,
}

impl DbRow {
    pub fn from_pairs(columns: Vec<(String, SqlValue)>) -> Self {
        Self { columns }
    }

    /// Decode an sqlx row using each value's runtime storage class.
    pub fn decode(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let mut columns = Vec::with_capacity(row.columns().len());
        for (i, column) in row.columns().iter().enumerate() {
            let raw = row.try_get_raw(i)?;
            let value = if raw.is_null() {
                SqlValue::Null
            } else {
                let type_name = raw.type_info().name().to_string();
                match type_name.as_str() {
                    "INTEGER" | "BOOLEAN" => SqlValue::Integer(row.try_get::<i64, _>(i)?),
                    "REAL" => SqlValue::Real(row.try_get::<f64, _>(i)?),
                    "BLOB" => {
                        let bytes: Vec<u8> = row.try_get(i)?;
                        SqlValue::Text(String::from_utf8_lossy(&bytes).into_owned())
                    }
                    _ => SqlValue::Text(row.try_get::<String, _>(i)?),
                }
            };
            columns.push((column.name().to_string(), value));
        }
        Ok(Self { columns })
    }

    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(col, _)| col == name)
            .map(|(_, value)| value)
    }

    pub fn at(&self, index: usize) -> Option<&SqlValue> {
        self.columns.get(index).map(|(_, value)| value)
    }

    pub fn text(&self, name: &str) -> Option<String> {
        self.get(name).and_then(SqlValue::to_text)
    }

    pub fn i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(SqlValue::as_i64)
    }

    pub fn f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(SqlValue::as_f64)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Row as a JSON array in column order.
    pub fn to_array(&self) -> Value {
        Value::Array(self.columns.iter().map(|(_, v)| v.to_json()).collect())
    }

    pub fn to_object(&self) -> Value {
        let map = self
            .columns
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect::<serde_json::Map<_, _>>();
        Value::Object(map)
    }
}
