//! Mapping between declared fields and persisted rows.
//!
//! A [`Record`] holds the current value of each declared column plus an
//! optional snapshot of what is in the database. The snapshot drives
//! minimal `UPDATE` statements: only columns that differ are written.

use super::schema::{quote_ident, TableSchema};
use super::value::{DbRow, SqlValue};
use serde_json::Value;

/// A parameterized SQL statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    schema: &'static TableSchema,
    values: Vec<SqlValue>,
    original: Option<Vec<SqlValue>>,
}

impl Record {
    pub fn new(schema: &'static TableSchema) -> Self {
        Self {
            schema,
            values: vec![SqlValue::Null; schema.fields.len()],
            original: None,
        }
    }

    /// Build from a JSON object. Keys that are not declared columns are ignored.
    pub fn from_json(schema: &'static TableSchema, json: &Value) -> Self {
        let mut record = Self::new(schema);
        if let Some(obj) = json.as_object() {
            for (i, field) in schema.fields.iter().enumerate() {
                if let Some(v) = obj.get(field.name) {
                    record.values[i] = SqlValue::from_json(v, field.ty);
                }
            }
        }
        record
    }

    /// Build from a fetched row; the row becomes the snapshot.
    pub fn from_row(schema: &'static TableSchema, row: &DbRow) -> Self {
        let values: Vec<SqlValue> = schema
            .fields
            .iter()
            .map(|f| row.get(f.name).cloned().unwrap_or(SqlValue::Null))
            .collect();
        Self {
            schema,
            original: Some(values.clone()),
            values,
        }
    }

    pub fn schema(&self) -> &'static TableSchema {
        self.schema
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.schema.fields.iter().position(|f| f.name == name)
    }

    /// Set a declared column. Returns false for unknown names.
    pub fn set(&mut self, name: &str, value: impl Into<SqlValue>) -> bool {
        match self.index_of(name) {
            Some(i) => {
                self.values[i] = value.into();
                true
            }
            None => false,
        }
    }

    /// Set from JSON, coercing by the column's declared type.
    pub fn set_json(&mut self, name: &str, value: &Value) -> bool {
        match self.index_of(name) {
            Some(i) => {
                self.values[i] = SqlValue::from_json(value, self.schema.fields[i].ty);
                true
            }
            None => false,
        }
    }

    /// Builder form of [`Record::set`].
    pub fn with(mut self, name: &str, value: impl Into<SqlValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.index_of(name).map(|i| &self.values[i])
    }

    /// Every declared column with its current value.
    pub fn values(&self) -> impl Iterator<Item = (&'static str, &SqlValue)> + '_ {
        self.schema.fields.iter().map(|f| f.name).zip(&self.values)
    }

    pub fn is_persisted(&self) -> bool {
        self.original.is_some()
    }

    pub fn has_complete_key(&self) -> bool {
        let mut keys = self
            .schema
            .fields
            .iter()
            .zip(&self.values)
            .filter(|(f, _)| f.primary_key)
            .peekable();
        keys.peek().is_some() && keys.all(|(_, v)| !v.is_null())
    }

    pub fn mark_persisted(&mut self) {
        self.original = Some(self.values.clone());
    }

    /// Names of non-key columns that would be written by an update.
    pub fn dirty_fields(&self) -> Vec<&'static str> {
        self.schema
            .fields
            .iter()
            .enumerate()
            .filter(|(i, f)| !f.primary_key && self.is_dirty(*i))
            .map(|(_, f)| f.name)
            .collect()
    }

    fn is_dirty(&self, i: usize) -> bool {
        match &self.original {
            Some(original) => original[i] != self.values[i],
            None => !self.values[i].is_null(),
        }
    }

    /// `(column, value)` pairs identifying this row.
    pub fn key_values(&self) -> Vec<(&'static str, SqlValue)> {
        self.schema
            .fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.primary_key)
            .map(|(i, f)| {
                let current = &self.values[i];
                let value = match &self.original {
                    Some(original) if !original[i].is_null() => original[i].clone(),
                    _ => current.clone(),
                };
                (f.name, value)
            })
            .collect()
    }

    fn key_where(&self) -> Option<(String, Vec<SqlValue>)> {
        let keys = self.key_values();
        if keys.is_empty() {
            return None;
        }
        let clause = keys
            .iter()
            .map(|(name, _)| format!("{} = ?", quote_ident(name)))
            .collect::<Vec<_>>()
            .join(" AND ");
        Some((clause, keys.into_iter().map(|(_, v)| v).collect()))
    }

    /// INSERT of the non-null columns, in declaration order.
    pub fn insert_statement(&self) -> Statement {
        let (cols, params): (Vec<String>, Vec<SqlValue>) = self
            .schema
            .fields
            .iter()
            .zip(&self.values)
            .filter(|(_, v)| !v.is_null())
            .map(|(f, v)| (quote_ident(f.name), v.clone()))
            .unzip();

        let sql = if cols.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", self.schema.quoted_name())
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.schema.quoted_name(),
                cols.join(", "),
                vec!["?"; cols.len()].join(", ")
            )
        };
        Statement { sql, params }
    }

    /// UPDATE of the dirty columns, or `None` when nothing changed.
    pub fn update_statement(&self) -> Option<Statement> {
        let (where_clause, key_params) = self.key_where()?;
        let dirty: Vec<usize> = self
            .schema
            .fields
            .iter()
            .enumerate()
            .filter(|(i, f)| !f.primary_key && self.is_dirty(*i))
            .map(|(i, _)| i)
            .collect();
        if dirty.is_empty() {
            return None;
        }

        let sets = dirty
            .iter()
            .map(|i| format!("{} = ?", quote_ident(self.schema.fields[*i].name)))
            .collect::<Vec<_>>()
            .join(", ");
        let mut params: Vec<SqlValue> = dirty.iter().map(|i| self.values[*i].clone()).collect();
        params.extend(key_params);

        Some(Statement {
            sql: format!(
                "UPDATE {} SET {} WHERE {}",
                self.schema.quoted_name(),
                sets,
                where_clause
            ),
            params,
        })
    }

    pub fn delete_statement(&self) -> Option<Statement> {
        let (where_clause, params) = self.key_where()?;
        Some(Statement {
            sql: format!(
                "DELETE FROM {} WHERE {}",
                self.schema.quoted_name(),
                where_clause
            ),
            params,
        })
    }

    pub fn to_json(&self) -> Value {
        let map = self
            .schema
            .fields
            .iter()
            .zip(&self.values)
            .map(|(f, v)| (f.name.to_string(), v.to_json()))
            .collect::<serde_json::Map<_, _>>();
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::entities::{BUY, CONFIG, YYYP_LENT};
    use serde_json::json;

    #[test]
    fn test_from_json_ignores_unknown_keys() {
        let record = Record::from_json(&YYYP_LENT, &json!({"ID": "L1", "bogus": 1}));
        assert_eq!(record.get("ID"), Some(&SqlValue::from("L1")));
        assert!(record.get("bogus").is_none());
        let mut record = record;
        assert!(!record.set("bogus", "x"));
    }

    #[test]
    fn test_insert_skips_blank_values() {
        let record = Record::from_json(
            &YYYP_LENT,
            &json!({"ID": "L1", "weapon_name": "", "price": "12.5", "status": null}),
        );
        let stmt = record.insert_statement();
        assert_eq!(stmt.sql, "INSERT INTO \"yyyp_lent\" (\"ID\", \"price\") VALUES (?, ?)");
        assert_eq!(stmt.params, vec![SqlValue::from("L1"), SqlValue::Real(12.5)]);
    }

    #[test]
    fn test_update_writes_only_dirty_fields() {
        let row = DbRow::from_pairs(vec![
            ("ID".to_string(), SqlValue::from("L1")),
            ("status".to_string(), SqlValue::from("租赁中")),
            ("price".to_string(), SqlValue::Real(3.0)),
        ]);
        let mut record = Record::from_row(&YYYP_LENT, &row);
        assert!(record.update_statement().is_none());

        record.set("status", "完成");
        let stmt = record.update_statement().unwrap();
        assert_eq!(stmt.sql, "UPDATE \"yyyp_lent\" SET \"status\" = ? WHERE \"ID\" = ?");
        assert_eq!(stmt.params, vec![SqlValue::from("完成"), SqlValue::from("L1")]);

        record.mark_persisted();
        assert!(record.update_statement().is_none());
    }

    #[test]
    fn test_fresh_record_update_uses_non_null_fields() {
        let record = Record::new(&BUY)
            .with("ID", "B1")
            .with("from", "yyyp")
            .with("status", "已完成");
        let stmt = record.update_statement().unwrap();
        assert_eq!(
            stmt.sql,
            "UPDATE \"buy\" SET \"status\" = ? WHERE \"ID\" = ? AND \"from\" = ?"
        );
        assert_eq!(stmt.params.len(), 3);
    }

    #[test]
    fn test_update_where_uses_snapshot_key() {
        let row = DbRow::from_pairs(vec![("ID".to_string(), SqlValue::from("old"))]);
        let mut record = Record::from_row(&YYYP_LENT, &row);
        record.set("ID", "new");
        record.set("status", "完成");
        let stmt = record.update_statement().unwrap();
        assert_eq!(stmt.params.last(), Some(&SqlValue::from("old")));
    }

    #[test]
    fn test_key_completeness() {
        let record = Record::new(&BUY).with("ID", "B1");
        assert!(!record.has_complete_key());
        assert!(record.with("from", "buff").has_complete_key());
        assert!(!Record::new(&CONFIG).has_complete_key());
        assert!(Record::new(&CONFIG).delete_statement().is_none());
    }

    #[test]
    fn test_delete_statement() {
        let record = Record::new(&BUY).with("ID", "B1").with("from", "buff");
        let stmt = record.delete_statement().unwrap();
        assert_eq!(stmt.sql, "DELETE FROM \"buy\" WHERE \"ID\" = ? AND \"from\" = ?");
    }
}
