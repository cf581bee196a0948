//! Static table declarations and the DDL generated from them.

use std::fmt;

/// SQLite column type keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Real,
    DateTime,
}

impl ColumnType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::DateTime => "DATETIME",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// One declared column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub ty: ColumnType,
    pub primary_key: bool,
    pub not_null: bool,
    /// SQL default expression, emitted verbatim.
    pub default: Option<&'static str>,
}

impl FieldDef {
    pub const fn new(name: &'static str, ty: ColumnType) -> Self {
        FieldDef {
            name,
            ty,
            primary_key: false,
            not_null: false,
            default: None,
        }
    }

    pub const fn text(name: &'static str) -> Self {
        Self::new(name, ColumnType::Text)
    }

    pub const fn integer(name: &'static str) -> Self {
        Self::new(name, ColumnType::Integer)
    }

    pub const fn real(name: &'static str) -> Self {
        Self::new(name, ColumnType::Real)
    }

    pub const fn datetime(name: &'static str) -> Self {
        Self::new(name, ColumnType::DateTime)
    }

    /// Mark as part of the primary key. Key columns are always NOT NULL.
    pub const fn key(self) -> Self {
        FieldDef {
            primary_key: true,
            not_null: true,
            ..self
        }
    }

    pub const fn not_null(self) -> Self {
        FieldDef {
            not_null: true,
            ..self
        }
    }

    pub const fn default(self, expr: &'static str) -> Self {
        FieldDef {
            default: Some(expr),
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexDef {
    pub name: &'static str,
    pub columns: &'static [&'static str],
}

/// Declared shape of one table.
#[derive(Debug, PartialEq, Eq)]
pub struct TableSchema {
    pub name: &'static str,
    pub fields: &'static [FieldDef],
    pub indexes: &'static [IndexDef],
}

/// Quote an identifier for SQLite.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl TableSchema {
    pub fn quoted_name(&self) -> String {
        quote_ident(self.name)
    }

    pub fn field(&self, name: &str) -> Option<&'static FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn primary_keys(&self) -> Vec<&'static FieldDef> {
        self.fields.iter().filter(|f| f.primary_key).collect()
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.name).collect()
    }

    /// Comma-separated quoted column list, in declaration order.
    pub fn select_list(&self) -> String {
        self.fields
            .iter()
            .map(|f| quote_ident(f.name))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn create_table_sql(&self) -> String {
        let keys = self.primary_keys();
        let inline_key = keys.len() == 1;

        let mut parts: Vec<String> = self
            .fields
            .iter()
            .map(|field| {
                let mut col = format!("{} {}", quote_ident(field.name), field.ty);
                if field.primary_key && inline_key {
                    col.push_str(" PRIMARY KEY");
                } else if field.not_null {
                    col.push_str(" NOT NULL");
                }
                if let Some(default) = field.default {
                    col.push_str(" DEFAULT ");
                    col.push_str(default);
                }
                col
            })
            .collect();

        if keys.len() > 1 {
            let cols = keys
                .iter()
                .map(|f| quote_ident(f.name))
                .collect::<Vec<_>>()
                .join(", ");
            parts.push(format!("PRIMARY KEY ({})", cols));
        }

        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.quoted_name(),
            parts.join(", ")
        )
    }

    /// `ALTER TABLE ... ADD COLUMN` for a column missing from an existing table.
    ///
    /// NOT NULL is dropped: SQLite refuses it on ALTER without a default.
    pub fn add_column_sql(&self, field: &FieldDef) -> String {
        let mut sql = format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            self.quoted_name(),
            quote_ident(field.name),
            field.ty
        );
        if let Some(default) = field.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(default);
        }
        sql
    }

    pub fn create_index_sql(&self, index: &IndexDef) -> String {
        let cols = index
            .columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
            quote_ident(index.name),
            self.quoted_name(),
            cols
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static SINGLE: TableSchema = TableSchema {
        name: "t_single",
        fields: &[
            FieldDef::text("ID").key(),
            FieldDef::real("price"),
            FieldDef::integer("n").not_null().default("0"),
        ],
        indexes: &[IndexDef {
            name: "t_single_idx_price",
            columns: &["price"],
        }],
    };

    static COMPOSITE: TableSchema = TableSchema {
        name: "t_comp",
        fields: &[
            FieldDef::text("ID").key(),
            FieldDef::text("from").key(),
            FieldDef::datetime("at").default("CURRENT_TIMESTAMP"),
        ],
        indexes: &[],
    };

    #[test]
    fn test_inline_primary_key() {
        assert_eq!(
            SINGLE.create_table_sql(),
            "CREATE TABLE IF NOT EXISTS \"t_single\" (\"ID\" TEXT PRIMARY KEY, \"price\" REAL, \"n\" INTEGER NOT NULL DEFAULT 0)"
        );
    }

    #[test]
    fn test_composite_primary_key() {
        assert_eq!(
            COMPOSITE.create_table_sql(),
            "CREATE TABLE IF NOT EXISTS \"t_comp\" (\"ID\" TEXT NOT NULL, \"from\" TEXT NOT NULL, \"at\" DATETIME DEFAULT CURRENT_TIMESTAMP, PRIMARY KEY (\"ID\", \"from\"))"
        );
        assert_eq!(COMPOSITE.primary_keys().len(), 2);
    }

    #[test]
    fn test_add_column_never_not_null() {
        let field = SINGLE.field("n").unwrap();
        assert_eq!(
            SINGLE.add_column_sql(field),
            "ALTER TABLE \"t_single\" ADD COLUMN \"n\" INTEGER DEFAULT 0"
        );
    }

    #[test]
    fn test_index_sql() {
        assert_eq!(
            SINGLE.create_index_sql(&SINGLE.indexes[0]),
            "CREATE INDEX IF NOT EXISTS \"t_single_idx_price\" ON \"t_single\" (\"price\")"
        );
    }

    #[test]
    fn test_quote_ident_escapes() {
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }
}
