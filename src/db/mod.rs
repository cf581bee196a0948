//! Database module for SQLite operations.
//!
//! This module provides:
//! - Declared table schemas and the registry of every owned table
//! - Schema sync (create missing tables, add missing columns, indexes)
//! - Database initialization and SQLite pragma configuration
//! - A parameterized query facade with typed error classification
//! - Record mapping with dirty-field updates
//! - Repository layer for database operations

pub mod entities;
pub mod facade;
pub mod migrations;
pub mod record;
pub mod repo;
pub mod schema;
pub mod sync;
pub mod value;

pub use facade::{Filter, InsertOutcome, QueryError, QueryFacade, SaveOutcome};
pub use migrations::init_db;
pub use record::Record;
pub use repo::Repository;
pub use schema::{ColumnType, FieldDef, TableSchema};
pub use sync::{DatabaseInfo, IntegrityReport, SchemaSync, Statistics, SyncReport};
pub use value::{DbRow, SqlValue};
