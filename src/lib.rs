pub mod api;
pub mod collector;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;

pub use collector::{Collector, CollectorScheduler, HttpCollector, MockCollector};
pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{Platform, TradeSide};
pub use error::AppError;
