//! Data-source views assembled from rows of the `config` table.
//!
//! A data source is every config row sharing a `(dataID, dataName)` pair.
//! Modern rows carry the whole configuration as JSON under `key2 = 'config'`;
//! legacy rows store one setting per row in `key2`/`value`.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

pub const YOUPIN_TYPE: &str = "youpin";
pub const CONFIG_KEY: &str = "config";
pub const DEFAULT_UPDATE_FREQ: &str = "15min";
pub const DEFAULT_SLEEP_SECS: u64 = 900;

/// One raw row of the `config` table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigRow {
    pub data_id: Option<i64>,
    pub data_name: Option<String>,
    pub key1: Option<String>,
    pub key2: Option<String>,
    pub value: Option<String>,
    pub status: Option<String>,
    pub steam_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataSourceView {
    #[serde(rename = "dataID")]
    pub data_id: Option<i64>,
    #[serde(rename = "dataName")]
    pub data_name: Option<String>,
    #[serde(rename = "type")]
    pub source_type: String,
    pub config: Map<String, Value>,
    pub status: Option<String>,
    pub enabled: bool,
    #[serde(rename = "lastUpdate")]
    pub last_update: String,
    #[serde(rename = "updateFreq")]
    pub update_freq: String,
    #[serde(rename = "steamID")]
    pub steam_id: String,
}

impl DataSourceView {
    /// Collection interval from the `sleep_time` setting.
    pub fn sleep_secs(&self) -> u64 {
        ["sleep_time", "yyyp_sleep_time"]
            .iter()
            .filter_map(|k| self.config.get(*k))
            .find_map(|v| match v {
                Value::Number(n) => n.as_u64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            })
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_SLEEP_SECS)
    }
}

/// Human-readable collection interval.
pub fn update_freq(secs: i64) -> String {
    if secs <= 300 {
        format!("{}s", secs)
    } else if secs <= 3600 {
        format!("{}min", secs / 60)
    } else if secs <= 86400 {
        format!("{}hour", secs / 3600)
    } else {
        format!("{}day", secs / 86400)
    }
}

/// Steam ID stored inside a config JSON object, if any.
pub fn extract_steam_id(config: &Value) -> Option<String> {
    ["steamID", "steamId", "yyyp_steamId"]
        .iter()
        .filter_map(|k| config.get(*k))
        .find_map(|v| match v {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

/// First config JSON whose `steamID` equals `steam_id`. Unparseable values are skipped.
pub fn find_account_config(values: &[String], steam_id: &str) -> Option<Value> {
    values
        .iter()
        .filter_map(|v| serde_json::from_str::<Value>(v).ok())
        .find(|config| match config.get("steamID") {
            Some(Value::String(s)) => s == steam_id,
            Some(Value::Number(n)) => n.to_string() == steam_id,
            _ => false,
        })
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().filter(|s| !s.is_empty())
}

fn config_key(source_type: Option<&str>, key: &str) -> String {
    if source_type == Some(YOUPIN_TYPE) {
        format!("yyyp_{}", key)
    } else {
        key.to_string()
    }
}

/// Group config rows into data sources, keeping first-seen order.
pub fn build_views(rows: &[ConfigRow], last_update: &str) -> Vec<DataSourceView> {
    let mut views: Vec<DataSourceView> = Vec::new();
    let mut index: HashMap<(Option<i64>, Option<String>), usize> = HashMap::new();

    for row in rows {
        let group = (row.data_id, row.data_name.clone());
        let slot = *index.entry(group).or_insert_with(|| {
            views.push(DataSourceView {
                data_id: row.data_id,
                data_name: row.data_name.clone(),
                source_type: non_empty(&row.key1).unwrap_or("unknown").to_string(),
                config: Map::new(),
                status: row.status.clone(),
                enabled: row.status.as_deref() == Some("1"),
                last_update: last_update.to_string(),
                update_freq: DEFAULT_UPDATE_FREQ.to_string(),
                steam_id: String::new(),
            });
            views.len() - 1
        });
        let view = &mut views[slot];

        if let Some(steam_id) = non_empty(&row.steam_id) {
            view.steam_id = steam_id.to_string();
        }
        let key1 = non_empty(&row.key1);
        if let Some(k) = key1 {
            view.source_type = k.to_string();
        }
        let key2 = non_empty(&row.key2);
        let value = non_empty(&row.value);

        match (key1, key2) {
            (_, Some(CONFIG_KEY)) => {
                if let Some(Value::Object(obj)) = value.and_then(|v| serde_json::from_str(v).ok()) {
                    if view.steam_id.is_empty() {
                        if let Some(id) = extract_steam_id(&Value::Object(obj.clone())) {
                            view.steam_id = id;
                        }
                    }
                    for (k, v) in obj {
                        view.config.insert(config_key(key1, &k), v);
                    }
                }
            }
            (Some(_), Some(k2)) => {
                view.config.insert(
                    config_key(key1, k2),
                    row.value.clone().map(Value::String).unwrap_or(Value::Null),
                );
                if k2 == "sleep_time" {
                    view.update_freq = match value.and_then(|v| v.trim().parse::<i64>().ok()) {
                        Some(secs) => update_freq(secs),
                        None => DEFAULT_UPDATE_FREQ.to_string(),
                    };
                }
            }
            (Some(k1), None) => {
                view.config.insert(
                    k1.to_string(),
                    row.value.clone().map(Value::String).unwrap_or(Value::Null),
                );
            }
            (None, None) => {
                if let Some(Value::Object(obj)) = value.and_then(|v| serde_json::from_str(v).ok()) {
                    view.config.extend(obj);
                }
            }
            (None, Some(_)) => {}
        }

        if row.status.is_some() {
            view.status = row.status.clone();
            view.enabled = row.status.as_deref() == Some("1");
        }
    }

    views
}
