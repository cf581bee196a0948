use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub log_level: String,
    pub http_proxy: Option<ProxyConfig>,
    pub collect_workers: usize,
    pub collector_url: Option<String>,
    pub busy_timeout_ms: u64,
}

/// Outbound proxy used by the collector client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
}

impl ProxyConfig {
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("9001")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "csweaponmanager.db".to_string());

        let log_level = env_map
            .get("LOG_LEVEL")
            .map(|s| s.trim().to_lowercase())
            .unwrap_or_else(|| "info".to_string());
        if !LOG_LEVELS.contains(&log_level.as_str()) {
            return Err(ConfigError::InvalidValue(
                "LOG_LEVEL".to_string(),
                format!("must be one of {}, got {}", LOG_LEVELS.join(", "), log_level),
            ));
        }

        let http_proxy = parse_proxy_from_map(&env_map)?;

        let collect_workers = env_map
            .get("COLLECT_WORKERS")
            .map(|s| s.as_str())
            .unwrap_or("4")
            .parse::<usize>()
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "COLLECT_WORKERS".to_string(),
                    "must be a positive integer".to_string(),
                )
            })?;

        let collector_url = env_map
            .get("COLLECTOR_URL")
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty());

        let busy_timeout_ms = env_map
            .get("BUSY_TIMEOUT_MS")
            .map(|s| s.as_str())
            .unwrap_or("30000")
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "BUSY_TIMEOUT_MS".to_string(),
                    "must be a valid u64".to_string(),
                )
            })?;

        Ok(Config {
            port,
            database_path,
            log_level,
            http_proxy,
            collect_workers,
            collector_url,
            busy_timeout_ms,
        })
    }
}

fn parse_proxy_from_map(
    env_map: &HashMap<String, String>,
) -> Result<Option<ProxyConfig>, ConfigError> {
    let enabled = match env_map
        .get("HTTP_PROXY_ENABLED")
        .map(|s| s.trim().to_lowercase())
        .as_deref()
    {
        None | Some("") | Some("false") | Some("0") => false,
        Some("true") | Some("1") => true,
        Some(other) => {
            return Err(ConfigError::InvalidValue(
                "HTTP_PROXY_ENABLED".to_string(),
                format!("must be true or false, got {}", other),
            ))
        }
    };
    if !enabled {
        return Ok(None);
    }

    let host = env_map
        .get("HTTP_PROXY_HOST")
        .cloned()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnv("HTTP_PROXY_HOST".to_string()))?;
    let port = env_map
        .get("HTTP_PROXY_PORT")
        .ok_or_else(|| ConfigError::MissingEnv("HTTP_PROXY_PORT".to_string()))?
        .parse::<u16>()
        .map_err(|_| {
            ConfigError::InvalidValue(
                "HTTP_PROXY_PORT".to_string(),
                "must be a valid u16".to_string(),
            )
        })?;

    Ok(Some(ProxyConfig { host, port }))
}
