use std::str::FromStr;

use crate::stats::{DEFAULT_PRECISION, DEFAULT_THRESHOLD};

/// Runtime settings, read from the environment with sensible defaults.
#[derive(Clone, Debug)]
pub struct Config {
    /// Postgres connection string; only needed when no snapshot file is given
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    /// Hyperlinks under these prefixes may be checked for freshness
    pub checkable_prefixes: Vec<String>,
    pub freshness_timeout_secs: u64,
    pub user_agent: String,
    pub interval_threshold: f64,
    pub interval_precision: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            db_max_connections: 5,
            checkable_prefixes: vec!["https://wiki".to_string()],
            freshness_timeout_secs: 10,
            user_agent: "review-timeliness/0.1".to_string(),
            interval_threshold: DEFAULT_THRESHOLD,
            interval_precision: DEFAULT_PRECISION,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            database_url: std::env::var("DATABASE_URL").ok().or(default.database_url),
            db_max_connections: env_or("REVIEW_DB_MAX_CONNECTIONS", default.db_max_connections),
            checkable_prefixes: std::env::var("REVIEW_CHECKABLE_PREFIXES")
                .map(|value| parse_prefixes(&value))
                .unwrap_or(default.checkable_prefixes),
            freshness_timeout_secs: env_or(
                "REVIEW_FRESHNESS_TIMEOUT_SECS",
                default.freshness_timeout_secs,
            ),
            user_agent: std::env::var("REVIEW_USER_AGENT").unwrap_or(default.user_agent),
            interval_threshold: env_or("REVIEW_INTERVAL_THRESHOLD", default.interval_threshold),
            interval_precision: env_or("REVIEW_INTERVAL_PRECISION", default.interval_precision),
        }
    }
}

/// Parsed value of `key`, or `default` when unset or unparsable.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_prefixes(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|prefix| !prefix.is_empty())
        .map(str::to_string)
        .collect()
}
