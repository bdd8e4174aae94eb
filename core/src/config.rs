//! Backend location and cache freshness, read once at startup.

use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(60);

pub const BASE_URL_ENV: &str = "LOANGUARD_API_BASE";
pub const STALE_SECS_ENV: &str = "LOANGUARD_STALE_SECS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: String,
    /// How long a query result is served without a background refetch.
    pub stale_time: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            stale_time: DEFAULT_STALE_TIME,
        }
    }
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Build from `LOANGUARD_API_BASE` / `LOANGUARD_STALE_SECS`, falling back
    /// to defaults for unset, empty, or unparsable values.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let base_url = lookup(BASE_URL_ENV)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.base_url);
        let stale_time = lookup(STALE_SECS_ENV)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.stale_time);
        Self {
            base_url,
            stale_time,
        }
    }

    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }
}
