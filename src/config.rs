//! Runtime configuration, read from `CALFIX_*` environment variables with
//! in-code defaults.

use chrono_tz::Tz;
use tracing::debug;

use crate::calendar::{Interval, TimeUnit};
use crate::error::{AppError, AppResult};

pub const ENV_DEFAULT_TZ: &str = "CALFIX_DEFAULT_TZ";
pub const ENV_REWRITE_INTERVAL: &str = "CALFIX_REWRITE_INTERVAL";
pub const ENV_INFLUX_URL: &str = "CALFIX_INFLUX_URL";
pub const ENV_INFLUX_DB: &str = "CALFIX_INFLUX_DB";
pub const ENV_OUTPUT: &str = "CALFIX_OUTPUT";

pub const DEFAULT_INFLUX_URL: &str = "http://127.0.0.1:8086";

/// Settings that shape query analysis and rewriting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixConfig {
    /// Zone used when the query has no `TZ()` directive.
    pub default_timezone: Tz,
    /// Interval substituted for calendar units in the rewritten query.
    pub rewrite_interval: Interval,
}

impl Default for FixConfig {
    fn default() -> Self {
        FixConfig { default_timezone: Tz::UTC, rewrite_interval: Interval::new(1, TimeUnit::Days) }
    }
}

impl FixConfig {
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from any key lookup; unset or blank keys keep their default.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = FixConfig::default();
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        if let Some(name) = get(ENV_DEFAULT_TZ) {
            cfg = cfg.with_timezone(&name)?;
        }
        if let Some(iv) = get(ENV_REWRITE_INTERVAL) {
            cfg = cfg.with_rewrite_interval(&iv)?;
        }
        debug!("[CONFIG] default_tz={} rewrite_interval={}", cfg.default_timezone, cfg.rewrite_interval);
        Ok(cfg)
    }

    pub fn with_timezone(mut self, name: &str) -> AppResult<Self> {
        self.default_timezone = name
            .parse::<Tz>()
            .map_err(|_| AppError::config("bad_timezone", format!("{}: unknown time zone '{}'", ENV_DEFAULT_TZ, name)))?;
        Ok(self)
    }

    /// The rewrite target must be something the datastore buckets natively.
    pub fn with_rewrite_interval(mut self, text: &str) -> AppResult<Self> {
        let iv = Interval::parse(text)
            .map_err(|e| AppError::config("bad_rewrite_interval", format!("{}: {}", ENV_REWRITE_INTERVAL, e.message())))?;
        if iv.needs_rewrite() {
            return Err(AppError::config(
                "bad_rewrite_interval",
                format!("{}: {} is itself a calendar unit", ENV_REWRITE_INTERVAL, iv),
            ));
        }
        self.rewrite_interval = iv;
        Ok(self)
    }
}

/// Where the datastore adapter sends queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub url: String,
    pub db: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig { url: DEFAULT_INFLUX_URL.to_string(), db: None }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        ClientConfig {
            url: get(ENV_INFLUX_URL).unwrap_or_else(|| DEFAULT_INFLUX_URL.to_string()),
            db: get(ENV_INFLUX_DB),
        }
    }
}

/// `CALFIX_OUTPUT=json` asks for compact JSON instead of pretty-printed.
pub fn compact_output() -> bool {
    std::env::var(ENV_OUTPUT).map(|v| v.eq_ignore_ascii_case("json")).unwrap_or(false)
}
