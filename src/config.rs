use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::domain::order::DEFAULT_MAX_BATCH_SIZE;
use crate::utils::RetryConfig;

pub const ENV_DATABASE_URL: &str = "ORDER_ENGINE_DATABASE_URL";
pub const ENV_METRICS_PORT: &str = "ORDER_ENGINE_METRICS_PORT";
pub const ENV_MAX_BATCH_SIZE: &str = "ORDER_ENGINE_MAX_BATCH_SIZE";
pub const ENV_TRACK_AGGREGATES: &str = "ORDER_ENGINE_TRACK_AGGREGATES";
pub const ENV_RETRY_MAX_ATTEMPTS: &str = "ORDER_ENGINE_RETRY_MAX_ATTEMPTS";
pub const ENV_RETRY_INITIAL_DELAY_MS: &str = "ORDER_ENGINE_RETRY_INITIAL_DELAY_MS";

/// Runtime settings for the engine and its binary.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Postgres URL; `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub metrics_port: u16,
    pub max_batch_size: usize,
    pub track_aggregates: bool,
    pub retry: RetryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            metrics_port: 9090,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            track_aggregates: true,
            retry: RetryConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any name → value source. Unset or blank values fall back to
    /// defaults; malformed values are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let max_batch_size = parse_or(get(ENV_MAX_BATCH_SIZE), ENV_MAX_BATCH_SIZE, defaults.max_batch_size)?;
        if max_batch_size == 0 {
            bail!("{ENV_MAX_BATCH_SIZE} must be at least 1");
        }

        let max_attempts = parse_or(
            get(ENV_RETRY_MAX_ATTEMPTS),
            ENV_RETRY_MAX_ATTEMPTS,
            defaults.retry.max_attempts,
        )?;
        if max_attempts == 0 {
            bail!("{ENV_RETRY_MAX_ATTEMPTS} must be at least 1");
        }

        let initial_delay_ms = parse_or(
            get(ENV_RETRY_INITIAL_DELAY_MS),
            ENV_RETRY_INITIAL_DELAY_MS,
            defaults.retry.initial_delay.as_millis() as u64,
        )?;

        let track_aggregates = match get(ENV_TRACK_AGGREGATES) {
            None => defaults.track_aggregates,
            Some(raw) => parse_flag(&raw)
                .with_context(|| format!("invalid value for {ENV_TRACK_AGGREGATES}"))?,
        };

        Ok(Self {
            database_url: get(ENV_DATABASE_URL),
            metrics_port: parse_or(get(ENV_METRICS_PORT), ENV_METRICS_PORT, defaults.metrics_port)?,
            max_batch_size,
            track_aggregates,
            retry: RetryConfig {
                max_attempts,
                initial_delay: Duration::from_millis(initial_delay_ms),
                ..defaults.retry
            },
        })
    }
}

fn parse_or<T>(raw: Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .with_context(|| format!("invalid value for {name}: {raw:?}")),
    }
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean, got {other:?}"),
    }
}
