use bigdecimal::BigDecimal;
use chrono::TimeDelta;
use std::str::FromStr;
use std::time::Duration;

use crate::rules::RuleConfig;
use crate::solicitation_client::{FetchSettings, DEFAULT_ENDPOINT};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub api_token: String,
    pub api_url: String,
    pub sync_interval: Duration,
    pub request_delay: Duration,
    pub max_attempts: u32,
    pub request_timeout: Duration,
    pub minimum_tenure_months: u32,
    pub minimum_margin: BigDecimal,
    pub initial_lookback: TimeDelta,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            database_url: lookup("DATABASE_URL")
                .or_else(|| lookup("DB_URL"))
                .ok_or_else(|| {
                    anyhow::anyhow!("DATABASE_URL or DB_URL environment variable required")
                })
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DATABASE_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DATABASE_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            api_token: lookup("TOKEN_API_FIXO")
                .or_else(|| lookup("API_TOKEN"))
                .ok_or_else(|| {
                    anyhow::anyhow!("TOKEN_API_FIXO or API_TOKEN environment variable required")
                })
                .and_then(|token| {
                    if token.trim().is_empty() {
                        anyhow::bail!("TOKEN_API_FIXO cannot be empty");
                    }
                    Ok(token)
                })?,
            api_url: lookup("SOLICITATIONS_API_URL")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            sync_interval: Duration::from_secs(parse_or(&lookup, "SYNC_INTERVAL_SECS", 60)?),
            request_delay: Duration::from_millis(parse_or(&lookup, "REQUEST_DELAY_MS", 1000)?),
            max_attempts: parse_or(&lookup, "MAX_ATTEMPTS", 5)?,
            request_timeout: Duration::from_secs(parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 60)?),
            minimum_tenure_months: parse_or(&lookup, "MIN_TENURE_MONTHS", 3)?,
            minimum_margin: match lookup("MIN_MARGIN").filter(|s| !s.trim().is_empty()) {
                Some(raw) => BigDecimal::from_str(raw.trim())
                    .map_err(|_| anyhow::anyhow!("MIN_MARGIN must be a decimal number"))?,
                None => BigDecimal::from(0),
            },
            initial_lookback: TimeDelta::try_hours(parse_or(&lookup, "INITIAL_LOOKBACK_HOURS", 0)?)
                .ok_or_else(|| anyhow::anyhow!("INITIAL_LOOKBACK_HOURS is out of range"))?,
        };

        if !config.api_url.starts_with("http://") && !config.api_url.starts_with("https://") {
            anyhow::bail!("SOLICITATIONS_API_URL must start with http:// or https://");
        }
        if config.max_attempts == 0 {
            anyhow::bail!("MAX_ATTEMPTS must be at least 1");
        }
        if config.initial_lookback < TimeDelta::zero() {
            anyhow::bail!("INITIAL_LOOKBACK_HOURS cannot be negative");
        }

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!(
            "Database URL: {}...",
            log_prefix(&config.database_url)
        );
        tracing::debug!("Solicitations API URL: {}", config.api_url);
        tracing::debug!(
            "Interval {:?}, delay {:?}, {} attempts per page",
            config.sync_interval,
            config.request_delay,
            config.max_attempts
        );

        Ok(config)
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            delay: self.request_delay,
            max_attempts: self.max_attempts,
            request_timeout: self.request_timeout,
        }
    }

    pub fn rule_config(&self) -> RuleConfig {
        RuleConfig {
            minimum_tenure_months: self.minimum_tenure_months,
            minimum_margin: self.minimum_margin.clone(),
        }
    }
}

/// First characters of a secret-bearing value, safe to log.
fn log_prefix(value: &str) -> String {
    value.chars().take(20).collect()
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key).filter(|s| !s.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a valid number, got {:?}", key, raw)),
        None => Ok(default),
    }
}
