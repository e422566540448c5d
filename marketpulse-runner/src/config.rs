//! Dashboard configuration, stored as TOML.
//!
//! Every field has a default, so an empty file (or no file at all) yields the
//! stock dashboard: four equity/FX instruments, two coins, three FRED series.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use marketpulse_core::data::{coingecko, fred, yahoo, RetryPolicy};
use marketpulse_core::domain::{Instrument, LookbackWindow, ProviderId, SourceRequest};

/// Longest cache TTL a config may ask for: seven days.
pub const MAX_CACHE_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Errors from loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("failed to serialize config: {0}")]
    Serialize(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Complete dashboard configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub lookback_days: LookbackWindow,
    /// Yahoo Finance tickers (indices and FX pairs).
    pub equities: Vec<Instrument>,
    /// CoinGecko coin ids.
    pub crypto: Vec<Instrument>,
    /// FRED series ids.
    pub macro_series: Vec<Instrument>,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
    pub providers: ProvidersConfig,
    pub secrets: SecretsConfig,
}

/// Bounded-retry settings for the CoinGecko fetcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_timeout_ms: u64,
    pub jitter_min_ms: u64,
    pub jitter_max_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub yahoo_base_url: String,
    pub coingecko_base_url: String,
    pub fred_base_url: String,
    /// Quote currency for CoinGecko prices.
    pub vs_currency: String,
    /// IANA zone FRED observation dates are interpreted in.
    pub fred_timezone: String,
}

/// Names of the environment variables holding provider keys. The keys
/// themselves never live in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretsConfig {
    pub fred_api_key_env: String,
    pub coingecko_api_key_env: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let p = RetryPolicy::default();
        Self {
            max_retries: p.max_retries,
            base_timeout_ms: p.base_timeout.as_millis() as u64,
            jitter_min_ms: p.jitter_min.as_millis() as u64,
            jitter_max_ms: p.jitter_max.as_millis() as u64,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: marketpulse_core::data::DEFAULT_TTL.as_secs(),
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            yahoo_base_url: yahoo::DEFAULT_BASE_URL.into(),
            coingecko_base_url: coingecko::DEFAULT_BASE_URL.into(),
            fred_base_url: fred::DEFAULT_BASE_URL.into(),
            vs_currency: "usd".into(),
            fred_timezone: "America/Chicago".into(),
        }
    }
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            fred_api_key_env: "FRED_API_KEY".into(),
            coingecko_api_key_env: "COINGECKO_API_KEY".into(),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            lookback_days: LookbackWindow::default(),
            equities: vec![
                Instrument::new("S&P 500", "^GSPC"),
                Instrument::new("NASDAQ", "^IXIC"),
                Instrument::new("EUR/USD", "EURUSD=X"),
                Instrument::new("GBP/USD", "GBPUSD=X"),
            ],
            crypto: vec![
                Instrument::new("Bitcoin", "bitcoin"),
                Instrument::new("Ethereum", "ethereum"),
            ],
            macro_series: vec![
                Instrument::new("US Unemployment Rate", "UNRATE"),
                Instrument::new("US Inflation Rate", "T10YIE"),
                Instrument::new("US GDP Growth", "A191RL1Q225SBEA"),
            ],
            retry: RetryConfig::default(),
            cache: CacheConfig::default(),
            providers: ProvidersConfig::default(),
            secrets: SecretsConfig::default(),
        }
    }
}

impl DashboardConfig {
    /// Load and validate a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let r = &self.retry;
        if r.max_retries == 0 || r.max_retries > 10 {
            return Err(ConfigError::Invalid(format!(
                "retry.max_retries must be in 1..=10, got {}",
                r.max_retries
            )));
        }
        if r.base_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "retry.base_timeout_ms must be positive".into(),
            ));
        }
        if r.jitter_min_ms > r.jitter_max_ms {
            return Err(ConfigError::Invalid(format!(
                "retry.jitter_min_ms ({}) exceeds retry.jitter_max_ms ({})",
                r.jitter_min_ms, r.jitter_max_ms
            )));
        }
        if !(1..=MAX_CACHE_TTL_SECS).contains(&self.cache.ttl_secs) {
            return Err(ConfigError::Invalid(format!(
                "cache.ttl_secs must be in 1..={MAX_CACHE_TTL_SECS}, got {}",
                self.cache.ttl_secs
            )));
        }
        if self.providers.vs_currency.trim().is_empty() {
            return Err(ConfigError::Invalid("providers.vs_currency is empty".into()));
        }
        self.fred_timezone()?;

        // Display names become table columns and must be unique.
        let mut seen = HashSet::new();
        for inst in self.all_instruments().map(|(_, i)| i) {
            if inst.name.trim().is_empty() || inst.id.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "instrument name and id must be non-empty: {inst:?}"
                )));
            }
            if !seen.insert(inst.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate instrument name '{}'",
                    inst.name
                )));
            }
        }
        Ok(())
    }

    pub fn fred_timezone(&self) -> Result<Tz, ConfigError> {
        self.providers.fred_timezone.parse::<Tz>().map_err(|_| {
            ConfigError::Invalid(format!(
                "unknown time zone '{}' in providers.fred_timezone",
                self.providers.fred_timezone
            ))
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retry.max_retries,
            base_timeout: Duration::from_millis(self.retry.base_timeout_ms),
            jitter_min: Duration::from_millis(self.retry.jitter_min_ms),
            jitter_max: Duration::from_millis(self.retry.jitter_max_ms),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    /// Every configured instrument with the provider that serves it, in
    /// display order: equities, crypto, macro.
    pub fn all_instruments(&self) -> impl Iterator<Item = (ProviderId, &Instrument)> {
        self.equities
            .iter()
            .map(|i| (ProviderId::Yahoo, i))
            .chain(self.crypto.iter().map(|i| (ProviderId::CoinGecko, i)))
            .chain(self.macro_series.iter().map(|i| (ProviderId::Fred, i)))
    }

    /// One request per instrument over `window` ending at `now`.
    pub fn requests(&self, window: LookbackWindow, now: DateTime<Utc>) -> Vec<SourceRequest> {
        let (start, end) = window.bounds(now);
        self.all_instruments()
            .map(|(provider, inst)| SourceRequest::new(provider, inst.clone(), start, end))
            .collect()
    }
}
