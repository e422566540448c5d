//! Fetch requests and their cache keys.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The upstream data source a request is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// Equities, indices and FX closes (Yahoo Finance chart API).
    Yahoo,
    /// Cryptocurrency prices.
    CoinGecko,
    /// Macroeconomic indicators from the St. Louis Fed.
    Fred,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Yahoo => "yahoo",
            ProviderId::CoinGecko => "coingecko",
            ProviderId::Fred => "fred",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A display name paired with the provider's identifier for it,
/// e.g. `("S&P 500", "^GSPC")` or `("Bitcoin", "bitcoin")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instrument {
    pub name: String,
    pub id: String,
}

impl Instrument {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }
}

/// Parameters for one fetch. Immutable once issued.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRequest {
    provider: ProviderId,
    instrument: Instrument,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl SourceRequest {
    pub fn new(
        provider: ProviderId,
        instrument: Instrument,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            provider,
            instrument,
            start,
            end,
        }
    }

    pub fn provider(&self) -> ProviderId {
        self.provider
    }

    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    /// Display name the resulting series carries.
    pub fn name(&self) -> &str {
        &self.instrument.name
    }

    /// Provider-side identifier (ticker, coin id, series id).
    pub fn id(&self) -> &str {
        &self.instrument.id
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Cache key: instants are truncated to UTC dates so two runs with the
    /// same lookback on the same day share entries.
    pub fn cache_key(&self) -> CacheKey {
        CacheKey {
            provider: self.provider,
            id: self.instrument.id.clone(),
            start: self.start.date_naive(),
            end: self.end.date_naive(),
        }
    }
}

impl fmt::Display for SourceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} ({})",
            self.provider, self.instrument.id, self.instrument.name
        )
    }
}

/// Key under which a fetched series is cached.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub provider: ProviderId,
    pub id: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}
