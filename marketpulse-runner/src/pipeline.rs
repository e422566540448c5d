//! Dashboard pipeline: concurrent fetch, per-source isolation, combine.
//!
//! A run takes the window's requests, fetches them in parallel on the rayon
//! pool (consulting the TTL cache first), waits for every outcome, and hands
//! the successful series to the combiner. A failing source is logged,
//! reported and left out of the table; only a run where nothing succeeded is
//! an error.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use marketpulse_core::data::{
    combine, CoinGeckoProvider, DataError, ErrorKind, FredProvider, SeriesCache, SeriesProvider,
    YahooProvider,
};
use marketpulse_core::domain::{CombinedTable, ProviderId, Series, SourceRequest};

use crate::config::{ConfigError, DashboardConfig};

/// Errors from a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Every source failed (or returned nothing). Carries the per-source
    /// outcomes so the caller can say why.
    #[error("no data available: all {} source(s) failed", .sources.len())]
    NoData { sources: Vec<SourceOutcome> },

    #[error("data error: {0}")]
    Data(#[from] DataError),
}

/// How one source fared in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceStatus {
    Fetched { points: usize },
    Cached { points: usize },
    Failed { kind: ErrorKind, message: String },
}

impl SourceStatus {
    pub fn is_ok(&self) -> bool {
        !matches!(self, SourceStatus::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceOutcome {
    pub request: SourceRequest,
    pub status: SourceStatus,
}

/// Output of a successful run.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub table: CombinedTable,
    pub sources: Vec<SourceOutcome>,
}

impl PipelineRun {
    pub fn failed_sources(&self) -> impl Iterator<Item = &SourceOutcome> {
        self.sources.iter().filter(|s| !s.status.is_ok())
    }
}

/// The provider clients for one process, built once.
///
/// A provider that could not be constructed (bad base URL, missing key) keeps
/// its error; requests routed to it fail with that error while the other
/// providers carry on.
#[derive(Default)]
pub struct ProviderSet {
    slots: BTreeMap<ProviderId, Result<Arc<dyn SeriesProvider>, DataError>>,
}

impl ProviderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a working provider under its own id.
    pub fn with(mut self, provider: Arc<dyn SeriesProvider>) -> Self {
        self.slots.insert(provider.id(), Ok(provider));
        self
    }

    /// Record that `id` is unusable for this process.
    pub fn with_unavailable(mut self, id: ProviderId, error: DataError) -> Self {
        self.slots.insert(id, Err(error));
        self
    }

    /// Build all three providers from config. `env` looks up secrets by
    /// variable name.
    pub fn from_config(config: &DashboardConfig, env: impl Fn(&str) -> Option<String>) -> Self {
        let p = &config.providers;
        let mut set = Self::new();

        set = match YahooProvider::new(&p.yahoo_base_url) {
            Ok(y) => set.with(Arc::new(y)),
            Err(e) => set.with_unavailable(ProviderId::Yahoo, e),
        };

        let cg_key = env(&config.secrets.coingecko_api_key_env).filter(|k| !k.trim().is_empty());
        set = match CoinGeckoProvider::new(
            &p.coingecko_base_url,
            p.vs_currency.clone(),
            cg_key,
            config.retry_policy(),
        ) {
            Ok(c) => set.with(Arc::new(c)),
            Err(e) => set.with_unavailable(ProviderId::CoinGecko, e),
        };

        let key_var = &config.secrets.fred_api_key_env;
        let fred = match (env(key_var), config.fred_timezone()) {
            (None, _) => Err(DataError::Configuration {
                key: key_var.clone(),
                hint: format!("set {key_var} to a FRED API key to enable macro series"),
            }),
            (Some(_), Err(e)) => Err(DataError::Configuration {
                key: "providers.fred_timezone".into(),
                hint: e.to_string(),
            }),
            (Some(key), Ok(tz)) => FredProvider::new(&p.fred_base_url, key, tz),
        };
        set = match fred {
            Ok(f) => set.with(Arc::new(f)),
            Err(e) => set.with_unavailable(ProviderId::Fred, e),
        };

        for (id, slot) in &set.slots {
            if let Err(e) = slot {
                tracing::warn!(provider = %id, error = %e, "provider disabled for this run");
            }
        }
        set
    }

    pub fn get(&self, id: ProviderId) -> Result<&dyn SeriesProvider, DataError> {
        match self.slots.get(&id) {
            Some(Ok(p)) => Ok(p.as_ref()),
            Some(Err(e)) => Err(e.clone()),
            None => Err(DataError::ProviderUnavailable {
                provider: id,
                reason: "no client registered".into(),
            }),
        }
    }
}

/// Fetch-and-combine pipeline with a shared TTL cache.
pub struct Pipeline {
    providers: ProviderSet,
    cache: SeriesCache,
}

impl Pipeline {
    pub fn new(providers: ProviderSet, cache_ttl: Duration) -> Self {
        Self {
            providers,
            cache: SeriesCache::new(cache_ttl),
        }
    }

    /// Providers from config, secrets from the process environment.
    pub fn from_config(config: &DashboardConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let providers = ProviderSet::from_config(config, |var| std::env::var(var).ok());
        Ok(Self::new(providers, config.cache_ttl()))
    }

    pub fn cache(&self) -> &SeriesCache {
        &self.cache
    }

    /// Fetch every request concurrently, then combine what succeeded.
    pub fn run(&self, requests: &[SourceRequest]) -> Result<PipelineRun, PipelineError> {
        let evicted = self.cache.purge_expired();
        if evicted > 0 {
            tracing::debug!(evicted, "purged expired cache entries");
        }

        // Barrier: collect() returns only once every fetch has finished.
        let results: Vec<(Option<Series>, SourceOutcome)> = requests
            .par_iter()
            .map(|request| self.fetch_one(request))
            .collect();

        let mut series = Vec::with_capacity(results.len());
        let mut sources = Vec::with_capacity(results.len());
        for (s, outcome) in results {
            series.extend(s);
            sources.push(outcome);
        }

        let ok = sources.iter().filter(|s| s.status.is_ok()).count();
        tracing::info!(
            requested = requests.len(),
            ok,
            failed = requests.len() - ok,
            "fetch phase complete"
        );

        if series.is_empty() {
            return Err(PipelineError::NoData { sources });
        }

        match combine(&series) {
            Ok(table) => Ok(PipelineRun { table, sources }),
            Err(DataError::NoDataAvailable) => Err(PipelineError::NoData { sources }),
            Err(e) => Err(e.into()),
        }
    }

    fn fetch_one(&self, request: &SourceRequest) -> (Option<Series>, SourceOutcome) {
        let key = request.cache_key();
        if let Some(cached) = self.cache.get(&key) {
            tracing::debug!(source = %request, "cache hit");
            let series = cached.renamed(request.name());
            let status = SourceStatus::Cached {
                points: series.len(),
            };
            return (
                Some(series),
                SourceOutcome {
                    request: request.clone(),
                    status,
                },
            );
        }

        let result = self
            .providers
            .get(request.provider())
            .and_then(|p| p.fetch(request));

        match result {
            Ok(series) => {
                let status = SourceStatus::Fetched {
                    points: series.len(),
                };
                self.cache.insert(key, series.clone());
                (
                    Some(series),
                    SourceOutcome {
                        request: request.clone(),
                        status,
                    },
                )
            }
            Err(e) => {
                let attempts = match &e {
                    DataError::FetchTimeout { attempts, .. } => *attempts,
                    _ => 1,
                };
                tracing::warn!(
                    provider = %request.provider(),
                    instrument = request.id(),
                    kind = %e.kind(),
                    attempts,
                    error = %e,
                    "source failed, excluding from table"
                );
                (
                    None,
                    SourceOutcome {
                        request: request.clone(),
                        status: SourceStatus::Failed {
                            kind: e.kind(),
                            message: e.to_string(),
                        },
                    },
                )
            }
        }
    }
}
