//! CoinGecko data provider (cryptocurrency prices).
//!
//! CoinGecko's public API is prone to hanging rather than failing fast, so
//! every request runs under [`run_with_retry`]. Each attempt sets its HTTP
//! deadline slightly past the attempt timeout: the wrapper gives up first,
//! and the abandoned worker unwinds on its own shortly after.

use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;

use super::http;
use super::provider::{DataError, SeriesProvider};
use super::retry::{run_with_retry, Attempt, RetryPolicy};
use crate::domain::{Observation, ProviderId, Series, SourceRequest};

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// Extra time the HTTP layer allows past the wrapper's deadline.
const DEADLINE_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Deserialize)]
struct MarketChartRange {
    prices: Vec<[f64; 2]>,
}

/// CoinGecko `market_chart/range` provider.
pub struct CoinGeckoProvider {
    client: Client,
    base_url: Url,
    vs_currency: String,
    api_key: Option<String>,
    retry: RetryPolicy,
}

impl CoinGeckoProvider {
    pub fn new(
        base_url: &str,
        vs_currency: impl Into<String>,
        api_key: Option<String>,
        retry: RetryPolicy,
    ) -> Result<Self, DataError> {
        Ok(Self {
            client: http::build_client(ProviderId::CoinGecko, None)?,
            base_url: http::parse_base_url(ProviderId::CoinGecko, base_url)?,
            vs_currency: vs_currency.into(),
            api_key,
            retry,
        })
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// `/coins/{id}/market_chart/range?vs_currency=..&from=..&to=..` with
    /// epoch-second bounds.
    fn range_url(&self, coin_id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Url {
        let mut url =
            http::join_segments(&self.base_url, &["coins", coin_id, "market_chart", "range"]);
        url.query_pairs_mut()
            .append_pair("vs_currency", &self.vs_currency)
            .append_pair("from", &start.timestamp().to_string())
            .append_pair("to", &end.timestamp().to_string());
        url
    }

    /// Convert `[epoch_ms, price]` pairs to UTC observations.
    fn parse_prices(coin_id: &str, body: MarketChartRange) -> Result<Vec<Observation>, DataError> {
        let mut out = Vec::with_capacity(body.prices.len());
        for [ms, price] in body.prices {
            let ts = DateTime::from_timestamp_millis(ms as i64).ok_or_else(|| {
                DataError::ResponseFormatChanged(format!("invalid timestamp {ms} for {coin_id}"))
            })?;
            out.push(Observation::new(ts, price));
        }
        if out.is_empty() {
            return Err(DataError::EmptyRange {
                instrument: coin_id.to_string(),
            });
        }
        Ok(out)
    }
}

/// One HTTP round trip, bounded by the attempt's deadline.
fn fetch_once(
    client: &Client,
    url: &Url,
    api_key: Option<&str>,
    coin_id: &str,
    label: &str,
    attempt: &Attempt,
) -> Result<Vec<Observation>, DataError> {
    let mut req = client
        .get(url.clone())
        .timeout(attempt.timeout.saturating_add(DEADLINE_GRACE));
    if let Some(key) = api_key {
        req = req.header("x-cg-demo-api-key", key);
    }

    let resp = req.send().map_err(|e| http::map_send_error(label, e))?;
    if attempt.cancel.is_cancelled() {
        // Nobody is waiting for this body any more.
        return Err(DataError::FetchTimeout {
            label: label.to_string(),
            attempts: attempt.index + 1,
        });
    }
    let resp = http::check_status(ProviderId::CoinGecko, coin_id, resp)?;
    let body: MarketChartRange = resp.json().map_err(|e| http::map_send_error(label, e))?;
    CoinGeckoProvider::parse_prices(coin_id, body)
}

impl SeriesProvider for CoinGeckoProvider {
    fn id(&self) -> ProviderId {
        ProviderId::CoinGecko
    }

    fn fetch(&self, request: &SourceRequest) -> Result<Series, DataError> {
        let coin_id = request.id().to_string();
        let label = request.to_string();
        let url = self.range_url(&coin_id, request.start(), request.end());
        let client = self.client.clone();
        let api_key = self.api_key.clone();

        let attempt_label = label.clone();
        let points = run_with_retry(&self.retry, &label, move |attempt| {
            fetch_once(
                &client,
                &url,
                api_key.as_deref(),
                &coin_id,
                &attempt_label,
                attempt,
            )
        })?;

        tracing::debug!(provider = "coingecko", coin = request.id(), points = points.len(), "fetched");
        Ok(Series::from_unordered(request.name(), points))
    }
}
