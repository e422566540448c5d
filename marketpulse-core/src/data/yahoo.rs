//! Yahoo Finance data provider (equities, indices, FX).
//!
//! Fetches daily closes from Yahoo's v8 chart API, one request per symbol.
//! A symbol Yahoo does not know is `SymbolNotFound`; a known symbol with no
//! closes in the window is `EmptyRange`.
//!
//! Yahoo Finance has no official API and is subject to unannounced format
//! changes; parse failures surface as `ResponseFormatChanged`.

use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use reqwest::Url;
use serde::Deserialize;

use super::http;
use super::provider::{DataError, SeriesProvider};
use crate::domain::{Observation, ProviderId, Series, SourceRequest};

pub const DEFAULT_BASE_URL: &str = "https://query2.finance.yahoo.com";

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    /// Exchange offset from UTC in seconds.
    gmtoffset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    close: Vec<Option<f64>>,
}

/// Yahoo Finance data provider.
pub struct YahooProvider {
    client: Client,
    base_url: Url,
}

impl YahooProvider {
    pub fn new(base_url: &str) -> Result<Self, DataError> {
        Ok(Self {
            client: http::build_client(ProviderId::Yahoo, None)?,
            base_url: http::parse_base_url(ProviderId::Yahoo, base_url)?,
        })
    }

    /// Build the chart API URL for a symbol and date range.
    fn chart_url(&self, symbol: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Url {
        let mut url = http::join_segments(&self.base_url, &["v8", "finance", "chart", symbol]);
        url.query_pairs_mut()
            .append_pair("period1", &start.timestamp().to_string())
            .append_pair("period2", &end.timestamp().to_string())
            .append_pair("interval", "1d");
        url
    }

    /// Parse the chart API response into daily close observations.
    ///
    /// Bar timestamps mark the session open in UTC; shifting by the exchange
    /// offset before taking the date keeps FX bars (which open late evening
    /// UTC) on their trading day.
    fn parse_response(symbol: &str, resp: ChartResponse) -> Result<Vec<Observation>, DataError> {
        let result = resp.chart.result.ok_or_else(|| {
            if let Some(err) = resp.chart.error {
                if err.code == "Not Found" {
                    DataError::SymbolNotFound {
                        symbol: symbol.to_string(),
                    }
                } else {
                    DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
                }
            } else {
                DataError::ResponseFormatChanged("empty result with no error".into())
            }
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))?;

        let offset = data.meta.and_then(|m| m.gmtoffset).unwrap_or(0);

        let timestamps = data.timestamp.unwrap_or_default();

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

        let mut out = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            // Holidays and halted sessions come back as null closes.
            let Some(close) = quote.close.get(i).copied().flatten() else {
                continue;
            };
            let date = DateTime::from_timestamp(ts + offset, 0)
                .map(|dt| dt.date_naive())
                .ok_or_else(|| {
                    DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
                })?;
            out.push(Observation::at_date(date, close));
        }

        if out.is_empty() {
            return Err(DataError::EmptyRange {
                instrument: symbol.to_string(),
            });
        }

        Ok(out)
    }
}

impl SeriesProvider for YahooProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Yahoo
    }

    fn fetch(&self, request: &SourceRequest) -> Result<Series, DataError> {
        let symbol = request.id();
        let label = request.to_string();
        let url = self.chart_url(symbol, request.start(), request.end());

        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| http::map_send_error(&label, e))?;
        let resp = http::check_status(ProviderId::Yahoo, symbol, resp)?;
        let chart: ChartResponse = resp.json().map_err(|e| {
            DataError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
        })?;

        let points = Self::parse_response(symbol, chart)?;
        tracing::debug!(provider = "yahoo", symbol, points = points.len(), "fetched");
        Ok(Series::from_unordered(request.name(), points))
    }
}
