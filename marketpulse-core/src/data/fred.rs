//! FRED data provider (macroeconomic indicators).
//!
//! FRED reports observations as bare calendar dates. They are read as local
//! midnight in the configured provider time zone and pushed through
//! [`normalize_local_index`], which applies the DST policy and yields a clean
//! UTC index.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use reqwest::blocking::Client;
use reqwest::{StatusCode, Url};
use serde::Deserialize;

use super::http;
use super::provider::{DataError, SeriesProvider};
use super::timezone::normalize_local_index;
use crate::domain::{ProviderId, Series, SourceRequest};

pub const DEFAULT_BASE_URL: &str = "https://api.stlouisfed.org/fred";

/// FRED encodes a missing observation as a lone dot.
const MISSING_VALUE: &str = ".";

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    observations: Vec<RawObservation>,
}

#[derive(Debug, Deserialize)]
struct RawObservation {
    date: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct FredErrorBody {
    error_message: String,
}

/// FRED `series/observations` provider.
pub struct FredProvider {
    client: Client,
    base_url: Url,
    api_key: String,
    timezone: Tz,
}

impl std::fmt::Debug for FredProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FredProvider")
            .field("base_url", &self.base_url.as_str())
            .field("timezone", &self.timezone)
            .finish_non_exhaustive()
    }
}

impl FredProvider {
    /// An empty key is rejected up front rather than on the first request.
    pub fn new(base_url: &str, api_key: impl Into<String>, timezone: Tz) -> Result<Self, DataError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(DataError::Configuration {
                key: "fred.api_key".into(),
                hint: "FRED requires an API key; register at fred.stlouisfed.org".into(),
            });
        }
        Ok(Self {
            client: http::build_client(ProviderId::Fred, None)?,
            base_url: http::parse_base_url(ProviderId::Fred, base_url)?,
            api_key,
            timezone,
        })
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    fn observations_url(&self, series_id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Url {
        let mut url = http::join_segments(&self.base_url, &["series", "observations"]);
        url.query_pairs_mut()
            .append_pair("series_id", series_id)
            .append_pair("api_key", &self.api_key)
            .append_pair("file_type", "json")
            .append_pair("observation_start", &start.date_naive().to_string())
            .append_pair("observation_end", &end.date_naive().to_string());
        url
    }

    /// Turn raw observations into `(local midnight, value)` pairs, dropping
    /// missing markers.
    fn parse_observations(
        series_id: &str,
        body: ObservationsResponse,
    ) -> Result<Vec<(NaiveDateTime, f64)>, DataError> {
        let mut out = Vec::with_capacity(body.observations.len());
        for obs in body.observations {
            if obs.value.trim() == MISSING_VALUE {
                continue;
            }
            let date = NaiveDate::parse_from_str(&obs.date, "%Y-%m-%d").map_err(|e| {
                DataError::ResponseFormatChanged(format!(
                    "bad observation date '{}' for {series_id}: {e}",
                    obs.date
                ))
            })?;
            let value: f64 = obs.value.trim().parse().map_err(|e| {
                DataError::ResponseFormatChanged(format!(
                    "bad observation value '{}' for {series_id}: {e}",
                    obs.value
                ))
            })?;
            out.push((date.and_time(NaiveTime::MIN), value));
        }
        Ok(out)
    }

    /// FRED answers unknown series ids with a 400 and a JSON error message.
    fn map_bad_request(series_id: &str, body: &str) -> DataError {
        let message = serde_json::from_str::<FredErrorBody>(body)
            .map(|b| b.error_message)
            .unwrap_or_else(|_| body.to_string());
        if message.contains("does not exist") {
            DataError::SymbolNotFound {
                symbol: series_id.to_string(),
            }
        } else {
            DataError::Http {
                provider: ProviderId::Fred,
                status: StatusCode::BAD_REQUEST.as_u16(),
            }
        }
    }
}

impl SeriesProvider for FredProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Fred
    }

    fn fetch(&self, request: &SourceRequest) -> Result<Series, DataError> {
        let series_id = request.id();
        let label = request.to_string();
        let url = self.observations_url(series_id, request.start(), request.end());

        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| http::map_send_error(&label, e))?;
        if resp.status() == StatusCode::BAD_REQUEST {
            let body = resp.text().unwrap_or_default();
            return Err(Self::map_bad_request(series_id, &body));
        }
        let resp = http::check_status(ProviderId::Fred, series_id, resp)?;
        let body: ObservationsResponse = resp
            .json()
            .map_err(|e| http::map_send_error(&label, e))?;

        let local = Self::parse_observations(series_id, body)?;
        let (points, stats) = normalize_local_index(&self.timezone, local);
        if stats.shifted + stats.dropped_ambiguous + stats.dropped_unresolvable > 0 {
            tracing::info!(
                provider = "fred",
                series = series_id,
                shifted = stats.shifted,
                dropped_ambiguous = stats.dropped_ambiguous,
                dropped_unresolvable = stats.dropped_unresolvable,
                "normalized local timestamps across DST transition"
            );
        }
        if points.is_empty() {
            return Err(DataError::EmptyRange {
                instrument: series_id.to_string(),
            });
        }

        tracing::debug!(provider = "fred", series = series_id, points = points.len(), "fetched");
        Series::new(request.name(), points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn body(json: &str) -> ObservationsResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn missing_marker_is_dropped() {
        let parsed = FredProvider::parse_observations(
            "UNRATE",
            body(
                r#"{"observations":[
                    {"realtime_start":"2024-02-01","realtime_end":"2024-02-01","date":"2023-12-01","value":"3.7"},
                    {"realtime_start":"2024-02-01","realtime_end":"2024-02-01","date":"2024-01-01","value":"."}
                ]}"#,
            ),
        )
        .unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].1, 3.7);
        assert_eq!(
            parsed[0].0,
            NaiveDate::from_ymd_opt(2023, 12, 1).unwrap().and_time(NaiveTime::MIN)
        );
    }

    #[test]
    fn garbage_value_is_format_change() {
        let err = FredProvider::parse_observations(
            "UNRATE",
            body(r#"{"observations":[{"date":"2024-01-01","value":"n/a"}]}"#),
        )
        .unwrap_err();
        assert!(matches!(err, DataError::ResponseFormatChanged(_)));
    }

    #[test]
    fn local_midnight_lands_on_utc_index() {
        let local = FredProvider::parse_observations(
            "T10YIE",
            body(r#"{"observations":[{"date":"2024-01-02","value":"2.21"}]}"#),
        )
        .unwrap();
        let (points, _) = normalize_local_index(&chrono_tz::America::Chicago, local);
        // CST is UTC-6.
        assert_eq!(
            points[0].timestamp,
            Utc.with_ymd_and_hms(2024, 1, 2, 6, 0, 0).unwrap()
        );
    }

    #[test]
    fn unknown_series_is_not_found() {
        let err = FredProvider::map_bad_request(
            "NOPE",
            r#"{"error_code":400,"error_message":"Bad Request.  The series does not exist."}"#,
        );
        assert!(matches!(err, DataError::SymbolNotFound { .. }));
        let err = FredProvider::map_bad_request("UNRATE", "garbled");
        assert!(matches!(err, DataError::Http { status: 400, .. }));
    }

    #[test]
    fn empty_key_is_configuration_error() {
        let err = FredProvider::new(DEFAULT_BASE_URL, "  ", chrono_tz::UTC).unwrap_err();
        assert!(matches!(err, DataError::Configuration { .. }));
    }

    #[test]
    fn observations_url_carries_dates() {
        let p = FredProvider::new(DEFAULT_BASE_URL, "k3y", chrono_tz::UTC).unwrap();
        let url = p.observations_url(
            "UNRATE",
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 31, 12, 0, 0).unwrap(),
        );
        assert_eq!(
            url.as_str(),
            "https://api.stlouisfed.org/fred/series/observations?series_id=UNRATE\
             &api_key=k3y&file_type=json&observation_start=2024-01-01&observation_end=2024-01-31"
        );
    }
}
