//! Dashboard report: what a run fetched, what failed, and the derived
//! statistics, in a form that serializes to JSON or renders as text.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use marketpulse_core::data::ErrorKind;
use marketpulse_core::domain::{LookbackWindow, ProviderId};

use crate::pipeline::{PipelineRun, SourceStatus};
use crate::stats::{
    correlation_matrix, key_metrics, latest_normalized, latest_volatility, CorrelationMatrix,
    KeyMetric, NormalizedReading, VolatilityReading, DEFAULT_VOL_WINDOW,
};

/// Current schema version for serialized reports.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceState {
    Ok,
    Cached,
    Failed,
}

/// One line of the source status panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceReport {
    pub provider: ProviderId,
    pub instrument: String,
    pub name: String,
    pub state: SourceState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub generated_at: DateTime<Utc>,
    pub lookback_days: u32,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub rows: usize,
    /// BLAKE3 over the combined table.
    pub dataset_hash: String,
    pub sources: Vec<SourceReport>,
    pub metrics: Vec<KeyMetric>,
    /// Latest level per column with every column starting at 100.
    #[serde(default)]
    pub normalized: Vec<NormalizedReading>,
    pub correlation: CorrelationMatrix,
    pub volatility: Vec<VolatilityReading>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl DashboardReport {
    pub fn build(run: &PipelineRun, window: LookbackWindow, generated_at: DateTime<Utc>) -> Self {
        let table = &run.table;
        let dates = table.dates();
        let sources = run
            .sources
            .iter()
            .map(|s| {
                let (state, points, error_kind, error) = match &s.status {
                    SourceStatus::Fetched { points } => (SourceState::Ok, Some(*points), None, None),
                    SourceStatus::Cached { points } => {
                        (SourceState::Cached, Some(*points), None, None)
                    }
                    SourceStatus::Failed { kind, message } => {
                        (SourceState::Failed, None, Some(*kind), Some(message.clone()))
                    }
                };
                SourceReport {
                    provider: s.request.provider(),
                    instrument: s.request.id().to_string(),
                    name: s.request.name().to_string(),
                    state,
                    points,
                    error_kind,
                    error,
                }
            })
            .collect();

        Self {
            schema_version: SCHEMA_VERSION,
            generated_at,
            lookback_days: window.days(),
            // A combined table always has at least one row.
            first_date: dates.first().copied().unwrap_or_default(),
            last_date: dates.last().copied().unwrap_or_default(),
            rows: table.height(),
            dataset_hash: table.content_hash(),
            sources,
            metrics: key_metrics(table),
            normalized: latest_normalized(table),
            correlation: correlation_matrix(table),
            volatility: latest_volatility(table, DEFAULT_VOL_WINDOW),
        }
    }

    pub fn failed_count(&self) -> usize {
        self.sources
            .iter()
            .filter(|s| s.state == SourceState::Failed)
            .count()
    }

    /// Plain-text rendering for the terminal.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Market dashboard: {} to {} ({} days, {} rows)",
            self.first_date, self.last_date, self.lookback_days, self.rows
        );
        let _ = writeln!(
            out,
            "dataset {}",
            self.dataset_hash.get(..16).unwrap_or(&self.dataset_hash)
        );

        let _ = writeln!(out, "\nSources");
        for s in &self.sources {
            let detail = match (s.state, &s.error_kind, &s.error) {
                (SourceState::Failed, Some(kind), Some(msg)) => format!("FAILED [{kind}] {msg}"),
                (SourceState::Cached, ..) => format!("cached ({} pts)", s.points.unwrap_or(0)),
                _ => format!("ok ({} pts)", s.points.unwrap_or(0)),
            };
            let _ = writeln!(
                out,
                "  {:<10} {:<24} {:<18} {}",
                s.provider.as_str(),
                s.name,
                s.instrument,
                detail
            );
        }

        let _ = writeln!(out, "\nKey metrics");
        for m in &self.metrics {
            let _ = writeln!(
                out,
                "  {:<24} {:>14} {:>9}",
                m.name,
                fmt_opt(m.latest, 2),
                m.change_pct
                    .map(|c| format!("{c:+.2}%"))
                    .unwrap_or_else(|| "n/a".into())
            );
        }

        let _ = writeln!(out, "\nNormalized movement (start = 100)");
        for n in &self.normalized {
            let _ = writeln!(out, "  {:<24} {:>9}", n.name, fmt_opt(n.level, 2));
        }

        let _ = writeln!(out, "\nAnnualized volatility ({DEFAULT_VOL_WINDOW}d)");
        for v in &self.volatility {
            let _ = writeln!(
                out,
                "  {:<24} {:>9}",
                v.name,
                v.annualized_pct
                    .map(|x| format!("{x:.2}%"))
                    .unwrap_or_else(|| "n/a".into())
            );
        }

        let _ = writeln!(out, "\nCorrelation of daily changes");
        let width = 9;
        let _ = write!(out, "  {:<24}", "");
        for (j, _) in self.correlation.names.iter().enumerate() {
            let _ = write!(out, "{:>width$}", format!("[{j}]"));
        }
        let _ = writeln!(out);
        for (i, name) in self.correlation.names.iter().enumerate() {
            let _ = write!(out, "  {:<24}", format!("[{i}] {name}"));
            for v in &self.correlation.values[i] {
                let _ = write!(out, "{:>width$}", fmt_opt(*v, 2));
            }
            let _ = writeln!(out);
        }
        out
    }
}

fn fmt_opt(v: Option<f64>, decimals: usize) -> String {
    v.map(|x| format!("{x:.decimals$}"))
        .unwrap_or_else(|| "n/a".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::SourceOutcome;
    use chrono::TimeZone;
    use marketpulse_core::data::combine;
    use marketpulse_core::domain::{Instrument, Observation, Series, SourceRequest};

    fn run() -> PipelineRun {
        let d = |day| NaiveDate::from_ymd_opt(2024, 3, day).unwrap();
        let s = Series::new(
            "Bitcoin",
            vec![
                Observation::at_date(d(1), 61_000.0),
                Observation::at_date(d(2), 62_220.0),
            ],
        )
        .unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 8, 0, 0, 0).unwrap();
        let req = |p, name: &str, id: &str| {
            SourceRequest::new(p, Instrument::new(name, id), now - chrono::Duration::days(7), now)
        };
        PipelineRun {
            table: combine(&[s]).unwrap(),
            sources: vec![
                SourceOutcome {
                    request: req(ProviderId::CoinGecko, "Bitcoin", "bitcoin"),
                    status: SourceStatus::Fetched { points: 2 },
                },
                SourceOutcome {
                    request: req(ProviderId::Fred, "US Unemployment Rate", "UNRATE"),
                    status: SourceStatus::Failed {
                        kind: ErrorKind::ConfigurationError,
                        message: "missing configuration 'FRED_API_KEY'".into(),
                    },
                },
            ],
        }
    }

    fn report() -> DashboardReport {
        DashboardReport::build(
            &run(),
            LookbackWindow::new(7).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 8, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn build_collects_status_and_metrics() {
        let r = report();
        assert_eq!(r.rows, 2);
        assert_eq!(r.failed_count(), 1);
        assert_eq!(r.sources[0].state, SourceState::Ok);
        assert_eq!(r.sources[1].error_kind, Some(ErrorKind::ConfigurationError));
        assert!((r.metrics[0].change_pct.unwrap() - 2.0).abs() < 1e-9);
        assert_eq!(r.volatility[0].annualized_pct, None);
    }

    #[test]
    fn json_uses_snake_case_states() {
        let json = serde_json::to_string(&report()).unwrap();
        assert!(json.contains(r#""state":"failed""#));
        assert!(json.contains(r#""error_kind":"configuration_error""#));
        assert!(json.contains(r#""provider":"coingecko""#));
        let back: DashboardReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.schema_version, SCHEMA_VERSION);
        assert_eq!(back.sources, report().sources);
    }

    #[test]
    fn text_shows_normalized_movement() {
        let r = report();
        assert_eq!(r.normalized.len(), 1);
        assert!((r.normalized[0].level.unwrap() - 102.0).abs() < 1e-9);
        let text = r.render_text();
        assert!(text.contains("Normalized movement (start = 100)"));
        assert!(text.contains("102.00"));
    }

    #[test]
    fn short_or_non_ascii_hash_renders_without_panicking() {
        let mut r = report();
        r.dataset_hash = "é".repeat(12);
        assert!(r.render_text().contains(&format!("dataset {}", "é".repeat(12))));
        r.dataset_hash = "abc".into();
        assert!(r.render_text().contains("dataset abc\n"));
    }

    #[test]
    fn text_lists_failures() {
        let text = report().render_text();
        assert!(text.contains("2024-03-01 to 2024-03-02"));
        assert!(text.contains("FAILED [configuration_error]"));
        assert!(text.contains("+2.00%"));
    }
}
