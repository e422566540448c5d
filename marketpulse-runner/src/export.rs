//! Export of the combined table and the report.
//!
//! Three formats:
//! - **CSV**: `date` followed by one column per series, empty cells for gaps
//! - **Parquet**: the same layout through Polars, with a typed `date` column
//! - **JSON**: the full [`DashboardReport`]

use std::fs::File;
use std::path::Path;

use anyhow::{bail, Context, Result};
use polars::prelude::{ParquetReader, ParquetWriter, SerReader};

use marketpulse_core::domain::CombinedTable;

use crate::report::{DashboardReport, SCHEMA_VERSION};

/// Output format, picked from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Parquet,
    Json,
}

impl ExportFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("csv") => Ok(Self::Csv),
            Some("parquet") => Ok(Self::Parquet),
            Some("json") => Ok(Self::Json),
            other => bail!(
                "unsupported export extension {:?} for {} (use .csv, .parquet or .json)",
                other.unwrap_or(""),
                path.display()
            ),
        }
    }
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Render the table as CSV.
pub fn table_to_csv(table: &CombinedTable) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = vec!["date"];
    header.extend(table.column_names());
    wtr.write_record(&header)?;

    for (row, date) in table.dates().iter().enumerate() {
        let mut record = Vec::with_capacity(table.width() + 1);
        record.push(date.to_string());
        for c in table.columns() {
            record.push(c.values[row].map(|v| format!("{v:.6}")).unwrap_or_default());
        }
        wtr.write_record(&record)?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── JSON export ────────────────────────────────────────────────────

pub fn report_to_json(report: &DashboardReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize DashboardReport to JSON")
}

/// Deserialize a report, rejecting schema versions newer than this build.
pub fn report_from_json(json: &str) -> Result<DashboardReport> {
    let report: DashboardReport =
        serde_json::from_str(json).context("failed to deserialize DashboardReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── Parquet export ─────────────────────────────────────────────────

pub fn write_parquet(table: &CombinedTable, path: &Path) -> Result<()> {
    let mut df = table.to_dataframe()?;
    let file = File::create(path)
        .with_context(|| format!("failed to create parquet file: {}", path.display()))?;
    ParquetWriter::new(file)
        .finish(&mut df)
        .with_context(|| format!("failed to write parquet: {}", path.display()))?;
    Ok(())
}

/// Row and column count of a parquet file written by [`write_parquet`].
pub fn parquet_shape(path: &Path) -> Result<(usize, usize)> {
    let file = File::open(path)
        .with_context(|| format!("failed to open parquet file: {}", path.display()))?;
    let df = ParquetReader::new(file)
        .finish()
        .with_context(|| format!("failed to read parquet: {}", path.display()))?;
    Ok(df.shape())
}

// ─── Dispatch ───────────────────────────────────────────────────────

/// Write the table (CSV, Parquet) or the report (JSON) to `path`.
pub fn export(table: &CombinedTable, report: &DashboardReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create export dir: {}", parent.display()))?;
    }
    match ExportFormat::from_path(path)? {
        ExportFormat::Csv => {
            let csv = table_to_csv(table)?;
            std::fs::write(path, csv)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
        ExportFormat::Parquet => write_parquet(table, path)?,
        ExportFormat::Json => {
            let json = report_to_json(report)?;
            std::fs::write(path, json)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
    }
    tracing::info!(path = %path.display(), "exported");
    Ok(())
}
