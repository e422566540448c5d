//! Derived statistics over the combined table. All pure functions.
//!
//! Conventions:
//! - percentage change is a fraction (`0.01` = 1%), the first cell is empty
//! - correlation uses pairwise-complete observations
//! - volatility is the sample standard deviation (n-1) of daily changes over a
//!   full window, annualized with √252 and expressed in percent

use serde::{Deserialize, Serialize};

use marketpulse_core::domain::{CombinedTable, TableColumn};

/// Trading days per year used to annualize daily volatility.
pub const TRADING_DAYS: f64 = 252.0;

/// Default rolling volatility window, in rows.
pub const DEFAULT_VOL_WINDOW: usize = 30;

/// Latest value and change over the window for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyMetric {
    pub name: String,
    pub latest: Option<f64>,
    /// `(last - first) / first * 100`; empty when the first value is zero.
    pub change_pct: Option<f64>,
}

/// Symmetric correlation matrix in column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub names: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.names.iter().position(|n| n == a)?;
        let j = self.names.iter().position(|n| n == b)?;
        self.values[i][j]
    }
}

/// Latest level of a column rebased to 100 at the first row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedReading {
    pub name: String,
    pub level: Option<f64>,
}

/// Most recent annualized volatility reading for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolatilityReading {
    pub name: String,
    pub annualized_pct: Option<f64>,
}

// ─── Per-column functions ───────────────────────────────────────────

/// Period-over-period change as a fraction. Undefined where either side is
/// missing or the previous value is zero.
pub fn pct_change(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    if values.is_empty() {
        return out;
    }
    out.push(None);
    for w in values.windows(2) {
        out.push(match (w[0], w[1]) {
            (Some(prev), Some(cur)) if prev != 0.0 => Some(cur / prev - 1.0),
            _ => None,
        });
    }
    out
}

/// Rebase a column so its first value is 100.
pub fn normalize(values: &[Option<f64>]) -> Vec<Option<f64>> {
    match values.first().copied().flatten() {
        Some(base) if base != 0.0 => values.iter().map(|v| v.map(|x| x / base * 100.0)).collect(),
        _ => vec![None; values.len()],
    }
}

/// Sample standard deviation (n-1). Needs at least two values.
fn sample_std(xs: &[f64]) -> Option<f64> {
    if xs.len() < 2 {
        return None;
    }
    let n = xs.len() as f64;
    let mean = xs.iter().sum::<f64>() / n;
    let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(var.sqrt())
}

/// Rolling annualized volatility (percent) of the column's daily changes.
///
/// A row has a reading only when the `window` changes ending there are all
/// defined.
pub fn rolling_volatility(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let changes = pct_change(values);
    let mut out = vec![None; changes.len()];
    if window < 2 {
        return out;
    }
    for end in window..=changes.len() {
        let slice = &changes[end - window..end];
        let xs: Option<Vec<f64>> = slice.iter().copied().collect();
        out[end - 1] = xs
            .as_deref()
            .and_then(sample_std)
            .map(|s| s * TRADING_DAYS.sqrt() * 100.0);
    }
    out
}

/// Pearson correlation over the rows where both inputs are defined.
pub fn pearson(a: &[Option<f64>], b: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}

// ─── Table-level functions ──────────────────────────────────────────

pub fn key_metrics(table: &CombinedTable) -> Vec<KeyMetric> {
    table
        .columns()
        .iter()
        .map(|c| {
            let first = c.values.iter().flatten().next().copied();
            let latest = c.values.iter().rev().flatten().next().copied();
            let change_pct = match (first, latest) {
                (Some(f), Some(l)) if f != 0.0 => Some((l - f) / f * 100.0),
                _ => None,
            };
            KeyMetric {
                name: c.name.clone(),
                latest,
                change_pct,
            }
        })
        .collect()
}

/// Correlation of daily percentage changes between every pair of columns.
pub fn correlation_matrix(table: &CombinedTable) -> CorrelationMatrix {
    let changes: Vec<Vec<Option<f64>>> =
        table.columns().iter().map(|c| pct_change(&c.values)).collect();
    let values = changes
        .iter()
        .map(|a| changes.iter().map(|b| pearson(a, b)).collect())
        .collect();
    CorrelationMatrix {
        names: table.columns().iter().map(|c| c.name.clone()).collect(),
        values,
    }
}

/// Every column rebased to 100 at the first row.
pub fn normalized_columns(table: &CombinedTable) -> Vec<TableColumn> {
    table
        .columns()
        .iter()
        .map(|c| TableColumn {
            name: c.name.clone(),
            values: normalize(&c.values),
        })
        .collect()
}

/// Where every column ends up when all start at 100.
pub fn latest_normalized(table: &CombinedTable) -> Vec<NormalizedReading> {
    normalized_columns(table)
        .into_iter()
        .map(|c| NormalizedReading {
            level: c.values.iter().rev().flatten().next().copied(),
            name: c.name,
        })
        .collect()
}

/// The last defined rolling volatility reading per column.
pub fn latest_volatility(table: &CombinedTable, window: usize) -> Vec<VolatilityReading> {
    table
        .columns()
        .iter()
        .map(|c| VolatilityReading {
            name: c.name.clone(),
            annualized_pct: rolling_volatility(&c.values, window)
                .into_iter()
                .rev()
                .flatten()
                .next(),
        })
        .collect()
}
