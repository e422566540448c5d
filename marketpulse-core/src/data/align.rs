//! Multi-series time alignment.
//!
//! Given independently fetched series, build one table on a common daily
//! timeline:
//! 1. bucket every series to UTC calendar days (last observation of a day wins)
//! 2. take every calendar day from the earliest to the latest observed day
//!    across all series, so monthly and quarterly indicators sit on the same
//!    daily axis as prices
//! 3. fill each column forward, then fill whatever is still empty at the head
//!    of the column backward from its first value

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashSet};

use super::provider::DataError;
use crate::domain::{CombinedTable, Series, TableColumn};

/// Combine series into a gap-filled daily table.
///
/// Series that failed to fetch must already be excluded. Empty series are
/// skipped with a warning, and when two series share a name the first one is
/// kept. Fails with [`DataError::NoDataAvailable`] when nothing usable is left.
pub fn combine(series: &[Series]) -> Result<CombinedTable, DataError> {
    let mut seen = HashSet::new();
    let mut columns: Vec<(&str, BTreeMap<NaiveDate, f64>)> = Vec::with_capacity(series.len());

    for s in series {
        if s.is_empty() {
            tracing::warn!(series = s.name(), "excluding empty series from combined table");
            continue;
        }
        if !seen.insert(s.name()) {
            tracing::warn!(series = s.name(), "duplicate series name, keeping the first");
            continue;
        }
        columns.push((s.name(), s.daily_last()));
    }

    let first = columns
        .iter()
        .filter_map(|(_, daily)| daily.keys().next().copied())
        .min();
    let last = columns
        .iter()
        .filter_map(|(_, daily)| daily.keys().next_back().copied())
        .max();
    let (Some(first), Some(last)) = (first, last) else {
        return Err(DataError::NoDataAvailable);
    };

    let dates: Vec<NaiveDate> = first.iter_days().take_while(|d| *d <= last).collect();

    let table_columns = columns
        .into_iter()
        .map(|(name, daily)| {
            let mut values: Vec<Option<f64>> =
                dates.iter().map(|d| daily.get(d).copied()).collect();
            fill_forward_then_backward(&mut values);
            TableColumn {
                name: name.to_string(),
                values,
            }
        })
        .collect();

    tracing::debug!(
        rows = dates.len(),
        first = %first,
        last = %last,
        "combined table built"
    );

    CombinedTable::from_columns(dates, table_columns)
}

/// Fill gaps with the nearest earlier value; cells before the first value
/// take the first value. A column with no values stays empty.
pub fn fill_forward_then_backward(values: &mut [Option<f64>]) {
    let mut carry = None;
    for v in values.iter_mut() {
        match v {
            Some(x) => carry = Some(*x),
            None => *v = carry,
        }
    }

    if let Some(first) = values.iter().flatten().next().copied() {
        for v in values.iter_mut().take_while(|v| v.is_none()) {
            *v = Some(first);
        }
    }
}
