//! Named, UTC-indexed observation sequences.
//!
//! Every timestamp is a `DateTime<Utc>`, so a naive or offset-less instant
//! cannot be represented here. Providers that hand back local wall-clock
//! times go through [`crate::data::timezone`] before a `Series` is built.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::data::DataError;

/// A single observation at a UTC instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl Observation {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }

    /// Observation stamped at UTC midnight of `date`.
    pub fn at_date(date: NaiveDate, value: f64) -> Self {
        Self {
            timestamp: date.and_time(chrono::NaiveTime::MIN).and_utc(),
            value,
        }
    }
}

/// A named, strictly increasing sequence of observations.
///
/// Immutable once built. Cached copies are shared between runs, so there are
/// no mutating accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    name: String,
    points: Vec<Observation>,
}

impl Series {
    /// Build a series, rejecting out-of-order or duplicate timestamps and
    /// non-finite values.
    pub fn new(name: impl Into<String>, points: Vec<Observation>) -> Result<Self, DataError> {
        let name = name.into();
        for pair in points.windows(2) {
            if pair[1].timestamp <= pair[0].timestamp {
                return Err(DataError::InvalidSeries(format!(
                    "'{name}': timestamps not strictly increasing at {}",
                    pair[1].timestamp
                )));
            }
        }
        if let Some(bad) = points.iter().find(|p| !p.value.is_finite()) {
            return Err(DataError::InvalidSeries(format!(
                "'{name}': non-finite value at {}",
                bad.timestamp
            )));
        }
        Ok(Self { name, points })
    }

    /// Build a series from provider output in arbitrary order.
    ///
    /// Sorts by timestamp, drops non-finite values, and keeps the last
    /// observation when a timestamp repeats.
    pub fn from_unordered(name: impl Into<String>, mut points: Vec<Observation>) -> Self {
        points.retain(|p| p.value.is_finite());
        // Stable sort keeps provider order among equal timestamps.
        points.sort_by_key(|p| p.timestamp);
        let mut deduped: Vec<Observation> = Vec::with_capacity(points.len());
        for p in points {
            match deduped.last_mut() {
                Some(last) if last.timestamp == p.timestamp => *last = p,
                _ => deduped.push(p),
            }
        }
        Self {
            name: name.into(),
            points: deduped,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn points(&self) -> &[Observation] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&Observation> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&Observation> {
        self.points.last()
    }

    /// Same observations under a different display name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            points: self.points.clone(),
        }
    }

    /// Bucket observations by UTC calendar day; the last observation of a day wins.
    pub fn daily_last(&self) -> BTreeMap<NaiveDate, f64> {
        let mut by_day = BTreeMap::new();
        for p in &self.points {
            by_day.insert(p.timestamp.date_naive(), p.value);
        }
        by_day
    }
}
