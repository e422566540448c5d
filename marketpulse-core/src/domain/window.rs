//! Lookback window: the single user-facing parameter of a dashboard run.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("lookback window must be between {min} and {max} days, got {days}")]
pub struct WindowError {
    pub days: u32,
    pub min: u32,
    pub max: u32,
}

/// Number of calendar days to look back from "now", in `[7, 365]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct LookbackWindow(u32);

impl LookbackWindow {
    pub const MIN_DAYS: u32 = 7;
    pub const MAX_DAYS: u32 = 365;
    pub const DEFAULT_DAYS: u32 = 30;

    pub fn new(days: u32) -> Result<Self, WindowError> {
        if !(Self::MIN_DAYS..=Self::MAX_DAYS).contains(&days) {
            return Err(WindowError {
                days,
                min: Self::MIN_DAYS,
                max: Self::MAX_DAYS,
            });
        }
        Ok(Self(days))
    }

    pub fn days(&self) -> u32 {
        self.0
    }

    /// `(start, end)` instants ending at `now`.
    pub fn bounds(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        (now - Duration::days(i64::from(self.0)), now)
    }
}

impl Default for LookbackWindow {
    fn default() -> Self {
        Self(Self::DEFAULT_DAYS)
    }
}

impl TryFrom<u32> for LookbackWindow {
    type Error = WindowError;

    fn try_from(days: u32) -> Result<Self, Self::Error> {
        Self::new(days)
    }
}

impl From<LookbackWindow> for u32 {
    fn from(w: LookbackWindow) -> u32 {
        w.0
    }
}
