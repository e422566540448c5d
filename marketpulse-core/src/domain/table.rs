//! The combined, date-indexed table handed to the presentation layer.

use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::data::DataError;

/// One named column of the combined table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableColumn {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

/// Rows are UTC calendar dates (ascending, no gaps), columns are series.
///
/// Built once by [`crate::data::align::combine`] and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedTable {
    dates: Vec<NaiveDate>,
    columns: Vec<TableColumn>,
}

impl CombinedTable {
    /// Assemble a table from parts, checking shape and date ordering.
    pub fn from_columns(
        dates: Vec<NaiveDate>,
        columns: Vec<TableColumn>,
    ) -> Result<Self, DataError> {
        if dates.windows(2).any(|w| w[1] <= w[0]) {
            return Err(DataError::InvalidSeries(
                "table dates must be strictly increasing".into(),
            ));
        }
        if let Some(col) = columns.iter().find(|c| c.values.len() != dates.len()) {
            return Err(DataError::InvalidSeries(format!(
                "column '{}' has {} values for {} dates",
                col.name,
                col.values.len(),
                dates.len()
            )));
        }
        Ok(Self { dates, columns })
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn columns(&self) -> &[TableColumn] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.dates.len()
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    fn row_index(&self, date: NaiveDate) -> Option<usize> {
        self.dates.binary_search(&date).ok()
    }

    /// Cell value; `None` if the date, the column, or the value is missing.
    pub fn get(&self, date: NaiveDate, name: &str) -> Option<f64> {
        let i = self.row_index(date)?;
        self.column(name)?[i]
    }

    /// All cells of one row keyed by column name.
    pub fn row(&self, date: NaiveDate) -> Option<BTreeMap<&str, Option<f64>>> {
        let i = self.row_index(date)?;
        Some(
            self.columns
                .iter()
                .map(|c| (c.name.as_str(), c.values[i]))
                .collect(),
        )
    }

    /// True when no cell is empty.
    pub fn is_fully_populated(&self) -> bool {
        self.columns
            .iter()
            .all(|c| c.values.iter().all(Option::is_some))
    }

    /// BLAKE3 hash over dates, column names, and cell bits.
    pub fn content_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for d in &self.dates {
            hasher.update(d.to_string().as_bytes());
        }
        for c in &self.columns {
            hasher.update(c.name.as_bytes());
            for v in &c.values {
                match v {
                    Some(x) => hasher.update(&x.to_bits().to_le_bytes()),
                    None => hasher.update(&[0xff]),
                };
            }
        }
        hasher.finalize().to_hex().to_string()
    }

    /// Convert to a Polars DataFrame with a `date` column followed by one
    /// nullable `f64` column per series.
    pub fn to_dataframe(&self) -> Result<DataFrame, DataError> {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)
            .ok_or_else(|| DataError::Other("invalid epoch".into()))?;
        let days: Vec<i32> = self
            .dates
            .iter()
            .map(|d| (*d - epoch).num_days() as i32)
            .collect();

        let mut cols = Vec::with_capacity(self.columns.len() + 1);
        cols.push(
            Column::new("date".into(), days)
                .cast(&DataType::Date)
                .map_err(|e| DataError::Other(format!("date cast: {e}")))?,
        );
        for c in &self.columns {
            cols.push(Column::new(c.name.as_str().into(), c.values.clone()));
        }

        DataFrame::new(cols).map_err(|e| DataError::Other(format!("dataframe creation: {e}")))
    }
}
