//! Domain types for marketpulse

pub mod request;
pub mod series;
pub mod table;
pub mod window;

pub use request::{CacheKey, Instrument, ProviderId, SourceRequest};
pub use series::{Observation, Series};
pub use table::{CombinedTable, TableColumn};
pub use window::{LookbackWindow, WindowError};
