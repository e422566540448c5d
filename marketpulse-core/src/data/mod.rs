//! Providers, retry, time-zone normalization, caching and alignment.

pub mod align;
pub mod cache;
pub mod coingecko;
pub mod fred;
pub(crate) mod http;
pub mod provider;
pub mod retry;
pub mod timezone;
pub mod yahoo;

pub use align::{combine, fill_forward_then_backward};
pub use cache::{SeriesCache, TtlCache, DEFAULT_TTL};
pub use coingecko::CoinGeckoProvider;
pub use fred::FredProvider;
pub use provider::{DataError, ErrorKind, SeriesProvider};
pub use retry::{run_with_retry, Attempt, CancelToken, RetryPolicy};
pub use timezone::{normalize_local_index, resolve_local, NormalizeStats, Resolution};
pub use yahoo::YahooProvider;
