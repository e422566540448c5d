//! MarketPulse Core: series types, providers, bounded retry, alignment.
//!
//! This crate holds everything between the upstream HTTP APIs and the
//! combined daily table:
//! - Domain types (observations, series, requests, lookback window, table)
//! - Provider clients for Yahoo Finance, CoinGecko and FRED
//! - Bounded-retry wrapper with per-attempt timeouts and jittered backoff
//! - DST-aware coercion of local timestamps onto a UTC index
//! - In-memory TTL cache
//! - Outer-join / daily resample / fill combiner

pub mod data;
pub mod domain;
