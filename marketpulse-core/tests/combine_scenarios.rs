//! Scenario tests for the combiner on mixed-frequency, mixed-provider input.

use chrono::{NaiveDate, TimeZone, Utc};

use marketpulse_core::data::{combine, DataError};
use marketpulse_core::domain::{Observation, Series};

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
}

fn daily(name: &str, points: &[(u32, f64)]) -> Series {
    Series::new(
        name,
        points
            .iter()
            .map(|&(day, v)| Observation::at_date(d(day), v))
            .collect(),
    )
    .unwrap()
}

#[test]
fn equities_crypto_macro_scenario() {
    let equities = daily("Equities", &[(1, 100.0), (3, 102.0)]);
    let crypto = daily("Crypto", &[(1, 50_000.0), (2, 50_500.0), (3, 50_300.0)]);
    let macro_ = daily("Macro", &[(1, 3.5)]);

    let table = combine(&[equities, crypto, macro_]).unwrap();

    assert_eq!(table.dates(), &[d(1), d(2), d(3)]);
    assert_eq!(table.column_names(), vec!["Equities", "Crypto", "Macro"]);
    assert_eq!(table.get(d(2), "Equities"), Some(100.0));
    assert_eq!(table.get(d(3), "Equities"), Some(102.0));
    assert_eq!(table.get(d(2), "Crypto"), Some(50_500.0));
    assert_eq!(table.get(d(2), "Macro"), Some(3.5));
    assert_eq!(table.get(d(3), "Macro"), Some(3.5));
    assert!(table.is_fully_populated());
}

#[test]
fn intraday_crypto_buckets_to_last_of_day() {
    let crypto = Series::new(
        "Bitcoin",
        vec![
            Observation::new(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(), 61_000.0),
            Observation::new(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(), 62_000.0),
            Observation::new(Utc.with_ymd_and_hms(2024, 3, 1, 23, 0, 0).unwrap(), 62_500.0),
            Observation::new(Utc.with_ymd_and_hms(2024, 3, 2, 1, 0, 0).unwrap(), 62_100.0),
        ],
    )
    .unwrap();
    let table = combine(&[crypto]).unwrap();
    assert_eq!(table.height(), 2);
    assert_eq!(table.get(d(1), "Bitcoin"), Some(62_500.0));
    assert_eq!(table.get(d(2), "Bitcoin"), Some(62_100.0));
}

#[test]
fn late_starting_series_is_backfilled() {
    // A quarterly indicator first reported after the window opens.
    let gdp = daily("US GDP Growth", &[(15, 1.6)]);
    let fx = daily("EUR/USD", &[(4, 1.084), (5, 1.085), (18, 1.089)]);
    let table = combine(&[fx, gdp]).unwrap();

    assert_eq!(table.dates().first(), Some(&d(4)));
    assert_eq!(table.dates().last(), Some(&d(18)));
    assert_eq!(table.get(d(4), "US GDP Growth"), Some(1.6));
    assert_eq!(table.get(d(10), "EUR/USD"), Some(1.085));
}

#[test]
fn nothing_fetched_is_no_data() {
    assert!(matches!(combine(&[]), Err(DataError::NoDataAvailable)));
}

#[test]
fn table_hash_is_stable_and_content_sensitive() {
    let a = combine(&[daily("A", &[(1, 1.0), (2, 2.0)])]).unwrap();
    let b = combine(&[daily("A", &[(1, 1.0), (2, 2.0)])]).unwrap();
    let c = combine(&[daily("A", &[(1, 1.0), (2, 2.5)])]).unwrap();
    assert_eq!(a.content_hash(), b.content_hash());
    assert_ne!(a.content_hash(), c.content_hash());
}
