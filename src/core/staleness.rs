//! Calendar aware freshness rule for the CPI series.
//!
//! Data for month M is usually published around the middle of month M+1, so
//! before the publication day the newest month we can expect is two months
//! back.

use crate::core::month::MonthKey;
use chrono::{Datelike, NaiveDate};

/// Day of month from which last month's figure is expected to be published.
pub const PUBLICATION_DAY: u32 = 14;

/// Newest month the series must contain on `today`.
pub fn required_month(today: NaiveDate) -> MonthKey {
    let lag = if today.day() >= PUBLICATION_DAY { 1 } else { 2 };
    MonthKey::from(today).add_months(-lag)
}

/// A series is stale when it lacks the required month.
pub fn is_stale(latest_month: Option<MonthKey>, today: NaiveDate) -> bool {
    match latest_month {
        Some(latest) => latest < required_month(today),
        None => true,
    }
}
