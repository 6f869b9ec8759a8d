//! Calendar month keys and month arithmetic

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

const MONTH_NAMES_EN: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const MONTH_NAMES_ES: [&str; 12] = [
    "Enero",
    "Febrero",
    "Marzo",
    "Abril",
    "Mayo",
    "Junio",
    "Julio",
    "Agosto",
    "Septiembre",
    "Octubre",
    "Noviembre",
    "Diciembre",
];

/// Language used for human readable month labels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Es,
}

impl Locale {
    fn month_names(&self) -> &'static [&'static str; 12] {
        match self {
            Locale::En => &MONTH_NAMES_EN,
            Locale::Es => &MONTH_NAMES_ES,
        }
    }
}

/// A calendar month, written canonically as `YYYY-MM`.
///
/// Ordering is by year, then month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Shifts the key by `n` months, wrapping the year in both directions.
    pub fn add_months(&self, n: i32) -> Self {
        let total = self.year * 12 + (self.month as i32 - 1) + n;
        Self {
            year: total.div_euclid(12),
            month: total.rem_euclid(12) as u32 + 1,
        }
    }

    /// Number of months from `self` to `other` (negative when `other` is earlier).
    pub fn months_until(&self, other: MonthKey) -> i32 {
        (other.year - self.year) * 12 + (other.month as i32 - self.month as i32)
    }

    /// Inclusive range of months from `start` to `end`. Empty when `end < start`.
    pub fn range(start: MonthKey, end: MonthKey) -> impl Iterator<Item = MonthKey> {
        let count = start.months_until(end) + 1;
        (0..count.max(0)).map(move |i| start.add_months(i))
    }

    /// Parses an upstream date string into a month.
    ///
    /// Full `YYYY-MM-DD` dates are parsed strictly; anything else falls back to
    /// its first seven characters, since some upstream values are already
    /// truncated to `YYYY-MM`.
    pub fn from_date_prefix(value: &str) -> Option<Self> {
        let value = value.trim();
        if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
            return Some(Self::from(date));
        }
        value.get(..7).and_then(|prefix| prefix.parse().ok())
    }

    /// Label such as "March 2024" in the given locale.
    pub fn label(&self, locale: Locale) -> String {
        let name = locale.month_names()[(self.month - 1) as usize];
        format!("{name} {}", self.year)
    }
}

impl From<NaiveDate> for MonthKey {
    fn from(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl Display for MonthKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || anyhow::anyhow!("Invalid month '{}', expected YYYY-MM", s);
        let (year, month) = s.split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Self::new(year, month).ok_or_else(invalid)
    }
}

impl TryFrom<String> for MonthKey {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_date_prefix(&value)
            .ok_or_else(|| anyhow::anyhow!("Invalid month '{}', expected YYYY-MM", value))
    }
}

impl From<MonthKey> for String {
    fn from(key: MonthKey) -> Self {
        key.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(s: &str) -> MonthKey {
        s.parse().unwrap()
    }

    #[test]
    fn test_add_months_wraps_year() {
        assert_eq!(m("2024-12").add_months(1), m("2025-01"));
        assert_eq!(m("2024-01").add_months(-1), m("2023-12"));
        assert_eq!(m("2024-03").add_months(-27), m("2021-12"));
        assert_eq!(m("2024-03").add_months(0), m("2024-03"));
        assert_eq!(m("2024-11").add_months(14), m("2026-01"));
    }

    #[test]
    fn test_ordering_and_range() {
        assert!(m("2023-12") < m("2024-01"));
        assert!(m("2024-02") > m("2024-01"));

        let months: Vec<String> = MonthKey::range(m("2023-11"), m("2024-02"))
            .map(|k| k.to_string())
            .collect();
        assert_eq!(months, vec!["2023-11", "2023-12", "2024-01", "2024-02"]);
        assert_eq!(MonthKey::range(m("2024-02"), m("2024-01")).count(), 0);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!("2024-13".parse::<MonthKey>().is_err());
        assert!("2024-1".parse::<MonthKey>().is_err());
        assert!("24-01".parse::<MonthKey>().is_err());
        assert!("garbage".parse::<MonthKey>().is_err());
    }

    #[test]
    fn test_from_date_prefix() {
        assert_eq!(MonthKey::from_date_prefix("2024-06-01"), Some(m("2024-06")));
        assert_eq!(MonthKey::from_date_prefix("2024-06"), Some(m("2024-06")));
        assert_eq!(MonthKey::from_date_prefix("2024-06-01T00:00:00"), Some(m("2024-06")));
        assert_eq!(MonthKey::from_date_prefix("06/2024"), None);
        assert_eq!(MonthKey::from_date_prefix(""), None);
    }

    #[test]
    fn test_label_and_serde() {
        assert_eq!(m("2024-03").label(Locale::En), "March 2024");
        assert_eq!(m("2024-03").label(Locale::Es), "Marzo 2024");

        let json = serde_json::to_string(&m("2024-03")).unwrap();
        assert_eq!(json, "\"2024-03\"");
        let back: MonthKey = serde_json::from_str("\"2024-03-15\"").unwrap();
        assert_eq!(back, m("2024-03"));
    }
}
