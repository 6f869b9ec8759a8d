//! The monthly CPI variation series and its provenance bookkeeping

use crate::core::month::MonthKey;
use crate::core::source::RateRow;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Where a monthly rate came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Provenance {
    /// Published by the primary statistics source.
    Official,
    /// Placeholder from a secondary source, pending confirmation.
    Unofficial {
        source: String,
        recorded_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyRate {
    pub month: MonthKey,
    /// Month-over-month change as a fraction, e.g. `0.016` for 1.6%.
    pub proportion: Decimal,
    pub provenance: Provenance,
}

impl MonthlyRate {
    pub fn official(month: MonthKey, proportion: Decimal) -> Self {
        Self {
            month,
            proportion,
            provenance: Provenance::Official,
        }
    }

    pub fn unofficial(
        month: MonthKey,
        proportion: Decimal,
        source: impl Into<String>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            month,
            proportion,
            provenance: Provenance::Unofficial {
                source: source.into(),
                recorded_at,
            },
        }
    }

    pub fn is_official(&self) -> bool {
        matches!(self.provenance, Provenance::Official)
    }
}

/// Month-keyed CPI series. At most one rate per month.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CpiSeries {
    rates: BTreeMap<MonthKey, MonthlyRate>,
}

impl CpiSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn get(&self, month: &MonthKey) -> Option<&MonthlyRate> {
        self.rates.get(month)
    }

    pub fn contains(&self, month: &MonthKey) -> bool {
        self.rates.contains_key(month)
    }

    pub fn rate(&self, month: &MonthKey) -> Option<Decimal> {
        self.rates.get(month).map(|r| r.proportion)
    }

    pub fn is_unofficial(&self, month: &MonthKey) -> bool {
        self.rates.get(month).is_some_and(|r| !r.is_official())
    }

    /// Rates in ascending month order.
    pub fn iter(&self) -> impl Iterator<Item = &MonthlyRate> {
        self.rates.values()
    }

    pub fn earliest_month(&self) -> Option<MonthKey> {
        self.rates.keys().next().copied()
    }

    pub fn latest_month(&self) -> Option<MonthKey> {
        self.rates.keys().next_back().copied()
    }

    /// The last `n` rates, oldest first.
    pub fn latest(&self, n: usize) -> Vec<&MonthlyRate> {
        let skip = self.rates.len().saturating_sub(n);
        self.rates.values().skip(skip).collect()
    }

    pub fn unofficial_months(&self) -> BTreeSet<MonthKey> {
        self.rates
            .values()
            .filter(|r| !r.is_official())
            .map(|r| r.month)
            .collect()
    }

    /// Inserts a rate as-is, replacing any previous entry for the month.
    pub fn insert(&mut self, rate: MonthlyRate) {
        self.rates.insert(rate.month, rate);
    }

    /// Merges rows from the primary source as official rates.
    ///
    /// Official always wins, so unofficial entries for the same months are
    /// replaced. Returns how many months changed value or provenance.
    pub fn merge_official(&mut self, rows: &[RateRow]) -> usize {
        let mut changed = 0;
        for row in rows {
            let rate = MonthlyRate::official(row.month, row.proportion);
            if self.rates.get(&row.month) != Some(&rate) {
                self.rates.insert(row.month, rate);
                changed += 1;
            }
        }
        changed
    }

    /// Records a backup value for a month the primary source lacks.
    ///
    /// Never overrides an official rate. A newer backup value replaces an
    /// older unofficial one. Returns whether the series changed.
    pub fn record_unofficial(
        &mut self,
        row: &RateRow,
        source: &str,
        recorded_at: DateTime<Utc>,
    ) -> bool {
        match self.rates.get(&row.month) {
            Some(existing) if existing.is_official() => false,
            Some(existing) if existing.proportion == row.proportion => false,
            _ => {
                self.rates.insert(
                    row.month,
                    MonthlyRate::unofficial(row.month, row.proportion, source, recorded_at),
                );
                true
            }
        }
    }

    /// Months in `[earliest, max(latest, through)]` with no rate.
    pub fn missing_through(&self, through: MonthKey) -> Vec<MonthKey> {
        match (self.earliest_month(), self.latest_month()) {
            (Some(first), Some(last)) => MonthKey::range(first, last.max(through))
                .filter(|m| !self.contains(m))
                .collect(),
            _ => Vec::new(),
        }
    }
}
