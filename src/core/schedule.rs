//! Rent schedule generation from a CPI series.
//!
//! The rent is adjusted every `period_months` months by the compounded CPI
//! change of the months preceding the adjustment. When any of those months is
//! not yet known the period keeps the previous value and is marked
//! provisional; regenerating once the data arrives applies the adjustment from
//! the same baseline.

use crate::core::month::{Locale, MonthKey};
use crate::core::series::CpiSeries;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("adjustment period must be at least one month, got {0}")]
    InvalidPeriod(u32),
    #[error("schedule horizon is limited to {max} months, got {0}", max = MAX_HORIZON_MONTHS)]
    InvalidHorizon(u32),
}

/// Longest schedule that can be requested, one hundred years.
pub const MAX_HORIZON_MONTHS: u32 = 1200;

/// Contract inputs for a schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleParams {
    pub base: Decimal,
    pub start: MonthKey,
    pub period_months: u32,
    pub horizon_months: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RentScheduleEntry {
    pub month: MonthKey,
    pub display_label: String,
    /// Rent in whole currency units. `None` for future months.
    pub value: Option<Decimal>,
    /// Change applied at this month, only set on adjustment months.
    pub adjustment_delta: Option<Decimal>,
    pub is_provisional: bool,
    /// Monthly CPI change in percent with one decimal, when known.
    pub cpi_percent: Option<Decimal>,
    pub cpi_is_unofficial: bool,
    pub is_future: bool,
    pub period_index: u32,
    pub offset_in_period: u32,
    pub is_period_end: bool,
}

/// Rounds to `dp` decimals with halves going away from zero.
fn round_half_up(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

/// Number of months from `start` through December of `today`'s year.
pub fn months_until_year_end(start: MonthKey, today: MonthKey) -> u32 {
    let december = MonthKey::new(today.year(), 12).unwrap_or(today);
    (start.months_until(december) + 1).max(0) as u32
}

/// Builds rent schedules relative to the current month.
#[derive(Debug, Clone)]
pub struct RentScheduleGenerator {
    current: MonthKey,
    max_month: Option<MonthKey>,
    locale: Locale,
}

impl RentScheduleGenerator {
    pub fn new(current: MonthKey) -> Self {
        Self {
            current,
            max_month: None,
            locale: Locale::default(),
        }
    }

    /// Stop generating after `max_month`.
    pub fn with_max_month(mut self, max_month: MonthKey) -> Self {
        self.max_month = Some(max_month);
        self
    }

    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    /// Months after this one are shown without a value.
    fn lookahead_limit(&self) -> MonthKey {
        self.current.add_months(1)
    }

    /// Compounded factor over the `period` months before `boundary`, or `None`
    /// when any of them is missing or the product does not fit a `Decimal`.
    fn period_factor(series: &CpiSeries, boundary: MonthKey, period: u32) -> Option<Decimal> {
        (1..=period as i32)
            .map(|back| series.rate(&boundary.add_months(-back)))
            .try_fold(Decimal::ONE, |factor, rate| {
                factor.checked_mul(Decimal::ONE.checked_add(rate?)?)
            })
    }

    /// Rent after applying `factor`, with the change from `current`.
    fn adjusted(current: Decimal, factor: Decimal) -> Option<(Decimal, Decimal)> {
        let new_value = round_half_up(current.checked_mul(factor)?, 0);
        Some((new_value, new_value.checked_sub(current)?))
    }

    pub fn generate(
        &self,
        params: &ScheduleParams,
        series: &CpiSeries,
    ) -> Result<Vec<RentScheduleEntry>, ScheduleError> {
        let period = params.period_months;
        if period < 1 {
            return Err(ScheduleError::InvalidPeriod(period));
        }
        if params.horizon_months > MAX_HORIZON_MONTHS {
            return Err(ScheduleError::InvalidHorizon(params.horizon_months));
        }

        let lookahead = self.lookahead_limit();
        let mut current_value = round_half_up(params.base, 0);
        let mut period_provisional = false;
        let mut entries: Vec<RentScheduleEntry> = Vec::new();

        for i in 0..params.horizon_months {
            let month = params.start.add_months(i as i32);
            if self.max_month.is_some_and(|max| month > max) {
                break;
            }

            let period_index = i / period;
            let offset = i % period;
            let is_future = month > lookahead;
            let mut adjustment_delta = None;

            if offset == 0 && !is_future {
                period_provisional = false;
                if period_index > 0 {
                    match Self::period_factor(series, month, period)
                        .and_then(|factor| Self::adjusted(current_value, factor))
                    {
                        Some((new_value, delta)) => {
                            adjustment_delta = Some(delta);
                            current_value = new_value;
                        }
                        None => period_provisional = true,
                    }
                }
            }

            let (cpi_percent, cpi_is_unofficial) = match series.get(&month) {
                Some(rate) => (
                    rate.proportion
                        .checked_mul(Decimal::ONE_HUNDRED)
                        .map(|percent| round_half_up(percent, 1)),
                    !rate.is_official(),
                ),
                None => (None, false),
            };
            let is_provisional = period_provisional && !is_future;

            entries.push(RentScheduleEntry {
                month,
                display_label: month.label(self.locale),
                value: (!is_future).then_some(current_value),
                adjustment_delta,
                is_provisional,
                cpi_percent,
                cpi_is_unofficial,
                is_future,
                period_index,
                offset_in_period: offset,
                is_period_end: offset == period - 1 && !is_provisional,
            });
        }

        if let Some(last) = entries.last_mut() {
            last.is_period_end = true;
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::source::RateRow;
    use std::str::FromStr;

    fn m(s: &str) -> MonthKey {
        s.parse().unwrap()
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn series(rows: &[(&str, &str)]) -> CpiSeries {
        let rows: Vec<RateRow> = rows
            .iter()
            .map(|(month, value)| RateRow::new(m(month), dec(value)))
            .collect();
        let mut series = CpiSeries::new();
        series.merge_official(&rows);
        series
    }

    fn params(base: &str, start: &str, period: u32, horizon: u32) -> ScheduleParams {
        ScheduleParams {
            base: dec(base),
            start: m(start),
            period_months: period,
            horizon_months: horizon,
        }
    }

    #[test]
    fn test_compounding_adjustment() {
        let cpi = series(&[("2024-01", "0.02"), ("2024-02", "0.01"), ("2024-03", "0.015")]);
        let generator = RentScheduleGenerator::new(m("2024-12"));
        let entries = generator
            .generate(&params("100000", "2024-01", 3, 6), &cpi)
            .unwrap();

        assert_eq!(entries.len(), 6);
        for entry in &entries[..3] {
            assert_eq!(entry.value, Some(dec("100000")));
            assert_eq!(entry.period_index, 0);
        }
        // 100000 * 1.02 * 1.01 * 1.015 = 104565.3
        assert_eq!(entries[3].month, m("2024-04"));
        assert_eq!(entries[3].value, Some(dec("104565")));
        assert_eq!(entries[3].adjustment_delta, Some(dec("4565")));
        assert!(!entries[3].is_provisional);
        assert_eq!(entries[5].value, Some(dec("104565")));
        assert!(entries[4].adjustment_delta.is_none());
    }

    #[test]
    fn test_rounding_half_up_on_exact_half() {
        // 1000 * 1.0005 = 1000.5 exactly
        let cpi = series(&[("2024-01", "0.0005")]);
        let entries = RentScheduleGenerator::new(m("2024-12"))
            .generate(&params("1000", "2024-01", 1, 2), &cpi)
            .unwrap();
        assert_eq!(entries[1].value, Some(dec("1001")));
        assert_eq!(entries[1].adjustment_delta, Some(dec("1")));

        // Base is rounded the same way
        let entries = RentScheduleGenerator::new(m("2024-12"))
            .generate(&params("2500.5", "2024-01", 1, 1), &cpi)
            .unwrap();
        assert_eq!(entries[0].value, Some(dec("2501")));
    }

    #[test]
    fn test_missing_month_marks_period_provisional() {
        let mut cpi = series(&[("2024-01", "0.02"), ("2024-03", "0.015")]);
        let generator = RentScheduleGenerator::new(m("2024-12"));
        let request = params("100000", "2024-01", 3, 6);

        let entries = generator.generate(&request, &cpi).unwrap();
        for entry in &entries[3..] {
            assert_eq!(entry.value, Some(dec("100000")));
            assert!(entry.is_provisional);
            assert!(entry.adjustment_delta.is_none());
        }
        assert!(!entries[2].is_provisional);
        assert!(entries[2].is_period_end);
        // Provisional periods only end on the forced last entry
        assert!(!entries[4].is_period_end);
        assert!(entries[5].is_period_end);

        // Once the gap is filled the adjustment applies from the same baseline
        cpi.merge_official(&[RateRow::new(m("2024-02"), dec("0.01"))]);
        let entries = generator.generate(&request, &cpi).unwrap();
        assert_eq!(entries[3].value, Some(dec("104565")));
        assert!(!entries[3].is_provisional);
    }

    #[test]
    fn test_adjustment_after_provisional_period_uses_last_applied_value() {
        // 2024-02 is missing, so the April adjustment is deferred; July uses
        // April-June rates on the untouched base.
        let cpi = series(&[
            ("2024-01", "0.02"),
            ("2024-03", "0.015"),
            ("2024-04", "0.01"),
            ("2024-05", "0.01"),
            ("2024-06", "0.01"),
        ]);
        let entries = RentScheduleGenerator::new(m("2024-12"))
            .generate(&params("100000", "2024-01", 3, 9), &cpi)
            .unwrap();
        assert!(entries[3].is_provisional);
        // 100000 * 1.01^3 = 103030.1
        assert_eq!(entries[6].value, Some(dec("103030")));
        assert_eq!(entries[6].adjustment_delta, Some(dec("3030")));
        assert!(!entries[6].is_provisional);
    }

    #[test]
    fn test_future_months_and_max_month() {
        let cpi = series(&[("2024-01", "0.02"), ("2024-02", "0.01"), ("2024-03", "0.015")]);
        let generator = RentScheduleGenerator::new(m("2024-02"));
        let entries = generator
            .generate(&params("100000", "2024-01", 3, 6), &cpi)
            .unwrap();

        assert_eq!(entries.len(), 6);
        assert!(!entries[2].is_future); // 2024-03 is within the one-month lookahead
        for entry in &entries[3..] {
            assert!(entry.is_future);
            assert!(entry.value.is_none());
            assert!(entry.adjustment_delta.is_none());
            assert!(!entry.is_provisional);
        }

        let bounded = generator
            .clone()
            .with_max_month(m("2024-03"))
            .generate(&params("100000", "2024-01", 3, 6), &cpi)
            .unwrap();
        assert_eq!(bounded.len(), 3);
        assert!(bounded[2].is_period_end);
    }

    #[test]
    fn test_entry_fields() {
        let cpi = series(&[("2024-01", "0.2061"), ("2024-02", "0.1325")]);
        let entries = RentScheduleGenerator::new(m("2024-12"))
            .with_locale(Locale::Es)
            .generate(&params("1000", "2024-01", 2, 3), &cpi)
            .unwrap();

        assert_eq!(entries[0].display_label, "Enero 2024");
        assert_eq!(entries[0].cpi_percent, Some(dec("20.6")));
        assert_eq!(entries[1].cpi_percent, Some(dec("13.3")));
        assert!(entries[2].cpi_percent.is_none());
        assert_eq!(
            entries
                .iter()
                .map(|e| (e.period_index, e.offset_in_period, e.is_period_end))
                .collect::<Vec<_>>(),
            vec![(0, 0, false), (0, 1, true), (1, 0, true)]
        );
    }

    #[test]
    fn test_invalid_period_and_empty_horizon() {
        let generator = RentScheduleGenerator::new(m("2024-12"));
        assert_eq!(
            generator.generate(&params("1000", "2024-01", 0, 12), &CpiSeries::new()),
            Err(ScheduleError::InvalidPeriod(0))
        );
        assert!(
            generator
                .generate(&params("1000", "2024-01", 3, 0), &CpiSeries::new())
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_overflowing_rates_keep_period_provisional() {
        let cpi = series(&[
            ("2024-01", "100000000000000000000"),
            ("2024-02", "100000000000000000000"),
            ("2024-03", "100000000000000000000"),
        ]);
        let entries = RentScheduleGenerator::new(m("2024-12"))
            .generate(&params("100000", "2024-01", 3, 6), &cpi)
            .unwrap();

        assert_eq!(entries.len(), 6);
        for entry in &entries[3..] {
            assert_eq!(entry.value, Some(dec("100000")));
            assert!(entry.is_provisional);
            assert!(entry.adjustment_delta.is_none());
        }
    }

    #[test]
    fn test_horizon_limits() {
        let generator = RentScheduleGenerator::new(m("2024-12")).with_max_month(m("2025-01"));
        assert_eq!(
            generator.generate(&params("1000", "2024-01", 3, u32::MAX), &CpiSeries::new()),
            Err(ScheduleError::InvalidHorizon(u32::MAX))
        );

        // The max month still bounds a long horizon
        let entries = generator
            .generate(
                &params("1000", "2024-01", 3, MAX_HORIZON_MONTHS),
                &CpiSeries::new(),
            )
            .unwrap();
        assert_eq!(entries.len(), 13);
        assert_eq!(entries.last().unwrap().month, m("2025-01"));
    }

    #[test]
    fn test_months_until_year_end() {
        assert_eq!(months_until_year_end(m("2024-03"), m("2024-07")), 10);
        assert_eq!(months_until_year_end(m("2023-11"), m("2024-07")), 14);
        assert_eq!(months_until_year_end(m("2025-02"), m("2024-07")), 0);
    }
}
