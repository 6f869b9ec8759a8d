//! Single entry point pairing a CPI fetch with schedule generation.

use crate::core::config::{ContractConfig, ScheduleConfig};
use crate::core::error::{ErrorInfo, ErrorOrigin};
use crate::core::fetcher::{CpiFetcher, FetchStatus};
use crate::core::month::MonthKey;
use crate::core::schedule::{
    RentScheduleEntry, RentScheduleGenerator, ScheduleError, ScheduleParams, months_until_year_end,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{instrument, warn};

#[derive(Debug, Clone, Serialize)]
pub struct RentReport {
    pub schedule: Vec<RentScheduleEntry>,
    /// Absent only when no fetch was attempted.
    pub status: Option<FetchStatus>,
    pub error: Option<ErrorInfo>,
}

impl From<&ScheduleError> for ErrorInfo {
    fn from(err: &ScheduleError) -> Self {
        ErrorInfo::new("invalid_input", ErrorOrigin::Internal, err.to_string())
    }
}

/// Fetches the CPI series and builds the rent schedule for `contract`.
///
/// Never fails outright: a fetch with nothing to serve or an invalid contract
/// yields an empty schedule and an error, degraded fetches keep the schedule
/// and report the underlying failure through `error`.
#[instrument(skip_all, fields(start = %contract.start_month))]
pub async fn get_rent_schedule(
    fetcher: &CpiFetcher,
    contract: &ContractConfig,
    options: &ScheduleConfig,
    now: DateTime<Utc>,
) -> RentReport {
    let current = MonthKey::from(now.date_naive());
    let horizon = contract
        .horizon_months
        .unwrap_or_else(|| months_until_year_end(contract.start_month, current));
    let params = ScheduleParams {
        base: contract.base_amount,
        start: contract.start_month,
        period_months: contract.period_months,
        horizon_months: horizon,
    };

    let mut generator = RentScheduleGenerator::new(current).with_locale(options.locale);
    if !options.show_future {
        generator = generator.with_max_month(current.add_months(1));
    }

    // Reject bad contracts before touching the network
    if let Err(e) = generator.generate(&params, &Default::default()) {
        warn!(error = %e, "Rejecting rent schedule request");
        return RentReport {
            schedule: Vec::new(),
            status: None,
            error: Some(ErrorInfo::from(&e)),
        };
    }

    let (series, status) = match fetcher.fetch_series(now).await {
        Ok(result) => result,
        Err(e) => {
            warn!(error = %e, "No CPI data available for rent schedule");
            return RentReport {
                schedule: Vec::new(),
                status: None,
                error: Some(ErrorInfo::from(&e)),
            };
        }
    };

    match generator.generate(&params, &series) {
        Ok(schedule) => RentReport {
            schedule,
            error: status.error.clone(),
            status: Some(status),
        },
        Err(e) => RentReport {
            schedule: Vec::new(),
            error: Some(ErrorInfo::from(&e)),
            status: Some(status),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache::CacheSnapshot;
    use crate::core::error::FetchError;
    use crate::core::series::CpiSeries;
    use crate::core::source::{FetchOutcome, PrimarySource, RateRow, Validators};
    use crate::store::memory::MemoryStore;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use std::sync::Arc;

    fn m(s: &str) -> MonthKey {
        s.parse().unwrap()
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 20, 9, 30, 0).unwrap()
    }

    struct FailingPrimary;

    #[async_trait]
    impl PrimarySource for FailingPrimary {
        fn source(&self) -> &str {
            "mock://down"
        }

        async fn fetch(&self, _validators: &Validators) -> Result<FetchOutcome, FetchError> {
            Err(FetchError::Unreachable("connection refused".to_string()))
        }
    }

    fn contract(period: u32, horizon: Option<u32>) -> ContractConfig {
        ContractConfig {
            base_amount: dec("100000"),
            start_month: m("2024-01"),
            period_months: period,
            horizon_months: horizon,
        }
    }

    fn cached_fetcher() -> CpiFetcher {
        let rows: Vec<RateRow> = [
            ("2024-01", "0.2061"),
            ("2024-02", "0.1325"),
            ("2024-03", "0.1101"),
            ("2024-04", "0.088"),
            ("2024-05", "0.042"),
            ("2024-06", "0.046"),
        ]
        .iter()
        .map(|(month, value)| RateRow::new(m(month), dec(value)))
        .collect();
        let mut series = CpiSeries::new();
        series.merge_official(&rows);
        let store = MemoryStore::with_snapshot(CacheSnapshot::new(series, now()));
        CpiFetcher::new(Arc::new(store), Arc::new(FailingPrimary))
    }

    #[tokio::test]
    async fn test_report_from_cached_series() {
        let report = get_rent_schedule(
            &cached_fetcher(),
            &contract(3, Some(12)),
            &ScheduleConfig::default(),
            now(),
        )
        .await;

        assert!(report.error.is_none());
        let status = report.status.unwrap();
        assert!(status.used_cache);
        // Stops at next month while future months are hidden
        assert_eq!(report.schedule.len(), 8);
        assert_eq!(report.schedule.last().unwrap().month, m("2024-08"));
        assert_eq!(report.schedule[0].display_label, "January 2024");
        let april = &report.schedule[3];
        assert!(april.adjustment_delta.is_some());
        assert!(!april.is_provisional);
        let july = &report.schedule[6];
        assert!(july.adjustment_delta.is_some());
        assert!(report.schedule.last().unwrap().is_period_end);
    }

    #[tokio::test]
    async fn test_default_horizon_runs_to_year_end() {
        let options = ScheduleConfig {
            show_future: true,
            ..ScheduleConfig::default()
        };
        let report = get_rent_schedule(&cached_fetcher(), &contract(3, None), &options, now()).await;

        assert_eq!(report.schedule.len(), 12);
        let december = report.schedule.last().unwrap();
        assert_eq!(december.month, m("2024-12"));
        assert!(december.is_future);
        assert!(december.value.is_none());
    }

    #[tokio::test]
    async fn test_invalid_period_is_reported_without_fetching() {
        let report = get_rent_schedule(
            &cached_fetcher(),
            &contract(0, Some(12)),
            &ScheduleConfig::default(),
            now(),
        )
        .await;

        assert!(report.schedule.is_empty());
        assert!(report.status.is_none());
        let error = report.error.unwrap();
        assert_eq!(error.code, "invalid_input");
        assert_eq!(error.origin, ErrorOrigin::Internal);
    }

    #[tokio::test]
    async fn test_no_data_yields_empty_schedule_and_error() {
        let fetcher = CpiFetcher::new(Arc::new(MemoryStore::new()), Arc::new(FailingPrimary));
        let report =
            get_rent_schedule(&fetcher, &contract(3, Some(6)), &ScheduleConfig::default(), now())
                .await;

        assert!(report.schedule.is_empty());
        let error = report.error.unwrap();
        assert_eq!(error.code, "no_data");
        assert_eq!(error.origin, ErrorOrigin::ExternalService);
    }
}
