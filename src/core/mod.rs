//! Core business logic: CPI series, caching, fetching and rent schedules

pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod log;
pub mod month;
pub mod report;
pub mod schedule;
pub mod series;
pub mod source;
pub mod staleness;

// Re-export main types for cleaner imports
pub use cache::{CacheSnapshot, SnapshotStore, StoreError};
pub use error::{ErrorInfo, ErrorOrigin, FetchError};
pub use fetcher::{CpiFetcher, FetchStatus};
pub use month::{Locale, MonthKey};
pub use report::{RentReport, get_rent_schedule};
pub use schedule::{RentScheduleEntry, RentScheduleGenerator, ScheduleParams};
pub use series::{CpiSeries, MonthlyRate, Provenance};
pub use source::{BackupSource, PrimarySource, RateRow};
