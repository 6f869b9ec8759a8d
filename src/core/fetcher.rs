//! Cache-and-fetch orchestration for the CPI series.
//!
//! One call to [`CpiFetcher::fetch_series`] walks these steps:
//!
//! 1. Load the local snapshot. A missing or corrupt snapshot means "no cache".
//! 2. Serve the snapshot without any network call while it is fresh.
//! 3. Ask the primary source conditionally, merging fresh rows as official.
//! 4. Work out which months between the earliest known month and the required
//!    month are missing.
//! 5. Consult the backup source when the primary failed or months are still
//!    missing, recording backup values as unofficial.
//! 6. Persist the merged series when anything changed and report diagnostics.
//!
//! Only a call with nothing to serve at all fails; every other failure is
//! classified and attached to the returned [`FetchStatus`].

use crate::core::cache::{CacheSnapshot, SnapshotStore, StoreError};
use crate::core::error::{ErrorInfo, FetchError};
use crate::core::month::MonthKey;
use crate::core::series::CpiSeries;
use crate::core::source::{BackupSource, FetchOutcome, PrimarySource};
use crate::core::staleness;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Diagnostics about how a series was obtained. Built fresh for every call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchStatus {
    pub source: String,
    pub used_cache: bool,
    pub updated: bool,
    pub stale: bool,
    pub used_backup: bool,
    pub unofficial_months: BTreeSet<MonthKey>,
    pub error: Option<ErrorInfo>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub checked_at: Option<DateTime<Utc>>,
}

impl FetchStatus {
    fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            used_cache: false,
            updated: false,
            stale: false,
            used_backup: false,
            unofficial_months: BTreeSet::new(),
            error: None,
            fetched_at: None,
            checked_at: None,
        }
    }
}

pub struct CpiFetcher {
    store: Arc<dyn SnapshotStore>,
    primary: Arc<dyn PrimarySource>,
    backup: Option<Arc<dyn BackupSource>>,
    recheck_interval: Duration,
}

impl CpiFetcher {
    pub fn new(store: Arc<dyn SnapshotStore>, primary: Arc<dyn PrimarySource>) -> Self {
        Self {
            store,
            primary,
            backup: None,
            recheck_interval: Duration::hours(24),
        }
    }

    pub fn with_backup(mut self, backup: Arc<dyn BackupSource>) -> Self {
        self.backup = Some(backup);
        self
    }

    pub fn with_recheck_interval(mut self, interval: Duration) -> Self {
        self.recheck_interval = interval;
        self
    }

    /// A snapshot is trusted without network access when it covers the
    /// required month and, if it still holds unofficial months, it was
    /// verified recently.
    fn is_fresh(&self, snapshot: &CacheSnapshot, today: NaiveDate, now: DateTime<Utc>) -> bool {
        if staleness::is_stale(snapshot.series.latest_month(), today) {
            return false;
        }
        snapshot.series.unofficial_months().is_empty()
            || now - snapshot.last_verified() < self.recheck_interval
    }

    #[instrument(name = "FetchSeries", skip(self), fields(source = %self.primary.source()))]
    pub async fn fetch_series(
        &self,
        now: DateTime<Utc>,
    ) -> Result<(CpiSeries, FetchStatus), FetchError> {
        let today = now.date_naive();
        let required = staleness::required_month(today);
        let mut status = FetchStatus::new(self.primary.source());
        let mut last_error: Option<FetchError> = None;

        let cached = match self.store.load().await {
            Ok(snapshot) => Some(snapshot),
            Err(StoreError::NotFound) => {
                debug!("No cached CPI snapshot");
                None
            }
            Err(e) => {
                warn!(error = %e, "Discarding unreadable CPI snapshot");
                last_error = Some(FetchError::CacheCorrupt(e.to_string()));
                None
            }
        };

        if let Some(snapshot) = &cached
            && self.is_fresh(snapshot, today, now)
        {
            debug!(latest = ?snapshot.series.latest_month(), "Serving CPI series from cache");
            status.used_cache = true;
            status.unofficial_months = snapshot.series.unofficial_months();
            status.fetched_at = Some(snapshot.fetched_at);
            status.checked_at = snapshot.checked_at;
            return Ok((snapshot.series.clone(), status));
        }

        let mut series = cached
            .as_ref()
            .map(|s| s.series.clone())
            .unwrap_or_default();
        let mut validators = cached.as_ref().map(|s| s.validators()).unwrap_or_default();
        let mut mutated = false;
        let mut primary_error: Option<FetchError> = None;

        status.checked_at = Some(now);
        let outcome = self.primary.fetch(&validators).await;
        match outcome {
            Ok(FetchOutcome::NotModified) if cached.is_some() => {
                debug!("Primary CPI source reports no changes");
                status.used_cache = true;
                if let Err(e) = self.store.touch(now).await {
                    warn!(error = %e, "Could not record CPI snapshot verification");
                }
            }
            Ok(FetchOutcome::NotModified) => {
                let err = FetchError::InvalidResponse(
                    "not-modified reply without a cached snapshot".to_string(),
                );
                warn!(error = %err, "Primary CPI source failed");
                primary_error = Some(err);
            }
            Ok(FetchOutcome::Updated {
                rows,
                validators: fresh,
            }) => {
                let changed = series.merge_official(&rows);
                info!(rows = rows.len(), changed, "Merged primary CPI rows");
                if changed > 0 || fresh != validators {
                    validators = fresh;
                    mutated = true;
                } else if cached.is_some() {
                    status.used_cache = true;
                    if let Err(e) = self.store.touch(now).await {
                        warn!(error = %e, "Could not record CPI snapshot verification");
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Primary CPI source failed");
                status.used_cache = cached.is_some();
                primary_error = Some(e);
            }
        }

        let missing = series.missing_through(required);
        if primary_error.is_some() || !missing.is_empty() || series.is_empty() {
            if !missing.is_empty() {
                debug!(?missing, "CPI months missing after primary fetch");
            }
            match self.fetch_backup(&mut series, &missing, now).await {
                Ok(applied) if applied > 0 => {
                    info!(applied, "Filled CPI months from backup source");
                    status.used_backup = true;
                    mutated = true;
                }
                Ok(_) => debug!("Backup CPI source had nothing to add"),
                Err(e) => {
                    warn!(error = %e, "Backup CPI source failed");
                    last_error = Some(e);
                }
            }
        }

        if series.is_empty() {
            let cause = primary_error.or(last_error).unwrap_or_else(|| {
                FetchError::InvalidResponse("no CPI rows from any source".to_string())
            });
            return Err(FetchError::NoData(Box::new(cause)));
        }

        if let Some(e) = primary_error {
            last_error = Some(e);
        } else if !series.get(&required).is_some_and(|r| r.is_official()) {
            last_error = Some(FetchError::PrimaryStale {
                required,
                filled_by_backup: series.contains(&required),
            });
        }

        if mutated {
            let snapshot = CacheSnapshot {
                series: series.clone(),
                fetched_at: now,
                checked_at: Some(now),
                etag: validators.etag,
                last_modified: validators.last_modified,
            };
            match self.store.save(&snapshot).await {
                Ok(()) => info!(months = series.len(), "Saved CPI snapshot"),
                Err(e) => {
                    warn!(error = %e, "Could not save CPI snapshot");
                    last_error.get_or_insert(FetchError::CacheWrite(e.to_string()));
                }
            }
            status.fetched_at = Some(now);
        } else {
            status.fetched_at = cached.as_ref().map(|s| s.fetched_at);
        }

        status.updated = mutated;
        status.stale = staleness::is_stale(series.latest_month(), today);
        status.unofficial_months = series.unofficial_months();
        status.error = last_error.as_ref().map(ErrorInfo::from);
        Ok((series, status))
    }

    /// Applies backup rows for missing months and months that are already
    /// unofficial. With an empty series every backup month is taken.
    async fn fetch_backup(
        &self,
        series: &mut CpiSeries,
        missing: &[MonthKey],
        now: DateTime<Utc>,
    ) -> Result<usize, FetchError> {
        let Some(backup) = &self.backup else {
            debug!("No backup CPI source configured");
            return Ok(0);
        };

        let rows = backup.fetch_all().await?;
        let take_all = series.is_empty();
        let mut applied = 0;
        for row in &rows {
            let wanted =
                take_all || missing.contains(&row.month) || series.is_unofficial(&row.month);
            if wanted && series.record_unofficial(row, backup.source(), now) {
                applied += 1;
            }
        }
        Ok(applied)
    }
}
