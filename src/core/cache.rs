use crate::core::series::CpiSeries;
use crate::core::source::Validators;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Everything we last learned from a successful fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSnapshot {
    pub series: CpiSeries,
    pub fetched_at: DateTime<Utc>,
    /// Last time the primary source was asked, including not-modified replies.
    pub checked_at: Option<DateTime<Utc>>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

impl CacheSnapshot {
    pub fn new(series: CpiSeries, fetched_at: DateTime<Utc>) -> Self {
        Self {
            series,
            fetched_at,
            checked_at: Some(fetched_at),
            etag: None,
            last_modified: None,
        }
    }

    pub fn validators(&self) -> Validators {
        Validators {
            etag: self.etag.clone(),
            last_modified: self.last_modified.clone(),
        }
    }

    pub fn last_verified(&self) -> DateTime<Utc> {
        self.checked_at.unwrap_or(self.fetched_at)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no CPI snapshot has been stored yet")]
    NotFound,

    #[error("CPI snapshot is corrupt: {0}")]
    Corrupt(String),

    #[error("CPI snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Persistence for the single CPI snapshot. Never touches the network.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn load(&self) -> Result<CacheSnapshot, StoreError>;

    /// Replaces the stored snapshot wholesale.
    async fn save(&self, snapshot: &CacheSnapshot) -> Result<(), StoreError>;

    /// Records that the snapshot was verified at `at` without rewriting the series.
    async fn touch(&self, at: DateTime<Utc>) -> Result<(), StoreError>;
}
