//! CPI source abstractions and wire-independent types

use crate::core::error::FetchError;
use crate::core::month::MonthKey;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A normalized `(month, proportion)` pair from any source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateRow {
    pub month: MonthKey,
    pub proportion: Decimal,
}

impl RateRow {
    pub fn new(month: MonthKey, proportion: Decimal) -> Self {
        Self { month, proportion }
    }
}

/// Cache validators sent back to the primary source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validators {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Upstream confirmed the cached copy is still current.
    NotModified,
    /// Fresh rows, sorted by month and unique per month.
    Updated {
        rows: Vec<RateRow>,
        validators: Validators,
    },
}

/// What the primary series values represent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// Index levels; the monthly change is derived from consecutive months.
    #[default]
    Index,
    /// Monthly changes as fractions.
    Variation,
}

/// Unit of the values published by the backup source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueUnit {
    #[default]
    Percent,
    Fraction,
}

#[async_trait]
pub trait PrimarySource: Send + Sync {
    /// Identifier reported in fetch diagnostics, usually the URL.
    fn source(&self) -> &str;

    /// Conditional fetch of the whole series.
    async fn fetch(&self, validators: &Validators) -> Result<FetchOutcome, FetchError>;
}

#[async_trait]
pub trait BackupSource: Send + Sync {
    fn source(&self) -> &str;

    /// Unconditional fetch of every month the backup knows about.
    async fn fetch_all(&self) -> Result<Vec<RateRow>, FetchError>;
}
