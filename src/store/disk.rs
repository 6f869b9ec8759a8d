//! JSON snapshot store on the local filesystem.
//!
//! Layout inside the store directory:
//! - `cpi.json`: `{"header": [...], "rows": [[month, proportion, provenance], ...]}`
//! - `cpi.meta.json`: validators, timestamps and unofficial month records
//!
//! Writes go to a `.tmp` sibling and are renamed into place so a concurrent
//! reader never sees a partial file.

use crate::core::cache::{CacheSnapshot, SnapshotStore, StoreError};
use crate::core::month::MonthKey;
use crate::core::series::{CpiSeries, MonthlyRate, Provenance};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

const SERIES_FILE: &str = "cpi.json";
const META_FILE: &str = "cpi.meta.json";
const HEADER: [&str; 3] = ["month", "proportion", "provenance"];
const TAG_OFFICIAL: &str = "official";
const TAG_BACKUP: &str = "backup";

#[derive(Serialize, Deserialize)]
struct SeriesFile {
    header: Vec<String>,
    rows: Vec<(String, String, String)>,
}

#[derive(Serialize, Deserialize, Default)]
struct MetaFile {
    etag: Option<String>,
    last_modified: Option<String>,
    fetched_at: Option<DateTime<Utc>>,
    #[serde(default)]
    checked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    unofficial_months: BTreeMap<String, UnofficialRecord>,
}

#[derive(Serialize, Deserialize)]
struct UnofficialRecord {
    value: String,
    source: String,
    timestamp: DateTime<Utc>,
}

pub struct DiskStore {
    dir: PathBuf,
}

impl DiskStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn series_path(&self) -> PathBuf {
        self.dir.join(SERIES_FILE)
    }

    fn meta_path(&self) -> PathBuf {
        self.dir.join(META_FILE)
    }

    /// Missing or unreadable metadata is treated as empty.
    fn read_meta(&self) -> MetaFile {
        let path = self.meta_path();
        match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!("Ignoring unreadable metadata {}: {}", path.display(), e);
                MetaFile::default()
            }),
            Err(e) => {
                if e.kind() != ErrorKind::NotFound {
                    warn!("Could not read metadata {}: {}", path.display(), e);
                }
                MetaFile::default()
            }
        }
    }

    fn write_meta(&self, meta: &MetaFile) -> Result<(), StoreError> {
        let json =
            serde_json::to_vec_pretty(meta).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        write_atomic(&self.meta_path(), &json)
    }

    fn series_modified_at(&self) -> Option<DateTime<Utc>> {
        fs::metadata(self.series_path())
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from)
    }
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)?;
    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        StoreError::Io(e)
    })
}

fn parse_row(
    (month, proportion, tag): &(String, String, String),
    meta: &MetaFile,
    fallback_time: DateTime<Utc>,
) -> Result<MonthlyRate, StoreError> {
    let month: MonthKey = month
        .parse()
        .map_err(|e: anyhow::Error| StoreError::Corrupt(e.to_string()))?;
    let proportion = Decimal::from_str(proportion)
        .map_err(|e| StoreError::Corrupt(format!("{month}: {e}")))?;
    let provenance = match tag.as_str() {
        TAG_OFFICIAL => Provenance::Official,
        TAG_BACKUP => {
            let record = meta.unofficial_months.get(&month.to_string());
            Provenance::Unofficial {
                source: record
                    .map(|r| r.source.clone())
                    .unwrap_or_else(|| TAG_BACKUP.to_string()),
                recorded_at: record.map(|r| r.timestamp).unwrap_or(fallback_time),
            }
        }
        other => {
            return Err(StoreError::Corrupt(format!(
                "{month}: unknown provenance '{other}'"
            )));
        }
    };
    Ok(MonthlyRate {
        month,
        proportion,
        provenance,
    })
}

#[async_trait]
impl SnapshotStore for DiskStore {
    async fn load(&self) -> Result<CacheSnapshot, StoreError> {
        let path = self.series_path();
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No CPI snapshot at {}", path.display());
                return Err(StoreError::NotFound);
            }
            Err(e) => return Err(StoreError::Corrupt(format!("{}: {e}", path.display()))),
        };
        let file: SeriesFile = serde_json::from_str(&text)
            .map_err(|e| StoreError::Corrupt(format!("{}: {e}", path.display())))?;
        if file.rows.is_empty() {
            return Err(StoreError::Corrupt(format!(
                "{}: snapshot has no rows",
                path.display()
            )));
        }

        let meta = self.read_meta();
        let fetched_at = meta
            .fetched_at
            .or_else(|| self.series_modified_at())
            .unwrap_or_else(Utc::now);

        let mut series = CpiSeries::new();
        for row in &file.rows {
            series.insert(parse_row(row, &meta, fetched_at)?);
        }
        debug!(
            "Loaded CPI snapshot with {} months from {}",
            series.len(),
            path.display()
        );

        Ok(CacheSnapshot {
            series,
            fetched_at,
            checked_at: meta.checked_at,
            etag: meta.etag,
            last_modified: meta.last_modified,
        })
    }

    async fn save(&self, snapshot: &CacheSnapshot) -> Result<(), StoreError> {
        let mut unofficial_months = BTreeMap::new();
        let rows = snapshot
            .series
            .iter()
            .map(|rate| {
                let tag = match &rate.provenance {
                    Provenance::Official => TAG_OFFICIAL,
                    Provenance::Unofficial {
                        source,
                        recorded_at,
                    } => {
                        unofficial_months.insert(
                            rate.month.to_string(),
                            UnofficialRecord {
                                value: rate.proportion.to_string(),
                                source: source.clone(),
                                timestamp: *recorded_at,
                            },
                        );
                        TAG_BACKUP
                    }
                };
                (
                    rate.month.to_string(),
                    rate.proportion.to_string(),
                    tag.to_string(),
                )
            })
            .collect();

        let file = SeriesFile {
            header: HEADER.iter().map(|h| h.to_string()).collect(),
            rows,
        };
        let json = serde_json::to_vec(&file).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        write_atomic(&self.series_path(), &json)?;

        self.write_meta(&MetaFile {
            etag: snapshot.etag.clone(),
            last_modified: snapshot.last_modified.clone(),
            fetched_at: Some(snapshot.fetched_at),
            checked_at: snapshot.checked_at,
            unofficial_months,
        })?;
        debug!(
            "Saved CPI snapshot with {} months to {}",
            snapshot.series.len(),
            self.dir.display()
        );
        Ok(())
    }

    async fn touch(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut meta = self.read_meta();
        if meta.fetched_at.is_none() {
            meta.fetched_at = self.series_modified_at();
        }
        meta.checked_at = Some(at);
        self.write_meta(&meta)
    }
}
