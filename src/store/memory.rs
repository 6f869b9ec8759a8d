use crate::core::cache::{CacheSnapshot, SnapshotStore, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tracing::debug;

/// In-memory snapshot store, used when no data directory is available and in tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Option<CacheSnapshot>>,
    saves: AtomicUsize,
    touches: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: CacheSnapshot) -> Self {
        Self {
            inner: Mutex::new(Some(snapshot)),
            ..Self::default()
        }
    }

    pub async fn snapshot(&self) -> Option<CacheSnapshot> {
        self.inner.lock().await.clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn touch_count(&self) -> usize {
        self.touches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn load(&self) -> Result<CacheSnapshot, StoreError> {
        let snapshot = self.inner.lock().await.clone();
        match snapshot {
            Some(snapshot) => {
                debug!("Snapshot HIT");
                Ok(snapshot)
            }
            None => {
                debug!("Snapshot MISS");
                Err(StoreError::NotFound)
            }
        }
    }

    async fn save(&self, snapshot: &CacheSnapshot) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        debug!("Snapshot PUT");
        *inner = Some(snapshot.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn touch(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let snapshot = inner.as_mut().ok_or(StoreError::NotFound)?;
        snapshot.checked_at = Some(at);
        self.touches.fetch_add(1, Ordering::SeqCst);
        debug!("Snapshot TOUCH");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::series::CpiSeries;
    use chrono::{Duration, TimeZone};

    #[tokio::test]
    async fn test_memory_store_roundtrip_and_touch() {
        let store = MemoryStore::new();
        assert!(matches!(store.load().await, Err(StoreError::NotFound)));
        assert!(store.touch(Utc::now()).await.is_err());

        let fetched_at = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap();
        store
            .save(&CacheSnapshot::new(CpiSeries::new(), fetched_at))
            .await
            .unwrap();
        assert_eq!(store.save_count(), 1);

        let later = fetched_at + Duration::hours(3);
        store.touch(later).await.unwrap();
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.fetched_at, fetched_at);
        assert_eq!(loaded.checked_at, Some(later));
        assert_eq!(store.touch_count(), 1);
    }
}
