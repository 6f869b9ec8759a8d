pub mod disk;
pub mod memory;

use crate::core::cache::SnapshotStore;
use crate::core::config::AppConfig;
use disk::DiskStore;
use memory::MemoryStore;
use std::sync::Arc;
use tracing::warn;

/// Opens the snapshot store under the configured data directory.
/// Falls back to an in-memory store when no data directory can be determined.
pub fn open_store(config: &AppConfig) -> Arc<dyn SnapshotStore> {
    match config.default_data_path() {
        Ok(path) => Arc::new(DiskStore::new(path.join("cache"))),
        Err(e) => {
            warn!("No data directory available ({}), CPI data will not persist", e);
            Arc::new(MemoryStore::new())
        }
    }
}
