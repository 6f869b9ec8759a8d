pub mod backup_api;
pub mod series_api;
pub mod util;

pub use backup_api::BackupApiProvider;
pub use series_api::SeriesApiProvider;
