use crate::core::month::{Locale, MonthKey};
use crate::core::source::{ValueKind, ValueUnit};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

pub const DEFAULT_PRIMARY_URL: &str = "https://apis.datos.gob.ar/series/api/series?ids=145.3_INGNACUAL_DICI_M_38&format=json&start_date=2016-01&limit=1000";
pub const DEFAULT_BACKUP_URL: &str = "https://api.argentinadatos.com/v1/finanzas/indices/inflacion";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ContractConfig {
    pub base_amount: Decimal,
    pub start_month: MonthKey,
    #[serde(default = "default_period_months")]
    pub period_months: u32,
    pub horizon_months: Option<u32>,
}

fn default_period_months() -> u32 {
    3
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PrimarySourceConfig {
    pub url: String,
    #[serde(default)]
    pub value_kind: ValueKind,
}

impl Default for PrimarySourceConfig {
    fn default() -> Self {
        PrimarySourceConfig {
            url: DEFAULT_PRIMARY_URL.to_string(),
            value_kind: ValueKind::Index,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BackupSourceConfig {
    pub url: String,
    #[serde(default)]
    pub value_unit: ValueUnit,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SourcesConfig {
    #[serde(default)]
    pub primary: PrimarySourceConfig,
    pub backup: Option<BackupSourceConfig>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        SourcesConfig {
            primary: PrimarySourceConfig::default(),
            backup: Some(BackupSourceConfig {
                url: DEFAULT_BACKUP_URL.to_string(),
                value_unit: ValueUnit::Percent,
            }),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub retries: usize,
    pub retry_delay_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            timeout_secs: 20,
            retries: 1,
            retry_delay_ms: 500,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    /// How long a snapshot holding unofficial months is trusted before the
    /// primary source is asked again.
    pub recheck_hours: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig { recheck_hours: 24 }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct ScheduleConfig {
    pub locale: Locale,
    /// Emit months beyond next month instead of stopping there.
    pub show_future: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub contract: ContractConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    pub data_path: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("ar", "rentcpi", "rentcpi")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("ar", "rentcpi", "rentcpi")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config.sanitized())
    }

    /// Trims source URLs; an empty primary URL means the default, an empty
    /// backup URL disables the backup.
    pub fn sanitized(mut self) -> Self {
        let primary_url = self.sources.primary.url.trim();
        self.sources.primary.url = if primary_url.is_empty() {
            DEFAULT_PRIMARY_URL.to_string()
        } else {
            primary_url.to_string()
        };

        self.sources.backup = self.sources.backup.take().and_then(|mut backup| {
            backup.url = backup.url.trim().to_string();
            (!backup.url.is_empty()).then_some(backup)
        });
        self
    }
}
