//! Explicit runtime configuration for importer, exporter and batch runs.
//!
//! # Responsibility
//! - Carry every tunable as a value passed into constructors.
//! - Load the same shape from TOML for the CLI.
//!
//! # Invariants
//! - Missing TOML keys fall back to `Default` values.
//! - Nothing here touches process-wide state.

use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_CONFLICT_RETRIES: u32 = 1;

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read config: {err}"),
            Self::Parse(err) => write!(f, "invalid config: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
        }
    }
}

/// Storage connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// How long a writer waits on a locked database before reporting a conflict.
    pub busy_timeout_ms: u64,
}

impl StoreConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Extra attempts after a repository conflict.
    pub conflict_retries: u32,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            conflict_retries: DEFAULT_CONFLICT_RETRIES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Replace an existing `<id>.xml`; when false an existing file is an error.
    pub overwrite: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self { overwrite: true }
    }
}

/// Top-level configuration for one sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub store: StoreConfig,
    pub import: ImportConfig,
    pub export: ExportConfig,
    /// Worker pool size; `None` sizes the pool to the host.
    pub workers: Option<usize>,
}

impl SyncConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(ConfigError::Parse)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_toml_str(&text)
    }

    /// Effective worker count, never zero.
    pub fn worker_count(&self) -> usize {
        match self.workers {
            Some(count) if count > 0 => count,
            _ => std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SyncConfig;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = SyncConfig::from_toml_str("").unwrap();
        assert_eq!(config, SyncConfig::default());
        assert_eq!(config.import.conflict_retries, 1);
        assert!(config.export.overwrite);
        assert!(config.worker_count() >= 1);
    }

    #[test]
    fn partial_toml_overrides_selected_keys() {
        let config = SyncConfig::from_toml_str(
            "workers = 3\n[store]\nbusy_timeout_ms = 250\n[import]\nconflict_retries = 0\n",
        )
        .unwrap();
        assert_eq!(config.worker_count(), 3);
        assert_eq!(config.store.busy_timeout_ms, 250);
        assert_eq!(config.import.conflict_retries, 0);
        assert!(config.export.overwrite);
    }

    #[test]
    fn zero_workers_falls_back_to_host_size() {
        let config = SyncConfig {
            workers: Some(0),
            ..SyncConfig::default()
        };
        assert!(config.worker_count() >= 1);
    }

    #[test]
    fn unknown_types_are_rejected() {
        assert!(SyncConfig::from_toml_str("workers = \"many\"").is_err());
    }
}
