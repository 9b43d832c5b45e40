//! Configuration management for treeprint
//!
//! Configuration is layered with figment, lowest priority first:
//! embedded defaults, `treeprint.toml` in the working directory (or the file given
//! with `--config`), then `TREEPRINT_` prefixed environment variables. CLI flags are
//! applied on top by the caller.

use crate::error::ConfigError;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// Embed the default config at compile time
const DEFAULT_CONFIG: &str = include_str!("../../default-config.toml");

/// Repository-local config file picked up when no explicit file is given
pub const LOCAL_CONFIG_FILE: &str = "treeprint.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeprintConfig {
    pub pipeline: PipelineConfig,
    pub source: SourceConfig,
    pub storage: StorageConfig,
}

/// Worker pool and queue sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of analysis workers (0 = auto-detect)
    pub max_workers: usize,
    /// Cores left for the coordinator threads when auto-detecting
    pub reserved_cores: usize,
    /// Queue capacity multiplier (capacity = workers * multiplier)
    pub queue_multiplier: usize,
    /// Progress redraw interval
    pub tick_ms: u64,
}

/// Input enumeration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub pattern: String,
    pub recursive: bool,
    pub follow_symlinks: bool,
    pub max_file_size_mb: u64,
}

/// Storage sink settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub default_prefix: String,
    pub database_path: PathBuf,
    pub table: String,
}

impl PipelineConfig {
    /// Resolve the worker count from configuration and available cores.
    ///
    /// An explicit `max_workers` wins; otherwise every core but `reserved_cores` is
    /// used. Always at least one worker.
    pub fn worker_count(&self) -> usize {
        if self.max_workers > 0 {
            return self.max_workers;
        }
        let available_cores = num_cpus::get();
        std::cmp::max(1, available_cores.saturating_sub(self.reserved_cores))
    }

    /// Bounded queue capacity for the given worker count
    pub fn queue_capacity(&self, workers: usize) -> usize {
        std::cmp::max(1, workers * self.queue_multiplier)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_workers: 0,
            reserved_cores: 1,
            queue_multiplier: 4,
            tick_ms: 100,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            pattern: "*".to_string(),
            recursive: false,
            follow_symlinks: false,
            max_file_size_mb: 0,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            default_prefix: "t-hash-".to_string(),
            database_path: PathBuf::from("treeprint.sqlite"),
            table: "tree_hashes".to_string(),
        }
    }
}

impl TreeprintConfig {
    /// Load configuration, replacing the local config file with `custom_config` if given.
    ///
    /// An explicit file must exist; the local `treeprint.toml` is optional.
    pub fn load_with_custom_config(custom_config: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Toml::string(DEFAULT_CONFIG));

        figment = match custom_config {
            Some(path) if !path.is_file() => {
                return Err(ConfigError::Invalid {
                    key: "--config",
                    reason: format!("{} is not a readable file", path.display()),
                });
            }
            Some(path) => figment.merge(Toml::file_exact(path)),
            None => figment.merge(Toml::file_exact(LOCAL_CONFIG_FILE)),
        };

        // Environment variables always have highest priority
        figment = figment.merge(Env::prefixed("TREEPRINT_").split("__"));

        let config: TreeprintConfig = figment.extract().map_err(Box::new)?;
        config.validate()?;
        tracing::debug!(?config, "Loaded configuration");
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.reserved_cores == 0 {
            return Err(ConfigError::Invalid {
                key: "pipeline.reserved_cores",
                reason: "at least one core stays with the coordinator".to_string(),
            });
        }
        if self.pipeline.queue_multiplier == 0 {
            return Err(ConfigError::Invalid {
                key: "pipeline.queue_multiplier",
                reason: "must be at least 1".to_string(),
            });
        }
        let table_ok = !self.storage.table.is_empty()
            && self
                .storage
                .table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !table_ok {
            return Err(ConfigError::Invalid {
                key: "storage.table",
                reason: format!("{:?} is not a plain SQL identifier", self.storage.table),
            });
        }
        Ok(())
    }
}

impl Default for TreeprintConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            source: SourceConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_embedded_defaults_match_struct_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("empty.toml");
        fs::write(&path, "").unwrap();

        let config = TreeprintConfig::load_with_custom_config(Some(&path)).unwrap();
        let defaults = TreeprintConfig::default();

        assert_eq!(config.pipeline.max_workers, defaults.pipeline.max_workers);
        assert_eq!(config.pipeline.reserved_cores, defaults.pipeline.reserved_cores);
        assert_eq!(config.pipeline.queue_multiplier, defaults.pipeline.queue_multiplier);
        assert_eq!(config.source.pattern, defaults.source.pattern);
        assert_eq!(config.storage.default_prefix, defaults.storage.default_prefix);
        assert_eq!(config.storage.table, defaults.storage.table);
    }

    #[test]
    fn test_custom_config_overrides_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("custom.toml");
        fs::write(
            &path,
            "[pipeline]\nmax_workers = 3\n\n[source]\nrecursive = true\npattern = \"*.pdf\"\n",
        )
        .unwrap();

        let config = TreeprintConfig::load_with_custom_config(Some(&path)).unwrap();
        assert_eq!(config.pipeline.max_workers, 3);
        assert_eq!(config.pipeline.worker_count(), 3);
        assert!(config.source.recursive);
        assert_eq!(config.source.pattern, "*.pdf");
        // Untouched sections keep their defaults
        assert_eq!(config.storage.table, "tree_hashes");
    }

    #[test]
    fn test_invalid_table_name_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.toml");
        fs::write(&path, "[storage]\ntable = \"hashes; DROP TABLE x\"\n").unwrap();

        let result = TreeprintConfig::load_with_custom_config(Some(&path));
        assert!(matches!(result, Err(ConfigError::Invalid { key: "storage.table", .. })));
    }

    #[test]
    fn test_missing_custom_config_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.toml");

        let result = TreeprintConfig::load_with_custom_config(Some(&missing));
        assert!(matches!(result, Err(ConfigError::Invalid { key: "--config", .. })));

        let result = TreeprintConfig::load_with_custom_config(Some(temp_dir.path()));
        assert!(matches!(result, Err(ConfigError::Invalid { key: "--config", .. })));
    }

    #[test]
    fn test_zero_reserved_cores_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cores.toml");
        fs::write(&path, "[pipeline]\nreserved_cores = 0\n").unwrap();

        let result = TreeprintConfig::load_with_custom_config(Some(&path));
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { key: "pipeline.reserved_cores", .. })
        ));
    }

    #[test]
    fn test_worker_count_reserves_cores() {
        let config = PipelineConfig::default();
        let workers = config.worker_count();
        assert!(workers >= 1);
        assert!(workers <= num_cpus::get());
        assert_eq!(config.queue_capacity(2), 8);
    }
}
