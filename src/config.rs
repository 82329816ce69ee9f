use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;

use crate::cluster::SessionBuilder;
use crate::pipeline::Layout;

/// Application configuration loaded from TOML config file.
/// All fields have defaults matching the standard layout — the config file is optional.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory the relative paths below resolve against. Defaults to the
    /// current directory.
    pub root: Option<PathBuf>,
    /// Where the original IMDb exports live.
    pub source_dir: PathBuf,
    /// Parent of the landing, raw and curated zones.
    pub datalake_dir: PathBuf,
    /// Where the analytics artifacts are written.
    pub analytics_dir: PathBuf,
    /// Partitioned backend settings.
    pub cluster: ClusterConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            root: None,
            source_dir: PathBuf::from("data_original"),
            datalake_dir: PathBuf::from("datalake"),
            analytics_dir: PathBuf::from("analytics"),
            cluster: ClusterConfig::default(),
        }
    }
}

/// Partitioned backend configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Base path of the partitioned lake, relative to the root.
    pub base_path: PathBuf,
    /// Name reported in the session logs.
    pub app_name: String,
    /// Number of hash partitions per table.
    pub partitions: usize,
    /// Worker threads. 0 = auto-detect (all cores).
    pub workers: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("datalake_cluster"),
            app_name: "IMDb Pipeline (partitioned)".to_string(),
            partitions: 8,
            workers: 0,
        }
    }
}

impl AppConfig {
    /// Load config from `~/.config/imdblake/config.toml`.
    /// Returns default config if file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Load a specific config file, falling back to defaults on any error.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<AppConfig>(&contents) {
                Ok(config) => {
                    log::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                Self::default()
            }
        }
    }

    /// Resolve the root directory: CLI > config > current directory.
    pub fn resolve_root(&self, cli_root: Option<PathBuf>) -> PathBuf {
        cli_root
            .or_else(|| self.root.clone())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Local zone layout under `root`.
    pub fn layout(&self, root: &Path) -> Layout {
        Layout::new(
            root.join(&self.source_dir),
            root.join(&self.datalake_dir),
            root.join(&self.analytics_dir),
        )
    }

    /// Session builder for the partitioned backend under `root`.
    pub fn session_builder(&self, root: &Path) -> SessionBuilder {
        SessionBuilder::new()
            .app_name(&self.cluster.app_name)
            .source_dir(root.join(&self.source_dir))
            .base_path(root.join(&self.cluster.base_path))
            .partitions(self.cluster.partitions)
            .workers(self.cluster.workers)
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
