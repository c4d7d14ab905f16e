//! Runtime configuration for the persistence service.
//!
//! Loaded from TOML. Every field has a default so an empty file (or no file at
//! all) yields a working setup.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistConfig {
    pub storage: StorageSettings,
    pub loading: LoadingSettings,
    pub assets: AssetSettings,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Explicit save root. When unset the platform data directory is used.
    pub root: Option<PathBuf>,
    pub app_qualifier: String,
    pub app_organization: String,
    pub app_name: String,
    pub slot_suffix: String,
    pub selection_dir: String,
    pub default_slot: String,
    pub keep_backups: bool,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            root: None,
            app_qualifier: "com".to_string(),
            app_organization: "scenepersist".to_string(),
            app_name: "scene_persistence".to_string(),
            slot_suffix: "_SceneObjects.json".to_string(),
            selection_dir: "Selections".to_string(),
            default_slot: "Default".to_string(),
            keep_backups: true,
        }
    }
}

impl StorageSettings {
    /// Resolves the directory every slot file lives under.
    pub fn resolve_root(&self) -> PathBuf {
        if let Some(root) = &self.root {
            return root.clone();
        }
        ProjectDirs::from(&self.app_qualifier, &self.app_organization, &self.app_name)
            .map(|dirs| dirs.data_dir().join("saves"))
            .unwrap_or_else(|| PathBuf::from("saves"))
    }
}

/// Pacing knobs for progressive loading.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadingSettings {
    pub progressive: bool,
    pub target_duration_secs: f32,
    pub assumed_frame_rate: f32,
    pub min_per_cycle: usize,
    pub max_per_cycle: usize,
}

impl Default for LoadingSettings {
    fn default() -> Self {
        Self {
            progressive: true,
            target_duration_secs: 1.0,
            assumed_frame_rate: 60.0,
            min_per_cycle: 1,
            max_per_cycle: 50,
        }
    }
}

impl LoadingSettings {
    /// Number of host cycles expected to fit in the target duration.
    pub fn estimated_cycles(&self) -> usize {
        let cycles = (self.target_duration_secs * self.assumed_frame_rate).ceil();
        if cycles.is_finite() && cycles >= 1.0 {
            cycles as usize
        } else {
            1
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetSettings {
    /// Prefixes tried, in order, in front of a record's asset id.
    pub probe_prefixes: Vec<String>,
}

impl Default for AssetSettings {
    fn default() -> Self {
        Self {
            probe_prefixes: vec![
                String::new(),
                "Prefabs/".to_string(),
                "Prefabs/Objects/".to_string(),
                "Prefabs/Characters/".to_string(),
                "Prefabs/Props/".to_string(),
            ],
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("config file not found at {0}")]
    #[diagnostic(code(config::not_found), help("omit --config to run with defaults"))]
    NotFound(PathBuf),

    #[error("failed to parse config: {0}")]
    #[diagnostic(code(config::parse_error))]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    #[diagnostic(code(config::serialize_error))]
    Serialize(#[from] toml::ser::Error),

    #[error("io error: {0}")]
    #[diagnostic(code(config::io_error))]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    #[diagnostic(code(config::invalid))]
    Invalid(String),
}

impl PersistConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: PersistConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Rejects settings the scheduler cannot make progress with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let loading = &self.loading;
        if loading.min_per_cycle == 0 {
            return Err(ConfigError::Invalid(
                "loading.min_per_cycle must be at least 1".to_string(),
            ));
        }
        if loading.min_per_cycle > loading.max_per_cycle {
            return Err(ConfigError::Invalid(format!(
                "loading.min_per_cycle ({}) exceeds loading.max_per_cycle ({})",
                loading.min_per_cycle, loading.max_per_cycle
            )));
        }
        if !(loading.target_duration_secs > 0.0) {
            return Err(ConfigError::Invalid(
                "loading.target_duration_secs must be positive".to_string(),
            ));
        }
        if !(loading.assumed_frame_rate > 0.0) {
            return Err(ConfigError::Invalid(
                "loading.assumed_frame_rate must be positive".to_string(),
            ));
        }
        if self.storage.slot_suffix.is_empty() {
            return Err(ConfigError::Invalid(
                "storage.slot_suffix must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Convenience constructor for a config rooted at an explicit directory.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let mut config = Self::default();
        config.storage.root = Some(root.into());
        config
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
