//! Engine configuration management.

use coldcase_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Tuning for retrieval, quota and history retention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Evidence folder; relative paths are resolved against the workspace
    #[serde(default = "default_evidence_dir")]
    pub evidence_dir: PathBuf,

    /// Number of documents retrieved per question
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Maximum characters per excerpt handed to the model
    #[serde(default = "default_max_excerpt_chars")]
    pub max_excerpt_chars: usize,

    /// Questions allowed per user per window
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,

    /// Length of the quota window
    #[serde(default = "default_window_hours")]
    pub window_hours: u32,

    /// Chat records kept per user
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_evidence_dir() -> PathBuf {
    PathBuf::from("evidence")
}

fn default_top_k() -> usize {
    3
}

fn default_max_excerpt_chars() -> usize {
    1500
}

fn default_daily_limit() -> u32 {
    15
}

fn default_window_hours() -> u32 {
    24
}

fn default_history_limit() -> usize {
    5
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            evidence_dir: default_evidence_dir(),
            top_k: default_top_k(),
            max_excerpt_chars: default_max_excerpt_chars(),
            daily_limit: default_daily_limit(),
            window_hours: default_window_hours(),
            history_limit: default_history_limit(),
        }
    }
}

impl EngineConfig {
    /// Absolute evidence folder for a workspace.
    pub fn evidence_path(&self, workspace: &Path) -> PathBuf {
        if self.evidence_dir.is_absolute() {
            self.evidence_dir.clone()
        } else {
            workspace.join(&self.evidence_dir)
        }
    }

    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.window_hours))
    }
}

/// Load the engine configuration.
///
/// Reads `.coldcase/engine.yaml` when present, otherwise returns defaults.
pub fn load_config(workspace: &Path) -> AppResult<EngineConfig> {
    let config_path = get_config_path(workspace);

    if !config_path.exists() {
        tracing::debug!("No engine config at {:?}, using defaults", config_path);
        return Ok(EngineConfig::default());
    }

    let content = fs::read_to_string(&config_path).map_err(|e| {
        AppError::Config(format!("Failed to read config at {:?}: {}", config_path, e))
    })?;

    let config: EngineConfig = serde_yaml::from_str(&content).map_err(|e| {
        AppError::Config(format!("Failed to parse config at {:?}: {}", config_path, e))
    })?;

    if config.window_hours == 0 {
        return Err(AppError::Config(
            "window_hours must be at least 1".to_string(),
        ));
    }

    tracing::debug!("Loaded engine config from {:?}", config_path);
    Ok(config)
}

/// Save the engine configuration.
pub fn save_config(workspace: &Path, config: &EngineConfig) -> AppResult<()> {
    let config_path = get_config_path(workspace);

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let yaml = serde_yaml::to_string(config)?;
    fs::write(&config_path, yaml).map_err(|e| {
        AppError::Config(format!("Failed to write config to {:?}: {}", config_path, e))
    })?;

    Ok(())
}

/// Path to the engine config file.
pub fn get_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".coldcase").join("engine.yaml")
}

/// Path to the SQLite database holding history, quota and index snapshots.
pub fn get_database_path(workspace: &Path) -> PathBuf {
    workspace.join(".coldcase").join("coldcase.sqlite")
}
