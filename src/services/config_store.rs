// Configuration Storage Service
// Application settings with versioned backups, plus the trained model record

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::models::{ModelConfig, ThresholdConfig, WeightConfig};
use crate::services::embeddings::DEFAULT_HASHING_DIMENSIONS;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid weights: {0}")]
    InvalidWeights(String),
    #[error("Threshold {0} is outside [0, 1]")]
    InvalidThreshold(f64),
    #[error("Invalid thresholds: {0}")]
    InvalidThresholds(String),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> ConfigError + '_ {
    move |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub proxy: Option<String>,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub api_keys: HashMap<String, String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            language: default_language(),
            proxy: None,
            embedding: EmbeddingConfig::default(),
            detection: DetectionConfig::default(),
            api_keys: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingConfig {
    /// "hashing" (offline) or "http"
    #[serde(default = "default_provider")]
    pub provider: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            base_url: None,
            dimensions: DEFAULT_HASHING_DIMENSIONS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DetectionConfig {
    #[serde(default)]
    pub weights: WeightConfig,
    #[serde(default)]
    pub thresholds: ThresholdConfig,
}

fn default_version() -> String { env!("CARGO_PKG_VERSION").to_string() }
fn default_language() -> String { "spanish".to_string() }
fn default_provider() -> String { "hashing".to_string() }
fn default_dimensions() -> usize { DEFAULT_HASHING_DIMENSIONS }

pub struct ConfigStore {
    config_dir: PathBuf,
    config_file: PathBuf,
}

impl ConfigStore {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_file = config_dir.join("config.json");
        Self { config_dir, config_file }
    }

    /// Get default config directory
    pub fn default_config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("plagiscope"))
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Ensure config directory exists
    pub fn ensure_dir(&self) -> Result<(), ConfigError> {
        fs::create_dir_all(&self.config_dir).map_err(io_err(&self.config_dir))
    }

    /// Load configuration; defaults when the file does not exist yet
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        if !self.config_file.exists() {
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&self.config_file).map_err(io_err(&self.config_file))?;
        let config: AppConfig = serde_json::from_str(&content)?;
        validate_thresholds(&config.detection.thresholds)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        self.ensure_dir()?;

        if self.config_file.exists() {
            self.create_backup()?;
        }

        let content = serde_json::to_string_pretty(config)?;
        fs::write(&self.config_file, content).map_err(io_err(&self.config_file))
    }

    fn create_backup(&self) -> Result<(), ConfigError> {
        let backup_dir = self.config_dir.join("backups");
        fs::create_dir_all(&backup_dir).map_err(io_err(&backup_dir))?;

        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S%.3f");
        let backup_file = backup_dir.join(format!("config_{}.json", timestamp));

        fs::copy(&self.config_file, &backup_file).map_err(io_err(&backup_file))?;

        // Keep only last 10 backups
        self.cleanup_old_backups(&backup_dir, 10)
    }

    fn cleanup_old_backups(&self, backup_dir: &Path, keep: usize) -> Result<(), ConfigError> {
        let mut entries: Vec<_> = fs::read_dir(backup_dir)
            .map_err(io_err(backup_dir))?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
            .collect();

        if entries.len() <= keep {
            return Ok(());
        }

        // Oldest first; names embed the timestamp
        entries.sort_by_key(|e| e.file_name());

        for entry in entries.iter().take(entries.len() - keep) {
            let _ = fs::remove_file(entry.path());
        }

        Ok(())
    }

    pub fn get_api_key(&self, provider: &str) -> Result<Option<String>, ConfigError> {
        let config = self.load()?;
        Ok(config.api_keys.get(provider).cloned())
    }

    pub fn set_api_key(&self, provider: &str, key: &str) -> Result<(), ConfigError> {
        let mut config = self.load()?;
        config.api_keys.insert(provider.to_string(), key.to_string());
        self.save(&config)
    }

    pub fn delete_api_key(&self, provider: &str) -> Result<(), ConfigError> {
        let mut config = self.load()?;
        config.api_keys.remove(provider);
        self.save(&config)
    }
}

/// Tiers must lie in [0, 1] and satisfy high >= moderate >= low.
pub fn validate_thresholds(thresholds: &ThresholdConfig) -> Result<(), ConfigError> {
    for tier in [
        thresholds.high_plagiarism,
        thresholds.moderate_plagiarism,
        thresholds.low_plagiarism,
    ] {
        if !(0.0..=1.0).contains(&tier) {
            return Err(ConfigError::InvalidThreshold(tier));
        }
    }
    if !thresholds.is_monotonic() {
        return Err(ConfigError::InvalidThresholds(format!(
            "expected high >= moderate >= low, got {:?}",
            thresholds
        )));
    }
    Ok(())
}

// ============ Model Configuration Record ============

/// Reject records whose weights or threshold cannot drive a detector.
pub fn validate_model_config(config: &ModelConfig) -> Result<ModelConfig, ConfigError> {
    let weights = config.weights.renormalized().ok_or_else(|| {
        ConfigError::InvalidWeights(format!(
            "weights must be non-negative with a positive sum, got {:?}",
            config.weights
        ))
    })?;

    if !(0.0..=1.0).contains(&config.threshold) {
        return Err(ConfigError::InvalidThreshold(config.threshold));
    }

    Ok(ModelConfig {
        weights,
        ..config.clone()
    })
}

pub fn save_model_config(path: &Path, config: &ModelConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content).map_err(io_err(path))?;
    info!("[CONFIG] Model configuration saved to {}", path.display());
    Ok(())
}

pub fn load_model_config(path: &Path) -> Result<ModelConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(io_err(path))?;
    let config: ModelConfig = serde_json::from_str(&content)?;
    let config = validate_model_config(&config)?;
    info!("[CONFIG] Model configuration loaded from {}", path.display());
    Ok(config)
}
