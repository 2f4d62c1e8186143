/// Configuration module for ReliefNet.
///
/// Handles loading, validating, and providing default configuration values
/// for the alert radius, the translation cache and the text-generation API.
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::translation::Language;
use crate::translation::cache::TranslationSettings;

const CACHE_FILENAME: &str = ".reliefnet_translation_cache.json";

// ── Default value functions ──────────────────────────────────────────

fn default_db_path() -> String {
    "./reliefnet.db".to_string()
}

fn default_radius_km() -> f64 {
    10.0
}

fn default_true() -> bool {
    true
}

fn default_source_language() -> Language {
    Language::English
}

fn default_debounce_ms() -> u64 {
    800
}

fn default_request_timeout_secs() -> u64 {
    20
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    2000
}

fn default_model() -> String {
    "gemini-3-flash-preview".to_string()
}

fn default_api_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_api_key_env() -> String {
    "API_KEY".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default)]
    pub alerts: AlertsConfig,

    #[serde(default)]
    pub translation: TranslationConfig,

    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AlertsConfig {
    #[serde(default = "default_radius_km")]
    pub radius_km: f64,

    #[serde(default = "default_true")]
    pub require_verified: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TranslationConfig {
    #[serde(default = "default_source_language")]
    pub source_language: Language,

    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Empty means `~/.reliefnet_translation_cache.json`.
    #[serde(default)]
    pub cache_path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            alerts: AlertsConfig::default(),
            translation: TranslationConfig::default(),
            generation: GenerationConfig::default(),
        }
    }
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            radius_km: default_radius_km(),
            require_verified: default_true(),
        }
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            source_language: default_source_language(),
            debounce_ms: default_debounce_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            cache_path: String::new(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_base: default_api_base(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// If `config_path` is empty, defaults to `"config.json"`.
    /// If the file does not exist, returns a default config and optionally
    /// generates a template file.
    pub fn load(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            "config.json"
        } else {
            config_path
        };

        if !Path::new(path).exists() {
            info!("{path} not found, using defaults");
            let cfg = Self::default();

            // Generate template only for the default path
            if path == "config.json" {
                match cfg.save(path) {
                    Ok(()) => info!("Generated config template: {path}"),
                    Err(e) => warn!("Failed to generate config template: {e}"),
                }
            }

            return Ok(cfg);
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;

        let cfg: Config = match serde_json::from_str(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid JSON in {path}: {e}");
                warn!("Using default configuration");
                return Ok(Self::default());
            }
        };

        info!("Loaded configuration from {path}");
        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.alerts.radius_km.is_finite() && self.alerts.radius_km > 0.0,
            "alerts.radius_km must be positive"
        );
        anyhow::ensure!(
            self.translation.debounce_ms > 0,
            "translation.debounce_ms must be positive"
        );
        anyhow::ensure!(
            self.translation.request_timeout_secs > 0,
            "translation.request_timeout_secs must be positive"
        );
        anyhow::ensure!(
            !self.generation.model.trim().is_empty(),
            "generation.model must not be empty"
        );
        Ok(())
    }

    /// Resolve the translation cache file, falling back to the home directory.
    #[must_use]
    pub fn translation_cache_path(&self) -> PathBuf {
        if !self.translation.cache_path.is_empty() {
            return PathBuf::from(&self.translation.cache_path);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CACHE_FILENAME)
    }

    /// Timer and retry parameters for [`TranslationCache`](crate::translation::cache::TranslationCache).
    #[must_use]
    pub fn translation_settings(&self) -> TranslationSettings {
        TranslationSettings {
            source_language: self.translation.source_language,
            debounce: Duration::from_millis(self.translation.debounce_ms),
            request_timeout: Duration::from_secs(self.translation.request_timeout_secs),
            max_retries: self.translation.max_retries,
            retry_backoff: Duration::from_millis(self.translation.retry_backoff_ms),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.db_path, "./reliefnet.db");
        assert_eq!(config.alerts.radius_km, 10.0);
        assert!(config.alerts.require_verified);
        assert_eq!(config.translation.source_language, Language::English);
        assert_eq!(config.translation.debounce_ms, 800);
        assert_eq!(config.translation.max_retries, 3);
        assert_eq!(config.generation.model, "gemini-3-flash-preview");
        assert_eq!(config.generation.api_key_env, "API_KEY");
    }

    #[test]
    fn test_load_from_json() {
        let json = r#"{"alerts": {"radius_km": 25.0}, "translation": {"debounce_ms": 300}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.alerts.radius_km, 25.0);
        assert_eq!(config.translation.debounce_ms, 300);
        // Other fields should have defaults
        assert!(config.alerts.require_verified);
        assert_eq!(config.translation.request_timeout_secs, 20);
        assert_eq!(config.db_path, "./reliefnet.db");
    }

    #[test]
    fn test_language_parsed_from_code() {
        let json = r#"{"translation": {"source_language": "hi"}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.translation.source_language, Language::Hindi);
    }

    #[test]
    fn test_validate_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_bad_radius() {
        let mut config = Config::default();
        config.alerts.radius_km = 0.0;
        assert!(config.validate().is_err());
        config.alerts.radius_km = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_debounce() {
        let mut config = Config::default();
        config.translation.debounce_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_translation_settings() {
        let config = Config::default();
        let settings = config.translation_settings();
        assert_eq!(settings.debounce, Duration::from_millis(800));
        assert_eq!(settings.request_timeout, Duration::from_secs(20));
        assert_eq!(settings.retry_backoff, Duration::from_millis(2000));
        assert_eq!(settings.max_retries, 3);
    }

    #[test]
    fn test_explicit_cache_path() {
        let mut config = Config::default();
        config.translation.cache_path = "/tmp/tr.json".to_string();
        assert_eq!(config.translation_cache_path(), PathBuf::from("/tmp/tr.json"));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("absent.json");
        let config = Config::load(&path.to_string_lossy()).unwrap();
        assert_eq!(config.alerts.radius_km, 10.0);
        assert!(!path.exists(), "template is only written for the default path");
    }

    #[test]
    fn test_load_invalid_json_uses_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        let config = Config::load(&path.to_string_lossy()).unwrap();
        assert_eq!(config.translation.debounce_ms, 800);
    }

    #[test]
    fn test_serialization_roundtrip() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.db_path, config.db_path);
        assert_eq!(parsed.generation.model, config.generation.model);
        assert_eq!(parsed.translation.source_language, config.translation.source_language);
    }
}
