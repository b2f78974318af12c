//! Wayfinder configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main Wayfinder configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Methodology tuning knobs
    pub methodology: MethodologyConfig,

    /// Storage configuration
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .wayfinder.yml
        let local_config = PathBuf::from(".wayfinder.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/wayfinder/wayfinder.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("wayfinder").join("wayfinder.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name ("anthropic" or "openai")
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds; bounds how long a turn can wait on
    /// the model before taking the fallback path
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 4096,
            timeout_ms: 60_000,
        }
    }
}

impl LlmConfig {
    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env)
            .context(format!("API key not found. Set the {} environment variable.", self.api_key_env))
    }
}

/// Methodology tuning knobs.
///
/// The convergence threshold is an empirical knob, not a principled cutoff;
/// it caps how long a phase may wander through discovery before being pulled
/// toward the completion check.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MethodologyConfig {
    /// User turns within a phase before discovery is forced to converge
    #[serde(rename = "convergence-threshold")]
    pub convergence_threshold: u32,

    /// Closed keyword set granting consent to advance phases
    #[serde(rename = "transition-keywords")]
    pub transition_keywords: Vec<String>,

    /// Word budget for the transcript tail sent to the model
    #[serde(rename = "context-window-words")]
    pub context_window_words: usize,
}

impl Default for MethodologyConfig {
    fn default() -> Self {
        Self {
            convergence_threshold: 4,
            transition_keywords: vec![
                "ready".to_string(),
                "move on".to_string(),
                "proceed".to_string(),
                "next phase".to_string(),
                "let's continue".to_string(),
            ],
            context_window_words: 150,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for the session checkpoint store
    #[serde(rename = "store-dir")]
    pub store_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        // Use XDG data directory (~/.local/share/wayfinder on Linux)
        let store_dir = dirs::data_dir()
            .map(|d| d.join("wayfinder"))
            .unwrap_or_else(|| PathBuf::from(".wayfinder"))
            .to_string_lossy()
            .into_owned();

        Self { store_dir }
    }
}
