//! TOML configuration and environment credentials.
//!
//! Tuning lives in an optional TOML file (`--config`, default
//! `./config/docchat.toml`); a missing file means built-in defaults. The API
//! credential and the model override come from the environment and are read
//! once at startup via [`Credentials::from_env`].

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use docchat_core::chunk::{ChunkParams, DEFAULT_MAX_CHARS, DEFAULT_OVERLAP_CHARS};
use docchat_core::search::{RankParams, DEFAULT_RELEVANCE_FLOOR, DEFAULT_TOP_K};

/// Environment variable holding the completion API key.
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
/// Environment variable overriding the completion model name.
pub const MODEL_VAR: &str = "OPENAI_MODEL_NAME";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHARS,
            overlap_chars: DEFAULT_OVERLAP_CHARS,
        }
    }
}

fn default_max_chars() -> usize {
    DEFAULT_MAX_CHARS
}
fn default_overlap_chars() -> usize {
    DEFAULT_OVERLAP_CHARS
}

impl ChunkingConfig {
    pub fn params(&self) -> ChunkParams {
        ChunkParams {
            max_chars: self.max_chars,
            overlap_chars: self.overlap_chars,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_relevance_floor")]
    pub relevance_floor: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            relevance_floor: DEFAULT_RELEVANCE_FLOOR,
        }
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}
fn default_relevance_floor() -> f64 {
    DEFAULT_RELEVANCE_FLOOR
}

impl RetrievalConfig {
    pub fn params(&self) -> RankParams {
        RankParams {
            top_k: self.top_k,
            relevance_floor: self.relevance_floor,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Forward prior conversation turns to the model.
    #[serde(default)]
    pub include_history: bool,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            include_history: false,
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_temperature() -> f64 {
    0.7
}
fn default_max_tokens() -> u32 {
    500
}
fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7860".to_string()
}

/// Load configuration from `path`, falling back to defaults when the file
/// does not exist.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate a TOML configuration document.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.max_chars == 0 {
        anyhow::bail!("chunking.max_chars must be > 0");
    }
    if config.chunking.overlap_chars >= config.chunking.max_chars {
        anyhow::bail!("chunking.overlap_chars must be < chunking.max_chars");
    }

    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if !(0.0..1.0).contains(&config.retrieval.relevance_floor) {
        anyhow::bail!("retrieval.relevance_floor must be in [0.0, 1.0)");
    }

    if !(0.0..=2.0).contains(&config.completion.temperature) {
        anyhow::bail!("completion.temperature must be in [0.0, 2.0]");
    }
    if config.completion.max_tokens < 1 {
        anyhow::bail!("completion.max_tokens must be >= 1");
    }
    if config.completion.base_url.trim().is_empty() {
        anyhow::bail!("completion.base_url must not be empty");
    }

    Ok(())
}

/// Credentials and overrides read from the environment at startup.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub model_override: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("model_override", &self.model_override)
            .finish()
    }
}

impl Credentials {
    /// Read [`API_KEY_VAR`] and [`MODEL_VAR`].
    ///
    /// A missing or empty API key is an error; callers treat it as fatal.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(API_KEY_VAR)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "{} environment variable not set.\n\nSet it with:\n  export {}=\"your-api-key\"\n  export {}=\"your-chosen-model\"  # optional",
                    API_KEY_VAR,
                    API_KEY_VAR,
                    MODEL_VAR
                )
            })?;
        let model_override = std::env::var(MODEL_VAR)
            .ok()
            .filter(|m| !m.trim().is_empty());

        Ok(Self {
            api_key,
            model_override,
        })
    }

    /// The model to request: the environment override, else the configured one.
    pub fn model<'a>(&'a self, config: &'a CompletionConfig) -> &'a str {
        self.model_override.as_deref().unwrap_or(&config.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.chunking.max_chars, 1000);
        assert_eq!(config.chunking.overlap_chars, 100);
        assert_eq!(config.retrieval.top_k, 3);
        assert!((config.retrieval.relevance_floor - 0.1).abs() < 1e-12);
        assert!((config.completion.temperature - 0.7).abs() < 1e-12);
        assert_eq!(config.completion.max_tokens, 500);
        assert!(!config.completion.include_history);
    }

    #[test]
    fn partial_sections_fill_defaults() {
        let config =
            parse_config("[chunking]\nmax_chars = 400\n\n[completion]\nmodel = \"m\"\n").unwrap();
        assert_eq!(config.chunking.max_chars, 400);
        assert_eq!(config.chunking.overlap_chars, 100);
        assert_eq!(config.completion.model, "m");
        assert_eq!(config.completion.max_tokens, 500);
    }

    #[test]
    fn rejects_overlap_not_below_max() {
        let err = parse_config("[chunking]\nmax_chars = 100\noverlap_chars = 100\n").unwrap_err();
        assert!(err.to_string().contains("overlap_chars"));
    }

    #[test]
    fn rejects_zero_top_k_and_bad_floor() {
        assert!(parse_config("[retrieval]\ntop_k = 0\n").is_err());
        assert!(parse_config("[retrieval]\nrelevance_floor = 1.5\n").is_err());
    }

    #[test]
    fn missing_file_means_defaults() {
        let config = load_config(Path::new("/nonexistent/docchat.toml")).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:7860");
    }

    #[test]
    fn model_override_wins() {
        let creds = Credentials {
            api_key: "k".into(),
            model_override: Some("override".into()),
        };
        let cfg = CompletionConfig::default();
        assert_eq!(creds.model(&cfg), "override");

        let creds = Credentials {
            api_key: "k".into(),
            model_override: None,
        };
        assert_eq!(creds.model(&cfg), "gpt-3.5-turbo");
    }
}
