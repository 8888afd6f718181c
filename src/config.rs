use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Upper bound on concurrent per-chunk completion calls.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_version: default_api_version(),
            timeout_secs: default_timeout_secs(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

fn default_endpoint() -> String {
    "https://api.anthropic.com/v1/messages".to_string()
}
fn default_model() -> String {
    "claude-3-sonnet-20240229".to_string()
}
fn default_api_version() -> String {
    "2023-06-01".to_string()
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_max_concurrency() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Token budget per chunk before the prompt reserve is subtracted.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    /// Tokens held back from each chunk for the wrapping prompt.
    #[serde(default = "default_prompt_reserve")]
    pub prompt_reserve: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            prompt_reserve: default_prompt_reserve(),
        }
    }
}

fn default_max_tokens() -> usize {
    4000
}
fn default_prompt_reserve() -> usize {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_storage_dir")]
    pub dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: default_storage_dir(),
        }
    }
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("./data")
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read config file {}: {e}", path.display())))?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("failed to parse config file: {e}")))?;

    validate(&config)?;
    Ok(config)
}

/// Load the config file if it exists, otherwise fall back to defaults.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(Config::default())
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.max_tokens == 0 {
        return Err(Error::Config("chunking.max_tokens must be > 0".into()));
    }
    if config.chunking.max_tokens <= config.chunking.prompt_reserve {
        return Err(Error::Config(
            "chunking.max_tokens must exceed chunking.prompt_reserve".into(),
        ));
    }
    if config.api.max_concurrency == 0 {
        return Err(Error::Config("api.max_concurrency must be >= 1".into()));
    }
    if config.api.endpoint.is_empty() {
        return Err(Error::Config("api.endpoint must not be empty".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(validate(&config).is_ok());
        assert_eq!(config.chunking.max_tokens, 4000);
        assert_eq!(config.chunking.prompt_reserve, 500);
    }

    #[test]
    fn rejects_reserve_at_or_above_budget() {
        let mut config = Config::default();
        config.chunking.max_tokens = 500;
        config.chunking.prompt_reserve = 500;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn parses_partial_toml() {
        let config: Config = toml::from_str(
            r#"
[chunking]
max_tokens = 2000

[storage]
dir = "/tmp/clauselens"
"#,
        )
        .unwrap();
        assert_eq!(config.chunking.max_tokens, 2000);
        assert_eq!(config.chunking.prompt_reserve, 500);
        assert_eq!(config.api.max_concurrency, 4);
    }
}
