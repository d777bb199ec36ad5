//! Configuration management for data_agent.
//!
//! Configuration can be set via environment variables:
//! - `OPENAI_API_KEY` - Optional. Falls back to the key saved in settings; a
//!   model call without any key fails with "API key not set".
//! - `OPENAI_MODEL` - Optional. Chat model. Defaults to `gpt-4o-mini`.
//! - `OPENAI_BASE_URL` - Optional. OpenAI-compatible API root. Defaults to
//!   `https://api.openai.com/v1`.
//! - `MAX_ITERATIONS` - Optional. Maximum agent loop iterations. Defaults to `10`.
//! - `EXPORT_DIR` - Optional. Where exported CSV files are written. Defaults
//!   to the current directory.
//! - `API_CACHE_TTL_SECS` - Optional. Lifetime of cached GET responses of
//!   the `api_call` tool. Defaults to `300`.
//! - `DATA_AGENT_HOME` - Optional. Directory holding `settings.json`.
//!   Defaults to `./.data-agent`.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::agent::DEFAULT_MAX_ITERATIONS;
use crate::llm::{DEFAULT_BASE_URL, DEFAULT_MODEL};

const DEFAULT_CACHE_TTL_SECS: u64 = 300;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Agent configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// OpenAI API key
    pub api_key: Option<String>,

    /// Chat-completion model identifier
    pub model: String,

    /// API root, without the `/chat/completions` suffix
    pub api_base_url: String,

    /// Maximum iterations for the agent loop
    pub max_iterations: usize,

    /// Directory exported files are written to
    pub export_dir: PathBuf,

    /// How long a GET response stays in the `api_call` cache
    pub api_cache_ttl: Duration,

    /// Directory holding persisted settings
    pub data_dir: PathBuf,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());

        let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let api_base_url =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let max_iterations = parse_env("MAX_ITERATIONS", DEFAULT_MAX_ITERATIONS)?;
        if max_iterations == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_ITERATIONS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let export_dir = std::env::var("EXPORT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

        let api_cache_ttl =
            Duration::from_secs(parse_env("API_CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS)?);

        let data_dir = std::env::var("DATA_AGENT_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".data-agent"));

        Ok(Self {
            api_key,
            model,
            api_base_url,
            max_iterations,
            export_dir,
            api_cache_ttl,
            data_dir,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(api_key: Option<String>, model: String, export_dir: PathBuf) -> Self {
        Self {
            api_key,
            model,
            api_base_url: DEFAULT_BASE_URL.to_string(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            export_dir,
            api_cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            data_dir: PathBuf::from(".data-agent"),
        }
    }

    /// Require an API key, for commands that cannot run without one.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("OPENAI_API_KEY".to_string()))
    }
}

fn parse_env<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue(name.to_string(), format!("{}", e))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_uses_defaults() {
        let config = Config::new(None, "gpt-4o-mini".to_string(), PathBuf::from("/tmp/out"));
        assert_eq!(config.max_iterations, 10);
        assert_eq!(config.api_base_url, "https://api.openai.com/v1");
        assert_eq!(config.api_cache_ttl, Duration::from_secs(300));
        assert!(config.require_api_key().is_err());
    }

    #[test]
    fn parse_env_falls_back_when_unset() {
        let value: usize = parse_env("DATA_AGENT_TEST_SURELY_UNSET_VARIABLE", 7).unwrap();
        assert_eq!(value, 7);
    }
}
