//! Configuration management for the tool agent.
//!
//! Configuration is read from environment variables (a `.env` file in the
//! working directory is loaded first by the binaries):
//! - `OPENAI_API_KEY` - Required. Key for the chat completions endpoint.
//! - `TAVILY_API_KEY` - Required. Key for the Tavily search API.
//! - `DEFAULT_MODEL` - Optional. Chat model. Defaults to `gpt-4o-mini`.
//! - `OPENAI_BASE_URL` - Optional. Defaults to `https://api.openai.com/v1`.
//! - `TEMPERATURE` - Optional. Sampling temperature. Defaults to `0`.
//! - `TAVILY_BASE_URL` - Optional. Defaults to `https://api.tavily.com`.
//! - `MARKET_DATA_BASE_URL` - Optional. Defaults to `https://query1.finance.yahoo.com`.
//! - `MAX_ITERATIONS` - Optional. Maximum planner turns per request. Defaults to `10`.
//! - `TOOL_TIMEOUT_SECS` - Optional. Per tool call timeout. Defaults to `30`.
//! - `LLM_TIMEOUT_SECS` - Optional. Per model call timeout. Defaults to `120`.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_TAVILY_BASE_URL: &str = "https://api.tavily.com";
pub const DEFAULT_MARKET_DATA_BASE_URL: &str = "https://query1.finance.yahoo.com";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Search provider configuration.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Tavily API key
    pub api_key: String,

    /// Tavily API base URL
    pub base_url: String,
}

/// Agent configuration. Read-only once loaded.
#[derive(Debug, Clone)]
pub struct Config {
    /// Chat completions API key
    pub api_key: String,

    /// Chat completions base URL (OpenAI-compatible)
    pub llm_base_url: String,

    /// Default chat model identifier
    pub default_model: String,

    /// Sampling temperature sent with every completion request
    pub temperature: f32,

    /// Web search configuration
    pub search: SearchConfig,

    /// Market data (quote) API base URL
    pub market_data_base_url: String,

    /// Maximum planner turns before the loop gives up
    pub max_iterations: usize,

    /// Timeout applied to each tool call
    pub tool_timeout: Duration,

    /// Timeout applied to each model call
    pub llm_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `OPENAI_API_KEY` or
    /// `TAVILY_API_KEY` is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = get("OPENAI_API_KEY")
            .ok_or_else(|| ConfigError::MissingEnvVar("OPENAI_API_KEY".to_string()))?;

        let search_key = get("TAVILY_API_KEY")
            .ok_or_else(|| ConfigError::MissingEnvVar("TAVILY_API_KEY".to_string()))?;

        let default_model = get("DEFAULT_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let llm_base_url = get("OPENAI_BASE_URL")
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let temperature: f32 = parse_or("TEMPERATURE", get("TEMPERATURE"), 0.0)?;
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::InvalidValue(
                "TEMPERATURE".to_string(),
                format!("expected a value between 0 and 2, got {}", temperature),
            ));
        }

        let search = SearchConfig {
            api_key: search_key,
            base_url: get("TAVILY_BASE_URL")
                .unwrap_or_else(|| DEFAULT_TAVILY_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        };

        let market_data_base_url = get("MARKET_DATA_BASE_URL")
            .unwrap_or_else(|| DEFAULT_MARKET_DATA_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let max_iterations: usize = parse_or("MAX_ITERATIONS", get("MAX_ITERATIONS"), 10)?;
        if max_iterations == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_ITERATIONS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let tool_timeout_secs: u64 = parse_or("TOOL_TIMEOUT_SECS", get("TOOL_TIMEOUT_SECS"), 30)?;
        let llm_timeout_secs: u64 = parse_or("LLM_TIMEOUT_SECS", get("LLM_TIMEOUT_SECS"), 120)?;

        Ok(Self {
            api_key,
            llm_base_url,
            default_model,
            temperature,
            search,
            market_data_base_url,
            max_iterations,
            tool_timeout: Duration::from_secs(tool_timeout_secs),
            llm_timeout: Duration::from_secs(llm_timeout_secs),
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(api_key: String, search_api_key: String) -> Self {
        Self {
            api_key,
            llm_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            search: SearchConfig {
                api_key: search_api_key,
                base_url: DEFAULT_TAVILY_BASE_URL.to_string(),
            },
            market_data_base_url: DEFAULT_MARKET_DATA_BASE_URL.to_string(),
            max_iterations: 10,
            tool_timeout: Duration::from_secs(30),
            llm_timeout: Duration::from_secs(120),
        }
    }
}

fn parse_or<T>(key: &str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), format!("{}", e))),
        None => Ok(default),
    }
}
