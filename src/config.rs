//! Configuration management for Annet.
//!
//! Configuration can be set via environment variables:
//! - `LLM_API_KEY` - Required (falls back to `OPENROUTER_API_KEY`). Key for the chat/embedding API.
//! - `LLM_BASE_URL` - Optional. OpenAI-compatible API root. Defaults to `https://openrouter.ai/api/v1`.
//! - `DEFAULT_MODEL` - Optional. Chat model. Defaults to `anthropic/claude-sonnet-4.5`.
//! - `EMBED_MODEL` - Optional. Embedding model. Defaults to `openai/text-embedding-3-small`.
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `3000`.
//! - `MAX_ITERATIONS` - Optional. Maximum agent loop iterations. Defaults to `15`.
//! - `TOOL_TIMEOUT_SECS` - Optional. Per tool call limit. Defaults to `30`.
//! - `TURN_TIMEOUT_SECS` - Optional. Per question limit. Defaults to `180`.
//! - `HR_POLICY_DIR` - Optional. Policy documents directory. Defaults to `data/hr_policies`.
//! - `RETRIEVAL_TOP_K` - Optional. Policy chunks retrieved per question. Defaults to `4`.
//! - `RETRIEVAL_MIN_SCORE` - Optional. Minimum similarity of a retrieved chunk. Defaults to `0.7`.
//! - `SERPAPI_KEY` - Optional. Enables SerpAPI; DuckDuckGo is used without it.
//! - `SEARCH_RATE_LIMIT_MS` - Optional. Spacing between web searches. Defaults to `1000`.
//! - `GOOGLE_DOCS_ACCESS_TOKEN` - Optional. Bearer token for the Google Docs API.
//! - `GOOGLE_DOCS_BASE_URL` - Optional. Defaults to `https://docs.googleapis.com`.
//! - `INSURANCE_DOCUMENT_ID` - Optional. Default insurance policy document.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::retrieval::RetrievalConfig;
use crate::search::SearchConfig;

pub const DEFAULT_INSURANCE_DOCUMENT_ID: &str = "1Sb3KD3YJldA9ocCE4KK0CdFBEgh3w0JaGdabi83xY3M";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Insurance document settings.
#[derive(Debug, Clone)]
pub struct DocsConfig {
    /// Bearer token for the Google Docs API
    pub access_token: Option<String>,

    pub base_url: String,

    /// Document used when a tool call names none
    pub default_document_id: String,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            base_url: "https://docs.googleapis.com".to_string(),
            default_document_id: DEFAULT_INSURANCE_DOCUMENT_ID.to_string(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// API key for the LLM provider
    pub api_key: String,

    /// OpenAI-compatible API root
    pub llm_base_url: String,

    /// Chat model identifier
    pub default_model: String,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Maximum iterations for the agent loop
    pub max_iterations: usize,

    pub tool_timeout: Duration,

    /// Limit for a whole question, tools included
    pub turn_timeout: Duration,

    pub retrieval: RetrievalConfig,
    pub search: SearchConfig,
    pub docs: DocsConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if no API key is set and
    /// `ConfigError::InvalidValue` for unparsable numbers.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = env_opt("LLM_API_KEY")
            .or_else(|| env_opt("OPENROUTER_API_KEY"))
            .ok_or_else(|| ConfigError::MissingEnvVar("LLM_API_KEY".to_string()))?;

        let mut config = Self::new(
            api_key,
            env_opt("DEFAULT_MODEL").unwrap_or_else(|| "anthropic/claude-sonnet-4.5".to_string()),
            env_opt("HR_POLICY_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/hr_policies")),
        );

        if let Some(url) = env_opt("LLM_BASE_URL") {
            config.llm_base_url = url;
        }
        if let Some(host) = env_opt("HOST") {
            config.host = host;
        }
        config.port = env_parse("PORT", config.port)?;

        config.max_iterations = env_parse("MAX_ITERATIONS", config.max_iterations)?;
        if config.max_iterations == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_ITERATIONS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        config.tool_timeout = Duration::from_secs(env_parse("TOOL_TIMEOUT_SECS", 30)?);
        config.turn_timeout = Duration::from_secs(env_parse("TURN_TIMEOUT_SECS", 180)?);

        if let Some(model) = env_opt("EMBED_MODEL") {
            config.retrieval.embed_model = model;
        }
        config.retrieval.top_k = env_parse("RETRIEVAL_TOP_K", config.retrieval.top_k)?;
        config.retrieval.min_score = env_parse("RETRIEVAL_MIN_SCORE", config.retrieval.min_score)?;

        config.search.serpapi_key = env_opt("SERPAPI_KEY");
        config.search.rate_limit = Duration::from_millis(env_parse("SEARCH_RATE_LIMIT_MS", 1000)?);

        config.docs.access_token = env_opt("GOOGLE_DOCS_ACCESS_TOKEN");
        if let Some(url) = env_opt("GOOGLE_DOCS_BASE_URL") {
            config.docs.base_url = url;
        }
        if let Some(id) = env_opt("INSURANCE_DOCUMENT_ID") {
            config.docs.default_document_id = id;
        }

        Ok(config)
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(api_key: String, default_model: String, policy_dir: PathBuf) -> Self {
        Self {
            api_key,
            llm_base_url: "https://openrouter.ai/api/v1".to_string(),
            default_model,
            host: "127.0.0.1".to_string(),
            port: 3000,
            max_iterations: 15,
            tool_timeout: Duration::from_secs(30),
            turn_timeout: Duration::from_secs(180),
            retrieval: RetrievalConfig::new(policy_dir, "openai/text-embedding-3-small".to_string()),
            search: SearchConfig::new(None),
            docs: DocsConfig::default(),
        }
    }
}

/// Non-empty environment variable.
fn env_opt(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_opt(name) {
        Some(raw) => parse_value(name, &raw),
        None => Ok(default),
    }
}

fn parse_value<T>(name: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue(name.to_string(), format!("{}", e)))
}
