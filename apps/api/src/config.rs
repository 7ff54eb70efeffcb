use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::interview::policy::InterviewLimits;

/// Which provider API the language-model gateway talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelProvider {
    OpenAi,
    Anthropic,
}

impl ModelProvider {
    /// Name of the environment variable holding this provider's credential.
    pub fn api_key_var(&self) -> &'static str {
        match self {
            ModelProvider::OpenAi => "OPENAI_API_KEY",
            ModelProvider::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

impl FromStr for ModelProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ModelProvider::OpenAi),
            "anthropic" => Ok(ModelProvider::Anthropic),
            other => bail!("MODEL_PROVIDER must be 'openai' or 'anthropic', got '{other}'"),
        }
    }
}

/// Application configuration loaded from environment variables.
/// Read once at startup; immutable for the life of the process.
#[derive(Debug, Clone)]
pub struct Config {
    pub environment: String,
    pub model_provider: ModelProvider,
    pub model_name: String,
    pub temperature: f32,
    pub max_topics: u32,
    pub max_questions_per_topic: u32,
    pub llm_timeout: Duration,
    pub llm_max_retries: u32,
    pub enable_llm_caching: bool,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub llm_api_base: Option<String>,
    pub taxonomy_path: PathBuf,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Fails if a production
    /// deployment lacks the selected provider's credential.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let model_provider = match lookup("MODEL_PROVIDER") {
            Some(raw) => raw.parse::<ModelProvider>()?,
            None => ModelProvider::OpenAi,
        };

        let config = Config {
            environment: lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            model_provider,
            model_name: lookup("MODEL_NAME").unwrap_or_else(|| "gpt-4".to_string()),
            temperature: parse_or(&lookup, "TEMPERATURE", 0.05)?,
            max_topics: parse_or(&lookup, "MAX_TOPICS", 2)?,
            max_questions_per_topic: parse_or(&lookup, "MAX_QUESTIONS_PER_TOPIC", 3)?,
            llm_timeout: Duration::from_secs(parse_or(&lookup, "LLM_TIMEOUT", 60)?),
            llm_max_retries: parse_or(&lookup, "LLM_MAX_RETRIES", 3)?,
            enable_llm_caching: parse_or(&lookup, "ENABLE_LLM_CACHING", true)?,
            openai_api_key: lookup("OPENAI_API_KEY").filter(|k| !k.is_empty()),
            anthropic_api_key: lookup("ANTHROPIC_API_KEY").filter(|k| !k.is_empty()),
            llm_api_base: lookup("LLM_API_BASE").filter(|b| !b.trim().is_empty()),
            taxonomy_path: lookup("TAXONOMY_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/interview_taxonomy.json")),
            port: parse_or(&lookup, "PORT", 8080)?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        };

        if config.is_production() && config.api_key().is_none() {
            bail!(
                "{} is required in production",
                config.model_provider.api_key_var()
            );
        }

        Ok(config)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Credential for the selected provider, if configured.
    pub fn api_key(&self) -> Option<&str> {
        match self.model_provider {
            ModelProvider::OpenAi => self.openai_api_key.as_deref(),
            ModelProvider::Anthropic => self.anthropic_api_key.as_deref(),
        }
    }

    pub fn limits(&self) -> InterviewLimits {
        InterviewLimits {
            max_topics: self.max_topics,
            max_questions_per_topic: self.max_questions_per_topic,
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        None => Ok(default),
    }
}
