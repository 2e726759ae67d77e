//! Vision model configuration loaded from environment or built explicitly.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Anthropic,
    Local,
}

/// Connection settings for a vision-capable model service.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub provider: Provider,
    pub api_key: String,
    pub model: String,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "no vision model configured. Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or LOCAL_VLM_URL"
    )]
    NoProviderConfigured,
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ModelConfig {
    /// Load from environment variables, trying OpenAI, then Anthropic, then
    /// a local OpenAI-compatible endpoint.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            return Ok(Self {
                provider: Provider::OpenAi,
                api_key: key,
                model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
                base_url: std::env::var("OPENAI_BASE_URL").ok(),
                timeout_secs: 120,
                max_retries: 3,
            });
        }

        if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
            return Ok(Self {
                provider: Provider::Anthropic,
                api_key: key,
                model: std::env::var("ANTHROPIC_MODEL")
                    .unwrap_or_else(|_| "claude-3-5-sonnet-20241022".to_string()),
                base_url: None,
                timeout_secs: 120,
                max_retries: 3,
            });
        }

        if let Ok(url) = std::env::var("LOCAL_VLM_URL") {
            return Ok(Self {
                provider: Provider::Local,
                api_key: String::new(),
                model: std::env::var("LOCAL_VLM_MODEL").unwrap_or_else(|_| "default".to_string()),
                base_url: Some(url),
                timeout_secs: 300,
                max_retries: 1,
            });
        }

        Err(ConfigError::NoProviderConfigured)
    }

    pub fn openai(api_key: &str, model: &str) -> Self {
        Self {
            provider: Provider::OpenAi,
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: None,
            timeout_secs: 120,
            max_retries: 3,
        }
    }

    pub fn anthropic(api_key: &str, model: &str) -> Self {
        Self {
            provider: Provider::Anthropic,
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: None,
            timeout_secs: 120,
            max_retries: 3,
        }
    }

    pub fn local(url: &str, model: &str) -> Self {
        Self {
            provider: Provider::Local,
            api_key: String::new(),
            model: model.to_string(),
            base_url: Some(url.to_string()),
            timeout_secs: 300,
            max_retries: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_configs() {
        let config = ModelConfig::openai("test-key", "gpt-4o");
        assert_eq!(config.provider, Provider::OpenAi);
        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.model, "gpt-4o");

        let config = ModelConfig::local("http://localhost:8000", "qwen2-vl");
        assert_eq!(config.provider, Provider::Local);
        assert!(config.api_key.is_empty());
    }
}
