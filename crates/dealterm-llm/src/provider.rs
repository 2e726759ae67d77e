//! Vision model providers.
//!
//! A request is an ordered list of page images plus a natural-language
//! instruction encoding the expected output schema; the response is free
//! text with no structural guarantee, so callers run it through
//! [`crate::recover`].

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

use crate::config::{ConfigError, ModelConfig, Provider};

/// One image attached to a model request, in page order.
#[derive(Debug, Clone)]
pub struct ImagePart {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
}

#[derive(Debug, Clone)]
pub struct VisionRequest {
    pub instruction: String,
    pub images: Vec<ImagePart>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct VisionResponse {
    pub content: String,
    pub finish_reason: FinishReason,
    pub usage: Usage,
    pub model: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("API error: {0}")]
    Api(String),
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("network error: {0}")]
    Network(String),
}

/// Trait for vision-capable model services.
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn complete(&self, request: VisionRequest) -> Result<VisionResponse, ModelError>;

    /// Model identifier for logs and audit entries.
    fn model_name(&self) -> String;
}

fn http_client(timeout_secs: u64) -> Result<Client, ModelError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ModelError::Network(e.to_string()))
}

// ============================================================================
// OpenAI-compatible provider
// ============================================================================

pub struct OpenAiVision {
    client: Client,
    config: ModelConfig,
}

impl OpenAiVision {
    pub fn new(config: ModelConfig) -> Result<Self, ModelError> {
        let client = http_client(config.timeout_secs)?;
        Ok(Self { client, config })
    }

    fn content_blocks(request: &VisionRequest) -> Vec<serde_json::Value> {
        let mut blocks = vec![serde_json::json!({
            "type": "text",
            "text": request.instruction,
        })];
        for image in &request.images {
            let data_url = format!("data:{};base64,{}", image.mime, BASE64.encode(&image.bytes));
            blocks.push(serde_json::json!({
                "type": "image_url",
                "image_url": {"url": data_url},
            }));
        }
        blocks
    }
}

#[async_trait]
impl VisionModel for OpenAiVision {
    async fn complete(&self, request: VisionRequest) -> Result<VisionResponse, ModelError> {
        let url = format!(
            "{}/chat/completions",
            self.config
                .base_url
                .as_deref()
                .unwrap_or("https://api.openai.com/v1")
        );

        let mut body = serde_json::json!({
            "model": self.config.model,
            "messages": [{
                "role": "user",
                "content": Self::content_blocks(&request),
            }],
        });
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if let Some(temp) = request.temperature {
            body["temperature"] = serde_json::json!(temp);
        }

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        if response.status() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return Err(ModelError::RateLimited {
                retry_after_ms: retry_after * 1000,
            });
        }

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ModelError::Api(format!("API error: {error_text}")));
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        let content = data["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string();

        let finish_reason = match data["choices"][0]["finish_reason"].as_str() {
            Some("length") => FinishReason::Length,
            Some("content_filter") => FinishReason::ContentFilter,
            _ => FinishReason::Stop,
        };

        Ok(VisionResponse {
            content,
            finish_reason,
            usage: Usage {
                prompt_tokens: data["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as usize,
                completion_tokens: data["usage"]["completion_tokens"].as_u64().unwrap_or(0)
                    as usize,
            },
            model: self.config.model.clone(),
        })
    }

    fn model_name(&self) -> String {
        self.config.model.clone()
    }
}

// ============================================================================
// Anthropic provider
// ============================================================================

pub struct AnthropicVision {
    client: Client,
    config: ModelConfig,
}

impl AnthropicVision {
    pub fn new(config: ModelConfig) -> Result<Self, ModelError> {
        let client = http_client(config.timeout_secs)?;
        Ok(Self { client, config })
    }

    fn content_blocks(request: &VisionRequest) -> Vec<serde_json::Value> {
        let mut blocks: Vec<serde_json::Value> = request
            .images
            .iter()
            .map(|image| {
                serde_json::json!({
                    "type": "image",
                    "source": {
                        "type": "base64",
                        "media_type": image.mime,
                        "data": BASE64.encode(&image.bytes),
                    },
                })
            })
            .collect();
        blocks.push(serde_json::json!({
            "type": "text",
            "text": request.instruction,
        }));
        blocks
    }
}

#[async_trait]
impl VisionModel for AnthropicVision {
    async fn complete(&self, request: VisionRequest) -> Result<VisionResponse, ModelError> {
        let url = "https://api.anthropic.com/v1/messages";

        let mut body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": request.max_tokens.unwrap_or(8192),
            "messages": [{
                "role": "user",
                "content": Self::content_blocks(&request),
            }],
        });
        if let Some(temp) = request.temperature {
            body["temperature"] = serde_json::json!(temp);
        }

        let response = self
            .client
            .post(url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        if response.status() == 429 {
            return Err(ModelError::RateLimited {
                retry_after_ms: 60_000,
            });
        }

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ModelError::Api(format!("API error: {error_text}")));
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        let content = data["content"][0]["text"].as_str().unwrap_or("").to_string();

        let finish_reason = match data["stop_reason"].as_str() {
            Some("max_tokens") => FinishReason::Length,
            _ => FinishReason::Stop,
        };

        Ok(VisionResponse {
            content,
            finish_reason,
            usage: Usage {
                prompt_tokens: data["usage"]["input_tokens"].as_u64().unwrap_or(0) as usize,
                completion_tokens: data["usage"]["output_tokens"].as_u64().unwrap_or(0) as usize,
            },
            model: self.config.model.clone(),
        })
    }

    fn model_name(&self) -> String {
        self.config.model.clone()
    }
}

// ============================================================================
// Local provider (vLLM, Ollama in OpenAI mode)
// ============================================================================

pub struct LocalVision {
    inner: OpenAiVision,
}

impl LocalVision {
    pub fn new(mut config: ModelConfig) -> Result<Self, ModelError> {
        if config.base_url.is_none() {
            return Err(ModelError::Api("no base URL configured".to_string()));
        }
        // Local endpoints speak the OpenAI dialect.
        config.provider = Provider::OpenAi;
        Ok(Self {
            inner: OpenAiVision::new(config)?,
        })
    }
}

#[async_trait]
impl VisionModel for LocalVision {
    async fn complete(&self, request: VisionRequest) -> Result<VisionResponse, ModelError> {
        self.inner.complete(request).await
    }

    fn model_name(&self) -> String {
        self.inner.model_name()
    }
}

// ============================================================================
// Unified client
// ============================================================================

/// Dispatches to the provider selected by configuration.
pub enum UnifiedVision {
    OpenAi(OpenAiVision),
    Anthropic(AnthropicVision),
    Local(LocalVision),
}

impl UnifiedVision {
    pub fn from_config(config: ModelConfig) -> Result<Self, ModelError> {
        Ok(match config.provider {
            Provider::OpenAi => Self::OpenAi(OpenAiVision::new(config)?),
            Provider::Anthropic => Self::Anthropic(AnthropicVision::new(config)?),
            Provider::Local => Self::Local(LocalVision::new(config)?),
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let config = ModelConfig::from_env()?;
        Self::from_config(config).map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

#[async_trait]
impl VisionModel for UnifiedVision {
    async fn complete(&self, request: VisionRequest) -> Result<VisionResponse, ModelError> {
        match self {
            Self::OpenAi(c) => c.complete(request).await,
            Self::Anthropic(c) => c.complete(request).await,
            Self::Local(c) => c.complete(request).await,
        }
    }

    fn model_name(&self) -> String {
        match self {
            Self::OpenAi(c) => c.model_name(),
            Self::Anthropic(c) => c.model_name(),
            Self::Local(c) => c.model_name(),
        }
    }
}
