//! OpenRouter adapter (OpenAI-compatible `/chat/completions`)

use super::error::{ProviderError, classify_status, classify_transport};
use crate::config::FileOpenRouterConfig;
use async_trait::async_trait;
use council_application::{Capability, CapabilityError};
use council_domain::{GenerationRequest, ProviderKind};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

pub struct OpenRouterCapability {
    /// Pre-computed `"Bearer <key>"` header value
    auth_header: String,
    base_url: String,
    referer: Option<String>,
    title: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    /// Reasoning models may answer here and leave `content` empty.
    reasoning: Option<String>,
}

/// Errors OpenRouter reports inside a 200 response.
#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
    code: Option<i64>,
}

impl OpenRouterCapability {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;
        Ok(Self {
            auth_header: format!("Bearer {}", api_key),
            base_url: base_url.trim_end_matches('/').to_string(),
            referer: None,
            title: "council".to_string(),
            client,
        })
    }

    pub fn from_config(config: &FileOpenRouterConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .resolve_api_key()
            .ok_or_else(|| ProviderError::MissingApiKey {
                provider: ProviderKind::OpenRouter,
                env_var: config.api_key_env.clone(),
            })?;
        let mut capability = Self::new(
            &api_key,
            &config.base_url,
            Duration::from_secs(config.timeout_secs),
        )?
        .with_title(&config.title);
        if let Some(referer) = &config.referer {
            capability = capability.with_referer(referer);
        }
        Ok(capability)
    }

    /// Sent as `HTTP-Referer` for OpenRouter app attribution.
    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    /// Sent as `X-Title`.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    fn build_request(request: &GenerationRequest) -> ChatRequest<'_> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system_prompt {
            messages.push(Message {
                role: "system",
                content: system,
            });
        }
        messages.push(Message {
            role: "user",
            content: &request.prompt,
        });
        ChatRequest {
            model: request.endpoint.model(),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }

    fn extract_text(response: ChatResponse) -> Result<String, CapabilityError> {
        if let Some(error) = response.error {
            return Err(match error.code {
                Some(429) => CapabilityError::RateLimited { retry_after: None },
                Some(code) if (400..500).contains(&code) && code != 408 => {
                    CapabilityError::Persistent(format!("openrouter error {}: {}", code, error.message))
                }
                _ => CapabilityError::Transient(format!("openrouter error: {}", error.message)),
            });
        }

        let Some(choice) = response.choices.into_iter().next() else {
            return Err(CapabilityError::Transient(
                "openrouter returned no choices".to_string(),
            ));
        };
        let content = choice.message.content.unwrap_or_default();
        if !content.trim().is_empty() {
            return Ok(content);
        }
        Ok(choice.message.reasoning.unwrap_or_default())
    }
}

#[async_trait]
impl Capability for OpenRouterCapability {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, CapabilityError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!("OpenRouter request (model {})", request.endpoint.model());

        let mut builder = self
            .client
            .post(&url)
            .header("Authorization", &self.auth_header)
            .header("X-Title", &self.title)
            .json(&Self::build_request(request));
        if let Some(referer) = &self.referer {
            builder = builder.header("HTTP-Referer", referer);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify_transport(ProviderKind::OpenRouter, &e))?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let body = response.text().await.unwrap_or_default();
            let error = classify_status(ProviderKind::OpenRouter, status, &headers, &body);
            if error.is_rate_limited() {
                warn!("OpenRouter rate limited model {}: {}", request.endpoint.model(), error);
            }
            return Err(error);
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| classify_transport(ProviderKind::OpenRouter, &e))?;
        Self::extract_text(chat)
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}/models", self.base_url);
        match self
            .client
            .get(&url)
            .header("Authorization", &self.auth_header)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("OpenRouter health check failed: {}", e);
                false
            }
        }
    }
}
