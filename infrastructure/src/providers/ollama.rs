//! Local Ollama adapter (`POST /api/chat`, non-streaming)

use super::error::{ProviderError, classify_status, classify_transport};
use crate::config::FileOllamaConfig;
use async_trait::async_trait;
use council_application::{Capability, CapabilityError};
use council_domain::{GenerationRequest, ProviderKind};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

pub struct OllamaCapability {
    base_url: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    stream: bool,
    options: Options,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct Options {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

impl OllamaCapability {
    pub fn new(host: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;
        Ok(Self {
            base_url: host.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn from_config(config: &FileOllamaConfig) -> Result<Self, ProviderError> {
        Self::new(&config.host, Duration::from_secs(config.timeout_secs))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
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
            stream: false,
            options: Options {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        }
    }
}

#[async_trait]
impl Capability for OllamaCapability {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, CapabilityError> {
        let url = format!("{}/api/chat", self.base_url);
        debug!("Ollama request to {} (model {})", url, request.endpoint.model());

        let response = self
            .client
            .post(&url)
            .json(&Self::build_request(request))
            .send()
            .await
            .map_err(|e| classify_transport(ProviderKind::Ollama, &e))?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(ProviderKind::Ollama, status, &headers, &body));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| classify_transport(ProviderKind::Ollama, &e))?;
        Ok(chat.message.content)
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).timeout(HEALTH_TIMEOUT).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("Ollama health check failed: {}", e);
                false
            }
        }
    }
}
