use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redline_config::Generation;
use redline_kernel::{ResolvedInstruction, ServiceError};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

pub const SYSTEM_DIRECTIVE: &str = "You are a writing assistant specialized in text improvement and transformation.

Based on the action requested, process the text accordingly:

GRAMMAR_FIX: Fix grammar and spelling errors while preserving the original meaning and style. Return only the corrected text.

REPHRASE: Rewrite the text according to the specified instructions while maintaining the original meaning. Return only the rephrased text.

Always return only the processed text without any additional explanations, formatting, or commentary.";

const ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

/// Provider failure. Carries only an opaque classification, never the
/// upstream body or transport error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("generation provider unreachable")]
    Transport,
    #[error("generation provider rejected credentials (status {0})")]
    Auth(u16),
    #[error("generation provider returned status {0}")]
    Http(u16),
    #[error("generation provider response was not understood")]
    InvalidResponse,
}

impl ProviderError {
    pub fn code(self) -> &'static str {
        match self {
            ProviderError::Transport => "provider_transport_error",
            ProviderError::Auth(_) => "provider_auth_error",
            ProviderError::Http(_) => "provider_http_error",
            ProviderError::InvalidResponse => "provider_response_invalid",
        }
    }
}

/// One call to an external text-generation model: directive and prompt in,
/// raw text out.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, ProviderError>;
}

#[derive(Serialize)]
struct InvokeBody<'a> {
    anthropic_version: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: [InvokeMessage<'a>; 1],
}

#[derive(Serialize)]
struct InvokeMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct InvokeResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Anthropic models behind the Bedrock runtime `invoke` endpoint.
pub struct BedrockHttpProvider {
    client: Client,
    invoke_url: String,
    max_tokens: u32,
    api_key: Option<String>,
}

impl BedrockHttpProvider {
    pub fn new(cfg: &Generation) -> Result<Self, ServiceError> {
        let mut builder = Client::builder();
        if let Some(ms) = cfg.timeout_ms {
            builder = builder.timeout(Duration::from_millis(ms));
        }
        let client = builder
            .build()
            .map_err(|e| ServiceError::configuration(format!("http client: {e}")))?;
        let api_key = cfg
            .api_key_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|v| !v.trim().is_empty());
        if api_key.is_none() {
            tracing::warn!("no generation api key in environment; requests will be unauthenticated");
        }
        Ok(Self {
            client,
            invoke_url: format!("{}/model/{}/invoke", cfg.resolved_endpoint(), cfg.model_id),
            max_tokens: cfg.max_tokens,
            api_key,
        })
    }
}

#[async_trait]
impl GenerationProvider for BedrockHttpProvider {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, ProviderError> {
        let body = InvokeBody {
            anthropic_version: ANTHROPIC_VERSION,
            max_tokens: self.max_tokens,
            system,
            messages: [InvokeMessage {
                role: "user",
                content: prompt,
            }],
        };
        let mut request = self.client.post(&self.invoke_url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            tracing::warn!(timeout = e.is_timeout(), connect = e.is_connect(), "provider transport failed");
            ProviderError::Transport
        })?;
        match response.status() {
            s if s.is_success() => {}
            s @ (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
                return Err(ProviderError::Auth(s.as_u16()))
            }
            s => return Err(ProviderError::Http(s.as_u16())),
        }

        let parsed: InvokeResponse = response
            .json()
            .await
            .map_err(|_| ProviderError::InvalidResponse)?;
        parsed
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text)
            .ok_or(ProviderError::InvalidResponse)
    }
}

/// Sends resolved instructions to the provider and classifies the outcome
/// into the service error taxonomy. Single attempt, no retries.
pub struct GenerationGateway {
    provider: Arc<dyn GenerationProvider>,
}

impl GenerationGateway {
    pub fn new(provider: Arc<dyn GenerationProvider>) -> Self {
        Self { provider }
    }

    pub async fn invoke(&self, instruction: &ResolvedInstruction) -> Result<String, ServiceError> {
        let raw = self
            .provider
            .generate(SYSTEM_DIRECTIVE, instruction.as_str())
            .await
            .map_err(|e| {
                ServiceError::llm_service(e.to_string()).with_details(json!({"error_code": e.code()}))
            })?;
        let text = raw.trim();
        if text.is_empty() {
            return Err(ServiceError::processing("generation provider returned no text")
                .with_details(json!({"error_code": "provider_empty_output"})));
        }
        Ok(text.to_string())
    }
}
