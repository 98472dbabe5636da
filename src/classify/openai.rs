//! [`StructuredCompletion`] over an OpenAI-compatible chat completions API
//! (vLLM, Ollama, llama.cpp server, hosted gateways).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::completion::{CompletionError, CompletionRequest, StructuredCompletion};
use crate::config::ClassifierConfig;
use crate::error::{MailsiftError, Result};

/// Chat completions client using `json_schema` response formats.
pub struct OpenAiCompatibleClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl OpenAiCompatibleClient {
    /// `base_url` is the API root, e.g. `http://localhost:8000/v1`.
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MailsiftError::Http(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
        })
    }

    /// Build from the `[classifier]` section; the API key is read from the
    /// environment variable it names, and is optional.
    pub fn from_config(config: &ClassifierConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            debug!(var = %config.api_key_env, "No API key set, sending unauthenticated requests");
        }
        Self::new(
            &config.base_url,
            api_key,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl StructuredCompletion for OpenAiCompatibleClient {
    async fn complete(&self, request: CompletionRequest) -> std::result::Result<Value, CompletionError> {
        let body = build_request_body(&request);

        let mut builder = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await.map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            // Auth failures can echo credentials; report the status only.
            let message = if status.as_u16() == 401 || status.as_u16() == 403 {
                format!("authentication failed (HTTP {})", status.as_u16())
            } else {
                response
                    .text()
                    .await
                    .unwrap_or_else(|e| format!("<body read error: {e}>"))
            };
            return Err(CompletionError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let api_response: ChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                CompletionError::Timeout
            } else {
                CompletionError::Malformed(e.to_string())
            }
        })?;
        parse_content(api_response)
    }
}

fn build_request_body(request: &CompletionRequest) -> Value {
    json!({
        "model": request.model,
        "temperature": request.temperature,
        "max_tokens": request.max_tokens,
        "messages": [
            {"role": "system", "content": request.system},
            {"role": "user", "content": request.user},
        ],
        "response_format": {
            "type": "json_schema",
            "json_schema": {
                "name": request.schema_name,
                "schema": request.schema,
                "strict": true,
            },
        },
    })
}

fn transport_error(e: reqwest::Error) -> CompletionError {
    if e.is_timeout() {
        CompletionError::Timeout
    } else {
        CompletionError::Transport(e.to_string())
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

fn parse_content(response: ChatResponse) -> std::result::Result<Value, CompletionError> {
    let content = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| CompletionError::Malformed("empty choices array in response".into()))?
        .message
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| CompletionError::Malformed("response message has no content".into()))?;

    serde_json::from_str(content.trim())
        .map_err(|e| CompletionError::Malformed(format!("content is not JSON: {e}")))
}
