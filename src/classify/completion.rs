//! The structured-completion contract the classifier drives.

use async_trait::async_trait;
use thiserror::Error;

/// One constrained completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub user: String,
    /// Name of the response schema, as required by `json_schema` response formats.
    pub schema_name: String,
    /// JSON schema the response object must satisfy.
    pub schema: serde_json::Value,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Why a completion call produced no usable response.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CompletionError {
    /// The request never got a response (connection refused, DNS, TLS, ...).
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    /// The endpoint answered with a non-success status.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The endpoint answered, but not with a JSON object we can read.
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// A backend that returns a JSON object conforming to a requested schema.
///
/// Implementors must be thread-safe (`Send + Sync`) so one backend can serve
/// concurrent classifications. The classifier makes exactly one call per
/// message and never retries.
#[async_trait]
pub trait StructuredCompletion: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<serde_json::Value, CompletionError>;
}
