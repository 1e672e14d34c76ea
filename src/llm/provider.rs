use async_trait::async_trait;
use thiserror::Error;

use super::types::ChatRequest;

/// Failure reported by a completion backend. `message` is what the provider
/// said, suitable for showing to the user as-is.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ProviderError {
    pub status: Option<u16>,
    pub message: String,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// return the provider name (e.g. "openai")
    fn name(&self) -> &str;

    /// chat completion (non-streaming)
    async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<String, ProviderError>;
}
