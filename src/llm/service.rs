use std::sync::Arc;

use crate::core::config::service::ChatSettings;
use crate::core::errors::ApiError;
use crate::llm::provider::CompletionProvider;
use crate::llm::types::{ChatMessage, ChatRequest};

/// Fixed-model completion invoker. One remote call per request, no retries.
#[derive(Clone)]
pub struct LlmService {
    provider: Arc<dyn CompletionProvider>,
    model: String,
    temperature: f64,
    max_reply_tokens: u32,
}

impl LlmService {
    pub fn new(provider: Arc<dyn CompletionProvider>, settings: &ChatSettings) -> Self {
        Self {
            provider,
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_reply_tokens: settings.max_reply_tokens,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, ApiError> {
        let request = ChatRequest::new(messages)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_reply_tokens);

        self.provider
            .chat(request, &self.model)
            .await
            .map_err(|err| {
                tracing::warn!(
                    provider = self.provider.name(),
                    model = %self.model,
                    status = ?err.status,
                    "Completion failed: {}",
                    err
                );
                ApiError::RemoteService(err.message)
            })
    }
}
