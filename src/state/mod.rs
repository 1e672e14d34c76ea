use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::chat::{ChatService, SessionStore};
use crate::context::{build_estimator, ConversationWindow, MessageCostEstimator};
use crate::core::config::{AppConfig, AppPaths, ConfigService};
use crate::core::security::InviteSecret;
use crate::history::TranscriptStore;
use crate::llm::{CompletionProvider, LlmService, OpenAiProvider};
use crate::users::UserStore;

pub mod error;

use error::InitializationError;

/// Application state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: ConfigService,
    pub settings: AppConfig,
    pub chat: ChatService,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Loads configuration and the invite secret from disk and wires the
    /// OpenAI-compatible provider into the chat pipeline.
    pub fn initialize() -> Result<Arc<Self>, InitializationError> {
        let paths = Arc::new(AppPaths::new());
        let config = ConfigService::new(paths.clone());
        let settings = config
            .load_app_config()
            .map_err(InitializationError::Config)?;

        let secret =
            InviteSecret::load(&paths.secret_path).map_err(InitializationError::Secret)?;

        let estimator = build_estimator(
            &settings.chat.model,
            settings.tokenizer.kind,
            settings.tokenizer_path(&paths).as_deref(),
        )
        .map_err(InitializationError::Estimator)?;

        if settings.provider.api_key.is_none() {
            tracing::warn!("No provider API key configured; completions will likely be rejected");
        }
        let provider: Arc<dyn CompletionProvider> = Arc::new(OpenAiProvider::new(
            settings.provider.base_url.clone(),
            settings.provider.api_key.clone(),
        ));

        Self::from_parts(paths, settings, secret, provider, estimator)
    }

    /// Assembles the state from already-loaded pieces.
    pub fn from_parts(
        paths: Arc<AppPaths>,
        settings: AppConfig,
        secret: InviteSecret,
        provider: Arc<dyn CompletionProvider>,
        estimator: Arc<dyn MessageCostEstimator>,
    ) -> Result<Arc<Self>, InitializationError> {
        let config = ConfigService::new(paths.clone());
        let persona = settings
            .persona(&paths)
            .map_err(InitializationError::Persona)?;

        let window = ConversationWindow::new(persona, estimator);
        let llm = LlmService::new(provider, &settings.chat);
        let chat = ChatService::new(
            UserStore::new(paths.users_path.clone()),
            secret,
            SessionStore::new(),
            TranscriptStore::new(paths.chats_dir.clone()),
            window,
            llm,
            settings.chat.window_policy,
            settings.app.max_input_length,
        );

        Ok(Arc::new(AppState {
            paths,
            config,
            settings,
            chat,
            started_at: Utc::now(),
        }))
    }
}
