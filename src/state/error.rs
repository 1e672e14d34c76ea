use thiserror::Error;

use crate::core::errors::ApiError;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to load configuration: {0}")]
    Config(#[source] ApiError),

    #[error("Failed to load invite secret (run `skeptic-provision secret` first): {0}")]
    Secret(#[source] ApiError),

    #[error("Failed to load persona: {0}")]
    Persona(#[source] ApiError),

    #[error("Failed to initialize token estimator: {0}")]
    Estimator(#[source] ApiError),
}
