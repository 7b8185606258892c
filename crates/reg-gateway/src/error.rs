//! Application error types.

use thiserror::Error;

/// Main application error type.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    #[error("Chat error: {0}")]
    Chat(#[from] chat_client::ChatError),

    #[error("Directory error: {0}")]
    Directory(#[from] voice_directory::DirectoryError),

    #[error("Store error: {0}")]
    Store(#[from] identity_store::StoreError),

    #[error("Artifact error: {0}")]
    Artifact(#[from] artifact_gen::ArtifactError),

    #[error("Workflow error: {0}")]
    Flow(#[from] registration_core::FlowError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for application errors.
pub type AppResult<T> = Result<T, AppError>;
