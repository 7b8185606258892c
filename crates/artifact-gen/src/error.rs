//! Artifact generation errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Token store error: {0}")]
    Store(#[from] identity_store::StoreError),

    #[error("Malformed connection document: {0}")]
    Parse(String),

    #[error("Client bundle template unavailable: {0}")]
    TemplateMissing(String),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
