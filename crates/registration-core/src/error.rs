//! Workflow errors.
//!
//! Front-end adapters never see these raw: the flow and coordinators
//! translate every failure into a user-facing reply before anything reaches
//! a channel send. What remains here is for logs and the gateway's own
//! error reporting.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Channel error: {0}")]
    Channel(#[from] crate::channel::ChannelError),

    #[error("Store error: {0}")]
    Store(#[from] identity_store::StoreError),

    #[error("Directory error: {0}")]
    Directory(#[from] voice_directory::DirectoryError),

    #[error("Artifact error: {0}")]
    Artifact(#[from] artifact_gen::ArtifactError),
}
