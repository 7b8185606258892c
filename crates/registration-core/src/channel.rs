//! The chat front-end capability consumed by the workflow.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// One selectable option in a choice prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    /// Text shown on the button.
    pub label: String,
    /// Opaque payload delivered back when the button is pressed.
    pub data: String,
}

impl Choice {
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}

/// Handle to a previously sent prompt, for later edit/removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRef {
    pub chat_id: String,
    pub message_id: i64,
}

/// What the workflow needs from a chat transport, and nothing more.
///
/// The state machine and coordinators never see the transport's own message
/// shapes; the gateway adapts its chat client to this trait.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(&self, recipient: &str, text: &str) -> Result<(), ChannelError>;

    async fn send_document(
        &self,
        recipient: &str,
        bytes: Vec<u8>,
        filename: &str,
        caption: &str,
    ) -> Result<(), ChannelError>;

    /// Send a prompt with inline choices; returns a handle for retirement.
    async fn prompt_choices(
        &self,
        recipient: &str,
        text: &str,
        choices: &[Choice],
    ) -> Result<MessageRef, ChannelError>;

    /// Remove or strip a previously sent prompt so its buttons go dead.
    async fn retire_prompt(&self, prompt: &MessageRef) -> Result<(), ChannelError>;
}
