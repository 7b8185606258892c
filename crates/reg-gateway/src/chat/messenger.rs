//! Adapts the chat client to the workflow's messenger capability.

use async_trait::async_trait;
use chat_client::{ChatClient, ChoiceButton, MessageHandle};
use registration_core::{ChannelError, Choice, MessageRef, Messenger};
use std::sync::Arc;

pub struct ChatMessenger {
    client: Arc<ChatClient>,
}

impl ChatMessenger {
    pub fn new(client: Arc<ChatClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Messenger for ChatMessenger {
    async fn send_text(&self, recipient: &str, text: &str) -> Result<(), ChannelError> {
        self.client
            .send_text(recipient, text)
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))
    }

    async fn send_document(
        &self,
        recipient: &str,
        bytes: Vec<u8>,
        filename: &str,
        caption: &str,
    ) -> Result<(), ChannelError> {
        self.client
            .send_document(recipient, &bytes, filename, caption)
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))
    }

    async fn prompt_choices(
        &self,
        recipient: &str,
        text: &str,
        choices: &[Choice],
    ) -> Result<MessageRef, ChannelError> {
        let buttons = choices
            .iter()
            .map(|c| ChoiceButton {
                label: c.label.clone(),
                data: c.data.clone(),
            })
            .collect();
        let handle = self
            .client
            .send_choices(recipient, text, buttons)
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))?;
        Ok(MessageRef {
            chat_id: handle.chat_id,
            message_id: handle.message_id,
        })
    }

    async fn retire_prompt(&self, prompt: &MessageRef) -> Result<(), ChannelError> {
        self.client
            .retire_message(&MessageHandle {
                chat_id: prompt.chat_id.clone(),
                message_id: prompt.message_id,
            })
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))
    }
}
