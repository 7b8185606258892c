//! Chat gateway HTTP client.

use crate::error::ChatError;
use crate::types::*;
use base64::Engine;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// REST client for the chat platform's bot gateway.
#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    base_url: String,
}

impl ChatClient {
    /// Create a new chat client.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ChatError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Check if the bot gateway is healthy.
    pub async fn health_check(&self) -> bool {
        self.client
            .get(format!("{}/v1/health", self.base_url))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    /// Fetch pending updates after the given update id.
    #[instrument(skip(self))]
    pub async fn updates_after(&self, update_id: u64) -> Result<Vec<Update>, ChatError> {
        let response = self
            .client
            .get(format!(
                "{}/v1/updates?after={}",
                self.base_url, update_id
            ))
            .send()
            .await?;

        if !response.status().is_success() {
            let msg = response.text().await.unwrap_or_default();
            return Err(ChatError::Api(msg));
        }

        let updates: Vec<Update> = response.json().await?;
        debug!("Received {} updates", updates.len());
        Ok(updates)
    }

    /// Send a plain text message.
    #[instrument(skip(self, text))]
    pub async fn send_text(&self, recipient: &str, text: &str) -> Result<(), ChatError> {
        self.send_message(SendMessageRequest {
            recipient: recipient.to_string(),
            text: text.to_string(),
            buttons: None,
        })
        .await
        .map(|_| ())
    }

    /// Send a prompt with inline choice buttons.
    #[instrument(skip(self, text, buttons))]
    pub async fn send_choices(
        &self,
        recipient: &str,
        text: &str,
        buttons: Vec<ChoiceButton>,
    ) -> Result<MessageHandle, ChatError> {
        let message_id = self
            .send_message(SendMessageRequest {
                recipient: recipient.to_string(),
                text: text.to_string(),
                buttons: Some(buttons),
            })
            .await?;
        Ok(MessageHandle {
            chat_id: recipient.to_string(),
            message_id,
        })
    }

    async fn send_message(&self, request: SendMessageRequest) -> Result<i64, ChatError> {
        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let msg = response.text().await.unwrap_or_default();
            warn!("Send failed: {}", msg);
            return Err(ChatError::SendFailed(msg));
        }

        let body: SendMessageResponse = response.json().await?;
        debug!("Sent message {} to {}", body.message_id, request.recipient);
        Ok(body.message_id)
    }

    /// Send a document with a caption.
    #[instrument(skip(self, bytes, caption))]
    pub async fn send_document(
        &self,
        recipient: &str,
        bytes: &[u8],
        filename: &str,
        caption: &str,
    ) -> Result<(), ChatError> {
        let request = SendDocumentRequest {
            recipient: recipient.to_string(),
            filename: filename.to_string(),
            caption: caption.to_string(),
            data_base64: base64::engine::general_purpose::STANDARD.encode(bytes),
        };

        let response = self
            .client
            .post(format!("{}/v1/documents", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let msg = response.text().await.unwrap_or_default();
            warn!("Document send failed: {}", msg);
            return Err(ChatError::SendFailed(msg));
        }

        debug!("Sent document '{}' to {}", filename, recipient);
        Ok(())
    }

    /// Strip the buttons from (or delete) a previously sent prompt.
    #[instrument(skip(self))]
    pub async fn retire_message(&self, handle: &MessageHandle) -> Result<(), ChatError> {
        let response = self
            .client
            .post(format!(
                "{}/v1/messages/{}/{}/retire",
                self.base_url,
                urlencoding::encode(&handle.chat_id),
                handle.message_id
            ))
            .send()
            .await?;

        if !response.status().is_success() {
            let msg = response.text().await.unwrap_or_default();
            return Err(ChatError::Api(msg));
        }
        Ok(())
    }
}
