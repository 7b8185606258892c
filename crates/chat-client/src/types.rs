//! Bot API wire types.

use serde::{Deserialize, Serialize};

/// One update from the bot gateway's feed.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: u64,
    #[serde(default)]
    pub message: Option<IncomingText>,
    #[serde(default)]
    pub button_press: Option<ButtonPress>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Sender {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingText {
    pub from: Sender,
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ButtonPress {
    pub from: Sender,
    /// Opaque payload attached to the pressed button.
    pub data: String,
    /// The prompt message carrying the button.
    pub message: MessageHandle,
}

/// Handle to a message previously sent through the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageHandle {
    pub chat_id: String,
    pub message_id: i64,
}

/// A button offered in a choice prompt.
#[derive(Debug, Clone, Serialize)]
pub struct ChoiceButton {
    pub label: String,
    pub data: String,
}

/// Outgoing message request.
#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest {
    pub recipient: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buttons: Option<Vec<ChoiceButton>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageResponse {
    pub message_id: i64,
}

/// Outgoing document request; payload travels base64-encoded.
#[derive(Debug, Clone, Serialize)]
pub struct SendDocumentRequest {
    pub recipient: String,
    pub filename: String,
    pub caption: String,
    pub data_base64: String,
}

/// Parsed event for the gateway's dispatch loop.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// A plain text message (commands included).
    Text {
        from: String,
        display_name: String,
        text: String,
    },
    /// An inline button was pressed.
    Button {
        from: String,
        display_name: String,
        data: String,
        message: MessageHandle,
    },
}

impl ChatEvent {
    /// Extract a bot event from a raw update, if it carries one.
    pub fn from_update(update: &Update) -> Option<Self> {
        if let Some(message) = &update.message {
            return Some(ChatEvent::Text {
                from: message.from.id.clone(),
                display_name: message
                    .from
                    .display_name
                    .clone()
                    .unwrap_or_else(|| message.from.id.clone()),
                text: message.text.clone(),
            });
        }
        if let Some(press) = &update.button_press {
            return Some(ChatEvent::Button {
                from: press.from.id.clone(),
                display_name: press
                    .from
                    .display_name
                    .clone()
                    .unwrap_or_else(|| press.from.id.clone()),
                data: press.data.clone(),
                message: press.message.clone(),
            });
        }
        None
    }

    /// The identity that produced this event.
    pub fn sender(&self) -> &str {
        match self {
            ChatEvent::Text { from, .. } => from,
            ChatEvent::Button { from, .. } => from,
        }
    }
}
