//! Chat bot-gateway REST client.
//!
//! Talks to the chat platform's bot API daemon: polls for updates, sends
//! texts, documents and inline choice prompts, and retires stale prompts.
//! The registration gateway adapts this client to the workflow's messenger
//! capability; nothing in here knows about registrations.

mod client;
mod error;
mod receiver;
mod types;

pub use client::ChatClient;
pub use error::ChatError;
pub use receiver::UpdateReceiver;
pub use types::{
    ButtonPress, ChatEvent, ChoiceButton, IncomingText, MessageHandle, SendDocumentRequest,
    SendMessageRequest, SendMessageResponse, Sender, Update,
};
