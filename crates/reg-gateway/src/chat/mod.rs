//! The chat front-end: event dispatch onto the registration workflow.

mod commands;
mod messenger;

pub use commands::AdminCommands;
pub use messenger::ChatMessenger;

use chat_client::{ChatClient, ChatEvent, MessageHandle};
use registration_core::{
    parse_callback, ApprovalCoordinator, CallbackAction, FlowInput, RegistrationFlow,
    RegistrationPolicy, Reply,
};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Routes incoming chat events to the flow, the approval coordinator or the
/// admin commands, and renders the replies back through the chat client.
pub struct ChatRouter {
    client: Arc<ChatClient>,
    flow: Arc<RegistrationFlow>,
    coordinator: Arc<ApprovalCoordinator>,
    commands: AdminCommands,
    policy: RegistrationPolicy,
}

impl ChatRouter {
    pub fn new(
        client: Arc<ChatClient>,
        flow: Arc<RegistrationFlow>,
        coordinator: Arc<ApprovalCoordinator>,
        commands: AdminCommands,
        policy: RegistrationPolicy,
    ) -> Self {
        Self {
            client,
            flow,
            coordinator,
            commands,
            policy,
        }
    }

    /// Handle one chat event. Never propagates errors into the poll loop.
    pub async fn dispatch(&self, event: ChatEvent) {
        match event {
            ChatEvent::Text {
                from,
                display_name,
                text,
            } => self.on_text(&from, &display_name, &text).await,
            ChatEvent::Button {
                from,
                display_name,
                data,
                message,
            } => self.on_button(&from, &display_name, &data, message).await,
        }
    }

    async fn on_text(&self, from: &str, display_name: &str, text: &str) {
        let input = match text.trim() {
            "/start" => FlowInput::Start,
            "/cancel" => FlowInput::Cancel,
            "/help" => {
                self.send_text(from, &AdminCommands::help_text(self.policy.is_admin(from)))
                    .await;
                return;
            }
            line if AdminCommands::is_admin_command(line) => {
                if !self.policy.is_admin(from) {
                    self.send_text(from, &AdminCommands::help_text(false)).await;
                    return;
                }
                let reply = self.commands.execute(from, line).await;
                self.send_text(from, &reply).await;
                return;
            }
            _ => FlowInput::Text(text.to_string()),
        };

        match self.flow.handle(from, display_name, input).await {
            Ok(replies) => self.send_replies(from, replies).await,
            Err(e) => {
                error!("Flow error for {}: {}", from, e);
                self.send_text(from, "Sorry, something went wrong. Please try again later.")
                    .await;
            }
        }
    }

    async fn on_button(
        &self,
        from: &str,
        display_name: &str,
        data: &str,
        message: MessageHandle,
    ) {
        let action = match parse_callback(data) {
            Some(action) => action,
            None => {
                debug!("Unknown button payload '{}' from {}", data, from);
                return;
            }
        };

        // Retire the tapped prompt so its buttons go dead either way.
        if let Err(e) = self.client.retire_message(&message).await {
            debug!("Could not retire prompt {}: {}", message.message_id, e);
        }

        let input = match action {
            CallbackAction::Approve(key) | CallbackAction::Reject(key)
                if !self.policy.is_admin(from) =>
            {
                warn!("Non-admin {} tapped a decision button for {}", from, key);
                return;
            }
            CallbackAction::Approve(key) => {
                if let Err(e) = self.coordinator.decide(from, display_name, &key, true).await {
                    error!("Approval handling failed: {}", e);
                }
                return;
            }
            CallbackAction::Reject(key) => {
                if let Err(e) = self
                    .coordinator
                    .decide(from, display_name, &key, false)
                    .await
                {
                    error!("Rejection handling failed: {}", e);
                }
                return;
            }
            CallbackAction::Locale(code) => FlowInput::LocaleSelected(code),
            CallbackAction::NicknameChoice(wants_custom) => {
                FlowInput::NicknameChoice(wants_custom)
            }
            CallbackAction::AccountType(account_type) => {
                FlowInput::AccountTypeSelected(account_type)
            }
        };

        match self.flow.handle(from, display_name, input).await {
            Ok(replies) => self.send_replies(from, replies).await,
            Err(e) => {
                error!("Flow error for {}: {}", from, e);
                self.send_text(from, "Sorry, something went wrong. Please try again later.")
                    .await;
            }
        }
    }

    async fn send_replies(&self, recipient: &str, replies: Vec<Reply>) {
        for reply in replies {
            match reply {
                Reply::Text(text) => self.send_text(recipient, &text).await,
                Reply::Choices { text, choices } => {
                    let buttons = choices
                        .into_iter()
                        .map(|c| chat_client::ChoiceButton {
                            label: c.label,
                            data: c.data,
                        })
                        .collect();
                    if let Err(e) = self.client.send_choices(recipient, &text, buttons).await {
                        error!("Failed to send prompt to {}: {}", recipient, e);
                    }
                }
                Reply::Document {
                    bytes,
                    filename,
                    caption,
                } => {
                    if let Err(e) = self
                        .client
                        .send_document(recipient, &bytes, &filename, &caption)
                        .await
                    {
                        error!("Failed to send document to {}: {}", recipient, e);
                    }
                }
            }
        }
    }

    async fn send_text(&self, recipient: &str, text: &str) {
        if let Err(e) = self.client.send_text(recipient, text).await {
            error!("Failed to send reply to {}: {}", recipient, e);
        }
    }
}
