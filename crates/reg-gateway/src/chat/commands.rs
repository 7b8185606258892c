//! Admin chat commands.

use identity_store::IdentityStore;
use std::sync::Arc;
use tracing::info;
use voice_directory::AccountDirectory;

const USER_HELP: &str = "Commands:\n\
    /start — register a voice-server account\n\
    /cancel — abandon the current registration\n\
    /help — this message";

const ADMIN_HELP: &str = "Admin commands:\n\
    /accounts — list voice-server accounts\n\
    /remove <username> — remove a voice-server account\n\
    /banned — list banned identities\n\
    /unban <registrant id> — lift a ban";

/// Handles slash commands that are not part of the registration flow.
pub struct AdminCommands {
    store: Arc<IdentityStore>,
    directory: Arc<dyn AccountDirectory>,
}

impl AdminCommands {
    pub fn new(store: Arc<IdentityStore>, directory: Arc<dyn AccountDirectory>) -> Self {
        Self { store, directory }
    }

    pub fn help_text(is_admin: bool) -> String {
        if is_admin {
            format!("{}\n\n{}", USER_HELP, ADMIN_HELP)
        } else {
            USER_HELP.to_string()
        }
    }

    /// Execute an admin command line; returns the reply text.
    pub async fn execute(&self, admin_id: &str, line: &str) -> String {
        let mut parts = line.split_whitespace();
        let command = parts.next().unwrap_or_default();
        let argument = parts.next();

        match (command, argument) {
            ("/accounts", _) => match self.directory.list().await {
                Ok(accounts) if accounts.is_empty() => "No accounts on the server.".into(),
                Ok(accounts) => format!(
                    "Accounts ({}):\n{}",
                    accounts.len(),
                    accounts.join("\n")
                ),
                Err(e) => format!("Could not list accounts: {}", e),
            },
            ("/remove", Some(username)) => match self.directory.remove(username).await {
                // Ban propagation runs off the directory's removal event.
                Ok(true) => {
                    info!("Admin {} removed account '{}'", admin_id, username);
                    format!("Account '{}' removed.", username)
                }
                Ok(false) => format!("Account '{}' not found.", username),
                Err(e) => format!("Could not remove account: {}", e),
            },
            ("/remove", None) => "Usage: /remove <username>".into(),
            ("/banned", _) => {
                let bans = self.store.bans().await;
                if bans.is_empty() {
                    return "No banned identities.".into();
                }
                let lines: Vec<String> = bans
                    .iter()
                    .map(|b| {
                        format!(
                            "{} ({}) — {} [{}]",
                            b.registrant_id,
                            b.linked_account_username.as_deref().unwrap_or("no account"),
                            b.reason,
                            b.banned_by.as_deref().unwrap_or("automatic")
                        )
                    })
                    .collect();
                format!("Banned ({}):\n{}", lines.len(), lines.join("\n"))
            }
            ("/unban", Some(registrant_id)) => match self.store.remove_ban(registrant_id).await {
                Ok(true) => {
                    info!("Admin {} unbanned {}", admin_id, registrant_id);
                    format!("Ban lifted for {}.", registrant_id)
                }
                Ok(false) => format!("No ban found for {}.", registrant_id),
                Err(e) => format!("Could not lift ban: {}", e),
            },
            ("/unban", None) => "Usage: /unban <registrant id>".into(),
            _ => Self::help_text(true),
        }
    }

    pub fn is_admin_command(line: &str) -> bool {
        matches!(
            line.split_whitespace().next().unwrap_or_default(),
            "/accounts" | "/remove" | "/banned" | "/unban"
        )
    }
}
