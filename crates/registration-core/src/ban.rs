//! Automatic ban propagation for externally removed accounts.

use crate::commit::Registrar;
use identity_store::IdentityStore;
use std::sync::Arc;
use tokio_stream::{Stream, StreamExt};
use tracing::{error, info, warn};
use voice_directory::DirectoryEvent;

/// Watches directory events and mirrors external account removals into
/// bans, so a removed user cannot simply re-register over chat.
///
/// Nothing here may block or fail the directory's own event handling:
/// every error is logged and dropped.
pub struct BanWatcher {
    store: Arc<IdentityStore>,
    registrar: Arc<Registrar>,
}

impl BanWatcher {
    pub fn new(store: Arc<IdentityStore>, registrar: Arc<Registrar>) -> Self {
        Self { store, registrar }
    }

    /// Consume the directory event stream until it ends.
    pub async fn run(self, events: impl Stream<Item = DirectoryEvent>) {
        tokio::pin!(events);
        while let Some(event) = events.next().await {
            self.handle(event).await;
        }
        warn!("Directory event stream ended");
    }

    /// React to one directory event.
    pub async fn handle(&self, event: DirectoryEvent) {
        match event {
            DirectoryEvent::AccountAdded(username) => {
                info!("Directory account '{}' created externally", username);
                self.registrar
                    .notify_admins(&format!(
                        "Voice server: user account '{}' has been CREATED.",
                        username
                    ))
                    .await;
            }
            DirectoryEvent::AccountRemoved(username) => {
                info!("Directory account '{}' removed", username);
                self.ban_linked_registrant(&username).await;
                self.registrar
                    .notify_admins(&format!(
                        "Voice server: user account '{}' has been REMOVED.",
                        username
                    ))
                    .await;
            }
        }
    }

    async fn ban_linked_registrant(&self, username: &str) {
        let registrant_id = match self.store.registrant_for_username(username).await {
            Some(id) => id,
            None => {
                warn!(
                    "No linked registrant for removed account '{}'; nothing to ban",
                    username
                );
                return;
            }
        };

        match self
            .store
            .upsert_ban(
                &registrant_id,
                Some(username.to_string()),
                None,
                "Account removed from the voice server",
            )
            .await
        {
            Ok(_) => info!(
                "Automatically banned registrant {} (account '{}')",
                registrant_id, username
            ),
            Err(e) => error!(
                "Ban propagation failed for registrant {} ('{}'): {}",
                registrant_id, username, e
            ),
        }
    }
}
