//! The shared commit sequence and admin notification fan-out.

use crate::channel::{Choice, Messenger};
use crate::error::FlowError;
use crate::flow::callback;
use crate::locale::LocaleCatalog;
use crate::policy::RegistrationPolicy;
use artifact_gen::{ArtifactGenerator, ConnectionArtifacts};
use identity_store::{ChannelKind, IdentityStore, PendingRegistration, SourceContext};
use std::sync::Arc;
use tracing::{error, info, warn};
use voice_directory::{AccountDirectory, AccountType, NewAccount};

/// Everything the commit sequence needs about one registration.
#[derive(Debug, Clone)]
pub struct CommitRequest {
    /// The chat identity to link, or `None` for web registrations.
    pub registrant_id: Option<String>,
    pub username: String,
    pub password: String,
    pub nickname: String,
    pub source: SourceContext,
}

impl CommitRequest {
    /// Build a commit request from a consumed pending registration.
    pub fn from_pending(pending: &PendingRegistration) -> Self {
        Self {
            registrant_id: Some(pending.registrant_id.clone()),
            username: pending.account_username.clone(),
            password: pending.cleartext_password.clone(),
            nickname: pending.display_nickname.clone(),
            source: pending.source.clone(),
        }
    }
}

/// What a successful commit produced.
#[derive(Debug, Clone)]
pub struct CommitOutcome {
    /// Rendered connection artifacts, delivered per-channel by the caller.
    pub artifacts: ConnectionArtifacts,
    /// The account exists upstream but the local link write failed.
    pub link_failed: bool,
}

/// Runs the commit sequence and owns all admin-facing notifications.
///
/// Shared by the auto-approve path, the approval coordinator and the web
/// registration service so every channel commits identically.
pub struct Registrar {
    store: Arc<IdentityStore>,
    directory: Arc<dyn AccountDirectory>,
    artifacts: Arc<ArtifactGenerator>,
    messenger: Arc<dyn Messenger>,
    locales: Arc<LocaleCatalog>,
    policy: RegistrationPolicy,
}

impl Registrar {
    pub fn new(
        store: Arc<IdentityStore>,
        directory: Arc<dyn AccountDirectory>,
        artifacts: Arc<ArtifactGenerator>,
        messenger: Arc<dyn Messenger>,
        locales: Arc<LocaleCatalog>,
        policy: RegistrationPolicy,
    ) -> Self {
        Self {
            store,
            directory,
            artifacts,
            messenger,
            locales,
            policy,
        }
    }

    pub fn policy(&self) -> &RegistrationPolicy {
        &self.policy
    }

    pub fn artifacts(&self) -> &ArtifactGenerator {
        &self.artifacts
    }

    pub fn locales(&self) -> &LocaleCatalog {
        &self.locales
    }

    /// Run the commit sequence.
    ///
    /// On directory failure nothing is written locally and the error is
    /// returned for the caller to translate. A failed link write after the
    /// account already exists upstream is the one inconsistency that must
    /// never be swallowed: it is logged as critical, fanned out to every
    /// admin, and flagged in the outcome — but the commit still succeeds.
    pub async fn commit(&self, request: &CommitRequest) -> Result<CommitOutcome, FlowError> {
        let account_type = if request.source.elevated {
            AccountType::Elevated
        } else {
            AccountType::Standard
        };
        let account = NewAccount::new(
            &request.username,
            &request.password,
            account_type,
            self.policy.default_rights,
        );

        if let Err(e) = self.directory.create(&account).await {
            error!(
                "Directory account creation failed for '{}': {}",
                request.username, e
            );
            return Err(e.into());
        }
        info!("Directory account '{}' created", request.username);

        if self.policy.broadcast_enabled {
            let announcement = format!("User {} was registered.", request.username);
            if let Err(e) = self.directory.broadcast(&announcement).await {
                warn!("Registration broadcast failed: {}", e);
            }
        }

        let mut link_failed = false;
        if let Some(registrant_id) = &request.registrant_id {
            // Admin proxy registrations never link: the proxied person has
            // no chat identity, and admins keep their own slot free.
            if !request.source.is_admin_proxy() {
                if let Err(e) = self
                    .store
                    .insert_registration(registrant_id, &request.username)
                    .await
                {
                    error!(
                        "CRITICAL: account '{}' exists on the voice server but the \
                         local registration link for {} could not be written: {}",
                        request.username, registrant_id, e
                    );
                    self.notify_admins(&format!(
                        "CRITICAL SYNC ERROR: account '{}' (registrant {}) was created \
                         on the voice server but saving the local registration record \
                         failed: {}. Manual reconciliation required.",
                        request.username, registrant_id, e
                    ))
                    .await;
                    link_failed = true;
                }
            }
        }

        self.notify_admins(&self.registration_summary(request)).await;

        let artifacts =
            self.artifacts
                .render(&request.username, &request.password, &request.nickname);

        Ok(CommitOutcome {
            artifacts,
            link_failed,
        })
    }

    fn registration_summary(&self, request: &CommitRequest) -> String {
        let channel = match request.source.channel {
            ChannelKind::Chat => "chat",
            ChannelKind::Web => "web form",
        };
        let mut summary = format!("📢 User {} was registered.\n", request.username);
        summary.push_str(&format!("👤 Client locale: {}\n", request.source.locale));
        match request.registrant_id.as_deref() {
            Some(id) => summary.push_str(&format!(
                "📱 Via {}: {} (ID: {})\n",
                channel, request.source.requester_name, id
            )),
            None => summary.push_str(&format!(
                "📱 Via {}: {}\n",
                channel,
                request
                    .source
                    .ip_address
                    .as_deref()
                    .unwrap_or(&request.source.requester_name)
            )),
        }
        if let Some(admin) = &request.source.registered_by_admin {
            summary.push_str(&format!("🔑 Registered by admin ID: {}\n", admin));
        }
        summary.trim_end().to_string()
    }

    /// Send an approval prompt for a pending registration to every admin.
    pub async fn prompt_admins_approval(&self, pending: &PendingRegistration) {
        let mut text = format!(
            "Registration request:\nUsername: {}\n",
            pending.account_username
        );
        if pending.display_nickname != pending.account_username {
            text.push_str(&format!("Nickname: {}\n", pending.display_nickname));
        }
        text.push_str(&format!(
            "Requested by: {} (ID: {})\nApprove registration?",
            pending.source.requester_name, pending.registrant_id
        ));

        let choices = [
            Choice::new(
                "Yes",
                format!("{}{}", callback::APPROVE_PREFIX, pending.correlation_key),
            ),
            Choice::new(
                "No",
                format!("{}{}", callback::REJECT_PREFIX, pending.correlation_key),
            ),
        ];

        for admin_id in &self.policy.admin_ids {
            if let Err(e) = self
                .messenger
                .prompt_choices(admin_id, &text, &choices)
                .await
            {
                error!("Failed to send approval prompt to admin {}: {}", admin_id, e);
            }
        }
    }

    /// Fan a notification out to every configured admin. Errors are logged.
    pub async fn notify_admins(&self, text: &str) {
        if self.policy.admin_ids.is_empty() {
            info!("No admins configured, skipping notification");
            return;
        }
        for admin_id in &self.policy.admin_ids {
            if let Err(e) = self.messenger.send_text(admin_id, text).await {
                error!("Failed to notify admin {}: {}", admin_id, e);
            }
        }
    }

    /// Notify every admin except the one who acted.
    pub async fn notify_admins_except(&self, acting_admin: &str, text: &str) {
        for admin_id in &self.policy.admin_ids {
            if admin_id == acting_admin {
                continue;
            }
            if let Err(e) = self.messenger.send_text(admin_id, text).await {
                error!("Failed to notify admin {}: {}", admin_id, e);
            }
        }
    }

    /// Send a text to a registrant, logging instead of failing.
    pub async fn tell(&self, recipient: &str, text: &str) {
        if let Err(e) = self.messenger.send_text(recipient, text).await {
            warn!("Could not message {}: {}", recipient, e);
        }
    }

    /// Deliver rendered artifacts in-band over chat: the connection file as
    /// a document plus the quick-connect link.
    pub async fn deliver_artifacts_chat(
        &self,
        recipient: &str,
        locale: &str,
        artifacts: &ConnectionArtifacts,
    ) {
        let caption = self
            .locales
            .tr(locale, "Your connection file for quick access");
        let document = self
            .messenger
            .send_document(
                recipient,
                artifacts.document.clone().into_bytes(),
                &artifacts.filename,
                &caption,
            )
            .await;

        let link_text = format!(
            "{}\n{}",
            self.locales.tr(locale, "Or use this quick connect link:"),
            artifacts.quick_connect
        );
        let link = self.messenger.send_text(recipient, &link_text).await;

        if document.is_err() || link.is_err() {
            error!("Error delivering connection artifacts to {}", recipient);
            self.tell(
                recipient,
                &self.locales.tr(
                    locale,
                    "Could not send the connection file or link. Please contact an admin.",
                ),
            )
            .await;
        }
    }
}
