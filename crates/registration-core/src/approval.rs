//! The approval coordinator.
//!
//! Binds an admin's approve/reject decision to exactly one pending
//! registration. The once-only guarantee is the store's destructive read:
//! whichever decision lands second finds nothing and is told so. A retried
//! button tap after a decision is therefore automatically a benign no-op.

use crate::commit::{CommitRequest, Registrar};
use crate::error::FlowError;
use crate::session::SessionStore;
use identity_store::IdentityStore;
use std::sync::Arc;
use tracing::{error, info};

/// Coordinates admin decisions on pending registrations.
pub struct ApprovalCoordinator {
    store: Arc<IdentityStore>,
    registrar: Arc<Registrar>,
    sessions: SessionStore,
}

impl ApprovalCoordinator {
    pub fn new(
        store: Arc<IdentityStore>,
        registrar: Arc<Registrar>,
        sessions: SessionStore,
    ) -> Self {
        Self {
            store,
            registrar,
            sessions,
        }
    }

    /// Apply an admin's decision for the given correlation key.
    ///
    /// `approve = true` runs the commit sequence with the stored answers;
    /// `approve = false` declines. Either way the pending record is gone
    /// after the first decision.
    pub async fn decide(
        &self,
        admin_id: &str,
        admin_name: &str,
        correlation_key: &str,
        approve: bool,
    ) -> Result<(), FlowError> {
        let pending = match self.store.take_pending(correlation_key).await {
            Some(pending) => pending,
            None => {
                // Race lost or stale prompt: expected, not an error.
                self.registrar
                    .tell(
                        admin_id,
                        "Registration request not found, outdated, or already processed.",
                    )
                    .await;
                return Ok(());
            }
        };

        let locales = self.registrar.locales().clone();
        let locale = pending.source.locale.clone();
        let registrant_id = pending.registrant_id.clone();
        let username = pending.account_username.clone();

        // The parked session has served its purpose either way.
        self.sessions.clear(&registrant_id).await;

        // The registrant may have become committed through another path
        // while this request sat in the queue.
        if approve && self.store.is_registered(&registrant_id).await {
            self.registrar
                .tell(admin_id, "This identity already has an account linked.")
                .await;
            self.registrar
                .tell(
                    &registrant_id,
                    &locales.tr(
                        &locale,
                        "Your registration request was processed, but this identity already \
                         has an account linked. Only one registration is allowed.",
                    ),
                )
                .await;
            return Ok(());
        }

        if approve {
            self.approve(admin_id, admin_name, pending).await
        } else {
            info!(
                "Admin {} rejected registration '{}' for {}",
                admin_id, username, registrant_id
            );
            self.registrar
                .tell(
                    admin_id,
                    &format!("User {} registration declined.", username),
                )
                .await;
            self.registrar
                .tell(
                    &registrant_id,
                    &locales.tr(
                        &locale,
                        "Your registration has been declined by the administrator.",
                    ),
                )
                .await;
            self.registrar
                .notify_admins_except(
                    admin_id,
                    &format!(
                        "ℹ️ Registration REJECTED by admin {} (ID: {}).\n\nAccount: {}\nRegistrant: {}",
                        admin_name, admin_id, username, registrant_id
                    ),
                )
                .await;
            Ok(())
        }
    }

    async fn approve(
        &self,
        admin_id: &str,
        admin_name: &str,
        pending: identity_store::PendingRegistration,
    ) -> Result<(), FlowError> {
        let locales = self.registrar.locales().clone();
        let locale = pending.source.locale.clone();
        let registrant_id = pending.registrant_id.clone();
        let username = pending.account_username.clone();

        let request = CommitRequest::from_pending(&pending);
        match self.registrar.commit(&request).await {
            Ok(outcome) => {
                info!(
                    "Admin {} approved registration '{}' for {}",
                    admin_id, username, registrant_id
                );
                self.registrar
                    .tell(
                        admin_id,
                        &format!("User {} registration approved.", username),
                    )
                    .await;
                self.registrar
                    .tell(
                        &registrant_id,
                        &locales.tr(
                            &locale,
                            "Your registration has been approved by the administrator.",
                        ),
                    )
                    .await;
                if outcome.link_failed {
                    self.registrar
                        .tell(
                            &registrant_id,
                            &locales.tr(
                                &locale,
                                "Registration completed, but a sync error occurred. Please contact an admin.",
                            ),
                        )
                        .await;
                }
                self.registrar
                    .deliver_artifacts_chat(&registrant_id, &locale, &outcome.artifacts)
                    .await;
                self.registrar
                    .notify_admins_except(
                        admin_id,
                        &format!(
                            "ℹ️ Registration APPROVED by admin {} (ID: {}).\n\nAccount: {}\nRegistrant: {}",
                            admin_name, admin_id, username, registrant_id
                        ),
                    )
                    .await;
                Ok(())
            }
            Err(e) => {
                error!(
                    "Registration '{}' was approved by {} but the commit failed: {}",
                    username, admin_id, e
                );
                self.registrar
                    .tell(
                        admin_id,
                        &format!(
                            "CRITICAL: Registration for {} was approved, but the final \
                             registration step failed. Please check logs.",
                            username
                        ),
                    )
                    .await;
                self.registrar
                    .tell(
                        &registrant_id,
                        &locales.tr(
                            &locale,
                            "Registration error. Please try again later or contact an administrator.",
                        ),
                    )
                    .await;
                Ok(())
            }
        }
    }
}
