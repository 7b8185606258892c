//! Record types persisted by the identity and token stores.

use crate::token::generate_token;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which front-end channel a registration came through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Chat,
    Web,
}

/// Metadata about who requested a registration and how.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceContext {
    pub channel: ChannelKind,

    /// Locale the registrant chose (or was forced into).
    pub locale: String,

    /// Display name of the requester as reported by the channel.
    pub requester_name: String,

    /// Source IP for web registrations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,

    /// Set when an admin registered this account on someone's behalf.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registered_by_admin: Option<String>,

    /// Whether the directory account should be privileged.
    pub elevated: bool,
}

impl SourceContext {
    pub fn chat(locale: impl Into<String>, requester_name: impl Into<String>) -> Self {
        Self {
            channel: ChannelKind::Chat,
            locale: locale.into(),
            requester_name: requester_name.into(),
            ip_address: None,
            registered_by_admin: None,
            elevated: false,
        }
    }

    pub fn web(locale: impl Into<String>, ip_address: impl Into<String>) -> Self {
        Self {
            channel: ChannelKind::Web,
            locale: locale.into(),
            requester_name: "web form".into(),
            ip_address: Some(ip_address.into()),
            registered_by_admin: None,
            elevated: false,
        }
    }

    /// True when an admin is proxy-registering someone else.
    pub fn is_admin_proxy(&self) -> bool {
        self.registered_by_admin.is_some()
    }
}

/// A committed link between a chat identity and a voice-server account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationRecord {
    pub registrant_id: String,
    pub account_username: String,
    pub registered_at: DateTime<Utc>,
}

/// An in-flight registration parked until an admin approves or rejects it.
///
/// Consumed exactly once: [`crate::IdentityStore::take_pending`] is a
/// destructive read, so a second decision on the same key finds nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingRegistration {
    pub correlation_key: String,
    pub registrant_id: String,
    pub account_username: String,
    pub cleartext_password: String,
    pub display_nickname: String,
    pub source: SourceContext,
    pub created_at: DateTime<Utc>,
}

impl PendingRegistration {
    /// Create a pending record with a fresh unguessable correlation key.
    pub fn new(
        registrant_id: impl Into<String>,
        account_username: impl Into<String>,
        cleartext_password: impl Into<String>,
        display_nickname: impl Into<String>,
        source: SourceContext,
    ) -> Self {
        Self {
            correlation_key: generate_token(),
            registrant_id: registrant_id.into(),
            account_username: account_username.into(),
            cleartext_password: cleartext_password.into(),
            display_nickname: display_nickname.into(),
            source,
            created_at: Utc::now(),
        }
    }
}

/// A banned chat identity.
///
/// `banned_by = None` marks an automatic ban (account removed externally).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BannedIdentity {
    pub registrant_id: String,
    pub linked_account_username: Option<String>,
    pub banned_by: Option<String>,
    pub reason: String,
    pub banned_at: DateTime<Utc>,
}

/// An IP address that already completed a web registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredIp {
    pub ip_address: String,
    pub account_username: Option<String>,
    pub registered_at: DateTime<Utc>,
}

/// What kind of artifact a download token points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    ConfigFile,
    ClientBundle,
}

/// An expiring, single-use token for a generated artifact on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadToken {
    pub token: String,
    pub server_side_path: String,
    pub user_facing_filename: String,
    pub kind: ArtifactKind,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_used: bool,
}

impl DownloadToken {
    /// Create a token for a freshly written artifact with the given TTL.
    pub fn new(
        server_side_path: impl Into<String>,
        user_facing_filename: impl Into<String>,
        kind: ArtifactKind,
        ttl: Duration,
    ) -> Self {
        let now = Utc::now();
        let ttl = ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::seconds(600));
        Self {
            token: generate_token(),
            server_side_path: server_side_path.into(),
            user_facing_filename: user_facing_filename.into(),
            kind,
            created_at: now,
            expires_at: now + ttl,
            is_used: false,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}
