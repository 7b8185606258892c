//! Directory wire types.

use crate::rights::UserRights;
use serde::{Deserialize, Serialize};

/// Privilege tier of a directory account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// Regular user account.
    Standard,
    /// Privileged (server admin) account.
    Elevated,
}

impl Default for AccountType {
    fn default() -> Self {
        AccountType::Standard
    }
}

/// Request to create a directory account.
#[derive(Debug, Clone, Serialize)]
pub struct NewAccount {
    pub username: String,
    pub password: String,
    pub account_type: AccountType,
    pub rights: UserRights,
    pub note: String,
}

impl NewAccount {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        account_type: AccountType,
        rights: UserRights,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            account_type,
            rights,
            note: String::new(),
        }
    }
}

/// An account record as returned by the directory daemon.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountInfo {
    pub username: String,
    #[serde(default)]
    pub account_type: Option<AccountType>,
}

/// Out-of-band change to the directory's account table.
///
/// Fired for changes made by any actor, including admins acting directly on
/// the voice server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryEvent {
    AccountAdded(String),
    AccountRemoved(String),
}

/// One entry of the daemon's event feed.
#[derive(Debug, Clone, Deserialize)]
pub struct EventRecord {
    pub seq: u64,
    pub kind: EventKind,
    pub username: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    AccountAdded,
    AccountRemoved,
}

impl EventRecord {
    pub fn into_event(self) -> DirectoryEvent {
        match self.kind {
            EventKind::AccountAdded => DirectoryEvent::AccountAdded(self.username),
            EventKind::AccountRemoved => DirectoryEvent::AccountRemoved(self.username),
        }
    }
}
