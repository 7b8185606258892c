//! The voice-server account directory capability.
//!
//! The registration core never touches the voice server directly; everything
//! goes through the narrow [`AccountDirectory`] trait defined here. The
//! production implementation is [`HttpDirectory`], a client for the server's
//! admin REST daemon, with [`EventWatcher`] polling the daemon's event feed
//! for out-of-band account changes.

mod client;
mod error;
mod rights;
mod types;
mod watcher;

pub use client::HttpDirectory;
pub use error::DirectoryError;
pub use rights::{rights_from_names, UserRights};
pub use types::{AccountInfo, AccountType, DirectoryEvent, EventKind, EventRecord, NewAccount};
pub use watcher::EventWatcher;

use async_trait::async_trait;

/// Account-management capability of the voice server.
///
/// A fixed method set by design: callers must never depend on the shape of
/// whatever SDK or daemon sits behind it.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Does an account with this username exist?
    ///
    /// Three outcomes matter to callers: `Ok(true)` (taken), `Ok(false)`
    /// (available), and `Err` (indeterminate — callers must not treat an
    /// error as either answer).
    async fn exists(&self, username: &str) -> Result<bool, DirectoryError>;

    /// Create an account.
    async fn create(&self, account: &NewAccount) -> Result<(), DirectoryError>;

    /// Remove an account. Returns whether the account existed.
    async fn remove(&self, username: &str) -> Result<bool, DirectoryError>;

    /// Broadcast a text message on the server. Best-effort.
    async fn broadcast(&self, message: &str) -> Result<(), DirectoryError>;

    /// List all account usernames.
    async fn list(&self) -> Result<Vec<String>, DirectoryError>;
}
