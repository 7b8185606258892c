//! In-memory per-registrant session state.
//!
//! Sessions hold only transient step answers; everything that must survive
//! a restart or be visible across channels (pending approvals, bans, IP
//! records, tokens) lives in the durable stores instead.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use voice_directory::AccountType;

/// Where a registrant currently is in the flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegStep {
    ChoosingLanguage,
    AwaitingUsername,
    AwaitingPassword,
    /// Admin proxy registrations only.
    AwaitingAccountType,
    AwaitingNicknameChoice,
    AwaitingNickname,
    /// Parked; the approval coordinator advances the flow from here.
    AwaitingApproval,
}

/// Transient answers collected so far for one registrant.
#[derive(Debug, Clone)]
pub struct RegSession {
    pub registrant_id: String,
    pub display_name: String,
    pub step: RegStep,
    pub locale: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub account_type: AccountType,
    pub nickname: Option<String>,
    /// Set when the initiator is an admin proxy-registering an account.
    pub admin_registrar: Option<String>,
}

impl RegSession {
    pub fn new(
        registrant_id: impl Into<String>,
        display_name: impl Into<String>,
        locale: impl Into<String>,
    ) -> Self {
        Self {
            registrant_id: registrant_id.into(),
            display_name: display_name.into(),
            step: RegStep::ChoosingLanguage,
            locale: locale.into(),
            username: None,
            password: None,
            account_type: AccountType::Standard,
            nickname: None,
            admin_registrar: None,
        }
    }

    pub fn is_admin_proxy(&self) -> bool {
        self.admin_registrar.is_some()
    }
}

/// Shared handle to the session map, keyed by registrant id.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, RegSession>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, registrant_id: &str) -> Option<RegSession> {
        self.sessions.read().await.get(registrant_id).cloned()
    }

    pub async fn put(&self, session: RegSession) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.registrant_id.clone(), session);
    }

    /// Drop a registrant's session so they can restart cleanly.
    pub async fn clear(&self, registrant_id: &str) -> bool {
        self.sessions.write().await.remove(registrant_id).is_some()
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_session_round_trip_and_clear() {
        let store = SessionStore::new();
        assert!(store.get("42").await.is_none());

        let mut session = RegSession::new("42", "Alice", "en");
        session.step = RegStep::AwaitingUsername;
        store.put(session).await;

        let loaded = store.get("42").await.unwrap();
        assert_eq!(loaded.step, RegStep::AwaitingUsername);
        assert_eq!(loaded.display_name, "Alice");

        assert!(store.clear("42").await);
        assert!(!store.clear("42").await);
        assert_eq!(store.count().await, 0);
    }
}
