//! The identity store: registrations, pending approvals, bans, web IPs.

use crate::error::StoreError;
use crate::snapshot;
use crate::types::*;
use chrono::{Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Schema version for migrations.
const DATA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IdentityData {
    version: u32,
    /// Committed links, keyed by registrant id.
    registrations: HashMap<String, RegistrationRecord>,
    /// Awaiting-approval records, keyed by correlation key.
    pending: HashMap<String, PendingRegistration>,
    /// Bans, keyed by registrant id.
    bans: HashMap<String, BannedIdentity>,
    /// Web registrations, keyed by IP address.
    ips: HashMap<String, RegisteredIp>,
}

impl Default for IdentityData {
    fn default() -> Self {
        Self {
            version: DATA_VERSION,
            registrations: HashMap::new(),
            pending: HashMap::new(),
            bans: HashMap::new(),
            ips: HashMap::new(),
        }
    }
}

/// Durable identity records shared by every front-end channel.
///
/// All mutating operations run inside one write-lock critical section and
/// snapshot to disk afterwards. [`IdentityStore::take_pending`] is the
/// destructive read the approval workflow's once-only guarantee rests on.
pub struct IdentityStore {
    data: RwLock<IdentityData>,
    storage_path: Option<PathBuf>,
}

impl IdentityStore {
    /// Create a memory-only store (tests, ephemeral runs).
    pub fn memory() -> Arc<Self> {
        Arc::new(Self {
            data: RwLock::new(IdentityData::default()),
            storage_path: None,
        })
    }

    /// Open a file-backed store, loading the existing snapshot if present.
    pub async fn open(path: PathBuf) -> Result<Arc<Self>, StoreError> {
        let data = match snapshot::load::<IdentityData>(&path).await? {
            Some(data) => {
                info!(
                    "Loaded identity store: {} registrations, {} pending, {} bans, {} ips",
                    data.registrations.len(),
                    data.pending.len(),
                    data.bans.len(),
                    data.ips.len()
                );
                data
            }
            None => {
                info!("Identity store not found at {:?}, starting fresh", path);
                IdentityData::default()
            }
        };

        Ok(Arc::new(Self {
            data: RwLock::new(data),
            storage_path: Some(path),
        }))
    }

    async fn persist(&self, data: &IdentityData) -> Result<(), StoreError> {
        if let Some(path) = &self.storage_path {
            snapshot::save(path, data).await?;
        }
        Ok(())
    }

    // --- registrations ---

    /// Is this registrant already linked to an account?
    pub async fn is_registered(&self, registrant_id: &str) -> bool {
        let data = self.data.read().await;
        data.registrations.contains_key(registrant_id)
    }

    /// Account username linked to a registrant, if any.
    pub async fn username_for(&self, registrant_id: &str) -> Option<String> {
        let data = self.data.read().await;
        data.registrations
            .get(registrant_id)
            .map(|r| r.account_username.clone())
    }

    /// Registrant id linked to an account username, if any.
    pub async fn registrant_for_username(&self, account_username: &str) -> Option<String> {
        let data = self.data.read().await;
        data.registrations
            .values()
            .find(|r| r.account_username == account_username)
            .map(|r| r.registrant_id.clone())
    }

    /// Link a registrant to an account username.
    ///
    /// Rejects a second registration for the same registrant and a username
    /// already linked elsewhere; both uniqueness rules hold forever.
    pub async fn insert_registration(
        &self,
        registrant_id: &str,
        account_username: &str,
    ) -> Result<RegistrationRecord, StoreError> {
        let mut data = self.data.write().await;

        if data.registrations.contains_key(registrant_id) {
            return Err(StoreError::AlreadyRegistered(registrant_id.to_string()));
        }
        if data
            .registrations
            .values()
            .any(|r| r.account_username == account_username)
        {
            return Err(StoreError::UsernameTaken(account_username.to_string()));
        }

        let record = RegistrationRecord {
            registrant_id: registrant_id.to_string(),
            account_username: account_username.to_string(),
            registered_at: Utc::now(),
        };
        data.registrations
            .insert(registrant_id.to_string(), record.clone());
        self.persist(&data).await?;

        info!(
            "Linked registrant {} to account '{}'",
            registrant_id, account_username
        );
        Ok(record)
    }

    /// Remove a registrant's link. Returns whether anything was removed.
    pub async fn remove_registration(&self, registrant_id: &str) -> Result<bool, StoreError> {
        let mut data = self.data.write().await;
        let removed = data.registrations.remove(registrant_id).is_some();
        if removed {
            self.persist(&data).await?;
            info!("Removed registration for {}", registrant_id);
        }
        Ok(removed)
    }

    pub async fn registrations(&self) -> Vec<RegistrationRecord> {
        let data = self.data.read().await;
        data.registrations.values().cloned().collect()
    }

    // --- pending registrations ---

    /// Park a registration awaiting an admin decision.
    pub async fn insert_pending(&self, pending: PendingRegistration) -> Result<(), StoreError> {
        let mut data = self.data.write().await;
        if data.pending.contains_key(&pending.correlation_key) {
            return Err(StoreError::DuplicateKey);
        }
        let key = pending.correlation_key.clone();
        data.pending.insert(key.clone(), pending);
        self.persist(&data).await?;
        info!("Stored pending registration {}", key);
        Ok(())
    }

    /// Atomically fetch-and-delete a pending registration.
    ///
    /// The second caller for the same key gets `None`; that is the entire
    /// once-only mechanism for racing admin decisions.
    pub async fn take_pending(&self, correlation_key: &str) -> Option<PendingRegistration> {
        let mut data = self.data.write().await;
        let taken = data.pending.remove(correlation_key);
        if taken.is_some() {
            if let Err(e) = self.persist(&data).await {
                warn!("Failed to persist after taking pending registration: {}", e);
            }
            info!("Consumed pending registration {}", correlation_key);
        } else {
            debug!("No pending registration for key {}", correlation_key);
        }
        taken
    }

    /// Delete pending registrations older than `ttl`. Returns the count.
    pub async fn sweep_pending(&self, ttl: Duration) -> Result<usize, StoreError> {
        let cutoff = Utc::now()
            - ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::seconds(0));
        let mut data = self.data.write().await;
        let before = data.pending.len();
        data.pending.retain(|_, p| p.created_at >= cutoff);
        let removed = before - data.pending.len();
        if removed > 0 {
            self.persist(&data).await?;
        }
        Ok(removed)
    }

    pub async fn pending_count(&self) -> usize {
        self.data.read().await.pending.len()
    }

    // --- bans ---

    /// Ban a registrant, updating reason and timestamp if already banned.
    pub async fn upsert_ban(
        &self,
        registrant_id: &str,
        linked_account_username: Option<String>,
        banned_by: Option<String>,
        reason: impl Into<String>,
    ) -> Result<BannedIdentity, StoreError> {
        let mut data = self.data.write().await;
        let reason = reason.into();

        let ban = match data.bans.get_mut(registrant_id) {
            Some(existing) => {
                if linked_account_username.is_some() {
                    existing.linked_account_username = linked_account_username;
                }
                if banned_by.is_some() {
                    existing.banned_by = banned_by;
                }
                existing.reason = reason;
                existing.banned_at = Utc::now();
                existing.clone()
            }
            None => {
                let ban = BannedIdentity {
                    registrant_id: registrant_id.to_string(),
                    linked_account_username,
                    banned_by,
                    reason,
                    banned_at: Utc::now(),
                };
                data.bans.insert(registrant_id.to_string(), ban.clone());
                ban
            }
        };

        self.persist(&data).await?;
        info!("Recorded ban for registrant {}", registrant_id);
        Ok(ban)
    }

    pub async fn remove_ban(&self, registrant_id: &str) -> Result<bool, StoreError> {
        let mut data = self.data.write().await;
        let removed = data.bans.remove(registrant_id).is_some();
        if removed {
            self.persist(&data).await?;
            info!("Removed ban for registrant {}", registrant_id);
        }
        Ok(removed)
    }

    pub async fn is_banned(&self, registrant_id: &str) -> bool {
        self.data.read().await.bans.contains_key(registrant_id)
    }

    /// All bans, newest first.
    pub async fn bans(&self) -> Vec<BannedIdentity> {
        let data = self.data.read().await;
        let mut bans: Vec<_> = data.bans.values().cloned().collect();
        bans.sort_by(|a, b| b.banned_at.cmp(&a.banned_at));
        bans
    }

    // --- registered IPs ---

    /// Record a successful web registration from an IP.
    pub async fn record_ip(
        &self,
        ip_address: &str,
        account_username: Option<String>,
    ) -> Result<RegisteredIp, StoreError> {
        let mut data = self.data.write().await;
        if data.ips.contains_key(ip_address) {
            return Err(StoreError::IpAlreadyRegistered(ip_address.to_string()));
        }
        let record = RegisteredIp {
            ip_address: ip_address.to_string(),
            account_username,
            registered_at: Utc::now(),
        };
        data.ips.insert(ip_address.to_string(), record.clone());
        self.persist(&data).await?;
        Ok(record)
    }

    pub async fn is_ip_registered(&self, ip_address: &str) -> bool {
        self.data.read().await.ips.contains_key(ip_address)
    }

    /// Delete IP records older than `ttl`. Returns the count.
    pub async fn sweep_ips(&self, ttl: Duration) -> Result<usize, StoreError> {
        let cutoff = Utc::now()
            - ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::seconds(0));
        let mut data = self.data.write().await;
        let before = data.ips.len();
        data.ips.retain(|_, ip| ip.registered_at >= cutoff);
        let removed = before - data.ips.len();
        if removed > 0 {
            self.persist(&data).await?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat_source() -> SourceContext {
        SourceContext::chat("en", "Alice Example")
    }

    #[tokio::test]
    async fn test_registration_is_unique_per_registrant_and_username() {
        let store = IdentityStore::memory();

        store.insert_registration("42", "alice").await.unwrap();
        assert!(store.is_registered("42").await);
        assert_eq!(store.username_for("42").await.as_deref(), Some("alice"));
        assert_eq!(store.registrant_for_username("alice").await.as_deref(), Some("42"));

        let err = store.insert_registration("42", "alice2").await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyRegistered(_)));

        let err = store.insert_registration("43", "alice").await.unwrap_err();
        assert!(matches!(err, StoreError::UsernameTaken(_)));
    }

    #[tokio::test]
    async fn test_take_pending_succeeds_exactly_once() {
        let store = IdentityStore::memory();
        let pending =
            PendingRegistration::new("42", "alice", "secret", "Alice", chat_source());
        let key = pending.correlation_key.clone();
        store.insert_pending(pending).await.unwrap();

        let first = store.take_pending(&key).await;
        assert!(first.is_some());
        assert_eq!(first.unwrap().account_username, "alice");

        let second = store.take_pending(&key).await;
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_take_pending_race_yields_single_winner() {
        let store = IdentityStore::memory();
        let pending =
            PendingRegistration::new("42", "alice", "secret", "Alice", chat_source());
        let key = pending.correlation_key.clone();
        store.insert_pending(pending).await.unwrap();

        let (a, b) = tokio::join!(store.take_pending(&key), store.take_pending(&key));
        assert_eq!(a.is_some() as u8 + b.is_some() as u8, 1);
    }

    #[tokio::test]
    async fn test_sweep_pending_removes_only_expired() {
        let store = IdentityStore::memory();

        for i in 0..5 {
            let mut pending = PendingRegistration::new(
                format!("reg-{i}"),
                format!("user-{i}"),
                "pw",
                format!("user-{i}"),
                chat_source(),
            );
            // Back-date two of the five past the TTL.
            if i < 2 {
                pending.created_at = Utc::now() - ChronoDuration::seconds(3600);
            }
            store.insert_pending(pending).await.unwrap();
        }
        assert_eq!(store.pending_count().await, 5);

        let removed = store
            .sweep_pending(Duration::from_secs(600))
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.pending_count().await, 3);
    }

    #[tokio::test]
    async fn test_ban_upsert_updates_existing() {
        let store = IdentityStore::memory();

        let ban = store
            .upsert_ban("42", Some("alice".into()), None, "account removed externally")
            .await
            .unwrap();
        assert!(ban.banned_by.is_none());

        let ban = store
            .upsert_ban("42", None, Some("admin-1".into()), "manual ban")
            .await
            .unwrap();
        assert_eq!(ban.banned_by.as_deref(), Some("admin-1"));
        assert_eq!(ban.reason, "manual ban");
        assert_eq!(ban.linked_account_username.as_deref(), Some("alice"));
        assert_eq!(store.bans().await.len(), 1);
    }

    #[tokio::test]
    async fn test_ip_records_and_sweep() {
        let store = IdentityStore::memory();

        store.record_ip("203.0.113.9", Some("alice".into())).await.unwrap();
        assert!(store.is_ip_registered("203.0.113.9").await);
        assert!(!store.is_ip_registered("203.0.113.10").await);

        let err = store.record_ip("203.0.113.9", None).await.unwrap_err();
        assert!(matches!(err, StoreError::IpAlreadyRegistered(_)));

        // Nothing expired yet.
        let removed = store.sweep_ips(Duration::from_secs(3600)).await.unwrap();
        assert_eq!(removed, 0);

        let removed = store.sweep_ips(Duration::from_secs(0)).await.unwrap();
        assert_eq!(removed, 1);
        assert!(!store.is_ip_registered("203.0.113.9").await);
    }

    #[tokio::test]
    async fn test_file_backed_store_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identity.json");

        {
            let store = IdentityStore::open(path.clone()).await.unwrap();
            store.insert_registration("42", "alice").await.unwrap();
            store
                .upsert_ban("7", None, None, "account removed externally")
                .await
                .unwrap();
        }

        let reopened = IdentityStore::open(path).await.unwrap();
        assert!(reopened.is_registered("42").await);
        assert!(reopened.is_banned("7").await);
    }
}
