//! The artifact token store: expiring, single-use download tokens.

use crate::error::StoreError;
use crate::snapshot;
use crate::types::{ArtifactKind, DownloadToken};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct TokenData {
    tokens: HashMap<String, DownloadToken>,
}

/// Durable single-use download tokens.
///
/// A token that is used or past its expiry is invisible to every read.
/// Redemption marks the token used in the same critical section that
/// validates it, so a second redemption fails closed while the underlying
/// artifact bytes survive until the sweep.
pub struct TokenStore {
    data: RwLock<TokenData>,
    storage_path: Option<PathBuf>,
}

impl TokenStore {
    /// Create a memory-only token store.
    pub fn memory() -> Arc<Self> {
        Arc::new(Self {
            data: RwLock::new(TokenData::default()),
            storage_path: None,
        })
    }

    /// Open a file-backed token store.
    pub async fn open(path: PathBuf) -> Result<Arc<Self>, StoreError> {
        let data = match snapshot::load::<TokenData>(&path).await? {
            Some(data) => {
                info!("Loaded token store: {} tokens", data.tokens.len());
                data
            }
            None => {
                info!("Token store not found at {:?}, starting fresh", path);
                TokenData::default()
            }
        };

        Ok(Arc::new(Self {
            data: RwLock::new(data),
            storage_path: Some(path),
        }))
    }

    async fn persist(&self, data: &TokenData) -> Result<(), StoreError> {
        if let Some(path) = &self.storage_path {
            snapshot::save(path, data).await?;
        }
        Ok(())
    }

    /// Register a freshly written artifact.
    pub async fn insert(&self, token: DownloadToken) -> Result<(), StoreError> {
        let mut data = self.data.write().await;
        if data.tokens.contains_key(&token.token) {
            return Err(StoreError::DuplicateKey);
        }
        debug!(
            "Registered {:?} token for '{}'",
            token.kind, token.user_facing_filename
        );
        data.tokens.insert(token.token.clone(), token);
        self.persist(&data).await?;
        Ok(())
    }

    /// Redeem a token: validate kind, expiry and used-flag, then mark used.
    ///
    /// Returns the token row on the first valid redemption and `None` on
    /// every later attempt. The artifact bytes are not touched here; a slow
    /// download can still complete before the sweep deletes them.
    pub async fn redeem(
        &self,
        token: &str,
        expected_kind: ArtifactKind,
    ) -> Result<Option<DownloadToken>, StoreError> {
        let mut data = self.data.write().await;
        let now = Utc::now();

        let entry = match data.tokens.get_mut(token) {
            Some(entry) => entry,
            None => return Ok(None),
        };
        if entry.kind != expected_kind || entry.is_used || entry.is_expired(now) {
            debug!("Token {} invalid for redemption", token);
            return Ok(None);
        }

        entry.is_used = true;
        let redeemed = entry.clone();
        self.persist(&data).await?;
        info!("Redeemed {:?} token for '{}'", redeemed.kind, redeemed.user_facing_filename);
        Ok(Some(redeemed))
    }

    /// Remove a single token row. Returns the removed row, if any.
    pub async fn remove(&self, token: &str) -> Result<Option<DownloadToken>, StoreError> {
        let mut data = self.data.write().await;
        let removed = data.tokens.remove(token);
        if removed.is_some() {
            self.persist(&data).await?;
        }
        Ok(removed)
    }

    /// Remove every expired or already-used token.
    ///
    /// Returns the removed rows so the caller can delete the artifact files
    /// they point at.
    pub async fn sweep(&self) -> Result<Vec<DownloadToken>, StoreError> {
        let now = Utc::now();
        let mut data = self.data.write().await;

        let dead: Vec<String> = data
            .tokens
            .values()
            .filter(|t| t.is_used || t.is_expired(now))
            .map(|t| t.token.clone())
            .collect();

        let mut removed = Vec::with_capacity(dead.len());
        for key in dead {
            if let Some(token) = data.tokens.remove(&key) {
                removed.push(token);
            }
        }
        if !removed.is_empty() {
            self.persist(&data).await?;
        }
        Ok(removed)
    }

    pub async fn count(&self) -> usize {
        self.data.read().await.tokens.len()
    }
}
