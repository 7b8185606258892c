//! Periodic reconciliation of expired records.

use crate::config::CleanupConfig;
use artifact_gen::ArtifactGenerator;
use identity_store::IdentityStore;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Sweeps expired pending registrations, IP records and download tokens
/// (including their on-disk artifact bytes) on a fixed interval.
pub struct Reconciler {
    store: Arc<IdentityStore>,
    artifacts: Arc<ArtifactGenerator>,
    config: CleanupConfig,
}

impl Reconciler {
    pub fn new(
        store: Arc<IdentityStore>,
        artifacts: Arc<ArtifactGenerator>,
        config: CleanupConfig,
    ) -> Self {
        Self {
            store,
            artifacts,
            config,
        }
    }

    /// Run a single sweep cycle. Errors are logged per kind; one failing
    /// sweep never blocks the others.
    pub async fn sweep_once(&self) {
        match self.store.sweep_pending(self.config.pending_ttl).await {
            Ok(removed) if removed > 0 => {
                info!("Cleaned up {} expired pending registrations", removed)
            }
            Ok(_) => {}
            Err(e) => error!("Pending registration sweep failed: {}", e),
        }

        match self.store.sweep_ips(self.config.ip_ttl).await {
            Ok(removed) if removed > 0 => info!("Cleaned up {} expired IP records", removed),
            Ok(_) => {}
            Err(e) => error!("IP record sweep failed: {}", e),
        }

        match self.artifacts.sweep().await {
            Ok(removed) if removed > 0 => {
                info!("Cleaned up {} expired or used download tokens", removed)
            }
            Ok(_) => {}
            Err(e) => error!("Download token sweep failed: {}", e),
        }
    }

    /// Run the reconciler as a background task.
    pub async fn run(&self) {
        info!(
            "Starting reconciliation task, interval: {:?} (pending ttl {:?}, ip ttl {:?}, token ttl {:?})",
            self.config.interval, self.config.pending_ttl, self.config.ip_ttl, self.config.token_ttl
        );

        loop {
            tokio::time::sleep(self.config.interval).await;
            debug!("Reconciliation cycle starting");
            self.sweep_once().await;
        }
    }
}

/// Spawn the reconciler as a background task.
pub fn spawn_reconciler(
    store: Arc<IdentityStore>,
    artifacts: Arc<ArtifactGenerator>,
    config: CleanupConfig,
) -> tokio::task::JoinHandle<()> {
    let reconciler = Reconciler::new(store, artifacts, config);
    tokio::spawn(async move {
        reconciler.run().await;
    })
}
