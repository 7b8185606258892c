//! JSON snapshot persistence shared by the stores.

use crate::error::StoreError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use tokio::fs;
use tracing::debug;

/// Write a snapshot atomically: serialize, write to a temp file, rename.
pub(crate) async fn save<T: Serialize>(path: &Path, data: &T) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(data)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, &bytes).await?;
    fs::rename(&temp_path, path).await?;

    debug!("Saved snapshot ({} bytes) to {:?}", bytes.len(), path);
    Ok(())
}

/// Load a snapshot. A missing file is not an error; a corrupt one is.
pub(crate) async fn load<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    if !fs::try_exists(path).await.unwrap_or(false) {
        return Ok(None);
    }
    let bytes = fs::read(path).await?;
    Ok(Some(serde_json::from_slice(&bytes)?))
}
