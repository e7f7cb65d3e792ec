//! On-disk persistence of board snapshots.
//!
//! A saved board is a MessagePack-encoded [`StoreSnapshot`], tombstones and
//! stamps included, so a reloaded board keeps converging with operations
//! produced before the save.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::store::{ElementStore, StoreConfig, StoreSnapshot};

/// Get the default storage path for the board snapshot
pub fn default_storage_path() -> PathBuf {
    // Use XDG data directory if available, otherwise fallback to ~/.local/share
    let data_dir = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".local/share")
        });
    data_dir.join("slateboard").join("board.msgpack")
}

/// Save a snapshot to disk, creating parent directories as needed
pub fn save_snapshot(snapshot: &StoreSnapshot, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let bytes = rmp_serde::to_vec(snapshot).context("encoding board snapshot")?;
    std::fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), elements = snapshot.elements.len(), "board saved");
    Ok(())
}

/// Load a snapshot from disk
pub fn load_snapshot(path: &Path) -> Result<StoreSnapshot> {
    let bytes =
        std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let snapshot = rmp_serde::from_slice(&bytes).context("decoding board snapshot")?;
    Ok(snapshot)
}

/// Load a store from disk, or start empty when no save exists yet
pub fn load_or_default(path: &Path, config: StoreConfig) -> Result<ElementStore> {
    if !path.exists() {
        return Ok(ElementStore::with_config(config));
    }
    let snapshot = load_snapshot(path)?;
    info!(path = %path.display(), elements = snapshot.elements.len(), "board loaded");
    Ok(ElementStore::from_snapshot(snapshot, config))
}
