//! Local file watermark store

use super::{SyncState, WatermarkStore};
use crate::Result;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// State file used when no `STATE_FILE_URL` is given, relative to the
/// working directory
pub const DEFAULT_STATE_FILE: &str = "state.yaml";

pub struct FileWatermarkStore {
    path: PathBuf,
}

impl FileWatermarkStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl WatermarkStore for FileWatermarkStore {
    async fn load(&self) -> SyncState {
        info!(path = %self.path.display(), "Loading sync state");
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => SyncState::from_yaml_or_initial(&content, &self.path.display().to_string()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No sync state found, starting from default");
                SyncState::initial()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read sync state, using default state");
                SyncState::initial()
            }
        }
    }

    async fn save(&self, state: &SyncState) -> Result<()> {
        let yaml = state.to_yaml()?;
        info!(path = %self.path.display(), "Saving sync state");

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, yaml).await?;

        debug!(last_synced_at = %state.last_synced_at, "Sync state saved");
        Ok(())
    }
}
