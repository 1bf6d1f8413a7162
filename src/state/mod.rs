//! Sync watermark persistence
//!
//! A single timestamp, `lastSyncedAt`, stored as YAML either in a local file
//! or in a Google Cloud Storage object. Loading never fails: a missing or
//! unreadable state falls back to [`DEFAULT_LAST_SYNCED_AT`].

mod file;
mod gcs;

pub use file::{FileWatermarkStore, DEFAULT_STATE_FILE};
pub use gcs::GcsWatermarkStore;

use crate::integrations::Auth;
use crate::{Result, SyncError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Watermark used on first run or when the stored state is unusable
pub const DEFAULT_LAST_SYNCED_AT: &str = "2020-01-01T00:00:00Z";

/// Persisted sync state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    pub last_synced_at: DateTime<Utc>,
}

impl SyncState {
    pub fn new(last_synced_at: DateTime<Utc>) -> Self {
        Self { last_synced_at }
    }

    /// State used when nothing valid is stored
    pub fn initial() -> Self {
        let last_synced_at = DateTime::parse_from_rfc3339(DEFAULT_LAST_SYNCED_AT)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_default();
        Self { last_synced_at }
    }

    /// Parse a stored document, falling back to [`SyncState::initial`]
    pub fn from_yaml_or_initial(content: &str, origin: &str) -> Self {
        match serde_yaml::from_str::<Option<SyncState>>(content) {
            Ok(Some(state)) => state,
            Ok(None) => {
                tracing::warn!(origin = %origin, "Sync state is empty, using default state");
                Self::initial()
            }
            Err(e) => {
                tracing::warn!(origin = %origin, error = %e, "Sync state is invalid, using default state");
                Self::initial()
            }
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self::initial()
    }
}

/// Load/save of the sync watermark
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// Stored state, or the default when absent or corrupt
    async fn load(&self) -> SyncState;

    async fn save(&self, state: &SyncState) -> Result<()>;
}

/// Where the watermark lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateLocation {
    Local(PathBuf),
    Gcs { bucket: String, object: String },
}

impl StateLocation {
    /// Parse `STATE_FILE_URL`; `None` selects the local state file
    ///
    /// Accepts `gs://bucket/path` and `https://bucket/path`.
    pub fn parse(url: Option<&str>) -> Result<Self> {
        let Some(url) = url.map(str::trim).filter(|u| !u.is_empty()) else {
            return Ok(StateLocation::Local(PathBuf::from(DEFAULT_STATE_FILE)));
        };

        let rest = url
            .strip_prefix("gs://")
            .or_else(|| url.strip_prefix("https://"))
            .ok_or_else(|| {
                SyncError::Config("STATE_FILE_URL must start with gs:// or https://".to_string())
            })?;

        let (bucket, object) = rest.split_once('/').unwrap_or((rest, ""));
        let object = object.split(['?', '#']).next().unwrap_or_default();
        if bucket.is_empty() || object.is_empty() {
            return Err(SyncError::Config(format!(
                "STATE_FILE_URL must name a bucket and an object path: {}",
                url
            )));
        }

        Ok(StateLocation::Gcs {
            bucket: bucket.to_string(),
            object: object.to_string(),
        })
    }
}

/// Open the store for `location`
///
/// `auth` authenticates object storage requests.
pub fn open_store(
    location: StateLocation,
    auth: Auth,
    timeout: Duration,
) -> Result<Box<dyn WatermarkStore>> {
    match location {
        StateLocation::Local(path) => {
            tracing::debug!(path = %path.display(), "Using local file for sync state");
            Ok(Box::new(FileWatermarkStore::new(path)))
        }
        StateLocation::Gcs { bucket, object } => {
            tracing::debug!(bucket = %bucket, object = %object, "Using GCS for sync state");
            Ok(Box::new(GcsWatermarkStore::new(
                bucket,
                object,
                auth,
                timeout,
            )?))
        }
    }
}
