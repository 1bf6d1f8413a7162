//! Google Cloud Storage watermark store
//!
//! Uses the JSON API directly: media download for `load`, a simple media
//! upload for `save`.

use super::{SyncState, WatermarkStore};
use crate::integrations::transport::{Auth, HttpTransport};
use crate::Result;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use std::time::Duration;
use tracing::{debug, info, warn};

const STORAGE_ENDPOINT: &str = "https://storage.googleapis.com";

pub struct GcsWatermarkStore {
    transport: HttpTransport,
    endpoint: String,
    bucket: String,
    object: String,
}

impl GcsWatermarkStore {
    pub fn new(
        bucket: impl Into<String>,
        object: impl Into<String>,
        auth: Auth,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            transport: HttpTransport::new(timeout)?.with_auth(auth),
            endpoint: STORAGE_ENDPOINT.to_string(),
            bucket: bucket.into(),
            object: object.into(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn download_url(&self) -> String {
        format!(
            "{}/storage/v1/b/{}/o/{}",
            self.endpoint.trim_end_matches('/'),
            self.bucket,
            urlencoding::encode(&self.object)
        )
    }

    fn upload_url(&self) -> String {
        format!(
            "{}/upload/storage/v1/b/{}/o",
            self.endpoint.trim_end_matches('/'),
            self.bucket
        )
    }

    fn origin(&self) -> String {
        format!("gs://{}/{}", self.bucket, self.object)
    }

    async fn download(&self) -> Result<String> {
        let request = self
            .transport
            .request(Method::GET, &self.download_url())
            .query(&[("alt", "media")]);
        let response = self.transport.execute(request).await?;
        Ok(response.text().await?)
    }
}

#[async_trait]
impl WatermarkStore for GcsWatermarkStore {
    async fn load(&self) -> SyncState {
        let origin = self.origin();
        info!(object = %origin, "Loading sync state");
        match self.download().await {
            Ok(content) => SyncState::from_yaml_or_initial(&content, &origin),
            Err(e) if e.status() == Some(404) => {
                info!("No sync state found, starting from default");
                SyncState::initial()
            }
            Err(e) => {
                warn!(object = %origin, error = %e, "Failed to download sync state, using default state");
                SyncState::initial()
            }
        }
    }

    async fn save(&self, state: &SyncState) -> Result<()> {
        let yaml = state.to_yaml()?;
        info!(object = %self.origin(), "Saving sync state");

        let request = self
            .transport
            .request(Method::POST, &self.upload_url())
            .query(&[("uploadType", "media"), ("name", self.object.as_str())])
            .header(CONTENT_TYPE, "application/x-yaml")
            .body(yaml);
        self.transport.execute(request).await?;

        debug!(last_synced_at = %state.last_synced_at, "Sync state saved");
        Ok(())
    }
}
