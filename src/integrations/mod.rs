//! External Integrations
//!
//! Source and target adapters plus the plumbing they share.
//!
//! # Overview
//!
//! A [`SourceAdapter`] lists issues changed since a watermark and the comments
//! of each issue, and converts both into the canonical [`model`](crate::model)
//! types. A [`TargetAdapter`] upserts issues by idempotency key and keeps a
//! foreign-id index of the comments it already holds.
//!
//! # Built-in Integrations
//!
//! - **Google Cloud Support**: REST source for support cases
//! - **JIRA**: REST v3 target
//!
//! Adapters are chosen from the closed [`SourceConfig`] / [`TargetConfig`]
//! enums via [`source_from_config`] and [`target_from_config`].

pub mod adf;
pub mod google_cloud;
pub mod jira;
pub mod transport;

use crate::config::{SourceConfig, TargetConfig};
use crate::model::{Comment, Issue, Priority, State};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde_json::{Map, Value};
use std::collections::HashMap;

pub use google_cloud::{google_credentials, GoogleCloudSource};
pub use jira::{JiraApi, JiraClient, JiraTarget};
pub use transport::{Auth, HttpTransport};

/// Everything a target needs to create or update one issue
#[derive(Debug, Clone, PartialEq)]
pub struct IssueRequest {
    /// Target fields produced by the field mapper
    pub fields: Map<String, Value>,
    /// Source issue id, used as the idempotency key
    pub source_issue_key: String,
    /// Milliseconds since the Unix epoch
    pub source_updated_time: i64,
    pub state: State,
    pub priority: Priority,
}

impl IssueRequest {
    pub fn new(fields: Map<String, Value>, issue: &Issue) -> Self {
        Self {
            fields,
            source_issue_key: issue.id.clone(),
            source_updated_time: issue.updated,
            state: issue.state,
            priority: issue.priority,
        }
    }
}

/// Read side of a sync
///
/// Streams are lazy: nothing is fetched until the first poll, and further
/// pages are fetched only as items are consumed.
pub trait SourceAdapter: Send + Sync {
    type RawIssue: Send;
    type RawComment: Send;

    /// Issues updated strictly after `since`
    fn issues(&self, since: DateTime<Utc>) -> BoxStream<'_, Result<Self::RawIssue>>;

    /// All comments of one issue
    fn comments<'a>(&'a self, issue_id: &'a str) -> BoxStream<'a, Result<Self::RawComment>>;

    fn to_issue_model(&self, raw: Self::RawIssue) -> Result<Issue>;

    /// Best-effort id of a raw issue, used to report issues that fail to convert
    fn issue_id_hint(&self, _raw: &Self::RawIssue) -> Option<String> {
        None
    }

    fn to_comment_model(&self, raw: Self::RawComment) -> Result<Comment>;
}

/// Write side of a sync
#[async_trait]
pub trait TargetAdapter: Send + Sync {
    /// Comment as stored by the target
    type Comment: Send + Sync;
    /// Payload for creating or updating a comment
    type CommentRequest: Send + Sync;

    /// Find the issue carrying `source_issue_key`, update or create it, and
    /// return its target key
    async fn create_or_update_issue(&self, request: IssueRequest) -> Result<String>;

    /// Existing comments of an issue, keyed by foreign (source) id
    async fn get_comments(&self, issue_key: &str) -> Result<HashMap<String, Self::Comment>>;

    async fn create_comment(
        &self,
        comment: Self::CommentRequest,
        issue_key: &str,
    ) -> Result<Self::Comment>;

    async fn update_comment(
        &self,
        comment: Self::CommentRequest,
        issue_key: &str,
        comment_key: &str,
    ) -> Result<Self::Comment>;

    fn from_comment_model(&self, comment: &Comment) -> Self::CommentRequest;
}

/// Build the source adapter selected by the configuration
pub fn source_from_config(config: &SourceConfig) -> Result<GoogleCloudSource> {
    match config {
        SourceConfig::GoogleCloud(config) => GoogleCloudSource::from_config(config.clone()),
    }
}

/// Build the target adapter selected by the configuration
///
/// Fails before any network call when credentials are missing under strict
/// authentication.
pub fn target_from_config(config: &TargetConfig) -> Result<JiraTarget<JiraClient>> {
    match config {
        TargetConfig::Jira(config) => {
            let client = JiraClient::new(config)?;
            Ok(JiraTarget::new(client, config.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GoogleCloudConfig, JiraConfig};

    #[test]
    fn test_issue_request_from_issue() {
        let issue = Issue::new("organizations/1/cases/2", "Disk full")
            .with_state(State::New)
            .with_priority(Priority::P1)
            .with_updated(42);
        let request = IssueRequest::new(Map::new(), &issue);

        assert_eq!(request.source_issue_key, "organizations/1/cases/2");
        assert_eq!(request.source_updated_time, 42);
        assert_eq!(request.state, State::New);
        assert_eq!(request.priority, Priority::P1);
    }

    #[test]
    fn test_target_requires_credentials() {
        let config = TargetConfig::Jira(JiraConfig::new("acme.atlassian.net"));
        let result = target_from_config(&config);
        assert!(matches!(result, Err(crate::SyncError::Config(_))));
    }

    #[test]
    fn test_target_from_config() {
        let config = TargetConfig::Jira(
            JiraConfig::new("acme.atlassian.net").with_credentials("bot@acme.com", "token"),
        );
        assert!(target_from_config(&config).is_ok());
    }

    #[test]
    fn test_source_requires_token() {
        let mut google = GoogleCloudConfig::new("organizations/1");
        google.access_token_env = "ISSUE_SYNCER_TEST_UNSET_TOKEN".to_string();
        let result = source_from_config(&SourceConfig::GoogleCloud(google));
        assert!(matches!(result, Err(crate::SyncError::Config(_))));
    }
}
