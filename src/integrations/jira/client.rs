//! JIRA REST v3 client
//!
//! Wire types and the HTTP implementation of [`JiraApi`].

use super::JiraApi;
use crate::config::JiraConfig;
use crate::integrations::transport::{Auth, HttpTransport};
use crate::{Result, SyncError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, info};

/// Fields requested when looking an issue up by label
const SEARCH_FIELDS: [&str; 2] = ["updated", "status"];

/// JIRA issue as returned by search
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JiraIssue {
    #[serde(default)]
    pub id: String,
    pub key: String,
    #[serde(default)]
    pub fields: JiraIssueFields,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JiraIssueFields {
    #[serde(default)]
    pub updated: Option<String>,
    #[serde(default)]
    pub status: Option<JiraStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JiraStatus {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JiraSearchResults {
    #[serde(default)]
    pub issues: Vec<JiraIssue>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Key of a freshly created issue
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedIssue {
    #[serde(default)]
    pub id: String,
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraTransition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub to: JiraStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct JiraTransitionsResponse {
    #[serde(default)]
    transitions: Vec<JiraTransition>,
}

/// Key/value pair attached to a comment; `value` is an ADF document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityProperty {
    pub key: String,
    pub value: Value,
}

/// Comment as stored by JIRA
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JiraComment {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub body: Value,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub properties: Vec<EntityProperty>,
}

impl JiraComment {
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.iter().find(|p| p.key == key).map(|p| &p.value)
    }
}

/// Payload for creating or updating a comment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JiraCommentRequest {
    pub body: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<EntityProperty>,
}

/// One page of `GET /issue/{key}/comment`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JiraCommentsPage {
    #[serde(default)]
    pub start_at: u32,
    #[serde(default)]
    pub max_results: u32,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub comments: Vec<JiraComment>,
}

/// Paging parameters for comment listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentQuery {
    pub start_at: u32,
    pub max_results: u32,
    pub order_by: String,
    pub expand: String,
}

impl CommentQuery {
    pub fn first_page(max_results: u32) -> Self {
        Self {
            start_at: 0,
            max_results,
            order_by: "created".to_string(),
            expand: "properties".to_string(),
        }
    }

    pub fn at(&self, start_at: u32) -> Self {
        Self {
            start_at,
            ..self.clone()
        }
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("startAt", self.start_at.to_string()),
            ("maxResults", self.max_results.to_string()),
            ("orderBy", self.order_by.clone()),
            ("expand", self.expand.clone()),
        ]
    }
}

/// JIRA API client
pub struct JiraClient {
    transport: HttpTransport,
    base_url: String,
}

impl JiraClient {
    /// Create a new JIRA client
    ///
    /// Returns a configuration error when `strictSSL` is on and either
    /// credential is missing, and an error if the HTTP client cannot be
    /// created.
    pub fn new(config: &JiraConfig) -> Result<Self> {
        let auth = match (&config.username, &config.api_token) {
            (Some(username), Some(api_token)) if !username.is_empty() && !api_token.is_empty() => {
                Auth::Basic {
                    username: username.clone(),
                    password: api_token.clone(),
                }
            }
            _ if config.strict_ssl => {
                return Err(SyncError::Config(
                    "Jira username and API token are required for authentication".to_string(),
                ));
            }
            _ => Auth::None,
        };

        let transport =
            HttpTransport::new(Duration::from_secs(config.timeout_secs))?.with_auth(auth);

        Ok(Self {
            transport,
            base_url: config.api_url(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn empty_response(what: &str) -> SyncError {
    SyncError::Integration(format!("JIRA returned an empty response for {}", what))
}

#[async_trait]
impl JiraApi for JiraClient {
    async fn search_issues(&self, jql: &str) -> Result<Vec<JiraIssue>> {
        debug!(jql = %jql, "Searching JIRA issues");
        let body = json!({
            "jql": jql,
            "fields": SEARCH_FIELDS,
            "maxResults": 1,
        });
        let results: Option<JiraSearchResults> =
            self.transport.post(&self.url("/search/jql"), &body).await?;
        Ok(results.unwrap_or_default().issues)
    }

    async fn create_issue(&self, fields: &Map<String, Value>) -> Result<CreatedIssue> {
        let body = json!({ "fields": fields });
        let created: Option<CreatedIssue> = self.transport.post(&self.url("/issue"), &body).await?;
        let created = created.ok_or_else(|| empty_response("issue creation"))?;
        info!(key = %created.key, "Created JIRA issue");
        Ok(created)
    }

    async fn update_issue(&self, key: &str, fields: &Map<String, Value>) -> Result<()> {
        let body = json!({ "fields": fields });
        let _: Option<Value> = self
            .transport
            .put(&self.url(&format!("/issue/{}", key)), &[], &body)
            .await?;
        Ok(())
    }

    async fn get_transitions(&self, key: &str) -> Result<Vec<JiraTransition>> {
        let response: Option<JiraTransitionsResponse> = self
            .transport
            .get(&self.url(&format!("/issue/{}/transitions", key)), &[])
            .await?;
        let transitions = response.unwrap_or_default().transitions;
        debug!(key = %key, count = transitions.len(), "Fetched JIRA transitions");
        Ok(transitions)
    }

    async fn transition_issue(&self, key: &str, transition_id: &str) -> Result<()> {
        let body = json!({ "transition": { "id": transition_id } });
        let _: Option<Value> = self
            .transport
            .post(&self.url(&format!("/issue/{}/transitions", key)), &body)
            .await?;
        Ok(())
    }

    async fn get_comments(&self, key: &str, query: &CommentQuery) -> Result<JiraCommentsPage> {
        let page: Option<JiraCommentsPage> = self
            .transport
            .get(&self.url(&format!("/issue/{}/comment", key)), &query.params())
            .await?;
        Ok(page.unwrap_or_default())
    }

    async fn add_comment(&self, key: &str, comment: &JiraCommentRequest) -> Result<JiraComment> {
        let created: Option<JiraComment> = self
            .transport
            .post(&self.url(&format!("/issue/{}/comment", key)), comment)
            .await?;
        created.ok_or_else(|| empty_response("comment creation"))
    }

    async fn update_comment(
        &self,
        key: &str,
        comment_id: &str,
        comment: &JiraCommentRequest,
    ) -> Result<JiraComment> {
        let updated: Option<JiraComment> = self
            .transport
            .put(
                &self.url(&format!("/issue/{}/comment/{}", key, comment_id)),
                &[],
                comment,
            )
            .await?;
        updated.ok_or_else(|| empty_response("comment update"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let config = JiraConfig::new("jira.example.com").with_credentials("bot", "token");
        let client = JiraClient::new(&config).expect("Failed to create client");
        assert_eq!(client.base_url(), "https://jira.example.com/rest/api/3");
        assert_eq!(
            client.url("/issue/OPS-1"),
            "https://jira.example.com/rest/api/3/issue/OPS-1"
        );
    }

    #[test]
    fn test_strict_ssl_requires_credentials() {
        let config = JiraConfig::new("jira.example.com");
        assert!(matches!(JiraClient::new(&config), Err(SyncError::Config(_))));

        let config = JiraConfig::new("jira.example.com").with_credentials("bot", "");
        assert!(JiraClient::new(&config).is_err());
    }

    #[test]
    fn test_anonymous_without_strict_ssl() {
        let mut config = JiraConfig::new("localhost");
        config.strict_ssl = false;
        assert!(JiraClient::new(&config).is_ok());
    }

    #[test]
    fn test_comment_query_params() {
        let query = CommentQuery::first_page(100).at(200);
        assert_eq!(
            query.params(),
            vec![
                ("startAt", "200".to_string()),
                ("maxResults", "100".to_string()),
                ("orderBy", "created".to_string()),
                ("expand", "properties".to_string()),
            ]
        );
    }

    #[test]
    fn test_comment_deserialization() {
        let comment: JiraComment = serde_json::from_value(json!({
            "id": "10001",
            "created": "2024-03-01T10:00:00.000+0000",
            "body": { "type": "doc", "version": 1, "content": [] },
            "properties": [
                { "key": "google-cloud-id", "value": { "type": "doc", "content": [] } }
            ]
        }))
        .unwrap();
        assert!(comment.property("google-cloud-id").is_some());
        assert!(comment.property("author").is_none());
    }

    #[test]
    fn test_comment_request_serialization() {
        let request = JiraCommentRequest {
            body: json!("hi"),
            properties: Vec::new(),
        };
        assert_eq!(serde_json::to_value(&request).unwrap(), json!({ "body": "hi" }));
    }

    #[test]
    fn test_search_results_deserialization() {
        let results: JiraSearchResults = serde_json::from_value(json!({
            "issues": [{
                "id": "1",
                "key": "OPS-1",
                "fields": { "updated": "2024-03-01T10:00:00.000+0000", "status": { "id": "3", "name": "In Progress" } }
            }],
            "isLast": true
        }))
        .unwrap();
        let issue = &results.issues[0];
        assert_eq!(issue.key, "OPS-1");
        assert_eq!(issue.fields.status.as_ref().unwrap().id.as_deref(), Some("3"));
    }
}
