//! JIRA target
//!
//! Upserts issues keyed by a label holding the source issue id, moves them
//! through workflow transitions named in the `states` table, and mirrors
//! comments with the source comment id kept in a comment property.

mod client;

pub use client::{
    CommentQuery, CreatedIssue, EntityProperty, JiraClient, JiraComment, JiraCommentRequest,
    JiraCommentsPage, JiraIssue, JiraIssueFields, JiraSearchResults, JiraStatus, JiraTransition,
};

use super::adf;
use super::{IssueRequest, TargetAdapter};
use crate::config::JiraConfig;
use crate::model::{Comment, State};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Comments fetched per page when indexing
pub const COMMENT_PAGE_SIZE: u32 = 100;

/// Raw JIRA operations used by [`JiraTarget`]
#[async_trait]
pub trait JiraApi: Send + Sync {
    /// Issues matching `jql`, with `updated` and `status` fields
    async fn search_issues(&self, jql: &str) -> Result<Vec<JiraIssue>>;

    async fn create_issue(&self, fields: &Map<String, Value>) -> Result<CreatedIssue>;

    async fn update_issue(&self, key: &str, fields: &Map<String, Value>) -> Result<()>;

    /// Transitions available from the issue's current status
    async fn get_transitions(&self, key: &str) -> Result<Vec<JiraTransition>>;

    async fn transition_issue(&self, key: &str, transition_id: &str) -> Result<()>;

    async fn get_comments(&self, key: &str, query: &CommentQuery) -> Result<JiraCommentsPage>;

    async fn add_comment(&self, key: &str, comment: &JiraCommentRequest) -> Result<JiraComment>;

    async fn update_comment(
        &self,
        key: &str,
        comment_id: &str,
        comment: &JiraCommentRequest,
    ) -> Result<JiraComment>;
}

/// Transition resolved for a canonical state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedTransition {
    pub id: String,
    /// Status the transition leads to
    pub to_status_id: Option<String>,
}

/// JIRA implementation of [`TargetAdapter`]
pub struct JiraTarget<A: JiraApi> {
    api: A,
    config: JiraConfig,
    /// Filled lazily, never invalidated within a run
    transitions: Mutex<HashMap<State, CachedTransition>>,
}

impl<A: JiraApi> JiraTarget<A> {
    pub fn new(api: A, config: JiraConfig) -> Self {
        Self {
            api,
            config,
            transitions: Mutex::new(HashMap::new()),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Shape mapped fields for JIRA: ADF description, idempotency label and
    /// priority name
    pub fn prepare_fields(&self, request: &IssueRequest) -> Map<String, Value> {
        let mut fields = request.fields.clone();

        if let Some(Value::String(description)) = fields.get("description") {
            let document = adf::paragraph_doc(description);
            fields.insert("description".to_string(), document);
        }

        let key = Value::String(request.source_issue_key.clone());
        let labels = match fields.shift_remove("labels") {
            Some(Value::Array(mut labels)) => {
                if !labels.contains(&key) {
                    labels.push(key);
                }
                labels
            }
            Some(Value::String(label)) if !label.is_empty() && label != request.source_issue_key => {
                vec![Value::String(label), key]
            }
            _ => vec![key],
        };
        fields.insert("labels".to_string(), Value::Array(labels));

        if let Some(name) = self.config.priorities.get(&request.priority) {
            fields.insert("priority".to_string(), json!({ "name": name }));
        }

        fields
    }

    async fn cached_transition(&self, state: State) -> Option<CachedTransition> {
        self.transitions.lock().await.get(&state).cloned()
    }

    /// List transitions on `issue_key` and cache every configured state found
    async fn resolve_transitions(&self, issue_key: &str) -> Result<()> {
        let available = self.api.get_transitions(issue_key).await?;
        let mut cache = self.transitions.lock().await;
        for (state, name) in &self.config.states {
            if cache.contains_key(state) {
                continue;
            }
            if let Some(t) = available.iter().find(|t| t.name.eq_ignore_ascii_case(name)) {
                debug!(state = %state, transition = %t.name, id = %t.id, "Cached JIRA transition");
                cache.insert(
                    *state,
                    CachedTransition {
                        id: t.id.clone(),
                        to_status_id: t.to.id.clone(),
                    },
                );
            }
        }
        Ok(())
    }

    /// Move the issue to `state` unless it already is there
    ///
    /// `current` is the issue's status before this sync, `None` for a new
    /// issue. States without a configured transition are left alone.
    async fn sync_state(&self, issue_key: &str, state: State, current: Option<&JiraStatus>) -> Result<()> {
        let Some(name) = self.config.states.get(&state) else {
            debug!(key = %issue_key, state = %state, "No transition configured for state");
            return Ok(());
        };

        let transition = match self.cached_transition(state).await {
            Some(t) => t,
            None => {
                let already_there = current
                    .and_then(|s| s.name.as_deref())
                    .is_some_and(|status| status.eq_ignore_ascii_case(name));
                if already_there {
                    debug!(key = %issue_key, status = %name, "Issue already in target status");
                    return Ok(());
                }
                self.resolve_transitions(issue_key).await?;
                match self.cached_transition(state).await {
                    Some(t) => t,
                    None => {
                        warn!(
                            key = %issue_key,
                            state = %state,
                            transition = %name,
                            "Transition not found. Please check your configuration."
                        );
                        return Ok(());
                    }
                }
            }
        };

        let current_id = current.and_then(|s| s.id.as_deref());
        if current_id.is_some() && current_id == transition.to_status_id.as_deref() {
            debug!(key = %issue_key, state = %state, "Issue status already up to date");
            return Ok(());
        }

        info!(key = %issue_key, state = %state, "Updating issue status");
        self.api.transition_issue(issue_key, &transition.id).await
    }

    fn comment_foreign_id(&self, comment: &JiraComment) -> Option<String> {
        match comment.property(&self.config.foreign_id_property)? {
            Value::String(s) => Some(s.clone()),
            document => adf::first_text(document),
        }
    }
}

/// JQL selecting issues that carry `label`
pub fn label_jql(label: &str) -> String {
    format!("labels = '{}'", label.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Parse JIRA's `updated` timestamp into epoch milliseconds
pub fn parse_jira_time(value: &str) -> Option<i64> {
    DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z")
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .ok()
        .map(|t| t.timestamp_millis())
}

fn iso_millis(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}

#[async_trait]
impl<A: JiraApi> TargetAdapter for JiraTarget<A> {
    type Comment = JiraComment;
    type CommentRequest = JiraCommentRequest;

    async fn create_or_update_issue(&self, request: IssueRequest) -> Result<String> {
        let fields = self.prepare_fields(&request);
        let label = &request.source_issue_key;
        let fields_json = Value::Object(fields.clone());
        let description = fields.get("description").map(adf::plain_text).unwrap_or_default();
        debug!(
            label = %label,
            fields = %fields_json,
            description = %description,
            "JIRA issue constructed"
        );

        let existing = self.api.search_issues(&label_jql(label)).await?;

        match existing.into_iter().next() {
            Some(issue) => {
                debug!(label = %label, key = %issue.key, "Issue with label already exists");
                let target_updated = issue.fields.updated.as_deref().and_then(parse_jira_time);
                let is_newer = match target_updated {
                    Some(updated) => request.source_updated_time > updated,
                    None => true,
                };
                if is_newer {
                    info!(key = %issue.key, "Updating issue");
                    self.api.update_issue(&issue.key, &fields).await?;
                } else {
                    debug!(key = %issue.key, "Issue is up to date");
                }
                self.sync_state(&issue.key, request.state, issue.fields.status.as_ref())
                    .await?;
                Ok(issue.key)
            }
            None => {
                info!(label = %label, "Issue not found on JIRA. Creating issue");
                let created = self.api.create_issue(&fields).await?;
                self.sync_state(&created.key, request.state, None).await?;
                Ok(created.key)
            }
        }
    }

    async fn get_comments(&self, issue_key: &str) -> Result<HashMap<String, JiraComment>> {
        let first = CommentQuery::first_page(COMMENT_PAGE_SIZE);
        let mut page = self.api.get_comments(issue_key, &first).await?;
        let mut comments = std::mem::take(&mut page.comments);

        let mut start_at = page.start_at + page.max_results;
        while page.max_results > 0 && start_at < page.total {
            page = self.api.get_comments(issue_key, &first.at(start_at)).await?;
            if page.comments.is_empty() {
                break;
            }
            comments.append(&mut page.comments);
            start_at += page.max_results;
        }
        debug!(key = %issue_key, count = comments.len(), "Found comments for issue");

        let mut indexed = HashMap::new();
        for comment in comments {
            if let Some(foreign_id) = self.comment_foreign_id(&comment) {
                indexed.insert(foreign_id, comment);
            }
        }
        Ok(indexed)
    }

    async fn create_comment(&self, comment: JiraCommentRequest, issue_key: &str) -> Result<JiraComment> {
        debug!(key = %issue_key, "Creating comment for issue");
        self.api.add_comment(issue_key, &comment).await
    }

    async fn update_comment(
        &self,
        comment: JiraCommentRequest,
        issue_key: &str,
        comment_key: &str,
    ) -> Result<JiraComment> {
        debug!(key = %issue_key, comment = %comment_key, "Updating comment");
        self.api.update_comment(issue_key, comment_key, &comment).await
    }

    fn from_comment_model(&self, comment: &Comment) -> JiraCommentRequest {
        let creator = &comment.creator;
        let mut properties = vec![
            EntityProperty {
                key: "author".to_string(),
                value: adf::paragraph_doc(&format!("{} ({})", creator.name, creator.email)),
            },
            EntityProperty {
                key: self.config.foreign_id_property.clone(),
                value: adf::paragraph_doc(&comment.id),
            },
        ];
        if creator.support {
            properties.push(EntityProperty {
                key: "support".to_string(),
                value: adf::paragraph_doc("true"),
            });
        }

        let attribution = format!(
            "{}{} wrote: ",
            creator.name,
            if creator.support { " (Support account)" } else { "" }
        );
        let body = adf::CommentBody::new()
            .paragraph(&attribution)
            .quote(&comment.body)
            .emphasis(&format!("Original comment posted on {}", iso_millis(comment.created)))
            .build();

        JiraCommentRequest { body, properties }
    }
}
