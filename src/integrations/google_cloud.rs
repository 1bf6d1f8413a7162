//! Google Cloud Support source
//!
//! Reads support cases and their comments from the Cloud Support API v2 over
//! REST. Both listings are paginated with `nextPageToken` and exposed as lazy
//! streams.

use super::transport::{Auth, HttpTransport};
use super::SourceAdapter;
use crate::config::GoogleCloudConfig;
use crate::model::{Actor, Classification, Comment, Issue, Priority, State};
use crate::{Result, SyncError};
use chrono::{DateTime, SecondsFormat, Utc};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Support case as returned by `cases:search`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudCase {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub classification: Option<CaseClassification>,
    #[serde(default)]
    pub time_zone: Option<String>,
    #[serde(default)]
    pub subscriber_email_addresses: Vec<String>,
    #[serde(default)]
    pub state: State,
    #[serde(default)]
    pub create_time: Option<String>,
    #[serde(default)]
    pub update_time: Option<String>,
    #[serde(default)]
    pub creator: Option<CloudActor>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub escalated: bool,
    #[serde(default)]
    pub test_case: bool,
    #[serde(default)]
    pub language_code: Option<String>,
    #[serde(default)]
    pub priority: Priority,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseClassification {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudActor {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub google_support: bool,
}

/// Case comment as returned by `comments.list`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudComment {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub create_time: Option<String>,
    #[serde(default)]
    pub creator: Option<CloudActor>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub plain_text_body: Option<String>,
}

/// One page of a paginated listing
trait ListPage: DeserializeOwned + Default + Send {
    type Item: Send;

    fn into_parts(self) -> (Vec<Self::Item>, Option<String>);
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchCasesResponse {
    #[serde(default)]
    cases: Vec<CloudCase>,
    #[serde(default)]
    next_page_token: Option<String>,
}

impl ListPage for SearchCasesResponse {
    type Item = CloudCase;

    fn into_parts(self) -> (Vec<CloudCase>, Option<String>) {
        (self.cases, self.next_page_token)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListCommentsResponse {
    #[serde(default)]
    comments: Vec<CloudComment>,
    #[serde(default)]
    next_page_token: Option<String>,
}

impl ListPage for ListCommentsResponse {
    type Item = CloudComment;

    fn into_parts(self) -> (Vec<CloudComment>, Option<String>) {
        (self.comments, self.next_page_token)
    }
}

enum Cursor {
    First,
    Token(String),
    Done,
}

/// Cloud Support API client
pub struct GoogleCloudSource {
    transport: HttpTransport,
    config: GoogleCloudConfig,
}

impl GoogleCloudSource {
    pub fn new(config: GoogleCloudConfig, transport: HttpTransport) -> Self {
        Self { transport, config }
    }

    /// Build a source authenticated with the configured bearer token
    pub fn from_config(config: GoogleCloudConfig) -> Result<Self> {
        let auth = google_credentials(&config)?;
        let transport =
            HttpTransport::new(Duration::from_secs(config.timeout_secs))?.with_auth(auth);
        Ok(Self::new(config, transport))
    }

    fn api_root(&self) -> String {
        format!("{}/v2", self.config.endpoint.trim_end_matches('/'))
    }

    fn search_url(&self) -> String {
        format!("{}/{}/cases:search", self.api_root(), self.config.organization_id)
    }

    fn comments_url(&self, case_name: &str) -> String {
        format!("{}/{}/comments", self.api_root(), case_name)
    }

    /// Fetch every page of a listing from the API
    fn list<P>(
        &self,
        url: String,
        query: Vec<(&'static str, String)>,
    ) -> BoxStream<'_, Result<P::Item>>
    where
        P: ListPage + 'static,
    {
        paginate(move |token| {
            let url = url.clone();
            let mut query = query.clone();
            if let Some(token) = token {
                query.push(("pageToken", token));
            }
            async move {
                debug!(url = %url, "Fetching page");
                let page: P = self.transport.get(&url, &query).await?.unwrap_or_default();
                Ok::<_, SyncError>(page.into_parts())
            }
        })
    }
}

/// Resolve credentials for Google APIs
///
/// A service-account key file wins over the bearer token in the environment.
pub fn google_credentials(config: &GoogleCloudConfig) -> Result<Auth> {
    if let Some(path) = &config.key_filename {
        let account = gcp_auth::CustomServiceAccount::from_file(path).map_err(|e| {
            SyncError::Config(format!(
                "Cannot load service account key {}: {}",
                path.display(),
                e
            ))
        })?;
        return Ok(Auth::Google(Arc::new(account)));
    }
    config.access_token().map(Auth::Bearer).ok_or_else(|| {
        SyncError::Config(format!(
            "Google Cloud credentials not set (expected keyFilename or ${})",
            config.access_token_env
        ))
    })
}

/// Items of one page and the token of the next
pub type Page<T> = (Vec<T>, Option<String>);

/// Walk a `nextPageToken` listing, yielding items one at a time
///
/// `fetch` receives the token of the page to load (`None` for the first).
/// Pages are fetched only as items are consumed; a missing or empty token
/// ends the listing.
pub fn paginate<'a, T, F, Fut>(mut fetch: F) -> BoxStream<'a, Result<T>>
where
    T: Send + 'a,
    F: FnMut(Option<String>) -> Fut + Send + 'a,
    Fut: Future<Output = Result<Page<T>>> + Send + 'a,
{
    stream::try_unfold(Cursor::First, move |cursor| {
        let request = match cursor {
            Cursor::Done => None,
            Cursor::First => Some(fetch(None)),
            Cursor::Token(token) => Some(fetch(Some(token))),
        };
        async move {
            let Some(request) = request else {
                return Ok::<_, SyncError>(None);
            };
            let (items, next) = request.await?;
            let cursor = match next {
                Some(token) if !token.is_empty() => Cursor::Token(token),
                _ => Cursor::Done,
            };
            Ok(Some((items, cursor)))
        }
    })
    .map_ok(|items| stream::iter(items.into_iter().map(Ok::<T, SyncError>)))
    .try_flatten()
    .boxed()
}

/// Search filter selecting cases updated after `since`
pub fn update_time_query(since: DateTime<Utc>) -> String {
    format!(
        "updateTime>\"{}\"",
        since.to_rfc3339_opts(SecondsFormat::Millis, true)
    )
}

fn parse_millis(field: &str, value: Option<&str>, owner: &str) -> Result<i64> {
    let value = value.ok_or_else(|| SyncError::Parse(format!("{} has no {}", owner, field)))?;
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.timestamp_millis())
        .map_err(|e| SyncError::Parse(format!("{} has invalid {} '{}': {}", owner, field, value, e)))
}

fn to_actor(actor: Option<CloudActor>) -> Actor {
    let actor = actor.unwrap_or_default();
    Actor {
        name: actor.display_name.unwrap_or_default(),
        email: actor.email.unwrap_or_default(),
        support: actor.google_support,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl SourceAdapter for GoogleCloudSource {
    type RawIssue = CloudCase;
    type RawComment = CloudComment;

    fn issues(&self, since: DateTime<Utc>) -> BoxStream<'_, Result<CloudCase>> {
        let query = vec![
            ("query", update_time_query(since)),
            ("pageSize", self.config.page_size.to_string()),
        ];
        debug!(parent = %self.config.organization_id, query = %query[0].1, "Searching cases");
        self.list::<SearchCasesResponse>(self.search_url(), query)
    }

    fn comments<'a>(&'a self, issue_id: &'a str) -> BoxStream<'a, Result<CloudComment>> {
        let query = vec![("pageSize", self.config.page_size.to_string())];
        self.list::<ListCommentsResponse>(self.comments_url(issue_id), query)
    }

    fn to_issue_model(&self, raw: CloudCase) -> Result<Issue> {
        if raw.name.is_empty() {
            return Err(SyncError::Parse("Case has no name".to_string()));
        }
        let updated = parse_millis("updateTime", raw.update_time.as_deref(), &raw.name)?;
        let created = match raw.create_time.as_deref() {
            Some(_) => parse_millis("createTime", raw.create_time.as_deref(), &raw.name)?,
            None => updated,
        };

        Ok(Issue {
            id: raw.name,
            title: raw.display_name,
            description: non_empty(raw.description),
            classification: raw.classification.map(|c| Classification {
                id: c.id,
                name: c.display_name,
            }),
            time_zone: non_empty(raw.time_zone),
            subscriber_email_addresses: raw.subscriber_email_addresses,
            state: raw.state,
            created,
            updated,
            creator: raw.creator.map(|c| to_actor(Some(c))),
            contact_email: non_empty(raw.contact_email),
            escalated: raw.escalated,
            test_case: raw.test_case,
            language_code: non_empty(raw.language_code),
            priority: raw.priority,
            extra: Default::default(),
        })
    }

    fn issue_id_hint(&self, raw: &CloudCase) -> Option<String> {
        Some(raw.name.clone()).filter(|name| !name.is_empty())
    }

    fn to_comment_model(&self, raw: CloudComment) -> Result<Comment> {
        if raw.name.is_empty() {
            return Err(SyncError::Parse("Comment has no name".to_string()));
        }
        let created = parse_millis("createTime", raw.create_time.as_deref(), &raw.name)?;
        let body = non_empty(raw.body)
            .or_else(|| non_empty(raw.plain_text_body))
            .unwrap_or_default();

        Ok(Comment {
            id: raw.name,
            body,
            created,
            creator: to_actor(raw.creator),
        })
    }
}
