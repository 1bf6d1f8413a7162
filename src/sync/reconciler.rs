//! Idempotent sync reconciliation
//!
//! One run lists source issues changed since the stored watermark, keeps the
//! least recently updated ones up to the cap, upserts each into the target by
//! idempotency key, mirrors new comments, and advances the watermark. Issues
//! are processed strictly one after another, oldest first. A failure on one
//! issue is logged and recorded; the run moves on.

use crate::integrations::{IssueRequest, SourceAdapter, TargetAdapter};
use crate::model::Issue;
use crate::state::{SyncState, WatermarkStore};
use crate::Result;
use chrono::{DateTime, Utc};
use fieldmap::TransformerConfig;
use futures::{StreamExt, TryStreamExt};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::{debug, error, info};

/// Issues examined per run unless configured otherwise
pub const DEFAULT_SYNC_LIMIT: usize = 200;

/// Options for a sync run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Maximum issues processed per run, failures included
    pub limit: usize,
}

impl SyncOptions {
    pub fn new() -> Self {
        Self {
            limit: DEFAULT_SYNC_LIMIT,
        }
    }

    /// Set the per-run issue cap
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Terminal state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    PartialFailure,
}

/// An issue skipped because of an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueFailure {
    /// Source issue id, empty when not even the raw issue carried one
    pub issue_id: String,
    pub error: String,
}

/// Result of a sync run
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// Watermark the run started from
    pub since: DateTime<Utc>,

    /// Watermark after the run
    pub watermark: DateTime<Utc>,

    pub issues_examined: usize,

    pub issues_synced: usize,

    pub comments_created: usize,

    /// Source comments already present on the target
    pub comments_skipped: usize,

    /// The issue cap was reached and some issues were left for a later run
    pub stopped_early: bool,

    /// The source listing itself failed part way
    pub listing_error: Option<String>,

    pub failures: Vec<IssueFailure>,
}

impl SyncReport {
    fn new(since: DateTime<Utc>) -> Self {
        Self {
            since,
            watermark: since,
            issues_examined: 0,
            issues_synced: 0,
            comments_created: 0,
            comments_skipped: 0,
            stopped_early: false,
            listing_error: None,
            failures: Vec::new(),
        }
    }

    pub fn issues_failed(&self) -> usize {
        self.failures.len()
    }

    /// Check if there were any errors
    pub fn has_errors(&self) -> bool {
        !self.failures.is_empty() || self.listing_error.is_some()
    }

    pub fn outcome(&self) -> RunOutcome {
        if self.has_errors() {
            RunOutcome::PartialFailure
        } else {
            RunOutcome::Success
        }
    }

    /// Whether every changed issue was seen
    pub fn is_complete(&self) -> bool {
        !self.stopped_early && self.listing_error.is_none()
    }

    fn fail(&mut self, issue_id: &str, error: &crate::SyncError) {
        error!(issue = %issue_id, error = %error, "Skipping issue due to error");
        self.failures.push(IssueFailure {
            issue_id: issue_id.to_string(),
            error: error.to_string(),
        });
    }
}

/// Per-issue counters
#[derive(Debug, Clone, Default)]
struct IssueSync {
    comments_created: usize,
    comments_skipped: usize,
}

/// Issues chosen for processing
struct Selection {
    /// Oldest first
    issues: Vec<Issue>,
    /// Least recent `updated` among issues left for a later run
    oldest_deferred: Option<i64>,
}

/// Listed issue ordered by `updated`, ties by listing position
struct Candidate {
    updated: i64,
    seq: usize,
    issue: Issue,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.updated, self.seq).cmp(&(other.updated, other.seq))
    }
}

/// Sync engine, generic over the source and target adapters
pub struct SyncReconciler<S: SourceAdapter, T: TargetAdapter> {
    source: S,
    target: T,
    transformer: TransformerConfig,
    options: SyncOptions,
}

impl<S: SourceAdapter, T: TargetAdapter> SyncReconciler<S, T> {
    pub fn new(source: S, target: T, transformer: TransformerConfig) -> Self {
        Self {
            source,
            target,
            transformer,
            options: SyncOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    /// Execute one sync pass
    ///
    /// Only a failure to save the watermark is returned as an error; per-issue
    /// and listing failures are recorded in the report.
    pub async fn run(&self, store: &dyn WatermarkStore) -> Result<SyncReport> {
        let started = Utc::now();
        let since = store.load().await.last_synced_at;
        info!(since = %since, limit = self.options.limit, "Syncing issues");

        let mut report = SyncReport::new(since);
        let selection = self.select_issues(since, &mut report).await;

        for issue in selection.issues {
            report.issues_examined += 1;
            match self.sync_issue(&issue).await {
                Ok(counts) => {
                    report.issues_synced += 1;
                    report.comments_created += counts.comments_created;
                    report.comments_skipped += counts.comments_skipped;
                }
                Err(e) => report.fail(&issue.id, &e),
            }
        }

        report.watermark = next_watermark(&report, started, selection.oldest_deferred);
        if report.watermark > since {
            store.save(&SyncState::new(report.watermark)).await?;
        } else {
            info!(watermark = %since, "Watermark unchanged");
        }

        info!(
            examined = report.issues_examined,
            synced = report.issues_synced,
            failed = report.issues_failed(),
            comments_created = report.comments_created,
            watermark = %report.watermark,
            "Sync complete"
        );

        Ok(report)
    }

    /// Read the whole listing and keep the `limit` least recently updated
    /// issues, oldest first
    ///
    /// Raw issues that cannot be converted are recorded as failures here and
    /// do not take a slot.
    async fn select_issues(&self, since: DateTime<Utc>, report: &mut SyncReport) -> Selection {
        let limit = self.options.limit;
        let mut kept = BinaryHeap::new();
        let mut oldest_deferred: Option<i64> = None;
        let mut listed = 0usize;

        let mut issues = self.source.issues(since);
        while let Some(next) = issues.next().await {
            let raw = match next {
                Ok(raw) => raw,
                Err(e) => {
                    error!(error = %e, "Failed to list source issues");
                    report.listing_error = Some(e.to_string());
                    break;
                }
            };

            let id_hint = self.source.issue_id_hint(&raw);
            let issue = match self.source.to_issue_model(raw) {
                Ok(issue) => issue,
                Err(e) => {
                    report.issues_examined += 1;
                    report.fail(id_hint.as_deref().unwrap_or_default(), &e);
                    continue;
                }
            };

            kept.push(Candidate {
                updated: issue.updated,
                seq: listed,
                issue,
            });
            listed += 1;

            if kept.len() > limit {
                if let Some(deferred) = kept.pop() {
                    oldest_deferred = Some(match oldest_deferred {
                        Some(oldest) => oldest.min(deferred.updated),
                        None => deferred.updated,
                    });
                }
            }
        }

        if oldest_deferred.is_some() {
            info!(
                limit,
                deferred = listed.saturating_sub(limit),
                "Limit of issues reached. Deferring the rest to the next run"
            );
            report.stopped_early = true;
        }

        Selection {
            issues: kept.into_sorted_vec().into_iter().map(|c| c.issue).collect(),
            oldest_deferred,
        }
    }

    /// Map, upsert and mirror comments for one canonical issue
    async fn sync_issue(&self, issue: &Issue) -> Result<IssueSync> {
        info!(issue = %issue.id, "Syncing issue");

        let context = issue.to_context()?;
        let fields = self.transformer.map(&context);
        let fields_json = Value::Object(fields.clone());
        debug!(issue = %issue.id, fields = %fields_json, "Transformed issue");

        let key = self
            .target
            .create_or_update_issue(IssueRequest::new(fields, issue))
            .await?;

        info!(issue = %issue.id, key = %key, "Loading comments for issue");
        let existing = self.target.get_comments(&key).await?;

        let mut counts = IssueSync::default();
        let mut comments = self.source.comments(&issue.id);
        while let Some(raw) = comments.try_next().await? {
            let comment = self.source.to_comment_model(raw)?;
            if existing.contains_key(&comment.id) {
                debug!(comment = %comment.id, "Comment already exists. Skipping");
                counts.comments_skipped += 1;
                continue;
            }

            debug!(comment = %comment.id, key = %key, "Syncing comment");
            let request = self.target.from_comment_model(&comment);
            self.target.create_comment(request, &key).await?;
            counts.comments_created += 1;
        }

        Ok(counts)
    }
}

/// Watermark to persist after a run
///
/// A complete run advances to its start time. A capped run advances to just
/// before the oldest deferred issue, so every deferred issue is listed again.
/// After a listing failure the remaining issues are unknown and the previous
/// watermark is kept.
fn next_watermark(
    report: &SyncReport,
    started: DateTime<Utc>,
    oldest_deferred: Option<i64>,
) -> DateTime<Utc> {
    if report.listing_error.is_some() {
        return report.since;
    }
    match oldest_deferred {
        None => started,
        Some(ms) => DateTime::from_timestamp_millis(ms - 1)
            .map(|t| t.min(started).max(report.since))
            .unwrap_or(report.since),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Comment, Priority, State};
    use crate::SyncError;
    use async_trait::async_trait;
    use futures::stream::{self, BoxStream};
    use serde_json::{json, Map};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// 2024-01-01T00:00:00Z
    const BASE_MS: i64 = 1_704_067_200_000;

    enum Listed {
        Issue(Issue),
        Failure,
    }

    #[derive(Default)]
    struct MockSource {
        listed: Vec<Listed>,
        comments: HashMap<String, Vec<Comment>>,
        since_seen: Mutex<Vec<DateTime<Utc>>>,
        /// Only list issues updated after `since`
        filter_since: bool,
    }

    impl MockSource {
        fn with_issues(count: usize, comments_each: usize) -> Self {
            let mut source = Self::default();
            for n in 1..=count {
                let id = format!("cases/{}", n);
                let issue = Issue::new(&id, format!("Issue {}", n))
                    .with_state(State::New)
                    .with_priority(Priority::P2)
                    .with_updated(BASE_MS + (n as i64) * 1000);
                let comments = (1..=comments_each)
                    .map(|c| Comment::new(format!("{}/comments/{}", id, c), "hello"))
                    .collect();
                source.comments.insert(id, comments);
                source.listed.push(Listed::Issue(issue));
            }
            source
        }

        fn newest_first(mut self) -> Self {
            self.listed.reverse();
            self
        }
    }

    impl SourceAdapter for MockSource {
        type RawIssue = Issue;
        type RawComment = Comment;

        fn issues(&self, since: DateTime<Utc>) -> BoxStream<'_, Result<Issue>> {
            self.since_seen.lock().unwrap().push(since);
            let since_ms = since.timestamp_millis();
            let items: Vec<Result<Issue>> = self
                .listed
                .iter()
                .filter_map(|item| match item {
                    Listed::Issue(issue) if self.filter_since && issue.updated <= since_ms => None,
                    Listed::Issue(issue) => Some(Ok(issue.clone())),
                    Listed::Failure => Some(Err(SyncError::timeout())),
                })
                .collect();
            stream::iter(items).boxed()
        }

        fn comments<'a>(&'a self, issue_id: &'a str) -> BoxStream<'a, Result<Comment>> {
            let comments = self.comments.get(issue_id).cloned().unwrap_or_default();
            stream::iter(comments.into_iter().map(Ok)).boxed()
        }

        fn to_issue_model(&self, raw: Issue) -> Result<Issue> {
            if raw.title == "unparseable" {
                return Err(SyncError::Parse("bad case".to_string()));
            }
            Ok(raw)
        }

        fn issue_id_hint(&self, raw: &Issue) -> Option<String> {
            Some(raw.id.clone())
        }

        fn to_comment_model(&self, raw: Comment) -> Result<Comment> {
            Ok(raw)
        }
    }

    #[derive(Default)]
    struct MockTarget {
        keys: Mutex<HashMap<String, String>>,
        requests: Mutex<Vec<IssueRequest>>,
        /// target key -> foreign id -> body
        comments: Mutex<HashMap<String, HashMap<String, String>>>,
        fail_for: Option<String>,
    }

    #[async_trait]
    impl TargetAdapter for MockTarget {
        type Comment = String;
        type CommentRequest = (String, String);

        async fn create_or_update_issue(&self, request: IssueRequest) -> Result<String> {
            if self.fail_for.as_deref() == Some(request.source_issue_key.as_str()) {
                return Err(SyncError::Transport {
                    status: 400,
                    message: "Field 'summary' is required".to_string(),
                });
            }
            let mut keys = self.keys.lock().unwrap();
            let next = format!("OPS-{}", keys.len() + 1);
            let key = keys
                .entry(request.source_issue_key.clone())
                .or_insert(next)
                .clone();
            self.requests.lock().unwrap().push(request);
            Ok(key)
        }

        async fn get_comments(&self, issue_key: &str) -> Result<HashMap<String, String>> {
            Ok(self
                .comments
                .lock()
                .unwrap()
                .get(issue_key)
                .cloned()
                .unwrap_or_default())
        }

        async fn create_comment(&self, comment: (String, String), issue_key: &str) -> Result<String> {
            let (foreign_id, body) = comment;
            self.comments
                .lock()
                .unwrap()
                .entry(issue_key.to_string())
                .or_default()
                .insert(foreign_id, body.clone());
            Ok(body)
        }

        async fn update_comment(
            &self,
            comment: (String, String),
            _issue_key: &str,
            _comment_key: &str,
        ) -> Result<String> {
            Ok(comment.1)
        }

        fn from_comment_model(&self, comment: &Comment) -> (String, String) {
            (comment.id.clone(), comment.body.clone())
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        state: Mutex<Option<SyncState>>,
        saves: Mutex<usize>,
    }

    #[async_trait]
    impl WatermarkStore for MemoryStore {
        async fn load(&self) -> SyncState {
            self.state.lock().unwrap().unwrap_or_default()
        }

        async fn save(&self, state: &SyncState) -> Result<()> {
            *self.state.lock().unwrap() = Some(*state);
            *self.saves.lock().unwrap() += 1;
            Ok(())
        }
    }

    fn transformer() -> TransformerConfig {
        TransformerConfig::from_value(json!({
            "mapping": { "summary": "${title}", "project": { "key": "OPS" } }
        }))
        .unwrap()
    }

    fn reconciler(source: MockSource, target: MockTarget) -> SyncReconciler<MockSource, MockTarget> {
        SyncReconciler::new(source, target, transformer())
    }

    #[test]
    fn test_sync_options() {
        assert_eq!(SyncOptions::default().limit, 200);
        assert_eq!(SyncOptions::new().with_limit(5).limit, 5);
    }

    #[test]
    fn test_report_outcome() {
        let mut report = SyncReport::new(Utc::now());
        assert_eq!(report.outcome(), RunOutcome::Success);
        assert!(report.is_complete());

        report.fail("cases/1", &SyncError::timeout());
        assert_eq!(report.outcome(), RunOutcome::PartialFailure);
        assert_eq!(report.failures[0].error, "HTTP 408: Request timed out");
    }

    #[tokio::test]
    async fn test_full_run() {
        let sync = reconciler(MockSource::with_issues(2, 2), MockTarget::default());
        let store = MemoryStore::default();
        let before = Utc::now();

        let report = sync.run(&store).await.unwrap();

        assert_eq!(report.issues_examined, 2);
        assert_eq!(report.issues_synced, 2);
        assert_eq!(report.comments_created, 4);
        assert_eq!(report.outcome(), RunOutcome::Success);
        assert!(report.watermark >= before);
        assert_eq!(*store.state.lock().unwrap(), Some(SyncState::new(report.watermark)));

        assert_eq!(sync.source().since_seen.lock().unwrap()[0], SyncState::initial().last_synced_at);

        let requests = sync.target().requests.lock().unwrap();
        let mut expected = Map::new();
        expected.insert("summary".to_string(), json!("Issue 1"));
        expected.insert("project".to_string(), json!({ "key": "OPS" }));
        assert_eq!(requests[0].fields, expected);
        assert_eq!(requests[0].source_issue_key, "cases/1");
        assert_eq!(requests[0].source_updated_time, BASE_MS + 1000);
    }

    #[tokio::test]
    async fn test_rerun_creates_no_duplicate_comments() {
        let sync = reconciler(MockSource::with_issues(2, 2), MockTarget::default());
        let store = MemoryStore::default();

        let first = sync.run(&store).await.unwrap();
        let second = sync.run(&store).await.unwrap();

        assert_eq!(first.comments_created, 4);
        assert_eq!(second.comments_created, 0);
        assert_eq!(second.comments_skipped, 4);
        assert_eq!(sync.target().keys.lock().unwrap().len(), 2);
        // The second run starts from the first run's watermark
        assert_eq!(sync.source().since_seen.lock().unwrap()[1], first.watermark);
    }

    #[tokio::test]
    async fn test_issue_error_is_isolated() {
        let target = MockTarget {
            fail_for: Some("cases/2".to_string()),
            ..MockTarget::default()
        };
        let sync = reconciler(MockSource::with_issues(3, 1), target);
        let store = MemoryStore::default();

        let report = sync.run(&store).await.unwrap();

        assert_eq!(report.issues_examined, 3);
        assert_eq!(report.issues_synced, 2);
        assert_eq!(report.issues_failed(), 1);
        assert_eq!(report.failures[0].issue_id, "cases/2");
        assert!(report.failures[0].error.contains("summary"));
        assert_eq!(report.outcome(), RunOutcome::PartialFailure);
        // Failures do not hold the watermark back
        assert!(report.is_complete());
        assert_eq!(*store.saves.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unparseable_issue_is_isolated() {
        let mut source = MockSource::with_issues(2, 0);
        source.listed.insert(0, Listed::Issue(Issue::new("cases/x", "unparseable")));
        let sync = reconciler(source, MockTarget::default());

        let report = sync.run(&MemoryStore::default()).await.unwrap();

        assert_eq!(report.issues_examined, 3);
        assert_eq!(report.issues_synced, 2);
        assert_eq!(report.failures[0].issue_id, "cases/x");
    }

    #[tokio::test]
    async fn test_unparseable_issue_takes_no_slot() {
        let mut source = MockSource::with_issues(2, 0);
        source.listed.insert(0, Listed::Issue(Issue::new("cases/x", "unparseable")));
        let sync = reconciler(source, MockTarget::default())
            .with_options(SyncOptions::new().with_limit(2));

        let report = sync.run(&MemoryStore::default()).await.unwrap();

        assert_eq!(report.issues_synced, 2);
        assert!(!report.stopped_early);
    }

    #[tokio::test]
    async fn test_cap_stops_early() {
        let sync = reconciler(MockSource::with_issues(5, 0), MockTarget::default())
            .with_options(SyncOptions::new().with_limit(2));
        let store = MemoryStore::default();

        let report = sync.run(&store).await.unwrap();

        assert_eq!(report.issues_examined, 2);
        assert!(report.stopped_early);
        assert_eq!(sync.target().keys.lock().unwrap().len(), 2);
        // Just before the oldest deferred issue (cases/3)
        let expected = DateTime::from_timestamp_millis(BASE_MS + 3000 - 1).unwrap();
        assert_eq!(report.watermark, expected);
        assert_eq!(*store.state.lock().unwrap(), Some(SyncState::new(expected)));
    }

    #[tokio::test]
    async fn test_cap_equal_to_issue_count() {
        let sync = reconciler(MockSource::with_issues(2, 0), MockTarget::default())
            .with_options(SyncOptions::new().with_limit(2));
        let before = Utc::now();

        let report = sync.run(&MemoryStore::default()).await.unwrap();

        assert_eq!(report.issues_examined, 2);
        assert!(!report.stopped_early);
        assert!(report.watermark >= before);
    }

    #[tokio::test]
    async fn test_failures_count_toward_cap() {
        let target = MockTarget {
            fail_for: Some("cases/1".to_string()),
            ..MockTarget::default()
        };
        let sync = reconciler(MockSource::with_issues(3, 0), target)
            .with_options(SyncOptions::new().with_limit(2));

        let report = sync.run(&MemoryStore::default()).await.unwrap();

        assert_eq!(report.issues_examined, 2);
        assert_eq!(report.issues_synced, 1);
        assert!(report.stopped_early);
    }

    #[tokio::test]
    async fn test_newest_first_listing_is_processed_oldest_first() {
        let source = MockSource::with_issues(3, 0).newest_first();
        let sync = reconciler(source, MockTarget::default())
            .with_options(SyncOptions::new().with_limit(2));

        let report = sync.run(&MemoryStore::default()).await.unwrap();

        assert!(report.stopped_early);
        let requests = sync.target().requests.lock().unwrap();
        let synced: Vec<&str> = requests.iter().map(|r| r.source_issue_key.as_str()).collect();
        assert_eq!(synced, vec!["cases/1", "cases/2"]);
        assert_eq!(
            report.watermark,
            DateTime::from_timestamp_millis(BASE_MS + 3000 - 1).unwrap()
        );
    }

    #[tokio::test]
    async fn test_capped_runs_reach_every_issue_in_any_order() {
        let mut source = MockSource::with_issues(3, 0).newest_first();
        source.filter_since = true;
        let sync = reconciler(source, MockTarget::default())
            .with_options(SyncOptions::new().with_limit(1));
        let store = MemoryStore::default();

        let mut examined = Vec::new();
        for _ in 0..4 {
            examined.push(sync.run(&store).await.unwrap().issues_examined);
        }

        assert_eq!(examined, vec![1, 1, 1, 0]);
        assert_eq!(sync.target().keys.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_listing_failure_keeps_watermark() {
        let mut source = MockSource::with_issues(3, 0);
        source.listed.insert(1, Listed::Failure);
        let sync = reconciler(source, MockTarget::default());
        let store = MemoryStore::default();

        let report = sync.run(&store).await.unwrap();

        // Issues read before the failure are still synced
        assert_eq!(report.issues_synced, 1);
        assert!(report.listing_error.is_some());
        assert_eq!(report.outcome(), RunOutcome::PartialFailure);
        assert_eq!(report.watermark, report.since);
        assert_eq!(*store.saves.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_listing_failure_before_any_issue() {
        let source = MockSource {
            listed: vec![Listed::Failure],
            ..MockSource::default()
        };
        let sync = reconciler(source, MockTarget::default());
        let store = MemoryStore::default();

        let report = sync.run(&store).await.unwrap();

        assert_eq!(report.watermark, report.since);
        assert_eq!(*store.saves.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_source_advances_watermark() {
        let sync = reconciler(MockSource::default(), MockTarget::default());
        let store = MemoryStore::default();

        let report = sync.run(&store).await.unwrap();

        assert_eq!(report.issues_examined, 0);
        assert_eq!(report.outcome(), RunOutcome::Success);
        assert!(report.watermark > report.since);
        assert_eq!(*store.saves.lock().unwrap(), 1);
    }
}
