//! Source to target synchronization
//!
//! # Sync Flow
//!
//! 1. **Load**: read the watermark from the [`WatermarkStore`](crate::state::WatermarkStore)
//! 2. **Stream**: list source issues updated after the watermark
//! 3. **Upsert**: map each issue and create or update its target counterpart
//! 4. **Comments**: create target comments whose foreign id is not yet present
//! 5. **Save**: persist the new watermark

mod reconciler;

pub use reconciler::{
    IssueFailure, RunOutcome, SyncOptions, SyncReconciler, SyncReport, DEFAULT_SYNC_LIMIT,
};
