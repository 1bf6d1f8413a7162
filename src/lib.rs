//! Issue Syncer - Incremental one-way sync of support cases into an issue tracker
//!
//! Each run lists support cases changed since a persisted watermark, maps
//! them through a declarative field template, upserts them into Jira keyed by
//! the source case id, mirrors comments that are not there yet, and moves the
//! watermark forward.
//!
//! # Architecture
//!
//! - **config**: `config.yaml` loading, secrets from the environment, validation
//! - **model**: Canonical issue and comment types shared by all adapters
//! - **integrations**: Source (Google Cloud Support) and target (Jira) adapters
//! - **state**: Watermark persistence (local file or GCS object)
//! - **sync**: The reconciler that drives one run
//! - **logging**: Template-based log line formatting
//!
//! Field mapping lives in the `fieldmap` workspace crate.

pub mod config;
pub mod error;
pub mod integrations;
pub mod logging;
pub mod model;
pub mod state;
pub mod sync;

// Re-exports
pub use error::{Result, SyncError};
