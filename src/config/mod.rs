//! Configuration system
//!
//! Loads `config.yaml` with support for:
//! - A tagged source adapter (`google-cloud`)
//! - A tagged target adapter (`jira`) with state/priority tables
//! - The field mapping and its `ignore` / `override` rules
//! - Logger settings

mod adapters;
mod sync_config;
pub mod validation;

pub use adapters::{
    GoogleCloudConfig, JiraConfig, SourceConfig, SourceKind, TargetConfig, TargetKind,
    DEFAULT_ACCESS_TOKEN_ENV, DEFAULT_FOREIGN_ID_PROPERTY, DEFAULT_TIMEOUT_SECS,
};
pub use sync_config::{SyncConfig, JIRA_API_TOKEN_ENV, JIRA_USERNAME_ENV};
pub use validation::{validate_config, validate_config_result, ValidationError};
