//! Synchronizer configuration file handling
//!
//! Loads the YAML document describing the source, the target, the field
//! mapping and the logger. Secrets never live in the file; they are injected
//! from the environment after loading.

use super::adapters::{SourceConfig, TargetConfig};
use crate::logging::LoggingConfig;
use crate::Result;
use fieldmap::{FieldMapping, RulesConfig, TransformerConfig};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Environment variable holding the Jira user name
pub const JIRA_USERNAME_ENV: &str = "JIRA_USERNAME";
/// Environment variable holding the Jira API token
pub const JIRA_API_TOKEN_ENV: &str = "JIRA_API_TOKEN";

/// Complete synchronizer configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    pub source: SourceConfig,

    pub target: TargetConfig,

    /// Target field path to template tree
    #[serde(default)]
    pub mapping: FieldMapping,

    /// Post-mapping `ignore` / `override` rules
    #[serde(default)]
    pub rules: Option<RulesConfig>,

    /// Log line prefix, shorthand for `logging.template`
    #[serde(default)]
    pub logger: Option<String>,

    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

impl SyncConfig {
    pub fn new(source: SourceConfig, target: TargetConfig) -> Self {
        Self {
            source,
            target,
            mapping: FieldMapping::default(),
            rules: None,
            logger: None,
            logging: None,
        }
    }

    /// Load configuration from a specific path
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(crate::SyncError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        tracing::info!(path = %path.display(), "Loading synchronizer configuration");

        let content = fs::read_to_string(path)?;
        let config = Self::from_yaml(&content)?;

        tracing::debug!(
            source = %config.source.kind(),
            target = %config.target.kind(),
            mapped_fields = config.mapping.entries().len(),
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Mapping and rules as handed to the field mapper
    pub fn transformer(&self) -> TransformerConfig {
        TransformerConfig {
            mapping: self.mapping.clone(),
            rules: self.rules.clone(),
        }
    }

    /// Effective logger settings; `logger` wins over `logging.template`
    pub fn logging_config(&self) -> LoggingConfig {
        let mut config = self.logging.clone().unwrap_or_default();
        if let Some(ref template) = self.logger {
            config.template = template.clone();
        }
        config
    }

    /// Inject target secrets from `JIRA_USERNAME` / `JIRA_API_TOKEN`
    pub fn inject_secrets_from_env(&mut self) {
        let username = std::env::var(JIRA_USERNAME_ENV).ok();
        let api_token = std::env::var(JIRA_API_TOKEN_ENV).ok();
        self.apply_secrets(username, api_token);
    }

    /// Set target credentials; `None` leaves an existing value untouched
    pub fn apply_secrets(&mut self, username: Option<String>, api_token: Option<String>) {
        match self.target {
            TargetConfig::Jira(ref mut jira) => {
                if let Some(username) = username.filter(|v| !v.is_empty()) {
                    jira.username = Some(username);
                }
                if let Some(api_token) = api_token.filter(|v| !v.is_empty()) {
                    jira.api_token = Some(api_token);
                }
            }
        }
    }
}
