//! Source and target adapter configuration
//!
//! Each side of the sync is a `{ type, config }` pair in the YAML document.
//! The `type` tag selects a variant of a closed enum, so an unknown adapter
//! name is rejected while the document is parsed.

use crate::model::{Priority, State};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

/// Default per-request timeout for adapter HTTP calls
pub const DEFAULT_TIMEOUT_SECS: u64 = 25;

/// Comment property carrying the source comment id on the target side
pub const DEFAULT_FOREIGN_ID_PROPERTY: &str = "google-cloud-id";

/// Environment variable holding the Google OAuth access token
pub const DEFAULT_ACCESS_TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// Known source adapters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    GoogleCloud,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::GoogleCloud => f.write_str("google-cloud"),
        }
    }
}

/// Known target adapters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Jira,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::Jira => f.write_str("jira"),
        }
    }
}

/// Where issues are read from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "kebab-case")]
pub enum SourceConfig {
    GoogleCloud(GoogleCloudConfig),
}

impl SourceConfig {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceConfig::GoogleCloud(_) => SourceKind::GoogleCloud,
        }
    }
}

/// Where issues are written to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "kebab-case")]
pub enum TargetConfig {
    Jira(JiraConfig),
}

impl TargetConfig {
    pub fn kind(&self) -> TargetKind {
        match self {
            TargetConfig::Jira(_) => TargetKind::Jira,
        }
    }
}

/// Google Cloud Support API source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleCloudConfig {
    /// Search parent, e.g. `organizations/123` or `projects/my-project`
    pub organization_id: String,

    /// API root
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Service-account JSON key; takes precedence over the bearer token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_filename: Option<PathBuf>,

    /// Name of the environment variable holding a bearer token
    #[serde(default = "default_access_token_env")]
    pub access_token_env: String,

    /// Page size requested from list/search endpoints
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String {
    "https://cloudsupport.googleapis.com".to_string()
}

fn default_access_token_env() -> String {
    DEFAULT_ACCESS_TOKEN_ENV.to_string()
}

fn default_page_size() -> u32 {
    100
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl GoogleCloudConfig {
    pub fn new(organization_id: impl Into<String>) -> Self {
        Self {
            organization_id: organization_id.into(),
            endpoint: default_endpoint(),
            key_filename: None,
            access_token_env: default_access_token_env(),
            page_size: default_page_size(),
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_key_filename(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_filename = Some(path.into());
        self
    }

    /// Read the bearer token from the configured environment variable
    pub fn access_token(&self) -> Option<String> {
        std::env::var(self.access_token_env.trim_start_matches('$'))
            .ok()
            .filter(|token| !token.is_empty())
    }
}

/// Jira Cloud target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JiraConfig {
    /// Instance host name, e.g. `myteam.atlassian.net`
    pub host: String,

    #[serde(default = "default_protocol")]
    pub protocol: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Path prefix before `/rest/api/...`
    #[serde(default)]
    pub base: String,

    /// Replaces the default `/rest/api/3` segment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intermediate_path: Option<String>,

    /// Injected from `JIRA_USERNAME`
    #[serde(default, skip_serializing)]
    pub username: Option<String>,

    /// Injected from `JIRA_API_TOKEN`
    #[serde(default, skip_serializing)]
    pub api_token: Option<String>,

    /// Require credentials on every request
    #[serde(default = "default_strict_ssl", rename = "strictSSL")]
    pub strict_ssl: bool,

    /// Canonical state to Jira transition name
    #[serde(default)]
    pub states: HashMap<State, String>,

    /// Canonical priority to Jira priority name
    #[serde(default)]
    pub priorities: HashMap<Priority, String>,

    #[serde(default = "default_foreign_id_property")]
    pub foreign_id_property: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_protocol() -> String {
    "https".to_string()
}

fn default_strict_ssl() -> bool {
    true
}

fn default_foreign_id_property() -> String {
    DEFAULT_FOREIGN_ID_PROPERTY.to_string()
}

impl JiraConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            protocol: default_protocol(),
            port: None,
            base: String::new(),
            intermediate_path: None,
            username: None,
            api_token: None,
            strict_ssl: default_strict_ssl(),
            states: HashMap::new(),
            priorities: HashMap::new(),
            foreign_id_property: default_foreign_id_property(),
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, api_token: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.api_token = Some(api_token.into());
        self
    }

    pub fn with_state(mut self, state: State, transition: impl Into<String>) -> Self {
        self.states.insert(state, transition.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority, name: impl Into<String>) -> Self {
        self.priorities.insert(priority, name.into());
        self
    }

    /// REST root, e.g. `https://myteam.atlassian.net/rest/api/3`
    pub fn api_url(&self) -> String {
        let port = self.port.map(|p| format!(":{}", p)).unwrap_or_default();
        let api_path = self.intermediate_path.as_deref().unwrap_or("/rest/api/3");
        format!(
            "{}://{}{}{}{}",
            self.protocol,
            self.host.trim_end_matches('/'),
            port,
            self.base.trim_end_matches('/'),
            api_path
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_config_from_yaml() {
        let yaml = r#"
type: google-cloud
config:
  organizationId: organizations/123
"#;
        let source: SourceConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(source.kind(), SourceKind::GoogleCloud);
        let SourceConfig::GoogleCloud(config) = source;
        assert_eq!(config.organization_id, "organizations/123");
        assert_eq!(config.endpoint, "https://cloudsupport.googleapis.com");
        assert_eq!(config.access_token_env, DEFAULT_ACCESS_TOKEN_ENV);
        assert_eq!(config.timeout_secs, 25);
        assert!(config.key_filename.is_none());
    }

    #[test]
    fn test_source_key_filename_from_yaml() {
        let yaml = r#"
type: google-cloud
config:
  organizationId: organizations/123
  keyFilename: /etc/issue-syncer/service-account.json
"#;
        let source: SourceConfig = serde_yaml::from_str(yaml).unwrap();
        let SourceConfig::GoogleCloud(config) = source;
        assert_eq!(
            config.key_filename,
            Some(PathBuf::from("/etc/issue-syncer/service-account.json"))
        );
    }

    #[test]
    fn test_unknown_source_type_rejected() {
        let yaml = "type: zendesk\nconfig: {}\n";
        let result: std::result::Result<SourceConfig, _> = serde_yaml::from_str(yaml);
        assert!(result.is_err());
    }

    #[test]
    fn test_jira_config_from_yaml() {
        let yaml = r#"
type: jira
config:
  host: acme.atlassian.net
  states:
    NEW: To Do
    CLOSED: Done
  priorities:
    P1: High
"#;
        let target: TargetConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(target.kind().to_string(), "jira");
        let TargetConfig::Jira(config) = target;
        assert!(config.strict_ssl);
        assert_eq!(config.states.get(&State::Closed).map(String::as_str), Some("Done"));
        assert_eq!(config.priorities.get(&Priority::P1).map(String::as_str), Some("High"));
        assert_eq!(config.foreign_id_property, "google-cloud-id");
        assert!(config.username.is_none());
    }

    #[test]
    fn test_jira_api_url() {
        let config = JiraConfig::new("acme.atlassian.net");
        assert_eq!(config.api_url(), "https://acme.atlassian.net/rest/api/3");

        let mut config = JiraConfig::new("localhost");
        config.protocol = "http".to_string();
        config.port = Some(8080);
        config.base = "/jira".to_string();
        assert_eq!(config.api_url(), "http://localhost:8080/jira/rest/api/3");
    }

    #[test]
    fn test_secrets_never_serialized() {
        let config = JiraConfig::new("acme.atlassian.net").with_credentials("bot@acme.com", "s3cret");
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(!yaml.contains("s3cret"));
        assert!(!yaml.contains("bot@acme.com"));
    }
}
