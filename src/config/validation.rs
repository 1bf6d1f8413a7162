//! Configuration validation
//!
//! Validates synchronizer configuration for correctness:
//! - Adapter endpoints and identifiers are well formed
//! - Credentials are present where strict authentication is required
//! - The mapping produces at least one field
//! - State and priority tables name something

use super::adapters::{GoogleCloudConfig, JiraConfig, SourceConfig, TargetConfig};
use super::sync_config::SyncConfig;
use crate::SyncError;

/// Validation error details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub context: Option<String>,
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            context: None,
            field: field.into(),
            message: message.into(),
        }
    }

    fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref ctx) = self.context {
            write!(f, "[{}] {}: {}", ctx, self.field, self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}

/// Validation result
pub type ValidationResult = std::result::Result<(), Vec<ValidationError>>;

/// Validate a synchronizer configuration
///
/// Expects secrets to have been injected already.
pub fn validate_config(config: &SyncConfig) -> ValidationResult {
    let mut errors = Vec::new();

    match config.source {
        SourceConfig::GoogleCloud(ref source) => {
            for error in validate_google_cloud(source) {
                errors.push(error.with_context("source"));
            }
        }
    }

    match config.target {
        TargetConfig::Jira(ref target) => {
            for error in validate_jira(target) {
                errors.push(error.with_context("target"));
            }
        }
    }

    let has_overrides = config
        .rules
        .as_ref()
        .is_some_and(|rules| !rules.overrides.entries().is_empty());
    if config.mapping.is_empty() && !has_overrides {
        errors.push(ValidationError::new(
            "mapping",
            "Mapping must define at least one target field",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_google_cloud(config: &GoogleCloudConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if !config.organization_id.starts_with("organizations/")
        && !config.organization_id.starts_with("projects/")
    {
        errors.push(ValidationError::new(
            "organizationId",
            format!(
                "Expected organizations/<id> or projects/<id>, got '{}'",
                config.organization_id
            ),
        ));
    }

    if !is_http_url(&config.endpoint) {
        errors.push(ValidationError::new(
            "endpoint",
            format!("Invalid endpoint URL: {}", config.endpoint),
        ));
    }

    if config.page_size == 0 {
        errors.push(ValidationError::new("pageSize", "Page size must be greater than 0"));
    }

    if config.timeout_secs == 0 {
        errors.push(ValidationError::new("timeoutSecs", "Timeout must be greater than 0"));
    }

    match &config.key_filename {
        Some(path) if !path.is_file() => errors.push(ValidationError::new(
            "keyFilename",
            format!("Service account key not found: {}", path.display()),
        )),
        Some(_) => {}
        None if config.access_token().is_none() => errors.push(ValidationError::new(
            "credentials",
            format!(
                "Set keyFilename or the {} environment variable",
                config.access_token_env
            ),
        )),
        None => {}
    }

    errors
}

fn validate_jira(config: &JiraConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config.host.is_empty() {
        errors.push(ValidationError::new("host", "Jira host cannot be empty"));
    } else if config.host.contains("://") {
        errors.push(ValidationError::new(
            "host",
            format!("Host must not include a scheme: {}", config.host),
        ));
    }

    if config.protocol != "https" && config.protocol != "http" {
        errors.push(ValidationError::new(
            "protocol",
            format!("Invalid protocol '{}'. Must be one of: http, https", config.protocol),
        ));
    }

    if config.strict_ssl && (config.username.is_none() || config.api_token.is_none()) {
        errors.push(ValidationError::new(
            "credentials",
            "JIRA_USERNAME and JIRA_API_TOKEN are required when strictSSL is enabled",
        ));
    }

    for (state, name) in &config.states {
        if name.trim().is_empty() {
            errors.push(ValidationError::new(
                format!("states.{}", state),
                "Transition name cannot be empty",
            ));
        }
    }

    for (priority, name) in &config.priorities {
        if name.trim().is_empty() {
            errors.push(ValidationError::new(
                format!("priorities.{}", priority),
                "Priority name cannot be empty",
            ));
        }
    }

    if config.foreign_id_property.is_empty() {
        errors.push(ValidationError::new(
            "foreignIdProperty",
            "Comment property key cannot be empty",
        ));
    }

    if config.timeout_secs == 0 {
        errors.push(ValidationError::new("timeoutSecs", "Timeout must be greater than 0"));
    }

    errors
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://")
}

/// Validate configuration and return a Result
pub fn validate_config_result(config: &SyncConfig) -> crate::Result<()> {
    validate_config(config).map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        SyncError::Config(format!(
            "Configuration validation failed:\n  - {}",
            messages.join("\n  - ")
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::State;
    use fieldmap::FieldMapping;
    use serde_json::json;

    const TOKEN_ENV: &str = "ISSUE_SYNCER_VALIDATION_TEST_TOKEN";

    fn google_config() -> GoogleCloudConfig {
        std::env::set_var(TOKEN_ENV, "ya29.token");
        let mut google = GoogleCloudConfig::new("organizations/123");
        google.access_token_env = TOKEN_ENV.to_string();
        google
    }

    fn valid_config() -> SyncConfig {
        let mut config = SyncConfig::new(
            SourceConfig::GoogleCloud(google_config()),
            TargetConfig::Jira(
                JiraConfig::new("acme.atlassian.net").with_credentials("bot@acme.com", "token"),
            ),
        );
        config.mapping = FieldMapping::try_from(json!({ "summary": "${title}" })).unwrap();
        config
    }

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_missing_credentials_under_strict_ssl() {
        let mut config = valid_config();
        config.target = TargetConfig::Jira(JiraConfig::new("acme.atlassian.net"));

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "credentials");
        assert_eq!(errors[0].context.as_deref(), Some("target"));
    }

    #[test]
    fn test_credentials_optional_without_strict_ssl() {
        let mut config = valid_config();
        let mut jira = JiraConfig::new("localhost");
        jira.strict_ssl = false;
        config.target = TargetConfig::Jira(jira);

        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_invalid_organization() {
        let mut config = valid_config();
        let mut google = google_config();
        google.organization_id = "123".to_string();
        config.source = SourceConfig::GoogleCloud(google);

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().starts_with("[source] organizationId"));
    }

    #[test]
    fn test_missing_google_credentials() {
        let mut config = valid_config();
        let mut google = GoogleCloudConfig::new("organizations/123");
        google.access_token_env = "ISSUE_SYNCER_VALIDATION_UNSET".to_string();
        config.source = SourceConfig::GoogleCloud(google);

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "credentials");
        assert_eq!(errors[0].context.as_deref(), Some("source"));
        assert!(errors[0].message.contains("ISSUE_SYNCER_VALIDATION_UNSET"));
    }

    #[test]
    fn test_missing_key_file() {
        let mut config = valid_config();
        config.source = SourceConfig::GoogleCloud(
            google_config().with_key_filename("/nonexistent/service-account.json"),
        );

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "keyFilename");
    }

    #[test]
    fn test_key_file_replaces_token() {
        let dir = tempfile::tempdir().unwrap();
        let key = dir.path().join("service-account.json");
        std::fs::write(&key, "{}").unwrap();

        let mut config = valid_config();
        let mut google = GoogleCloudConfig::new("organizations/123").with_key_filename(&key);
        google.access_token_env = "ISSUE_SYNCER_VALIDATION_UNSET".to_string();
        config.source = SourceConfig::GoogleCloud(google);

        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_host_with_scheme() {
        let mut config = valid_config();
        config.target = TargetConfig::Jira(
            JiraConfig::new("https://acme.atlassian.net").with_credentials("u", "t"),
        );

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "host"));
    }

    #[test]
    fn test_empty_mapping() {
        let mut config = valid_config();
        config.mapping = FieldMapping::default();

        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].message.contains("at least one target field"));
    }

    #[test]
    fn test_empty_transition_name() {
        let mut config = valid_config();
        config.target = TargetConfig::Jira(
            JiraConfig::new("acme.atlassian.net")
                .with_credentials("u", "t")
                .with_state(State::Closed, " "),
        );

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "states.CLOSED");
    }

    #[test]
    fn test_validate_config_result_message() {
        let mut config = valid_config();
        config.mapping = FieldMapping::default();

        let err = validate_config_result(&config).unwrap_err();
        assert!(err.to_string().contains("Configuration validation failed"));
    }
}
