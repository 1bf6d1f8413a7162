//! Canonical issue
//!
//! The source/target-agnostic shape every source issue is converted into
//! before mapping. Serialized in camelCase, which is also the shape mapping
//! templates see (`${title}`, `${classification.name}`, `${creator.email}`).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Lifecycle state of a support issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum State {
    New,
    #[serde(rename = "IN_PROGRESS_GOOGLE_SUPPORT")]
    InProgress,
    ActionRequired,
    SolutionProvided,
    Closed,
    #[serde(other)]
    StateUnspecified,
}

impl Default for State {
    fn default() -> Self {
        Self::StateUnspecified
    }
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            State::StateUnspecified => "STATE_UNSPECIFIED",
            State::New => "NEW",
            State::InProgress => "IN_PROGRESS_GOOGLE_SUPPORT",
            State::ActionRequired => "ACTION_REQUIRED",
            State::SolutionProvided => "SOLUTION_PROVIDED",
            State::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Issue priority (P0 = most urgent)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    P0,
    P1,
    P2,
    P3,
    P4,
    #[serde(rename = "PRIORITY_UNSPECIFIED", other)]
    Unspecified,
}

impl Default for Priority {
    fn default() -> Self {
        Self::Unspecified
    }
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Unspecified => "PRIORITY_UNSPECIFIED",
            Priority::P0 => "P0",
            Priority::P1 => "P1",
            Priority::P2 => "P2",
            Priority::P3 => "P3",
            Priority::P4 => "P4",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Person who opened an issue or wrote a comment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    /// Set when the author is a support agent rather than the customer
    #[serde(default)]
    pub support: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub id: String,
    pub name: String,
}

/// Canonical issue
///
/// `id` is stable across runs and is the only key correlating a source
/// issue with its target counterpart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
    #[serde(default)]
    pub subscriber_email_addresses: Vec<String>,
    #[serde(default)]
    pub state: State,
    /// Milliseconds since the Unix epoch
    pub created: i64,
    /// Milliseconds since the Unix epoch
    pub updated: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<Actor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub escalated: bool,
    #[serde(default)]
    pub test_case: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    /// Source-specific fields without a canonical slot
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Issue {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_state(mut self, state: State) -> Self {
        self.state = state;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_updated(mut self, updated: i64) -> Self {
        self.updated = updated;
        self
    }

    /// Template context handed to the field mapper
    pub fn to_context(&self) -> crate::Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}
