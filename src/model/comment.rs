//! Canonical comment

use serde::{Deserialize, Serialize};

use super::Actor;

/// A single comment on a source issue
///
/// Comments are treated as immutable once posted; `id` is the foreign id
/// recorded on the target side for deduplication.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    #[serde(default)]
    pub body: String,
    /// Milliseconds since the Unix epoch
    pub created: i64,
    #[serde(default)]
    pub creator: Actor,
}

impl Comment {
    pub fn new(id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn with_created(mut self, created: i64) -> Self {
        self.created = created;
        self
    }

    pub fn with_creator(mut self, creator: Actor) -> Self {
        self.creator = creator;
        self
    }
}
