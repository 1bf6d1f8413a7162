//! Canonical issue and comment model
//!
//! Every source converts its raw payloads into these types; every target
//! consumes them. Nothing here knows about a concrete vendor API.

mod comment;
mod issue;

pub use comment::Comment;
pub use issue::{Actor, Classification, Issue, Priority, State};
