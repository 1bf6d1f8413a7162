//! Template-driven reshaping of nested JSON records
//!
//! Three layers, each usable on its own:
//!
//! - [`path`]: read and write values at dotted paths (`a.b.0.c`)
//! - [`template`]: expand `${path}` placeholders inside strings
//! - [`mapping`]: walk a declarative mapping tree to build a new record,
//!   then apply `ignore` and `override` rules
//!
//! # Example
//!
//! ```
//! use fieldmap::TransformerConfig;
//! use serde_json::json;
//!
//! let config = TransformerConfig::from_value(json!({
//!     "mapping": {
//!         "summary": "${title}",
//!         "labels": ["support", "${priority}"],
//!         "project": { "key": "OPS" }
//!     },
//!     "rules": { "ignore": ["project"] }
//! }))?;
//!
//! let target = config.map(&json!({ "title": "Disk full", "priority": "P1" }));
//! assert_eq!(
//!     serde_json::Value::Object(target),
//!     json!({ "summary": "Disk full", "labels": ["support", "P1"] })
//! );
//! # Ok::<(), fieldmap::Error>(())
//! ```

pub mod mapping;
pub mod path;
pub mod template;

use thiserror::Error;

pub use mapping::{FieldMapping, MappingNode, Overrides, RulesConfig, TransformerConfig};
pub use template::compile;

/// Errors raised while reading a mapping configuration
#[derive(Error, Debug)]
pub enum Error {
    #[error("`{section}` must be an object, found {found}")]
    NotAnObject {
        section: &'static str,
        found: &'static str,
    },

    #[error("override for `{0}` has no value")]
    NullOverride(String),

    #[error("invalid transformer config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for mapping configuration
pub type Result<T> = std::result::Result<T, Error>;
