//! Declarative record mapping
//!
//! A [`TransformerConfig`] is a tree of target paths to [`MappingNode`]s plus
//! optional post-processing [`RulesConfig`]. The tree is classified once when
//! the configuration is read; mapping a record is then a plain walk over the
//! nodes and cannot fail.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{path, template, Error, Result};

/// One entry of a mapping tree
#[derive(Debug, Clone, PartialEq)]
pub enum MappingNode {
    /// Number or boolean, written verbatim
    Literal(Value),
    /// String, expanded against the source record
    Template(String),
    /// Array; each element is mapped by its own kind, order preserved
    Sequence(Vec<MappingNode>),
    /// Object; entries are mapped into a fresh object
    Nested(Vec<(String, MappingNode)>),
}

impl MappingNode {
    /// Classify a configuration value. `null` has no mapping and yields `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(_) | Value::Number(_) => Some(Self::Literal(value)),
            Value::String(s) => Some(Self::Template(s)),
            Value::Array(items) => Some(Self::Sequence(
                items.into_iter().filter_map(Self::from_value).collect(),
            )),
            Value::Object(entries) => Some(Self::Nested(entries_from_map(entries))),
        }
    }

    /// Produce the target value for this node.
    pub fn render(&self, context: &Value) -> Value {
        match self {
            Self::Literal(value) => value.clone(),
            Self::Template(text) => Value::String(template::compile(text, context)),
            Self::Sequence(items) => {
                Value::Array(items.iter().map(|item| item.render(context)).collect())
            }
            Self::Nested(entries) => {
                let mut object = Map::new();
                for (field, node) in entries {
                    path::set(&mut object, field, Some(node.render(context)));
                }
                Value::Object(object)
            }
        }
    }
}

fn entries_from_map(entries: Map<String, Value>) -> Vec<(String, MappingNode)> {
    entries
        .into_iter()
        .filter_map(|(field, value)| MappingNode::from_value(value).map(|node| (field, node)))
        .collect()
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Ordered map of target path to node
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub struct FieldMapping {
    entries: Vec<(String, MappingNode)>,
}

impl FieldMapping {
    pub fn entries(&self) -> &[(String, MappingNode)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TryFrom<Value> for FieldMapping {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(entries) => Ok(Self {
                entries: entries_from_map(entries),
            }),
            Value::Null => Ok(Self::default()),
            other => Err(Error::NotAnObject {
                section: "mapping",
                found: kind_of(&other),
            }),
        }
    }
}

/// Post-processing applied after the mapping walk
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RulesConfig {
    /// Target paths removed after mapping
    #[serde(default)]
    pub ignore: Vec<String>,

    /// Target paths forced to a value, applied after `ignore`
    #[serde(default, rename = "override")]
    pub overrides: Overrides,
}

/// Ordered map of target path to override node
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub struct Overrides {
    entries: Vec<(String, MappingNode)>,
}

impl Overrides {
    pub fn entries(&self) -> &[(String, MappingNode)] {
        &self.entries
    }
}

impl TryFrom<Value> for Overrides {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(entries) => {
                let mut out = Vec::with_capacity(entries.len());
                for (field, value) in entries {
                    match MappingNode::from_value(value) {
                        Some(node) => out.push((field, node)),
                        None => return Err(Error::NullOverride(field)),
                    }
                }
                Ok(Self { entries: out })
            }
            Value::Null => Ok(Self::default()),
            other => Err(Error::NotAnObject {
                section: "rules.override",
                found: kind_of(&other),
            }),
        }
    }
}

/// Mapping tree plus rules, as it appears in a configuration document
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TransformerConfig {
    #[serde(default)]
    pub mapping: FieldMapping,

    #[serde(default)]
    pub rules: Option<RulesConfig>,
}

impl TransformerConfig {
    /// Build a config from a JSON value shaped like the YAML document.
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Reshape `source` into a new target record.
    ///
    /// The source is only read, never modified. Templates address its fields
    /// directly (`${title}`, `${creator.email}`), with no prefix.
    pub fn map(&self, source: &Value) -> Map<String, Value> {
        let mut target = Map::new();

        for (field, node) in self.mapping.entries() {
            path::set(&mut target, field, Some(node.render(source)));
        }

        if let Some(rules) = &self.rules {
            for field in &rules.ignore {
                path::set(&mut target, field, None);
            }
            for (field, node) in rules.overrides.entries() {
                path::set(&mut target, field, Some(node.render(source)));
            }
        }

        target
    }
}
