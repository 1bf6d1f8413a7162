//! Atlassian Document Format helpers
//!
//! Jira v3 stores descriptions, comment bodies and comment property values as
//! ADF trees. Only the handful of node types the synchronizer writes are
//! modelled here.

use serde_json::{json, Value};

/// `doc` node wrapping the given block nodes
pub fn doc(content: Vec<Value>) -> Value {
    json!({
        "type": "doc",
        "version": 1,
        "content": content,
    })
}

/// Paragraph holding a single text node; empty text yields an empty paragraph
pub fn paragraph(text: &str) -> Value {
    paragraph_with(text_node(text, None))
}

fn paragraph_with(node: Option<Value>) -> Value {
    let content: Vec<Value> = node.into_iter().collect();
    json!({ "type": "paragraph", "content": content })
}

fn text_node(text: &str, mark: Option<&str>) -> Option<Value> {
    if text.is_empty() {
        return None;
    }
    Some(match mark {
        Some(mark) => json!({ "type": "text", "text": text, "marks": [{ "type": mark }] }),
        None => json!({ "type": "text", "text": text }),
    })
}

/// One-paragraph document, used for descriptions and property values
pub fn paragraph_doc(text: &str) -> Value {
    doc(vec![paragraph(text)])
}

/// Text of the first text node reached by following first children
///
/// Inverse of [`paragraph_doc`].
pub fn first_text(document: &Value) -> Option<String> {
    let mut content = document.get("content")?.as_array()?;
    loop {
        let node = content.first()?;
        if node.get("type").and_then(Value::as_str) == Some("text") {
            return node.get("text").and_then(Value::as_str).map(str::to_string);
        }
        content = node.get("content")?.as_array()?;
    }
}

/// Flatten any ADF tree to plain text, one line per block
pub fn plain_text(value: &Value) -> String {
    let mut lines = Vec::new();
    collect_blocks(value, &mut lines);
    lines.join("\n")
}

fn collect_blocks(value: &Value, lines: &mut Vec<String>) {
    match value {
        Value::String(s) => lines.push(s.clone()),
        Value::Array(nodes) => nodes.iter().for_each(|n| collect_blocks(n, lines)),
        Value::Object(node) => {
            let children = node.get("content").and_then(Value::as_array);
            let is_leaf_block = children
                .map(|c| c.iter().all(|n| n.get("type").and_then(Value::as_str) == Some("text")))
                .unwrap_or(false);
            if is_leaf_block {
                let line: String = children
                    .into_iter()
                    .flatten()
                    .filter_map(|n| n.get("text").and_then(Value::as_str))
                    .collect();
                lines.push(line);
            } else if let Some(children) = children {
                children.iter().for_each(|n| collect_blocks(n, lines));
            } else if let Some(text) = node.get("text").and_then(Value::as_str) {
                lines.push(text.to_string());
            }
        }
        _ => {}
    }
}

/// Builder for a quoted comment body
///
/// ```text
/// <author> wrote:
/// > <body>
/// _Original comment posted on <timestamp>_
/// ```
#[derive(Debug, Default)]
pub struct CommentBody {
    blocks: Vec<Value>,
}

impl CommentBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paragraph(mut self, text: &str) -> Self {
        self.blocks.push(paragraph(text));
        self
    }

    pub fn quote(mut self, text: &str) -> Self {
        self.blocks.push(json!({
            "type": "blockquote",
            "content": [paragraph(text)],
        }));
        self
    }

    pub fn emphasis(mut self, text: &str) -> Self {
        self.blocks.push(paragraph_with(text_node(text, Some("em"))));
        self
    }

    pub fn build(self) -> Value {
        doc(self.blocks)
    }
}
