//! `${path}` template expansion
//!
//! Placeholders are matched left to right and non-greedily: `${` opens, the
//! first following `}` closes. The body is trimmed and resolved with
//! [`crate::path::get`]. There is no escape syntax and no nesting. A
//! placeholder body may not span a line break; such a `${` is kept as
//! literal text.

use serde_json::Value;

use crate::path;

const OPEN: &str = "${";
const CLOSE: char = '}';

/// Expand every placeholder in `template` against `context`.
///
/// Unresolvable paths and `null` values expand to the empty string, so this
/// never fails.
pub fn compile(template: &str, context: &Value) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        let after_open = &rest[start + OPEN.len()..];
        let Some(end) = after_open.find(CLOSE) else {
            break;
        };

        let body = &after_open[..end];
        if body.contains('\n') || body.contains('\r') {
            // Not a placeholder, emit "$" and rescan from the next character
            output.push_str(&rest[..start + 1]);
            rest = &rest[start + 1..];
            continue;
        }

        output.push_str(&rest[..start]);
        if let Some(value) = path::get(body.trim(), context) {
            output.push_str(&stringify(value));
        }
        rest = &after_open[end + CLOSE.len_utf8()..];
    }

    output.push_str(rest);
    output
}

/// Render a value the way it reads when interpolated into text.
///
/// Integral floats drop their fraction, arrays are comma-joined, objects
/// render as an opaque marker and `null` renders as nothing.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f == 0.0 => "0".to_string(),
            Some(f) if n.is_f64() && f.is_finite() && f.fract() == 0.0 && f.abs() < 1e21 => {
                format!("{f:.0}")
            }
            _ => n.to_string(),
        },
        Value::Array(items) => items.iter().map(stringify).collect::<Vec<_>>().join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}
