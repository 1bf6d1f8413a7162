//! Dotted-path access into nested JSON values
//!
//! Paths are plain strings such as `issue.project.key` or `tags.0`. Reading
//! never fails: any segment that cannot be followed yields `None`. Writing
//! creates intermediate objects on the way down.

use serde_json::{Map, Value};

/// Resolve `path` against `context`.
///
/// Objects are traversed by key and arrays by decimal index. An empty path,
/// a missing key, an out-of-range index or a scalar in the middle of the path
/// all resolve to `None`.
pub fn get<'a>(path: &str, context: &'a Value) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }

    path.split('.').try_fold(context, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Write `value` at `path` inside `container`.
///
/// Every segment but the last is walked as an object, inserting an empty
/// object where the key is missing and replacing any non-object value that
/// is in the way. On the last segment `Some(value)` overwrites the key.
///
/// `None` removes the key instead. Removal never creates anything: if the
/// path does not exist the container is left untouched.
pub fn set(container: &mut Map<String, Value>, path: &str, value: Option<Value>) {
    let mut segments: Vec<&str> = path.split('.').collect();
    let Some(last) = segments.pop() else {
        return;
    };

    let Some(value) = value else {
        remove(container, &segments, last);
        return;
    };

    let mut cursor = container;
    for segment in segments {
        let slot = cursor
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        cursor = match slot {
            Value::Object(map) => map,
            _ => unreachable!("slot was replaced by an object above"),
        };
    }

    cursor.insert(last.to_string(), value);
}

fn remove(container: &mut Map<String, Value>, parents: &[&str], last: &str) {
    let mut cursor = container;
    for segment in parents {
        match cursor.get_mut(*segment) {
            Some(Value::Object(map)) => cursor = map,
            _ => return,
        }
    }
    cursor.shift_remove(last);
}
