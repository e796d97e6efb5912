//! Conversion between nested mappings and dotted-path rows.
//!
//! A nested mapping such as `{"a": {"b": 1}}` is projected onto a flat
//! two-column layout as the row `("a.b", 1)`, and rebuilt by splitting the
//! key on `.`.

use serde_json::{Map, Value};

/// Separator between path segments.
pub const PATH_SEPARATOR: char = '.';

/// Flatten a nested mapping into `(dotted path, scalar)` rows.
///
/// Rows come out in the mapping's key order, depth first. Empty objects
/// produce no rows.
pub fn flatten(map: &Map<String, Value>) -> Vec<(String, Value)> {
    let mut rows = Vec::new();
    flatten_into(map, None, &mut rows);
    rows
}

fn flatten_into(map: &Map<String, Value>, prefix: Option<&str>, rows: &mut Vec<(String, Value)>) {
    for (key, value) in map {
        let path = match prefix {
            Some(prefix) => format!("{prefix}{PATH_SEPARATOR}{key}"),
            None => key.clone(),
        };

        match value {
            Value::Object(child) => flatten_into(child, Some(&path), rows),
            scalar => rows.push((path, scalar.clone())),
        }
    }
}

/// Rebuild a nested mapping from `(dotted path, value)` rows.
///
/// Later rows win: a row whose path runs through a key that already holds a
/// scalar replaces that scalar with an object.
pub fn unflatten<I, K>(rows: I) -> Map<String, Value>
where
    I: IntoIterator<Item = (K, Value)>,
    K: AsRef<str>,
{
    let mut root = Map::new();
    for (path, value) in rows {
        insert_path(&mut root, path.as_ref(), value);
    }
    root
}

/// Insert a single value at a dotted path, creating intermediate levels.
pub fn insert_path(root: &mut Map<String, Value>, path: &str, value: Value) {
    let mut segments = path.split(PATH_SEPARATOR).peekable();
    let mut current = root;

    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            current.insert(segment.to_string(), value);
            return;
        }

        let slot = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }

        match slot {
            Value::Object(next) => current = next,
            _ => return,
        }
    }
}
