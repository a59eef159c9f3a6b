//! Canonical JSON form shared by every writer of locale JSON files.

use serde::Serialize;
use serde_json::{Map, Value};

/// What: Recursively sort object keys in ascending byte order.
///
/// Inputs:
/// - `value`: Any JSON value
///
/// Output:
/// - Copy of `value` with every object's keys sorted.
///
/// Details:
/// - Arrays are copied as they are, including any objects inside them.
#[must_use]
pub fn sort_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::with_capacity(map.len());
            for key in keys {
                if let Some(v) = map.get(key) {
                    sorted.insert(key.clone(), sort_json(v));
                }
            }
            Value::Object(sorted)
        }
        other => other.clone(),
    }
}

/// What: Render `value` sorted, with 4-space indentation and a trailing newline.
///
/// # Errors
/// - Returns the serializer error (only possible for non-string map keys, which
///   `Value` cannot hold, so effectively infallible).
pub fn to_canonical_string(value: &Value) -> serde_json::Result<String> {
    let sorted = sort_json(value);
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    sorted.serialize(&mut serializer)?;
    let mut text = String::from_utf8(out).unwrap_or_else(|e| {
        String::from_utf8_lossy(e.as_bytes()).into_owned()
    });
    text.push('\n');
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn keys_in_order(value: &Value) -> Vec<String> {
        value
            .as_object()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    #[test]
    /// What: Keys are sorted case-sensitively at every level; arrays untouched.
    fn sorts_nested_objects_and_keeps_arrays() {
        let input = json!({
            "b": {"z": 1, "a": 2},
            "B": [3, 1, 2],
            "a": "x"
        });
        let sorted = sort_json(&input);
        assert_eq!(keys_in_order(&sorted), vec!["B", "a", "b"]);
        assert_eq!(keys_in_order(&sorted["b"]), vec!["a", "z"]);
        assert_eq!(sorted["B"], json!([3, 1, 2]));
        assert_eq!(sorted, input);
    }

    #[test]
    /// What: Objects inside arrays keep their key order.
    fn objects_inside_arrays_are_untouched() {
        let input = json!({"y": {"k": [{"d": 1, "c": 2}]}, "x": null});
        let sorted = sort_json(&input);
        assert_eq!(keys_in_order(&sorted), vec!["x", "y"]);
        assert_eq!(keys_in_order(&sorted["y"]["k"][0]), vec!["d", "c"]);
        assert_eq!(
            to_canonical_string(&input).expect("render"),
            concat!(
                "{\n    \"x\": null,\n    \"y\": {\n        \"k\": [\n",
                "            {\n                \"d\": 1,\n",
                "                \"c\": 2\n            }\n",
                "        ]\n    }\n}\n",
            )
        );
    }

    #[test]
    /// What: Sorting is idempotent.
    fn sort_is_idempotent() {
        let input = json!({"y": {"b": "1", "a": ["z", "y"]}, "x": null});
        let once = sort_json(&input);
        let twice = sort_json(&once);
        assert_eq!(
            to_canonical_string(&once).expect("render"),
            to_canonical_string(&twice).expect("render")
        );
    }

    #[test]
    /// What: Canonical text uses 4-space indentation and ends with a newline.
    fn canonical_string_format() {
        let text = to_canonical_string(&json!({"b": "2", "a": {"c": "1"}})).expect("render");
        assert_eq!(
            text,
            "{\n    \"a\": {\n        \"c\": \"1\"\n    },\n    \"b\": \"2\"\n}\n"
        );
    }
}
