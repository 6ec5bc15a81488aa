//! Canonical JSON encoding.
//!
//! Two values that are equal as JSON trees always encode to the same text:
//! object members are written in ascending key order no matter how the map
//! was built, and no insignificant whitespace is emitted.
//!
//! ```
//! use courier_core::canonical_json;
//! use serde_json::json;
//!
//! let a = json!({"b": 1, "a": [true, null]});
//! let b = json!({"a": [true, null], "b": 1});
//! assert_eq!(canonical_json(&a), canonical_json(&b));
//! assert_eq!(canonical_json(&a), r#"{"a":[true,null],"b":1}"#);
//! ```

use serde_json::Value;

/// Encode `value` as canonical JSON text.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

/// Append the canonical encoding of `value` to `out`.
///
/// Sorting is done here rather than relying on the map type, because
/// `serde_json`'s `preserve_order` feature can be switched on by any crate in
/// the dependency graph.
pub fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (key, value)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_canonical(value, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::String(s) => write_string(s, out),
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn write_string(s: &str, out: &mut String) {
    // Display for Value::String performs JSON escaping.
    out.push_str(&Value::String(s.to_owned()).to_string());
}
