//! Flatten/unflatten codec.
//!
//! The plugin host protocol exchanges parameters and results as flat
//! `string -> string` maps (see `wfe-plugin`), while workflow documents and
//! `res`/`outputs` values are nested JSON. This crate is the bridge between
//! the two: [`flatten`] turns a [`serde_json::Value`] into a flat map,
//! [`unflatten`] reverses it.
//!
//! Flat keys are `__`-joined paths (`user__name`, `tags__0`). Scalars carry a
//! type prefix so the reverse direction doesn't have to guess: `#i#` for
//! integers, `#f#` for floats, `#b#` for booleans. Plain strings and `null`
//! (encoded as the empty string) carry no prefix.

use std::collections::HashMap;

use serde_json::{Map, Number, Value};

const INT_PREFIX: &str = "#i#";
const FLOAT_PREFIX: &str = "#f#";
const BOOL_PREFIX: &str = "#b#";

/// A nested value could not be rebuilt from its flat keys.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("flattened path conflicts at segment '{0}': one key treats it as a leaf, another as a container")]
    Conflict(String),
}

/// Turn a nested JSON value into a flat `__`-joined string map.
///
/// Empty objects and empty arrays have no representable path and are
/// dropped; round-tripping one back through [`unflatten`] yields nothing at
/// that key rather than the original empty container.
pub fn flatten(value: &Value) -> HashMap<String, String> {
    let mut out = HashMap::new();
    flatten_into("", value, &mut out);
    out
}

fn flatten_into(prefix: &str, value: &Value, out: &mut HashMap<String, String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                flatten_into(&join(prefix, key), child, out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten_into(&join(prefix, &index.to_string()), child, out);
            }
        }
        scalar => {
            out.insert(prefix.to_string(), encode_scalar(scalar));
        }
    }
}

fn join(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}__{segment}")
    }
}

fn encode_scalar(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => format!("{BOOL_PREFIX}{b}"),
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                format!("{INT_PREFIX}{n}")
            } else {
                format!("{FLOAT_PREFIX}{n}")
            }
        }
        Value::String(s) => s.clone(),
        Value::Object(_) | Value::Array(_) => unreachable!("flatten_into only calls this on scalars"),
    }
}

/// Decode one flat scalar back into its typed value.
///
/// A type prefix whose body doesn't parse falls back to a plain string made
/// of the trailing, prefix-stripped text rather than erroring — a step's
/// plugin may legitimately return `"#i#not-a-number"` as free text.
fn decode_scalar(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    if let Some(rest) = raw.strip_prefix(INT_PREFIX) {
        return rest.parse::<i64>().map(Value::from).unwrap_or_else(|_| Value::String(rest.to_string()));
    }
    if let Some(rest) = raw.strip_prefix(FLOAT_PREFIX) {
        return rest
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(rest.to_string()));
    }
    if let Some(rest) = raw.strip_prefix(BOOL_PREFIX) {
        return rest.parse::<bool>().map(Value::Bool).unwrap_or_else(|_| Value::String(rest.to_string()));
    }
    Value::String(raw.to_string())
}

/// Rebuild a nested JSON value from a flat `__`-joined string map.
///
/// A map whose top-level keys are a dense `0..n` run (e.g. from flattening a
/// top-level array) is wrapped in `{"__array_root": [...]}` rather than
/// returned as a bare array, so the result is always a JSON object.
pub fn unflatten(map: &HashMap<String, String>) -> Result<Value, CodecError> {
    let mut root = Value::Object(Map::new());
    for (key, raw) in map {
        if key.is_empty() {
            continue;
        }
        let segments: Vec<&str> = key.split("__").collect();
        insert_path(&mut root, &segments, decode_scalar(raw))?;
    }
    Ok(rewrite_numeric_maps(root))
}

fn insert_path(node: &mut Value, segments: &[&str], value: Value) -> Result<(), CodecError> {
    let Value::Object(map) = node else {
        return Err(CodecError::Conflict(segments[0].to_string()));
    };
    let (head, rest) = segments.split_first().expect("segments is non-empty");
    if rest.is_empty() {
        if matches!(map.get(*head), Some(Value::Object(_)) | Some(Value::Array(_))) {
            return Err(CodecError::Conflict((*head).to_string()));
        }
        map.insert((*head).to_string(), value);
        return Ok(());
    }
    let child = map.entry((*head).to_string()).or_insert_with(|| Value::Object(Map::new()));
    if !child.is_object() {
        return Err(CodecError::Conflict((*head).to_string()));
    }
    insert_path(child, rest, value)
}

/// Walk the tree bottom-up and turn any object whose keys are exactly
/// `"0".."n-1"` into an array.
fn rewrite_numeric_maps(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let rewritten: Map<String, Value> =
                map.into_iter().map(|(k, v)| (k, rewrite_numeric_maps(v))).collect();
            if is_dense_index_map(&rewritten) {
                let mut items = vec![Value::Null; rewritten.len()];
                for (k, v) in rewritten {
                    let index: usize = k.parse().expect("checked by is_dense_index_map");
                    items[index] = v;
                }
                Value::Array(items)
            } else {
                Value::Object(rewritten)
            }
        }
        Value::Array(items) => Value::Array(items.into_iter().map(rewrite_numeric_maps).collect()),
        other => other,
    }
}

fn is_dense_index_map(map: &Map<String, Value>) -> bool {
    !map.is_empty() && (0..map.len()).all(|i| map.contains_key(&i.to_string()))
}

/// Legacy coercion pass: reinterpret bare (unprefixed) numeric-looking
/// strings in a flat map as numbers.
///
/// Kept for plugins written against older workflow documents that never
/// adopted the `#i#`/`#f#` prefixes and instead rely on the receiving side
/// to guess. Prefixed values are decoded normally; this only affects plain
/// strings that happen to parse as a number.
pub fn convert_numeric_strings(map: &HashMap<String, String>) -> HashMap<String, Value> {
    map.iter()
        .map(|(k, raw)| {
            let decoded = decode_scalar(raw);
            let coerced = match decoded {
                Value::String(s) => s
                    .parse::<i64>()
                    .map(Value::from)
                    .or_else(|_| s.parse::<f64>().map(|f| Number::from_f64(f).map(Value::Number).unwrap_or(Value::String(s.clone()))))
                    .unwrap_or(Value::String(s)),
                other => other,
            };
            (k.clone(), coerced)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flatten_nested_object_and_array() {
        let value = json!({
            "user": {"name": "ada", "age": 30},
            "tags": ["x", "y"],
        });
        let flat = flatten(&value);
        assert_eq!(flat.get("user__name"), Some(&"ada".to_string()));
        assert_eq!(flat.get("user__age"), Some(&"#i#30".to_string()));
        assert_eq!(flat.get("tags__0"), Some(&"x".to_string()));
        assert_eq!(flat.get("tags__1"), Some(&"y".to_string()));
    }

    #[test]
    fn round_trips_nested_object_and_array() {
        let value = json!({
            "user": {"name": "ada", "age": 30, "active": true},
            "tags": ["x", "y"],
            "note": null,
        });
        let flat = flatten(&value);
        let back = unflatten(&flat).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn round_trips_floats_and_negative_ints() {
        let value = json!({"ratio": 0.5, "delta": -12});
        let flat = flatten(&value);
        let back = unflatten(&flat).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn top_level_array_wraps_in_array_root() {
        let value = json!(["a", "b", "c"]);
        let flat = flatten(&value);
        let back = unflatten(&flat).unwrap();
        assert_eq!(back, json!({"__array_root": ["a", "b", "c"]}));
    }

    #[test]
    fn malformed_prefixed_value_falls_back_to_raw_string() {
        let mut map = HashMap::new();
        map.insert("n".to_string(), "#i#not-a-number".to_string());
        let back = unflatten(&map).unwrap();
        assert_eq!(back, json!({"n": "not-a-number"}));
    }

    #[test]
    fn conflicting_paths_are_rejected() {
        let mut map = HashMap::new();
        map.insert("a".to_string(), "scalar".to_string());
        map.insert("a__b".to_string(), "nested".to_string());
        let err = unflatten(&map).unwrap_err();
        assert_eq!(err, CodecError::Conflict("a".to_string()));
    }

    #[test]
    fn empty_map_unflattens_to_empty_object() {
        let map = HashMap::new();
        assert_eq!(unflatten(&map).unwrap(), json!({}));
    }

    #[test]
    fn no_flattened_key_is_a_strict_prefix_of_another() {
        let value = json!({"a": {"b": 1}, "ab": 2});
        let flat = flatten(&value);
        let keys: Vec<&String> = flat.keys().collect();
        for k in &keys {
            for other in &keys {
                if k != other {
                    assert!(!other.starts_with(k.as_str()) || !other[k.len()..].starts_with("__"));
                }
            }
        }
    }

    #[test]
    fn convert_numeric_strings_coerces_unprefixed_numbers() {
        let mut map = HashMap::new();
        map.insert("count".to_string(), "42".to_string());
        map.insert("name".to_string(), "ada".to_string());
        map.insert("typed".to_string(), "#i#7".to_string());
        let out = convert_numeric_strings(&map);
        assert_eq!(out["count"], json!(42));
        assert_eq!(out["name"], json!("ada"));
        assert_eq!(out["typed"], json!(7));
    }
}
