//! `{expr}` template substitution over strings and nested JSON maps.

use serde_json::Value;
use wfe_core::{Error, Result};

use crate::eval::eval;
use crate::parser::parse;

/// Substitute every `{expr}` in `s` with the string form of its evaluation
/// against `env`. A doubled brace (`{{`, `}}`) is a literal brace.
pub fn eval_template(s: &str, env: &Value) -> Result<String> {
    let mut out = String::new();
    let mut rest = s;
    while !rest.is_empty() {
        let c = rest.chars().next().expect("rest is non-empty");
        match c {
            '{' if rest[1..].starts_with('{') => {
                out.push('{');
                rest = &rest[2..];
            }
            '{' => {
                let body_start = 1;
                let Some(end) = rest[body_start..].find('}') else {
                    return Err(Error::Expr(format!("unterminated template expression in {s:?}")));
                };
                let expr_src = &rest[body_start..body_start + end];
                let expr = parse(expr_src).map_err(Error::Expr)?;
                out.push_str(&eval(&expr, env).to_display_string());
                rest = &rest[body_start + end + 1..];
            }
            '}' if rest[1..].starts_with('}') => {
                out.push('}');
                rest = &rest[2..];
            }
            other => {
                out.push(other);
                rest = &rest[other.len_utf8()..];
            }
        }
    }
    Ok(out)
}

/// Recursively walk a JSON value: every string leaf passes through
/// [`eval_template`], non-string leaves and keys are unchanged.
pub fn eval_template_map(value: &Value, env: &Value) -> Result<Value> {
    match value {
        Value::String(s) => Ok(Value::String(eval_template(s, env)?)),
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), eval_template_map(v, env)?);
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(eval_template_map(item, env)?);
            }
            Ok(Value::Array(out))
        }
        other => Ok(other.clone()),
    }
}

/// Evaluate `expr_src` against `env` and apply the engine's truthy policy.
pub fn eval_bool(expr_src: &str, env: &Value) -> Result<bool> {
    let expr = parse(expr_src).map_err(Error::Expr)?;
    Ok(eval(&expr, env).is_truthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn substitutes_single_expression() {
        let env = json!({"a": "world"});
        assert_eq!(eval_template("hello {a}", &env).unwrap(), "hello world");
    }

    #[test]
    fn concatenates_around_expression() {
        let env = json!({"a": 1});
        assert_eq!(eval_template("x{a}y", &env).unwrap(), "x1y");
    }

    #[test]
    fn doubled_braces_are_literal() {
        let env = json!({});
        assert_eq!(eval_template("{{literal}}", &env).unwrap(), "{literal}");
    }

    #[test]
    fn template_map_recurses_and_skips_keys() {
        let env = json!({"name": "ada"});
        let input = json!({"{name}": "hi {name}", "n": 5, "list": ["{name}"]});
        let out = eval_template_map(&input, &env).unwrap();
        assert_eq!(out, json!({"{name}": "hi ada", "n": 5, "list": ["ada"]}));
    }

    #[test]
    fn eval_bool_truthy_policy() {
        let env = json!({"s": "", "n": 0, "ok": true});
        assert!(!eval_bool("s", &env).unwrap());
        assert!(!eval_bool("n", &env).unwrap());
        assert!(eval_bool("ok", &env).unwrap());
        assert!(eval_bool("missing ?? true", &env).unwrap());
    }

    #[test]
    fn unterminated_expression_errors() {
        let env = json!({});
        assert!(eval_template("hello {a", &env).is_err());
    }
}
