//! One-shot evaluation of a workflow's `vars` block against the process
//! environment, and the process-environment snapshot itself.

use std::collections::HashMap;

use serde_json::{json, Map, Value};
use wfe_core::Result;

/// Snapshot `std::env::vars()` into a JSON object, bound as `env` wherever
/// expressions evaluate.
pub fn process_env_value() -> Value {
    let map: Map<String, Value> = std::env::vars().map(|(k, v)| (k, Value::String(v))).collect();
    Value::Object(map)
}

/// Evaluate every `vars` entry once, each against `{"env": process_env}`
/// only — vars do not see each other, so declaration order never matters.
pub fn eval_vars(raw: &HashMap<String, String>, process_env: &Value) -> Result<Value> {
    let env = json!({ "env": process_env });
    let mut evaluated = Map::with_capacity(raw.len());
    for (name, expr_src) in raw {
        let expr = wfe_expr::parse(expr_src)?;
        let value = match wfe_expr::eval(&expr, &env) {
            wfe_expr::EvalValue::Value(v) => v,
            wfe_expr::EvalValue::Missing => Value::Null,
        };
        evaluated.insert(name.clone(), value);
    }
    Ok(Value::Object(evaluated))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_literal_vars() {
        let raw = HashMap::from([("greeting".to_string(), "\"hello\"".to_string())]);
        let out = eval_vars(&raw, &json!({})).unwrap();
        assert_eq!(out["greeting"], json!("hello"));
    }

    #[test]
    fn vars_can_read_process_env() {
        let raw = HashMap::from([("home".to_string(), "env.HOME".to_string())]);
        let env = json!({"HOME": "/root"});
        let out = eval_vars(&raw, &env).unwrap();
        assert_eq!(out["home"], json!("/root"));
    }

    #[test]
    fn missing_env_var_evaluates_to_null() {
        let raw = HashMap::from([("ghost".to_string(), "env.DOES_NOT_EXIST".to_string())]);
        let out = eval_vars(&raw, &json!({})).unwrap();
        assert_eq!(out["ghost"], Value::Null);
    }
}
