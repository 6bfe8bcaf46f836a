//! Expression evaluation against a JSON `env`.

use serde_json::Value;

use crate::ast::{BinOp, Expr, PathSegment, UnaryOp};

/// The result of evaluating a sub-expression.
///
/// `Missing` is distinct from `Value::Null`: it marks a path that doesn't
/// resolve in `env` at all, per spec's "referencing an undefined path
/// returns a typed missing value" rule. It is falsy, compares false against
/// everything, and is absorbed by `??`.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalValue {
    Missing,
    Value(Value),
}

impl EvalValue {
    pub fn is_truthy(&self) -> bool {
        match self {
            EvalValue::Missing => false,
            EvalValue::Value(Value::Null) => false,
            EvalValue::Value(Value::Bool(b)) => *b,
            EvalValue::Value(Value::String(s)) => !s.is_empty(),
            EvalValue::Value(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
            EvalValue::Value(Value::Array(a)) => !a.is_empty(),
            EvalValue::Value(Value::Object(o)) => !o.is_empty(),
        }
    }

    /// Textual form used when substituting into a template.
    pub fn to_display_string(&self) -> String {
        match self {
            EvalValue::Missing => String::new(),
            EvalValue::Value(Value::Null) => String::new(),
            EvalValue::Value(Value::String(s)) => s.clone(),
            EvalValue::Value(Value::Bool(b)) => b.to_string(),
            EvalValue::Value(Value::Number(n)) => n.to_string(),
            EvalValue::Value(other) => other.to_string(),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            EvalValue::Value(Value::Number(n)) => n.as_f64(),
            _ => None,
        }
    }

    fn as_str(&self) -> Option<&str> {
        match self {
            EvalValue::Value(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    fn is_missing(&self) -> bool {
        matches!(self, EvalValue::Missing)
    }
}

pub fn eval(expr: &Expr, env: &Value) -> EvalValue {
    match expr {
        Expr::Null => EvalValue::Value(Value::Null),
        Expr::Bool(b) => EvalValue::Value(Value::Bool(*b)),
        Expr::Int(i) => EvalValue::Value(Value::from(*i)),
        Expr::Float(f) => EvalValue::Value(serde_json::Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null)),
        Expr::Str(s) => EvalValue::Value(Value::String(s.clone())),
        Expr::Path(segments) => eval_path(segments, env),
        Expr::Unary(op, inner) => eval_unary(*op, eval(inner, env)),
        Expr::Binary(op, lhs, rhs) => eval_binary(*op, eval(lhs, env), eval(rhs, env)),
        Expr::Ternary(cond, then_branch, else_branch) => {
            if eval(cond, env).is_truthy() {
                eval(then_branch, env)
            } else {
                eval(else_branch, env)
            }
        }
        Expr::Coalesce(lhs, rhs) => {
            let left = eval(lhs, env);
            match &left {
                EvalValue::Missing | EvalValue::Value(Value::Null) => eval(rhs, env),
                _ => left,
            }
        }
        Expr::Call(receiver, method, args) => {
            let recv = eval(receiver, env);
            let arg_values: Vec<EvalValue> = args.iter().map(|a| eval(a, env)).collect();
            eval_call(&recv, method, &arg_values)
        }
    }
}

fn eval_path(segments: &[PathSegment], env: &Value) -> EvalValue {
    let mut current = env;
    for segment in segments {
        match (current, segment) {
            (Value::Object(map), PathSegment::Field(name)) => match map.get(name) {
                Some(v) => current = v,
                None => return EvalValue::Missing,
            },
            (Value::Array(items), PathSegment::Index(i)) => {
                let idx = if *i < 0 { return EvalValue::Missing } else { *i as usize };
                match items.get(idx) {
                    Some(v) => current = v,
                    None => return EvalValue::Missing,
                }
            }
            _ => return EvalValue::Missing,
        }
    }
    EvalValue::Value(current.clone())
}

fn eval_unary(op: UnaryOp, operand: EvalValue) -> EvalValue {
    match op {
        UnaryOp::Not => EvalValue::Value(Value::Bool(!operand.is_truthy())),
        UnaryOp::Neg => match operand.as_f64() {
            Some(n) => EvalValue::Value(
                serde_json::Number::from_f64(-n).map(Value::Number).unwrap_or(Value::Null),
            ),
            None => EvalValue::Missing,
        },
    }
}

fn eval_binary(op: BinOp, lhs: EvalValue, rhs: EvalValue) -> EvalValue {
    match op {
        BinOp::And => EvalValue::Value(Value::Bool(lhs.is_truthy() && rhs.is_truthy())),
        BinOp::Or => EvalValue::Value(Value::Bool(lhs.is_truthy() || rhs.is_truthy())),
        BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            eval_comparison(op, &lhs, &rhs)
        }
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => eval_arithmetic(op, &lhs, &rhs),
    }
}

/// Any comparison involving a missing operand is false, per spec.
fn eval_comparison(op: BinOp, lhs: &EvalValue, rhs: &EvalValue) -> EvalValue {
    if lhs.is_missing() || rhs.is_missing() {
        return EvalValue::Value(Value::Bool(false));
    }
    let result = match (lhs.as_f64(), rhs.as_f64()) {
        (Some(a), Some(b)) => compare_ordered(op, a.partial_cmp(&b)),
        _ => match (lhs.as_str(), rhs.as_str()) {
            (Some(a), Some(b)) => compare_ordered(op, a.partial_cmp(b)),
            _ => match op {
                BinOp::Eq => lhs_eq_rhs(lhs, rhs),
                BinOp::Ne => !lhs_eq_rhs(lhs, rhs),
                _ => false,
            },
        },
    };
    EvalValue::Value(Value::Bool(result))
}

fn lhs_eq_rhs(lhs: &EvalValue, rhs: &EvalValue) -> bool {
    match (lhs, rhs) {
        (EvalValue::Value(a), EvalValue::Value(b)) => a == b,
        _ => false,
    }
}

fn compare_ordered(op: BinOp, ordering: Option<std::cmp::Ordering>) -> bool {
    use std::cmp::Ordering::*;
    match (op, ordering) {
        (BinOp::Eq, Some(Equal)) => true,
        (BinOp::Ne, Some(o)) => o != Equal,
        (BinOp::Lt, Some(Less)) => true,
        (BinOp::Le, Some(Less | Equal)) => true,
        (BinOp::Gt, Some(Greater)) => true,
        (BinOp::Ge, Some(Greater | Equal)) => true,
        _ => false,
    }
}

fn eval_arithmetic(op: BinOp, lhs: &EvalValue, rhs: &EvalValue) -> EvalValue {
    let (Some(a), Some(b)) = (lhs.as_f64(), rhs.as_f64()) else {
        return EvalValue::Missing;
    };
    let result = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a / b,
        _ => unreachable!("eval_arithmetic only called for arithmetic ops"),
    };
    EvalValue::Value(serde_json::Number::from_f64(result).map(Value::Number).unwrap_or(Value::Null))
}

fn eval_call(receiver: &EvalValue, method: &str, args: &[EvalValue]) -> EvalValue {
    match method {
        "length" => match receiver {
            EvalValue::Value(Value::String(s)) => EvalValue::Value(Value::from(s.chars().count())),
            EvalValue::Value(Value::Array(a)) => EvalValue::Value(Value::from(a.len())),
            EvalValue::Value(Value::Object(o)) => EvalValue::Value(Value::from(o.len())),
            _ => EvalValue::Missing,
        },
        "contains" => {
            let Some(needle) = args.first() else { return EvalValue::Missing };
            match receiver {
                EvalValue::Value(Value::String(s)) => match needle.as_str() {
                    Some(sub) => EvalValue::Value(Value::Bool(s.contains(sub))),
                    None => EvalValue::Missing,
                },
                EvalValue::Value(Value::Array(items)) => {
                    let EvalValue::Value(needle_value) = needle else {
                        return EvalValue::Value(Value::Bool(false));
                    };
                    EvalValue::Value(Value::Bool(items.contains(needle_value)))
                }
                _ => EvalValue::Missing,
            }
        }
        "upper" => match receiver.as_str() {
            Some(s) => EvalValue::Value(Value::String(s.to_uppercase())),
            None => EvalValue::Missing,
        },
        "lower" => match receiver.as_str() {
            Some(s) => EvalValue::Value(Value::String(s.to_lowercase())),
            None => EvalValue::Missing,
        },
        "trim" => match receiver.as_str() {
            Some(s) => EvalValue::Value(Value::String(s.trim().to_string())),
            None => EvalValue::Missing,
        },
        "join" => {
            let EvalValue::Value(Value::Array(items)) = receiver else {
                return EvalValue::Missing;
            };
            let sep = args.first().and_then(|a| a.as_str()).unwrap_or(",");
            let parts: Vec<String> = items.iter().map(|v| EvalValue::Value(v.clone()).to_display_string()).collect();
            EvalValue::Value(Value::String(parts.join(sep)))
        }
        _ => EvalValue::Missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use serde_json::json;

    fn eval_src(src: &str, env: &Value) -> EvalValue {
        eval(&parse(src).unwrap(), env)
    }

    #[test]
    fn missing_path_is_falsy_and_coalesces() {
        let env = json!({});
        assert!(!eval_src("vars.missing", &env).is_truthy());
        assert_eq!(eval_src("vars.missing ?? \"d\"", &env), EvalValue::Value(json!("d")));
    }

    #[test]
    fn null_empty_zero_and_missing_are_falsy() {
        let env = json!({"n": null, "s": "", "z": 0});
        for src in ["n", "s", "z", "missing"] {
            assert!(!eval_src(src, &env).is_truthy(), "{src} should be falsy");
        }
    }

    #[test]
    fn comparisons_against_missing_are_false() {
        let env = json!({"a": 1});
        assert_eq!(eval_src("a == missing", &env), EvalValue::Value(json!(false)));
        assert_eq!(eval_src("a < missing", &env), EvalValue::Value(json!(false)));
    }

    #[test]
    fn arithmetic_and_comparison() {
        let env = json!({});
        assert_eq!(eval_src("1 + 2 * 3", &env), EvalValue::Value(json!(9.0)));
        assert_eq!(eval_src("(1 + 2) * 3", &env), EvalValue::Value(json!(9.0)));
        assert_eq!(eval_src("5 > 3", &env), EvalValue::Value(json!(true)));
    }

    #[test]
    fn builtin_methods() {
        let env = json!({"name": "  Ada  ", "tags": ["a", "b"]});
        assert_eq!(eval_src("name.trim()", &env), EvalValue::Value(json!("Ada")));
        assert_eq!(eval_src("name.trim().upper()", &env), EvalValue::Value(json!("ADA")));
        assert_eq!(eval_src("tags.length()", &env), EvalValue::Value(json!(2)));
        assert_eq!(eval_src("tags.contains(\"a\")", &env), EvalValue::Value(json!(true)));
        assert_eq!(eval_src("tags.join(\"-\")", &env), EvalValue::Value(json!("a-b")));
    }

    #[test]
    fn ternary_picks_branch() {
        let env = json!({"score": 10});
        assert_eq!(eval_src("score > 5 ? \"big\" : \"small\"", &env), EvalValue::Value(json!("big")));
    }
}
