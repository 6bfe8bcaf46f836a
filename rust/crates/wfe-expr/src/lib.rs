//! Embedded expression language: parses and evaluates the `{expr}`
//! templates used in `if`, `test`, `until`, and `outputs`.
//!
//! Three entry points mirror the engine's needs directly:
//! - [`eval_template`] substitutes `{expr}` inside a string.
//! - [`eval_template_map`] walks a whole JSON value, templating every
//!   string leaf.
//! - [`eval_bool`] evaluates an expression under the engine's truthy
//!   policy.

mod ast;
mod eval;
mod parser;
mod template;

pub use ast::{BinOp, Expr, PathSegment, UnaryOp};
pub use eval::EvalValue;
pub use template::{eval_bool, eval_template, eval_template_map};

/// Parse a standalone expression, without the `{}` template delimiters.
pub fn parse(src: &str) -> wfe_core::Result<Expr> {
    parser::parse(src).map_err(wfe_core::Error::Expr)
}

/// Evaluate an already-parsed expression against `env`.
pub fn eval(expr: &Expr, env: &serde_json::Value) -> EvalValue {
    eval::eval(expr, env)
}
