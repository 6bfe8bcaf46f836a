//! Recursive-descent parser over `winnow` combinators.
//!
//! Precedence, loosest to tightest: ternary `?:`, nil-coalescing `??`,
//! `||`, `&&`, equality, comparison, additive, multiplicative, unary,
//! postfix (method calls, indexing), primary. Each level is its own
//! function, in the style `k0mmand3r` (the pack's other winnow-based
//! embedded DSL) uses for its command grammar.

use winnow::ascii::{digit1, multispace0};
use winnow::combinator::{alt, cut_err, opt, preceded, separated};
use winnow::error::{ContextError, ErrMode};
use winnow::token::{literal, one_of, take_while};
use winnow::Parser;

use crate::ast::{BinOp, Expr, PathSegment, UnaryOp};

type PResult<O> = Result<O, ErrMode<ContextError>>;

pub fn parse(src: &str) -> Result<Expr, String> {
    let mut input = src;
    ws(&mut input);
    let expr = ternary(&mut input).map_err(|e| format!("expression parse error: {e}"))?;
    ws(&mut input);
    if !input.is_empty() {
        return Err(format!("unexpected trailing input: {input:?}"));
    }
    Ok(expr)
}

fn ws(input: &mut &str) {
    let _ = multispace0::<_, ErrMode<ContextError>>.parse_next(input);
}

/// Matches a fixed operator/punctuation token, skipping surrounding
/// whitespace.
fn punct<'a>(sym: &'static str) -> impl FnMut(&mut &'a str) -> PResult<&'a str> {
    move |input: &mut &'a str| {
        ws(input);
        let out = literal(sym).parse_next(input)?;
        ws(input);
        Ok(out)
    }
}

/// Matches a keyword (`true`/`false`/`null`), refusing to match when it's
/// actually a prefix of a longer identifier (`truely`).
fn keyword<'a>(word: &'static str) -> impl FnMut(&mut &'a str) -> PResult<()> {
    move |input: &mut &'a str| {
        ws(input);
        let checkpoint = *input;
        literal(word).parse_next(input)?;
        if matches!(input.chars().next(), Some(c) if c.is_alphanumeric() || c == '_') {
            *input = checkpoint;
            return Err(ErrMode::Backtrack(ContextError::new()));
        }
        ws(input);
        Ok(())
    }
}

// --- precedence ladder, loosest to tightest ---

fn ternary(input: &mut &str) -> PResult<Expr> {
    let cond = coalesce(input)?;
    if opt(punct("?")).parse_next(input)?.is_some() {
        let then_branch = cut_err(ternary).parse_next(input)?;
        cut_err(punct(":")).parse_next(input)?;
        let else_branch = cut_err(ternary).parse_next(input)?;
        Ok(Expr::Ternary(Box::new(cond), Box::new(then_branch), Box::new(else_branch)))
    } else {
        Ok(cond)
    }
}

fn coalesce(input: &mut &str) -> PResult<Expr> {
    let mut lhs = or_expr(input)?;
    while opt(punct("??")).parse_next(input)?.is_some() {
        let rhs = or_expr(input)?;
        lhs = Expr::Coalesce(Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
}

fn or_expr(input: &mut &str) -> PResult<Expr> {
    let mut lhs = and_expr(input)?;
    while opt(punct("||")).parse_next(input)?.is_some() {
        let rhs = and_expr(input)?;
        lhs = Expr::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
}

fn and_expr(input: &mut &str) -> PResult<Expr> {
    let mut lhs = equality(input)?;
    while opt(punct("&&")).parse_next(input)?.is_some() {
        let rhs = equality(input)?;
        lhs = Expr::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
}

fn equality(input: &mut &str) -> PResult<Expr> {
    let mut lhs = comparison(input)?;
    loop {
        match opt(alt((punct("=="), punct("!=")))).parse_next(input)? {
            Some(sym) => {
                let rhs = comparison(input)?;
                let op = if sym == "==" { BinOp::Eq } else { BinOp::Ne };
                lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
            }
            None => break,
        }
    }
    Ok(lhs)
}

fn comparison(input: &mut &str) -> PResult<Expr> {
    let mut lhs = additive(input)?;
    loop {
        // longest-match first so `<=`/`>=` don't get split into `<`/`=`.
        match opt(alt((punct("<="), punct(">="), punct("<"), punct(">")))).parse_next(input)? {
            Some(sym) => {
                let rhs = additive(input)?;
                let op = match sym {
                    "<=" => BinOp::Le,
                    ">=" => BinOp::Ge,
                    "<" => BinOp::Lt,
                    _ => BinOp::Gt,
                };
                lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
            }
            None => break,
        }
    }
    Ok(lhs)
}

fn additive(input: &mut &str) -> PResult<Expr> {
    let mut lhs = multiplicative(input)?;
    loop {
        match opt(alt((punct("+"), punct("-")))).parse_next(input)? {
            Some(sym) => {
                let rhs = multiplicative(input)?;
                let op = if sym == "+" { BinOp::Add } else { BinOp::Sub };
                lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
            }
            None => break,
        }
    }
    Ok(lhs)
}

fn multiplicative(input: &mut &str) -> PResult<Expr> {
    let mut lhs = unary(input)?;
    loop {
        match opt(alt((punct("*"), punct("/")))).parse_next(input)? {
            Some(sym) => {
                let rhs = unary(input)?;
                let op = if sym == "*" { BinOp::Mul } else { BinOp::Div };
                lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
            }
            None => break,
        }
    }
    Ok(lhs)
}

fn unary(input: &mut &str) -> PResult<Expr> {
    if opt(punct("!")).parse_next(input)?.is_some() {
        return Ok(Expr::Unary(UnaryOp::Not, Box::new(unary(input)?)));
    }
    if opt(punct("-")).parse_next(input)?.is_some() {
        return Ok(Expr::Unary(UnaryOp::Neg, Box::new(unary(input)?)));
    }
    postfix(input)
}

fn postfix(input: &mut &str) -> PResult<Expr> {
    let mut expr = primary(input)?;
    loop {
        if opt(punct(".")).parse_next(input)?.is_some() {
            let name = cut_err(ident).parse_next(input)?;
            if opt(punct("(")).parse_next(input)?.is_some() {
                let args: Vec<Expr> = separated(0.., ternary, punct(",")).parse_next(input)?;
                cut_err(punct(")")).parse_next(input)?;
                expr = Expr::Call(Box::new(expr), name, args);
            } else {
                expr = match expr {
                    Expr::Path(mut segs) => {
                        segs.push(PathSegment::Field(name));
                        Expr::Path(segs)
                    }
                    other => Expr::Call(Box::new(other), name, vec![]),
                };
            }
            continue;
        }
        if opt(punct("[")).parse_next(input)?.is_some() {
            let idx = cut_err(integer).parse_next(input)?;
            cut_err(punct("]")).parse_next(input)?;
            if let Expr::Path(mut segs) = expr {
                segs.push(PathSegment::Index(idx));
                expr = Expr::Path(segs);
            }
            continue;
        }
        break;
    }
    Ok(expr)
}

fn primary(input: &mut &str) -> PResult<Expr> {
    ws(input);
    alt((
        parenthesized,
        string_literal.map(Expr::Str),
        number_literal,
        keyword("true").map(|_| Expr::Bool(true)),
        keyword("false").map(|_| Expr::Bool(false)),
        keyword("null").map(|_| Expr::Null),
        ident.map(|name| Expr::Path(vec![PathSegment::Field(name)])),
    ))
    .parse_next(input)
}

fn parenthesized(input: &mut &str) -> PResult<Expr> {
    punct("(").parse_next(input)?;
    let inner = cut_err(ternary).parse_next(input)?;
    cut_err(punct(")")).parse_next(input)?;
    Ok(inner)
}

fn ident(input: &mut &str) -> PResult<String> {
    ws(input);
    let head = one_of(|c: char| c.is_alphabetic() || c == '_').parse_next(input)?;
    let tail: &str = take_while(0.., |c: char| c.is_alphanumeric() || c == '_').parse_next(input)?;
    let mut name = String::new();
    name.push(head);
    name.push_str(tail);
    ws(input);
    Ok(name)
}

fn integer(input: &mut &str) -> PResult<i64> {
    ws(input);
    let neg = opt(one_of('-')).parse_next(input)?.is_some();
    let digits = digit1.parse_next(input)?;
    let value: i64 = digits.parse().map_err(|_| ErrMode::Cut(ContextError::new()))?;
    ws(input);
    Ok(if neg { -value } else { value })
}

fn number_literal(input: &mut &str) -> PResult<Expr> {
    ws(input);
    let neg = opt(one_of('-')).parse_next(input)?.is_some();
    let int_part: &str = digit1.parse_next(input)?;
    let frac_part: Option<&str> = opt(preceded(one_of('.'), digit1)).parse_next(input)?;
    ws(input);
    match frac_part {
        Some(frac) => {
            let text = format!("{int_part}.{frac}");
            let value: f64 = text.parse().map_err(|_| ErrMode::Cut(ContextError::new()))?;
            Ok(Expr::Float(if neg { -value } else { value }))
        }
        None => {
            let value: i64 = int_part.parse().map_err(|_| ErrMode::Cut(ContextError::new()))?;
            Ok(Expr::Int(if neg { -value } else { value }))
        }
    }
}

fn string_literal(input: &mut &str) -> PResult<String> {
    ws(input);
    literal("\"").parse_next(input)?;
    let mut out = String::new();
    loop {
        let Some(c) = input.chars().next() else {
            return Err(ErrMode::Cut(ContextError::new()));
        };
        match c {
            '"' => {
                *input = &input[1..];
                break;
            }
            '\\' => {
                *input = &input[1..];
                let Some(escaped) = input.chars().next() else {
                    return Err(ErrMode::Cut(ContextError::new()));
                };
                out.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    other => other,
                });
                *input = &input[escaped.len_utf8()..];
            }
            other => {
                out.push(other);
                *input = &input[other.len_utf8()..];
            }
        }
    }
    ws(input);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_path() {
        assert_eq!(
            parse("outputs.job1.x").unwrap(),
            Expr::Path(vec![
                PathSegment::Field("outputs".into()),
                PathSegment::Field("job1".into()),
                PathSegment::Field("x".into()),
            ])
        );
    }

    #[test]
    fn parses_index_path() {
        assert_eq!(
            parse("steps[0].res.status").unwrap(),
            Expr::Path(vec![
                PathSegment::Field("steps".into()),
                PathSegment::Index(0),
                PathSegment::Field("res".into()),
                PathSegment::Field("status".into()),
            ])
        );
    }

    #[test]
    fn parses_ternary_and_coalesce() {
        parse("a ?? \"d\"").unwrap();
        parse("a > 1 ? \"big\" : \"small\"").unwrap();
    }

    #[test]
    fn parses_method_call() {
        let expr = parse("vars.name.upper()").unwrap();
        match expr {
            Expr::Call(_, name, args) => {
                assert_eq!(name, "upper");
                assert!(args.is_empty());
            }
            other => panic!("expected Call, got {other:?}"),
        }
    }

    #[test]
    fn comparison_precedes_equality() {
        // `a < b == c` should parse as `(a < b) == c`, not `a < (b == c)`.
        let expr = parse("a < b == c").unwrap();
        match expr {
            Expr::Binary(BinOp::Eq, lhs, _) => {
                assert!(matches!(*lhs, Expr::Binary(BinOp::Lt, _, _)));
            }
            other => panic!("expected top-level Eq, got {other:?}"),
        }
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(parse("1 + 2 )").is_err());
    }
}
