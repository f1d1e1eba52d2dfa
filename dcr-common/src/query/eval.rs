//! Expression evaluation
//!
//! Evaluation is loose in the way filter expressions are usually written by
//! hand: `bucket == "3"` matches a numeric 3, `&&`/`||` return one of their
//! operands, and any value can be tested for truthiness. Identifiers are
//! looked up through a caller-supplied resolver, so nothing outside the
//! record being tested is reachable from an expression.

use super::parser::{Expr, Op};
use crate::model::{format_number, FieldValue};

/// Runtime value of a sub-expression
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Bool(bool),
    Null,
}

impl Value {
    /// `0`, `NaN`, `""`, `false` and `null` are falsy; everything else is truthy
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Text(s) => !s.is_empty(),
            Value::Bool(b) => *b,
            Value::Null => false,
        }
    }

    /// Numeric view; unparseable text is `NaN`, blank text and null are `0`
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            Value::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Null => 0.0,
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            Value::Number(n) => format_number(*n),
            Value::Text(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Null => "null".to_string(),
        }
    }
}

impl From<&FieldValue> for Value {
    fn from(value: &FieldValue) -> Self {
        match value {
            FieldValue::Number(n) => Value::Number(*n),
            FieldValue::Text(s) => Value::Text(s.clone()),
        }
    }
}

/// Evaluate `expr`, resolving identifiers through `resolve`
///
/// An identifier the resolver does not know is an error, not null.
pub fn evaluate<F>(expr: &Expr, resolve: &F) -> Result<Value, String>
where
    F: Fn(&str) -> Option<Value>,
{
    match expr {
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::Text(s) => Ok(Value::Text(s.clone())),
        Expr::Boolean(b) => Ok(Value::Bool(*b)),
        Expr::Null => Ok(Value::Null),
        Expr::Ident(name) => resolve(name).ok_or_else(|| format!("{} is not defined", name)),
        Expr::Not(inner) => Ok(Value::Bool(!evaluate(inner, resolve)?.is_truthy())),
        Expr::Negate(inner) => Ok(Value::Number(-evaluate(inner, resolve)?.to_number())),
        Expr::BinaryOp { op, left, right } => evaluate_binary(*op, left, right, resolve),
        Expr::Function { name, args } => {
            let values = args
                .iter()
                .map(|arg| evaluate(arg, resolve))
                .collect::<Result<Vec<_>, _>>()?;
            call_function(name, &values)
        }
    }
}

fn evaluate_binary<F>(op: Op, left: &Expr, right: &Expr, resolve: &F) -> Result<Value, String>
where
    F: Fn(&str) -> Option<Value>,
{
    // Short-circuit operators only evaluate the right side when needed
    let l = evaluate(left, resolve)?;
    match op {
        Op::And if !l.is_truthy() => return Ok(l),
        Op::Or if l.is_truthy() => return Ok(l),
        Op::And | Op::Or => return evaluate(right, resolve),
        _ => {}
    }
    let r = evaluate(right, resolve)?;

    Ok(arithmetic_or_comparison(op, l, r))
}

fn arithmetic_or_comparison(op: Op, l: Value, r: Value) -> Value {
    match op {
        Op::Eq => Value::Bool(loose_equals(&l, &r)),
        Op::NotEq => Value::Bool(!loose_equals(&l, &r)),
        Op::StrictEq => Value::Bool(strict_equals(&l, &r)),
        Op::StrictNotEq => Value::Bool(!strict_equals(&l, &r)),
        Op::Lt => Value::Bool(compare(&l, &r, |o| o.is_lt())),
        Op::LtEq => Value::Bool(compare(&l, &r, |o| o.is_le())),
        Op::Gt => Value::Bool(compare(&l, &r, |o| o.is_gt())),
        Op::GtEq => Value::Bool(compare(&l, &r, |o| o.is_ge())),
        Op::Add => match (&l, &r) {
            (Value::Text(_), _) | (_, Value::Text(_)) => {
                Value::Text(format!("{}{}", l.to_text(), r.to_text()))
            }
            _ => Value::Number(l.to_number() + r.to_number()),
        },
        Op::Sub => Value::Number(l.to_number() - r.to_number()),
        Op::Mul => Value::Number(l.to_number() * r.to_number()),
        Op::Div => Value::Number(l.to_number() / r.to_number()),
        Op::Rem => Value::Number(l.to_number() % r.to_number()),
        // Short-circuited in evaluate_binary
        Op::And => Value::Bool(l.is_truthy() && r.is_truthy()),
        Op::Or => Value::Bool(l.is_truthy() || r.is_truthy()),
    }
}

/// `==`: numbers, numeric strings and booleans compare by value; null only
/// equals null
fn loose_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Text(x), Value::Text(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        _ => a.to_number() == b.to_number(),
    }
}

/// `===`: same kind and same value
fn strict_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::Text(x), Value::Text(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Null, Value::Null) => true,
        _ => false,
    }
}

/// Relational comparison: lexicographic when both sides are text, numeric
/// otherwise; any comparison involving `NaN` is false
fn compare(a: &Value, b: &Value, accept: impl Fn(std::cmp::Ordering) -> bool) -> bool {
    if let (Value::Text(x), Value::Text(y)) = (a, b) {
        return accept(x.cmp(y));
    }
    a.to_number()
        .partial_cmp(&b.to_number())
        .map_or(false, accept)
}

fn call_function(name: &str, args: &[Value]) -> Result<Value, String> {
    let expect_args = |count: usize| -> Result<(), String> {
        if args.len() == count {
            Ok(())
        } else {
            Err(format!(
                "{}() expects {} argument(s), got {}",
                name,
                count,
                args.len()
            ))
        }
    };

    match name {
        "contains" | "includes" => {
            expect_args(2)?;
            Ok(Value::Bool(args[0].to_text().contains(&args[1].to_text())))
        }
        "startswith" => {
            expect_args(2)?;
            Ok(Value::Bool(args[0].to_text().starts_with(&args[1].to_text())))
        }
        "endswith" => {
            expect_args(2)?;
            Ok(Value::Bool(args[0].to_text().ends_with(&args[1].to_text())))
        }
        "lower" | "lowercase" => {
            expect_args(1)?;
            Ok(Value::Text(args[0].to_text().to_lowercase()))
        }
        "upper" | "uppercase" => {
            expect_args(1)?;
            Ok(Value::Text(args[0].to_text().to_uppercase()))
        }
        "len" | "length" => {
            expect_args(1)?;
            Ok(Value::Number(args[0].to_text().chars().count() as f64))
        }
        _ => Err(format!("Unknown function: {}", name)),
    }
}
