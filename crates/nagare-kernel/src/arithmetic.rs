//! Integer arithmetic and scalar comparison.
//!
//! Supports:
//! - `+`, `-`, `*` with overflow checking
//! - `/` and `%` with floor semantics: `a == b * (a / b) + a % b` and the
//!   remainder takes the divisor's sign, so `-13 / 10 == -2`, `-13 % 10 == 7`
//! - comparison that is numeric when both sides are integers and
//!   lexicographic otherwise
//!
//! Does NOT support floating point.

use std::cmp::Ordering;

use crate::ast::BinaryOp;
use crate::interpreter::RuntimeError;

/// Floor division.
pub fn floor_div(a: i64, b: i64) -> Result<i64, RuntimeError> {
    if b == 0 {
        return Err(RuntimeError::DivisionByZero);
    }
    let q = a.checked_div(b).ok_or(RuntimeError::Overflow)?;
    if (a % b != 0) && ((a < 0) != (b < 0)) {
        q.checked_sub(1).ok_or(RuntimeError::Overflow)
    } else {
        Ok(q)
    }
}

/// Floor modulo; the result has the sign of `b`.
pub fn floor_mod(a: i64, b: i64) -> Result<i64, RuntimeError> {
    if b == 0 {
        return Err(RuntimeError::DivisionByZero);
    }
    let r = a.checked_rem(b).ok_or(RuntimeError::Overflow)?;
    if r != 0 && ((r < 0) != (b < 0)) {
        Ok(r + b)
    } else {
        Ok(r)
    }
}

/// Apply an arithmetic operator to two integers.
pub fn apply(op: BinaryOp, a: i64, b: i64) -> Result<i64, RuntimeError> {
    match op {
        BinaryOp::Add => a.checked_add(b).ok_or(RuntimeError::Overflow),
        BinaryOp::Sub => a.checked_sub(b).ok_or(RuntimeError::Overflow),
        BinaryOp::Mul => a.checked_mul(b).ok_or(RuntimeError::Overflow),
        BinaryOp::Div => floor_div(a, b),
        BinaryOp::Mod => floor_mod(a, b),
        other => Err(RuntimeError::Type(format!("'{}' is not an arithmetic operator", other))),
    }
}

/// Parse a scalar operand for arithmetic.
pub fn to_int(text: &str) -> Result<i64, RuntimeError> {
    text.trim()
        .parse()
        .map_err(|_| RuntimeError::Type(format!("expected an integer, got '{}'", text)))
}

/// Order two scalars: numerically if both are integers, else by text.
pub fn compare(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<i64>(), b.trim().parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

/// Evaluate a comparison operator against an ordering.
pub fn holds(op: BinaryOp, ord: Ordering) -> bool {
    match op {
        BinaryOp::Eq => ord == Ordering::Equal,
        BinaryOp::NotEq => ord != Ordering::Equal,
        BinaryOp::Lt => ord == Ordering::Less,
        BinaryOp::Gt => ord == Ordering::Greater,
        BinaryOp::LtEq => ord != Ordering::Greater,
        BinaryOp::GtEq => ord != Ordering::Less,
        _ => false,
    }
}
