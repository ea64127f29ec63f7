//! Runtime values.
//!
//! Everything in nagare is either a scalar (text that coerces to an integer
//! on demand) or a list of values. Booleans are the scalars `true`/`false`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A runtime value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Text, coerced to an integer when an operator needs one.
    Scalar(String),
    /// Ordered sequence of values; may nest.
    List(Vec<Value>),
}

impl Value {
    /// Create a scalar from anything textual.
    pub fn scalar(text: impl Into<String>) -> Self {
        Value::Scalar(text.into())
    }

    /// Create a scalar holding an integer.
    pub fn int(n: i64) -> Self {
        Value::Scalar(n.to_string())
    }

    /// The canonical boolean scalars.
    pub fn bool(b: bool) -> Self {
        Value::Scalar(if b { "true" } else { "false" }.to_string())
    }

    /// Coerce to an integer. Lists never coerce.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Scalar(s) => s.trim().parse().ok(),
            Value::List(_) => None,
        }
    }

    /// Borrow the text of a scalar.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Scalar(s) => Some(s),
            Value::List(_) => None,
        }
    }

    /// Truthiness used by `if`, `while`, `!` and value statements.
    ///
    /// A scalar is false when empty, `false`, or an integer equal to zero.
    /// A list is true when non-empty and every element is true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Scalar(s) => {
                !(s.is_empty() || s == "false" || self.as_int() == Some(0))
            }
            Value::List(items) => !items.is_empty() && items.iter().all(Value::is_truthy),
        }
    }

    /// Element count: list length, or 1 for a scalar.
    pub fn len(&self) -> usize {
        match self {
            Value::Scalar(_) => 1,
            Value::List(items) => items.len(),
        }
    }

    /// True only for the empty list.
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::List(items) if items.is_empty())
    }

    /// The value viewed as a sequence: a list's items, or a scalar alone.
    pub fn into_elements(self) -> Vec<Value> {
        match self {
            Value::Scalar(_) => vec![self],
            Value::List(items) => items,
        }
    }

    /// Push this value onto a stream, spreading a top-level list.
    pub fn flatten_into(self, out: &mut Vec<Value>) {
        match self {
            Value::Scalar(_) => out.push(self),
            Value::List(items) => out.extend(items),
        }
    }
}

/// Flatten a sequence of values one level into a stream.
pub fn flatten(values: impl IntoIterator<Item = Value>) -> Vec<Value> {
    let mut out = Vec::new();
    for v in values {
        v.flatten_into(&mut out);
    }
    out
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scalar(s) => write!(f, "{}", s),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    match item {
                        Value::List(_) => write!(f, "({})", item)?,
                        Value::Scalar(_) => write!(f, "{}", item)?,
                    }
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Scalar(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Scalar(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(items: &[&str]) -> Value {
        Value::List(items.iter().map(|s| Value::scalar(*s)).collect())
    }

    #[test]
    fn scalar_truthiness() {
        assert!(Value::scalar("1").is_truthy());
        assert!(Value::scalar("true").is_truthy());
        assert!(Value::scalar("hello").is_truthy());
        assert!(!Value::scalar("").is_truthy());
        assert!(!Value::scalar("false").is_truthy());
        assert!(!Value::scalar("0").is_truthy());
        assert!(!Value::scalar("-0").is_truthy());
    }

    #[test]
    fn list_truthiness_requires_every_element() {
        assert!(list(&["true", "1"]).is_truthy());
        assert!(!list(&["true", "false"]).is_truthy());
        assert!(!Value::List(vec![]).is_truthy());
    }

    #[test]
    fn integer_coercion() {
        assert_eq!(Value::scalar("42").as_int(), Some(42));
        assert_eq!(Value::scalar("-7").as_int(), Some(-7));
        assert_eq!(Value::scalar("x7").as_int(), None);
        assert_eq!(list(&["1"]).as_int(), None);
    }

    #[test]
    fn flatten_spreads_one_level() {
        let nested = Value::List(vec![Value::scalar("a"), list(&["b", "c"])]);
        let out = flatten(vec![Value::scalar("x"), nested]);
        assert_eq!(out.len(), 3);
        assert_eq!(out[2], list(&["b", "c"]));
    }

    #[test]
    fn display_wraps_nested_lists() {
        let v = Value::List(vec![Value::scalar("a"), list(&["b", "c"])]);
        assert_eq!(v.to_string(), "a (b c)");
    }

    #[test]
    fn serializes_untagged() {
        let v = Value::List(vec![Value::scalar("a"), list(&["b"])]);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, r#"["a",["b"]]"#);
    }
}
