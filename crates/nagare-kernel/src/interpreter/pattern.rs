//! Pattern matching for `let`, `fetch` and function parameters.
//!
//! | pattern         | matches                                      |
//! |-----------------|----------------------------------------------|
//! | `$x`            | exactly one element                          |
//! | `$a $b`         | exactly two elements, positionally           |
//! | `($xs)`         | anything; binds the whole stream as a list   |
//! | `$a $b ($rest)` | at least two elements; the remainder is a list |
//!
//! A failed match binds nothing.

use crate::ast::{Pattern, Value};

use super::error::RuntimeError;
use super::scope::Env;

/// How matched names are written into the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindMode {
    /// `let` and `fetch`: update the frame holding the name.
    Assign,
    /// Parameters: always bind in the innermost frame.
    Define,
}

/// Reject patterns that name the same variable twice.
pub fn check(pattern: &Pattern) -> Result<(), RuntimeError> {
    let mut seen = std::collections::HashSet::new();
    for name in pattern.names.iter().chain(pattern.rest.iter()) {
        if !seen.insert(name.as_str()) {
            return Err(RuntimeError::InvalidPattern(format!(
                "${} bound twice in '{}'",
                name, pattern
            )));
        }
    }
    Ok(())
}

/// Whether a stream of `len` elements satisfies the pattern's arity.
pub fn accepts(pattern: &Pattern, len: usize) -> bool {
    match pattern.rest {
        Some(_) => len >= pattern.names.len(),
        None => len == pattern.names.len(),
    }
}

/// Match a stream against a pattern, returning the bindings on success.
pub fn match_values(pattern: &Pattern, mut values: Vec<Value>) -> Option<Vec<(String, Value)>> {
    if !accepts(pattern, values.len()) {
        return None;
    }
    let rest = values.split_off(pattern.names.len());
    let mut bindings: Vec<(String, Value)> = pattern.names.iter().cloned().zip(values).collect();
    if let Some(name) = &pattern.rest {
        bindings.push((name.clone(), Value::List(rest)));
    }
    Some(bindings)
}

/// Match and bind into `env`. Returns whether the match succeeded.
pub fn bind(pattern: &Pattern, values: Vec<Value>, env: &Env, mode: BindMode) -> Result<bool, RuntimeError> {
    check(pattern)?;
    let Some(bindings) = match_values(pattern, values) else {
        return Ok(false);
    };
    for (name, value) in bindings {
        match mode {
            BindMode::Assign => env.assign(name, value),
            BindMode::Define => env.define(name, value),
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(items: &[&str]) -> Vec<Value> {
        items.iter().map(|s| Value::scalar(*s)).collect()
    }

    fn pattern(names: &[&str], rest: Option<&str>) -> Pattern {
        Pattern {
            names: names.iter().map(|s| s.to_string()).collect(),
            rest: rest.map(str::to_string),
        }
    }

    #[test]
    fn bare_name_needs_exactly_one() {
        let p = pattern(&["x"], None);
        assert!(match_values(&p, values(&["1"])).is_some());
        assert!(match_values(&p, values(&[])).is_none());
        assert!(match_values(&p, values(&["1", "2"])).is_none());
    }

    #[test]
    fn repeated_names_bind_positionally() {
        let p = pattern(&["a", "b"], None);
        let bound = match_values(&p, values(&["1", "2"])).unwrap();
        assert_eq!(bound[0], ("a".to_string(), Value::scalar("1")));
        assert_eq!(bound[1], ("b".to_string(), Value::scalar("2")));
    }

    #[test]
    fn rest_always_matches() {
        let p = pattern(&[], Some("xs"));
        let bound = match_values(&p, values(&[])).unwrap();
        assert_eq!(bound[0].1, Value::List(vec![]));
    }

    #[test]
    fn mixed_pattern_captures_remainder() {
        let p = pattern(&["head"], Some("tail"));
        let bound = match_values(&p, values(&["1", "2", "3"])).unwrap();
        assert_eq!(bound[0].1, Value::scalar("1"));
        assert_eq!(bound[1].1, Value::List(values(&["2", "3"])));
        assert!(match_values(&p, values(&[])).is_none());
    }

    #[test]
    fn failed_bind_leaves_env_untouched() {
        let env = Env::new();
        env.define("a", Value::scalar("old"));
        let ok = bind(&pattern(&["a", "b"], None), values(&["1"]), &env, BindMode::Assign).unwrap();
        assert!(!ok);
        assert_eq!(env.get("a"), Some(Value::scalar("old")));
        assert_eq!(env.get("b"), None);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let env = Env::new();
        let err = bind(&pattern(&["a"], Some("a")), values(&["1"]), &env, BindMode::Assign);
        assert!(matches!(err, Err(RuntimeError::InvalidPattern(_))));
    }
}
