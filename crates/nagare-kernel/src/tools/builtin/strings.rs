//! str: Text operations over the input stream.
//!
//! `str <op> [args]` reads every value on its input and treats each one as
//! a string:
//!
//! | op            | yields per input value                        |
//! |---------------|-----------------------------------------------|
//! | `split`       | each character                                |
//! | `join`        | (once, at end of stream) all values joined    |
//! | `cmp s`       | `-1`, `0` or `1` comparing the value with `s` |
//! | `len`         | the character count                           |
//! | `index i...`  | the character at each index                   |
//! | `slice a b`   | characters `a` up to `b`                      |
//!
//! Indices follow list indexing: a negative index counts from the end and a
//! slice end of zero or below counts from the end. An index outside the
//! string stops the stream with status 1.

use std::cmp::Ordering;

use async_trait::async_trait;

use crate::ast::Value;
use crate::interpreter::{normalize_slice, ControlFlow, RuntimeError};
use crate::tools::{ExecContext, ParamSchema, Tool, ToolArgs, ToolResult, ToolSchema};

/// String operation tool.
pub struct Str;

#[derive(Debug, Clone, PartialEq)]
enum Op {
    Split,
    Join,
    Cmp(String),
    Len,
    Index(Vec<i64>),
    Slice(i64, i64),
}

impl Op {
    fn parse(args: &[String]) -> Result<Self, String> {
        let Some((op, rest)) = args.split_first() else {
            return Err("missing operation".into());
        };
        let ints = || {
            rest.iter()
                .map(|a| a.trim().parse::<i64>().map_err(|_| format!("expected an integer, got '{}'", a)))
                .collect::<Result<Vec<_>, _>>()
        };
        let op = match (op.as_str(), rest.len()) {
            ("split", 0) => Op::Split,
            ("join", 0) => Op::Join,
            ("len", 0) => Op::Len,
            ("cmp", 1) => Op::Cmp(rest[0].clone()),
            ("index", n) if n > 0 => Op::Index(ints()?),
            ("slice", 2) => {
                let bounds = ints()?;
                Op::Slice(bounds[0], bounds[1])
            }
            ("split" | "join" | "len" | "cmp" | "index" | "slice", n) => {
                return Err(format!("wrong number of arguments to '{}': {}", op, n));
            }
            _ => return Err(format!("unknown operation '{}'", op)),
        };
        Ok(op)
    }

    /// Apply to one input string. `None` means an index was out of range.
    fn apply(&self, text: &str) -> Option<Vec<Value>> {
        let chars: Vec<char> = text.chars().collect();
        let len = chars.len() as i64;
        Some(match self {
            Op::Split => chars.iter().map(|c| Value::Scalar(c.to_string())).collect(),
            // Joining spans the whole stream; see `execute`.
            Op::Join => vec![Value::Scalar(text.to_string())],
            Op::Len => vec![Value::int(len)],
            Op::Cmp(other) => {
                let order = match text.cmp(other.as_str()) {
                    Ordering::Less => -1,
                    Ordering::Equal => 0,
                    Ordering::Greater => 1,
                };
                vec![Value::int(order)]
            }
            Op::Index(indices) => {
                let mut out = Vec::with_capacity(indices.len());
                for &i in indices {
                    let i = if i < 0 { i + len } else { i };
                    if i < 0 || i >= len {
                        return None;
                    }
                    out.push(Value::Scalar(chars[i as usize].to_string()));
                }
                out
            }
            Op::Slice(start, end) => {
                let (start, end) = normalize_slice(*start, *end, len)?;
                vec![Value::Scalar(chars[start..end].iter().collect())]
            }
        })
    }
}

#[async_trait]
impl Tool for Str {
    fn name(&self) -> &str {
        "str"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new("str", "Text operations over the input stream")
            .param(ParamSchema::required("op", "string", "split, join, cmp, len, index or slice"))
            .param(ParamSchema::optional("args", "any", "Operation arguments"))
            .variadic()
    }

    async fn execute(&self, args: ToolArgs, ctx: &mut ExecContext) -> ToolResult {
        let op = Op::parse(&args.strings()).map_err(|e| RuntimeError::Tool(format!("str: {}", e)))?;

        if op == Op::Join {
            let joined: String = ctx.input.drain().await.iter().map(Value::to_string).collect();
            return Ok(ctx.emit_then([Value::Scalar(joined)], 0).await);
        }

        while let Some(values) = ctx.input.fetch(1).await {
            for value in values {
                let Some(out) = op.apply(&value.to_string()) else {
                    tracing::debug!(%value, "str: index out of range");
                    return Ok(ControlFlow::fail());
                };
                if let Err(port) = ctx.emit_all(out).await {
                    return Ok(ControlFlow::Closed(port));
                }
            }
        }
        Ok(ControlFlow::ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(args: &[&str]) -> Result<Op, String> {
        Op::parse(&args.iter().map(|s| s.to_string()).collect::<Vec<_>>())
    }

    fn texts(values: Option<Vec<Value>>) -> Option<Vec<String>> {
        values.map(|vs| vs.iter().map(Value::to_string).collect())
    }

    #[test]
    fn parse_operations() {
        assert_eq!(op(&["split"]), Ok(Op::Split));
        assert_eq!(op(&["cmp", "b"]), Ok(Op::Cmp("b".into())));
        assert_eq!(op(&["index", "0", "-1"]), Ok(Op::Index(vec![0, -1])));
        assert_eq!(op(&["slice", "1", "0"]), Ok(Op::Slice(1, 0)));
        assert!(op(&["slice", "1"]).unwrap_err().contains("wrong number"));
        assert!(op(&["index", "x"]).unwrap_err().contains("expected an integer"));
        assert!(op(&["upper"]).unwrap_err().contains("unknown operation"));
        assert!(op(&[]).is_err());
    }

    #[test]
    fn per_value_results() {
        assert_eq!(texts(Op::Split.apply("héllo")), Some(vec!["h", "é", "l", "l", "o"].into_iter().map(String::from).collect()));
        assert_eq!(texts(Op::Len.apply("héllo")), Some(vec!["5".to_string()]));
        assert_eq!(texts(Op::Cmp("b".into()).apply("a")), Some(vec!["-1".to_string()]));
        assert_eq!(texts(Op::Cmp("b".into()).apply("b")), Some(vec!["0".to_string()]));
        assert_eq!(texts(Op::Cmp("b".into()).apply("c")), Some(vec!["1".to_string()]));
        assert_eq!(texts(Op::Index(vec![0, -1]).apply("abc")), Some(vec!["a".to_string(), "c".to_string()]));
        assert_eq!(texts(Op::Slice(1, 0).apply("abcd")), Some(vec!["bcd".to_string()]));
        assert_eq!(texts(Op::Slice(0, -1).apply("abcd")), Some(vec!["abc".to_string()]));
    }

    #[test]
    fn out_of_range_is_none() {
        assert!(Op::Index(vec![3]).apply("abc").is_none());
        assert!(Op::Index(vec![0]).apply("").is_none());
        assert!(Op::Slice(3, 2).apply("abcd").is_none());
    }
}
