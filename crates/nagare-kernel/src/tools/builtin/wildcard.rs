//! match: Wildcard matching.
//!
//! `match pattern value...` succeeds when every value matches the pattern.
//! `*` matches any run of characters, `?` exactly one, and `\` makes the
//! next character literal.

use async_trait::async_trait;

use crate::interpreter::ControlFlow;
use crate::tools::{ExecContext, ParamSchema, Tool, ToolArgs, ToolResult, ToolSchema};

/// Wildcard match tool.
pub struct Match;

#[async_trait]
impl Tool for Match {
    fn name(&self) -> &str {
        "match"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new("match", "Test values against a wildcard pattern")
            .param(ParamSchema::required("pattern", "string", "Pattern with * and ?"))
            .param(ParamSchema::optional("values", "any", "Values to test"))
            .variadic()
    }

    async fn execute(&self, args: ToolArgs, _ctx: &mut ExecContext) -> ToolResult {
        let mut args = args.strings().into_iter();
        let pattern = Pattern::new(&args.next().unwrap_or_default());
        Ok(ControlFlow::from_bool(args.all(|value| pattern.matches(&value))))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Piece {
    Char(char),
    Any,
    AnyRun,
}

/// A compiled wildcard pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    pieces: Vec<Piece>,
}

impl Pattern {
    pub fn new(source: &str) -> Self {
        let mut pieces = Vec::new();
        let mut chars = source.chars();
        while let Some(c) = chars.next() {
            pieces.push(match c {
                '*' => Piece::AnyRun,
                '?' => Piece::Any,
                '\\' => Piece::Char(chars.next().unwrap_or('\\')),
                c => Piece::Char(c),
            });
        }
        Self { pieces }
    }

    /// Match the whole of `text`.
    ///
    /// Backtracks only to the most recent `*`, so the cost stays linear in
    /// the pattern times the text.
    pub fn matches(&self, text: &str) -> bool {
        let text: Vec<char> = text.chars().collect();
        let (mut p, mut t) = (0, 0);
        let mut star: Option<(usize, usize)> = None;

        while t < text.len() {
            match self.pieces.get(p) {
                Some(Piece::AnyRun) => {
                    star = Some((p, t));
                    p += 1;
                }
                Some(Piece::Any) => {
                    p += 1;
                    t += 1;
                }
                Some(Piece::Char(c)) if *c == text[t] => {
                    p += 1;
                    t += 1;
                }
                _ => match star {
                    Some((sp, st)) => {
                        p = sp + 1;
                        t = st + 1;
                        star = Some((sp, st + 1));
                    }
                    None => return false,
                },
            }
        }
        self.pieces[p..].iter().all(|piece| *piece == Piece::AnyRun)
    }
}
