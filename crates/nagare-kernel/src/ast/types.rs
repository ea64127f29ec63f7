//! AST type definitions.
//!
//! Bodies that outlive the statement that declares them (function bodies,
//! deferred statements, spawned blocks) are held in `Arc` so the interpreter
//! can hand them to other frames and tasks without cloning the tree.

use std::fmt;
use std::sync::Arc;

/// A complete nagare program is a sequence of statements.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

/// A single statement.
///
/// Every statement can run as a pipeline stage: it may `fetch` from the
/// stage's input and `yield` to its output.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Function invocation: `name arg1 arg2`
    Call(Call),
    /// Pipeline: `a | b | c` or `x y -> a | b`
    Pipeline(Pipeline),
    /// Block: `{ ... }`
    Block(Vec<Stmt>),
    /// Conditional: `if cond { ... } else if cond { ... } else { ... }`
    If(IfStmt),
    /// Loop: `while cond { ... }`
    While(WhileLoop),
    /// Function declaration: `fun name $a ($rest) { ... }`
    FunDef(Arc<FunDef>),
    /// Pattern-matching assignment: `let $a $b = expr`
    Let(LetStmt),
    /// Read from the stage input: `fetch $a ($rest)`
    Fetch(Pattern),
    /// Write to the stage output: `yield a b c`
    Yield(Vec<Expr>),
    /// Leave the current call: `return` or `return expr`
    Return(Option<Expr>),
    /// Leave loops: `break` or `break level`
    Break(Option<Expr>),
    /// Next loop iteration: `continue`
    Continue,
    /// Register cleanup on the current call: `defer stmt`
    Defer(Arc<Stmt>),
    /// Background task: `spawn { ... }` or `& { ... }`
    Spawn(Arc<Vec<Stmt>>),
    /// Wait for a background task: `join $handle`
    Join(Expr),
    /// A bare value whose truthiness is the status: `($x > 1)`
    Value(Expr),
    /// Negated status: `! stmt`
    Not(Box<Stmt>),
    /// Run right only if left succeeds
    AndChain { left: Box<Stmt>, right: Box<Stmt> },
    /// Run right only if left fails
    OrChain { left: Box<Stmt>, right: Box<Stmt> },
    /// Empty statement (newline or semicolon only)
    Empty,
}

impl Stmt {
    /// Short name of the statement kind, for tracing spans.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Stmt::Call(_) => "call",
            Stmt::Pipeline(_) => "pipeline",
            Stmt::Block(_) => "block",
            Stmt::If(_) => "if",
            Stmt::While(_) => "while",
            Stmt::FunDef(_) => "fun",
            Stmt::Let(_) => "let",
            Stmt::Fetch(_) => "fetch",
            Stmt::Yield(_) => "yield",
            Stmt::Return(_) => "return",
            Stmt::Break(_) => "break",
            Stmt::Continue => "continue",
            Stmt::Defer(_) => "defer",
            Stmt::Spawn(_) => "spawn",
            Stmt::Join(_) => "join",
            Stmt::Value(_) => "value",
            Stmt::Not(_) => "not",
            Stmt::AndChain { .. } => "and",
            Stmt::OrChain { .. } => "or",
            Stmt::Empty => "empty",
        }
    }
}

/// A function invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub name: String,
    pub args: Vec<Expr>,
}

/// A chain of stages, optionally fed from a list of values.
///
/// `1 2 3 -> f | g` is `Pipeline { feed: Some([1, 2, 3]), stages: [f, g] }`
/// and behaves exactly like `yield 1 2 3 | f | g`.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub feed: Option<Vec<Expr>>,
    pub stages: Vec<Stmt>,
}

/// Conditional with any number of `else if` arms.
#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    /// `(condition, body)` pairs tried in order.
    pub branches: Vec<(Stmt, Vec<Stmt>)>,
    pub else_branch: Option<Vec<Stmt>>,
}

/// While loop; the condition is a statement judged by its status.
#[derive(Debug, Clone, PartialEq)]
pub struct WhileLoop {
    pub condition: Box<Stmt>,
    pub body: Vec<Stmt>,
}

/// Function declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct FunDef {
    pub name: String,
    pub params: Pattern,
    pub body: Arc<Vec<Stmt>>,
}

/// `let pattern = values`
#[derive(Debug, Clone, PartialEq)]
pub struct LetStmt {
    pub pattern: Pattern,
    pub value: Expr,
}

/// A binding pattern: leading names bind one element each, an optional
/// parenthesized name captures whatever remains.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Pattern {
    pub names: Vec<String>,
    pub rest: Option<String>,
}

impl Pattern {
    /// Pattern of positional names only.
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            rest: None,
        }
    }

    /// Pattern that captures everything into `name`.
    pub fn rest(name: impl Into<String>) -> Self {
        Self {
            names: Vec::new(),
            rest: Some(name.into()),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for name in &self.names {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "${}", name)?;
            first = false;
        }
        if let Some(rest) = &self.rest {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "(${})", rest)?;
        }
        Ok(())
    }
}

/// Expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal text: `foo`, `42`, `'raw'`
    Literal(String),
    /// Variable reference: `$name`
    Var(String),
    /// Double-quoted string with `$name` interpolation
    Interpolated(Vec<StringPart>),
    /// Juxtaposed expressions: `(1 2 3)`
    List(Vec<Expr>),
    /// Stream capture: `[ stmts ]`
    Capture(Vec<Stmt>),
    /// Element count: `#name`
    Length(String),
    /// Index or slice: `$xs(i)`, `$xs(a : b)`, `$xs(a b)`
    Index { target: Box<Expr>, index: Index },
    /// Unary operator: `- $x`, `! $x`
    Unary { op: UnaryOp, expr: Box<Expr> },
    /// Binary operator: `$a + 1`, `$a == $b`, `$a && $b`
    Binary { op: BinaryOp, left: Box<Expr>, right: Box<Expr> },
    /// Background task in expression position: `let $j = spawn { ... }`
    Spawn(Arc<Vec<Stmt>>),
    /// Pieces written without whitespace between them: `d$i`, `"$a"[f]`
    Concat(Vec<Expr>),
}

/// Part of an interpolated string.
#[derive(Debug, Clone, PartialEq)]
pub enum StringPart {
    /// Literal text
    Literal(String),
    /// Variable interpolation: `${VAR}` or `$VAR`
    Var(String),
}

/// Selector inside `$xs( ... )`.
#[derive(Debug, Clone, PartialEq)]
pub enum Index {
    /// A single element.
    At(Box<Expr>),
    /// Half-open range; missing bounds default to the whole list.
    Slice {
        start: Option<Box<Expr>>,
        end: Option<Box<Expr>>,
    },
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Neg => write!(f, "-"),
            UnaryOp::Plus => write!(f, "+"),
            UnaryOp::Not => write!(f, "!"),
        }
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `&&` - logical and (short-circuit)
    And,
    /// `||` - logical or (short-circuit)
    Or,
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    Add,
    Sub,
    Mul,
    /// `/` - floor division
    Div,
    /// `%` - floor modulo, sign follows the divisor
    Mod,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::Lt | BinaryOp::Gt | BinaryOp::LtEq | BinaryOp::GtEq
        )
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryOp::And => write!(f, "&&"),
            BinaryOp::Or => write!(f, "||"),
            BinaryOp::Eq => write!(f, "=="),
            BinaryOp::NotEq => write!(f, "!="),
            BinaryOp::Lt => write!(f, "<"),
            BinaryOp::Gt => write!(f, ">"),
            BinaryOp::LtEq => write!(f, "<="),
            BinaryOp::GtEq => write!(f, ">="),
            BinaryOp::Add => write!(f, "+"),
            BinaryOp::Sub => write!(f, "-"),
            BinaryOp::Mul => write!(f, "*"),
            BinaryOp::Div => write!(f, "/"),
            BinaryOp::Mod => write!(f, "%"),
        }
    }
}
