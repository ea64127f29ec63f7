//! Expression evaluation.
//!
//! The evaluator reduces AST expressions to values. Variables resolve
//! through the [`Env`]; operators work elementwise over lists with scalars
//! broadcast against them.
//!
//! Stream captures (`[ ... ]`) and `spawn` need to run statements, which
//! only higher layers can do. They reach the kernel through the
//! [`Executor`] trait; pure evaluation uses [`NoOpExecutor`].

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::arithmetic;
use crate::ast::{BinaryOp, Expr, Index, Stmt, StringPart, UnaryOp, Value};

use super::error::{EvalResult, Fault, RuntimeError};
use super::scope::Env;

/// Runs statements on behalf of the evaluator.
pub trait Executor: Send + Sync {
    /// Run `body` as a sub-pipeline and collect everything it yields.
    fn capture<'a>(&'a self, body: &'a [Stmt]) -> BoxFuture<'a, Result<Vec<Value>, RuntimeError>>;

    /// Start `body` as a background job and return its handle.
    fn spawn(&self, body: Arc<Vec<Stmt>>) -> Result<Value, RuntimeError>;
}

/// Executor for contexts that cannot run statements.
pub struct NoOpExecutor;

impl Executor for NoOpExecutor {
    fn capture<'a>(&'a self, _body: &'a [Stmt]) -> BoxFuture<'a, Result<Vec<Value>, RuntimeError>> {
        async { Err(RuntimeError::Tool("stream capture needs a running kernel".into())) }.boxed()
    }

    fn spawn(&self, _body: Arc<Vec<Stmt>>) -> Result<Value, RuntimeError> {
        Err(RuntimeError::Tool("spawn needs a running kernel".into()))
    }
}

/// Expression evaluator bound to an environment.
pub struct Evaluator<'a> {
    env: &'a Env,
    executor: &'a dyn Executor,
}

impl<'a> Evaluator<'a> {
    pub fn new(env: &'a Env, executor: &'a dyn Executor) -> Self {
        Self { env, executor }
    }

    /// Evaluate a single expression.
    pub fn eval<'b>(&'b self, expr: &'b Expr) -> BoxFuture<'b, EvalResult<Value>> {
        async move {
            match expr {
                Expr::Literal(text) => Ok(Value::scalar(text.clone())),
                Expr::Var(name) => self.lookup(name),
                Expr::Interpolated(parts) => {
                    let mut out = String::new();
                    for part in parts {
                        match part {
                            StringPart::Literal(text) => out.push_str(text),
                            StringPart::Var(name) => out.push_str(&self.lookup(name)?.to_string()),
                        }
                    }
                    Ok(Value::Scalar(out))
                }
                Expr::List(items) => {
                    let mut values = Vec::with_capacity(items.len());
                    for item in items {
                        values.push(self.eval(item).await?);
                    }
                    Ok(Value::List(values))
                }
                Expr::Capture(body) => Ok(Value::List(self.executor.capture(body).await?)),
                Expr::Length(name) => Ok(Value::int(self.lookup(name)?.len() as i64)),
                Expr::Index { target, index } => {
                    let target = self.eval(target).await?;
                    self.index(target, index).await
                }
                Expr::Unary { op, expr } => {
                    let value = self.eval(expr).await?;
                    Ok(unary(*op, value)?)
                }
                Expr::Binary { op: BinaryOp::And, left, right } => {
                    if !self.eval(left).await?.is_truthy() {
                        return Ok(Value::bool(false));
                    }
                    Ok(Value::bool(self.eval(right).await?.is_truthy()))
                }
                Expr::Binary { op: BinaryOp::Or, left, right } => {
                    if self.eval(left).await?.is_truthy() {
                        return Ok(Value::bool(true));
                    }
                    Ok(Value::bool(self.eval(right).await?.is_truthy()))
                }
                Expr::Binary { op, left, right } => {
                    let l = self.eval(left).await?;
                    let r = self.eval(right).await?;
                    Ok(binary(*op, l, r)?)
                }
                Expr::Spawn(body) => Ok(self.executor.spawn(Arc::clone(body))?),
                Expr::Concat(pieces) => {
                    let mut words = vec![String::new()];
                    for piece in pieces {
                        let elements = self.eval(piece).await?.into_elements();
                        words = words
                            .iter()
                            .flat_map(|prefix| elements.iter().map(move |e| format!("{}{}", prefix, e)))
                            .collect();
                    }
                    Ok(match words.len() {
                        1 => Value::Scalar(words.remove(0)),
                        _ => Value::List(words.into_iter().map(Value::Scalar).collect()),
                    })
                }
            }
        }
        .boxed()
    }

    /// Evaluate call or `yield` arguments into a flat stream.
    ///
    /// Each argument that evaluates to a list is spread one level.
    pub async fn eval_args(&self, args: &[Expr]) -> EvalResult<Vec<Value>> {
        let mut out = Vec::with_capacity(args.len());
        for arg in args {
            self.eval(arg).await?.flatten_into(&mut out);
        }
        Ok(out)
    }

    fn lookup(&self, name: &str) -> EvalResult<Value> {
        self.env
            .get(name)
            .ok_or_else(|| Fault::Fatal(RuntimeError::UndefinedVariable(name.to_string())))
    }

    async fn index(&self, target: Value, index: &Index) -> EvalResult<Value> {
        let items = target.into_elements();
        let len = items.len() as i64;
        match index {
            Index::At(at) => {
                let i = as_index(self.eval(at).await?)?;
                let i = if i < 0 { i + len } else { i };
                if i < 0 || i >= len {
                    return Err(Fault::soft(format!("index {} out of range for length {}", i, len)));
                }
                Ok(items[i as usize].clone())
            }
            Index::Slice { start, end } => {
                let start = match start {
                    Some(e) => as_index(self.eval(e).await?)?,
                    None => 0,
                };
                let end = match end {
                    Some(e) => as_index(self.eval(e).await?)?,
                    None => len,
                };
                let (start, end) = normalize_slice(start, end, len)
                    .ok_or_else(|| Fault::soft(format!("slice {}:{} out of range for length {}", start, end, len)))?;
                Ok(Value::List(items[start..end].to_vec()))
            }
        }
    }
}

/// Resolve slice bounds against a length.
///
/// A negative start counts from the end; an end of zero or below counts
/// from the end too, so `$xs(i : 0)` runs to the last element. The range
/// is half-open and must satisfy `0 <= start <= end <= len`.
pub fn normalize_slice(start: i64, end: i64, len: i64) -> Option<(usize, usize)> {
    let start = if start < 0 { start + len } else { start };
    let end = if end <= 0 { end + len } else { end };
    if start < 0 || end > len || start > end {
        return None;
    }
    Some((start as usize, end as usize))
}

fn as_index(value: Value) -> Result<i64, RuntimeError> {
    match value {
        Value::Scalar(text) => arithmetic::to_int(&text),
        Value::List(mut items) if items.len() == 1 => as_index(items.remove(0)),
        Value::List(_) => Err(RuntimeError::Type("index must be a single integer".into())),
    }
}

/// Apply a unary operator.
pub fn unary(op: UnaryOp, value: Value) -> Result<Value, RuntimeError> {
    match (op, value) {
        (UnaryOp::Not, value) => Ok(Value::bool(!value.is_truthy())),
        (op, Value::List(items)) => items
            .into_iter()
            .map(|v| unary(op, v))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        (UnaryOp::Neg, Value::Scalar(text)) => {
            let n = arithmetic::to_int(&text)?;
            Ok(Value::int(n.checked_neg().ok_or(RuntimeError::Overflow)?))
        }
        (UnaryOp::Plus, Value::Scalar(text)) => Ok(Value::int(arithmetic::to_int(&text)?)),
    }
}

/// Apply an arithmetic or comparison operator, elementwise over lists.
pub fn binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, RuntimeError> {
    match (left, right) {
        (Value::Scalar(a), Value::Scalar(b)) => scalar_binary(op, &a, &b),
        (Value::List(xs), Value::List(ys)) => {
            if xs.len() != ys.len() {
                return match op {
                    BinaryOp::Eq => Ok(Value::bool(false)),
                    BinaryOp::NotEq => Ok(Value::bool(true)),
                    _ => Err(RuntimeError::Type(format!(
                        "'{}' on lists of length {} and {}",
                        op,
                        xs.len(),
                        ys.len()
                    ))),
                };
            }
            xs.into_iter()
                .zip(ys)
                .map(|(x, y)| binary(op, x, y))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List)
        }
        (Value::List(xs), scalar) => xs
            .into_iter()
            .map(|x| binary(op, x, scalar.clone()))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        (scalar, Value::List(ys)) => ys
            .into_iter()
            .map(|y| binary(op, scalar.clone(), y))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
    }
}

fn scalar_binary(op: BinaryOp, a: &str, b: &str) -> Result<Value, RuntimeError> {
    if op.is_comparison() {
        return Ok(Value::bool(arithmetic::holds(op, arithmetic::compare(a, b))));
    }
    let x = arithmetic::to_int(a)?;
    let y = arithmetic::to_int(b)?;
    Ok(Value::int(arithmetic::apply(op, x, y)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(s: &str) -> Expr {
        Expr::Literal(s.into())
    }

    fn bin(op: BinaryOp, l: Expr, r: Expr) -> Expr {
        Expr::Binary { op, left: Box::new(l), right: Box::new(r) }
    }

    fn list(items: &[&str]) -> Value {
        Value::List(items.iter().map(|s| Value::scalar(*s)).collect())
    }

    async fn eval(expr: &Expr, env: &Env) -> EvalResult<Value> {
        Evaluator::new(env, &NoOpExecutor).eval(expr).await
    }

    #[tokio::test]
    async fn floor_semantics_through_operators() {
        let env = Env::new();
        let div = bin(BinaryOp::Div, lit("-13"), lit("10"));
        let rem = bin(BinaryOp::Mod, lit("-13"), lit("10"));
        assert_eq!(eval(&div, &env).await.unwrap(), Value::int(-2));
        assert_eq!(eval(&rem, &env).await.unwrap(), Value::int(7));
    }

    #[tokio::test]
    async fn touching_pieces_join_as_a_product() {
        let env = Env::new();
        env.define("i", Value::int(2));
        env.define("xs", list(&["a", "b"]));
        env.define("none", Value::List(Vec::new()));

        let d_i = Expr::Concat(vec![lit("d"), Expr::Var("i".into())]);
        assert_eq!(eval(&d_i, &env).await.unwrap(), Value::scalar("d2"));

        let product = Expr::Concat(vec![
            lit("P"),
            Expr::Var("xs".into()),
            Expr::List(vec![lit("0"), lit("1")]),
        ]);
        assert_eq!(eval(&product, &env).await.unwrap(), list(&["Pa0", "Pa1", "Pb0", "Pb1"]));

        let empty = Expr::Concat(vec![lit("x"), Expr::Var("none".into())]);
        assert_eq!(eval(&empty, &env).await.unwrap(), Value::List(Vec::new()));
    }

    #[tokio::test]
    async fn list_broadcasts_against_scalar() {
        let env = Env::new();
        let xs = Expr::List(vec![lit("1"), lit("2"), lit("3")]);
        let expr = bin(BinaryOp::Eq, bin(BinaryOp::Mod, xs, lit("2")), lit("1"));
        assert_eq!(eval(&expr, &env).await.unwrap(), list(&["true", "false", "true"]));
    }

    #[tokio::test]
    async fn unequal_lengths_compare_false() {
        let env = Env::new();
        let expr = bin(
            BinaryOp::Eq,
            Expr::List(vec![lit("1"), lit("2")]),
            Expr::List(vec![lit("1")]),
        );
        assert_eq!(eval(&expr, &env).await.unwrap(), Value::bool(false));
    }

    #[tokio::test]
    async fn unequal_lengths_in_arithmetic_are_fatal() {
        let env = Env::new();
        let expr = bin(
            BinaryOp::Add,
            Expr::List(vec![lit("1"), lit("2")]),
            Expr::List(vec![lit("1")]),
        );
        assert!(matches!(eval(&expr, &env).await, Err(Fault::Fatal(RuntimeError::Type(_)))));
    }

    #[tokio::test]
    async fn comparison_falls_back_to_text() {
        let env = Env::new();
        let expr = bin(BinaryOp::Lt, lit("9"), lit("10"));
        assert_eq!(eval(&expr, &env).await.unwrap(), Value::bool(true));
        let expr = bin(BinaryOp::Lt, lit("b"), lit("a"));
        assert_eq!(eval(&expr, &env).await.unwrap(), Value::bool(false));
    }

    #[tokio::test]
    async fn undefined_variable_is_fatal() {
        let env = Env::new();
        let result = eval(&Expr::Var("nope".into()), &env).await;
        assert!(matches!(result, Err(Fault::Fatal(RuntimeError::UndefinedVariable(_)))));
    }

    #[tokio::test]
    async fn indexing_counts_negative_from_end() {
        let env = Env::new();
        env.define("xs", list(&["a", "b", "c"]));
        let at = |i: &str| Expr::Index {
            target: Box::new(Expr::Var("xs".into())),
            index: Index::At(Box::new(lit(i))),
        };
        assert_eq!(eval(&at("0"), &env).await.unwrap(), Value::scalar("a"));
        assert_eq!(eval(&at("-1"), &env).await.unwrap(), Value::scalar("c"));
        assert!(matches!(eval(&at("3"), &env).await, Err(Fault::Soft(_))));
        assert!(matches!(eval(&at("-4"), &env).await, Err(Fault::Soft(_))));
    }

    #[tokio::test]
    async fn slicing_is_half_open() {
        let env = Env::new();
        env.define("xs", list(&["a", "b", "c", "d"]));
        let slice = |s: Option<&str>, e: Option<&str>| Expr::Index {
            target: Box::new(Expr::Var("xs".into())),
            index: Index::Slice {
                start: s.map(|s| Box::new(lit(s))),
                end: e.map(|e| Box::new(lit(e))),
            },
        };
        assert_eq!(eval(&slice(Some("1"), Some("3")), &env).await.unwrap(), list(&["b", "c"]));
        assert_eq!(eval(&slice(Some("2"), None), &env).await.unwrap(), list(&["c", "d"]));
        assert_eq!(eval(&slice(Some("1"), Some("0")), &env).await.unwrap(), list(&["b", "c", "d"]));
        assert_eq!(eval(&slice(Some("0"), Some("-1")), &env).await.unwrap(), list(&["a", "b", "c"]));
        assert!(matches!(eval(&slice(Some("3"), Some("2")), &env).await, Err(Fault::Soft(_))));
        assert!(matches!(eval(&slice(Some("0"), Some("9")), &env).await, Err(Fault::Soft(_))));
    }

    #[tokio::test]
    async fn length_of_scalar_is_one() {
        let env = Env::new();
        env.define("s", Value::scalar("hello"));
        env.define("xs", list(&["a", "b"]));
        assert_eq!(eval(&Expr::Length("s".into()), &env).await.unwrap(), Value::int(1));
        assert_eq!(eval(&Expr::Length("xs".into()), &env).await.unwrap(), Value::int(2));
    }

    #[tokio::test]
    async fn interpolation_renders_values() {
        let env = Env::new();
        env.define("name", Value::scalar("world"));
        env.define("xs", list(&["1", "2"]));
        let expr = Expr::Interpolated(vec![
            StringPart::Literal("hello ".into()),
            StringPart::Var("name".into()),
            StringPart::Literal(": ".into()),
            StringPart::Var("xs".into()),
        ]);
        assert_eq!(eval(&expr, &env).await.unwrap(), Value::scalar("hello world: 1 2"));
    }

    #[tokio::test]
    async fn logical_operators_short_circuit() {
        let env = Env::new();
        let expr = bin(BinaryOp::And, lit("false"), Expr::Var("undefined".into()));
        assert_eq!(eval(&expr, &env).await.unwrap(), Value::bool(false));
        let expr = bin(BinaryOp::Or, lit("1"), Expr::Var("undefined".into()));
        assert_eq!(eval(&expr, &env).await.unwrap(), Value::bool(true));
    }

    #[tokio::test]
    async fn arithmetic_on_text_is_fatal() {
        let env = Env::new();
        let expr = bin(BinaryOp::Add, lit("x"), lit("1"));
        assert!(matches!(eval(&expr, &env).await, Err(Fault::Fatal(RuntimeError::Type(_)))));
    }

    #[tokio::test]
    async fn capture_without_kernel_is_fatal() {
        let env = Env::new();
        let result = eval(&Expr::Capture(vec![]), &env).await;
        assert!(matches!(result, Err(Fault::Fatal(RuntimeError::Tool(_)))));
    }
}
