//! Interpreter building blocks.
//!
//! The interpreter is built in layers:
//!
//! - **Env**: chained, shared variable frames with closure capture
//! - **Evaluator**: reduces expressions to values
//! - **Pattern**: match-and-bind for `let`, `fetch` and parameters
//! - **CallFrame**: per-invocation function overlay and defer stack
//! - **ControlFlow**: structured exits (`return`, `break`, `continue`)
//!
//! Statement execution lives in [`crate::kernel`], which plugs into the
//! evaluator through the [`Executor`] trait.
//!
//! # Example
//!
//! ```
//! use nagare_kernel::interpreter::{Env, Evaluator, NoOpExecutor};
//! use nagare_kernel::ast::{BinaryOp, Expr, Value};
//!
//! # tokio_test_block(async {
//! let env = Env::new();
//! env.define("x", Value::int(-13));
//!
//! let expr = Expr::Binary {
//!     op: BinaryOp::Mod,
//!     left: Box::new(Expr::Var("x".into())),
//!     right: Box::new(Expr::Literal("10".into())),
//! };
//! let value = Evaluator::new(&env, &NoOpExecutor).eval(&expr).await.ok();
//! assert_eq!(value, Some(Value::int(7)));
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f);
//! # }
//! ```

mod control_flow;
mod error;
mod eval;
mod frame;
pub mod pattern;
mod scope;

pub use control_flow::ControlFlow;
pub use error::{EvalResult, Fault, RuntimeError};
pub use eval::{binary, normalize_slice, unary, Evaluator, Executor, NoOpExecutor};
pub use frame::{CallFrame, Deferred, FrameKind, Function, Snapshots, snapshot_functions};
pub use scope::Env;
