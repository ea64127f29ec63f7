//! nagare-kernel (流れ): the core of the nagare pipeline language.
//!
//! This crate provides:
//!
//! - **Lexer**: Tokenizes nagare source code using logos
//! - **Parser**: Builds the AST by recursive descent
//! - **AST**: Statements, expressions and the runtime `Value`
//! - **Interpreter**: Environments, patterns, expression evaluation, call frames
//! - **Scheduler**: Lazy pipelines over single-slot pipes and background jobs
//! - **Tools**: Host primitives (`echo`, `exec`, `cd`, ...) behind the `Tool` trait
//! - **Kernel**: Statement execution and the embedding API

pub mod arithmetic;
pub mod ast;
pub mod interpreter;
pub mod kernel;
pub mod lexer;
pub mod parser;
pub mod scheduler;
pub mod tools;

pub use ast::Value;
pub use interpreter::RuntimeError;
pub use kernel::{ExecResult, JobExitPolicy, Kernel, KernelConfig, PRELUDE};
pub use parser::{ParseError, parse};
pub use tools::{Tool, ToolArgs, ToolResult, ToolSchema};
