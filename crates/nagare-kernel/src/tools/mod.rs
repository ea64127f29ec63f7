//! Host primitives.
//!
//! Host primitives are ordinary functions that happen to be implemented in
//! Rust. They live in the global function namespace and user code may
//! shadow them, globally or only for the extent of one call.
//!
//! # Architecture
//!
//! ```text
//! resolution order for `name args...`
//! ├── overlays of the current call and its callers (innermost first)
//! ├── global user functions (top-level `fun`)
//! ├── ToolRegistry (echo, exec, env, cd, ...)
//! └── external command (when enabled)
//! ```

mod builtin;
mod context;
mod registry;
mod traits;

pub use builtin::{register_builtins, run_external, Stdin};
pub use context::{ExecContext, HostState};
pub use registry::ToolRegistry;
pub use traits::{ParamSchema, Tool, ToolArgs, ToolResult, ToolSchema};
