//! env: Read and set environment variables.
//!
//! - `env` yields `NAME VALUE` pairs for every variable
//! - `env NAME` yields the value, or fails when unset
//! - `env NAME VALUE` sets the variable for this kernel and the processes
//!   it starts

use async_trait::async_trait;

use crate::ast::Value;
use crate::interpreter::ControlFlow;
use crate::tools::{ExecContext, ParamSchema, Tool, ToolArgs, ToolResult, ToolSchema};

/// Env tool: environment variable access.
pub struct Env;

#[async_trait]
impl Tool for Env {
    fn name(&self) -> &str {
        "env"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new("env", "Read or set environment variables")
            .param(ParamSchema::optional("name", "string", "Variable to read or set"))
            .param(ParamSchema::optional("value", "string", "New value"))
    }

    async fn execute(&self, args: ToolArgs, ctx: &mut ExecContext) -> ToolResult {
        match (args.get_string(0), args.get_string(1)) {
            (None, _) => {
                let pairs = ctx
                    .host
                    .vars()
                    .into_iter()
                    .flat_map(|(k, v)| [Value::Scalar(k), Value::Scalar(v)]);
                let pairs: Vec<Value> = pairs.collect();
                Ok(ctx.emit_then(pairs, 0).await)
            }
            (Some(name), None) => match ctx.host.var(&name) {
                Some(value) => Ok(ctx.emit_then([Value::Scalar(value)], 0).await),
                None => Ok(ControlFlow::fail()),
            },
            (Some(name), Some(value)) => {
                ctx.host.set_var(name, value);
                Ok(ControlFlow::ok())
            }
        }
    }
}
