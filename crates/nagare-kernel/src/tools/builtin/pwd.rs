//! pwd: Yield the working directory.

use async_trait::async_trait;

use crate::ast::Value;
use crate::tools::{ExecContext, Tool, ToolArgs, ToolResult, ToolSchema};

/// Pwd tool: yield the current working directory.
pub struct Pwd;

#[async_trait]
impl Tool for Pwd {
    fn name(&self) -> &str {
        "pwd"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new("pwd", "Yield the current working directory")
    }

    async fn execute(&self, _args: ToolArgs, ctx: &mut ExecContext) -> ToolResult {
        let cwd = ctx.cwd().to_string_lossy().into_owned();
        Ok(ctx.emit_then([Value::Scalar(cwd)], 0).await)
    }
}
