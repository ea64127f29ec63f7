//! cd: Change the working directory.
//!
//! The directory is resolved against the current working directory and
//! must exist. Failure is non-fatal (status 1).

use async_trait::async_trait;

use crate::interpreter::ControlFlow;
use crate::tools::{ExecContext, ParamSchema, Tool, ToolArgs, ToolResult, ToolSchema};

/// Cd tool: change the kernel's working directory.
pub struct Cd;

#[async_trait]
impl Tool for Cd {
    fn name(&self) -> &str {
        "cd"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new("cd", "Change the working directory")
            .param(ParamSchema::required("dir", "string", "Directory to change to"))
    }

    async fn execute(&self, args: ToolArgs, ctx: &mut ExecContext) -> ToolResult {
        let Some(dir) = args.get_string(0) else {
            return Ok(ControlFlow::fail());
        };
        let target = ctx.resolve_path(&dir);

        match tokio::fs::metadata(&target).await {
            Ok(meta) if meta.is_dir() => {
                let target = tokio::fs::canonicalize(&target).await.unwrap_or(target);
                tracing::debug!(cwd = %target.display(), "cd");
                ctx.host.set_cwd(target);
                Ok(ControlFlow::ok())
            }
            Ok(_) => {
                tracing::warn!("cd: {}: not a directory", dir);
                Ok(ControlFlow::fail())
            }
            Err(e) => {
                tracing::warn!("cd: {}: {}", dir, e);
                Ok(ControlFlow::fail())
            }
        }
    }
}
