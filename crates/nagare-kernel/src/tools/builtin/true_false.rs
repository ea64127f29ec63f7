//! true/false: Status-only builtins.
//!
//! - `true` finishes with status 0 (success)
//! - `false` finishes with status 1 (failure)
//!
//! Used in conditions like `while true { ... }`.

use async_trait::async_trait;

use crate::interpreter::ControlFlow;
use crate::tools::{ExecContext, Tool, ToolArgs, ToolResult, ToolSchema};

/// True builtin: always succeeds (status 0).
pub struct True;

#[async_trait]
impl Tool for True {
    fn name(&self) -> &str {
        "true"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new("true", "Finish with success (status 0)")
    }

    async fn execute(&self, _args: ToolArgs, _ctx: &mut ExecContext) -> ToolResult {
        Ok(ControlFlow::ok())
    }
}

/// False builtin: always fails (status 1).
pub struct False;

#[async_trait]
impl Tool for False {
    fn name(&self) -> &str {
        "false"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new("false", "Finish with failure (status 1)")
    }

    async fn execute(&self, _args: ToolArgs, _ctx: &mut ExecContext) -> ToolResult {
        Ok(ControlFlow::fail())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::InputPort;
    use crate::tools::builtin::testing;

    #[tokio::test]
    async fn true_returns_success() {
        let (result, out) = testing::run(&True, &[], InputPort::closed(), testing::host("/")).await;
        assert_eq!(result.unwrap(), ControlFlow::Normal(0));
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn false_returns_failure() {
        let (result, _) = testing::run(&False, &[], InputPort::closed(), testing::host("/")).await;
        assert_eq!(result.unwrap(), ControlFlow::Normal(1));
    }

    #[test]
    fn both_take_no_arguments() {
        assert!(True.schema().check_arity(1).is_err());
        assert!(False.schema().check_arity(0).is_ok());
    }
}
