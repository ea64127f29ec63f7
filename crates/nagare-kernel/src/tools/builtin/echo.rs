//! echo / print: Yield the arguments as one line.

use async_trait::async_trait;

use crate::ast::Value;
use crate::tools::{ExecContext, ParamSchema, Tool, ToolArgs, ToolResult, ToolSchema};

/// Echo tool: joins its arguments with single spaces and yields the result
/// as one scalar. Registered as both `echo` and `print`.
pub struct Echo {
    name: &'static str,
}

impl Echo {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

#[async_trait]
impl Tool for Echo {
    fn name(&self) -> &str {
        self.name
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new(self.name, "Yield the arguments joined by spaces")
            .param(ParamSchema::optional("args", "any", "Values to print"))
            .variadic()
    }

    async fn execute(&self, args: ToolArgs, ctx: &mut ExecContext) -> ToolResult {
        let line = args.strings().join(" ");
        Ok(ctx.emit_then([Value::Scalar(line)], 0).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::ControlFlow;
    use crate::scheduler::InputPort;
    use crate::tools::builtin::testing;

    #[tokio::test]
    async fn joins_arguments() {
        let (result, out) = testing::run(&Echo::new("echo"), &["hello", "world"], InputPort::closed(), testing::host("/")).await;
        assert_eq!(result.unwrap(), ControlFlow::ok());
        assert_eq!(out, vec![Value::scalar("hello world")]);
    }

    #[tokio::test]
    async fn no_arguments_yields_empty_line() {
        let (_, out) = testing::run(&Echo::new("print"), &[], InputPort::closed(), testing::host("/")).await;
        assert_eq!(out, vec![Value::scalar("")]);
    }
}
