//! sleep: Delay for a specified time.

use async_trait::async_trait;
use std::time::Duration;

use crate::interpreter::ControlFlow;
use crate::tools::{ExecContext, ParamSchema, Tool, ToolArgs, ToolResult, ToolSchema};

/// Sleep tool: pause the calling stage without blocking other tasks.
pub struct Sleep;

#[async_trait]
impl Tool for Sleep {
    fn name(&self) -> &str {
        "sleep"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new("sleep", "Delay for a specified time").param(ParamSchema::required(
            "seconds",
            "number",
            "Number of seconds to sleep (supports decimals)",
        ))
    }

    async fn execute(&self, args: ToolArgs, _ctx: &mut ExecContext) -> ToolResult {
        let text = args.get_string(0).unwrap_or_default();
        let seconds = match parse_seconds(&text) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("sleep: {}", e);
                return Ok(ControlFlow::fail());
            }
        };

        tokio::time::sleep(Duration::from_secs_f64(seconds)).await;
        Ok(ControlFlow::ok())
    }
}

/// Parse a non-negative number of seconds, with an optional `s` suffix.
fn parse_seconds(s: &str) -> Result<f64, String> {
    let s = s.trim();
    let num = s.strip_suffix('s').unwrap_or(s);
    let seconds: f64 = num
        .parse()
        .map_err(|_| format!("invalid time interval '{}'", s))?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(format!("invalid time interval '{}'", s));
    }
    Ok(seconds)
}
