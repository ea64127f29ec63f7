//! exec: Run an external process as a pipeline stage.
//!
//! The stage's input stream is written to the process's stdin, one value
//! per line, and every stdout line is yielded as a scalar. The status is
//! the process exit code; failing to start the process is status 127.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

use crate::ast::Value;
use crate::interpreter::ControlFlow;
use crate::scheduler::InputPort;
use crate::tools::{ExecContext, ParamSchema, Tool, ToolArgs, ToolResult, ToolSchema};

/// Status reported when a program cannot be started.
pub const SPAWN_FAILED: i64 = 127;

/// What an external process reads on stdin.
pub enum Stdin {
    /// Nothing (`/dev/null`).
    Null,
    /// The values of a stage's input, one per line.
    Stream(InputPort),
}

/// Exec tool: run a program with the current input piped to it.
pub struct Exec;

#[async_trait]
impl Tool for Exec {
    fn name(&self) -> &str {
        "exec"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new("exec", "Run an external program, streaming input and output")
            .param(ParamSchema::required("program", "string", "Program name or path"))
            .param(ParamSchema::optional("args", "any", "Arguments passed to the program"))
            .variadic()
    }

    async fn execute(&self, args: ToolArgs, ctx: &mut ExecContext) -> ToolResult {
        self.schema().check_arity(args.len())?;
        let mut argv = args.strings();
        let program = argv.remove(0);
        run_external(&program, &argv, Stdin::Stream(ctx.input.clone()), ctx).await
    }
}

/// Run `program` with `args`, yielding its stdout lines to `ctx`.
///
/// Stops reading and kills the process when the downstream consumer goes
/// away. The process inherits stderr, the kernel's working directory and
/// its exported variables.
#[tracing::instrument(level = "debug", skip(args, stdin, ctx), fields(argc = args.len()))]
pub async fn run_external(program: &str, args: &[String], stdin: Stdin, ctx: &ExecContext) -> ToolResult {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(ctx.cwd())
        .envs(ctx.host.overrides())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);
    let input = match stdin {
        Stdin::Null => {
            cmd.stdin(Stdio::null());
            None
        }
        Stdin::Stream(input) => {
            cmd.stdin(Stdio::piped());
            Some(input)
        }
    };

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            tracing::warn!("{}: {}", program, e);
            return Ok(ControlFlow::Normal(SPAWN_FAILED));
        }
    };
    tracing::debug!(pid = child.id(), "external command started");

    let stdin_pipe = child.stdin.take();
    let stdout = child.stdout.take();

    let writer = async move {
        let (Some(mut pipe), Some(input)) = (stdin_pipe, input) else {
            return;
        };
        while let Some(values) = input.fetch(1).await {
            for value in values {
                let line = format!("{}\n", value);
                if pipe.write_all(line.as_bytes()).await.is_err() {
                    return;
                }
            }
        }
        let _ = pipe.shutdown().await;
    };

    let reader = async {
        let Some(stdout) = stdout else {
            return ControlFlow::ok();
        };
        let mut lines = BufReader::new(stdout).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if let Err(port) = ctx.emit(Value::Scalar(line)).await {
                        return ControlFlow::Closed(port);
                    }
                }
                Ok(None) => return ControlFlow::ok(),
                Err(e) => {
                    tracing::warn!("{}: reading output: {}", program, e);
                    return ControlFlow::ok();
                }
            }
        }
    };

    // Once stdout is exhausted the writer is dropped, closing stdin.
    tokio::pin!(writer);
    tokio::pin!(reader);
    let mut writer_done = false;
    let flow = loop {
        tokio::select! {
            () = &mut writer, if !writer_done => writer_done = true,
            flow = &mut reader => break flow,
        }
    };

    if let ControlFlow::Closed(_) = flow {
        let _ = child.kill().await;
        return Ok(flow);
    }

    match child.wait().await {
        Ok(status) => Ok(ControlFlow::Normal(status.code().map(i64::from).unwrap_or(-1))),
        Err(e) => {
            tracing::warn!("{}: {}", program, e);
            Ok(ControlFlow::fail())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::pipe;
    use crate::tools::builtin::testing;

    #[tokio::test]
    async fn missing_program_is_status_127() {
        let (result, out) = testing::run(
            &Exec,
            &["nagare-no-such-program-xyz"],
            InputPort::closed(),
            testing::host("/"),
        )
        .await;
        assert_eq!(result.unwrap(), ControlFlow::Normal(SPAWN_FAILED));
        assert!(out.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stdout_lines_are_yielded() {
        let (result, out) = testing::run(&Exec, &["printf", "a\\nb\\n"], InputPort::closed(), testing::host("/")).await;
        assert_eq!(result.unwrap(), ControlFlow::ok());
        assert_eq!(out, vec![Value::scalar("a"), Value::scalar("b")]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn input_stream_feeds_stdin() {
        let (tx, input) = pipe();
        let feed = async move {
            for v in ["3", "1", "2"] {
                tx.send(Value::scalar(v)).await.unwrap();
            }
        };
        let run = testing::run(&Exec, &["sort"], input, testing::host("/"));
        let ((), (result, out)) = futures::join!(feed, run);
        assert_eq!(result.unwrap(), ControlFlow::ok());
        assert_eq!(out, vec![Value::scalar("1"), Value::scalar("2"), Value::scalar("3")]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exit_code_becomes_status() {
        let (result, _) = testing::run(&Exec, &["sh", "-c", "exit 3"], InputPort::closed(), testing::host("/")).await;
        assert_eq!(result.unwrap(), ControlFlow::Normal(3));
    }

    #[test]
    fn needs_a_program() {
        assert!(Exec.schema().check_arity(0).is_err());
    }
}
