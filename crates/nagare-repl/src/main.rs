//! nagare CLI entry point.
//!
//! Usage:
//!   nagare [OPTIONS]                 # Interactive REPL
//!   nagare [OPTIONS] -c <source>     # Execute source and exit
//!   nagare [OPTIONS] script.ngr      # Run a script
//!
//! The process exits with the status of the last top-level statement.

use std::env;
use std::io::Write;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use nagare_kernel::{JobExitPolicy, Kernel, KernelConfig, Value};

fn main() -> ExitCode {
    // Logs go to stderr; stdout carries program output.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::FAILURE
        }
    }
}

/// Flags that apply to every mode.
#[derive(Debug, Default)]
struct Options {
    json: bool,
    no_prelude: bool,
    await_jobs: bool,
}

impl Options {
    fn config(&self) -> KernelConfig {
        let policy = if self.await_jobs {
            JobExitPolicy::Await
        } else {
            JobExitPolicy::Abandon
        };
        KernelConfig::repl()
            .with_prelude(!self.no_prelude)
            .with_job_exit_policy(policy)
    }
}

fn run() -> Result<ExitCode> {
    let args: Vec<String> = env::args().skip(1).collect();

    let mut options = Options::default();
    let mut rest = args.iter().map(String::as_str).peekable();
    while let Some(flag) = rest.peek().copied() {
        match flag {
            "--json" => options.json = true,
            "--no-prelude" => options.no_prelude = true,
            "--await-jobs" => options.await_jobs = true,
            _ => break,
        }
        rest.next();
    }
    let rest: Vec<&str> = rest.collect();

    match rest.first().copied() {
        None => {
            nagare_repl::run(options.config())?;
            Ok(ExitCode::SUCCESS)
        }

        Some("--help" | "-h") => {
            print_help();
            Ok(ExitCode::SUCCESS)
        }

        Some("--version" | "-V") => {
            println!("nagare {}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }

        Some("-c") => {
            let source = rest.get(1).context("-c requires a source argument")?;
            run_source(source, &options)
        }

        Some(path) if !path.starts_with('-') => {
            let source = std::fs::read_to_string(path).with_context(|| format!("Failed to read script: {path}"))?;
            run_source(&source, &options)
        }

        Some(unknown) => {
            eprintln!("Unknown option: {unknown}");
            eprintln!("Run 'nagare --help' for usage.");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_help() {
    println!(
        r#"流れ — nagare v{}

Usage:
  nagare [OPTIONS]                 Interactive REPL
  nagare [OPTIONS] -c <source>     Execute source and exit
  nagare [OPTIONS] <script.ngr>    Run a script file

Options:
  --json                           Print each output value as a JSON line
  --no-prelude                     Do not load the standard prelude
  --await-jobs                     Wait for unjoined background jobs before exiting
  -c <source>                      Execute source and exit
  -h, --help                       Show this help
  -V, --version                    Show version

Environment:
  RUST_LOG                         Log filter, e.g. RUST_LOG=nagare_kernel=debug

Examples:
  nagare -c 'range 5 | sum'
  nagare -c '3 1 2 -> qsort'
  nagare --json -c 'yield (a b) c'
"#,
        env!("CARGO_PKG_VERSION")
    );
}

/// Run source code, streaming values to stdout as they are yielded.
fn run_source(source: &str, options: &Options) -> Result<ExitCode> {
    let kernel = Kernel::new(options.config()).context("Failed to create kernel")?;
    let rt = tokio::runtime::Runtime::new()?;

    let json = options.json;
    let mut stdout = std::io::stdout();
    let mut on_output = |value: &Value| {
        let line = if json {
            serde_json::to_string(value).unwrap_or_else(|_| value.to_string())
        } else {
            value.to_string()
        };
        if let Err(e) = writeln!(stdout, "{}", line) {
            tracing::warn!("Failed to write output: {}", e);
        }
    };

    let status = rt.block_on(kernel.execute_streaming(source, &mut on_output));
    rt.block_on(kernel.shutdown());
    let status = status?;

    Ok(ExitCode::from(exit_code(status)))
}

/// Truncate a status to a process exit code without turning a failure into
/// success.
fn exit_code(status: i64) -> u8 {
    match status as u8 {
        0 if status != 0 => 1,
        code => code,
    }
}
