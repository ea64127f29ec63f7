//! nagare REPL: interactive shell for the nagare pipeline language.
//!
//! Lines are read with rustyline and run on an embedded [`Kernel`]. Input
//! that is obviously unfinished (an open block, a trailing `|`, `&&`, `||`
//! or `->`) keeps reading on a continuation prompt. Lines starting with `/`
//! are REPL commands; `help`, `quit` and `exit` also work bare.

use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use tokio::runtime::Runtime;

use nagare_kernel::lexer::{tokenize, LexerError, Token};
use nagare_kernel::{ExecResult, Kernel, KernelConfig};

/// Returned by [`Repl::process_line`] when the user asked to leave.
#[derive(Debug)]
pub struct ExitRequested;

impl fmt::Display for ExitRequested {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("exit requested")
    }
}

impl std::error::Error for ExitRequested {}

/// A REPL command, written `/name` or (for a few) as a bare word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Meta {
    Quit,
    Help,
    ToggleAst,
    Cwd,
    Funcs,
    Tools,
    Jobs,
}

impl Meta {
    /// Recognize a meta command. `Err` carries an unknown `/name`.
    fn parse(input: &str) -> Option<Result<Self, String>> {
        let meta = match input {
            "quit" | "exit" => Meta::Quit,
            "help" => Meta::Help,
            _ => {
                let name = input.strip_prefix('/')?.split_whitespace().next().unwrap_or("");
                match name {
                    "quit" | "q" | "exit" => Meta::Quit,
                    "help" | "h" | "?" => Meta::Help,
                    "ast" => Meta::ToggleAst,
                    "cwd" => Meta::Cwd,
                    "funcs" => Meta::Funcs,
                    "tools" => Meta::Tools,
                    "jobs" => Meta::Jobs,
                    other => return Some(Err(format!("/{}", other))),
                }
            }
        };
        Some(Ok(meta))
    }
}

/// An embedded kernel plus the runtime that drives it.
pub struct Repl {
    kernel: Kernel,
    runtime: Runtime,
    show_ast: bool,
}

impl Repl {
    /// Create a REPL with the interactive kernel configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(KernelConfig::repl())
    }

    /// Create a REPL around a kernel built from `config`.
    pub fn with_config(config: KernelConfig) -> Result<Self> {
        let runtime = Runtime::new().context("Failed to create tokio runtime")?;
        let kernel = Kernel::new(config).context("Failed to create kernel")?;
        Ok(Self {
            kernel,
            runtime,
            show_ast: false,
        })
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    /// Process one complete input.
    ///
    /// Returns `Ok(None)` for empty input and `Ok(Some(output))` for
    /// anything to display. Fails with [`ExitRequested`] when the user
    /// asked to leave; kernel errors are displayed, not returned.
    pub fn process_line(&mut self, line: &str) -> Result<Option<String>> {
        let input = line.trim();
        if input.is_empty() {
            return Ok(None);
        }

        match Meta::parse(input) {
            Some(Ok(Meta::Quit)) => return Err(ExitRequested.into()),
            Some(Ok(meta)) => return Ok(Some(self.meta(meta))),
            Some(Err(unknown)) => {
                return Ok(Some(format!("Unknown command: {}\nType /help for the command list.", unknown)));
            }
            None => {}
        }

        if self.show_ast {
            let shown = match nagare_kernel::parse(input) {
                Ok(program) => format!("{:#?}", program),
                Err(err) => format!("Parse error: {}", err),
            };
            return Ok(Some(shown));
        }

        let shown = match self.runtime.block_on(self.kernel.execute(input)) {
            Ok(result) => format_result(&result),
            Err(e) => format!("Error: {:#}", e),
        };
        Ok(Some(shown))
    }

    fn meta(&mut self, meta: Meta) -> String {
        match meta {
            Meta::Quit => String::new(),
            Meta::Help => HELP_TEXT.to_string(),
            Meta::ToggleAst => {
                self.show_ast = !self.show_ast;
                format!("AST mode: {}", if self.show_ast { "ON" } else { "OFF" })
            }
            Meta::Cwd => self.kernel.cwd().display().to_string(),
            Meta::Funcs => format!("Functions: {}", self.kernel.function_names().join(", ")),
            Meta::Tools => format!("Host primitives: {}", self.kernel.tool_names().join(", ")),
            Meta::Jobs => {
                let jobs = self.kernel.jobs().list();
                if jobs.is_empty() {
                    return "(no background jobs)".to_string();
                }
                jobs.iter()
                    .map(|job| format!("[{}] {} {}", job.id, job.status, job.command))
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        }
    }

    /// Apply the kernel's job exit policy before leaving.
    pub fn shutdown(&self) {
        self.runtime.block_on(self.kernel.shutdown());
    }
}

/// True if `source` cannot be complete yet: an unclosed `{`, `(` or `[`,
/// an unterminated string, or a trailing operator that needs a right side.
pub fn is_incomplete(source: &str) -> bool {
    if source.trim_end().ends_with('\\') {
        return true;
    }
    let tokens = match tokenize(source) {
        Ok(tokens) => tokens,
        Err(errors) => {
            return errors
                .iter()
                .any(|e| matches!(e.token, LexerError::UnterminatedString));
        }
    };

    let mut depth: i64 = 0;
    for spanned in &tokens {
        match spanned.token {
            Token::LBrace | Token::LParen | Token::LBracket => depth += 1,
            Token::RBrace | Token::RParen | Token::RBracket => depth -= 1,
            _ => {}
        }
    }
    if depth > 0 {
        return true;
    }

    let last = tokens.iter().rev().find(|t| !matches!(t.token, Token::Newline));
    matches!(
        last.map(|t| &t.token),
        Some(Token::Pipe | Token::And | Token::Or | Token::Arrow)
    )
}

/// Format an ExecResult for display: one value per line, then the status
/// when it is not zero.
pub fn format_result(result: &ExecResult) -> String {
    let mut output = result.text();
    if !result.ok() {
        if !output.is_empty() {
            output.push('\n');
        }
        output.push_str(&format!("✗ status={}", result.status));
    }
    output
}

const HELP_TEXT: &str = r#"流れ — nagare REPL

REPL commands:
  /help  (help)     This text
  /quit  (quit)     Leave; also Ctrl-D
  /ast              Print parse trees instead of running input
  /cwd              Working directory
  /funcs            Defined functions
  /tools            Host primitives
  /jobs             Background jobs and their status

Language:
  let $x = 1 2      Bind variables from a value stream
  yield $x          Write values to the output stream
  fetch $a $b       Read values from the input stream
  a | b | c         Pipeline: each stage runs as its consumer demands
  1 2 3 -> f        Feed literal values into a pipeline
  [ f ]             Capture a stream as a list
  $xs(1 : 3)        Slice; $xs(-1) indexes from the end
  fun f $a ($r) { } Define a function (rest parameter in parens)
  defer stmt        Run stmt when the enclosing call ends
  spawn { }, & { }  Start a background job; join $h waits for it

Examples:
  range 10 | select 1 0 1 | sum
  3 1 2 -> qsort
  let $h = & { sleep 1; yield done }; join $h
  ls -> exec sort            # external commands run when not defined
"#;

/// Line history kept under the user's data directory.
struct History {
    path: Option<PathBuf>,
}

impl History {
    fn locate() -> Self {
        let path = directories::ProjectDirs::from("", "", "nagare").map(|dirs| dirs.data_dir().join("history.txt"));
        Self { path }
    }

    fn load(&self, rl: &mut Editor<(), DefaultHistory>) {
        let Some(path) = &self.path else { return };
        match rl.load_history(path) {
            Ok(()) => {}
            Err(ReadlineError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %path.display(), "could not load history: {}", e),
        }
    }

    fn save(&self, rl: &mut Editor<(), DefaultHistory>) {
        let Some(path) = &self.path else { return };
        if let Some(dir) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(dir) {
                tracing::warn!(dir = %dir.display(), "could not create history directory: {}", e);
                return;
            }
        }
        if let Err(e) = rl.save_history(path) {
            tracing::warn!(path = %path.display(), "could not save history: {}", e);
        }
    }
}

/// Run the interactive loop until `/quit` or end of input.
pub fn run(config: KernelConfig) -> Result<()> {
    let mut repl = Repl::with_config(config)?;
    let mut rl: Editor<(), DefaultHistory> = Editor::new().context("Failed to create editor")?;
    let history = History::locate();
    history.load(&mut rl);

    println!("流れ nagare v{}  (/help for commands)", env!("CARGO_PKG_VERSION"));

    let mut pending = String::new();
    loop {
        let prompt = if pending.is_empty() { "流れ> " } else { "...> " };
        let line = match rl.readline(prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                pending.clear();
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Error: {}", e);
                break;
            }
        };

        if !pending.is_empty() {
            pending.push('\n');
        }
        pending.push_str(&line);
        if is_incomplete(&pending) {
            continue;
        }
        let input = std::mem::take(&mut pending);
        if let Err(e) = rl.add_history_entry(input.as_str()) {
            tracing::debug!("history entry rejected: {}", e);
        }

        match repl.process_line(&input) {
            Ok(Some(output)) if !output.is_empty() => println!("{}", output),
            Ok(_) => {}
            Err(e) if e.is::<ExitRequested>() => break,
            Err(e) => eprintln!("Error: {:#}", e),
        }
    }

    history.save(&mut rl);
    repl.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_inputs() {
        assert!(!is_incomplete("yield a"));
        assert!(!is_incomplete("fun f { yield a }"));
        assert!(!is_incomplete(""));
        assert!(!is_incomplete("yield a }"));
    }

    #[test]
    fn open_blocks_need_more() {
        assert!(is_incomplete("fun f {"));
        assert!(is_incomplete("while true {\n  yield ("));
        assert!(is_incomplete("let $x = [range 3"));
    }

    #[test]
    fn trailing_operators_need_more() {
        assert!(is_incomplete("range 3 |"));
        assert!(is_incomplete("false ||"));
        assert!(is_incomplete("true &&\n"));
        assert!(is_incomplete("1 2 ->"));
        assert!(is_incomplete("yield a \\"));
    }

    #[test]
    fn unterminated_string_needs_more() {
        assert!(is_incomplete("yield \"abc"));
    }

    #[test]
    fn failed_status_is_shown() {
        let result = ExecResult {
            status: 2,
            output: vec![nagare_kernel::Value::scalar("a")],
        };
        assert_eq!(format_result(&result), "a\n✗ status=2");
        assert_eq!(format_result(&ExecResult::default()), "");
    }
}
