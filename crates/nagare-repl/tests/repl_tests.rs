//! Integration tests for the nagare REPL.

use nagare_kernel::KernelConfig;
use nagare_repl::{ExitRequested, Repl};

fn repl() -> Repl {
    Repl::with_config(KernelConfig::transient()).expect("Failed to create REPL")
}

/// Run each input through one REPL and collect what it displays.
fn run_lines(lines: &[&str]) -> Vec<String> {
    let mut repl = repl();
    let mut outputs = Vec::new();
    for line in lines {
        match repl.process_line(line) {
            Ok(Some(output)) if !output.is_empty() => outputs.push(output),
            Ok(_) => {}
            Err(e) => outputs.push(format!("ERROR: {}", e)),
        }
    }
    outputs
}

#[test]
fn executes_and_shows_output() {
    let outputs = run_lines(&["yield a b"]);
    assert_eq!(outputs, vec!["a\nb"]);
}

#[test]
fn state_persists_between_lines() {
    let outputs = run_lines(&["let $x = 41", "fun inc $n { yield ($n + 1) }", "inc $x"]);
    assert_eq!(outputs.last().unwrap(), "42");
}

#[test]
fn failed_status_is_reported() {
    let outputs = run_lines(&["false"]);
    assert_eq!(outputs, vec!["✗ status=1"]);
}

#[test]
fn errors_are_displayed_not_raised() {
    let outputs = run_lines(&["nope", "yield still-alive"]);
    assert!(outputs[0].starts_with("Error:"), "{}", outputs[0]);
    assert!(outputs[0].contains("undefined function: nope"));
    assert_eq!(outputs[1], "still-alive");
}

#[test]
fn empty_input_shows_nothing() {
    assert!(run_lines(&["", "   "]).is_empty());
}

#[test]
fn quit_requests_exit() {
    for cmd in ["/quit", "/q", "quit", "exit"] {
        let err = repl().process_line(cmd).unwrap_err();
        assert!(err.is::<ExitRequested>(), "{}", cmd);
    }
}

#[test]
fn help_is_available_both_ways() {
    let outputs = run_lines(&["/help", "help"]);
    assert!(outputs.iter().all(|o| o.contains("REPL commands")));
}

#[test]
fn ast_mode_toggles() {
    let outputs = run_lines(&["/ast", "yield a", "/ast", "yield a"]);
    assert_eq!(outputs[0], "AST mode: ON");
    assert!(outputs[1].contains("Yield"));
    assert_eq!(outputs[2], "AST mode: OFF");
    assert_eq!(outputs[3], "a");
}

#[test]
fn listing_commands() {
    let outputs = run_lines(&["fun mine { }", "/funcs", "/tools", "/jobs"]);
    assert!(outputs[0].contains("mine"));
    assert!(outputs[0].contains("qsort"));
    assert!(outputs[1].contains("echo"));
    assert_eq!(outputs[2], "(no background jobs)");
}

#[test]
fn jobs_are_listed() {
    let outputs = run_lines(&["let $h = spawn { yield x }", "join $h", "/jobs"]);
    assert!(outputs.last().unwrap().contains("[%1] done"), "{:?}", outputs);
}

#[test]
fn unknown_meta_command() {
    let outputs = run_lines(&["/bogus"]);
    assert!(outputs[0].starts_with("Unknown command: /bogus"));
}
