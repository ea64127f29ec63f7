//! Integration tests for deferred statements.

use nagare_kernel::{ExecResult, Kernel};

async fn run(source: &str) -> ExecResult {
    let kernel = Kernel::transient().unwrap();
    kernel
        .execute(source)
        .await
        .unwrap_or_else(|e| panic!("execution of {:?} failed: {:#}", source, e))
}

/// Run with streaming output so values yielded before a fatal error are kept.
async fn run_streaming(source: &str) -> (anyhow::Result<i64>, Vec<String>) {
    let kernel = Kernel::transient().unwrap();
    let mut seen = Vec::new();
    let result = kernel
        .execute_streaming(source, &mut |v| seen.push(v.to_string()))
        .await;
    (result, seen)
}

fn texts(result: &ExecResult) -> Vec<String> {
    result.output.iter().map(|v| v.to_string()).collect()
}

#[tokio::test]
async fn defers_run_last_first_after_the_body() {
    let result = run(
        r#"
fun f {
    defer yield D1
    defer yield D2
    defer yield D3
    yield body
}
f
"#,
    )
    .await;
    assert_eq!(texts(&result), vec!["body", "D3", "D2", "D1"]);
}

#[tokio::test]
async fn defers_run_on_early_return() {
    let result = run(
        r#"
fun f {
    defer yield cleanup
    if true {
        return 2
    }
    yield unreachable
}
f
"#,
    )
    .await;
    assert_eq!(texts(&result), vec!["cleanup"]);
    assert_eq!(result.status, 2);
}

#[tokio::test]
async fn defers_run_when_a_fatal_error_unwinds() {
    let (result, seen) = run_streaming(
        r#"
fun f {
    defer yield cleanup
    yield (1 / 0)
}
f
"#,
    )
    .await;
    let err = result.unwrap_err();
    assert!(format!("{:#}", err).contains("division by zero"));
    assert_eq!(seen, vec!["cleanup"]);
}

#[tokio::test]
async fn failing_defer_does_not_stop_the_others() {
    let (result, seen) = run_streaming(
        r#"
fun f {
    defer yield one
    defer yield (1 / 0)
    defer yield three
}
f
"#,
    )
    .await;
    assert!(result.is_err());
    assert_eq!(seen, vec!["three", "one"]);
}

#[tokio::test]
async fn defers_registered_in_loop_stages_belong_to_the_function() {
    let result = run(
        r#"
fun f {
    range 3 | while fetch $i {
        defer yield $i
    }
    yield body
}
f
yield end
"#,
    )
    .await;
    assert_eq!(texts(&result), vec!["body", "2", "1", "0", "end"]);
}

#[tokio::test]
async fn deferred_statement_sees_a_snapshot() {
    let result = run(
        r#"
fun f {
    let $v = before
    defer yield $v
    let $v = after
    yield $v
}
f
"#,
    )
    .await;
    assert_eq!(texts(&result), vec!["after", "before"]);
}

#[tokio::test]
async fn top_level_defers_run_at_program_end() {
    let result = run("defer yield last\nyield first").await;
    assert_eq!(texts(&result), vec!["first", "last"]);
}

#[tokio::test]
async fn defers_registered_while_tearing_down_also_run() {
    let result = run(
        r#"
fun f {
    defer {
        defer yield inner
        yield outer
    }
}
f
"#,
    )
    .await;
    assert_eq!(texts(&result), vec!["outer", "inner"]);
}

#[tokio::test]
async fn break_escaping_a_function_runs_defers() {
    let result = run(
        r#"
fun f {
    defer yield cleaned
    while true {
        break 5
    }
}
f
"#,
    )
    .await;
    assert_eq!(texts(&result), vec!["cleaned"]);
    assert_eq!(result.status, 4);
}

#[tokio::test]
async fn defers_do_not_change_the_status() {
    let result = run("fun f { defer false; true }\nf").await;
    assert_eq!(result.status, 0);
}
