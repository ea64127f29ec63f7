//! Integration tests for function definition, resolution and invocation.

use nagare_kernel::{ExecResult, Kernel};

async fn run(source: &str) -> ExecResult {
    let kernel = Kernel::transient().unwrap();
    kernel
        .execute(source)
        .await
        .unwrap_or_else(|e| panic!("execution of {:?} failed: {:#}", source, e))
}

async fn run_err(source: &str) -> String {
    let kernel = Kernel::transient().unwrap();
    match kernel.execute(source).await {
        Ok(result) => panic!("expected {:?} to fail, got {:?}", source, result),
        Err(e) => format!("{:#}", e),
    }
}

fn texts(result: &ExecResult) -> Vec<String> {
    result.output.iter().map(|v| v.to_string()).collect()
}

#[tokio::test]
async fn recursive_factorial_through_capture() {
    let result = run(
        r#"
fun fact $n {
    if ($n <= 1) {
        yield 1
        return
    }
    yield ($n * [fact ($n - 1)])
}
fact 10
"#,
    )
    .await;
    assert_eq!(texts(&result), vec!["3628800"]);
}

#[tokio::test]
async fn ackermann() {
    let result = run(
        r#"
fun ack $m $n {
    if ($m == 0) {
        yield ($n + 1)
        return
    }
    if ($n == 0) {
        ack ($m - 1) 1
        return
    }
    ack ($m - 1) [ack $m ($n - 1)]
}
ack 2 3
"#,
    )
    .await;
    assert_eq!(texts(&result), vec!["9"]);
}

#[tokio::test]
async fn nested_definitions_close_over_the_defining_scope() {
    let result = run(
        r#"
fun outer {
    let $msg = OK
    fun middle {
        fun inner { yield $msg }
        inner
        inner
    }
    middle
    yield $msg
}
outer
"#,
    )
    .await;
    assert_eq!(texts(&result), vec!["OK", "OK", "OK"]);
}

#[tokio::test]
async fn local_definition_does_not_leak() {
    let result = run(
        r#"
fun greet { yield hello }
fun f {
    fun greet { yield hola }
    greet
}
f
greet
"#,
    )
    .await;
    assert_eq!(texts(&result), vec!["hola", "hello"]);
}

#[tokio::test]
async fn local_definition_shadows_for_callees() {
    let result = run(
        r#"
fun speak { echo loud }
fun quiet {
    fun echo ($args) { yield shh }
    speak
}
quiet
speak
"#,
    )
    .await;
    assert_eq!(texts(&result), vec!["shh", "loud"]);
}

#[tokio::test]
async fn top_level_definition_inside_block_is_global() {
    let result = run("{ fun later { yield defined } }\nlater").await;
    assert_eq!(texts(&result), vec!["defined"]);
}

#[tokio::test]
async fn parameters_are_local() {
    let result = run(
        r#"
let $x = outer
fun shadow $x { yield $x }
shadow inner
yield $x
"#,
    )
    .await;
    assert_eq!(texts(&result), vec!["inner", "outer"]);
}

#[tokio::test]
async fn rest_parameter_collects_remaining_arguments() {
    let result = run("fun count $first ($rest) { yield $first #rest }\ncount a b c\ncount solo").await;
    assert_eq!(texts(&result), vec!["a", "2", "solo", "0"]);
}

#[tokio::test]
async fn list_arguments_are_spread() {
    let result = run("fun three $a $b $c { yield $c $b $a }\nlet ($xs) = 1 2\nthree $xs 3").await;
    assert_eq!(texts(&result), vec!["3", "2", "1"]);
}

#[tokio::test]
async fn arity_mismatch_is_fatal() {
    let err = run_err("fun pair $a $b { yield $a $b }\npair 1").await;
    assert!(err.contains("pair: expected 2 argument(s), got 1"), "{}", err);

    let err = run_err("fun tail $h ($t) { yield $t }\ntail").await;
    assert!(err.contains("tail: expected at least 1 argument(s), got 0"), "{}", err);
}

#[tokio::test]
async fn return_status_and_return_value() {
    let result = run("fun f { return 3 }\nf").await;
    assert_eq!(result.status, 3);
    assert!(result.output.is_empty());

    let result = run("fun g { return done }\ng").await;
    assert_eq!(result.status, 0);
    assert_eq!(texts(&result), vec!["done"]);

    let result = run("fun h { return (a b) }\nh").await;
    assert_eq!(texts(&result), vec!["a", "b"]);
}

#[tokio::test]
async fn status_is_the_last_statement() {
    assert_eq!(run("fun f { true; false }\nf").await.status, 1);
    assert_eq!(run("fun f { false; true }\nf").await.status, 0);
}

#[tokio::test]
async fn undefined_function_is_fatal() {
    let err = run_err("nope 1 2").await;
    assert!(err.contains("undefined function: nope"), "{}", err);
}

#[tokio::test]
async fn tool_arity_is_checked() {
    let err = run_err("sleep").await;
    assert!(err.contains("sleep: expected 1 argument(s), got 0"), "{}", err);
}

#[tokio::test]
async fn functions_persist_across_executions() {
    let kernel = Kernel::transient().unwrap();
    kernel.execute("fun twice $x { yield $x $x }").await.unwrap();
    let result = kernel.execute("twice hi").await.unwrap();
    assert_eq!(texts(&result), vec!["hi", "hi"]);
    assert!(kernel.function_names().contains(&"twice".to_string()));
}
