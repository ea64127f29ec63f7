//! The Kernel: the heart of nagare.
//!
//! The Kernel owns and coordinates all core components:
//! - the root environment (variables that persist between `execute` calls)
//! - the global function registry (top-level `fun` declarations)
//! - the tool registry (host primitives)
//! - the job manager (background jobs)
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                         Kernel                             │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────┐  │
//! │  │   Env        │  │ ToolRegistry │  │ global functions │  │
//! │  │  (variables) │  │  (builtins)  │  │  (top-level fun) │  │
//! │  └──────────────┘  └──────────────┘  └──────────────────┘  │
//! │  ┌──────────────────────────────┐  ┌──────────────────┐    │
//! │  │  JobManager (background)     │  │  HostState (cwd) │    │
//! │  └──────────────────────────────┘  └──────────────────┘    │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every statement runs against an [`ExecContext`]: its environment, its
//! input and output ports, and the innermost [`CallFrame`]. Pipelines give
//! each stage its own context with fresh ports; calls give the body a new
//! environment and frame while keeping the caller's ports.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use futures::FutureExt;
use futures::future::BoxFuture;

use crate::ast::{Call, Expr, IfStmt, LetStmt, Pattern, Pipeline, Program, Stmt, Value, WhileLoop};
use crate::interpreter::pattern::{self, BindMode};
use crate::interpreter::{
    CallFrame, ControlFlow, Deferred, Env, EvalResult, Evaluator, Executor, Fault, Function, RuntimeError, Snapshots,
    snapshot_functions,
};
use crate::parser::parse;
use crate::scheduler::{InputPort, JobId, JobManager, JobResult, collect, drain_with, run_pipeline};
use crate::tools::{ExecContext, HostState, Stdin, Tool, ToolRegistry, register_builtins, run_external};

/// Source of the standard prelude.
pub const PRELUDE: &str = include_str!("prelude.ngr");

/// What happens to jobs that are still running when the program ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobExitPolicy {
    /// Leave them; they die with the process. A warning names how many.
    #[default]
    Abandon,
    /// Wait for every job before returning from [`Kernel::shutdown`].
    Await,
}

/// Configuration for kernel initialization.
#[derive(Debug, Clone)]
pub struct KernelConfig {
    /// Name of this kernel (for identification).
    pub name: String,

    /// Initial working directory.
    pub cwd: PathBuf,

    /// Load the standard prelude (`range`, `sum`, `qsort`, ...).
    pub prelude: bool,

    /// Run unknown function names as external programs.
    ///
    /// When false, calling an unknown name is a fatal error.
    pub external_commands: bool,

    /// Fate of unjoined jobs at shutdown.
    pub job_exit_policy: JobExitPolicy,
}

fn default_cwd() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"))
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            cwd: default_cwd(),
            prelude: true,
            external_commands: true,
            job_exit_policy: JobExitPolicy::Abandon,
        }
    }
}

impl KernelConfig {
    /// A self-contained kernel for tests and embedding: prelude loaded,
    /// no external commands.
    pub fn transient() -> Self {
        Self {
            name: "transient".to_string(),
            external_commands: false,
            ..Self::default()
        }
    }

    /// Interactive use: prelude and external commands.
    pub fn repl() -> Self {
        Self {
            name: "repl".to_string(),
            ..Self::default()
        }
    }

    /// Set the initial working directory.
    pub fn with_cwd(mut self, cwd: PathBuf) -> Self {
        self.cwd = cwd;
        self
    }

    /// Enable or disable the prelude.
    pub fn with_prelude(mut self, prelude: bool) -> Self {
        self.prelude = prelude;
        self
    }

    /// Enable or disable the external command fallback.
    pub fn with_external_commands(mut self, enabled: bool) -> Self {
        self.external_commands = enabled;
        self
    }

    /// Set the policy for unjoined jobs.
    pub fn with_job_exit_policy(mut self, policy: JobExitPolicy) -> Self {
        self.job_exit_policy = policy;
        self
    }
}

/// Result of running a program: its status and everything it yielded.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExecResult {
    /// Status of the last top-level statement (0 = success).
    pub status: i64,
    /// Values yielded at top level, in order.
    pub output: Vec<Value>,
}

impl ExecResult {
    /// True if the status is 0.
    pub fn ok(&self) -> bool {
        self.status == 0
    }

    /// Output rendered one value per line.
    pub fn text(&self) -> String {
        self.output.iter().map(Value::to_string).collect::<Vec<_>>().join("\n")
    }
}

/// The nagare kernel. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Kernel {
    core: Arc<Core>,
}

struct Core {
    name: String,
    env: Env,
    functions: RwLock<HashMap<String, Arc<Function>>>,
    tools: RwLock<ToolRegistry>,
    jobs: Arc<JobManager>,
    host: Arc<HostState>,
    external_commands: bool,
    job_exit_policy: JobExitPolicy,
}

/// Evaluate an expression; a soft fault fails the statement with status 1.
macro_rules! eval_or_fail {
    ($e:expr) => {
        match $e {
            Ok(v) => v,
            Err(Fault::Soft(reason)) => {
                tracing::debug!(%reason, "statement failed");
                return Ok(ControlFlow::fail());
            }
            Err(Fault::Fatal(err)) => return Err(err),
        }
    };
}

impl Kernel {
    /// Create a new kernel with the given configuration.
    pub fn new(config: KernelConfig) -> Result<Self> {
        let mut tools = ToolRegistry::new();
        register_builtins(&mut tools);

        let kernel = Self {
            core: Arc::new(Core {
                name: config.name,
                env: Env::new(),
                functions: RwLock::new(HashMap::new()),
                tools: RwLock::new(tools),
                jobs: Arc::new(JobManager::new()),
                host: Arc::new(HostState::new(config.cwd)),
                external_commands: config.external_commands,
                job_exit_policy: config.job_exit_policy,
            }),
        };

        if config.prelude {
            kernel.load_definitions(PRELUDE).context("failed to load prelude")?;
        }
        tracing::debug!(name = %kernel.core.name, "kernel ready");
        Ok(kernel)
    }

    /// Create a transient kernel (prelude, no external commands).
    pub fn transient() -> Result<Self> {
        Self::new(KernelConfig::transient())
    }

    /// Kernel name.
    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// Current working directory.
    pub fn cwd(&self) -> PathBuf {
        self.core.host.cwd()
    }

    /// Job manager, for embedders that want to inspect jobs.
    pub fn jobs(&self) -> &Arc<JobManager> {
        &self.core.jobs
    }

    /// Install a host primitive. It behaves like any other function and can
    /// be shadowed by user code.
    pub fn register_tool(&self, tool: impl Tool + 'static) {
        self.core
            .tools
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .register(tool);
    }

    /// Names of all host primitives, sorted.
    pub fn tool_names(&self) -> Vec<String> {
        self.core.tools.read().unwrap_or_else(|e| e.into_inner()).names()
    }

    /// Names of all global user functions, sorted.
    pub fn function_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .core
            .functions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Read a top-level variable.
    pub fn get_var(&self, name: &str) -> Option<Value> {
        self.core.env.get(name)
    }

    /// Set a top-level variable.
    pub fn set_var(&self, name: &str, value: Value) {
        self.core.env.assign(name, value);
    }

    /// Register every function declared in `source` without running
    /// anything else. Used for the prelude.
    ///
    /// The functions close over a private environment, so variables they
    /// assign never touch the program's top-level variables.
    pub fn load_definitions(&self, source: &str) -> Result<()> {
        let program = parse(source).context("parse error")?;
        let env = Env::new();
        for stmt in &program.statements {
            match stmt {
                Stmt::FunDef(def) => {
                    pattern::check(&def.params)?;
                    self.core.define_global(Arc::new(Function::new(Arc::clone(def), env.clone())));
                }
                Stmt::Empty => {}
                other => anyhow::bail!("only function declarations are allowed here, found '{}'", other.kind_name()),
            }
        }
        Ok(())
    }

    /// Execute nagare source code, collecting its output.
    pub async fn execute(&self, input: &str) -> Result<ExecResult> {
        let program = parse(input).context("parse error")?;
        let mut output = Vec::new();
        let status = self.core.run_program(&program, |v| output.push(v)).await?;
        Ok(ExecResult { status, output })
    }

    /// Execute nagare source code, passing each top-level value to
    /// `on_output` as soon as it is yielded. Returns the program status.
    #[tracing::instrument(level = "info", skip(self, on_output), fields(input_len = input.len()))]
    pub async fn execute_streaming(&self, input: &str, on_output: &mut (dyn FnMut(&Value) + Send)) -> Result<i64> {
        let program = parse(input).context("parse error")?;
        self.core.run_program(&program, |v| on_output(&v)).await
    }

    /// Execute an already parsed program.
    pub async fn execute_program(&self, program: &Program) -> Result<ExecResult> {
        let mut output = Vec::new();
        let status = self.core.run_program(program, |v| output.push(v)).await?;
        Ok(ExecResult { status, output })
    }

    /// Apply the job exit policy. Call once when the host is done.
    pub async fn shutdown(&self) {
        match self.core.job_exit_policy {
            JobExitPolicy::Await => {
                for (id, result) in self.core.jobs.wait_all().await {
                    if let Some(error) = result.error {
                        tracing::warn!(job = %id, %error, "job failed");
                    }
                }
            }
            JobExitPolicy::Abandon => {
                let running = self.core.jobs.running_count();
                if running > 0 {
                    tracing::warn!(running, "abandoning unjoined jobs");
                }
            }
        }
    }
}

/// Bridges the evaluator to the kernel for captures and `spawn`.
struct StageExecutor<'a> {
    core: &'a Arc<Core>,
    ctx: &'a ExecContext,
}

impl Executor for StageExecutor<'_> {
    fn capture<'a>(&'a self, body: &'a [Stmt]) -> BoxFuture<'a, Result<Vec<Value>, RuntimeError>> {
        async move {
            let (result, values) = collect(|output| {
                let ctx = self.ctx.with_output(output);
                async move { self.core.exec_block(body, &ctx).await }
            })
            .await;
            // Signals raised inside a capture end the capture.
            result?;
            Ok(values)
        }
        .boxed()
    }

    fn spawn(&self, body: Arc<Vec<Stmt>>) -> Result<Value, RuntimeError> {
        let id = self.core.spawn_job(body, self.ctx);
        Ok(Value::Scalar(id.to_string()))
    }
}

impl Core {
    fn define_global(&self, function: Arc<Function>) {
        self.functions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(function.name().to_string(), function);
    }

    fn global_function(&self, name: &str) -> Option<Arc<Function>> {
        self.functions.read().unwrap_or_else(|e| e.into_inner()).get(name).cloned()
    }

    fn tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().unwrap_or_else(|e| e.into_inner()).get(name)
    }

    /// Run a program in a fresh top-level frame, feeding its output to
    /// `on_value`.
    async fn run_program(self: &Arc<Self>, program: &Program, on_value: impl FnMut(Value)) -> Result<i64> {
        let outcome = drain_with(
            |output| {
                let ctx = ExecContext {
                    env: self.env.clone(),
                    input: InputPort::closed(),
                    output,
                    frame: CallFrame::program(),
                    job: None,
                    jobs: Arc::clone(&self.jobs),
                    host: Arc::clone(&self.host),
                };
                async move {
                    let outcome = self.exec_top_level(&program.statements, &ctx).await;
                    self.teardown(&ctx, outcome).await
                }
            },
            on_value,
        )
        .await;

        let status = outcome.context("execution failed")?;
        Ok(status.status())
    }

    /// Top-level statements: `return` and `break` stop the program with
    /// their status.
    async fn exec_top_level(self: &Arc<Self>, stmts: &[Stmt], ctx: &ExecContext) -> Result<ControlFlow, RuntimeError> {
        let mut status = 0;
        for stmt in stmts {
            if matches!(stmt, Stmt::Empty) {
                continue;
            }
            match self.exec_stmt(stmt, ctx).await? {
                ControlFlow::Normal(s) => status = s,
                ControlFlow::Return { status, value } => {
                    if let Some(value) = value {
                        let _ = ctx.emit_all(value.into_elements()).await;
                    }
                    return Ok(ControlFlow::Normal(status));
                }
                ControlFlow::Break { level } => return Ok(ControlFlow::Normal(level)),
                ControlFlow::Continue => return Err(RuntimeError::ContinueOutsideLoop),
                ControlFlow::Closed(_) => return Ok(ControlFlow::Normal(status)),
            }
        }
        Ok(ControlFlow::Normal(status))
    }

    /// Run every pending defer of `ctx.frame`, last registered first.
    ///
    /// Runs on every exit path. A fatal error in one deferred statement
    /// does not stop the rest; the body's error wins, then the first
    /// deferred error.
    async fn teardown(
        self: &Arc<Self>,
        ctx: &ExecContext,
        outcome: Result<ControlFlow, RuntimeError>,
    ) -> Result<ControlFlow, RuntimeError> {
        let mut first_error = None;
        loop {
            let defers = ctx.frame.take_defers();
            if defers.is_empty() {
                break;
            }
            for Deferred { stmt, env } in defers {
                let deferred_ctx = ExecContext { env, ..ctx.clone() };
                if let Err(err) = self.exec_stmt(&stmt, &deferred_ctx).await {
                    tracing::warn!(error = %err, "deferred statement failed");
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }
        match (outcome, first_error) {
            (Err(err), _) => Err(err),
            (Ok(_), Some(err)) => Err(err),
            (Ok(flow), None) => Ok(flow),
        }
    }

    /// Execute a single statement, returning control flow information.
    fn exec_stmt<'a>(
        self: &'a Arc<Self>,
        stmt: &'a Stmt,
        ctx: &'a ExecContext,
    ) -> BoxFuture<'a, Result<ControlFlow, RuntimeError>> {
        use tracing::Instrument;
        let span = tracing::debug_span!("exec_stmt", stmt_type = stmt.kind_name());
        async move {
            match stmt {
                Stmt::Empty => Ok(ControlFlow::ok()),
                Stmt::Call(call) => self.exec_call(call, ctx).await,
                Stmt::Pipeline(pipeline) => self.exec_pipeline(pipeline, ctx).await,
                Stmt::Block(stmts) => self.exec_block(stmts, ctx).await,
                Stmt::If(if_stmt) => self.exec_if(if_stmt, ctx).await,
                Stmt::While(while_loop) => self.exec_while(while_loop, ctx).await,
                Stmt::FunDef(def) => {
                    pattern::check(&def.params)?;
                    let function = Arc::new(Function::new(Arc::clone(def), ctx.env.clone()));
                    if let Some(global) = ctx.frame.declare(function) {
                        self.define_global(global);
                    }
                    Ok(ControlFlow::ok())
                }
                Stmt::Let(let_stmt) => self.exec_let(let_stmt, ctx).await,
                Stmt::Fetch(pattern) => self.exec_fetch(pattern, ctx).await,
                Stmt::Yield(args) => {
                    let values = eval_or_fail!(self.evaluator(ctx).eval_args(args).await);
                    Ok(ctx.emit_then(values, 0).await)
                }
                Stmt::Return(expr) => {
                    let Some(expr) = expr else {
                        return Ok(ControlFlow::Return { status: 0, value: None });
                    };
                    let value = eval_or_fail!(self.eval(expr, ctx).await);
                    Ok(match value.as_int() {
                        Some(status) => ControlFlow::Return { status, value: None },
                        None => ControlFlow::Return { status: 0, value: Some(value) },
                    })
                }
                Stmt::Break(expr) => {
                    let level = match expr {
                        Some(expr) => {
                            let value = eval_or_fail!(self.eval(expr, ctx).await);
                            value
                                .as_int()
                                .ok_or_else(|| RuntimeError::Type(format!("break level must be an integer, got '{}'", value)))?
                        }
                        None => 0,
                    };
                    Ok(ControlFlow::Break { level: level.max(0) })
                }
                Stmt::Continue => Ok(ControlFlow::Continue),
                Stmt::Defer(stmt) => {
                    ctx.frame.push_defer(Deferred {
                        stmt: Arc::clone(stmt),
                        env: ctx.env.snapshot(),
                    });
                    Ok(ControlFlow::ok())
                }
                Stmt::Spawn(body) => {
                    let id = self.spawn_job(Arc::clone(body), ctx);
                    Ok(ctx.emit_then([Value::Scalar(id.to_string())], 0).await)
                }
                Stmt::Join(expr) => {
                    let handle = eval_or_fail!(self.eval(expr, ctx).await);
                    let result = self.join(&handle, ctx).await?;
                    Ok(ctx.emit_then(result.output, result.status).await)
                }
                Stmt::Value(expr) => {
                    let value = eval_or_fail!(self.eval(expr, ctx).await);
                    Ok(ControlFlow::from_bool(value.is_truthy()))
                }
                Stmt::Not(inner) => Ok(match self.exec_stmt(inner, ctx).await? {
                    ControlFlow::Normal(status) => ControlFlow::from_bool(status != 0),
                    signal => signal,
                }),
                Stmt::AndChain { left, right } => match self.exec_stmt(left, ctx).await? {
                    ControlFlow::Normal(0) => self.exec_stmt(right, ctx).await,
                    other => Ok(other),
                },
                Stmt::OrChain { left, right } => match self.exec_stmt(left, ctx).await? {
                    ControlFlow::Normal(status) if status != 0 => self.exec_stmt(right, ctx).await,
                    other => Ok(other),
                },
            }
        }
        .instrument(span)
        .boxed()
    }

    fn evaluator<'a>(self: &'a Arc<Self>, ctx: &'a ExecContext) -> EvaluatorHandle<'a> {
        EvaluatorHandle {
            executor: StageExecutor { core: self, ctx },
            env: &ctx.env,
        }
    }

    async fn eval(self: &Arc<Self>, expr: &Expr, ctx: &ExecContext) -> EvalResult<Value> {
        self.evaluator(ctx).eval(expr).await
    }

    /// Run statements in order; the first signal stops the block.
    async fn exec_block(self: &Arc<Self>, stmts: &[Stmt], ctx: &ExecContext) -> Result<ControlFlow, RuntimeError> {
        let mut last = ControlFlow::ok();
        for stmt in stmts {
            match self.exec_stmt(stmt, ctx).await? {
                flow @ ControlFlow::Normal(_) => last = flow,
                signal => return Ok(signal),
            }
        }
        Ok(last)
    }

    async fn exec_if(self: &Arc<Self>, if_stmt: &IfStmt, ctx: &ExecContext) -> Result<ControlFlow, RuntimeError> {
        for (condition, body) in &if_stmt.branches {
            match self.exec_stmt(condition, ctx).await? {
                ControlFlow::Normal(0) => return self.exec_block(body, ctx).await,
                ControlFlow::Normal(_) => continue,
                signal => return Ok(signal),
            }
        }
        match &if_stmt.else_branch {
            Some(body) => self.exec_block(body, ctx).await,
            None => Ok(ControlFlow::ok()),
        }
    }

    /// `break` with level 0 ends this loop; a higher level is decremented
    /// and passed outward.
    async fn exec_while(self: &Arc<Self>, while_loop: &WhileLoop, ctx: &ExecContext) -> Result<ControlFlow, RuntimeError> {
        loop {
            match self.exec_stmt(&while_loop.condition, ctx).await? {
                ControlFlow::Normal(0) => {}
                ControlFlow::Normal(_) => break,
                signal => return Ok(signal),
            }
            match self.exec_block(&while_loop.body, ctx).await? {
                ControlFlow::Normal(_) | ControlFlow::Continue => {}
                ControlFlow::Break { level: 0 } => break,
                ControlFlow::Break { level } => return Ok(ControlFlow::Break { level: level - 1 }),
                signal => return Ok(signal),
            }
        }
        Ok(ControlFlow::ok())
    }

    async fn exec_let(self: &Arc<Self>, let_stmt: &LetStmt, ctx: &ExecContext) -> Result<ControlFlow, RuntimeError> {
        let stream = match &let_stmt.value {
            Expr::List(items) => eval_or_fail!(self.evaluator(ctx).eval_args(items).await),
            expr => eval_or_fail!(self.eval(expr, ctx).await).into_elements(),
        };
        let matched = pattern::bind(&let_stmt.pattern, stream, &ctx.env, BindMode::Assign)?;
        Ok(ControlFlow::from_bool(matched))
    }

    async fn exec_fetch(self: &Arc<Self>, pattern: &Pattern, ctx: &ExecContext) -> Result<ControlFlow, RuntimeError> {
        pattern::check(pattern)?;
        let values = match pattern.rest {
            Some(_) => ctx.input.fetch_rest(pattern.names.len()).await,
            None => ctx.input.fetch(pattern.names.len()).await,
        };
        let Some(values) = values else {
            return Ok(ControlFlow::fail());
        };
        let matched = pattern::bind(pattern, values, &ctx.env, BindMode::Assign)?;
        Ok(ControlFlow::from_bool(matched))
    }

    #[tracing::instrument(level = "debug", skip(self, pipeline, ctx), fields(stages = pipeline.stages.len(), fed = pipeline.feed.is_some()))]
    async fn exec_pipeline(self: &Arc<Self>, pipeline: &Pipeline, ctx: &ExecContext) -> Result<ControlFlow, RuntimeError> {
        let feed = pipeline.feed.as_ref().map(|values| Stmt::Yield(values.clone()));
        let stages: Vec<&Stmt> = feed.iter().chain(pipeline.stages.iter()).collect();

        run_pipeline(stages.len(), ctx.input.clone(), ctx.output.clone(), |i, input, output| {
            let stage_ctx = ctx.with_ports(input, output);
            let stmt = stages[i];
            async move { self.exec_stmt(stmt, &stage_ctx).await }
        })
        .await
    }

    /// Resolve and invoke a function.
    ///
    /// Resolution order: overlays of this call and its callers, global
    /// user functions, host primitives, then an external program.
    #[tracing::instrument(level = "debug", skip(self, call, ctx), fields(command = %call.name))]
    async fn exec_call(self: &Arc<Self>, call: &Call, ctx: &ExecContext) -> Result<ControlFlow, RuntimeError> {
        let args = eval_or_fail!(self.evaluator(ctx).eval_args(&call.args).await);

        if let Some(function) = ctx.frame.lookup(&call.name) {
            return self.invoke(&function, args, ctx).await;
        }
        // A job only calls its own copies, taken at spawn time.
        if ctx.job.is_none() {
            if let Some(function) = self.global_function(&call.name) {
                return self.invoke(&function, args, ctx).await;
            }
        }
        if let Some(tool) = self.tool(&call.name) {
            tool.schema().check_arity(args.len())?;
            let mut tool_ctx = ctx.clone();
            return tool.execute(args.into(), &mut tool_ctx).await;
        }
        if self.external_commands {
            let argv: Vec<String> = args.iter().map(Value::to_string).collect();
            tracing::debug!(executable = %call.name, "running external command");
            return run_external(&call.name, &argv, Stdin::Null, ctx).await;
        }
        Err(RuntimeError::UndefinedFunction(call.name.clone()))
    }

    /// Invoke a user function with the caller's ports.
    async fn invoke(
        self: &Arc<Self>,
        function: &Function,
        args: Vec<Value>,
        ctx: &ExecContext,
    ) -> Result<ControlFlow, RuntimeError> {
        let env = function.env.child();
        let got = args.len();
        if !pattern::bind(&function.def.params, args, &env, BindMode::Define)? {
            let params = &function.def.params;
            let expected = match params.rest {
                Some(_) => format!("at least {}", params.names.len()),
                None => params.names.len().to_string(),
            };
            return Err(RuntimeError::Arity {
                name: function.name().to_string(),
                expected,
                got,
            });
        }

        let call_ctx = ctx.for_call(env, CallFrame::call(&ctx.frame));
        let outcome = self.exec_block(&function.def.body, &call_ctx).await;
        let outcome = self.teardown(&call_ctx, outcome).await?;

        match outcome {
            ControlFlow::Normal(status) => Ok(ControlFlow::Normal(status)),
            ControlFlow::Return { status, value } => match value {
                Some(value) => match ctx.emit_then(value.into_elements(), status).await {
                    ControlFlow::Normal(_) => Ok(ControlFlow::Normal(status)),
                    closed => Ok(closed),
                },
                None => Ok(ControlFlow::Normal(status)),
            },
            ControlFlow::Break { level } => Ok(ControlFlow::Normal(level)),
            ControlFlow::Continue => Err(RuntimeError::ContinueOutsideLoop),
            closed @ ControlFlow::Closed(_) => Ok(closed),
        }
    }

    /// Start `body` as a background job.
    ///
    /// The job runs on a snapshot of the environment and on private copies
    /// of every function it can see, each closing over a snapshot of its
    /// own environment. Nothing the job assigns reaches the spawner.
    fn spawn_job(self: &Arc<Self>, body: Arc<Vec<Stmt>>, ctx: &ExecContext) -> JobId {
        let core = Arc::clone(self);
        let mut snapshots = Snapshots::new();
        let env = snapshots.of(&ctx.env);
        let mut functions = match ctx.job {
            Some(_) => HashMap::new(),
            None => self.functions.read().unwrap_or_else(|e| e.into_inner()).clone(),
        };
        functions.extend(ctx.frame.visible_functions());
        let frame = CallFrame::job(snapshot_functions(functions, &mut snapshots));
        let jobs = Arc::clone(&ctx.jobs);
        let host = Arc::clone(&ctx.host);
        let command = describe(&body);

        ctx.jobs.spawn(command, move |id| async move {
            let (outcome, output) = collect(|output| {
                let job_ctx = ExecContext {
                    env,
                    input: InputPort::closed(),
                    output,
                    frame,
                    job: Some(id),
                    jobs,
                    host,
                };
                async move {
                    let outcome = core.exec_block(&body, &job_ctx).await;
                    core.teardown(&job_ctx, outcome).await
                }
            })
            .await;

            match outcome {
                Ok(ControlFlow::Continue) => {
                    tracing::warn!(job = %id, "continue outside of a loop");
                    JobResult::failed(RuntimeError::ContinueOutsideLoop.to_string(), output)
                }
                Ok(flow) => JobResult::finished(flow.status(), output),
                Err(err) => {
                    tracing::warn!(job = %id, error = %err, "job failed");
                    JobResult::failed(err.to_string(), output)
                }
            }
        })
    }

    async fn join(self: &Arc<Self>, handle: &Value, ctx: &ExecContext) -> Result<JobResult, RuntimeError> {
        let text = handle.to_string();
        let id = JobId::parse(&text).ok_or_else(|| RuntimeError::UnknownJob(text.clone()))?;
        if ctx.job == Some(id) {
            return Err(RuntimeError::SelfJoin(id.to_string()));
        }
        ctx.jobs.wait(id).await.ok_or(RuntimeError::UnknownJob(text))
    }
}

/// Owns the executor so an `Evaluator` can borrow it.
struct EvaluatorHandle<'a> {
    executor: StageExecutor<'a>,
    env: &'a Env,
}

impl EvaluatorHandle<'_> {
    async fn eval(&self, expr: &Expr) -> EvalResult<Value> {
        Evaluator::new(self.env, &self.executor).eval(expr).await
    }

    async fn eval_args(&self, args: &[Expr]) -> EvalResult<Vec<Value>> {
        Evaluator::new(self.env, &self.executor).eval_args(args).await
    }
}

/// Short description of a spawned block for `jobs` listings and logs.
fn describe(body: &[Stmt]) -> String {
    let kinds: Vec<&str> = body
        .iter()
        .filter(|s| !matches!(s, Stmt::Empty))
        .map(Stmt::kind_name)
        .collect();
    format!("{{ {} }}", kinds.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builders() {
        let config = KernelConfig::transient()
            .with_prelude(false)
            .with_external_commands(true)
            .with_job_exit_policy(JobExitPolicy::Await)
            .with_cwd(PathBuf::from("/tmp"));
        assert!(!config.prelude);
        assert!(config.external_commands);
        assert_eq!(config.job_exit_policy, JobExitPolicy::Await);
        assert_eq!(config.cwd, PathBuf::from("/tmp"));
        assert_eq!(config.name, "transient");
    }

    #[test]
    fn transient_has_no_external_commands() {
        assert!(!KernelConfig::transient().external_commands);
        assert!(KernelConfig::repl().external_commands);
    }

    #[test]
    fn prelude_registers_functions() {
        let kernel = Kernel::transient().unwrap();
        let names = kernel.function_names();
        for name in ["range", "enumerate", "sum", "qsort", "assoc"] {
            assert!(names.contains(&name.to_string()), "missing {}", name);
        }
    }

    #[test]
    fn definitions_only() {
        let kernel = Kernel::new(KernelConfig::transient().with_prelude(false)).unwrap();
        assert!(kernel.load_definitions("fun f { yield 1 }").is_ok());
        assert!(kernel.load_definitions("echo hi").is_err());
    }

    #[tokio::test]
    async fn execute_collects_output() {
        let kernel = Kernel::transient().unwrap();
        let result = kernel.execute("echo hello; yield a b").await.unwrap();
        assert!(result.ok());
        assert_eq!(result.text(), "hello\na\nb");
    }

    #[tokio::test]
    async fn streaming_sees_values_in_order() {
        let kernel = Kernel::transient().unwrap();
        let mut seen = Vec::new();
        let status = kernel
            .execute_streaming("range 3; false", &mut |v| seen.push(v.to_string()))
            .await
            .unwrap();
        assert_eq!(status, 1);
        assert_eq!(seen, vec!["0", "1", "2"]);
    }

    #[tokio::test]
    async fn variables_persist_between_executions() {
        let kernel = Kernel::transient().unwrap();
        kernel.execute("let $x = 41").await.unwrap();
        let result = kernel.execute("yield ($x + 1)").await.unwrap();
        assert_eq!(result.output, vec![Value::int(42)]);
        assert_eq!(kernel.get_var("x"), Some(Value::int(41)));
    }

    #[tokio::test]
    async fn parse_errors_are_reported() {
        let kernel = Kernel::transient().unwrap();
        let err = kernel.execute("if {").await.unwrap_err();
        assert!(format!("{:#}", err).contains("parse error"));
    }

    #[test]
    fn describe_lists_statement_kinds() {
        let body = vec![Stmt::Continue, Stmt::Empty, Stmt::Yield(vec![])];
        assert_eq!(describe(&body), "{ continue; yield }");
    }
}
