//! Execution context for statements and tools.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::ast::Value;
use crate::interpreter::{CallFrame, ControlFlow, Env};
use crate::scheduler::{InputPort, JobId, JobManager, OutputPort, PortId};

/// Process-like state shared by every context of one kernel.
#[derive(Debug)]
pub struct HostState {
    cwd: RwLock<PathBuf>,
    /// Variables exported to child processes.
    vars: RwLock<BTreeMap<String, String>>,
}

impl HostState {
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            cwd: RwLock::new(cwd),
            vars: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn cwd(&self) -> PathBuf {
        self.cwd.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set_cwd(&self, path: PathBuf) {
        *self.cwd.write().unwrap_or_else(|e| e.into_inner()) = path;
    }

    /// Look up a variable: kernel overrides first, then the process.
    pub fn var(&self, name: &str) -> Option<String> {
        if let Some(v) = self.vars.read().unwrap_or_else(|e| e.into_inner()).get(name) {
            return Some(v.clone());
        }
        std::env::var(name).ok()
    }

    pub fn set_var(&self, name: impl Into<String>, value: impl Into<String>) {
        self.vars
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.into(), value.into());
    }

    /// The process environment with kernel overrides applied, sorted.
    pub fn vars(&self) -> BTreeMap<String, String> {
        let mut all: BTreeMap<String, String> = std::env::vars().collect();
        for (k, v) in self.vars.read().unwrap_or_else(|e| e.into_inner()).iter() {
            all.insert(k.clone(), v.clone());
        }
        all
    }

    /// Only the kernel overrides, for passing to child processes.
    pub fn overrides(&self) -> BTreeMap<String, String> {
        self.vars.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Everything a running statement can see.
///
/// Each pipeline stage owns its own context; cloning shares the
/// environment, call frame and host state but lets ports be swapped.
#[derive(Clone)]
pub struct ExecContext {
    /// Variable environment.
    pub env: Env,
    /// Stream consumed by `fetch`.
    pub input: InputPort,
    /// Stream produced by `yield`.
    pub output: OutputPort,
    /// Innermost call frame (function overlay + defer stack).
    pub frame: Arc<CallFrame>,
    /// The job this context runs in, if any.
    pub job: Option<JobId>,
    /// Job manager for background jobs.
    pub jobs: Arc<JobManager>,
    /// Working directory and exported variables.
    pub host: Arc<HostState>,
}

impl ExecContext {
    /// A top-level context: fresh environment, program frame, empty input.
    pub fn new(output: OutputPort, jobs: Arc<JobManager>, host: Arc<HostState>) -> Self {
        Self {
            env: Env::new(),
            input: InputPort::closed(),
            output,
            frame: CallFrame::program(),
            job: None,
            jobs,
            host,
        }
    }

    /// The same context reading and writing different ports.
    pub fn with_ports(&self, input: InputPort, output: OutputPort) -> Self {
        Self {
            input,
            output,
            ..self.clone()
        }
    }

    /// The same context writing to a different port.
    pub fn with_output(&self, output: OutputPort) -> Self {
        Self {
            output,
            ..self.clone()
        }
    }

    /// Context for a function body: new environment and frame, same ports.
    pub fn for_call(&self, env: Env, frame: Arc<CallFrame>) -> Self {
        Self {
            env,
            frame,
            ..self.clone()
        }
    }

    /// Produce one value downstream.
    pub async fn emit(&self, value: Value) -> Result<(), PortId> {
        self.output.send(value).await
    }

    /// Produce several values downstream, in order.
    pub async fn emit_all(&self, values: impl IntoIterator<Item = Value>) -> Result<(), PortId> {
        for value in values {
            self.output.send(value).await?;
        }
        Ok(())
    }

    /// Emit `values`, then finish with `status`; `Closed` if the reader left.
    pub async fn emit_then(&self, values: impl IntoIterator<Item = Value>, status: i64) -> ControlFlow {
        match self.emit_all(values).await {
            Ok(()) => ControlFlow::Normal(status),
            Err(port) => ControlFlow::Closed(port),
        }
    }

    pub fn cwd(&self) -> PathBuf {
        self.host.cwd()
    }

    /// Resolve a path against the working directory.
    pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd().join(path)
        }
    }
}
