//! Call frames: function overlays and defer stacks.
//!
//! Every invocation pushes a [`CallFrame`] linked to its caller's frame.
//! Functions declared while the frame is live go into its overlay and are
//! visible to everything the call runs, including callees. The overlay is
//! dropped with the frame, which restores whatever definition was
//! visible before.
//!
//! The program's top level is a frame too, but its declarations go to the
//! global registry instead of an overlay.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::ast::{FunDef, Stmt};

use super::scope::Env;

/// A user-defined function: its declaration plus the environment it closes
/// over.
#[derive(Debug)]
pub struct Function {
    pub def: Arc<FunDef>,
    pub env: Env,
}

impl Function {
    pub fn new(def: Arc<FunDef>, env: Env) -> Self {
        Self { def, env }
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }
}

/// Snapshots already taken for one spawn, keyed by the original frame.
#[derive(Debug, Default)]
pub struct Snapshots {
    taken: Vec<(Env, Env)>,
}

impl Snapshots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot `env`, reusing an earlier snapshot of the same frame.
    pub fn of(&mut self, env: &Env) -> Env {
        if let Some((_, copy)) = self.taken.iter().find(|(original, _)| original.same_frame(env)) {
            return copy.clone();
        }
        let copy = env.snapshot();
        self.taken.push((env.clone(), copy.clone()));
        copy
    }
}

/// Rebind every function to a snapshot of the environment it closes over.
///
/// Functions that shared an environment share its snapshot, so they keep
/// seeing each other's assignments while the originals stay untouched.
pub fn snapshot_functions(
    functions: HashMap<String, Arc<Function>>,
    snapshots: &mut Snapshots,
) -> HashMap<String, Arc<Function>> {
    functions
        .into_iter()
        .map(|(name, f)| {
            let env = snapshots.of(&f.env);
            (name, Arc::new(Function::new(Arc::clone(&f.def), env)))
        })
        .collect()
}

/// A statement waiting to run at frame teardown.
#[derive(Debug, Clone)]
pub struct Deferred {
    pub stmt: Arc<Stmt>,
    /// Private copy of the environment at the time `defer` ran.
    pub env: Env,
}

/// What kind of context owns a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Program top level; declarations are global.
    Program,
    /// A function invocation.
    Call,
    /// The root of a background job.
    Job,
}

/// Per-invocation state that is not a variable.
#[derive(Debug)]
pub struct CallFrame {
    kind: FrameKind,
    functions: Mutex<HashMap<String, Arc<Function>>>,
    defers: Mutex<Vec<Deferred>>,
    caller: Option<Arc<CallFrame>>,
}

impl CallFrame {
    /// Frame for a program's top level.
    pub fn program() -> Arc<Self> {
        Arc::new(Self {
            kind: FrameKind::Program,
            functions: Mutex::new(HashMap::new()),
            defers: Mutex::new(Vec::new()),
            caller: None,
        })
    }

    /// Frame for a function invoked from `caller`.
    pub fn call(caller: &Arc<CallFrame>) -> Arc<Self> {
        Arc::new(Self {
            kind: FrameKind::Call,
            functions: Mutex::new(HashMap::new()),
            defers: Mutex::new(Vec::new()),
            caller: Some(Arc::clone(caller)),
        })
    }

    /// Root frame for a background job.
    ///
    /// `functions` is the job's private copy of every function it can
    /// call; see [`snapshot_functions`].
    pub fn job(functions: HashMap<String, Arc<Function>>) -> Arc<Self> {
        Arc::new(Self {
            kind: FrameKind::Job,
            functions: Mutex::new(functions),
            defers: Mutex::new(Vec::new()),
            caller: None,
        })
    }

    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    /// Declare a function in this frame's overlay.
    ///
    /// Returns the function back when the frame is the program top level;
    /// the caller registers it globally instead.
    pub fn declare(&self, function: Arc<Function>) -> Option<Arc<Function>> {
        if self.kind == FrameKind::Program {
            return Some(function);
        }
        self.functions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(function.name().to_string(), function);
        None
    }

    /// Resolve through this overlay and then the callers' overlays.
    pub fn lookup(&self, name: &str) -> Option<Arc<Function>> {
        let mut frame = Some(self);
        while let Some(current) = frame {
            if let Some(f) = current
                .functions
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .get(name)
            {
                return Some(Arc::clone(f));
            }
            frame = current.caller.as_deref();
        }
        None
    }

    /// Every overlay binding visible from this frame, innermost winning.
    pub fn visible_functions(&self) -> HashMap<String, Arc<Function>> {
        let mut chain = Vec::new();
        let mut frame = Some(self);
        while let Some(current) = frame {
            chain.push(current);
            frame = current.caller.as_deref();
        }
        let mut flat = HashMap::new();
        for current in chain.into_iter().rev() {
            let functions = current.functions.lock().unwrap_or_else(|e| e.into_inner());
            for (name, f) in functions.iter() {
                flat.insert(name.clone(), Arc::clone(f));
            }
        }
        flat
    }

    /// Push a deferred statement.
    pub fn push_defer(&self, deferred: Deferred) {
        self.defers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(deferred);
    }

    /// Take every pending defer in the order they must run (last first).
    ///
    /// Draining makes teardown idempotent: each entry runs at most once.
    pub fn take_defers(&self) -> Vec<Deferred> {
        let mut defers = std::mem::take(&mut *self.defers.lock().unwrap_or_else(|e| e.into_inner()));
        defers.reverse();
        defers
    }
}
