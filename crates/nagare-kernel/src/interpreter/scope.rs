//! Variable environments.
//!
//! An [`Env`] is a reference-counted frame chained to its enclosing frame:
//! - lookup walks innermost-first
//! - assignment mutates the frame that already holds the name, otherwise
//!   creates it in the innermost frame
//! - cloning an `Env` shares the frame, so pipeline stages of one call see
//!   each other's assignments
//!
//! Closures capture the `Env` of their declaration site; a call runs in a
//! child of that captured frame.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::ast::Value;

#[derive(Debug, Default)]
struct Frame {
    vars: Mutex<HashMap<String, Value>>,
    parent: Option<Env>,
}

/// A chained, shared variable environment.
#[derive(Debug, Clone, Default)]
pub struct Env {
    frame: Arc<Frame>,
}

impl Env {
    /// Create a root environment with no bindings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty frame whose parent is `self`.
    pub fn child(&self) -> Self {
        Self {
            frame: Arc::new(Frame {
                vars: Mutex::new(HashMap::new()),
                parent: Some(self.clone()),
            }),
        }
    }

    fn vars(&self) -> std::sync::MutexGuard<'_, HashMap<String, Value>> {
        self.frame.vars.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Look a variable up, innermost frame first.
    pub fn get(&self, name: &str) -> Option<Value> {
        let mut env = Some(self);
        while let Some(current) = env {
            if let Some(value) = current.vars().get(name) {
                return Some(value.clone());
            }
            env = current.frame.parent.as_ref();
        }
        None
    }

    /// Whether any frame binds `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Assign to the frame that holds `name`, or bind it in the innermost
    /// frame when no frame does.
    pub fn assign(&self, name: impl Into<String>, value: Value) {
        let name = name.into();
        let mut env = Some(self);
        while let Some(current) = env {
            let mut vars = current.vars();
            if let Some(slot) = vars.get_mut(&name) {
                *slot = value;
                return;
            }
            drop(vars);
            env = current.frame.parent.as_ref();
        }
        self.define(name, value);
    }

    /// Bind `name` in the innermost frame, shadowing outer bindings.
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.vars().insert(name.into(), value);
    }

    /// A private root copy of every visible binding.
    ///
    /// Used for background jobs and deferred statements, which must not
    /// observe or cause later mutation of the original frames.
    pub fn snapshot(&self) -> Self {
        let mut chain = Vec::new();
        let mut env = Some(self);
        while let Some(current) = env {
            chain.push(current);
            env = current.frame.parent.as_ref();
        }

        let mut flat = HashMap::new();
        for current in chain.into_iter().rev() {
            for (name, value) in current.vars().iter() {
                flat.insert(name.clone(), value.clone());
            }
        }

        Self {
            frame: Arc::new(Frame {
                vars: Mutex::new(flat),
                parent: None,
            }),
        }
    }

    /// Names bound in the innermost frame, sorted.
    pub fn local_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.vars().keys().cloned().collect();
        names.sort();
        names
    }

    /// Whether two handles share the same innermost frame.
    pub fn same_frame(&self, other: &Env) -> bool {
        Arc::ptr_eq(&self.frame, &other.frame)
    }
}
