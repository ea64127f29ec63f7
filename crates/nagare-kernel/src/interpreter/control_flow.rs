//! Structured non-local exits.

use crate::ast::Value;
use crate::scheduler::PortId;

/// How a statement finished.
///
/// Everything except `Normal` unwinds outward until a construct that owns
/// it catches it: loops catch `Break` and `Continue`, call boundaries catch
/// `Return`, and the pipeline owning a port catches `Closed`.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlFlow {
    /// Proceed; the status is 0 on success.
    Normal(i64),
    /// Leave the current call with a status and an optional value that is
    /// yielded to the caller's output.
    Return { status: i64, value: Option<Value> },
    /// Leave `level + 1` enclosing loops.
    Break { level: i64 },
    /// Advance the innermost loop.
    Continue,
    /// The consumer reading the given port has gone away.
    Closed(PortId),
}

impl ControlFlow {
    /// Normal completion with status 0.
    pub fn ok() -> Self {
        ControlFlow::Normal(0)
    }

    /// Normal completion with status 1.
    pub fn fail() -> Self {
        ControlFlow::Normal(1)
    }

    /// Normal completion judged by a boolean.
    pub fn from_bool(ok: bool) -> Self {
        ControlFlow::Normal(if ok { 0 } else { 1 })
    }

    pub fn is_normal(&self) -> bool {
        matches!(self, ControlFlow::Normal(_))
    }

    /// The status this outcome carries once caught.
    pub fn status(&self) -> i64 {
        match self {
            ControlFlow::Normal(status) => *status,
            ControlFlow::Return { status, .. } => *status,
            ControlFlow::Break { level } => *level,
            ControlFlow::Continue | ControlFlow::Closed(_) => 0,
        }
    }

    /// True when the status means success.
    pub fn succeeded(&self) -> bool {
        self.status() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_of_each_signal() {
        assert_eq!(ControlFlow::ok().status(), 0);
        assert_eq!(ControlFlow::fail().status(), 1);
        assert_eq!(ControlFlow::Break { level: 2 }.status(), 2);
        let ret = ControlFlow::Return { status: 3, value: None };
        assert_eq!(ret.status(), 3);
        assert!(!ret.is_normal());
    }

    #[test]
    fn from_bool_maps_to_status() {
        assert!(ControlFlow::from_bool(true).succeeded());
        assert!(!ControlFlow::from_bool(false).succeeded());
    }
}
