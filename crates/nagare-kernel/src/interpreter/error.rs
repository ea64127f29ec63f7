//! Runtime failures.
//!
//! Two tiers:
//! - [`RuntimeError`] is fatal to the current execution context. It unwinds
//!   every active call frame (running its defers) and surfaces to the host.
//! - [`Fault::Soft`] is a non-fatal failure of the statement being
//!   evaluated, reported as status 1 so it composes with `||`, `&&` and `if`.

use thiserror::Error;

/// Fatal runtime errors.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("undefined variable: ${0}")]
    UndefinedVariable(String),

    #[error("undefined function: {0}")]
    UndefinedFunction(String),

    #[error("{name}: expected {expected} argument(s), got {got}")]
    Arity {
        name: String,
        expected: String,
        got: usize,
    },

    #[error("type error: {0}")]
    Type(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("arithmetic overflow")]
    Overflow,

    #[error("job {0} cannot join itself")]
    SelfJoin(String),

    #[error("unknown job: {0}")]
    UnknownJob(String),

    #[error("continue outside of a loop")]
    ContinueOutsideLoop,

    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("{0}")]
    Tool(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Outcome of a failed expression evaluation.
#[derive(Debug)]
pub enum Fault {
    /// The enclosing statement fails with status 1.
    Soft(String),
    /// The execution context aborts.
    Fatal(RuntimeError),
}

impl Fault {
    pub fn soft(reason: impl Into<String>) -> Self {
        Fault::Soft(reason.into())
    }
}

impl From<RuntimeError> for Fault {
    fn from(err: RuntimeError) -> Self {
        Fault::Fatal(err)
    }
}

/// Result type for expression evaluation.
pub type EvalResult<T> = Result<T, Fault>;
