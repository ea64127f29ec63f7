//! Core tool traits and types.

use async_trait::async_trait;

use crate::ast::Value;
use crate::interpreter::{ControlFlow, RuntimeError};

use super::context::ExecContext;

/// What a host primitive returns: how it finished, or a fatal error.
///
/// Host failures (missing file, bad exit code) are `Ok(ControlFlow::Normal(n))`
/// with a non-zero status; only programmer errors are `Err`.
pub type ToolResult = Result<ControlFlow, RuntimeError>;

/// Schema for a tool parameter.
#[derive(Debug, Clone)]
pub struct ParamSchema {
    /// Parameter name.
    pub name: String,
    /// Type hint (string, int, number, any).
    pub param_type: String,
    /// Whether this parameter is required.
    pub required: bool,
    /// Description for help text.
    pub description: String,
}

impl ParamSchema {
    /// Create a required parameter.
    pub fn required(name: impl Into<String>, param_type: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            required: true,
            description: description.into(),
        }
    }

    /// Create an optional parameter.
    pub fn optional(name: impl Into<String>, param_type: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            required: false,
            description: description.into(),
        }
    }
}

/// Schema describing a tool's interface.
#[derive(Debug, Clone)]
pub struct ToolSchema {
    /// Tool name.
    pub name: String,
    /// Short description.
    pub description: String,
    /// Parameter definitions.
    pub params: Vec<ParamSchema>,
    /// Accepts any number of arguments beyond `params`.
    pub variadic: bool,
}

impl ToolSchema {
    /// Create a new tool schema.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
            variadic: false,
        }
    }

    /// Add a parameter to the schema.
    pub fn param(mut self, param: ParamSchema) -> Self {
        self.params.push(param);
        self
    }

    /// Allow trailing arguments.
    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    /// Check an argument count against the schema.
    pub fn check_arity(&self, got: usize) -> Result<(), RuntimeError> {
        let min = self.params.iter().filter(|p| p.required).count();
        let max = if self.variadic { None } else { Some(self.params.len()) };
        if got < min || max.is_some_and(|max| got > max) {
            let expected = match max {
                None => format!("at least {}", min),
                Some(max) if max == min => min.to_string(),
                Some(max) => format!("{} to {}", min, max),
            };
            return Err(RuntimeError::Arity {
                name: self.name.clone(),
                expected,
                got,
            });
        }
        Ok(())
    }
}

/// Arguments passed to a tool: the flattened argument stream.
#[derive(Debug, Clone, Default)]
pub struct ToolArgs {
    /// Positional arguments in order.
    pub positional: Vec<Value>,
}

impl ToolArgs {
    /// Create empty args.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.positional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty()
    }

    /// Get a positional argument rendered as text.
    pub fn get_string(&self, index: usize) -> Option<String> {
        self.positional.get(index).map(Value::to_string)
    }

    /// Every argument rendered as text.
    pub fn strings(&self) -> Vec<String> {
        self.positional.iter().map(Value::to_string).collect()
    }
}

impl From<Vec<Value>> for ToolArgs {
    fn from(positional: Vec<Value>) -> Self {
        Self { positional }
    }
}

/// A host primitive callable from nagare code.
///
/// Tools are registered in the global function namespace and can be
/// shadowed by user functions, including locally inside a call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The name used to invoke this tool.
    fn name(&self) -> &str;

    /// Get the tool's schema (used for arity checks).
    fn schema(&self) -> ToolSchema;

    /// Execute the tool. Values are produced with [`ExecContext::emit`].
    async fn execute(&self, args: ToolArgs, ctx: &mut ExecContext) -> ToolResult;
}
