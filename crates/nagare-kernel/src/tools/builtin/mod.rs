//! Built-in host primitives.
//!
//! These tools are always available and provide the host surface:
//! output, external processes, environment variables, the working
//! directory, timers and job listing, plus the text primitives
//! (`str`, `match`) and the `random` generator.

mod cd;
mod echo;
mod env;
mod exec;
mod jobs;
mod pwd;
mod random;
mod sleep;
mod strings;
mod true_false;
mod wildcard;

pub use exec::{run_external, Stdin};

use super::ToolRegistry;

/// Register all built-in tools with the registry.
pub fn register_builtins(registry: &mut ToolRegistry) {
    registry.register(cd::Cd);
    registry.register(echo::Echo::new("echo"));
    registry.register(echo::Echo::new("print"));
    registry.register(env::Env);
    registry.register(exec::Exec);
    registry.register(jobs::Jobs);
    registry.register(pwd::Pwd);
    registry.register(random::Random::new());
    registry.register(sleep::Sleep);
    registry.register(strings::Str);
    registry.register(true_false::True);
    registry.register(true_false::False);
    registry.register(wildcard::Match);
}
