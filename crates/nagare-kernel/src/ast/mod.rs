//! Abstract syntax tree and runtime values.

mod types;
mod value;

pub use types::*;
pub use value::Value;
