//! random: Pseudo-random numbers.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::ast::Value;
use crate::tools::{ExecContext, Tool, ToolArgs, ToolResult, ToolSchema};

/// Yields the next number of a per-kernel generator.
///
/// The sequence is fixed: two kernels produce the same numbers.
pub struct Random {
    state: Mutex<Mwc>,
}

impl Random {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for Random {
    fn default() -> Self {
        Self {
            state: Mutex::new(Mwc::default()),
        }
    }
}

#[async_trait]
impl Tool for Random {
    fn name(&self) -> &str {
        "random"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new("random", "Yield a pseudo-random non-negative integer")
    }

    async fn execute(&self, _args: ToolArgs, ctx: &mut ExecContext) -> ToolResult {
        let n = self.state.lock().unwrap_or_else(|e| e.into_inner()).next();
        Ok(ctx.emit_then([Value::int(n as i64)], 0).await)
    }
}

/// Marsaglia's multiply-with-carry generator; yields values below 2^32.
#[derive(Debug, Clone)]
struct Mwc {
    x: u64,
    y: u64,
    z: u64,
    c: u64,
}

impl Default for Mwc {
    fn default() -> Self {
        Self {
            x: 123_456_789,
            y: 362_436_069,
            z: 77_465_321,
            c: 13_579,
        }
    }
}

impl Mwc {
    const MULTIPLIER: u64 = 916_905_990;

    fn next(&mut self) -> u64 {
        let t = Self::MULTIPLIER * self.x + self.c;
        self.x = self.y;
        self.y = self.z;
        self.c = t >> 32;
        self.z = t & 0xffff_ffff;
        self.z
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_deterministic_and_bounded() {
        let mut a = Mwc::default();
        let mut b = Mwc::default();
        let first: Vec<u64> = (0..100).map(|_| a.next()).collect();
        let second: Vec<u64> = (0..100).map(|_| b.next()).collect();
        assert_eq!(first, second);
        assert!(first.iter().all(|n| *n < 1 << 32));

        let mut distinct = first.clone();
        distinct.sort_unstable();
        distinct.dedup();
        assert!(distinct.len() > 90);
    }

    #[test]
    fn first_value_follows_the_recurrence() {
        let mut mwc = Mwc::default();
        let t = 916_905_990u64 * 123_456_789 + 13_579;
        assert_eq!(mwc.next(), t & 0xffff_ffff);
        assert_eq!(mwc.c, t >> 32);
    }
}
