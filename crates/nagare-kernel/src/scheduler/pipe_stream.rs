//! Single-slot value pipes connecting pipeline stages.
//!
//! ```text
//!   OutputPort ──▶ [mpsc, capacity 1] ──▶ InputPort
//!                  ├── send waits while the slot is full (backpressure)
//!                  ├── fetch waits while the slot is empty
//!                  ├── drop every OutputPort → end of stream
//!                  └── drop every InputPort  → send fails with the port id
//! ```
//!
//! `InputPort` keeps a small pending buffer so a `fetch` that asks for more
//! values than the stream still has can fail without consuming anything.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::ast::Value;

/// Each pipe holds at most one value in flight.
pub const PIPE_CAPACITY: usize = 1;

static NEXT_PORT: AtomicU64 = AtomicU64::new(1);

/// Identity of one pipe; carried by the signal raised when its reader
/// goes away so the pipeline that created it can recognize it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortId(u64);

impl PortId {
    fn next() -> Self {
        PortId(NEXT_PORT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "port#{}", self.0)
    }
}

/// Writing end of a pipe.
#[derive(Debug, Clone)]
pub struct OutputPort {
    id: PortId,
    tx: mpsc::Sender<Value>,
}

impl OutputPort {
    pub fn id(&self) -> PortId {
        self.id
    }

    /// Hand one value downstream, waiting for the slot to free up.
    ///
    /// Fails with the port id once the reading side is gone.
    pub async fn send(&self, value: Value) -> Result<(), PortId> {
        self.tx.send(value).await.map_err(|_| self.id)
    }
}

#[derive(Debug)]
struct InputState {
    rx: Option<mpsc::Receiver<Value>>,
    pending: VecDeque<Value>,
}

impl InputState {
    /// Pull from the channel until `want` values are pending or the stream
    /// ends.
    async fn fill(&mut self, want: usize) {
        while self.pending.len() < want {
            let Some(rx) = self.rx.as_mut() else {
                return;
            };
            match rx.recv().await {
                Some(value) => self.pending.push_back(value),
                None => self.rx = None,
            }
        }
    }
}

/// Reading end of a pipe. Clones share the same stream.
#[derive(Debug, Clone)]
pub struct InputPort {
    state: Arc<Mutex<InputState>>,
}

impl InputPort {
    /// An input that is already at end of stream.
    pub fn closed() -> Self {
        Self {
            state: Arc::new(Mutex::new(InputState {
                rx: None,
                pending: VecDeque::new(),
            })),
        }
    }

    /// Take exactly `n` values, or nothing if the stream ends first.
    pub async fn fetch(&self, n: usize) -> Option<Vec<Value>> {
        let mut state = self.state.lock().await;
        state.fill(n).await;
        if state.pending.len() < n {
            return None;
        }
        Some(state.pending.drain(..n).collect())
    }

    /// Take the rest of the stream if it has at least `min` values;
    /// otherwise take nothing.
    pub async fn fetch_rest(&self, min: usize) -> Option<Vec<Value>> {
        let mut state = self.state.lock().await;
        state.fill(usize::MAX).await;
        if state.pending.len() < min {
            return None;
        }
        Some(state.pending.drain(..).collect())
    }

    /// Drain everything remaining.
    pub async fn drain(&self) -> Vec<Value> {
        self.fetch_rest(0).await.unwrap_or_default()
    }
}

/// Create a connected pipe.
pub fn pipe() -> (OutputPort, InputPort) {
    let (tx, rx) = mpsc::channel(PIPE_CAPACITY);
    let output = OutputPort { id: PortId::next(), tx };
    let input = InputPort {
        state: Arc::new(Mutex::new(InputState {
            rx: Some(rx),
            pending: VecDeque::new(),
        })),
    };
    (output, input)
}

/// Run `body` with a fresh output port while feeding everything it yields
/// to `on_value`. Completes when the body has finished and every copy of
/// the port is gone.
pub async fn drain_with<F, Fut, R>(body: F, mut on_value: impl FnMut(Value)) -> R
where
    F: FnOnce(OutputPort) -> Fut,
    Fut: Future<Output = R>,
{
    let (tx, mut rx) = mpsc::channel(PIPE_CAPACITY);
    let output = OutputPort { id: PortId::next(), tx };
    let run = body(output);
    let collect = async move {
        while let Some(value) = rx.recv().await {
            on_value(value);
        }
    };
    let (result, ()) = futures::join!(run, collect);
    result
}

/// Like [`drain_with`], collecting the values.
pub async fn collect<F, Fut, R>(body: F) -> (R, Vec<Value>)
where
    F: FnOnce(OutputPort) -> Fut,
    Fut: Future<Output = R>,
{
    let mut values = Vec::new();
    let result = drain_with(body, |v| values.push(v)).await;
    (result, values)
}
