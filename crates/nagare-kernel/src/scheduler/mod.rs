//! Scheduler module: pipelines and background jobs.
//!
//! This module provides:
//! - **Pipes**: single-slot value channels between stages, with
//!   non-consuming short reads and a "reader gone" signal for producers.
//! - **Pipeline execution**: run stages concurrently on one task so that
//!   each runs only as far as its consumer demands.
//! - **Background jobs**: run blocks on their own tokio task, track them,
//!   and join them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       run_pipeline                          │
//! │  ┌─────────┐   pipe(1)   ┌─────────┐   pipe(1)   ┌────────┐ │
//! │  │ stage 0 │────────────▶│ stage 1 │────────────▶│stage 2 │ │
//! │  │  yield  │             │  fetch  │             │ fetch  │ │
//! │  └─────────┘             └─────────┘             └────────┘ │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      JobManager                             │
//! │  jobs: HashMap<JobId, Job>                                  │
//! │  - spawn(block) → JobId                                     │
//! │  - wait(JobId) → JobResult (cached)                         │
//! │  - wait_all() → Vec<(JobId, JobResult)>                     │
//! │  - list() → Vec<JobInfo>                                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod job;
mod pipe_stream;
mod pipeline;

pub use job::{JobId, JobInfo, JobManager, JobResult, JobStatus};
pub use pipe_stream::{collect, drain_with, pipe, InputPort, OutputPort, PortId, PIPE_CAPACITY};
pub use pipeline::run_pipeline;
