//! Pipeline execution.
//!
//! Connects `n` stages with single-slot pipes so each stage's `yield`
//! feeds the next stage's `fetch`, runs them concurrently on the current
//! task, and folds their outcomes into one.

use std::collections::HashSet;
use std::future::Future;

use futures::future::join_all;

use crate::interpreter::{ControlFlow, RuntimeError};

use super::pipe_stream::{pipe, InputPort, OutputPort, PortId};

/// Run `count` stages wired in a chain.
///
/// Stage 0 reads `input`, the last stage writes `output`, and every stage
/// in between gets a fresh pipe. `run_stage` receives the stage index and
/// the ports it owns; the ports must be moved into the returned future so
/// they are released when the stage finishes.
///
/// Outcome, once every stage has finished:
/// - the first fatal error (left to right) is returned
/// - `Closed` for a pipe this pipeline created is absorbed
/// - otherwise the first non-normal signal (left to right) propagates
/// - otherwise the last stage's status is the pipeline's status
pub async fn run_pipeline<F, Fut>(
    count: usize,
    input: InputPort,
    output: OutputPort,
    mut run_stage: F,
) -> Result<ControlFlow, RuntimeError>
where
    F: FnMut(usize, InputPort, OutputPort) -> Fut,
    Fut: Future<Output = Result<ControlFlow, RuntimeError>>,
{
    if count == 0 {
        return Ok(ControlFlow::ok());
    }

    let mut owned: HashSet<PortId> = HashSet::new();
    let mut stages = Vec::with_capacity(count);
    let mut next_input = Some(input);
    let mut final_output = Some(output);

    for i in 0..count {
        let stage_input = next_input.take().unwrap_or_else(InputPort::closed);
        let stage_output = if i + 1 == count {
            match final_output.take() {
                Some(out) => out,
                None => break,
            }
        } else {
            let (out, inp) = pipe();
            owned.insert(out.id());
            next_input = Some(inp);
            out
        };
        stages.push(run_stage(i, stage_input, stage_output));
    }

    tracing::trace!(stages = count, "pipeline started");
    let outcomes = join_all(stages).await;
    combine(outcomes, &owned)
}

fn combine(
    outcomes: Vec<Result<ControlFlow, RuntimeError>>,
    owned: &HashSet<PortId>,
) -> Result<ControlFlow, RuntimeError> {
    let mut flows = Vec::with_capacity(outcomes.len());
    let mut first_error = None;
    for outcome in outcomes {
        match outcome {
            Ok(flow) => flows.push(flow),
            Err(err) => {
                if first_error.is_none() {
                    first_error = Some(err);
                }
                flows.push(ControlFlow::fail());
            }
        }
    }
    if let Some(err) = first_error {
        return Err(err);
    }

    let last_status = match flows.last() {
        Some(ControlFlow::Closed(id)) if owned.contains(id) => 0,
        Some(flow) => flow.status(),
        None => 0,
    };

    for flow in flows {
        match flow {
            ControlFlow::Normal(_) => {}
            ControlFlow::Closed(id) if owned.contains(&id) => {}
            signal => return Ok(signal),
        }
    }
    Ok(ControlFlow::Normal(last_status))
}
