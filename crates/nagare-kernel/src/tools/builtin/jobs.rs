//! jobs: List background jobs.

use async_trait::async_trait;

use crate::ast::Value;
use crate::tools::{ExecContext, Tool, ToolArgs, ToolResult, ToolSchema};

/// Jobs tool: yields `handle status` pairs, oldest first.
pub struct Jobs;

#[async_trait]
impl Tool for Jobs {
    fn name(&self) -> &str {
        "jobs"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new("jobs", "List background jobs as handle/status pairs")
    }

    async fn execute(&self, _args: ToolArgs, ctx: &mut ExecContext) -> ToolResult {
        let pairs: Vec<Value> = ctx
            .jobs
            .list()
            .into_iter()
            .flat_map(|job| [Value::Scalar(job.id.to_string()), Value::Scalar(job.status.to_string())])
            .collect();
        Ok(ctx.emit_then(pairs, 0).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{collect, JobManager, JobResult};
    use crate::tools::builtin::testing;
    use std::sync::Arc;

    #[tokio::test]
    async fn lists_finished_jobs() {
        let manager = Arc::new(JobManager::new());
        let id = manager.spawn("quick".into(), |_| async { JobResult::finished(0, Vec::new()) });
        manager.wait(id).await;

        let jobs = Arc::clone(&manager);
        let (_, out) = collect(|output| async move {
            let mut ctx = ExecContext::new(output, jobs, testing::host("/"));
            Jobs.execute(ToolArgs::new(), &mut ctx).await
        })
        .await;
        assert_eq!(out, vec![Value::scalar("%1"), Value::scalar("done")]);
    }
}
