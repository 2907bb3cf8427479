//! Tier-ordered plan execution.
//!
//! Tiers run strictly in sequence. Tasks inside one tier have no
//! dependencies on each other and run with a bounded fan-out. A failed task
//! is recorded and the run continues; cancellation is cooperative and takes
//! effect at the next tier boundary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::client::PlatformClient;
use crate::tasks::TaskPlan;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub tier: &'static str,
    pub task: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub succeeded: usize,
    pub failures: Vec<TaskFailure>,
    pub cancelled: bool,
}

impl MigrationReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

pub async fn run_plan(
    plan: &TaskPlan,
    client: &dyn PlatformClient,
    concurrency: usize,
    cancel: Arc<AtomicBool>,
) -> MigrationReport {
    let concurrency = concurrency.max(1);
    let mut report = MigrationReport::default();

    for tier in &plan.tiers {
        if cancel.load(Ordering::Relaxed) {
            warn!(tier = tier.label, "run cancelled before tier");
            report.cancelled = true;
            break;
        }
        if tier.tasks.is_empty() {
            continue;
        }
        info!(tier = tier.label, tasks = tier.tasks.len(), "starting tier");

        // A task observed as cancelled before it started yields None and
        // counts as neither success nor failure.
        let results: Vec<Option<Result<(), TaskFailure>>> = stream::iter(tier.tasks.iter())
            .map(|task| {
                let cancel = Arc::clone(&cancel);
                async move {
                    if cancel.load(Ordering::Relaxed) {
                        return None;
                    }
                    Some(task.execute(client).await.map_err(|error| TaskFailure {
                        tier: tier.label,
                        task: task.name.clone(),
                        error: error.to_string(),
                    }))
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        for result in results.into_iter().flatten() {
            match result {
                Ok(()) => report.succeeded += 1,
                Err(failure) => {
                    warn!(
                        tier = failure.tier,
                        task = %failure.task,
                        error = %failure.error,
                        "task failed"
                    );
                    report.failures.push(failure);
                }
            }
        }
    }

    info!(
        succeeded = report.succeeded,
        failed = report.failed(),
        cancelled = report.cancelled,
        "run finished"
    );
    report
}
