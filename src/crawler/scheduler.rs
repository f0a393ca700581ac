//! In-process scheduler for whole crawl runs
//!
//! This module drives a run locally: it runs the seed step, turns every
//! emitted work item into a child step, and keeps going until no work is
//! left. Concurrency is bounded by a semaphore. External schedulers that
//! invoke single steps do not need it.

use crate::crawler::params::{StepOutcome, StepParams};
use crate::crawler::step::CrawlStep;
use crate::output::RunReport;
use crate::RippleError;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

type StepTaskOutput = (StepParams, Result<StepOutcome, RippleError>);

/// Fan-out driver for a crawl run
#[derive(Debug, Clone)]
pub struct LocalScheduler {
    step: CrawlStep,
    max_concurrency: usize,
}

impl LocalScheduler {
    /// Creates a scheduler running at most `max_concurrency` steps at once
    pub fn new(step: CrawlStep, max_concurrency: usize) -> Self {
        Self {
            step,
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Runs a crawl from `root` until the frontier is empty
    ///
    /// Child steps inherit the root's run-wide settings. A failing step is
    /// recorded in the report and does not stop its siblings; only an
    /// invalid root is returned as an error.
    pub async fn run(&self, root: StepParams) -> Result<RunReport, RippleError> {
        root.validate()?;

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks: JoinSet<StepTaskOutput> = JoinSet::new();
        let mut report = RunReport::new(self.step.ledger().run_id().clone());

        tracing::info!(
            "Starting run {} from {} (max depth {}, max pages {}, concurrency {})",
            self.step.ledger().run_id(),
            root.url,
            root.max_depth,
            root.max_pages,
            self.max_concurrency
        );

        self.spawn_step(&mut tasks, &semaphore, root.clone());

        while let Some(joined) = tasks.join_next().await {
            let (params, result) =
                joined.map_err(|e| RippleError::Scheduler(format!("step task failed: {}", e)))?;

            match result {
                Ok(outcome) => {
                    for item in &outcome.work_items {
                        self.spawn_step(&mut tasks, &semaphore, root.child(item));
                    }
                    report.record(outcome);
                }
                Err(e) => {
                    tracing::warn!("Step failed for {} (depth {}): {}", params.url, params.depth, e);
                    report.record_failure(&params, &e);
                }
            }
        }

        report.finish();
        tracing::info!(
            "Run {} finished: {} pages fetched, {} skipped, {} failed",
            report.run_id,
            report.pages_fetched(),
            report.pages_skipped(),
            report.failures.len()
        );

        Ok(report)
    }

    fn spawn_step(
        &self,
        tasks: &mut JoinSet<StepTaskOutput>,
        semaphore: &Arc<Semaphore>,
        params: StepParams,
    ) {
        let step = self.step.clone();
        let semaphore = Arc::clone(semaphore);

        tasks.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    let err = RippleError::Scheduler(format!("semaphore closed: {}", e));
                    return (params, Err(err));
                }
            };
            let result = step.run(&params).await;
            (params, result)
        });
    }
}
