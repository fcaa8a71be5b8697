use std::num::NonZero;

use new_zealand::nz;

use crate::executor::{Executor, Job, JobOutcome, run_caught};

/// Executes jobs one after another on the calling thread, without any worker threads.
///
/// This is what a pool with a single worker unit uses, as dispatching work to one other thread
/// only adds overhead. Outcomes are identical to those of a
/// [`ParallelExecutor`][crate::ParallelExecutor] given the same jobs.
#[derive(Debug, Default)]
pub(crate) struct InlineExecutor {
    shut_down: bool,
}

impl InlineExecutor {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

impl Executor for InlineExecutor {
    fn worker_count(&self) -> NonZero<usize> {
        nz!(1)
    }

    fn live_workers(&self) -> usize {
        if self.shut_down { 0 } else { 1 }
    }

    fn execute<'a, R>(&mut self, jobs: Vec<Job<'a, R>>) -> Vec<JobOutcome<R>>
    where
        R: Send + 'a,
    {
        let mut outcomes = Vec::with_capacity(jobs.len());

        for job in jobs {
            let outcome = run_caught(job);
            let failed = outcome.is_err();

            outcomes.push(outcome);

            // The whole operation fails anyway, so there is no point in running the rest.
            if failed {
                break;
            }
        }

        outcomes
    }

    fn shutdown(&mut self) {
        self.shut_down = true;
    }
}
