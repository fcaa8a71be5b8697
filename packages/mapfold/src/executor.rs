//! The execution substrate behind a [`Pool`][crate::Pool].
//!
//! An executor runs an ordered batch of jobs to completion and reports one outcome per job, in the
//! order the jobs were submitted. Two executors exist: [`InlineExecutor`][crate::InlineExecutor]
//! runs jobs on the calling thread and [`ParallelExecutor`][crate::ParallelExecutor] runs them on
//! a fixed set of worker threads. Both produce identical outcomes for identical jobs.

use std::any::Any;
use std::mem;
use std::num::NonZero;
use std::panic::{self, AssertUnwindSafe};

use crate::{FaultCause, InlineExecutor, ParallelExecutor};

/// A unit of work submitted to an executor. Jobs may borrow from the caller because every
/// executor finishes (or drops) all submitted jobs before returning from `execute()`.
pub(crate) type Job<'a, R> = Box<dyn FnOnce() -> R + Send + 'a>;

/// The result of one job.
pub(crate) type JobOutcome<R> = Result<R, FaultCause>;

pub(crate) trait Executor {
    /// Number of worker units the executor was created with.
    fn worker_count(&self) -> NonZero<usize>;

    /// Number of worker units that are still able to execute jobs.
    fn live_workers(&self) -> usize;

    /// Executes the jobs and returns their outcomes in submission order.
    ///
    /// The returned sequence may stop early after the first failed outcome. It never contains an
    /// outcome after a failure that is not also present in a full execution.
    fn execute<'a, R>(&mut self, jobs: Vec<Job<'a, R>>) -> Vec<JobOutcome<R>>
    where
        R: Send + 'a;

    /// Stops all workers and releases their resources. Calling this more than once is harmless.
    fn shutdown(&mut self);
}

/// The executor owned by a pool, selected once at construction.
#[derive(Debug)]
pub(crate) enum ExecutorKind {
    Inline(InlineExecutor),
    Parallel(ParallelExecutor),
}

impl Executor for ExecutorKind {
    fn worker_count(&self) -> NonZero<usize> {
        match self {
            Self::Inline(inline) => inline.worker_count(),
            Self::Parallel(parallel) => parallel.worker_count(),
        }
    }

    fn live_workers(&self) -> usize {
        match self {
            Self::Inline(inline) => inline.live_workers(),
            Self::Parallel(parallel) => parallel.live_workers(),
        }
    }

    fn execute<'a, R>(&mut self, jobs: Vec<Job<'a, R>>) -> Vec<JobOutcome<R>>
    where
        R: Send + 'a,
    {
        match self {
            Self::Inline(inline) => inline.execute(jobs),
            Self::Parallel(parallel) => parallel.execute(jobs),
        }
    }

    fn shutdown(&mut self) {
        match self {
            Self::Inline(inline) => inline.shutdown(),
            Self::Parallel(parallel) => parallel.shutdown(),
        }
    }
}

/// Runs a job, converting a panic into a fault instead of unwinding into the executor.
///
/// Nothing the job does can unwind out of this function, including a panic payload that panics
/// again when dropped.
pub(crate) fn run_caught<R>(job: Job<'_, R>) -> JobOutcome<R> {
    panic::catch_unwind(AssertUnwindSafe(job)).map_err(|payload| {
        let message = panic_message(payload.as_ref());
        drop_payload(payload);

        FaultCause::Panicked { message }
    })
}

fn drop_payload(payload: Box<dyn Any + Send>) {
    if let Err(nested) = panic::catch_unwind(AssertUnwindSafe(|| drop(payload))) {
        // The nested payload may be just as hostile, so it is leaked instead of dropped.
        mem::forget(nested);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn run_caught_passes_through_value() {
        let outcome = run_caught(Box::new(|| 42));

        assert_eq!(outcome, Ok(42));
    }

    #[test]
    fn run_caught_captures_str_panic() {
        let outcome: JobOutcome<()> = run_caught(Box::new(|| panic!("static message")));

        assert_eq!(
            outcome,
            Err(FaultCause::Panicked {
                message: "static message".to_string()
            })
        );
    }

    #[test]
    fn run_caught_captures_formatted_panic() {
        let value = 7;
        let outcome: JobOutcome<()> = run_caught(Box::new(move || panic!("value was {value}")));

        assert_eq!(
            outcome,
            Err(FaultCause::Panicked {
                message: "value was 7".to_string()
            })
        );
    }

    #[test]
    fn run_caught_survives_payload_that_panics_on_drop() {
        struct PanicOnDrop;

        impl Drop for PanicOnDrop {
            fn drop(&mut self) {
                panic!("payload refuses to be dropped");
            }
        }

        let outcome: JobOutcome<()> =
            run_caught(Box::new(|| panic::panic_any(PanicOnDrop)));

        assert_eq!(
            outcome,
            Err(FaultCause::Panicked {
                message: "non-string panic payload".to_string()
            })
        );
    }

    #[test]
    fn run_caught_tolerates_non_string_payload() {
        let outcome: JobOutcome<()> =
            run_caught(Box::new(|| panic::panic_any(123_u32)));

        assert_eq!(
            outcome,
            Err(FaultCause::Panicked {
                message: "non-string panic payload".to_string()
            })
        );
    }
}
