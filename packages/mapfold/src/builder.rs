use std::num::NonZero;

use many_cpus::ProcessorSetBuilder;
use new_zealand::nz;
use tracing::debug;

use crate::executor::ExecutorKind;
use crate::{Error, InlineExecutor, ParallelExecutor, Pool, Result, StageProgress, Workflow};

/// Builder for configuring a [`Pool`].
///
/// # Example
///
/// ```
/// use mapfold::Pool;
/// use new_zealand::nz;
///
/// let mut pool = Pool::builder()
///     .processes(nz!(3))
///     .chunk_size(nz!(16))
///     .build()
///     .unwrap();
///
/// assert_eq!(pool.size(), nz!(3));
/// assert_eq!(pool.map(|x: i64| -x, [1, 2]).unwrap(), vec![-1, -2]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct PoolBuilder {
    processes: Processes,
    chunk_size: Option<NonZero<usize>>,
    defaults: Workflow,
}

#[derive(Clone, Copy, Debug, Default)]
enum Processes {
    /// One worker per processor available to the process.
    #[default]
    Available,

    Exactly(NonZero<usize>),

    /// All available processors except this many.
    Reserve(usize),
}

impl PoolBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Sets the number of worker units.
    ///
    /// With a single worker, all work runs on the calling thread and no threads are created.
    /// Larger counts create that many worker threads, even if it exceeds the number of processors.
    ///
    /// Default: one worker per processor available to the process.
    #[must_use]
    pub fn processes(mut self, count: NonZero<usize>) -> Self {
        self.processes = Processes::Exactly(count);
        self
    }

    /// Sizes the pool to leave `count` of the available processors unused.
    ///
    /// Building fails if this leaves no processor for the pool.
    #[must_use]
    pub fn reserve_processors(mut self, count: usize) -> Self {
        self.processes = Processes::Reserve(count);
        self
    }

    /// Sets the number of items dispatched to a worker as one job.
    ///
    /// Larger chunks mean less dispatch overhead but coarser load balancing between workers;
    /// smaller chunks balance better at a higher overhead. The chunk size never affects results.
    ///
    /// Default: the number of items divided evenly between the workers.
    #[must_use]
    pub fn chunk_size(mut self, items: NonZero<usize>) -> Self {
        self.chunk_size = Some(items);
        self
    }

    /// Splits every map/reduce workflow into this many stages by default.
    ///
    /// See [`Workflow::stages()`].
    #[must_use]
    pub fn stages(mut self, stages: NonZero<usize>) -> Self {
        self.defaults = self.defaults.stages(stages);
        self
    }

    /// Reports progress after every stage of a map/reduce workflow by default.
    ///
    /// See [`Workflow::progress()`].
    #[must_use]
    pub fn progress<P>(mut self, progress: P) -> Self
    where
        P: Fn(StageProgress) + Send + Sync + 'static,
    {
        self.defaults = self.defaults.progress(progress);
        self
    }

    /// Closes the pool after the first map/reduce workflow by default.
    ///
    /// See [`Workflow::close()`].
    #[must_use]
    pub fn close_after_workflow(mut self, close: bool) -> Self {
        self.defaults = self.defaults.close(close);
        self
    }

    /// Builds the pool, creating its worker threads.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Initialization`] if the configured size leaves the pool without workers or
    /// if a worker thread cannot be created.
    pub fn build(self) -> Result<Pool> {
        let workers = match self.processes {
            Processes::Available => available_processors(),
            Processes::Exactly(count) => count,
            Processes::Reserve(reserved) => {
                let available = available_processors();

                NonZero::new(available.get().saturating_sub(reserved)).ok_or_else(|| {
                    Error::Initialization {
                        reason: format!(
                            "reserving {reserved} of {available} available processors leaves no workers"
                        ),
                    }
                })?
            }
        };

        let executor = if workers == nz!(1) {
            ExecutorKind::Inline(InlineExecutor::new())
        } else {
            ExecutorKind::Parallel(ParallelExecutor::new(workers)?)
        };

        debug!(
            workers = workers.get(),
            inline = matches!(executor, ExecutorKind::Inline(_)),
            "pool opened"
        );

        Ok(Pool::from_parts(executor, self.chunk_size, self.defaults))
    }

    /// Builds a pool, hands it to `f` and closes it when `f` returns or panics.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Initialization`] if the pool cannot be built, in which case `f` is not
    /// called. Errors from operations inside `f` are part of its return value.
    ///
    /// # Example
    ///
    /// ```
    /// use mapfold::Pool;
    /// use new_zealand::nz;
    ///
    /// let total = Pool::builder()
    ///     .processes(nz!(2))
    ///     .scope(|pool| pool.mapreduce(|x: u32| x, |a, b| a + b, 1..=10, None))
    ///     .unwrap()
    ///     .unwrap();
    ///
    /// assert_eq!(total, 55);
    /// ```
    pub fn scope<R>(self, f: impl FnOnce(&mut Pool) -> R) -> Result<R> {
        let mut pool = self.build()?;

        // If `f` panics, dropping the pool closes it instead.
        let result = f(&mut pool);
        pool.close();

        Ok(result)
    }
}

/// Number of processors the current process may use, at least 1.
pub(crate) fn available_processors() -> NonZero<usize> {
    ProcessorSetBuilder::new()
        .take_all()
        .and_then(|processors| NonZero::new(processors.len()))
        .unwrap_or(nz!(1))
}

#[cfg(not(miri))] // ProcessorSet is not supported under Miri.
#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread;

    use super::*;

    #[test]
    fn default_uses_available_processors() {
        let pool = PoolBuilder::new().build().unwrap();

        assert_eq!(pool.size(), available_processors());
    }

    #[test]
    fn single_process_runs_inline() {
        let pool = PoolBuilder::new().processes(nz!(1)).build().unwrap();

        assert_eq!(pool.size(), nz!(1));
        assert!(format!("{pool:?}").contains("Inline"));
    }

    #[test]
    fn multiple_processes_run_in_parallel() {
        let pool = PoolBuilder::new().processes(nz!(2)).build().unwrap();

        assert_eq!(pool.size(), nz!(2));
        assert!(format!("{pool:?}").contains("Parallel"));
    }

    #[test]
    fn reserving_some_processors_shrinks_pool() {
        let available = available_processors().get();

        if available < 2 {
            return;
        }

        let pool = PoolBuilder::new().reserve_processors(1).build().unwrap();

        assert_eq!(pool.size().get(), available - 1);
    }

    #[test]
    fn reserving_all_processors_fails() {
        let available = available_processors().get();

        let result = PoolBuilder::new().reserve_processors(available).build();

        assert!(matches!(result, Err(Error::Initialization { .. })));
    }

    #[test]
    fn reserving_nothing_matches_default() {
        let pool = PoolBuilder::new().reserve_processors(0).build().unwrap();

        assert_eq!(pool.size(), available_processors());
    }

    #[test]
    fn scope_returns_closure_result() {
        let result = PoolBuilder::new()
            .processes(nz!(2))
            .scope(|pool| pool.map(|x: u8| x * 2, [1, 2, 3]))
            .unwrap()
            .unwrap();

        assert_eq!(result, vec![2, 4, 6]);
    }

    #[test]
    fn scope_closes_pool_on_panic() {
        struct ExitCounter(Arc<AtomicUsize>);

        impl Drop for ExitCounter {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::Relaxed);
            }
        }

        thread_local! {
            static EXIT_COUNTER: RefCell<Option<ExitCounter>> = const { RefCell::new(None) };
        }

        let exits = Arc::new(AtomicUsize::new(0));
        let workers_used = Mutex::new(HashSet::new());

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            PoolBuilder::new()
                .processes(nz!(2))
                .chunk_size(nz!(1))
                .scope(|pool| {
                    pool.map(
                        |x: u8| {
                            // Counted when the worker thread exits.
                            EXIT_COUNTER.with(|counter| {
                                counter
                                    .borrow_mut()
                                    .get_or_insert_with(|| ExitCounter(Arc::clone(&exits)));
                            });

                            workers_used.lock().unwrap().insert(thread::current().id());
                            x
                        },
                        0..16,
                    )
                    .unwrap();

                    panic!("leaving the scope abnormally");
                })
        }));

        assert!(result.is_err());

        let workers_used = workers_used.into_inner().unwrap().len();
        assert!(workers_used >= 1);

        // Every worker that ran a job has exited, so the pool was closed while unwinding.
        assert_eq!(exits.load(Ordering::Relaxed), workers_used);
    }
}
