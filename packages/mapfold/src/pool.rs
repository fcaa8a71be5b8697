//! Pool management and lifecycle.

use std::num::NonZero;

use tracing::{debug, trace};

use crate::chunking::{chunk_len, split_into_chunks};
use crate::executor::{Executor, ExecutorKind, Job};
use crate::{Error, PoolBuilder, Result, Workflow};

/// A fixed set of worker units that map and fold sequences of items in parallel.
///
/// The number of workers is decided when the pool is built and never changes. A pool can run any
/// number of operations one after another; each operation is independent of the others and only
/// the worker threads are reused. Every operation blocks the calling thread until all of its work
/// is done.
///
/// A pool with a single worker runs all work on the calling thread and creates no threads at all.
///
/// # Lifecycle
///
/// The pool is open from the moment it is built until [`close()`][Self::close] or
/// [`terminate()`][Self::terminate] is called, after which every operation fails with
/// [`Error::Closed`]. Dropping the pool closes it.
///
/// All operations take `&mut self`, so a pool cannot be closed while one of its operations is
/// still running.
///
/// # Example
///
/// ```
/// use mapfold::Pool;
///
/// let mut pool = Pool::new().unwrap();
///
/// let squares = pool.map(|x: u32| x * x, 1..=4).unwrap();
/// assert_eq!(squares, vec![1, 4, 9, 16]);
///
/// let total = pool.mapreduce(|x: u32| x * x, |a, b| a + b, 1..=4, None).unwrap();
/// assert_eq!(total, 30);
///
/// pool.close();
/// assert!(pool.map(|x: u32| x, 1..=4).is_err());
/// ```
#[derive(Debug)]
pub struct Pool {
    executor: ExecutorKind,
    chunk_size: Option<NonZero<usize>>,
    pub(crate) defaults: Workflow,
    closed: bool,
}

impl Pool {
    /// Builds a pool with one worker per processor available to the process.
    ///
    /// Use [`Pool::builder()`] for custom configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Initialization`] if the worker threads cannot be created.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Creates a builder for configuring the pool.
    #[must_use]
    pub fn builder() -> PoolBuilder {
        PoolBuilder::new()
    }

    pub(crate) fn from_parts(
        executor: ExecutorKind,
        chunk_size: Option<NonZero<usize>>,
        defaults: Workflow,
    ) -> Self {
        Self {
            executor,
            chunk_size,
            defaults,
            closed: false,
        }
    }

    /// Returns the number of worker units in the pool.
    ///
    /// This is 1 for a pool that runs its work on the calling thread.
    #[must_use]
    pub fn size(&self) -> NonZero<usize> {
        self.executor.worker_count()
    }

    /// Returns the number of processors available to the current process.
    ///
    /// This is the default pool size and does not depend on the size of any existing pool.
    #[must_use]
    pub fn cpu_count() -> usize {
        crate::builder::available_processors().get()
    }

    /// Whether the pool has been closed or terminated.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Applies `f` to every item and returns the results in the order of the items.
    ///
    /// The items are split into chunks and each chunk is processed by one worker. If there are
    /// no items, nothing is dispatched and an empty vector is returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the pool has been closed. Returns [`Error::WorkerFault`] if
    /// `f` panics for any item; results for the other items are discarded. The pool remains
    /// usable after a fault.
    pub fn apply<T, U, F>(&mut self, f: F, items: impl IntoIterator<Item = T>) -> Result<Vec<U>>
    where
        T: Send,
        U: Send,
        F: Fn(T) -> U + Sync,
    {
        self.ensure_open()?;

        let items = items.into_iter().collect::<Vec<_>>();

        if items.is_empty() {
            return Ok(Vec::new());
        }

        let chunks = self.split(items);

        let mapped = self.run_chunks(chunks, &|chunk: Vec<T>| {
            chunk.into_iter().map(&f).collect::<Vec<_>>()
        })?;

        Ok(mapped.into_iter().flatten().collect())
    }

    /// Closes the pool. Workers finish what they are doing, exit and are joined.
    ///
    /// Calling this on a closed pool does nothing.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }

        self.executor.shutdown();
        self.closed = true;

        debug!(workers = self.size().get(), "pool closed");
    }

    /// Closes the pool immediately.
    ///
    /// Every operation waits for all of its work before returning and a pool cannot be closed
    /// while an operation is running, so there is never any queued work left to abandon. This
    /// makes `terminate()` equivalent to [`close()`][Self::close].
    pub fn terminate(&mut self) {
        self.close();
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }

    /// Splits items into chunks sized for this pool.
    pub(crate) fn split<T>(&self, items: Vec<T>) -> Vec<Vec<T>> {
        let len = chunk_len(items.len(), self.size(), self.chunk_size);
        split_into_chunks(items, len)
    }

    /// Runs `job` once per chunk on the executor and returns the per-chunk results in chunk order.
    pub(crate) fn run_chunks<T, R, J>(&mut self, chunks: Vec<Vec<T>>, job: &J) -> Result<Vec<R>>
    where
        T: Send,
        R: Send,
        J: Fn(Vec<T>) -> R + Sync,
    {
        let chunk_count = chunks.len();

        trace!(chunk_count, "dispatching chunks");

        let jobs = chunks
            .into_iter()
            .map(|chunk| Box::new(move || job(chunk)) as Job<'_, R>)
            .collect::<Vec<_>>();

        let mut results = Vec::with_capacity(chunk_count);

        for (chunk, outcome) in self.executor.execute(jobs).into_iter().enumerate() {
            match outcome {
                Ok(result) => results.push(result),
                Err(cause) => {
                    let live_workers = self.executor.live_workers();

                    debug!(chunk, %cause, live_workers, "chunk failed");

                    return Err(Error::WorkerFault {
                        chunk,
                        cause,
                        live_workers,
                        workers: self.size(),
                    });
                }
            }
        }

        Ok(results)
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        self.close();
    }
}
