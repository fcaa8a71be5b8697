#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Parallel map/fold over a fixed pool of worker threads.
//!
//! This package runs workloads of the shape "transform each item, then merge all the results"
//! in parallel. A [`Pool`] owns a fixed set of worker threads that is created once and reused
//! by every operation until the pool is closed. Each operation splits its input into chunks,
//! hands the chunks to the workers, waits for all of them and assembles the result.
//!
//! The core operations are:
//!
//! - [`Pool::map()`] - applies a function to every item, returning results in input order.
//! - [`Pool::fold()`] - reduces values with an associative function, optionally seeded.
//! - [`Pool::mapreduce()`] - both of the above, with each worker reducing its own chunk.
//! - [`Pool::mapconcat()`] - maps every item to a vector and concatenates the vectors.
//!
//! For one-off work, the [`mapreduce()`] and [`mapconcat()`] functions build a pool, run one
//! workflow and close the pool again.
//!
//! # Quick start
//!
//! ```rust
//! use mapfold::Pool;
//!
//! let mut pool = Pool::new().unwrap();
//!
//! let words = ["parallel", "map", "and", "fold"];
//! let letters = pool
//!     .mapreduce(|word: &str| word.len(), |a, b| a + b, words, None)
//!     .unwrap();
//!
//! assert_eq!(letters, 18);
//! ```
//!
//! # Ordering
//!
//! Map results always come back in the order of the input, no matter which worker finished
//! first. Reduction combines neighboring values only and always keeps the left operand on the
//! left, so any associative combining function gives the same result as a sequential
//! left-to-right reduction, whatever the pool size or chunk size. Combining functions that are
//! not associative give unspecified results.
//!
//! # Pool size
//!
//! By default a pool has one worker per processor available to the process, with each worker
//! pinned to its own processor. A pool of size 1 runs all work on the calling thread and creates
//! no threads. See [`PoolBuilder`] for all settings.
//!
//! # Failures
//!
//! If a caller-supplied function panics, the whole operation fails with
//! [`Error::WorkerFault`] and no partial results are returned. The panic does not take down the
//! worker, so the pool remains usable.
//!
//! # Staged workflows
//!
//! A map/reduce workflow can be split into consecutive stages, with a progress callback invoked
//! after every stage. See [`Workflow`].
//!
//! # Shutdown behavior
//!
//! [`Pool::close()`] lets the workers finish their current work and joins them. Dropping the pool
//! closes it. Once closed, every operation fails with [`Error::Closed`].

mod builder;
mod chunking;
mod engine;
mod error;
mod executor;
mod inline;
mod one_shot;
mod parallel;
mod pool;
mod workflow;

pub use builder::*;
pub use error::*;
pub(crate) use inline::InlineExecutor;
pub use one_shot::*;
pub(crate) use parallel::ParallelExecutor;
pub use pool::*;
pub use workflow::*;
