use std::num::NonZero;

use thiserror::Error;

/// Errors that can occur when opening or using a [`Pool`][crate::Pool].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The pool could not be created. No usable pool exists after this error.
    #[error("cannot initialize pool: {reason}")]
    Initialization {
        /// A human-readable description of the problem.
        reason: String,
    },

    /// The pool has already been closed or terminated and accepts no further work.
    #[error("pool is closed")]
    Closed,

    /// A chunk of work could not be completed, so the whole operation failed.
    ///
    /// The pool remains open and usable. If `live_workers` is less than `workers`, a worker
    /// thread has been lost and the pool is running with degraded capacity.
    #[error("chunk {chunk} failed ({live_workers} of {workers} workers alive): {cause}")]
    WorkerFault {
        /// Index of the first failed job, in dispatch order, within the round of work that
        /// failed.
        ///
        /// While items are mapped and reduced within their chunks, this is the index of the input
        /// chunk. While partial results are being combined, it is the index of the pair of
        /// neighboring partial results within that combining round.
        chunk: usize,

        /// What went wrong with the chunk.
        cause: FaultCause,

        /// Number of worker threads still running when the fault was observed.
        live_workers: usize,

        /// Number of worker units the pool was created with.
        workers: NonZero<usize>,
    },

    /// A fold without a seed was asked to reduce an empty sequence.
    #[error("cannot fold an empty sequence without a seed")]
    EmptyReduction,
}

/// The reason a chunk of work failed.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum FaultCause {
    /// A caller-supplied function panicked while processing the chunk.
    #[error("task panicked: {message}")]
    Panicked {
        /// The panic payload if it was a string, otherwise a placeholder.
        message: String,
    },

    /// The worker executing the chunk went away before reporting a result.
    #[error("worker was lost before the task completed")]
    WorkerLost,
}

/// A specialized `Result` type for pool operations, returning the crate's
/// [`Error`] type as the error value.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::fmt::Debug;

    use new_zealand::nz;
    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Error: Send, Sync, Debug);
    assert_impl_all!(FaultCause: Send, Sync, Debug, Clone);

    #[test]
    fn worker_fault_message_includes_capacity() {
        let error = Error::WorkerFault {
            chunk: 3,
            cause: FaultCause::Panicked {
                message: "boom".to_string(),
            },
            live_workers: 1,
            workers: nz!(2),
        };

        let message = error.to_string();

        assert!(message.contains("chunk 3"));
        assert!(message.contains("1 of 2 workers alive"));
        assert!(message.contains("boom"));
    }

    #[test]
    fn lost_worker_has_distinct_message() {
        assert_eq!(
            FaultCause::WorkerLost.to_string(),
            "worker was lost before the task completed"
        );
    }
}
