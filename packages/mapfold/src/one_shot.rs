//! Single-workflow functions that manage the pool on the caller's behalf.

use crate::{PoolBuilder, Result};

/// Builds a pool from `options`, maps every item with `f`, reduces the results with the
/// associative function `combine` and closes the pool.
///
/// With a single process configured, everything runs on the calling thread.
///
/// # Errors
///
/// Returns [`Error::Initialization`][crate::Error::Initialization] if the pool cannot be built,
/// [`Error::EmptyReduction`][crate::Error::EmptyReduction] if there are no items and
/// [`Error::WorkerFault`][crate::Error::WorkerFault] if `f` or `combine` panics.
///
/// # Example
///
/// ```
/// use mapfold::Pool;
///
/// let negated_sum = mapfold::mapreduce(|x: i32| -x, |a, b| a + b, 0..3, Pool::builder()).unwrap();
///
/// assert_eq!(negated_sum, -3);
/// ```
pub fn mapreduce<T, U, F, C>(
    f: F,
    combine: C,
    items: impl IntoIterator<Item = T>,
    options: PoolBuilder,
) -> Result<U>
where
    T: Send,
    U: Send,
    F: Fn(T) -> U + Sync,
    C: Fn(U, U) -> U + Sync,
{
    options.scope(|pool| pool.mapreduce(f, combine, items, None))?
}

/// Builds a pool from `options`, maps every item to a vector with `f`, concatenates the vectors
/// in the order of the items and closes the pool.
///
/// # Errors
///
/// Returns [`Error::Initialization`][crate::Error::Initialization] if the pool cannot be built
/// and [`Error::WorkerFault`][crate::Error::WorkerFault] if `f` panics.
///
/// # Example
///
/// ```
/// use mapfold::Pool;
/// use new_zealand::nz;
///
/// let items = mapfold::mapconcat(
///     |x: u32| vec![x, x * 10],
///     [1, 2],
///     Pool::builder().processes(nz!(2)),
/// )
/// .unwrap();
///
/// assert_eq!(items, vec![1, 10, 2, 20]);
/// ```
pub fn mapconcat<T, U, F>(
    f: F,
    items: impl IntoIterator<Item = T>,
    options: PoolBuilder,
) -> Result<Vec<U>>
where
    T: Send,
    U: Send,
    F: Fn(T) -> Vec<U> + Sync,
{
    options.scope(|pool| pool.mapconcat(f, items))?
}

#[cfg(not(miri))] // ProcessorSet is not supported under Miri.
#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::{Arc, Mutex};

    use new_zealand::nz;

    use crate::{Error, Pool};

    #[test]
    fn mapreduce_matches_pool_method() {
        for processes in [nz!(1), nz!(2)] {
            let one_shot = super::mapreduce(
                |x: u64| x * x,
                |a, b| a + b,
                1..=20,
                Pool::builder().processes(processes),
            )
            .unwrap();

            let mut pool = Pool::builder().processes(processes).build().unwrap();
            let method = pool
                .mapreduce(|x: u64| x * x, |a, b| a + b, 1..=20, None)
                .unwrap();

            assert_eq!(one_shot, method);
        }
    }

    #[test]
    fn mapreduce_empty_input_fails() {
        let result = super::mapreduce(
            |x: u64| x,
            |a, b| a + b,
            Vec::new(),
            Pool::builder().processes(nz!(1)),
        );

        assert!(matches!(result, Err(Error::EmptyReduction)));
    }

    #[test]
    fn mapreduce_reports_stage_progress() {
        let completed = Arc::new(Mutex::new(Vec::new()));

        let result = super::mapreduce(
            |x: u32| x,
            |a, b| a + b,
            0..50,
            Pool::builder()
                .processes(nz!(2))
                .stages(nz!(4))
                .progress({
                    let completed = Arc::clone(&completed);
                    move |progress| {
                        completed.lock().unwrap().push(progress.items_processed());
                    }
                }),
        )
        .unwrap();

        assert_eq!(result, 1225);
        assert_eq!(*completed.lock().unwrap(), vec![13, 26, 38, 50]);
    }

    #[test]
    fn mapconcat_preserves_order() {
        for processes in [nz!(1), nz!(2)] {
            let result = super::mapconcat(
                |x: u32| vec![x + 1],
                0..100,
                Pool::builder().processes(processes).stages(nz!(4)),
            )
            .unwrap();

            assert_eq!(result, (1..=100).collect::<Vec<_>>());
        }
    }

    #[test]
    fn reserving_every_processor_fails_to_initialize() {
        let result = super::mapconcat(
            |x: u32| vec![x],
            0..10,
            Pool::builder().reserve_processors(Pool::cpu_count()),
        );

        assert!(matches!(result, Err(Error::Initialization { .. })));
    }
}
