//! Integration tests for opening, closing and terminating pools.
//!
//! These tests are ignored under Miri because Miri does not support thread spawning and
//! platform-specific calls.

use mapfold::{Error, FaultCause, Pool, Workflow};
use new_zealand::nz;
use testing::with_watchdog;

#[cfg_attr(miri, ignore)]
#[test]
fn every_operation_fails_after_close() {
    with_watchdog(|| {
        for processes in [nz!(1), nz!(4)] {
            let mut pool = Pool::builder().processes(processes).build().unwrap();
            pool.close();

            assert!(matches!(pool.apply(|x: u8| x, [1]), Err(Error::Closed)));
            assert!(matches!(pool.map(|x: u8| x, [1]), Err(Error::Closed)));
            assert!(matches!(
                pool.fold(|a: u8, b| a + b, [1], Some(0)),
                Err(Error::Closed)
            ));
            assert!(matches!(
                pool.mapreduce(|x: u8| x, |a, b| a + b, [1], Some(0)),
                Err(Error::Closed)
            ));

            // A second close is harmless.
            pool.close();
            assert!(pool.is_closed());
        }
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn closed_error_has_message() {
    with_watchdog(|| {
        let mut pool = Pool::builder().processes(nz!(2)).build().unwrap();
        pool.close();

        let error = pool.map(|x: u8| x, [1]).unwrap_err();

        assert_eq!(error.to_string(), "pool is closed");
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn pool_configured_to_close_after_workflow() {
    with_watchdog(|| {
        let mut pool = Pool::builder()
            .processes(nz!(2))
            .close_after_workflow(true)
            .build()
            .unwrap();

        assert_eq!(
            pool.mapreduce(|x: u32| x, |a, b| a + b, 0..10, None).unwrap(),
            45
        );
        assert!(pool.is_closed());

        assert!(matches!(
            pool.mapreduce(|x: u32| x, |a, b| a + b, 0..10, None),
            Err(Error::Closed)
        ));
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn call_configured_to_close_after_workflow() {
    with_watchdog(|| {
        let mut pool = Pool::builder().processes(nz!(2)).build().unwrap();

        pool.mapreduce_with(
            &Workflow::new().close(false),
            |x: u32| x,
            |a, b| a + b,
            0..10,
            None,
        )
        .unwrap();
        assert!(!pool.is_closed());

        pool.mapreduce_with(
            &Workflow::new().close(true),
            |x: u32| x,
            |a, b| a + b,
            0..10,
            None,
        )
        .unwrap();
        assert!(pool.is_closed());

        assert!(matches!(
            pool.mapreduce(|x: u32| x, |a, b| a + b, 0..10, None),
            Err(Error::Closed)
        ));
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn terminate_closes_pool() {
    with_watchdog(|| {
        let mut pool = Pool::new().unwrap();

        pool.mapreduce(|x: u32| x, |a, b| a + b, 0..10, None).unwrap();
        pool.terminate();

        assert!(pool.is_closed());
        assert!(matches!(pool.map(|x: u8| x, [1]), Err(Error::Closed)));
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn fault_leaves_pool_usable() {
    with_watchdog(|| {
        for processes in [nz!(1), nz!(3)] {
            let mut pool = Pool::builder().processes(processes).build().unwrap();

            let error = pool
                .map(
                    |x: u32| {
                        assert!(x != 5, "five is broken");
                        x
                    },
                    0..10,
                )
                .unwrap_err();

            match error {
                Error::WorkerFault {
                    cause,
                    live_workers,
                    workers,
                    ..
                } => {
                    assert_eq!(
                        cause,
                        FaultCause::Panicked {
                            message: "five is broken".to_string()
                        }
                    );
                    assert_eq!(live_workers, workers.get());
                }
                other => panic!("unexpected error: {other}"),
            }

            assert!(!pool.is_closed());
            assert_eq!(
                pool.map(|x: u32| x + 1, 0..3).unwrap(),
                vec![1, 2, 3]
            );
        }
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn scope_closes_pool_after_error() {
    with_watchdog(|| {
        let result = Pool::builder()
            .processes(nz!(2))
            .scope(|pool| pool.mapreduce(|x: u32| x, |a, b| a + b, Vec::new(), None))
            .unwrap();

        assert!(matches!(result, Err(Error::EmptyReduction)));
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn many_pools_open_and_close() {
    with_watchdog(|| {
        for _ in 0..20 {
            let mut pool = Pool::builder().processes(nz!(3)).build().unwrap();
            assert_eq!(pool.size(), nz!(3));
            assert_eq!(pool.map(|x: u8| x, [1, 2, 3]).unwrap(), vec![1, 2, 3]);
        }
    });
}
