use std::mem;
use std::num::NonZero;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use many_cpus::{Processor, ProcessorId, ProcessorSetBuilder};
use tracing::{debug, trace, warn};

use crate::executor::{Executor, Job, JobOutcome, run_caught};
use crate::{Error, FaultCause, Result};

type Task = Box<dyn FnOnce() + Send>;

/// Executes jobs on a fixed set of worker threads created up front.
///
/// Each worker thread is pinned to its own processor if the process has at least as many
/// processors available as there are workers. Otherwise the operating system decides where the
/// workers run.
///
/// All workers take jobs from one shared queue, so a worker that finishes early picks up the next
/// queued job. Every job reports its outcome through its own channel, which lets the executor
/// return outcomes in submission order no matter which worker finished first.
///
/// # Lifecycle
///
/// Dropping the executor waits for all queued jobs to finish and joins the worker threads.
///
/// The workers own the only receivers of the job queue. If every worker thread is lost, the queue
/// disconnects and any job still queued or submitted later is reported as a lost worker instead
/// of waiting forever.
#[derive(Debug)]
pub(crate) struct ParallelExecutor {
    // `None` once the executor has been shut down.
    command_tx: Option<Sender<Task>>,

    join_handles: Vec<JoinHandle<()>>,
    worker_count: NonZero<usize>,
}

impl ParallelExecutor {
    /// Spawns `worker_count` worker threads.
    ///
    /// If any thread fails to spawn, the threads spawned so far are shut down and an
    /// [`Error::Initialization`] is returned.
    pub(crate) fn new(worker_count: NonZero<usize>) -> Result<Self> {
        let (command_tx, command_rx) = channel::unbounded::<Task>();

        let processor_ids = ProcessorSetBuilder::new()
            .take(worker_count)
            .map(|processors| {
                processors
                    .processors()
                    .iter()
                    .map(Processor::id)
                    .collect::<Vec<_>>()
            });

        let mut join_handles = Vec::with_capacity(worker_count.get());

        for worker_index in 0..worker_count.get() {
            let processor_id = processor_ids
                .as_ref()
                .and_then(|ids| ids.get(worker_index).copied());

            let spawned = thread::Builder::new()
                .name(format!("mapfold-worker-{worker_index}"))
                .spawn({
                    let command_rx = command_rx.clone();

                    move || {
                        if let Some(processor_id) = processor_id {
                            pin_current_thread(processor_id);
                        }

                        debug!(worker_index, ?processor_id, "worker thread started");
                        worker_entrypoint(&command_rx);
                        debug!(worker_index, "worker thread exiting");
                    }
                });

            match spawned {
                Ok(handle) => join_handles.push(handle),
                Err(error) => {
                    // Disconnecting the queue makes the workers spawned so far exit.
                    drop(command_tx);

                    for handle in join_handles {
                        drop(handle.join());
                    }

                    return Err(Error::Initialization {
                        reason: format!("cannot spawn worker thread {worker_index}: {error}"),
                    });
                }
            }
        }

        // Only the workers keep receivers, so the queue disconnects if all of them are lost.
        drop(command_rx);

        debug!(
            worker_count = worker_count.get(),
            pinned = processor_ids.is_some(),
            "parallel executor started"
        );

        Ok(Self {
            command_tx: Some(command_tx),
            join_handles,
            worker_count,
        })
    }
}

impl Executor for ParallelExecutor {
    fn worker_count(&self) -> NonZero<usize> {
        self.worker_count
    }

    fn live_workers(&self) -> usize {
        self.join_handles
            .iter()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    #[cfg_attr(test, mutants::skip)] // If work does not get enqueued, deadlocks are very easy.
    fn execute<'a, R>(&mut self, jobs: Vec<Job<'a, R>>) -> Vec<JobOutcome<R>>
    where
        R: Send + 'a,
    {
        let Some(command_tx) = self.command_tx.as_ref() else {
            return jobs.iter().map(|_| Err(FaultCause::WorkerLost)).collect();
        };

        trace!(jobs = jobs.len(), "enqueueing jobs");

        let mut result_rxs = Vec::with_capacity(jobs.len());

        for job in jobs {
            let (result_tx, result_rx) = oneshot::channel::<JobOutcome<R>>();

            let task: Box<dyn FnOnce() + Send + 'a> = Box::new(move || {
                result_tx.send(run_caught(job)).expect(
                    "receiver must still exist - every result is received before execute() returns",
                );
            });

            // SAFETY: The task may borrow data that lives for 'a, which is shorter than the
            // 'static the queue demands. We wait below for every result channel to either deliver
            // a result or disconnect. A channel disconnects only when its task has been dropped,
            // so once the loop below completes no task can still be running or queued, and no
            // borrow outlives 'a.
            let task = unsafe {
                mem::transmute::<Box<dyn FnOnce() + Send + 'a>, Box<dyn FnOnce() + Send + 'static>>(
                    task,
                )
            };

            // A task that cannot be enqueued is dropped together with its result sender, which
            // shows up below as a lost worker.
            if command_tx.send(task).is_err() {
                debug!("job queue disconnected while enqueueing");
            }

            result_rxs.push(result_rx);
        }

        result_rxs
            .into_iter()
            .map(|rx| rx.recv().unwrap_or(Err(FaultCause::WorkerLost)))
            .collect()
    }

    #[cfg_attr(test, mutants::skip)] // Impractical to test that stuff stops happening.
    fn shutdown(&mut self) {
        let Some(command_tx) = self.command_tx.take() else {
            return;
        };

        // Workers drain whatever is still queued and exit once the queue is disconnected.
        drop(command_tx);

        for (worker_index, handle) in self.join_handles.drain(..).enumerate() {
            // A lost worker has already been reported as a fault by the operation it broke.
            if handle.join().is_err() {
                warn!(worker_index, "worker thread had terminated abnormally");
            }
        }

        debug!(worker_count = self.worker_count.get(), "parallel executor stopped");
    }
}

impl Drop for ParallelExecutor {
    #[cfg_attr(test, mutants::skip)] // Impractical to test that stuff stops happening.
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
impl ParallelExecutor {
    /// Makes one worker thread terminate abnormally, bypassing the panic trap that protects jobs,
    /// and waits until the thread is gone.
    pub(crate) fn lose_worker(&self) {
        use std::panic;
        use std::time::Duration;

        fn terminate_worker() {
            panic::resume_unwind(Box::new("worker lost on purpose"));
        }

        let before = self.live_workers();

        let task: Task = Box::new(terminate_worker);

        self.command_tx
            .as_ref()
            .expect("executor must not be shut down")
            .send(task)
            .expect("at least one worker must be alive");

        while self.live_workers() >= before {
            thread::sleep(Duration::from_millis(1));
        }
    }
}

fn pin_current_thread(processor_id: ProcessorId) {
    if let Some(processors) = ProcessorSetBuilder::new()
        .filter(|processor| processor.id() == processor_id)
        .take_all()
    {
        processors.pin_current_thread_to();
    }
}

#[cfg_attr(test, mutants::skip)] // Impractical to test that things do not happen when worker function is missing.
fn worker_entrypoint(command_rx: &Receiver<Task>) {
    while let Ok(task) = command_rx.recv() {
        task();
    }
}
