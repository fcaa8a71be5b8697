use std::num::NonZero;
use std::sync::Arc;

/// Callback that receives a [`StageProgress`] report after each completed stage.
pub type ProgressFn = Arc<dyn Fn(StageProgress) + Send + Sync>;

/// Per-call settings of a staged map/reduce workflow.
///
/// Every setting left unset falls back to the value configured on the pool via
/// [`PoolBuilder`][crate::PoolBuilder]. Setting a value here affects only the call it is passed
/// to; the pool's own configuration never changes.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// use mapfold::{Pool, Workflow};
/// use new_zealand::nz;
///
/// let mut pool = Pool::builder().processes(nz!(2)).build().unwrap();
/// let reports = Arc::new(AtomicUsize::new(0));
///
/// let workflow = Workflow::new().stages(nz!(4)).progress({
///     let reports = Arc::clone(&reports);
///     move |_progress| {
///         reports.fetch_add(1, Ordering::Relaxed);
///     }
/// });
///
/// let sum = pool
///     .mapreduce_with(&workflow, |x: u64| x * 2, |a, b| a + b, 1..=100, None)
///     .unwrap();
///
/// assert_eq!(sum, 10_100);
/// assert_eq!(reports.load(Ordering::Relaxed), 4);
/// ```
#[derive(Clone, Default, derive_more::Debug)]
pub struct Workflow {
    pub(crate) stages: Option<NonZero<usize>>,

    #[debug(ignore)]
    pub(crate) progress: Option<ProgressFn>,

    pub(crate) close: Option<bool>,
}

impl Workflow {
    /// Creates a workflow that uses the pool's configuration for every setting.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Splits the input into this many consecutive stages.
    ///
    /// Each stage is mapped and reduced on its own and the stage results are combined in stage
    /// order. Stages exist to report progress; they do not change the result of an associative
    /// combining function. Stages that would receive no items are skipped.
    #[must_use]
    pub fn stages(mut self, stages: NonZero<usize>) -> Self {
        self.stages = Some(stages);
        self
    }

    /// Registers a callback that is invoked on the calling thread after each completed stage.
    ///
    /// The callback is only invoked when the workflow is split into stages.
    #[must_use]
    pub fn progress<P>(mut self, progress: P) -> Self
    where
        P: Fn(StageProgress) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(progress));
        self
    }

    /// Whether to close the pool once the workflow has finished, whether it succeeded or not.
    #[must_use]
    pub fn close(mut self, close: bool) -> Self {
        self.close = Some(close);
        self
    }

    /// Fills every unset setting from `defaults`.
    pub(crate) fn or(&self, defaults: &Self) -> Self {
        Self {
            stages: self.stages.or(defaults.stages),
            progress: self
                .progress
                .as_ref()
                .or(defaults.progress.as_ref())
                .map(Arc::clone),
            close: self.close.or(defaults.close),
        }
    }
}

/// Progress report delivered to a [`Workflow::progress`] callback after each completed stage.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StageProgress {
    pub(crate) completed_stages: usize,
    pub(crate) total_stages: usize,
    pub(crate) items_processed: usize,
    pub(crate) total_items: usize,
}

impl StageProgress {
    /// Number of stages completed so far, including the one just finished.
    #[must_use]
    pub fn completed_stages(&self) -> usize {
        self.completed_stages
    }

    /// Number of non-empty stages in the workflow.
    #[must_use]
    pub fn total_stages(&self) -> usize {
        self.total_stages
    }

    /// Number of input items covered by the completed stages.
    #[must_use]
    pub fn items_processed(&self) -> usize {
        self.items_processed
    }

    /// Number of input items in the whole workflow.
    #[must_use]
    pub fn total_items(&self) -> usize {
        self.total_items
    }
}
