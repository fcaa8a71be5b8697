//! Map, fold and the combined map/reduce workflows built on top of [`Pool::apply()`].

use std::num::NonZero;

use new_zealand::nz;
use tracing::trace;

use crate::chunking::{split_into_chunks, split_into_parts};
use crate::{Error, Pool, Result, StageProgress, Workflow};

impl Pool {
    /// Applies `f` to every item and returns the results in the order of the items.
    ///
    /// This is the map phase on its own, useful when intermediate results need to be inspected
    /// before folding them. See [`apply()`][Self::apply] for details.
    ///
    /// # Errors
    ///
    /// Same as [`apply()`][Self::apply].
    pub fn map<T, U, F>(&mut self, f: F, items: impl IntoIterator<Item = T>) -> Result<Vec<U>>
    where
        T: Send,
        U: Send,
        F: Fn(T) -> U + Sync,
    {
        self.apply(f, items)
    }

    /// Reduces `values` to a single value with the associative function `combine`.
    ///
    /// With a seed, the result is the seed combined with all the values, or the seed itself if
    /// there are no values. Without a seed, the first value takes its place.
    ///
    /// The reduction is a balanced tree: every worker reduces its own chunk from left to right,
    /// after which neighboring partial results are combined pairwise in parallel until one value
    /// remains. This means `combine` also receives intermediate results as arguments, not only the
    /// original values. Only neighbors are ever combined and the left operand always comes first
    /// in the input, so the result equals a left-to-right reduction for any associative `combine`,
    /// commutative or not. A non-associative `combine` may give different results for different
    /// pool sizes and chunk sizes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyReduction`] if there are no values and no seed, [`Error::Closed`] if
    /// the pool has been closed and [`Error::WorkerFault`] if `combine` panics.
    pub fn fold<U, C>(
        &mut self,
        combine: C,
        values: impl IntoIterator<Item = U>,
        seed: Option<U>,
    ) -> Result<U>
    where
        U: Send,
        C: Fn(U, U) -> U + Sync,
    {
        self.ensure_open()?;

        let values = seed.into_iter().chain(values).collect::<Vec<_>>();

        if values.is_empty() {
            return Err(Error::EmptyReduction);
        }

        let chunks = self.split(values);

        let partials = self.run_chunks(chunks, &|chunk: Vec<U>| {
            chunk.into_iter().reduce(&combine)
        })?;

        self.combine_partials(&combine, partials.into_iter().flatten().collect())
    }

    /// Maps every item with `f` and reduces the results with the associative function `combine`.
    ///
    /// The result is the same as `fold(combine, map(f, items), seed)` but each worker reduces
    /// its own mapped chunk right away, so the intermediate results are never collected in one
    /// place. The staging, progress and closing settings configured on the pool apply; use
    /// [`mapreduce_with()`][Self::mapreduce_with] to override them for one call.
    ///
    /// See [`fold()`][Self::fold] for the order in which `combine` is applied.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyReduction`] if there are no items and no seed, [`Error::Closed`] if
    /// the pool has been closed and [`Error::WorkerFault`] if `f` or `combine` panics.
    ///
    /// # Example
    ///
    /// ```
    /// use mapfold::Pool;
    /// use new_zealand::nz;
    ///
    /// let mut pool = Pool::builder().processes(nz!(2)).build().unwrap();
    ///
    /// let longest = pool
    ///     .mapreduce(str::len, usize::max, ["map", "fold", "reduce"], None)
    ///     .unwrap();
    ///
    /// assert_eq!(longest, 6);
    /// ```
    pub fn mapreduce<T, U, F, C>(
        &mut self,
        f: F,
        combine: C,
        items: impl IntoIterator<Item = T>,
        seed: Option<U>,
    ) -> Result<U>
    where
        T: Send,
        U: Send,
        F: Fn(T) -> U + Sync,
        C: Fn(U, U) -> U + Sync,
    {
        self.mapreduce_with(&Workflow::new(), f, combine, items, seed)
    }

    /// Same as [`mapreduce()`][Self::mapreduce] with per-call workflow settings.
    ///
    /// Settings left unset in `workflow` fall back to the pool's configuration. If the workflow
    /// is to close the pool, the pool is closed before this returns, even if the workflow failed.
    ///
    /// # Errors
    ///
    /// Same as [`mapreduce()`][Self::mapreduce].
    pub fn mapreduce_with<T, U, F, C>(
        &mut self,
        workflow: &Workflow,
        f: F,
        combine: C,
        items: impl IntoIterator<Item = T>,
        seed: Option<U>,
    ) -> Result<U>
    where
        T: Send,
        U: Send,
        F: Fn(T) -> U + Sync,
        C: Fn(U, U) -> U + Sync,
    {
        self.ensure_open()?;

        let workflow = workflow.or(&self.defaults);
        let items = items.into_iter().collect::<Vec<_>>();

        let result = match workflow.stages {
            None => self.mapreduce_chunks(&f, &combine, items, seed),
            Some(stages) => self.mapreduce_staged(
                &f,
                &combine,
                items,
                seed,
                stages,
                workflow.progress.as_deref(),
            ),
        };

        if workflow.close.unwrap_or(false) {
            self.close();
        }

        result
    }

    /// Maps every item to a vector with `f` and concatenates the vectors in the order of the
    /// items.
    ///
    /// The staging, progress and closing settings configured on the pool apply.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the pool has been closed and [`Error::WorkerFault`] if `f`
    /// panics. An empty input is not an error and produces an empty vector.
    ///
    /// # Example
    ///
    /// ```
    /// use mapfold::Pool;
    ///
    /// let mut pool = Pool::new().unwrap();
    ///
    /// let flattened = pool.mapconcat(|x: u8| vec![x; usize::from(x)], [1, 2, 3]).unwrap();
    ///
    /// assert_eq!(flattened, vec![1, 2, 2, 3, 3, 3]);
    /// ```
    pub fn mapconcat<T, U, F>(&mut self, f: F, items: impl IntoIterator<Item = T>) -> Result<Vec<U>>
    where
        T: Send,
        U: Send,
        F: Fn(T) -> Vec<U> + Sync,
    {
        self.mapconcat_with(&Workflow::new(), f, items)
    }

    /// Same as [`mapconcat()`][Self::mapconcat] with per-call workflow settings.
    ///
    /// # Errors
    ///
    /// Same as [`mapconcat()`][Self::mapconcat].
    pub fn mapconcat_with<T, U, F>(
        &mut self,
        workflow: &Workflow,
        f: F,
        items: impl IntoIterator<Item = T>,
    ) -> Result<Vec<U>>
    where
        T: Send,
        U: Send,
        F: Fn(T) -> Vec<U> + Sync,
    {
        self.mapreduce_with(workflow, f, concat::<U>, items, Some(Vec::new()))
    }

    /// Runs one map/reduce pass per non-empty stage, feeding each stage result into the next
    /// stage as its seed.
    fn mapreduce_staged<T, U, F, C>(
        &mut self,
        f: &F,
        combine: &C,
        items: Vec<T>,
        seed: Option<U>,
        stages: NonZero<usize>,
        progress: Option<&(dyn Fn(StageProgress) + Send + Sync)>,
    ) -> Result<U>
    where
        T: Send,
        U: Send,
        F: Fn(T) -> U + Sync,
        C: Fn(U, U) -> U + Sync,
    {
        let total_items = items.len();

        let parts = split_into_parts(items, stages)
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>();

        let total_stages = parts.len();
        let mut accumulator = seed;
        let mut items_processed = 0_usize;

        for (index, part) in parts.into_iter().enumerate() {
            items_processed = items_processed.saturating_add(part.len());
            accumulator = Some(self.mapreduce_chunks(f, combine, part, accumulator.take())?);

            let completed_stages = index.saturating_add(1);
            trace!(completed_stages, total_stages, "stage completed");

            if let Some(progress) = progress {
                progress(StageProgress {
                    completed_stages,
                    total_stages,
                    items_processed,
                    total_items,
                });
            }
        }

        accumulator.ok_or(Error::EmptyReduction)
    }

    /// One map/reduce pass over `items` with the seed (if any) placed before the first item.
    fn mapreduce_chunks<T, U, F, C>(
        &mut self,
        f: &F,
        combine: &C,
        items: Vec<T>,
        seed: Option<U>,
    ) -> Result<U>
    where
        T: Send,
        U: Send,
        F: Fn(T) -> U + Sync,
        C: Fn(U, U) -> U + Sync,
    {
        let partials = if items.is_empty() {
            Vec::new()
        } else {
            let chunks = self.split(items);

            self.run_chunks(chunks, &|chunk: Vec<T>| {
                chunk.into_iter().map(f).reduce(combine)
            })?
        };

        let partials = seed
            .into_iter()
            .chain(partials.into_iter().flatten())
            .collect::<Vec<_>>();

        if partials.is_empty() {
            return Err(Error::EmptyReduction);
        }

        self.combine_partials(combine, partials)
    }

    /// Combines neighboring values pairwise in parallel rounds until a single value remains.
    fn combine_partials<U, C>(&mut self, combine: &C, partials: Vec<U>) -> Result<U>
    where
        U: Send,
        C: Fn(U, U) -> U + Sync,
    {
        let mut level = partials;

        while level.len() > 1 {
            trace!(values = level.len(), "combining neighbors");

            let pairs = split_into_chunks(level, nz!(2));

            level = self
                .run_chunks(pairs, &|pair: Vec<U>| pair.into_iter().reduce(combine))?
                .into_iter()
                .flatten()
                .collect();
        }

        level.pop().ok_or(Error::EmptyReduction)
    }
}

fn concat<U>(mut left: Vec<U>, right: Vec<U>) -> Vec<U> {
    left.extend(right);
    left
}
