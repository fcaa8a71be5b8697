//! Partitioning of input sequences into chunks (one dispatched job each) and stages.

use std::num::NonZero;

use new_zealand::nz;
use num_integer::Integer;

/// Determines how many items go into one dispatched job.
///
/// An explicitly configured chunk length always wins. Otherwise the items are spread evenly over
/// the workers, rounding up so that no job is left without an item.
pub(crate) fn chunk_len(
    item_count: usize,
    workers: NonZero<usize>,
    configured: Option<NonZero<usize>>,
) -> NonZero<usize> {
    configured.unwrap_or_else(|| {
        NonZero::new(item_count.div_ceil(workers.get())).unwrap_or(nz!(1))
    })
}

/// Splits `items` into consecutive chunks of `chunk_len` items. The last chunk may be shorter.
///
/// No chunk is ever empty and concatenating the chunks yields the original sequence.
pub(crate) fn split_into_chunks<T>(items: Vec<T>, chunk_len: NonZero<usize>) -> Vec<Vec<T>> {
    let mut chunks = Vec::with_capacity(items.len().div_ceil(chunk_len.get()));
    let mut remaining = items.into_iter();

    loop {
        let chunk = remaining
            .by_ref()
            .take(chunk_len.get())
            .collect::<Vec<_>>();

        if chunk.is_empty() {
            return chunks;
        }

        chunks.push(chunk);
    }
}

/// Splits `items` into `parts` consecutive parts whose lengths differ by at most one, with the
/// longer parts first.
///
/// If there are fewer items than parts, the trailing parts are empty.
pub(crate) fn split_into_parts<T>(items: Vec<T>, parts: NonZero<usize>) -> Vec<Vec<T>> {
    let (base_len, longer_parts) = items.len().div_rem(&parts.get());
    let mut remaining = items.into_iter();

    (0..parts.get())
        .map(|index| {
            let len = if index < longer_parts {
                base_len.saturating_add(1)
            } else {
                base_len
            };

            remaining.by_ref().take(len).collect()
        })
        .collect()
}
