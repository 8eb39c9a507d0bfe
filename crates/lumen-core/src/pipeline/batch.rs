//! Lazy fixed-size batching that preserves input order.

use crate::error::PipelineError;

/// Iterator adapter yielding `Vec`s of at most `size` items.
///
/// Each batch is pulled from the underlying iterator only when requested, so
/// at most one batch is materialized at a time. The last batch may be short;
/// nothing is padded, reordered, or dropped.
#[derive(Debug)]
pub struct Batches<I> {
    inner: I,
    size: usize,
}

impl<I: Iterator> Iterator for Batches<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let batch: Vec<I::Item> = self.inner.by_ref().take(self.size).collect();
        if batch.is_empty() {
            None
        } else {
            Some(batch)
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (lo, hi) = self.inner.size_hint();
        (lo.div_ceil(self.size), hi.map(|h| h.div_ceil(self.size)))
    }
}

/// Partition `items` into batches of `size`.
///
/// Fails with `InvalidArgument` when `size` is zero.
pub fn batched<I>(items: I, size: usize) -> Result<Batches<I::IntoIter>, PipelineError>
where
    I: IntoIterator,
{
    if size == 0 {
        return Err(PipelineError::InvalidArgument(
            "batch size must be a positive integer".to_string(),
        ));
    }
    Ok(Batches {
        inner: items.into_iter(),
        size,
    })
}

/// Number of batches `len` items split into.
pub fn batch_count(len: usize, size: usize) -> usize {
    if size == 0 {
        0
    } else {
        len.div_ceil(size)
    }
}
