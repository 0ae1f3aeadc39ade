//! Fixed-size batch extraction from a lazy sequence.
//!
//! Feeds the training path, which consumes batches until the source reports
//! exhaustion.

/// Pulls fixed-size batches from an underlying iterator.
#[derive(Debug)]
pub struct BatchSource<I: Iterator> {
    inner: I,
}

impl<I: Iterator> BatchSource<I> {
    /// Wrap a lazy, possibly finite sequence.
    pub fn new<T>(source: T) -> Self
    where
        T: IntoIterator<IntoIter = I>,
    {
        Self {
            inner: source.into_iter(),
        }
    }

    /// Pull up to `batch_size` elements.
    ///
    /// Returns `(batch, true)` when exactly `batch_size` elements were
    /// collected, and `(partial, false)` when the source ran out first. A
    /// `false` flag means the source is exhausted and further batches must
    /// not be requested; it is not a retry signal.
    pub fn next_batch(&mut self, batch_size: usize) -> (Vec<I::Item>, bool) {
        let mut batch = Vec::with_capacity(batch_size);
        for _ in 0..batch_size {
            match self.inner.next() {
                Some(element) => batch.push(element),
                None => return (batch, false),
            }
        }
        (batch, true)
    }
}
