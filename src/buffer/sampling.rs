//! Fixed-order minibatch generation
//!
//! Training passes over a buffer in insertion order, one contiguous slice at
//! a time. Keeping the order fixed makes two passes over the same buffer
//! bit-for-bit reproducible.

use std::ops::Range;

/// Splits `0..len` into consecutive ranges of at most `batch_size` items
///
/// The sampler is `Copy`; each call to [`SequentialSampler::iter`] (or each
/// `into_iter`) starts a fresh pass, so one sampler serves every epoch.
///
/// ```rust
/// use phasic_rl::buffer::SequentialSampler;
///
/// let ranges: Vec<_> = SequentialSampler::new(10, 4).iter().collect();
/// assert_eq!(ranges, vec![0..4, 4..8, 8..10]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequentialSampler {
    len: usize,
    batch_size: usize,
}

impl SequentialSampler {
    /// Create a sampler over `len` items
    ///
    /// # Panics
    ///
    /// Panics if `batch_size` is zero.
    pub fn new(len: usize, batch_size: usize) -> Self {
        assert!(batch_size > 0, "batch_size must be positive");
        Self { len, batch_size }
    }

    /// Number of minibatches in one pass
    pub fn num_batches(&self) -> usize {
        self.len.div_ceil(self.batch_size)
    }

    /// Start a new pass over the buffer
    pub fn iter(&self) -> SequentialBatches {
        SequentialBatches { next: 0, len: self.len, batch_size: self.batch_size }
    }
}

impl IntoIterator for SequentialSampler {
    type Item = Range<usize>;
    type IntoIter = SequentialBatches;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// One pass of [`SequentialSampler`]
#[derive(Debug, Clone)]
pub struct SequentialBatches {
    next: usize,
    len: usize,
    batch_size: usize,
}

impl Iterator for SequentialBatches {
    type Item = Range<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.len {
            return None;
        }
        let start = self.next;
        let end = (start + self.batch_size).min(self.len);
        self.next = end;
        Some(start..end)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.len - self.next.min(self.len)).div_ceil(self.batch_size);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SequentialBatches {}
