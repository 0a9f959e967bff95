use std::ops::Range;

use rayon::prelude::*;

/// Wrapper around either a serial or parallel iterator, returned by
/// [`MaybeParIter::maybe_par_iter`].
pub enum MaybeParallel<PI: ParallelIterator, SI: Iterator<Item = PI::Item>> {
    Serial(SI),
    Parallel(PI),
}

impl<PI: ParallelIterator, SI: Iterator<Item = PI::Item>> MaybeParallel<PI, SI> {
    pub fn for_each<F: Fn(PI::Item) + Send + Sync>(self, f: F) {
        match self {
            MaybeParallel::Serial(iter) => iter.for_each(f),
            MaybeParallel::Parallel(iter) => iter.for_each(f),
        }
    }
}

/// Trait which allows use of Rayon parallelism to be conditionally enabled.
pub trait MaybeParIter {
    type Item;
    type ParIter: ParallelIterator<Item = Self::Item>;
    type Iter: Iterator<Item = Self::Item>;

    /// Return an iterator which executes either in serial on the current
    /// thread, or in parallel in a Rayon thread pool if `parallel` is true.
    fn maybe_par_iter(self, parallel: bool) -> MaybeParallel<Self::ParIter, Self::Iter>;
}

impl<Item, I: rayon::iter::IntoParallelIterator<Item = Item> + IntoIterator<Item = Item>>
    MaybeParIter for I
{
    type Item = Item;
    type ParIter = I::Iter;
    type Iter = I::IntoIter;

    fn maybe_par_iter(self, parallel: bool) -> MaybeParallel<Self::ParIter, Self::Iter> {
        if parallel {
            MaybeParallel::Parallel(self.into_par_iter())
        } else {
            MaybeParallel::Serial(self.into_iter())
        }
    }
}

/// Round `x` down to a multiple of `align`.
#[inline]
pub fn align_lo(x: usize, align: usize) -> usize {
    x / align * align
}

/// Round `x` up to a multiple of `align`.
#[inline]
pub fn align_hi(x: usize, align: usize) -> usize {
    x.div_ceil(align) * align
}

/// Return an iterator over sub-ranges of `range`. If `range.len()` is not a
/// multiple of `chunk_size` then the final chunk will be shorter.
#[inline]
pub fn range_chunks(range: Range<usize>, chunk_size: usize) -> impl Iterator<Item = Range<usize>> {
    let end = range.end;
    range
        .step_by(chunk_size.max(1))
        .map(move |start| start..(start + chunk_size).min(end))
}

/// Split `0..len` into at most `parts` contiguous ranges whose boundaries are
/// multiples of `align`.
///
/// Every range except the last has the same length. Fewer than `parts` ranges
/// are returned if `len` is too small to give each part at least `align`
/// elements.
pub fn split_range(len: usize, parts: usize, align: usize) -> Vec<Range<usize>> {
    if len == 0 {
        return Vec::new();
    }
    let chunk = align_hi(len.div_ceil(parts.max(1)), align);
    range_chunks(0..len, chunk).collect()
}
