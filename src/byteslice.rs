//! Iterators over slices cut in chunks of irregular sizes.
use std::iter::FusedIterator;

/// Splits a slice in consecutive chunks of the given sizes.
///
/// A size larger than what remains gives the remainder,
/// iteration stops once the slice is exhausted.
pub(crate) struct ChunksIrregular<'a, I> {
    remainder: &'a [u8],
    sizes: I,
}

impl<'a, I: Iterator<Item = usize>> ChunksIrregular<'a, I> {
    pub(crate) fn new(slc: &'a [u8], sizes: I) -> Self {
        Self {
            remainder: slc,
            sizes,
        }
    }
}

impl<'a, I: Iterator<Item = usize>> Iterator for ChunksIrregular<'a, I> {
    type Item = &'a [u8];

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.remainder.is_empty() {
            return None;
        }
        let size = self.sizes.next()?.min(self.remainder.len());
        let (head, tail) = self.remainder.split_at(size);
        self.remainder = tail;
        Some(head)
    }
}

impl<'a, I: Iterator<Item = usize>> FusedIterator for ChunksIrregular<'a, I> {}

pub(crate) struct ChunksIrregularMut<'a, I> {
    remainder: &'a mut [u8],
    sizes: I,
}

impl<'a, I: Iterator<Item = usize>> ChunksIrregularMut<'a, I> {
    pub(crate) fn new(slc: &'a mut [u8], sizes: I) -> Self {
        Self {
            remainder: slc,
            sizes,
        }
    }
}

impl<'a, I: Iterator<Item = usize>> Iterator for ChunksIrregularMut<'a, I> {
    type Item = &'a mut [u8];

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.remainder.is_empty() {
            return None;
        }
        // Heavily inspired from the implementation of std::slice::ChunksMut
        let tmp = std::mem::take(&mut self.remainder);
        let size = self.sizes.next()?.min(tmp.len());
        let (head, tail) = tmp.split_at_mut(size);
        self.remainder = tail;
        Some(head)
    }
}

impl<'a, I: Iterator<Item = usize>> FusedIterator for ChunksIrregularMut<'a, I> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_chunk_is_truncated() {
        let data = [1u8, 2, 3, 4, 5, 6, 7];
        let chunks: Vec<&[u8]> = ChunksIrregular::new(&data, vec![2, 4, 4, 4].into_iter()).collect();
        assert_eq!(chunks, vec![&[1u8, 2][..], &[3, 4, 5, 6][..], &[7][..]]);
    }

    #[test]
    fn mutable_chunks() {
        let mut data = [0u8; 5];
        for (i, chunk) in ChunksIrregularMut::new(&mut data, vec![3, 3].into_iter()).enumerate() {
            chunk.iter_mut().for_each(|b| *b = i as u8 + 1);
        }
        assert_eq!(data, [1, 1, 1, 2, 2]);
    }
}
