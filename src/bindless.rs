//! Bindless index allocation.
//!
//! Shaders address textures and storage resources through fixed-size
//! descriptor tables; every resource that participates gets a slot index at
//! creation and returns it at destruction. [`IndexAllocator`] manages one such
//! table: a fixed range of indices with ordered, disjoint free intervals kept
//! in a `BTreeMap`, so allocation and coalescing free both run in
//! logarithmic time regardless of fragmentation.
//!
//! The table never grows. When the range is exhausted the allocator reports
//! [`GraphicsError::IndexSpaceExhausted`] and the caller decides what to do.

use std::collections::BTreeMap;

use crate::error::GraphicsError;

/// Allocator for a fixed range of bindless slot indices.
#[derive(Debug)]
pub struct IndexAllocator {
    /// Table name used in exhaustion errors and logs.
    category: &'static str,
    min_id: u32,
    max_id: u32,
    /// Free intervals as `left -> right` (right exclusive). Intervals are
    /// disjoint and never adjacent; `free` coalesces on insert.
    free: BTreeMap<u32, u32>,
}

impl IndexAllocator {
    /// Create an allocator over `[min_id, max_id)`.
    pub fn new(category: &'static str, min_id: u32, max_id: u32) -> Self {
        assert!(min_id < max_id, "empty bindless index range");
        let mut free = BTreeMap::new();
        free.insert(min_id, max_id);
        Self {
            category,
            min_id,
            max_id,
            free,
        }
    }

    /// Total number of indices the allocator manages.
    pub fn capacity(&self) -> u32 {
        self.max_id - self.min_id
    }

    /// Number of currently free indices.
    pub fn available(&self) -> u32 {
        self.free.iter().map(|(left, right)| right - left).sum()
    }

    /// Allocate a single index.
    pub fn alloc(&mut self) -> Result<u32, GraphicsError> {
        self.alloc_sequential(1)
    }

    /// Allocate `count` consecutive indices, returning the first.
    pub fn alloc_sequential(&mut self, count: u32) -> Result<u32, GraphicsError> {
        if count == 0 {
            return Err(GraphicsError::InvalidParameter(
                "cannot allocate zero bindless indices".into(),
            ));
        }
        let found = self
            .free
            .iter()
            .find(|(left, right)| *right - *left >= count)
            .map(|(left, right)| (*left, *right));
        match found {
            Some((left, right)) => {
                self.free.remove(&left);
                if left + count < right {
                    self.free.insert(left + count, right);
                }
                Ok(left)
            }
            None => Err(GraphicsError::IndexSpaceExhausted {
                category: self.category,
                capacity: self.capacity(),
            }),
        }
    }

    /// Return a single index to the allocator.
    pub fn free(&mut self, id: u32) {
        self.free_sequential(id, 1);
    }

    /// Return `count` consecutive indices starting at `first`.
    ///
    /// Coalesces with adjacent free intervals so the free map stays compact.
    /// Freeing indices outside the range or already free is a caller bug.
    pub fn free_sequential(&mut self, first: u32, count: u32) {
        assert!(count > 0);
        assert!(
            first >= self.min_id && first + count <= self.max_id,
            "bindless index {} out of range for {} table",
            first,
            self.category
        );
        let mut left = first;
        let mut right = first + count;

        if let Some((&prev_left, &prev_right)) = self.free.range(..=first).next_back() {
            assert!(prev_right <= first, "double free of bindless index");
            if prev_right == first {
                left = prev_left;
                self.free.remove(&prev_left);
            }
        }
        if let Some((&next_left, &next_right)) = self.free.range(first..).next() {
            assert!(next_left >= right, "double free of bindless index");
            if next_left == right {
                right = next_right;
                self.free.remove(&next_left);
            }
        }
        self.free.insert(left, right);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_alloc_free_roundtrip() {
        let mut alloc = IndexAllocator::new("sampled", 0, 8);
        let a = alloc.alloc().unwrap();
        let b = alloc.alloc().unwrap();
        assert_ne!(a, b);
        assert_eq!(alloc.available(), 6);
        alloc.free(a);
        alloc.free(b);
        assert_eq!(alloc.available(), 8);
        assert_eq!(alloc.free.len(), 1);
    }

    #[test]
    fn test_exhaustion_is_an_error() {
        let mut alloc = IndexAllocator::new("sampled", 0, 2);
        alloc.alloc().unwrap();
        alloc.alloc().unwrap();
        match alloc.alloc() {
            Err(GraphicsError::IndexSpaceExhausted { category, capacity }) => {
                assert_eq!(category, "sampled");
                assert_eq!(capacity, 2);
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
    }

    #[test]
    fn test_sequential_needs_contiguous_room() {
        let mut alloc = IndexAllocator::new("storage", 0, 8);
        let first = alloc.alloc_sequential(4).unwrap();
        assert_eq!(first, 0);
        // Punch a hole: 4..8 free, then free 1..3 leaving two fragments.
        alloc.free_sequential(1, 2);
        assert_eq!(alloc.available(), 6);
        assert!(alloc.alloc_sequential(5).is_err());
        assert_eq!(alloc.alloc_sequential(4).unwrap(), 4);
    }

    #[rstest]
    #[case::free_then_merge_left(&[0, 1, 2], &[0, 1, 2])]
    #[case::merge_right(&[0, 1, 2], &[2, 1, 0])]
    #[case::merge_both_sides(&[0, 1, 2], &[0, 2, 1])]
    fn test_free_coalesces(#[case] alloc_order: &[u32], #[case] free_order: &[u32]) {
        let mut alloc = IndexAllocator::new("sampled", 0, 4);
        for &expected in alloc_order {
            assert_eq!(alloc.alloc().unwrap(), expected);
        }
        for &id in free_order {
            alloc.free(id);
        }
        assert_eq!(alloc.free.len(), 1);
        assert_eq!(alloc.available(), 4);
    }

    #[test]
    #[should_panic]
    fn test_double_free_panics() {
        let mut alloc = IndexAllocator::new("sampled", 0, 4);
        let id = alloc.alloc().unwrap();
        alloc.free(id);
        alloc.free(id);
    }

    #[test]
    fn test_nonzero_min_id() {
        let mut alloc = IndexAllocator::new("storage", 100, 104);
        assert_eq!(alloc.alloc().unwrap(), 100);
        assert_eq!(alloc.alloc_sequential(3).unwrap(), 101);
        assert!(alloc.alloc().is_err());
    }
}
