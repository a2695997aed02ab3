//! Per-class counters for reporting.

use core::alloc::GlobalAlloc;
use core::fmt;
use core::sync::atomic::Ordering;

use typenum::IsLessOrEqual;
use typenum::PowerOfTwo;
use typenum::True;
use typenum::Unsigned;

use super::alloc::Segalloc;

/// A snapshot of the counters of a single size class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassStats {
    /// Index of the class.
    pub index: usize,
    /// Chunk size of the class in bytes.
    pub size: usize,
    /// Blocks obtained by seeding.
    pub preallocated: usize,
    /// Blocks obtained from the backing allocator because the list was empty.
    pub fallback: usize,
    /// Blocks currently on the free list.
    pub available: usize,
}

/// A snapshot of the counters of every size class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    /// One entry per size class, smallest first.
    pub classes: Vec<ClassStats>,
}

impl Stats {
    /// Bytes obtained by seeding, in class sizes.
    pub fn preallocated_bytes(&self) -> usize {
        self.classes.iter().map(|c| c.preallocated * c.size).sum()
    }

    /// Number of allocations that missed their free list.
    pub fn fallback_blocks(&self) -> usize {
        self.classes.iter().map(|c| c.fallback).sum()
    }

    /// Bytes currently sitting on free lists, in class sizes.
    pub fn available_bytes(&self) -> usize {
        self.classes.iter().map(|c| c.available * c.size).sum()
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "{:<10} {:<15} {:<15} {:<15}",
            "Chunk Size", "Preallocated", "Fallback", "Available"
        )?;
        for class in &self.classes {
            writeln!(
                f,
                "{:<10} {:<15} {:<15} {:<15}",
                class.size, class.preallocated, class.fallback, class.available
            )?;
        }
        Ok(())
    }
}

impl<A, MIN, MAX, BA> Segalloc<A, MIN, MAX, BA>
where
    A: GlobalAlloc,
    MIN: Unsigned + PowerOfTwo + IsLessOrEqual<MAX, Output = True>,
    MAX: Unsigned + PowerOfTwo,
    BA: Unsigned + PowerOfTwo,
{
    /// Number of blocks seeded for the class at `index`, or 0 for an
    /// out-of-range index.
    pub fn preallocated_count(&self, index: usize) -> usize {
        if index >= self.classes.len() {
            return 0;
        }
        self.preallocated[index].load(Ordering::Relaxed)
    }

    /// Number of fallback allocations made for the class at `index`, or 0 for
    /// an out-of-range index.
    pub fn fallback_count(&self, index: usize) -> usize {
        if index >= self.classes.len() {
            return 0;
        }
        self.fallback[index].load(Ordering::Relaxed)
    }

    /// Number of blocks on the free list of the class at `index`, or 0 for
    /// an out-of-range index.
    pub fn available_count(&self, index: usize) -> usize {
        if index >= self.classes.len() {
            return 0;
        }
        self.lists[index].lock().len()
    }

    /// Take a snapshot of the counters of every class.
    ///
    /// Classes are read one after the other, so the snapshot is not atomic
    /// with respect to concurrent allocations.
    pub fn stats(&self) -> Stats {
        let classes = self
            .classes
            .iter()
            .map(|class| ClassStats {
                index: class.index,
                size: class.size,
                preallocated: self.preallocated_count(class.index),
                fallback: self.fallback_count(class.index),
                available: self.available_count(class.index),
            })
            .collect();
        Stats { classes }
    }
}

#[cfg(test)]
mod tests {
    use std::alloc::System;

    use super::*;
    use crate::size_class::CHUNK_CLASSES;

    #[test]
    fn test_out_of_range_counts_are_zero() {
        let allocator: Segalloc<System> = Segalloc::new(System);
        allocator.seed(1 << 20).unwrap();
        assert_eq!(allocator.preallocated_count(CHUNK_CLASSES), 0);
        assert_eq!(allocator.fallback_count(100), 0);
        assert_eq!(allocator.available_count(usize::MAX), 0);
    }

    #[test]
    fn test_counters_track_operations() {
        let allocator: Segalloc<System> = Segalloc::new(System);
        allocator.seed(40).unwrap();
        assert_eq!(allocator.preallocated_count(0), 1);
        assert_eq!(allocator.available_count(0), 1);

        let a = allocator.allocate(4).unwrap();
        let b = allocator.allocate(3).unwrap();
        let c = allocator.allocate(2).unwrap();
        assert_eq!(allocator.available_count(0), 0);
        assert_eq!(allocator.fallback_count(0), 2);

        unsafe {
            allocator.release(a.as_ptr(), 4).unwrap();
            allocator.release(b.as_ptr(), 4).unwrap();
            allocator.release(c.as_ptr(), 4).unwrap();
        }
        // release never touches the seeding counter
        assert_eq!(allocator.preallocated_count(0), 1);
        assert_eq!(allocator.available_count(0), 3);
    }

    #[test]
    fn test_snapshot_totals() {
        let allocator: Segalloc<System> = Segalloc::new(System);
        allocator.seed(40).unwrap();
        let stats = allocator.stats();
        assert_eq!(stats.classes.len(), CHUNK_CLASSES);
        assert_eq!(stats.preallocated_bytes(), 60);
        assert_eq!(stats.available_bytes(), 60);
        assert_eq!(stats.fallback_blocks(), 0);

        let table = stats.to_string();
        assert!(table.starts_with("Chunk Size"));
        assert_eq!(table.lines().count(), CHUNK_CLASSES + 1);
    }
}
