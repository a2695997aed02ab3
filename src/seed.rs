//! Cyclic preallocation of free blocks.

use core::alloc::GlobalAlloc;
use core::sync::atomic::Ordering;

use tracing::debug;
use tracing::info;
use tracing::warn;
use typenum::IsLessOrEqual;
use typenum::PowerOfTwo;
use typenum::True;
use typenum::Unsigned;

use super::alloc::Segalloc;
use super::error::SeedError;
use super::size_class::SizeClass;
use super::size_class::SizeClassTable;
use super::size_class::MAX_CLASSES;

/// The sequence of classes seeded for a given byte limit.
///
/// Classes are visited round-robin, smallest first, one block per class per
/// round. The plan ends before the first block that would take the running
/// total past the limit, even if a smaller class would still fit.
#[derive(Debug, Clone)]
pub struct SeedPlan {
    classes: SizeClassTable,
    limit: usize,
    planned: usize,
    next: usize,
}

impl SeedPlan {
    /// Plan the seeding of at most `limit` bytes over `classes`.
    pub fn new(classes: SizeClassTable, limit: usize) -> Self {
        SeedPlan {
            classes,
            limit,
            planned: 0,
            next: 0,
        }
    }

    /// Total size of the classes yielded so far.
    pub fn planned_bytes(&self) -> usize {
        self.planned
    }
}

impl Iterator for SeedPlan {
    type Item = SizeClass;

    fn next(&mut self) -> Option<SizeClass> {
        let size = self.classes.class_size(self.next)?;
        let total = self.planned.checked_add(size)?;
        if total > self.limit {
            return None;
        }
        let class = SizeClass {
            index: self.next,
            size,
        };
        self.planned = total;
        self.next = (self.next + 1) % self.classes.len();
        Some(class)
    }
}

impl<A, MIN, MAX, BA> Segalloc<A, MIN, MAX, BA>
where
    A: GlobalAlloc,
    MIN: Unsigned + PowerOfTwo + IsLessOrEqual<MAX, Output = True>,
    MAX: Unsigned + PowerOfTwo,
    BA: Unsigned + PowerOfTwo,
{
    /// Preallocate free blocks for a workload of `total_budget` bytes.
    ///
    /// Blocks are obtained from the backing allocator following a
    /// [`SeedPlan`] whose limit is the budget scaled by the configured
    /// over-provisioning factor. Returns the number of bytes seeded, counted
    /// in class sizes.
    ///
    /// If the backing allocator fails, seeding stops there: the blocks
    /// already seeded stay on their free lists and the error reports how
    /// many bytes they account for.
    pub fn seed(&self, total_budget: usize) -> Result<usize, SeedError> {
        let limit = total_budget.saturating_mul(self.config.over_provision);
        let mut seeded = 0;
        let mut counts = [0usize; MAX_CLASSES];

        for class in SeedPlan::new(self.classes, limit) {
            let block = match self.obtain(class.index) {
                Some(block) => block,
                None => {
                    warn!(
                        seeded,
                        class_size = class.size,
                        "backing allocator failed during preallocation"
                    );
                    return Err(SeedError::Backing {
                        seeded,
                        class_size: class.size,
                    });
                }
            };
            // SAFETY: the block is fresh from the backing allocator and
            // laid out for this class.
            unsafe { self.lists[class.index].lock().push(block) };
            self.preallocated[class.index].fetch_add(1, Ordering::Relaxed);
            counts[class.index] += 1;
            seeded += class.size;
        }

        info!(
            seeded,
            budget = total_budget,
            "preallocated memory cyclically across all size classes"
        );
        for class in self.classes.iter() {
            debug!(
                size = class.size,
                blocks = counts[class.index],
                "seeded size class"
            );
        }
        Ok(seeded)
    }
}
