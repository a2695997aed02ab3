//! Power-of-two size classes.
//!
//! Class `i` holds chunks of `min << i` bytes. A request is served by the
//! smallest class whose size is at least the requested byte count, so the
//! internal fragmentation of any request is bounded by a factor of two.

/// Smallest chunk size of the default configuration.
pub const MIN_CHUNK_SIZE: usize = 4;

/// Largest chunk size of the default configuration.
pub const MAX_CHUNK_SIZE: usize = 65536;

/// Number of size classes of the default configuration (`4` to `65536`).
pub const CHUNK_CLASSES: usize = SizeClassTable::new(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE).len();

/// Upper bound on the number of classes any table can have.
pub(crate) const MAX_CLASSES: usize = usize::BITS as usize;

/// A single entry of a [`SizeClassTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeClass {
    /// Position of the class in the table.
    pub index: usize,
    /// Size in bytes of every chunk of this class.
    pub size: usize,
}

/// The ordered set of chunk sizes between two powers of two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeClassTable {
    min_shift: u32,
    max_shift: u32,
}

#[allow(clippy::len_without_is_empty)]
impl SizeClassTable {
    /// Create the table of all powers of two between `min` and `max`.
    ///
    /// Both bounds must be powers of two with `min <= max`; the allocator
    /// enforces this at the type level through `typenum` bounds.
    pub const fn new(min: usize, max: usize) -> Self {
        debug_assert!(min.is_power_of_two() && max.is_power_of_two() && min <= max);
        SizeClassTable {
            min_shift: min.trailing_zeros(),
            max_shift: max.trailing_zeros(),
        }
    }

    /// Number of classes in the table.
    pub const fn len(&self) -> usize {
        (self.max_shift - self.min_shift) as usize + 1
    }

    /// Size of the smallest class.
    pub const fn min_size(&self) -> usize {
        1 << self.min_shift
    }

    /// Size of the largest class.
    pub const fn max_size(&self) -> usize {
        1 << self.max_shift
    }

    /// Index of the smallest class able to hold `size` bytes.
    ///
    /// Returns `None` for empty requests and for requests larger than the
    /// largest class.
    pub const fn class_of(&self, size: usize) -> Option<usize> {
        if size == 0 || size > self.max_size() {
            return None;
        }
        let rounded = if size < self.min_size() {
            self.min_size()
        } else {
            // exact powers of two are already a class size
            size.next_power_of_two()
        };
        Some((rounded.trailing_zeros() - self.min_shift) as usize)
    }

    /// Chunk size of the class at `index`.
    pub const fn class_size(&self, index: usize) -> Option<usize> {
        if index < self.len() {
            Some(self.min_size() << index)
        } else {
            None
        }
    }

    /// Iterate over the classes, smallest first.
    pub fn iter(&self) -> impl Iterator<Item = SizeClass> + '_ {
        (0..self.len()).map(move |index| SizeClass {
            index,
            size: self.min_size() << index,
        })
    }
}

impl Default for SizeClassTable {
    fn default() -> Self {
        SizeClassTable::new(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE)
    }
}
