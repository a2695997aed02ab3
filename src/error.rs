//! Allocator error types.

use thiserror::Error;

/// Errors returned by [`Segalloc::allocate`](crate::Segalloc::allocate) and
/// [`Segalloc::release`](crate::Segalloc::release).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
    /// The size is zero or larger than the largest size class.
    #[error("invalid request size {size} (must be in 1..={max})")]
    InvalidSize {
        /// Requested size in bytes.
        size: usize,
        /// Largest size class of the allocator.
        max: usize,
    },
    /// A null pointer was given back to the allocator.
    #[error("cannot release a null pointer")]
    NullPointer,
    /// The size given on release maps to another class than the block's tag.
    #[error("block belongs to size class {found}, released as class {expected}")]
    ClassMismatch {
        /// Class derived from the size passed to `release`.
        expected: usize,
        /// Class recorded in the block tag.
        found: usize,
    },
    /// The backing allocator could not provide a fallback block.
    #[error("backing allocator failed to provide a {size}-byte block")]
    Backing {
        /// Size of the class that could not be served.
        size: usize,
    },
}

/// Errors returned by [`Segalloc::seed`](crate::Segalloc::seed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SeedError {
    /// The backing allocator failed before the budget was exhausted.
    ///
    /// Blocks seeded before the failure remain available.
    #[error("backing allocator failed on a {class_size}-byte block after seeding {seeded} bytes")]
    Backing {
        /// Bytes seeded before the failure.
        seeded: usize,
        /// Size of the class whose block could not be obtained.
        class_size: usize,
    },
}
