// Copyright (c) 2018-2019 Martin Larralde (martin.larralde@ens-paris-saclay.fr)
//
// Licensed under MIT license (the COPYING file). This file may not be
// copied, modified, or distributed except according to those terms.

//! A segregated free-list allocator with power-of-two size classes.
//!
//! Designed to measure how much faster small, repeated, power-of-two sized
//! allocations get when they are served from preallocated per-class free
//! lists instead of a general-purpose allocator.
//!
//! # Algorithm
//!
//! The [`Segalloc`] wraps another underlying allocator, called the *backing*
//! allocator, and only uses it to obtain blocks of fixed sizes. Sizes are
//! grouped in *size classes*: every power of two between `4` and `64kB` by
//! default, bounds which can be changed at compile time using numerics from
//! the [`typenum`] crate. Each class owns an intrusive LIFO free list, where
//! the link to the next free block is stored inside the free block itself.
//!
//! ## Preallocation
//!
//! Before the workload starts, [`Segalloc::seed`] fills the free lists in a
//! **cyclic** manner: one block of the smallest class, then one of the next
//! class, and so on, wrapping around to the smallest class until the budget
//! (multiplied by an over-provisioning factor, `2` by default) would be
//! exceeded. Classes therefore receive the same number of blocks, not the
//! same number of bytes.
//!
//! ## Allocation
//!
//! A request is rounded up to the smallest class that can hold it, and the
//! most recently freed block of that class is returned. If the list is
//! empty, a single block sized to the class is requested from the backing
//! allocator. Requests of `0` bytes or above the largest class are rejected.
//!
//! ## Deallocation
//!
//! A released block is pushed back onto the free list of the class derived
//! from the size given by the caller. Blocks are never merged, split, moved
//! to another class or given back to the backing allocator. The allocator
//! has no per-block header by default, so the size given on release must
//! map to the class the block was allocated from; an optional size tag can
//! be enabled with [`Validation::SizeTag`] to check it.
//!
//! ## Synchronisation
//!
//! Every free list sits behind its own *spinning mutex* from the [`spin`]
//! crate, so threads working on different classes never contend.
//!
//! # Usage
//!
//! ```rust
//! use std::alloc::System;
//! use segalloc::Segalloc;
//!
//! static ALLOCATOR: Segalloc<System> = Segalloc::new(System);
//!
//! # fn main() {
//! ALLOCATOR.seed(10 * 1024 * 1024).unwrap();
//!
//! let block = ALLOCATOR.allocate(128).unwrap();
//! unsafe { ALLOCATOR.release(block.as_ptr(), 128).unwrap() };
//! # }
//! ```
//!
//! [`spin`]: https://docs.rs/spin/
//! [`typenum`]: https://docs.rs/typenum/

extern crate spin;
extern crate typenum;

mod alloc;
mod config;
mod error;
mod free_list;
mod seed;
mod size_class;
mod stats;
mod utils;

// Public reexport of the allocator and its companion types.
pub use alloc::Segalloc;
pub use config::Config;
pub use config::Validation;
pub use error::AllocError;
pub use error::SeedError;
pub use seed::SeedPlan;
pub use size_class::SizeClass;
pub use size_class::SizeClassTable;
pub use size_class::CHUNK_CLASSES;
pub use size_class::MAX_CHUNK_SIZE;
pub use size_class::MIN_CHUNK_SIZE;
pub use stats::ClassStats;
pub use stats::Stats;
