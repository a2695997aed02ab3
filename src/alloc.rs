use core::alloc::GlobalAlloc;
use core::alloc::Layout;
use core::cmp::max;
use core::marker::PhantomData;
use core::ptr::null_mut;
use core::ptr::NonNull;
use core::sync::atomic::AtomicUsize;
use core::sync::atomic::Ordering;

use spin::Mutex;
use typenum::consts::U16;
use typenum::consts::U4;
use typenum::consts::U65536;
use typenum::IsLessOrEqual;
use typenum::PowerOfTwo;
use typenum::True;
use typenum::Unsigned;

use super::config::Config;
use super::config::Validation;
use super::error::AllocError;
use super::free_list::FreeBlock;
use super::free_list::FreeList;
use super::size_class::SizeClassTable;
use super::size_class::MAX_CLASSES;
use super::utils::align_up;

/// Marker stored in the tag of every block when size tags are enabled.
const TAG_MAGIC: usize = 0x5E6A_110C;

#[allow(clippy::declare_interior_mutable_const)]
const EMPTY_LIST: Mutex<FreeList> = Mutex::new(FreeList::new());
#[allow(clippy::declare_interior_mutable_const)]
const ZERO: AtomicUsize = AtomicUsize::new(0);

/// A segregated free-list allocator with power-of-two size classes.
///
/// Every size class owns a LIFO list of free blocks. The lists are filled
/// ahead of time by [`seed`](Segalloc::seed), served from by
/// [`allocate`](Segalloc::allocate) and refilled by
/// [`release`](Segalloc::release). When a class runs dry, a single block of
/// that class is requested from the wrapped *backing* allocator instead.
/// Memory never moves between classes and is never handed back to the
/// backing allocator.
///
/// # Compile-time configuration
///
/// Allocation parameters can be changed at compile time using numeric types
/// from the [`typenum`](https://docs.rs/typenum) crate. The parameters are
/// defined (in the order of appearance in the struct signature):
///
/// * **MIN** (minimum chunk size): the size of the smallest class.
/// * **MAX** (maximum chunk size): the size of the largest class. Larger
///   requests are rejected.
/// * **BA** (block alignment): the alignment of every block handed out.
///   Raised to the alignment of a pointer if lower.
///
/// # Usage
///
/// ```rust
/// use std::alloc::System;
/// use segalloc::Segalloc;
///
/// let allocator: Segalloc<System> = Segalloc::new(System);
/// allocator.seed(4096).unwrap();
///
/// let block = allocator.allocate(100).unwrap();
/// unsafe { allocator.release(block.as_ptr(), 100).unwrap() };
/// assert_eq!(allocator.allocate(100).unwrap(), block);
/// ```
pub struct Segalloc<A, MIN = U4, MAX = U65536, BA = U16>
where
    A: GlobalAlloc,
    MIN: Unsigned + PowerOfTwo + IsLessOrEqual<MAX, Output = True>,
    MAX: Unsigned + PowerOfTwo,
    BA: Unsigned + PowerOfTwo,
{
    __min_chunk: PhantomData<MIN>,
    __max_chunk: PhantomData<MAX>,
    __block_align: PhantomData<BA>,
    pub(crate) config: Config,
    pub(crate) classes: SizeClassTable,
    pub(crate) lists: [Mutex<FreeList>; MAX_CLASSES],
    pub(crate) preallocated: [AtomicUsize; MAX_CLASSES],
    pub(crate) fallback: [AtomicUsize; MAX_CLASSES],
    backing: A,
}

impl<A, MIN, MAX, BA> Default for Segalloc<A, MIN, MAX, BA>
where
    A: GlobalAlloc + Default,
    MIN: Unsigned + PowerOfTwo + IsLessOrEqual<MAX, Output = True>,
    MAX: Unsigned + PowerOfTwo,
    BA: Unsigned + PowerOfTwo,
{
    fn default() -> Self {
        Self::new(A::default())
    }
}

impl<A, MIN, MAX, BA> Segalloc<A, MIN, MAX, BA>
where
    A: GlobalAlloc,
    MIN: Unsigned + PowerOfTwo + IsLessOrEqual<MAX, Output = True>,
    MAX: Unsigned + PowerOfTwo,
    BA: Unsigned + PowerOfTwo,
{
    /// Create a new allocator instance with empty free lists, wrapping the
    /// given backing allocator.
    pub const fn new(backing: A) -> Self {
        Self::with_config(backing, Config::DEFAULT)
    }

    /// Create a new allocator instance with the given runtime configuration.
    pub const fn with_config(backing: A, config: Config) -> Self {
        Segalloc {
            __min_chunk: PhantomData,
            __max_chunk: PhantomData,
            __block_align: PhantomData,
            config,
            classes: SizeClassTable::new(MIN::USIZE, MAX::USIZE),
            lists: [EMPTY_LIST; MAX_CLASSES],
            preallocated: [ZERO; MAX_CLASSES],
            fallback: [ZERO; MAX_CLASSES],
            backing,
        }
    }

    /// The size classes served by this allocator.
    pub fn size_classes(&self) -> &SizeClassTable {
        &self.classes
    }

    /// The runtime configuration of this allocator.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Alignment of every block handed out by this allocator.
    pub const fn block_align() -> usize {
        if BA::USIZE > FreeBlock::min_align() {
            BA::USIZE
        } else {
            FreeBlock::min_align()
        }
    }

    /// Allocate a block able to hold `size` bytes.
    ///
    /// The block comes from the free list of the smallest class holding
    /// `size` bytes, or from the backing allocator if that list is empty.
    /// Either way the block is exactly one class size large.
    pub fn allocate(&self, size: usize) -> Result<NonNull<u8>, AllocError> {
        let index = self.class_of(size)?;

        let reused = self.lists[index].lock().pop();
        if let Some(block) = reused {
            return Ok(block);
        }

        let block = self.obtain(index).ok_or(AllocError::Backing {
            size: self.classes.min_size() << index,
        })?;
        self.fallback[index].fetch_add(1, Ordering::Relaxed);
        Ok(block)
    }

    /// Give a block back to the free list of its size class.
    ///
    /// Null pointers and sizes outside of the class range are rejected
    /// without side effect. With [`Validation::SizeTag`], a block released
    /// with a size of another class is rejected as well.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by [`allocate`](Self::allocate) on this
    /// allocator with a `size` mapping to the same class, and must not be
    /// used after this call. Releasing a block twice, or with the size of
    /// another class while validation is off, corrupts the free lists.
    pub unsafe fn release(&self, ptr: *mut u8, size: usize) -> Result<(), AllocError> {
        let block = NonNull::new(ptr).ok_or(AllocError::NullPointer)?;
        let index = self.class_of(size)?;

        if self.config.validation == Validation::SizeTag {
            let found = self.read_tag(block);
            if found != index {
                return Err(AllocError::ClassMismatch {
                    expected: index,
                    found,
                });
            }
        }

        self.lists[index].lock().push(block);
        Ok(())
    }

    fn class_of(&self, size: usize) -> Result<usize, AllocError> {
        self.classes.class_of(size).ok_or(AllocError::InvalidSize {
            size,
            max: self.classes.max_size(),
        })
    }

    /// Number of bytes reserved in front of each block for its tag.
    fn tag_size(&self) -> usize {
        match self.config.validation {
            Validation::Unchecked => 0,
            Validation::SizeTag => Self::block_align(),
        }
    }

    /// Backing layout of a single block of the class at `index`.
    fn block_layout(&self, index: usize) -> Option<Layout> {
        let class_size = self.classes.class_size(index)?;
        let payload = align_up(max(class_size, FreeBlock::min_size()), Self::block_align())?;
        let size = payload.checked_add(self.tag_size())?;
        Layout::from_size_align(size, Self::block_align()).ok()
    }

    /// Get a fresh block of the class at `index` from the backing allocator.
    pub(crate) fn obtain(&self, index: usize) -> Option<NonNull<u8>> {
        let layout = self.block_layout(index)?;
        // SAFETY: the layout is never zero-sized.
        let raw = NonNull::new(unsafe { self.backing.alloc(layout) })?;
        if self.config.validation == Validation::Unchecked {
            return Some(raw);
        }
        // SAFETY: the tag fits in the block prefix, which is aligned for
        // a `usize`, and the payload starts right after it.
        unsafe {
            raw.as_ptr().cast::<usize>().write(TAG_MAGIC ^ index);
            Some(NonNull::new_unchecked(raw.as_ptr().add(self.tag_size())))
        }
    }

    unsafe fn read_tag(&self, block: NonNull<u8>) -> usize {
        let tag = block.as_ptr().sub(self.tag_size()).cast::<usize>().read();
        tag ^ TAG_MAGIC
    }
}

unsafe impl<A, MIN, MAX, BA> GlobalAlloc for Segalloc<A, MIN, MAX, BA>
where
    A: GlobalAlloc,
    MIN: Unsigned + PowerOfTwo + IsLessOrEqual<MAX, Output = True>,
    MAX: Unsigned + PowerOfTwo,
    BA: Unsigned + PowerOfTwo,
{
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        // there is no large-object path: oversized and over-aligned
        // layouts are refused like any other invalid request
        if layout.align() > Self::block_align() {
            return null_mut();
        }
        match self.allocate(layout.size()) {
            Ok(block) => block.as_ptr(),
            Err(_) => null_mut(),
        }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        // a rejected block is leaked, there is no way to report it here
        let result = self.release(ptr, layout.size());
        debug_assert!(result.is_ok(), "rejected dealloc: {result:?}");
    }
}
