//! Intrusive LIFO free lists.
//!
//! A free block stores the link to the next free block in its own first
//! word, so a list costs no memory beyond the blocks it holds. A block is
//! either *linked* (a [`FreeBlock`] node owned by the list) or *owned* (a
//! plain `NonNull<u8>` handed to the caller); the conversion between the two
//! only happens in [`FreeList::push`] and [`FreeList::pop`].

use core::mem::align_of;
use core::mem::size_of;
use core::ptr::NonNull;

/// The node written at the start of a block while it sits on a free list.
#[repr(C)]
pub(crate) struct FreeBlock {
    next: Option<NonNull<FreeBlock>>,
}

impl FreeBlock {
    /// Minimum number of bytes a block needs to hold the link.
    pub(crate) const fn min_size() -> usize {
        size_of::<FreeBlock>()
    }

    /// Minimum alignment a block needs to hold the link.
    pub(crate) const fn min_align() -> usize {
        align_of::<FreeBlock>()
    }
}

/// A stack of free blocks of a single size class.
pub(crate) struct FreeList {
    head: Option<NonNull<FreeBlock>>,
    len: usize,
}

// The list owns the chain it points to; blocks are plain memory.
unsafe impl Send for FreeList {}

impl FreeList {
    pub(crate) const fn new() -> Self {
        FreeList { head: None, len: 0 }
    }

    /// Prepend `block` to the list.
    ///
    /// # Safety
    ///
    /// `block` must be valid for writes of a [`FreeBlock`], suitably aligned,
    /// and must not be used by anyone else until popped again. Pushing a block
    /// that is already on a list corrupts that list.
    pub(crate) unsafe fn push(&mut self, block: NonNull<u8>) {
        let node = block.cast::<FreeBlock>();
        node.as_ptr().write(FreeBlock { next: self.head });
        self.head = Some(node);
        self.len += 1;
    }

    /// Remove the most recently pushed block, if any.
    pub(crate) fn pop(&mut self) -> Option<NonNull<u8>> {
        let node = self.head?;
        // SAFETY: every node on the list was written by `push`.
        self.head = unsafe { node.as_ptr().read().next };
        self.len -= 1;
        Some(node.cast())
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Backing storage for one block, only ever accessed through pointers.
    #[repr(align(16))]
    struct Slot(#[allow(dead_code)] [u8; 16]);

    fn slot_ptr(slot: &mut Slot) -> NonNull<u8> {
        NonNull::from(slot).cast()
    }

    #[test]
    fn test_empty() {
        let mut list = FreeList::new();
        assert_eq!(list.len(), 0);
        assert!(list.pop().is_none());
    }

    #[test]
    fn test_lifo_order() {
        let mut slots = [Slot([0; 16]), Slot([0; 16]), Slot([0; 16])];
        let ptrs: Vec<NonNull<u8>> = slots.iter_mut().map(slot_ptr).collect();

        let mut list = FreeList::new();
        for &ptr in &ptrs {
            unsafe { list.push(ptr) };
        }
        assert_eq!(list.len(), 3);

        assert_eq!(list.pop(), Some(ptrs[2]));
        assert_eq!(list.pop(), Some(ptrs[1]));
        assert_eq!(list.pop(), Some(ptrs[0]));
        assert!(list.pop().is_none());
        assert_eq!(list.len(), 0);
    }

    #[test]
    fn test_reuse_after_pop() {
        let mut slot = Slot([0xAA; 16]);
        let ptr = slot_ptr(&mut slot);
        let mut list = FreeList::new();

        unsafe { list.push(ptr) };
        let block = list.pop().unwrap();
        // the caller owns the whole block again, link word included
        unsafe { block.as_ptr().write_bytes(0x55, 16) };
        unsafe { list.push(block) };
        assert_eq!(list.pop(), Some(ptr));
    }
}
