//! Scenarios shared by every backing allocator.

#![allow(dead_code)]

use std::alloc::GlobalAlloc;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use segalloc::AllocError;
use segalloc::Segalloc;
use segalloc::CHUNK_CLASSES;
use segalloc::MAX_CHUNK_SIZE;

pub fn small_alloc<A: GlobalAlloc>(allocator: &Segalloc<A>) {
    let sizes = [1, 4, 7, 64, 100, 1000, 4096, MAX_CHUNK_SIZE];
    let blocks: Vec<_> = sizes
        .iter()
        .map(|&size| allocator.allocate(size).unwrap())
        .collect();

    // every block is writable across the whole requested size
    for (block, &size) in blocks.iter().zip(&sizes) {
        unsafe { block.as_ptr().write_bytes(size as u8, size) };
    }
    for (block, &size) in blocks.iter().zip(&sizes) {
        let bytes = unsafe { std::slice::from_raw_parts(block.as_ptr(), size) };
        assert!(bytes.iter().all(|&b| b == size as u8));
    }

    for (block, &size) in blocks.iter().zip(&sizes) {
        unsafe { allocator.release(block.as_ptr(), size).unwrap() };
    }
}

pub fn rejection_boundary<A: GlobalAlloc>(allocator: &Segalloc<A>) {
    assert!(matches!(
        allocator.allocate(0),
        Err(AllocError::InvalidSize { size: 0, .. })
    ));
    assert!(matches!(
        allocator.allocate(MAX_CHUNK_SIZE + 1),
        Err(AllocError::InvalidSize { .. })
    ));
    let block = allocator.allocate(MAX_CHUNK_SIZE).unwrap();
    unsafe { allocator.release(block.as_ptr(), MAX_CHUNK_SIZE).unwrap() };
}

pub fn lifo_reuse<A: GlobalAlloc>(allocator: &Segalloc<A>) {
    let block = allocator.allocate(64).unwrap();
    unsafe { allocator.release(block.as_ptr(), 64).unwrap() };
    let again = allocator.allocate(64).unwrap();
    assert_eq!(again, block);
    unsafe { allocator.release(again.as_ptr(), 64).unwrap() };
}

pub fn seeded_workload<A: GlobalAlloc>(allocator: &Segalloc<A>) {
    allocator.seed(1 << 20).unwrap();
    for index in 0..CHUNK_CLASSES {
        assert!(allocator.preallocated_count(index) > 0);
    }

    let sizes: Vec<usize> = (0..2000).map(|i| 4 << (i % CHUNK_CLASSES)).collect();
    let blocks: Vec<_> = sizes
        .iter()
        .map(|&size| allocator.allocate(size).unwrap())
        .collect();

    // no block is handed out twice
    let distinct: HashSet<usize> = blocks.iter().map(|b| b.as_ptr() as usize).collect();
    assert_eq!(distinct.len(), blocks.len());

    for (block, &size) in blocks.iter().zip(&sizes) {
        unsafe { allocator.release(block.as_ptr(), size).unwrap() };
    }
    let stats = allocator.stats();
    assert!(stats.available_bytes() >= stats.preallocated_bytes());
}

pub fn concurrent_classes<A>(allocator: Arc<Segalloc<A>>)
where
    A: GlobalAlloc + Send + Sync + 'static,
{
    const THREADS: usize = 4;
    const ROUNDS: usize = 10_000;

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let allocator = Arc::clone(&allocator);
            thread::spawn(move || {
                let size = if t % 2 == 0 { 128 } else { 96 };
                for round in 0..ROUNDS {
                    let block = allocator.allocate(size).unwrap();
                    // a block shared with another thread would see its
                    // marker overwritten
                    let marker = (t * ROUNDS + round) as u64;
                    unsafe {
                        block.as_ptr().cast::<u64>().write(marker);
                        thread::yield_now();
                        assert_eq!(block.as_ptr().cast::<u64>().read(), marker);
                        allocator.release(block.as_ptr(), size).unwrap();
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    // every block used by the threads is back on the 128-byte list
    let index = allocator.size_classes().class_of(128).unwrap();
    assert_eq!(
        allocator.available_count(index),
        allocator.preallocated_count(index) + allocator.fallback_count(index)
    );
}
