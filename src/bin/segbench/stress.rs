//! Conditions applied to the process before benchmarking.
//!
//! None of these touch the allocator under test except [`multithreaded`].
//! Buffers returned by the pressure helpers must be kept alive for the
//! pressure to last through the benchmark.

use std::alloc::System;
use std::hint::black_box;
use std::sync::Arc;
use std::thread;

use anyhow::bail;
use anyhow::Context;
use rand::Rng;
use segalloc::Segalloc;
use tracing::debug;
use tracing::info;
use tracing::warn;

const CACHE_LINE: usize = 64;
const PAGE_SIZE: usize = 4096;

/// Size of the buffer used to evict the CPU caches, larger than most L3.
pub const CACHE_FLUSH_BYTES: usize = 32 * 1024 * 1024;

/// Touch every cache line of a large buffer, evicting whatever the caches
/// held before.
pub fn clear_cpu_cache() {
    let mut buffer = vec![1u8; CACHE_FLUSH_BYTES];
    for i in (0..buffer.len()).step_by(CACHE_LINE) {
        buffer[i] = 0;
    }
    black_box(&buffer);
    debug!(bytes = CACHE_FLUSH_BYTES, "cleared CPU caches");
}

/// Allocate `count` blocks of `size` bytes and free a random half of them.
///
/// Returns the surviving blocks.
pub fn fragment<R: Rng>(count: usize, size: usize, rng: &mut R) -> Vec<Box<[u8]>> {
    let mut blocks: Vec<Option<Box<[u8]>>> = (0..count)
        .map(|_| Some(vec![0u8; size].into_boxed_slice()))
        .collect();
    for block in blocks.iter_mut() {
        if rng.gen_bool(0.5) {
            *block = None;
        }
    }
    let survivors: Vec<_> = blocks.into_iter().flatten().collect();
    info!(count, size, kept = survivors.len(), "fragmented the system heap");
    survivors
}

/// Commit every page of a `size`-byte buffer.
pub fn force_page_faults(size: usize) -> anyhow::Result<Vec<u8>> {
    let buffer = touch_pages(size).with_context(|| format!("cannot reserve {size} bytes"))?;
    info!(bytes = size, "forced page faults");
    Ok(buffer)
}

/// Commit progressively larger buffers until the system allocator refuses
/// one or `limit` bytes are held.
pub fn consume_memory(limit: usize) -> Vec<Vec<u8>> {
    let mut held = Vec::new();
    let mut total = 0usize;
    let mut size = 1024 * 1024 * 1024;

    while total.saturating_add(size) <= limit {
        match touch_pages(size) {
            Some(buffer) => {
                total += size;
                held.push(buffer);
            }
            None => {
                warn!(size, "system allocator refused a buffer");
                break;
            }
        }
        size += 512 * 1024 * 1024;
    }
    info!(bytes = total, buffers = held.len(), "simulated memory pressure");
    held
}

fn touch_pages(size: usize) -> Option<Vec<u8>> {
    let mut buffer: Vec<u8> = Vec::new();
    buffer.try_reserve_exact(size).ok()?;
    let spare = buffer.spare_capacity_mut();
    for i in (0..size).step_by(PAGE_SIZE) {
        spare[i].write(1);
    }
    black_box(&buffer);
    Some(buffer)
}

/// Hammer the 128-byte class of `allocator` from several threads at once.
pub fn multithreaded(
    allocator: &Arc<Segalloc<System>>,
    threads: usize,
    rounds: usize,
) -> anyhow::Result<()> {
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let allocator = Arc::clone(allocator);
            thread::spawn(move || -> Result<(), segalloc::AllocError> {
                for _ in 0..rounds {
                    let block = allocator.allocate(128)?;
                    // SAFETY: the block was just allocated for 128 bytes.
                    unsafe { allocator.release(block.as_ptr(), 128)? };
                }
                Ok(())
            })
        })
        .collect();

    for handle in handles {
        match handle.join() {
            Ok(result) => result?,
            Err(_) => bail!("allocation thread panicked"),
        }
    }
    info!(threads, rounds, "multithreaded allocation test finished");
    Ok(())
}
