//! Timed comparison of the system allocator and the segregated allocator.

use std::alloc::GlobalAlloc;
use std::alloc::Layout;
use std::alloc::System;
use std::fmt;
use std::hint::black_box;
use std::ptr::NonNull;
use std::time::Duration;
use std::time::Instant;

use anyhow::Context;
use segalloc::Segalloc;
use segalloc::Stats;
use tracing::info;

use crate::workload::Workload;

/// Outcome of a benchmark run.
#[derive(Debug)]
pub struct Report {
    pub allocations: usize,
    pub requested_bytes: usize,
    pub system: Duration,
    pub segalloc: Duration,
    pub seeded_bytes: usize,
    pub stats: Stats,
    pub requested: Vec<usize>,
}

/// Time `workload` against the system allocator, then seed `allocator` with
/// `budget` bytes and time the same workload against it.
///
/// `settle_iterations` rounds of busy work separate seeding from the timed
/// run, so that the seeded blocks are no longer the hottest cache lines.
pub fn run(
    allocator: &Segalloc<System>,
    workload: &Workload,
    budget: usize,
    settle_iterations: u64,
) -> anyhow::Result<Report> {
    info!(
        allocations = workload.len(),
        bytes = workload.total_bytes(),
        "starting benchmark"
    );

    let system = time_system(&workload.sizes)?;

    let seeded_bytes = allocator.seed(budget)?;
    settle(settle_iterations);

    let segalloc = time_segalloc(allocator, &workload.sizes)?;

    Ok(Report {
        allocations: workload.len(),
        requested_bytes: workload.total_bytes(),
        system,
        segalloc,
        seeded_bytes,
        stats: allocator.stats(),
        requested: workload.requested.clone(),
    })
}

fn time_system(sizes: &[usize]) -> anyhow::Result<Duration> {
    let layouts = sizes
        .iter()
        .map(|&size| Layout::from_size_align(size, 1))
        .collect::<Result<Vec<_>, _>>()?;
    let mut ptrs = Vec::with_capacity(layouts.len());

    let start = Instant::now();
    for layout in &layouts {
        // SAFETY: workload sizes are never zero.
        ptrs.push(unsafe { System.alloc(*layout) });
    }
    for (ptr, layout) in ptrs.drain(..).zip(&layouts) {
        if !ptr.is_null() {
            // SAFETY: allocated above with the same layout.
            unsafe { System.dealloc(black_box(ptr), *layout) };
        }
    }
    Ok(start.elapsed())
}

fn time_segalloc(allocator: &Segalloc<System>, sizes: &[usize]) -> anyhow::Result<Duration> {
    let mut blocks: Vec<NonNull<u8>> = Vec::with_capacity(sizes.len());

    let start = Instant::now();
    for &size in sizes {
        let block = allocator
            .allocate(size)
            .with_context(|| format!("allocating {size} bytes"))?;
        blocks.push(block);
    }
    for (block, &size) in blocks.drain(..).zip(sizes) {
        // SAFETY: each block was allocated above for the same size.
        unsafe { allocator.release(black_box(block).as_ptr(), size)? };
    }
    Ok(start.elapsed())
}

fn settle(iterations: u64) {
    for i in 0..iterations {
        black_box(i);
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "Benchmarking with {} allocations totaling ~{} bytes...",
            self.allocations, self.requested_bytes
        )?;
        writeln!(f, "Standard malloc/free: {:.6} sec", self.system.as_secs_f64())?;
        writeln!(
            f,
            "Preallocated {} bytes of memory in a cyclic manner across all chunk sizes.",
            self.seeded_bytes
        )?;
        writeln!(
            f,
            "Segregated allocate/release: {:.6} sec",
            self.segalloc.as_secs_f64()
        )?;

        writeln!(f, "\nMemory Statistics:")?;
        writeln!(
            f,
            "{:<10} {:<15} {:<15} {:<15}",
            "Chunk Size", "Preallocated", "Requested", "Fallback"
        )?;
        for class in &self.stats.classes {
            let requested = self.requested.get(class.index).copied().unwrap_or(0);
            writeln!(
                f,
                "{:<10} {:<15} {:<15} {:<15}",
                class.size, class.preallocated, requested, class.fallback
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn report_lists_every_class() {
        let allocator: Segalloc<System> = Segalloc::new(System);
        let classes = *allocator.size_classes();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let workload = Workload::generate(&classes, 1 << 20, 1000, &mut rng);

        let report = run(&allocator, &workload, 1 << 20, 0).unwrap();
        assert_eq!(report.allocations, workload.len());
        assert_eq!(report.stats.classes.len(), classes.len());

        let text = report.to_string();
        assert!(text.contains("Memory Statistics:"));
        assert!(text.contains("65536"));
    }
}
