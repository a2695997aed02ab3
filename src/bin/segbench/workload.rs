//! Synthetic allocation workloads.

use rand::Rng;
use segalloc::SizeClassTable;

/// A sequence of requested sizes, all of them exact class sizes.
#[derive(Debug, Clone)]
pub struct Workload {
    /// Requested sizes, in request order.
    pub sizes: Vec<usize>,
    /// Number of requests per size class.
    pub requested: Vec<usize>,
}

impl Workload {
    /// Draw class sizes uniformly at random until `total_size` bytes would
    /// be exceeded or `max_count` sizes were drawn.
    pub fn generate<R: Rng>(
        classes: &SizeClassTable,
        total_size: usize,
        max_count: usize,
        rng: &mut R,
    ) -> Self {
        let mut sizes = Vec::new();
        let mut requested = vec![0; classes.len()];
        let mut used = 0;

        while used < total_size && sizes.len() < max_count {
            let index = rng.gen_range(0..classes.len());
            let size = classes.min_size() << index;
            if used + size > total_size {
                break;
            }
            sizes.push(size);
            requested[index] += 1;
            used += size;
        }

        Workload { sizes, requested }
    }

    /// Total number of bytes requested.
    pub fn total_bytes(&self) -> usize {
        self.sizes.iter().sum()
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }
}
