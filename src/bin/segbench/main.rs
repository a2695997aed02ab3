//! Benchmark driver for the segregated free-list allocator.
//!
//! Runs optional stress scenarios, then times a random workload of
//! power-of-two allocations against the system allocator and against a
//! seeded [`Segalloc`].
//!
//! # Examples
//!
//! ```bash
//! # Plain benchmark on a 10MB workload
//! segbench
//!
//! # Evict the caches and fragment the system heap first
//! segbench -c -f
//!
//! # Reproducible workload, size tags on, no settling delay
//! segbench --rng-seed 42 --size-tags --settle-iterations 0
//! ```

mod benchmark;
mod stress;
mod workload;

use std::alloc::System;
use std::sync::Arc;

use clap::Parser;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use segalloc::Config;
use segalloc::Segalloc;
use segalloc::Validation;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::workload::Workload;

/// Segregated free-list allocator benchmark
#[derive(Parser, Debug)]
#[command(name = "segbench")]
#[command(version)]
#[command(about = "Compare a segregated free-list allocator with the system allocator", long_about = None)]
struct Cli {
    /// Clear CPU cache
    #[arg(short = 'c', long)]
    clear_cache: bool,

    /// Fragment memory
    #[arg(short = 'f', long)]
    fragment: bool,

    /// Force page faults
    #[arg(short = 'p', long)]
    page_faults: bool,

    /// Simulate memory pressure
    #[arg(short = 'm', long)]
    memory_pressure: bool,

    /// Multi-threaded test
    #[arg(short = 't', long)]
    threads: bool,

    /// Run benchmark (always runs, kept for compatibility)
    #[arg(short = 'b', long = "benchmark")]
    _benchmark: bool,

    /// Workload size in bytes
    #[arg(long, default_value_t = 10 * 1024 * 1024)]
    budget: usize,

    /// Maximum number of allocations in the workload
    #[arg(long, default_value_t = 100_000)]
    max_allocations: usize,

    /// Preallocation multiplier applied to the budget
    #[arg(long, default_value_t = Config::DEFAULT_OVER_PROVISION)]
    over_provision: usize,

    /// Busy-loop iterations between seeding and the timed run
    #[arg(long, default_value_t = 1_000_000_000)]
    settle_iterations: u64,

    /// Seed of the workload generator (random if omitted)
    #[arg(long)]
    rng_seed: Option<u64>,

    /// Tag blocks with their size class and validate releases
    #[arg(long)]
    size_tags: bool,

    /// Number of threads of the multi-threaded test
    #[arg(long, default_value_t = 4)]
    thread_count: usize,

    /// Allocations per thread in the multi-threaded test
    #[arg(long, default_value_t = 100_000)]
    thread_rounds: usize,

    /// Bytes touched by the page fault scenario
    #[arg(long, default_value_t = 2 * 1024 * 1024 * 1024)]
    page_fault_bytes: u64,

    /// Upper bound on the bytes held by the memory pressure scenario
    #[arg(long, default_value_t = 8 * 1024 * 1024 * 1024)]
    pressure_limit: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli);

    let mut rng = match cli.rng_seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };

    let validation = if cli.size_tags {
        Validation::SizeTag
    } else {
        Validation::Unchecked
    };
    let config = Config::DEFAULT
        .with_over_provision(cli.over_provision)
        .with_validation(validation);
    let allocator: Arc<Segalloc<System>> = Arc::new(Segalloc::with_config(System, config));

    if cli.clear_cache {
        stress::clear_cpu_cache();
    }
    // pressure buffers live until the benchmark is over
    let _fragments = if cli.fragment {
        stress::fragment(10_000, 128, &mut rng)
    } else {
        Vec::new()
    };
    let _page_faults = if cli.page_faults {
        Some(stress::force_page_faults(clamp_to_usize(cli.page_fault_bytes))?)
    } else {
        None
    };
    let _pressure = if cli.memory_pressure {
        stress::consume_memory(clamp_to_usize(cli.pressure_limit))
    } else {
        Vec::new()
    };
    if cli.threads {
        stress::multithreaded(&allocator, cli.thread_count, cli.thread_rounds)?;
    }

    let workload = Workload::generate(
        allocator.size_classes(),
        cli.budget,
        cli.max_allocations,
        &mut rng,
    );
    let report = benchmark::run(&allocator, &workload, cli.budget, cli.settle_iterations)?;
    info!(
        system_secs = report.system.as_secs_f64(),
        segalloc_secs = report.segalloc.as_secs_f64(),
        "benchmark finished"
    );
    print!("{report}");

    Ok(())
}

/// Byte counts above the address space are capped to it.
fn clamp_to_usize(bytes: u64) -> usize {
    usize::try_from(bytes).unwrap_or(usize::MAX)
}

/// Setup console logging filtered by `RUST_LOG` or `--log-level`
fn setup_logging(cli: &Cli) {
    let log_level = cli
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .init();
}
