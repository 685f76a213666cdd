//! Render worker sizing.

use tracing::debug;

/// One core is left free for the collector and the OS.
pub fn default_worker_count() -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let workers = cores.saturating_sub(1).max(1);
    debug!(cores, workers, "Worker count");
    workers
}

/// Honours an explicit request (at least one), else the default.
pub fn resolve_worker_count(requested: Option<usize>) -> usize {
    match requested {
        Some(n) => n.max(1),
        None => default_worker_count(),
    }
}
