//! Worker pool configuration.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Hard ceiling applied to the auto-detected worker count.
pub const DEFAULT_WORKER_CEILING: usize = 4;

/// Minimum worker count applied to the auto-detected value.
pub const DEFAULT_WORKER_FLOOR: usize = 2;

/// Worker pool configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of execution slots. `None` selects
    /// `min(available parallelism, 4)`, floored at 2.
    #[validate(range(min = 1, max = 64))]
    pub max_workers: Option<usize>,
    /// Run every conversion serially in the calling task instead of a pool.
    pub inline_fallback: bool,
}

impl PoolConfig {
    /// Resolve the number of slots the pool should start with.
    pub fn effective_max_workers(&self) -> usize {
        self.max_workers.unwrap_or_else(default_max_workers)
    }
}

/// `min(available parallelism, 4)`, never below 2.
pub fn default_max_workers() -> usize {
    let detected = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(DEFAULT_WORKER_FLOOR);
    detected.min(DEFAULT_WORKER_CEILING).max(DEFAULT_WORKER_FLOOR)
}
