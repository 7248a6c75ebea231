// Counts are in Unicode scalar values (chars), not bytes.

use serde::{Deserialize, Serialize};

/// Outcome of a single optimization call or a whole batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizationStats {
    pub original_count: u64,
    pub optimized_count: u64,
    /// `(original - optimized) / original * 100`, `0.0` for empty input.
    pub savings_percent: f64,
    /// Cumulative cache hits of the engine at the time of the call.
    pub cache_hits: u64,
    /// Cumulative incremental updates of the engine at the time of the call.
    pub incremental_updates: u64,
}

impl OptimizationStats {
    /// Build stats from raw counts, computing `savings_percent`.
    pub fn from_counts(
        original_count: u64,
        optimized_count: u64,
        cache_hits: u64,
        incremental_updates: u64,
    ) -> Self {
        Self {
            original_count,
            optimized_count,
            savings_percent: savings_percent(original_count, optimized_count),
            cache_hits,
            incremental_updates,
        }
    }
}

/// Percentage of `original` saved by `optimized`.
pub fn savings_percent(original: u64, optimized: u64) -> f64 {
    if original == 0 {
        return 0.0;
    }
    (original as f64 - optimized as f64) / original as f64 * 100.0
}

/// Result of optimizing an ordered batch of requests.
///
/// `optimized_requests[i]` is the optimized form of input request `i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub batch_id: String,
    pub optimized_requests: Vec<String>,
    pub stats: OptimizationStats,
}
