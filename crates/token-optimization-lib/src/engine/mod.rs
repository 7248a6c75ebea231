//! Optimization engine boundary.
//!
//! The MCP server only talks to the [`TokenOptimizer`] trait. [`NativeOptimizer`]
//! is the in-process implementation shipped with this crate; a foreign-call
//! adapter can implement the same trait.
//
// Rust guideline compliant 2026-02-13

use serde::{Deserialize, Serialize};

use crate::error::TokenOptimizationError;
use crate::model::optimization_config::{CompressionLevel, OptimizationConfig};
use crate::model::optimization_stats::{BatchResult, OptimizationStats};

pub mod dictionary;
pub mod native;

pub use dictionary::Dictionary;
pub use native::NativeOptimizer;

/// Maximum number of requests accepted by one `optimize_batch` call.
pub const MAX_BATCH_REQUESTS: usize = 1000;

/// How a single text is rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextMode {
    /// Lossy rewriting driven by the compression level.
    Semantic,
    /// Whitespace cleanup only.
    Lossless,
}

/// Construction and tuning parameters of an engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub batch_size: usize,
    /// Incremental-update window in milliseconds.
    pub window_size_ms: u64,
    pub semantic_mode: bool,
    pub compression_level: CompressionLevel,
}

impl EngineSettings {
    pub fn new(batch_size: usize, window_size_ms: u64, semantic_mode: bool) -> Self {
        Self {
            batch_size,
            window_size_ms,
            semantic_mode,
            compression_level: CompressionLevel::default(),
        }
    }

    /// Mode used when a call does not ask for one explicitly.
    pub fn default_mode(&self) -> TextMode {
        if self.semantic_mode {
            TextMode::Semantic
        } else {
            TextMode::Lossless
        }
    }
}

impl From<&OptimizationConfig> for EngineSettings {
    fn from(config: &OptimizationConfig) -> Self {
        Self {
            batch_size: usize::try_from(config.batch_size).unwrap_or(usize::MAX),
            window_size_ms: config.window_size,
            semantic_mode: config.semantic_mode(),
            compression_level: config.compression_level(),
        }
    }
}

/// Capability set of an optimization engine.
///
/// Implementations must be shareable across request handlers; every method
/// takes `&self`.
pub trait TokenOptimizer: Send + Sync {
    /// Optimize one text using the engine's default mode.
    fn optimize_text(&self, text: &str) -> Result<OptimizationStats, TokenOptimizationError> {
        self.optimize_text_with_mode(text, None)
    }

    /// Optimize one text, optionally overriding the default mode.
    fn optimize_text_with_mode(
        &self,
        text: &str,
        mode: Option<TextMode>,
    ) -> Result<OptimizationStats, TokenOptimizationError>;

    /// Optimize an ordered batch; output order and length match `requests`.
    fn optimize_batch(&self, requests: &[String]) -> Result<BatchResult, TokenOptimizationError>;

    fn add_abbreviation(&self, full: &str, abbr: &str) -> Result<(), TokenOptimizationError>;

    fn add_stop_word(&self, word: &str) -> Result<(), TokenOptimizationError>;

    /// Human-readable performance report.
    fn get_performance_stats(&self) -> Result<String, TokenOptimizationError>;

    /// Human-readable cache report.
    fn get_cache_stats(&self) -> Result<String, TokenOptimizationError>;

    fn clear_cache(&self) -> Result<(), TokenOptimizationError>;

    /// Apply new tuning parameters. Engines fixed at construction may ignore this.
    fn reconfigure(&self, _settings: &EngineSettings) -> Result<(), TokenOptimizationError> {
        Ok(())
    }

    /// Release resources. Later calls fail with [`TokenOptimizationError::Disposed`].
    fn dispose(&self);
}
