//! Library behind the token optimization MCP server.
//!
//! - [`model`]: configuration, stats and batch records.
//! - [`settings`]: the host settings file.
//! - [`holder`]: the effective config shared by request handlers.
//! - [`ui`] and [`channel`]: the HTML control panel and its message protocol.
//! - [`engine`]: the optimizer trait and the native implementation.
//
// Public modules
pub mod channel;
pub mod engine;
pub mod error;
pub mod holder;
pub mod model;
pub mod settings;
pub mod ui;

// Re-export primary types for ergonomic use.
pub use channel::{HostEvent, UiChannel, UiEvent};
pub use engine::{EngineSettings, NativeOptimizer, TextMode, TokenOptimizer};
pub use error::{SettingsError, TokenOptimizationError};
pub use holder::ConfigHolder;
pub use model::optimization_config::{CompressionLevel, ConfigPatch, OptimizationConfig, ThemeColors};
pub use model::optimization_stats::{BatchResult, OptimizationStats};
pub use settings::SettingsStore;
