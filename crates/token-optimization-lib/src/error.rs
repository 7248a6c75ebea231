// Rust guideline compliant 2026-02-13

use std::path::PathBuf;

use thiserror::Error;

/// Domain error raised by a [`TokenOptimizer`](crate::engine::TokenOptimizer).
///
/// The MCP façade translates every variant into a protocol "invalid request"
/// error carrying the `Display` message, so messages are written for the client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenOptimizationError {
    #[error("Empty request batch")]
    EmptyBatch,

    #[error("Batch size exceeds limit ({limit}): got {len} requests")]
    BatchTooLarge { len: usize, limit: usize },

    #[error("invalid {kind}: {reason}")]
    InvalidTerm { kind: &'static str, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("optimizer has been disposed")]
    Disposed,
}

/// Failures inside the settings store.
///
/// These never escape `SettingsStore::load` / `SettingsStore::save`; they are
/// logged and the operation degrades to defaults or a no-op.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to access settings file '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("settings file '{}' is not valid JSON: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("settings file has no `mcpServers.{0}` entry")]
    MissingServerEntry(String),

    #[error("settings key `{0}` is not a JSON object")]
    NotAnObject(&'static str),
}
