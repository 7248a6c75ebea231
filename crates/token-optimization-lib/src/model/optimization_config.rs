// Rust guideline compliant 2026-02-13

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TokenOptimizationError;
use crate::model::optimization_stats::OptimizationStats;

/// Accepted values for `batchSize`, mirrored in the tool schema.
pub const BATCH_SIZE_RANGE: RangeInclusive<u64> = 1..=1000;
/// Accepted values for `windowSize` in milliseconds, mirrored in the tool schema.
pub const WINDOW_SIZE_RANGE: RangeInclusive<u64> = 100..=5000;

/// Named tuning preset for the optimizer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompressionLevel {
    Aggressive,
    #[default]
    Balanced,
    Conservative,
}

impl CompressionLevel {
    /// All levels in display order.
    pub const ALL: [CompressionLevel; 3] = [
        CompressionLevel::Aggressive,
        CompressionLevel::Balanced,
        CompressionLevel::Conservative,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Aggressive => "Aggressive",
            Self::Balanced => "Balanced",
            Self::Conservative => "Conservative",
        }
    }
}

impl fmt::Display for CompressionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompressionLevel {
    type Err = TokenOptimizationError;

    /// Case-insensitive parse of a level name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aggressive" => Ok(Self::Aggressive),
            "balanced" => Ok(Self::Balanced),
            "conservative" => Ok(Self::Conservative),
            other => Err(TokenOptimizationError::InvalidConfig(format!(
                "unknown compression level '{other}'; expected Aggressive, Balanced or Conservative"
            ))),
        }
    }
}

/// Optimizer tuning parameters plus the most recently observed stats.
///
/// JSON keys are camelCase to match the host settings document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationConfig {
    /// Batching window in milliseconds.
    pub window_size: u64,
    pub batch_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_mode: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression_level: Option<CompressionLevel>,
    /// Latest stats snapshot. Held in memory only, never persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<OptimizationStats>,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            window_size: 1000,
            batch_size: 10,
            semantic_mode: Some(true),
            compression_level: Some(CompressionLevel::Balanced),
            stats: None,
        }
    }
}

impl OptimizationConfig {
    /// Effective semantic mode (`true` when unset).
    pub fn semantic_mode(&self) -> bool {
        self.semantic_mode.unwrap_or(true)
    }

    /// Effective compression level (`Balanced` when unset).
    pub fn compression_level(&self) -> CompressionLevel {
        self.compression_level.unwrap_or_default()
    }

    /// The user-tunable part of this config as a fully populated patch.
    pub fn to_patch(&self) -> ConfigPatch {
        ConfigPatch {
            compression_level: Some(self.compression_level()),
            batch_size: Some(self.batch_size),
            window_size: Some(self.window_size),
            semantic_mode: Some(self.semantic_mode()),
        }
    }
}

/// Partial update of the user-tunable fields of [`OptimizationConfig`].
///
/// Absent fields are left untouched by [`ConfigPatch::apply_to`] and are not
/// written when the patch is serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression_level: Option<CompressionLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_mode: Option<bool>,
}

impl ConfigPatch {
    pub fn is_empty(&self) -> bool {
        self.compression_level.is_none()
            && self.batch_size.is_none()
            && self.window_size.is_none()
            && self.semantic_mode.is_none()
    }

    /// Check numeric bounds of the present fields.
    pub fn validate(&self) -> Result<(), TokenOptimizationError> {
        if let Some(batch_size) = self.batch_size {
            if !BATCH_SIZE_RANGE.contains(&batch_size) {
                return Err(TokenOptimizationError::InvalidConfig(format!(
                    "batchSize must be within {}..={}, got {batch_size}",
                    BATCH_SIZE_RANGE.start(),
                    BATCH_SIZE_RANGE.end()
                )));
            }
        }
        if let Some(window_size) = self.window_size {
            if !WINDOW_SIZE_RANGE.contains(&window_size) {
                return Err(TokenOptimizationError::InvalidConfig(format!(
                    "windowSize must be within {}..={}, got {window_size}",
                    WINDOW_SIZE_RANGE.start(),
                    WINDOW_SIZE_RANGE.end()
                )));
            }
        }
        Ok(())
    }

    /// Overwrite exactly the present fields of `config`.
    pub fn apply_to(&self, config: &mut OptimizationConfig) {
        if let Some(level) = self.compression_level {
            config.compression_level = Some(level);
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(window_size) = self.window_size {
            config.window_size = window_size;
        }
        if let Some(semantic_mode) = self.semantic_mode {
            config.semantic_mode = Some(semantic_mode);
        }
    }
}

/// Colour per compression level used by the control panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeColors {
    #[serde(alias = "Aggressive")]
    pub aggressive: String,
    #[serde(alias = "Balanced")]
    pub balanced: String,
    #[serde(alias = "Conservative")]
    pub conservative: String,
}

impl Default for ThemeColors {
    fn default() -> Self {
        Self {
            aggressive: String::from("rgb(234, 67, 53)"),
            balanced: String::from("rgb(66, 133, 244)"),
            conservative: String::from("rgb(52, 168, 83)"),
        }
    }
}

impl ThemeColors {
    pub fn color_for(&self, level: CompressionLevel) -> &str {
        match level {
            CompressionLevel::Aggressive => &self.aggressive,
            CompressionLevel::Balanced => &self.balanced,
            CompressionLevel::Conservative => &self.conservative,
        }
    }
}
