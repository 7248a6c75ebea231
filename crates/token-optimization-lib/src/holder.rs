//! Shared, in-memory optimization config backed by the settings store.
//
// Rust guideline compliant 2026-02-13

use parking_lot::RwLock;

use crate::channel::UiEvent;
use crate::error::TokenOptimizationError;
use crate::model::optimization_config::{ConfigPatch, OptimizationConfig, ThemeColors};
use crate::model::optimization_stats::OptimizationStats;
use crate::settings::SettingsStore;
use crate::ui::render_config_panel;

/// Effective optimizer config plus the store it is persisted to.
///
/// User settings and observed stats are updated through separate methods:
/// [`ConfigHolder::update_settings`] persists, [`ConfigHolder::record_stats`]
/// only touches memory.
#[derive(Debug)]
pub struct ConfigHolder {
    config: RwLock<OptimizationConfig>,
    theme: RwLock<ThemeColors>,
    store: SettingsStore,
}

impl ConfigHolder {
    /// Build the effective config: defaults overlaid with the stored overrides.
    ///
    /// Stored values outside the accepted ranges are ignored with a warning.
    pub fn open(store: SettingsStore) -> Self {
        let mut config = OptimizationConfig::default();
        let stored = store.load();
        match stored.validate() {
            Ok(()) => stored.apply_to(&mut config),
            Err(err) => log::warn!(
                "ignoring stored optimization settings in {}: {err}",
                store.path().display()
            ),
        }
        let theme = store.load_theme();
        Self {
            config: RwLock::new(config),
            theme: RwLock::new(theme),
            store,
        }
    }

    /// Snapshot of the current config.
    pub fn config(&self) -> OptimizationConfig {
        self.config.read().clone()
    }

    pub fn theme(&self) -> ThemeColors {
        self.theme.read().clone()
    }

    pub fn store(&self) -> &SettingsStore {
        &self.store
    }

    /// Merge `patch` into the config and persist the user-tunable fields.
    ///
    /// Stats are left untouched. A failed write is logged by the store; the
    /// in-memory config is updated regardless.
    ///
    /// # Errors
    /// [`TokenOptimizationError::InvalidConfig`] when a value is out of range;
    /// nothing is changed in that case.
    pub fn update_settings(
        &self,
        patch: &ConfigPatch,
    ) -> Result<OptimizationConfig, TokenOptimizationError> {
        let updated = self.apply_in_memory(patch)?;
        self.store.save(&updated.to_patch(), &self.theme());
        Ok(updated)
    }

    /// Remember the stats of the latest optimization call.
    pub fn record_stats(&self, stats: &OptimizationStats) {
        self.config.write().stats = Some(stats.clone());
    }

    /// Render the control panel for the current config and theme.
    pub fn render_panel(&self) -> String {
        render_config_panel(&self.config(), &self.theme())
    }

    /// Apply a control panel message.
    ///
    /// `updateConfig` changes memory only; `saveSettings` also persists.
    pub fn apply_ui_event(
        &self,
        event: &UiEvent,
    ) -> Result<OptimizationConfig, TokenOptimizationError> {
        match event {
            UiEvent::UpdateConfig { config } => self.apply_in_memory(config),
            UiEvent::SaveSettings { config } => self.update_settings(config),
        }
    }

    fn apply_in_memory(
        &self,
        patch: &ConfigPatch,
    ) -> Result<OptimizationConfig, TokenOptimizationError> {
        patch.validate()?;
        let mut config = self.config.write();
        patch.apply_to(&mut config);
        Ok(config.clone())
    }
}
