//! Messages exchanged between the control panel and its host.
//!
//! Both directions are JSON objects tagged by `type`, matching the script
//! emitted by [`crate::ui::render_config_panel`].
//
// Rust guideline compliant 2026-02-13

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::model::optimization_config::ConfigPatch;
use crate::model::optimization_stats::OptimizationStats;

/// Number of host events buffered per subscriber before the oldest are dropped.
const CHANNEL_CAPACITY: usize = 64;

/// Message posted by the control panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum UiEvent {
    /// A control changed; apply in memory only.
    UpdateConfig { config: ConfigPatch },
    /// The save button was pressed; apply and persist.
    SaveSettings { config: ConfigPatch },
}

impl UiEvent {
    pub fn config(&self) -> &ConfigPatch {
        match self {
            UiEvent::UpdateConfig { config } | UiEvent::SaveSettings { config } => config,
        }
    }
}

/// Message pushed by the host to the control panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostEvent {
    UpdateStats { stats: OptimizationStats },
}

/// Parse a raw panel message.
pub fn parse_ui_message(raw: &str) -> Result<UiEvent, serde_json::Error> {
    serde_json::from_str(raw)
}

/// In-process fan-out of host events to any number of panels.
///
/// Publishing never blocks and succeeds even when nobody listens.
#[derive(Debug, Clone)]
pub struct UiChannel {
    sender: broadcast::Sender<HostEvent>,
}

impl Default for UiChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl UiChannel {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        self.sender.subscribe()
    }

    /// Publish a host event; returns the number of panels that received it.
    pub fn publish(&self, event: HostEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Convenience for the only host event the panel understands today.
    pub fn publish_stats(&self, stats: &OptimizationStats) -> usize {
        self.publish(HostEvent::UpdateStats {
            stats: stats.clone(),
        })
    }
}
