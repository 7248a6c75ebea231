use std::fs;

use serde_json::json;
use token_optimization::channel::parse_ui_message;
use token_optimization::{
    CompressionLevel, ConfigHolder, EngineSettings, HostEvent, NativeOptimizer, SettingsStore,
    TokenOptimizer, UiChannel,
};

#[test]
fn panel_save_message_reaches_settings_file_and_engine() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("cline_mcp_settings.json");
    fs::write(
        &path,
        serde_json::to_string_pretty(&json!({
            "mcpServers": {"token-optimization": {"command": "token-optimization-mcp"}}
        }))?,
    )?;

    let holder = ConfigHolder::open(SettingsStore::new(&path));
    let engine = NativeOptimizer::with_settings(EngineSettings::from(&holder.config()));

    let event = parse_ui_message(
        r#"{"type":"saveSettings","config":{"compressionLevel":"Aggressive","batchSize":4,"windowSize":600,"semanticMode":true}}"#,
    )?;
    let config = holder.apply_ui_event(&event)?;
    engine.reconfigure(&EngineSettings::from(&config))?;

    let stored: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
    let section = &stored["mcpServers"]["token-optimization"]["config"]["optimization"];
    assert_eq!(section["compressionLevel"], "Aggressive");
    assert_eq!(section["batchSize"], 4);
    assert_eq!(section["ui"]["showStats"], true);
    assert_eq!(
        stored["mcpServers"]["token-optimization"]["command"],
        "token-optimization-mcp"
    );

    let reopened = ConfigHolder::open(SettingsStore::new(&path));
    assert_eq!(reopened.config().compression_level(), CompressionLevel::Aggressive);
    assert_eq!(reopened.config().window_size, 600);

    assert_eq!(engine.settings().compression_level, CompressionLevel::Aggressive);
    Ok(())
}

#[tokio::test]
async fn optimization_stats_flow_to_holder_and_panel() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let holder = ConfigHolder::open(SettingsStore::new(dir.path().join("missing.json")));
    let engine = NativeOptimizer::new(10, 1000, true);
    let channel = UiChannel::new();
    let mut panel = channel.subscribe();

    let stats = engine.optimize_text("Please read the documentation for the configuration")?;
    holder.record_stats(&stats);
    channel.publish_stats(&stats);

    assert!(stats.optimized_count < stats.original_count);
    assert_eq!(holder.config().stats.as_ref(), Some(&stats));
    assert_eq!(panel.recv().await?, HostEvent::UpdateStats { stats });
    assert!(!dir.path().join("missing.json").exists());
    Ok(())
}
