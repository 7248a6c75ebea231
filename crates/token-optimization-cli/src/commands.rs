// Rust guideline compliant 2026-02-13

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::json;
use token_optimization::channel::parse_ui_message;
use token_optimization::{
    CompressionLevel, ConfigHolder, ConfigPatch, EngineSettings, NativeOptimizer, SettingsStore,
    TextMode, TokenOptimizer,
};

/// Options of the `optimize` subcommand.
#[derive(Debug, Default, Clone)]
pub struct OptimizeOptions {
    pub lines: bool,
    pub lossless: bool,
    pub level: Option<CompressionLevel>,
}

fn print_json(out: &mut impl Write, value: &serde_json::Value) -> Result<()> {
    writeln!(out, "{}", serde_json::to_string_pretty(value)?)?;
    Ok(())
}

/// Print the effective config and theme.
pub fn run_show(store: SettingsStore, out: &mut impl Write) -> Result<()> {
    let path = store.path().display().to_string();
    let holder = ConfigHolder::open(store);
    print_json(
        out,
        &json!({
            "settings": path,
            "config": holder.config(),
            "theme": holder.theme(),
        }),
    )
}

/// Merge `patch` into the settings file and print the resulting config.
pub fn run_set(store: SettingsStore, patch: &ConfigPatch, out: &mut impl Write) -> Result<()> {
    if patch.is_empty() {
        bail!("nothing to set; pass at least one of --compression-level, --batch-size, --window-size, --semantic-mode");
    }
    let holder = ConfigHolder::open(store);
    let config = holder
        .update_settings(patch)
        .context("rejected settings update")?;
    print_json(out, &serde_json::to_value(&config)?)
}

/// Render the control panel to `target`, or to `out` when no target is given.
pub fn run_panel(store: SettingsStore, target: Option<&Path>, out: &mut impl Write) -> Result<()> {
    let html = ConfigHolder::open(store).render_panel();
    match target {
        Some(path) => {
            fs::write(path, html)
                .with_context(|| format!("failed to write panel to '{}'", path.display()))?;
            log::info!("panel written to {}", path.display());
        }
        None => out.write_all(html.as_bytes())?,
    }
    Ok(())
}

/// Apply a raw control panel message and print the resulting config.
pub fn run_apply_message(store: SettingsStore, raw: &str, out: &mut impl Write) -> Result<()> {
    let event = parse_ui_message(raw.trim()).context("invalid control panel message")?;
    let holder = ConfigHolder::open(store);
    let config = holder
        .apply_ui_event(&event)
        .context("rejected control panel message")?;
    print_json(out, &serde_json::to_value(&config)?)
}

/// Optimize `input` with an engine built from the effective config.
///
/// Single-text runs print `{optimized, stats}`; `--lines` prints a batch result.
pub fn run_optimize(
    store: SettingsStore,
    input: &str,
    options: &OptimizeOptions,
    out: &mut impl Write,
) -> Result<()> {
    let holder = ConfigHolder::open(store);
    let mut settings = EngineSettings::from(&holder.config());
    if let Some(level) = options.level {
        settings.compression_level = level;
    }
    if options.lossless {
        settings.semantic_mode = false;
    }
    let engine = NativeOptimizer::with_settings(settings);

    if options.lines {
        let requests: Vec<String> = input
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect();
        let result = engine.optimize_batch(&requests)?;
        return print_json(out, &serde_json::to_value(&result)?);
    }

    let mode = options.lossless.then_some(TextMode::Lossless);
    let (optimized, stats) = engine.compress(input, mode)?;
    print_json(out, &json!({ "optimized": optimized, "stats": stats }))
}
