//! HTML control panel for the optimizer settings.
//!
//! The panel is a self-contained HTML fragment with an inline script. Initial
//! state comes from the rendered markup; the script talks to its host through
//! `window.postMessage` using the messages described in [`crate::channel`]:
//!
//! - every control change posts `{type: "updateConfig", config}`,
//! - the save button posts `{type: "saveSettings", config}`,
//! - an incoming `{type: "updateStats", stats}` refreshes the stats region.
//
// Rust guideline compliant 2026-02-13

use std::fmt::Write as _;

use crate::model::optimization_config::{
    CompressionLevel, OptimizationConfig, ThemeColors, BATCH_SIZE_RANGE, WINDOW_SIZE_RANGE,
};

/// Element id of the container that carries the active level.
pub const PANEL_ID: &str = "tokenOptimizationPanel";
/// Element id of the stats region refreshed by `updateStats`.
pub const STATS_ID: &str = "statsContent";

const PANEL_SCRIPT: &str = r#"<script>
(function () {
  const panel = document.getElementById('tokenOptimizationPanel');
  let activeLevel = panel.dataset.level;

  function getConfigValues() {
    return {
      compressionLevel: activeLevel,
      batchSize: parseInt(document.getElementById('batchSize').value, 10),
      windowSize: parseInt(document.getElementById('windowSize').value, 10),
      semanticMode: document.getElementById('semanticMode').checked
    };
  }

  function updateCompressionLevel(level) {
    activeLevel = level;
    panel.dataset.level = level;
    document.querySelectorAll('.compression-btn').forEach(function (btn) {
      btn.style.opacity = btn.dataset.level === level ? '1' : '0.7';
    });
    window.postMessage({ type: 'updateConfig', config: getConfigValues() }, '*');
  }

  function saveSettings() {
    window.postMessage({ type: 'saveSettings', config: getConfigValues() }, '*');
    const note = document.createElement('div');
    note.textContent = 'Settings saved';
    note.className = 'save-notification';
    document.body.appendChild(note);
    setTimeout(function () { note.remove(); }, 3000);
  }

  function updateStats(stats) {
    const region = document.getElementById('statsContent');
    region.innerHTML = '';
    [
      ['Original size', stats.original_count],
      ['Optimized size', stats.optimized_count],
      ['Savings', Number(stats.savings_percent).toFixed(2) + '%'],
      ['Cache hits', stats.cache_hits],
      ['Incremental updates', stats.incremental_updates]
    ].forEach(function (row) {
      const cell = document.createElement('div');
      cell.textContent = row[0] + ': ' + row[1];
      region.appendChild(cell);
    });
  }

  document.querySelectorAll('.compression-btn').forEach(function (btn) {
    btn.addEventListener('click', function () { updateCompressionLevel(btn.dataset.level); });
  });
  ['batchSize', 'windowSize', 'semanticMode'].forEach(function (id) {
    document.getElementById(id).addEventListener('change', function () {
      updateCompressionLevel(activeLevel);
    });
  });
  document.getElementById('saveSettings').addEventListener('click', saveSettings);
  window.addEventListener('message', function (event) {
    if (event.data && event.data.type === 'updateStats') {
      updateStats(event.data.stats);
    }
  });

  window.updateCompressionLevel = updateCompressionLevel;
  window.getConfigValues = getConfigValues;
  window.saveSettings = saveSettings;
  updateCompressionLevel(activeLevel);
})();
</script>
"#;

const PANEL_STYLE: &str = r#"<style>
#tokenOptimizationPanel { padding: 20px; font-family: Arial, sans-serif; }
#tokenOptimizationPanel .compression-btn { padding: 10px 20px; border: none; border-radius: 5px; color: white; cursor: pointer; transition: opacity 0.2s; }
#tokenOptimizationPanel .options { background: #f5f5f5; padding: 15px; border-radius: 5px; }
#tokenOptimizationPanel #compressionStats { margin: 20px 0; padding: 15px; background: #f0f7ff; border-radius: 5px; }
#tokenOptimizationPanel #saveSettings { padding: 10px 20px; background-color: #4CAF50; color: white; border: none; border-radius: 5px; cursor: pointer; }
.save-notification { position: fixed; bottom: 20px; right: 20px; padding: 10px 20px; background-color: #4CAF50; color: white; border-radius: 5px; animation: fadeOut 3s forwards; }
@keyframes fadeOut { from { opacity: 1; } to { opacity: 0; } }
</style>
"#;

/// Render the control panel for `config`, colouring level buttons from `theme`.
///
/// Pure and deterministic: the same inputs always produce the same markup.
pub fn render_config_panel(config: &OptimizationConfig, theme: &ThemeColors) -> String {
    let active = config.compression_level();
    let mut html = String::with_capacity(PANEL_SCRIPT.len() + PANEL_STYLE.len() + 2048);
    html.push_str(PANEL_STYLE);

    // `write!` into a String cannot fail.
    let _ = writeln!(
        html,
        r#"<div id="{PANEL_ID}" data-level="{}">"#,
        escape_html(active.as_str())
    );
    html.push_str("  <h3>Token Optimization Settings</h3>\n");
    html.push_str("  <div class=\"levels\">\n    <label>Compression level</label>\n");
    for level in CompressionLevel::ALL {
        render_level_button(&mut html, level, theme, level == active);
    }
    html.push_str("  </div>\n");

    html.push_str("  <div class=\"options\">\n");
    let _ = writeln!(
        html,
        r#"    <label>Batch size <input type="number" id="batchSize" value="{}" min="{}" max="{}"/></label>"#,
        config.batch_size,
        BATCH_SIZE_RANGE.start(),
        BATCH_SIZE_RANGE.end()
    );
    let _ = writeln!(
        html,
        r#"    <label>Window size (ms) <input type="number" id="windowSize" value="{}" min="{}" max="{}" step="100"/></label>"#,
        config.window_size,
        WINDOW_SIZE_RANGE.start(),
        WINDOW_SIZE_RANGE.end()
    );
    let _ = writeln!(
        html,
        r#"    <label><input type="checkbox" id="semanticMode"{}/> Semantic mode</label>"#,
        if config.semantic_mode() { " checked" } else { "" }
    );
    html.push_str("  </div>\n");

    let _ = writeln!(
        html,
        r#"  <div id="compressionStats"><h4>Compression stats</h4><div id="{STATS_ID}">Waiting for data...</div></div>"#
    );
    html.push_str("  <button id=\"saveSettings\" type=\"button\">Save settings</button>\n");
    html.push_str("</div>\n");
    html.push_str(PANEL_SCRIPT);
    html
}

fn render_level_button(html: &mut String, level: CompressionLevel, theme: &ThemeColors, active: bool) {
    let name = level.as_str();
    let _ = writeln!(
        html,
        r#"    <button id="btn-{name}" class="compression-btn" data-level="{name}" type="button" style="background-color: {}; opacity: {};">{name}</button>"#,
        escape_html(theme.color_for(level)),
        if active { "1" } else { "0.7" }
    );
}

/// Escape text for use in HTML content and double- or single-quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
