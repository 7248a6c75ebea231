// Rust guideline compliant 2026-02-13

use std::sync::Arc;

use rmcp::handler::server::{router::tool::ToolRouter, wrapper::Parameters};
use rmcp::model::{CallToolResult, Content, ErrorCode};
use rmcp::{schemars, ErrorData as McpError};
use serde::Deserialize;
use serde_json::{json, Value};
use token_optimization::{
    CompressionLevel, ConfigHolder, ConfigPatch, EngineSettings, OptimizationStats, TextMode,
    TokenOptimizationError, TokenOptimizer, UiChannel,
};

/// Compression preset accepted by `configure_optimization`.
#[derive(Debug, Clone, Copy, Deserialize, schemars::JsonSchema)]
pub enum LevelArg {
    Aggressive,
    Balanced,
    Conservative,
}

impl From<LevelArg> for CompressionLevel {
    fn from(level: LevelArg) -> Self {
        match level {
            LevelArg::Aggressive => CompressionLevel::Aggressive,
            LevelArg::Balanced => CompressionLevel::Balanced,
            LevelArg::Conservative => CompressionLevel::Conservative,
        }
    }
}

/// Rewrite mode accepted by `compress_data`.
#[derive(Debug, Clone, Copy, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ModeArg {
    Semantic,
    Lossless,
}

impl From<ModeArg> for TextMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Semantic => TextMode::Semantic,
            ModeArg::Lossless => TextMode::Lossless,
        }
    }
}

/// Input for `configure_optimization`. All fields absent renders the control panel.
#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfigureInput {
    #[schemars(description = "Compression preset: Aggressive, Balanced or Conservative")]
    pub compression_level: Option<LevelArg>,
    #[schemars(description = "Requests per batch chunk", range(min = 1, max = 1000))]
    pub batch_size: Option<u64>,
    #[schemars(description = "Incremental-update window in milliseconds", range(min = 100, max = 5000))]
    pub window_size: Option<u64>,
    #[schemars(description = "Enable lossy semantic rewriting")]
    pub semantic_mode: Option<bool>,
}

impl ConfigureInput {
    fn into_patch(self) -> ConfigPatch {
        ConfigPatch {
            compression_level: self.compression_level.map(Into::into),
            batch_size: self.batch_size,
            window_size: self.window_size,
            semantic_mode: self.semantic_mode,
        }
    }
}

/// Per-call batch tuning sent alongside `optimize_batch`.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchConfigInput {
    #[schemars(description = "Batching window in milliseconds", range(min = 100, max = 5000))]
    pub window_size: u64,
    #[schemars(description = "Requests per batch chunk", range(min = 1, max = 1000))]
    pub batch_size: u64,
}

/// Input for `optimize_batch`.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct OptimizeBatchInput {
    #[schemars(description = "Texts to optimize; output keeps this order")]
    pub requests: Vec<String>,
    #[schemars(description = "Optional batch tuning")]
    pub config: Option<BatchConfigInput>,
}

/// Input for `compress_data`.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CompressInput {
    #[schemars(description = "Text to compress")]
    pub content: String,
    #[schemars(description = "semantic (default when semantic mode is on) or lossless")]
    pub mode: Option<ModeArg>,
}

/// Input for `add_abbreviation`.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AbbreviationInput {
    #[schemars(description = "Phrase to replace")]
    pub full: String,
    #[schemars(description = "Replacement, not longer than the phrase")]
    pub abbr: String,
}

/// Input for `add_stop_word`.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct StopWordInput {
    #[schemars(description = "Single word dropped by Balanced and Aggressive rewrites")]
    pub word: String,
}

/// Result of a tool before it is wrapped into protocol content.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// Pretty-printed JSON text.
    Json(Value),
    /// Plain report text.
    Text(String),
    /// HTML control panel.
    Markup(String),
}

impl ToolOutput {
    pub fn into_call_result(self) -> Result<CallToolResult, McpError> {
        let text = match self {
            ToolOutput::Json(value) => serde_json::to_string_pretty(&value).map_err(|err| {
                McpError::internal_error(format!("failed to serialize tool result: {err}"), None)
            })?,
            ToolOutput::Text(text) | ToolOutput::Markup(text) => text,
        };
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }
}

/// Map an engine or validation error to a protocol error.
///
/// Out-of-range configuration is a parameter problem; everything else the
/// engine rejects is an invalid request carrying the engine's message.
pub fn domain_error(err: TokenOptimizationError) -> McpError {
    match err {
        TokenOptimizationError::InvalidConfig(_) => McpError::invalid_params(err.to_string(), None),
        _ => McpError::invalid_request(err.to_string(), None),
    }
}

fn internal_error(err: impl std::fmt::Display) -> McpError {
    McpError::internal_error(err.to_string(), None)
}

fn success() -> ToolOutput {
    ToolOutput::Json(json!({ "success": true }))
}

/// MCP façade over the optimizer engine and the settings holder.
#[derive(Clone)]
pub struct TokenOptimizationServer {
    engine: Arc<dyn TokenOptimizer>,
    holder: Arc<ConfigHolder>,
    ui: UiChannel,
    pub tool_router: ToolRouter<Self>,
}

#[rmcp::tool_router]
impl TokenOptimizationServer {
    /// Construct a new server instance.
    pub fn new(engine: Arc<dyn TokenOptimizer>, holder: Arc<ConfigHolder>, ui: UiChannel) -> Self {
        Self {
            engine,
            holder,
            ui,
            tool_router: Self::tool_router(),
        }
    }

    #[rmcp::tool(
        description = "Update token optimization settings; with no arguments, return the HTML control panel"
    )]
    async fn configure_optimization(
        &self,
        Parameters(input): Parameters<ConfigureInput>,
    ) -> Result<CallToolResult, McpError> {
        self.configure_impl(input)?.into_call_result()
    }

    #[rmcp::tool(description = "Optimize the token usage of several requests at once")]
    async fn optimize_batch(
        &self,
        Parameters(input): Parameters<OptimizeBatchInput>,
    ) -> Result<CallToolResult, McpError> {
        self.optimize_batch_impl(input).await?.into_call_result()
    }

    #[rmcp::tool(description = "Compress a text to reduce token usage and report the savings")]
    async fn compress_data(
        &self,
        Parameters(input): Parameters<CompressInput>,
    ) -> Result<CallToolResult, McpError> {
        self.compress_impl(input)?.into_call_result()
    }

    #[rmcp::tool(description = "Register a custom abbreviation")]
    async fn add_abbreviation(
        &self,
        Parameters(input): Parameters<AbbreviationInput>,
    ) -> Result<CallToolResult, McpError> {
        self.engine
            .add_abbreviation(&input.full, &input.abbr)
            .map_err(domain_error)?;
        success().into_call_result()
    }

    #[rmcp::tool(description = "Register a custom stop word")]
    async fn add_stop_word(
        &self,
        Parameters(input): Parameters<StopWordInput>,
    ) -> Result<CallToolResult, McpError> {
        self.engine.add_stop_word(&input.word).map_err(domain_error)?;
        success().into_call_result()
    }

    #[rmcp::tool(description = "Report optimizer performance counters")]
    async fn get_performance_stats(&self) -> Result<CallToolResult, McpError> {
        let report = self.engine.get_performance_stats().map_err(domain_error)?;
        ToolOutput::Text(report).into_call_result()
    }

    #[rmcp::tool(description = "Report result cache usage")]
    async fn get_cache_stats(&self) -> Result<CallToolResult, McpError> {
        let report = self.engine.get_cache_stats().map_err(domain_error)?;
        ToolOutput::Text(report).into_call_result()
    }

    #[rmcp::tool(description = "Drop all cached optimization results")]
    async fn clear_cache(&self) -> Result<CallToolResult, McpError> {
        self.engine.clear_cache().map_err(domain_error)?;
        success().into_call_result()
    }
}

impl TokenOptimizationServer {
    /// Fail with `METHOD_NOT_FOUND` unless `name` is a registered tool.
    pub fn ensure_known_tool(&self, name: &str) -> Result<(), McpError> {
        if self.tool_router.list_all().iter().any(|tool| tool.name == name) {
            Ok(())
        } else {
            Err(McpError::new(
                ErrorCode::METHOD_NOT_FOUND,
                format!("Unknown tool: {name}"),
                None,
            ))
        }
    }

    fn configure_impl(&self, input: ConfigureInput) -> Result<ToolOutput, McpError> {
        let patch = input.into_patch();
        if patch.is_empty() {
            log::debug!("configure_optimization without arguments; rendering panel");
            return Ok(ToolOutput::Markup(self.holder.render_panel()));
        }

        let config = self.holder.update_settings(&patch).map_err(domain_error)?;
        self.engine
            .reconfigure(&EngineSettings::from(&config))
            .map_err(domain_error)?;
        log::info!(
            "optimization settings updated: level={}, batch_size={}, window_size={}, semantic_mode={}",
            config.compression_level(),
            config.batch_size,
            config.window_size,
            config.semantic_mode()
        );
        Ok(ToolOutput::Json(json!({ "status": "success", "config": config })))
    }

    async fn optimize_batch_impl(&self, input: OptimizeBatchInput) -> Result<ToolOutput, McpError> {
        if let Some(batch_config) = &input.config {
            ConfigPatch {
                batch_size: Some(batch_config.batch_size),
                window_size: Some(batch_config.window_size),
                ..Default::default()
            }
            .validate()
            .map_err(domain_error)?;
            log::debug!(
                "optimize_batch per-call config (batch_size={}, window_size={}) uses engine settings",
                batch_config.batch_size,
                batch_config.window_size
            );
        }

        let engine = Arc::clone(&self.engine);
        let requests = input.requests;
        let result = tokio::task::spawn_blocking(move || engine.optimize_batch(&requests))
            .await
            .map_err(|err| internal_error(format!("batch worker failed: {err}")))?
            .map_err(domain_error)?;

        self.observe(&result.stats);
        let value = serde_json::to_value(&result).map_err(internal_error)?;
        Ok(ToolOutput::Json(value))
    }

    fn compress_impl(&self, input: CompressInput) -> Result<ToolOutput, McpError> {
        let stats = self
            .engine
            .optimize_text_with_mode(&input.content, input.mode.map(Into::into))
            .map_err(domain_error)?;
        self.observe(&stats);
        let value = serde_json::to_value(&stats).map_err(internal_error)?;
        Ok(ToolOutput::Json(value))
    }

    /// Record stats on the holder and push them to any open panel.
    fn observe(&self, stats: &OptimizationStats) {
        self.holder.record_stats(stats);
        let delivered = self.ui.publish_stats(stats);
        log::debug!("stats published to {delivered} panel(s)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use token_optimization::{NativeOptimizer, SettingsStore};

    struct Fixture {
        _dir: tempfile::TempDir,
        settings: PathBuf,
        server: TokenOptimizationServer,
        ui: UiChannel,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let settings = dir.path().join("settings.json");
        fs::write(
            &settings,
            r#"{"mcpServers":{"token-optimization":{"config":{"optimization":{"batchSize":10}}}}}"#,
        )
        .unwrap();
        let holder = Arc::new(ConfigHolder::open(SettingsStore::new(&settings)));
        let engine: Arc<dyn TokenOptimizer> =
            Arc::new(NativeOptimizer::with_settings(EngineSettings::from(&holder.config())));
        let ui = UiChannel::new();
        let server = TokenOptimizationServer::new(engine, holder, ui.clone());
        Fixture {
            _dir: dir,
            settings,
            server,
            ui,
        }
    }

    fn json_of(output: ToolOutput) -> Value {
        match output {
            ToolOutput::Json(value) => value,
            other => panic!("expected JSON output, got {other:?}"),
        }
    }

    #[test]
    fn catalogue_lists_all_tools() {
        let fx = fixture();
        let mut names: Vec<String> = fx
            .server
            .tool_router
            .list_all()
            .into_iter()
            .map(|tool| tool.name.to_string())
            .collect();
        names.sort();
        assert_eq!(
            names,
            [
                "add_abbreviation",
                "add_stop_word",
                "clear_cache",
                "compress_data",
                "configure_optimization",
                "get_cache_stats",
                "get_performance_stats",
                "optimize_batch",
            ]
        );
    }

    #[test]
    fn unknown_tool_is_method_not_found() {
        let fx = fixture();
        let err = fx.server.ensure_known_tool("nonexistent_tool").unwrap_err();
        assert_eq!(err.code, ErrorCode::METHOD_NOT_FOUND);
        assert_eq!(err.message, "Unknown tool: nonexistent_tool");
        assert!(fx.server.ensure_known_tool("compress_data").is_ok());
    }

    #[test]
    fn configure_without_arguments_renders_panel_and_keeps_file() {
        let fx = fixture();
        let before = fs::read_to_string(&fx.settings).unwrap();
        match fx.server.configure_impl(ConfigureInput::default()).unwrap() {
            ToolOutput::Markup(html) => assert!(html.contains("btn-Balanced")),
            other => panic!("expected markup, got {other:?}"),
        }
        assert_eq!(fs::read_to_string(&fx.settings).unwrap(), before);
    }

    #[test]
    fn configure_overwrites_only_given_fields() {
        let fx = fixture();
        let value = json_of(
            fx.server
                .configure_impl(ConfigureInput {
                    batch_size: Some(50),
                    ..Default::default()
                })
                .unwrap(),
        );
        assert_eq!(value["status"], "success");
        assert_eq!(value["config"]["batchSize"], 50);
        assert_eq!(value["config"]["windowSize"], 1000);
        assert_eq!(value["config"]["compressionLevel"], "Balanced");

        let stored: Value = serde_json::from_str(&fs::read_to_string(&fx.settings).unwrap()).unwrap();
        assert_eq!(
            stored["mcpServers"]["token-optimization"]["config"]["optimization"]["batchSize"],
            50
        );
    }

    #[test]
    fn configure_rejects_out_of_range_values() {
        let fx = fixture();
        let err = fx
            .server
            .configure_impl(ConfigureInput {
                window_size: Some(50),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
    }

    #[test]
    fn compress_hello_world_reports_counts() {
        let fx = fixture();
        let mut panel = fx.ui.subscribe();
        let value = json_of(
            fx.server
                .compress_impl(CompressInput {
                    content: "hello world".into(),
                    mode: None,
                })
                .unwrap(),
        );
        assert_eq!(value["original_count"], 11);
        let optimized = value["optimized_count"].as_u64().unwrap();
        assert!(optimized <= 11);
        let savings = value["savings_percent"].as_f64().unwrap();
        assert!((savings - (11.0 - optimized as f64) / 11.0 * 100.0).abs() < 1e-9);
        assert!(panel.try_recv().is_ok());
    }

    #[tokio::test]
    async fn batch_keeps_order_and_records_stats() {
        let fx = fixture();
        let requests: Vec<String> = ["first request", "the second one", "third"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let value = json_of(
            fx.server
                .optimize_batch_impl(OptimizeBatchInput {
                    requests,
                    config: Some(BatchConfigInput {
                        window_size: 1000,
                        batch_size: 2,
                    }),
                })
                .await
                .unwrap(),
        );
        let optimized = value["optimized_requests"].as_array().unwrap();
        assert_eq!(optimized.len(), 3);
        assert_eq!(optimized[0], "first request");
        assert_eq!(optimized[2], "third");
        assert!(value["batch_id"].as_str().unwrap().starts_with("batch-"));
        assert!(fx.server.holder.config().stats.is_some());
    }

    #[tokio::test]
    async fn empty_batch_is_an_invalid_request() {
        let fx = fixture();
        let err = fx
            .server
            .optimize_batch_impl(OptimizeBatchInput {
                requests: Vec::new(),
                config: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_REQUEST);
        assert_eq!(err.message, "Empty request batch");
    }

    #[tokio::test]
    async fn stop_word_then_compress_succeeds() {
        let fx = fixture();
        let result = fx
            .server
            .add_stop_word(Parameters(StopWordInput { word: "the".into() }))
            .await
            .unwrap();
        assert!(!result.content.is_empty());
        assert!(fx
            .server
            .compress_impl(CompressInput {
                content: "the cat".into(),
                mode: None,
            })
            .is_ok());
    }

    #[tokio::test]
    async fn empty_abbreviation_is_an_invalid_request() {
        let fx = fixture();
        let err = fx
            .server
            .add_abbreviation(Parameters(AbbreviationInput {
                full: String::new(),
                abbr: "x".into(),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_REQUEST);
    }

    #[test]
    fn json_output_is_pretty_printed_text() {
        let result = success().into_call_result().unwrap();
        let text = result.content[0].as_text().unwrap().text.clone();
        assert_eq!(text, "{\n  \"success\": true\n}");
    }
}
