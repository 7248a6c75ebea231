use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use rmcp::model::{CallToolRequestParams, ErrorCode};
use rmcp::service::ServiceExt;
use rmcp::transport::TokioChildProcess;
use rmcp::ServiceError;
use serde_json::{json, Value};
use tokio::process::Command;

fn locate_server_bin() -> Result<PathBuf> {
    if let Some(path) = option_env!("CARGO_BIN_EXE_token-optimization-mcp") {
        return Ok(PathBuf::from(path));
    }

    // `.../target/{debug|release}/deps/<test>` -> `.../target/{debug|release}/token-optimization-mcp`
    let exe = std::env::current_exe()?;
    let candidate = exe
        .parent()
        .and_then(|p| p.parent())
        .map(|dir| dir.join("token-optimization-mcp"))
        .context("failed to resolve target directory")?;
    if candidate.exists() {
        return Ok(candidate);
    }
    anyhow::bail!("failed to locate token-optimization-mcp binary")
}

fn call(name: &'static str, arguments: Value) -> CallToolRequestParams {
    CallToolRequestParams {
        meta: None,
        name: name.into(),
        arguments: arguments.as_object().cloned(),
        task: None,
    }
}

fn error_code(result: Result<rmcp::model::CallToolResult, ServiceError>) -> Result<ErrorCode> {
    match result {
        Err(ServiceError::McpError(err)) => Ok(err.code),
        Err(other) => Err(other).context("transport failure instead of a tool error"),
        Ok(ok) => anyhow::bail!("expected an error, got {ok:?}"),
    }
}

#[tokio::test]
async fn stdio_server_lists_tools_and_reports_errors() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let settings = dir.path().join("settings.json");
    std::fs::write(
        &settings,
        r#"{"mcpServers":{"token-optimization":{"config":{"optimization":{"compressionLevel":"Aggressive"}}}}}"#,
    )?;

    let mut cmd = Command::new(locate_server_bin()?);
    cmd.arg("--settings").arg(&settings);
    cmd.env("RUST_LOG", "warn");

    let transport = TokioChildProcess::new(cmd).context("spawn mcp server")?;
    let service = tokio::time::timeout(Duration::from_secs(10), ().serve(transport))
        .await
        .context("timeout starting MCP server")??;

    let server_name = service
        .peer_info()
        .map(|info| info.server_info.name.clone())
        .context("missing server info")?;
    assert_eq!(server_name, "token-optimization-server");

    let tools = tokio::time::timeout(Duration::from_secs(10), service.list_all_tools())
        .await
        .context("timeout listing tools")??;
    let names: Vec<&str> = tools.iter().map(|tool| tool.name.as_ref()).collect();
    for expected in [
        "configure_optimization",
        "optimize_batch",
        "compress_data",
        "add_abbreviation",
        "add_stop_word",
        "get_performance_stats",
        "get_cache_stats",
        "clear_cache",
    ] {
        assert!(names.contains(&expected), "missing tool {expected}: {names:?}");
    }

    let unknown = service
        .call_tool(call("nonexistent_tool", json!({})))
        .await;
    assert_eq!(error_code(unknown)?, ErrorCode::METHOD_NOT_FOUND);

    let empty = service
        .call_tool(call("optimize_batch", json!({"requests": []})))
        .await;
    assert_eq!(error_code(empty)?, ErrorCode::INVALID_REQUEST);

    let compressed = tokio::time::timeout(
        Duration::from_secs(10),
        service.call_tool(call("compress_data", json!({"content": "hello world"}))),
    )
    .await
    .context("timeout calling compress_data")??;
    assert_ne!(compressed.is_error, Some(true));
    let text = compressed
        .content
        .first()
        .and_then(|c| c.as_text())
        .map(|t| t.text.as_str())
        .context("compress_data returned no text")?;
    let stats: Value = serde_json::from_str(text)?;
    assert_eq!(stats["original_count"], 11);

    service.cancel().await?;
    Ok(())
}
