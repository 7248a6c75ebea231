use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use serde_json::Value;

fn cli() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_token-optimization"))
}

fn seed_settings(dir: &tempfile::TempDir) -> Result<PathBuf> {
    let path = dir.path().join("cline_mcp_settings.json");
    fs::write(
        &path,
        r#"{"mcpServers":{"token-optimization":{"command":"token-optimization-mcp"}}}"#,
    )?;
    Ok(path)
}

/// Integration test: set -> apply-message -> show through the real binary.
#[test]
fn settings_edits_are_visible_to_show() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let settings = seed_settings(&dir)?;

    let status = Command::new(cli())
        .args(["set", "--batch-size", "64", "--compression-level", "aggressive"])
        .arg("--settings")
        .arg(&settings)
        .stdout(Stdio::null())
        .status()?;
    assert!(status.success());

    let mut child = Command::new(cli())
        .args(["apply-message", "-"])
        .arg("--settings")
        .arg(&settings)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .spawn()?;
    child
        .stdin
        .take()
        .context("missing stdin")?
        .write_all(br#"{"type":"saveSettings","config":{"windowSize":2500}}"#)?;
    assert!(child.wait()?.success());

    let output = Command::new(cli())
        .arg("show")
        .arg("--settings")
        .arg(&settings)
        .output()?;
    assert!(output.status.success());
    let shown: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(shown["config"]["batchSize"], 64);
    assert_eq!(shown["config"]["windowSize"], 2500);
    assert_eq!(shown["config"]["compressionLevel"], "Aggressive");
    Ok(())
}

#[test]
fn out_of_range_value_fails_without_touching_the_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let settings = seed_settings(&dir)?;
    let before = fs::read_to_string(&settings)?;

    let output = Command::new(cli())
        .args(["set", "--window-size", "10"])
        .arg("--settings")
        .arg(&settings)
        .output()?;
    assert!(!output.status.success());
    assert_eq!(fs::read_to_string(&settings)?, before);
    Ok(())
}

#[test]
fn optimize_reads_text_flag() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let output = Command::new(cli())
        .args(["optimize", "--text", "hello world"])
        .arg("--settings")
        .arg(dir.path().join("absent.json"))
        .output()?;
    assert!(output.status.success());
    let value: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(value["stats"]["original_count"], 11);
    Ok(())
}
