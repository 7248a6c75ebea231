//! Process exit paths, driven with raw newline-delimited JSON-RPC so the
//! client side can keep stdin open while the server is signalled.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

fn locate_server_bin() -> Result<PathBuf> {
    if let Some(path) = option_env!("CARGO_BIN_EXE_token-optimization-mcp") {
        return Ok(PathBuf::from(path));
    }
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

struct Server {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    _dir: tempfile::TempDir,
}

impl Server {
    fn spawn() -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let mut child = Command::new(locate_server_bin()?)
            .arg("--settings")
            .arg(dir.path().join("absent.json"))
            .env("RUST_LOG", "warn")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .context("failed to spawn token-optimization-mcp")?;
        let stdin = child.stdin.take().context("missing stdin")?;
        let stdout = BufReader::new(child.stdout.take().context("missing stdout")?);
        Ok(Self {
            child,
            stdin: Some(stdin),
            stdout,
            _dir: dir,
        })
    }

    async fn send(&mut self, message: &Value) -> Result<()> {
        let mut line = serde_json::to_vec(message)?;
        line.push(b'\n');
        let stdin = self.stdin.as_mut().context("stdin already closed")?;
        stdin.write_all(&line).await?;
        stdin.flush().await?;
        Ok(())
    }

    /// Read lines until the response with `id` arrives.
    async fn response(&mut self, id: u64) -> Result<Value> {
        let mut line = String::new();
        loop {
            line.clear();
            let read = tokio::time::timeout(Duration::from_secs(10), self.stdout.read_line(&mut line))
                .await
                .context("timeout waiting for server response")??;
            anyhow::ensure!(read > 0, "server closed stdout before answering {id}");
            let value: Value = serde_json::from_str(line.trim())
                .with_context(|| format!("non-JSON line on stdout: {line}"))?;
            if value["id"] == json!(id) {
                return Ok(value);
            }
        }
    }

    async fn initialize(&mut self) -> Result<Value> {
        self.send(&json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "clientInfo": {"name": "shutdown-test", "version": "0.0.0"}
        }}))
        .await?;
        self.response(1).await
    }

    async fn handshake(&mut self) -> Result<()> {
        self.initialize().await?;
        self.send(&json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
            .await?;
        // A round trip proves the server reached its serving loop.
        self.send(&json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}))
            .await?;
        self.response(2).await?;
        Ok(())
    }

    #[cfg(unix)]
    fn terminate(&self) -> Result<()> {
        let pid = self.child.id().context("server already reaped")?;
        let pid = libc::pid_t::try_from(pid)?;
        // SAFETY: plain kill(2) on a child process this test owns.
        let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
        anyhow::ensure!(rc == 0, "kill failed: {}", std::io::Error::last_os_error());
        Ok(())
    }

    async fn exit_status(&mut self) -> Result<ExitStatus> {
        tokio::time::timeout(Duration::from_secs(5), self.child.wait())
            .await
            .context("server still running 5s later")?
            .map_err(Into::into)
    }
}

#[tokio::test]
async fn closing_stdin_exits_cleanly() -> Result<()> {
    let mut server = Server::spawn()?;
    server.handshake().await?;

    drop(server.stdin.take());
    let status = server.exit_status().await?;
    assert!(status.success(), "server exited with {status}");
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn sigterm_while_serving_exits_with_stdin_open() -> Result<()> {
    let mut server = Server::spawn()?;
    server.handshake().await?;

    server.terminate()?;
    let status = server.exit_status().await?;
    assert!(status.success(), "server exited with {status}");
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn sigterm_during_handshake_runs_the_close_sequence() -> Result<()> {
    let mut server = Server::spawn()?;
    // No `initialized` notification: the transport is still connecting.
    let init = server.initialize().await?;
    assert_eq!(init["result"]["serverInfo"]["name"], "token-optimization-server");

    server.terminate()?;
    let status = server.exit_status().await?;
    // Killed by the default disposition there would be no exit code at all.
    assert_eq!(status.code(), Some(0), "server exited with {status}");
    Ok(())
}
