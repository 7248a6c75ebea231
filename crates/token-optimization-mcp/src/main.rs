// Rust guideline compliant 2026-02-13

mod lifecycle;
mod tools;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use rmcp::handler::server::tool::ToolCallContext;
use rmcp::model::*;
use rmcp::service::{RequestContext, RoleServer};
use rmcp::{transport::stdio, ErrorData as McpError, ServerHandler, ServiceExt};
use token_optimization::settings::{default_settings_path, SETTINGS_PATH_ENV};
use token_optimization::{
    ConfigHolder, EngineSettings, HostEvent, NativeOptimizer, SettingsStore, TokenOptimizer,
    UiChannel,
};
use tokio::sync::broadcast;

use crate::lifecycle::{CloseReason, Lifecycle};
use crate::tools::TokenOptimizationServer;

const SERVER_NAME: &str = "token-optimization-server";

/// MCP server exposing token optimization tools over stdio.
#[derive(Parser, Debug)]
#[command(name = "token-optimization-mcp", version, about)]
struct Args {
    /// Host settings file holding the optimization section.
    #[arg(long, env = SETTINGS_PATH_ENV)]
    settings: Option<PathBuf>,

    /// Log filter (e.g. `info`, `token_optimization=debug`). Overrides RUST_LOG.
    #[arg(long)]
    log_level: Option<String>,
}

impl ServerHandler for TokenOptimizationServer {
    fn get_info(&self) -> ServerInfo {
        let mut server_info = Implementation::from_build_env();
        server_info.name = SERVER_NAME.into();
        ServerInfo {
            instructions: Some(
                "Token Optimization MCP Server: compress prompts and batches of requests, manage abbreviations and stop words, and tune the optimizer. Call configure_optimization without arguments to get the settings panel.".into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info,
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult::with_all_items(self.tool_router.list_all()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        log::debug!("tool call: {}", request.name);
        self.ensure_known_tool(&request.name)?;
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}

fn init_logging(filter: Option<&str>) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if let Some(filter) = filter {
        builder.parse_filters(filter);
    }
    builder.target(env_logger::Target::Stderr).init();
}

/// SIGINT/SIGTERM listeners, registered as soon as this is built.
///
/// Build it before the transport connects so a signal during the handshake
/// still runs the close sequence instead of the default disposition.
struct ShutdownSignals {
    #[cfg(unix)]
    interrupt: Option<tokio::signal::unix::Signal>,
    #[cfg(unix)]
    terminate: Option<tokio::signal::unix::Signal>,
}

impl ShutdownSignals {
    fn install() -> Self {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let listen = |kind: SignalKind, name: &str| {
                signal(kind)
                    .map_err(|err| log::warn!("cannot listen for {name}: {err}"))
                    .ok()
            };
            Self {
                interrupt: listen(SignalKind::interrupt(), "SIGINT"),
                terminate: listen(SignalKind::terminate(), "SIGTERM"),
            }
        }
        #[cfg(not(unix))]
        {
            Self {}
        }
    }

    /// Resolve with the name of the first signal received.
    async fn recv(&mut self) -> &'static str {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = next_signal(self.interrupt.as_mut()) => "SIGINT",
                _ = next_signal(self.terminate.as_mut()) => "SIGTERM",
            }
        }
        #[cfg(not(unix))]
        {
            if let Err(err) = tokio::signal::ctrl_c().await {
                log::warn!("cannot listen for SIGINT: {err}");
                std::future::pending::<()>().await;
            }
            "SIGINT"
        }
    }
}

#[cfg(unix)]
async fn next_signal(listener: Option<&mut tokio::signal::unix::Signal>) {
    if let Some(listener) = listener {
        if listener.recv().await.is_some() {
            return;
        }
    }
    std::future::pending::<()>().await
}

/// Log every host event for the control panel on stderr until the channel closes.
///
/// Panels embedding the library subscribe to the [`UiChannel`] directly; the
/// standalone binary has no panel of its own, so its stats stream ends here.
async fn relay_host_events(
    mut events: broadcast::Receiver<HostEvent>,
    mut sink: impl FnMut(&str),
) {
    loop {
        match events.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(line) => sink(&line),
                Err(err) => log::warn!("cannot encode host event: {err}"),
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                log::debug!("host event relay skipped {skipped} event(s)");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Serve until the transport ends or a signal arrives, then close.
async fn run(args: Args) -> anyhow::Result<()> {
    let mut signals = ShutdownSignals::install();

    let settings_path = args.settings.unwrap_or_else(default_settings_path);
    log::info!("using settings file {}", settings_path.display());
    let holder = Arc::new(ConfigHolder::open(SettingsStore::new(settings_path)));
    let engine: Arc<dyn TokenOptimizer> = Arc::new(NativeOptimizer::with_settings(
        EngineSettings::from(&holder.config()),
    ));
    let lifecycle = Lifecycle::new(Arc::clone(&engine));

    let ui = UiChannel::new();
    tokio::spawn(relay_host_events(ui.subscribe(), |line| {
        log::info!("panel update: {line}")
    }));

    let server = TokenOptimizationServer::new(engine, holder, ui);
    let started = tokio::select! {
        started = server.serve(stdio()) => started,
        name = signals.recv() => {
            let reason = CloseReason::Signal(name);
            lifecycle.close(&reason);
            log::debug!("final phase: {:?}", lifecycle.phase());
            return Ok(());
        }
    };
    let service = match started {
        Ok(service) => service,
        Err(err) => {
            lifecycle.close(&CloseReason::StartupFailed(err.to_string()));
            return Err(err).context("failed to start the MCP stdio transport");
        }
    };
    lifecycle.mark_ready();

    // Dropping the running service when a signal wins cancels the transport.
    let reason = tokio::select! {
        outcome = service.waiting() => match outcome {
            Ok(_) => CloseReason::TransportClosed,
            Err(err) => CloseReason::TransportFailed(err.to_string()),
        },
        name = signals.recv() => CloseReason::Signal(name),
    };
    lifecycle.close(&reason);
    log::debug!("final phase: {:?}", lifecycle.phase());

    if reason.is_failure() {
        anyhow::bail!("token optimization server stopped: {reason}");
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.log_level.as_deref());

    let code = match run(args).await {
        Ok(()) => 0,
        Err(err) => {
            log::error!("{err:#}");
            1
        }
    };
    // The stdin reader parks a blocking thread that cannot be cancelled, so
    // dropping the runtime would wait for the client to close stdin.
    std::process::exit(code);
}
