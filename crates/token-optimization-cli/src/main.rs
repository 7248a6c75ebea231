//! CLI companion to the token optimization MCP server.
//!
//! Subcommands:
//!  - `show`          : print the effective optimization config and theme.
//!  - `set`           : merge values into the settings file.
//!  - `panel`         : render the HTML control panel.
//!  - `apply-message` : apply a control panel message (`updateConfig` / `saveSettings`).
//!  - `optimize`      : run the native optimizer over text from a flag or stdin.
//!
//! Every subcommand reads the same settings file as the server: `--settings`,
//! then `TOKEN_OPTIMIZATION_SETTINGS`, then the host default location.
//
// Rust guideline compliant 2026-02-13

use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use token_optimization::settings::{default_settings_path, SETTINGS_PATH_ENV};
use token_optimization::{CompressionLevel, ConfigPatch, SettingsStore};

mod commands;

use crate::commands::{
    run_apply_message, run_optimize, run_panel, run_set, run_show, OptimizeOptions,
};

/// CLI entrypoint.
#[derive(Parser)]
#[command(
    name = "token-optimization",
    about = "Token optimization settings and local optimizer",
    version
)]
struct Cli {
    /// Host settings file holding the optimization section.
    #[arg(long, global = true, value_name = "PATH", env = SETTINGS_PATH_ENV)]
    settings: Option<PathBuf>,

    /// Subcommands
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective config (defaults overlaid with the settings file) as JSON.
    Show,

    /// Merge the given values into the settings file.
    Set(SetArgs),

    /// Render the HTML control panel.
    Panel(PanelArgs),

    /// Apply a control panel message given as JSON (`-` reads stdin).
    ApplyMessage(ApplyMessageArgs),

    /// Optimize text with the native engine and print the result as JSON.
    Optimize(OptimizeArgs),
}

/// Arguments for the `set` subcommand.
#[derive(Args, Debug)]
struct SetArgs {
    /// Aggressive, Balanced or Conservative (case-insensitive).
    #[arg(long)]
    compression_level: Option<CompressionLevel>,

    /// Requests per batch chunk (1-1000).
    #[arg(long)]
    batch_size: Option<u64>,

    /// Incremental-update window in milliseconds (100-5000).
    #[arg(long)]
    window_size: Option<u64>,

    /// Enable or disable semantic rewriting.
    #[arg(long)]
    semantic_mode: Option<bool>,
}

/// Arguments for the `panel` subcommand.
#[derive(Args, Debug)]
struct PanelArgs {
    /// Write the markup to this file instead of stdout.
    #[arg(long, short = 'o', value_name = "PATH")]
    out: Option<PathBuf>,
}

/// Arguments for the `apply-message` subcommand.
#[derive(Args, Debug)]
struct ApplyMessageArgs {
    /// Message JSON, e.g. '{"type":"saveSettings","config":{"batchSize":20}}'.
    message: String,
}

/// Arguments for the `optimize` subcommand.
#[derive(Args, Debug)]
struct OptimizeArgs {
    /// Text to optimize; stdin is read when omitted.
    #[arg(long)]
    text: Option<String>,

    /// Treat every non-empty input line as one request of a batch.
    #[arg(long)]
    lines: bool,

    /// Only clean up whitespace.
    #[arg(long)]
    lossless: bool,

    /// Override the configured compression level for this run.
    #[arg(long)]
    level: Option<CompressionLevel>,
}

fn read_stdin() -> Result<String> {
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();
    let store = SettingsStore::new(cli.settings.unwrap_or_else(default_settings_path));
    let mut stdout = io::stdout().lock();

    match cli.command {
        Commands::Show => run_show(store, &mut stdout),
        Commands::Set(args) => {
            let patch = ConfigPatch {
                compression_level: args.compression_level,
                batch_size: args.batch_size,
                window_size: args.window_size,
                semantic_mode: args.semantic_mode,
            };
            run_set(store, &patch, &mut stdout)
        }
        Commands::Panel(args) => run_panel(store, args.out.as_deref(), &mut stdout),
        Commands::ApplyMessage(args) => {
            let raw = if args.message == "-" {
                read_stdin()?
            } else {
                args.message
            };
            run_apply_message(store, &raw, &mut stdout)
        }
        Commands::Optimize(args) => {
            let input = match args.text {
                Some(text) => text,
                None => read_stdin()?,
            };
            let options = OptimizeOptions {
                lines: args.lines,
                lossless: args.lossless,
                level: args.level,
            };
            run_optimize(store, &input, &options, &mut stdout)
        }
    }
}
