// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Deskwerk command-line tool.
//
// Entry point. Initialises logging, loads the desktop config, opens a
// context and runs one subcommand.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use deskwerk_core::config::DesktopConfig;
use deskwerk_core::error::{DeskwerkError, Result};
use deskwerk_runtime::VirtualDesktops;

use commands::Output;

#[derive(Parser, Debug)]
#[command(name = "deskwerk", version, about = "Inspect and drive Windows virtual desktops")]
struct Cli {
    /// Path to a JSON desktop config
    #[arg(long, env = "DESKWERK_CONFIG")]
    config: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Drive an in-memory shell (needs the `simulate` feature)
    #[arg(long, default_value_t = false)]
    simulate: bool,

    #[command(subcommand)]
    command: Command,
}

/// Desktops are selected by position (0-based) or by id.
#[derive(Subcommand, Debug)]
enum Command {
    /// Host build and interface layout
    Info,
    /// List every desktop
    List,
    /// Show the current desktop
    Current,
    /// Create a desktop
    Create {
        #[arg(long)]
        name: Option<String>,
    },
    /// Switch to a desktop
    Switch { desktop: String },
    /// Remove a desktop
    Remove {
        desktop: String,
        /// Desktop to switch to if the removed one is current
        #[arg(long)]
        fallback: Option<String>,
    },
    /// Rename a desktop
    Rename { desktop: String, name: String },
    /// Move a desktop to a new position
    Move { desktop: String, index: usize },
    /// Set the wallpaper of one desktop, or of all of them
    Wallpaper {
        path: String,
        #[arg(long)]
        desktop: Option<String>,
    },
    /// Move a top-level window to a desktop
    MoveWindow {
        /// Window handle, decimal or 0x-prefixed hex
        #[arg(value_parser = commands::parse_window)]
        window: isize,
        desktop: String,
    },
    /// Print desktop events until interrupted
    Watch,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("deskwerk: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => DesktopConfig::load_or_default(path)?,
        None => DesktopConfig::default(),
    };
    let desktops = open(config, cli.simulate)?;
    tracing::debug!(?desktops, "context opened");

    let result = commands::dispatch(&desktops, &Output::new(cli.json), cli.command);
    desktops.shutdown();
    result
}

fn open(config: DesktopConfig, simulate: bool) -> Result<VirtualDesktops> {
    if simulate {
        return simulated(config);
    }
    let desktops = VirtualDesktops::new(config);
    if !desktops.is_supported() {
        return Err(DeskwerkError::Unsupported {
            build: desktops.build_version(),
        });
    }
    Ok(desktops)
}

#[cfg(feature = "simulate")]
fn simulated(config: DesktopConfig) -> Result<VirtualDesktops> {
    use std::sync::Arc;

    use deskwerk_core::types::BuildVersion;
    use deskwerk_interop::fake::FakeHost;

    tracing::info!("using the in-memory shell");
    let host = FakeHost::with_desktops(
        BuildVersion::new(10, 0, 22621, 2215),
        &["Main", "Work", "Media"],
    );
    Ok(VirtualDesktops::with_host(Arc::new(host), config))
}

#[cfg(not(feature = "simulate"))]
fn simulated(_config: DesktopConfig) -> Result<VirtualDesktops> {
    Err(DeskwerkError::Config(
        "this build has no in-memory shell; rebuild with --features simulate".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_remove_with_fallback() {
        let cli = Cli::try_parse_from(["deskwerk", "remove", "2", "--fallback", "0"]).unwrap();
        match cli.command {
            Command::Remove { desktop, fallback } => {
                assert_eq!(desktop, "2");
                assert_eq!(fallback.as_deref(), Some("0"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_hex_window_handles() {
        let cli = Cli::try_parse_from(["deskwerk", "move-window", "0x1f4", "1"]).unwrap();
        assert!(matches!(cli.command, Command::MoveWindow { window: 500, .. }));
    }
}
