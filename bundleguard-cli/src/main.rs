//! bundleguard
//!
//! Packages a browser bundle for one user and one machine, with a
//! time-limited license key baked in.
//!
//! Usage:
//!   bundleguard pack ./extension --user alice --days 7
//!   bundleguard machine-id
//!   bundleguard verify <key>

use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use bundleguard_cli::Cli;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let ok = bundleguard_cli::run(&cli, &mut std::io::stdout().lock())?;
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
