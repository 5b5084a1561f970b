//! Command surface of the `bundleguard` binary.

use anyhow::{Context, Result};
use bundleguard_license::{
    Expiry, Issued, MachineIdentity, TokenIssuer, Verifier, MAX_VALID_DAYS,
};
use bundleguard_pack::{PackConfig, PackRequest, Packager};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "bundleguard")]
#[command(about = "Package browser bundles with machine-bound license keys")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (default: <config dir>/bundleguard/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Patch a bundle with a new key and package it for one user
    Pack {
        /// Unpacked bundle directory (containing manifest.json)
        bundle: PathBuf,

        /// Directory for the archive and documents
        #[arg(short, long, default_value = "dist")]
        output: PathBuf,

        #[command(flatten)]
        key: KeyArgs,

        /// User the package is for; part of the archive name
        #[arg(short, long, default_value = "user")]
        user: String,

        /// Skip the security patch (the license check is still injected)
        #[arg(long)]
        no_patch: bool,
    },

    /// Print this machine's identity and its hash
    MachineId,

    /// Issue a key without packaging
    Issue {
        #[command(flatten)]
        key: KeyArgs,
    },

    /// Check a key against a machine
    Verify {
        /// The key, `secret.expiry.machine.salt.signature`
        token: String,

        /// Machine identity to check against (default: this machine)
        #[arg(short, long)]
        machine: Option<String>,
    },
}

/// Expiry and binding options shared by `pack` and `issue`.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct KeyArgs {
    /// Days the key stays valid (default from config, else 5)
    #[arg(short, long, value_parser = clap::value_parser!(i64).range(1..=MAX_VALID_DAYS))]
    pub days: Option<i64>,

    /// Expiry as "YYYY-MM-DD" or "YYYY-MM-DD HH:MM:SS"; overrides --days
    #[arg(short, long)]
    pub expiration: Option<String>,

    /// Bind to this machine identity instead of the current machine's
    #[arg(short, long)]
    pub machine: Option<String>,
}

impl KeyArgs {
    /// Expiry text wins; `--days` (or the configured default) is then only
    /// the fallback for text that does not parse.
    #[must_use]
    pub fn expiry(&self, default_days: i64) -> Expiry {
        let days = self.days.unwrap_or(default_days);
        match &self.expiration {
            Some(text) => Expiry::text(text.clone(), days),
            None => Expiry::Days(days),
        }
    }

    /// Explicit identity, if one was given.
    #[must_use]
    pub fn identity(&self) -> Option<MachineIdentity> {
        self.machine.as_deref().map(MachineIdentity::new)
    }
}

/// Runs a parsed command line, printing results to `out`.
///
/// Returns `Ok(false)` when the command completed but its answer is
/// negative (an invalid key for `verify`).
///
/// # Errors
///
/// Pipeline and output errors, with context.
pub fn run<W: Write>(cli: &Cli, out: &mut W) -> Result<bool> {
    let config = PackConfig::load(cli.config.as_deref());

    match &cli.command {
        Command::Pack {
            bundle,
            output,
            key,
            user,
            no_patch,
        } => {
            let request = PackRequest {
                bundle: bundle.clone(),
                output_dir: output.clone(),
                user: user.clone(),
                expiry: key.expiry(config.default_days),
                machine: key.identity(),
                security_patch: !no_patch,
            };
            let outcome = Packager::new(config)
                .run(&request)
                .with_context(|| format!("Failed to package {}", bundle.display()))?;

            writeln!(out, "Package: {}", outcome.archive.display())?;
            for report in &outcome.reports {
                for record in report.skipped() {
                    writeln!(out, "Skipped ({}): {}", report.pass(), record.path.display())?;
                }
            }
            print_issued(out, &outcome.issued)?;
            Ok(true)
        }

        Command::MachineId => {
            let identity = MachineIdentity::resolve();
            writeln!(out, "Machine ID: {identity}")?;
            writeln!(out, "Machine hash: {}", identity.hash_prefix())?;
            Ok(true)
        }

        Command::Issue { key } => {
            let identity = key.identity().unwrap_or_else(MachineIdentity::resolve);
            let issued = TokenIssuer::new().issue(&key.expiry(config.default_days), &identity);
            print_issued(out, &issued)?;
            Ok(true)
        }

        Command::Verify { token, machine } => {
            let identity = machine
                .as_deref()
                .map_or_else(MachineIdentity::resolve, MachineIdentity::new);
            let verdict = Verifier::new().verify_str(token, &identity);
            info!("Verified against machine hash {}", identity.hash_prefix());
            writeln!(out, "Key is {verdict}")?;
            Ok(verdict.is_valid())
        }
    }
}

/// Key summary, led by a notice when the requested expiry was not used.
fn print_issued<W: Write>(out: &mut W, issued: &Issued) -> io::Result<()> {
    if let Some(text) = &issued.rejected_expiry {
        writeln!(out, "Expiration '{text}' not understood, using the fallback validity")?;
    }
    writeln!(out, "Key: {}", issued.token)?;
    writeln!(out, "Expires: {}", issued.readable_expiry())?;
    writeln!(out, "Machine ID: {}", issued.identity)
}
