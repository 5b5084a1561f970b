//! The packaging run.
//!
//! Stages run strictly in order, once each:
//! resolve identity, issue token, copy bundle, security patch, key
//! injection, archive, finalize. Copy and archive failures end the run;
//! patch passes record per-asset problems and never do. The working copy is
//! owned by the run's [`RunContext`] and removed however the run ends.

use crate::archive::archive_dir;
use crate::config::PackConfig;
use crate::context::RunContext;
use crate::copy::copy_tree;
use crate::docs::{render_key_sheet, render_readme, KEY_FILE, README_FILE};
use crate::error::{PackError, PackResult};
use crate::launcher::{launcher_name, render_launcher};
use bundleguard_license::{
    Clock, Expiry, Issued, MachineIdentity, SystemClock, TokenIssuer, Verdict, Verifier,
};
use bundleguard_patch::{KeyInjectionPass, PatchPass, PatchReport, SecurityPass};
use chrono::Local;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Steps of a packaging run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ResolveIdentity,
    IssueToken,
    CopyBundle,
    SecurityPatch,
    KeyInjection,
    Archive,
    Finalize,
}

impl Stage {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ResolveIdentity => "resolve-identity",
            Self::IssueToken => "issue-token",
            Self::CopyBundle => "copy-bundle",
            Self::SecurityPatch => "security-patch",
            Self::KeyInjection => "key-injection",
            Self::Archive => "archive",
            Self::Finalize => "finalize",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to package and for whom.
#[derive(Debug, Clone)]
pub struct PackRequest {
    /// Unpacked bundle to package; never modified.
    pub bundle: PathBuf,
    pub output_dir: PathBuf,
    pub user: String,
    pub expiry: Expiry,
    /// Bind to this identity instead of resolving the current machine's.
    pub machine: Option<MachineIdentity>,
    /// Run the security pass. Key injection always runs.
    pub security_patch: bool,
}

impl PackRequest {
    pub fn new(bundle: impl Into<PathBuf>, output_dir: impl Into<PathBuf>, user: &str) -> Self {
        Self {
            bundle: bundle.into(),
            output_dir: output_dir.into(),
            user: user.to_string(),
            expiry: Expiry::default(),
            machine: None,
            security_patch: true,
        }
    }
}

/// Result of a successful run.
#[derive(Debug)]
pub struct PackOutcome {
    /// `<output>/<product>_<user>_<YYYY-MM-DD>.zip`
    pub archive: PathBuf,
    /// README written next to the archive.
    pub readme: PathBuf,
    /// Key sheet written next to the archive.
    pub key_sheet: PathBuf,
    pub issued: Issued,
    /// Verdict of verifying the new token against the bound identity.
    pub self_check: Verdict,
    /// One report per patch pass that ran.
    pub reports: Vec<PatchReport>,
}

pub struct Packager<C = SystemClock> {
    config: PackConfig,
    clock: C,
}

impl Packager<SystemClock> {
    #[must_use]
    pub fn new(config: PackConfig) -> Self {
        Self {
            config,
            clock: SystemClock,
        }
    }
}

impl<C: Clock> Packager<C> {
    pub fn with_clock(config: PackConfig, clock: C) -> Self {
        Self { config, clock }
    }

    #[must_use]
    pub fn config(&self) -> &PackConfig {
        &self.config
    }

    /// Runs the full pipeline for one request.
    ///
    /// # Errors
    ///
    /// [`PackError::BundleNotFound`] and [`PackError::OutputInsideBundle`]
    /// before any work is done; otherwise copy, archive and I/O errors from
    /// the failing stage. The working directory is removed in every case.
    pub fn run(&self, request: &PackRequest) -> PackResult<PackOutcome> {
        if !request.bundle.is_dir() {
            return Err(PackError::BundleNotFound(request.bundle.clone()));
        }
        check_output_dir(&request.bundle, &request.output_dir)?;
        let ctx = RunContext::create(
            &request.output_dir,
            &self.config.product_name,
            &request.user,
            self.clock.now(),
        )?;
        info!(
            "Packaging {:?} for user '{}' (run {})",
            request.bundle,
            ctx.user(),
            ctx.run_id()
        );

        stage(Stage::ResolveIdentity);
        let identity = match &request.machine {
            Some(id) => {
                info!("Using provided machine ID: {}", id);
                id.clone()
            }
            None => {
                let id = MachineIdentity::resolve();
                info!("Using current machine ID: {}", id);
                id
            }
        };

        stage(Stage::IssueToken);
        let issued = TokenIssuer::with_clock(&self.clock).issue(&request.expiry, &identity);
        info!("Issued key valid until {}", issued.readable_expiry());
        let self_check = self.self_check(&issued);

        stage(Stage::CopyBundle);
        let copied = copy_tree(&request.bundle, &ctx.bundle_dir())?;
        debug!("copied {} files", copied);

        let options = &self.config.patch;
        let mut reports = Vec::new();
        if request.security_patch {
            stage(Stage::SecurityPatch);
            reports.push(SecurityPass::new(options).apply(&ctx.bundle_dir()));
        } else {
            info!("Skipping security patch");
        }

        stage(Stage::KeyInjection);
        reports.push(KeyInjectionPass::new(&issued.token, options).apply(&ctx.bundle_dir()));

        stage(Stage::Archive);
        let readme_text = render_readme(ctx.product(), &launcher_name(ctx.product()), &issued);
        let key_text = render_key_sheet(&issued, ctx.started_at());
        stage_package(&ctx, &readme_text, &key_text)?;
        let archive = archive_package(&ctx, &issued)?;

        stage(Stage::Finalize);
        let stem = archive
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let readme = ctx.output_dir().join(format!("{stem}.README.txt"));
        let key_sheet = ctx.output_dir().join(format!("{stem}.key.txt"));
        write(&readme, &readme_text)?;
        write(&key_sheet, &key_text)?;

        info!("Package created: {:?}", archive);
        Ok(PackOutcome {
            archive,
            readme,
            key_sheet,
            issued,
            self_check,
            reports,
        })
    }

    fn self_check(&self, issued: &Issued) -> Verdict {
        let verdict = Verifier::with_clock(&self.clock).verify(&issued.token, &issued.identity);
        if verdict.is_valid() {
            info!("Self-check: key {}", verdict);
        } else {
            warn!("Self-check failed, key is {}", verdict);
        }
        verdict
    }
}

/// Refuses an output directory at or below the bundle; the bundle copy
/// would pick up its own working directory.
fn check_output_dir(bundle: &Path, output_dir: &Path) -> PackResult<()> {
    let bundle = bundle
        .canonicalize()
        .map_err(|e| PackError::io(bundle, e))?;
    let output = resolve(output_dir)?;
    if output.starts_with(&bundle) {
        return Err(PackError::OutputInsideBundle { bundle, output });
    }
    Ok(())
}

/// Canonical form of a path that may not exist yet: the nearest existing
/// ancestor is canonicalized and the missing tail appended again.
fn resolve(path: &Path) -> PackResult<PathBuf> {
    let absolute = std::path::absolute(path).map_err(|e| PackError::io(path, e))?;
    let mut existing = absolute.as_path();
    let mut missing = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => break,
        }
    }
    let mut resolved = existing
        .canonicalize()
        .map_err(|e| PackError::io(existing, e))?;
    resolved.extend(missing.iter().rev());
    Ok(resolved)
}

/// Launcher and documents go next to the bundle copy.
fn stage_package(ctx: &RunContext, readme: &str, key: &str) -> PackResult<()> {
    let package = ctx.package_dir();
    let bundle_name = ctx
        .bundle_dir()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    write(
        &package.join(launcher_name(ctx.product())),
        &render_launcher(ctx.product(), &bundle_name),
    )?;
    write(&package.join(README_FILE), readme)?;
    write(&package.join(KEY_FILE), key)
}

/// Zips the staged package inside the working directory, then moves the
/// archive to its final name in the output directory.
fn archive_package(ctx: &RunContext, issued: &Issued) -> PackResult<PathBuf> {
    let staged = ctx.work_dir().join(format!("{}.zip", ctx.product()));
    let files = archive_dir(&ctx.package_dir(), &staged)?;
    debug!("archived {} files", files);

    let date = issued.expires_at.with_timezone(&Local).format("%Y-%m-%d");
    let target = ctx
        .output_dir()
        .join(format!("{}_{}_{date}.zip", ctx.product(), ctx.user()));
    fs::rename(&staged, &target).map_err(|e| PackError::io(&target, e))?;
    Ok(target)
}

fn stage(stage: Stage) {
    info!("[{}]", stage);
}

fn write(path: &Path, contents: &str) -> PackResult<()> {
    fs::write(path, contents).map_err(|e| PackError::io(path, e))
}
