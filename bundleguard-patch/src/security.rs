//! Security pass: inspection guards for the bundle's own pages.
//!
//! Content scripts get the guard prepended; markup gets references to a
//! guard script and a selection-lock stylesheet written at the bundle root.
//! The guard acts only when the page is served from the bundle's internal
//! scheme, so content scripts running inside external sites keep working.
//!
//! Markup references external files instead of inline code because the
//! manifest's extension-page policy (`script-src 'self'`) blocks inline
//! scripts.

use crate::asset::{self, AssetKind, ResourceHost};
use crate::manifest::{BundleManifest, ALL_URLS, MANIFEST_FILE};
use crate::options::PatchOptions;
use crate::report::{AssetOutcome, PatchReport};
use crate::PatchPass;
use serde_json::Value;
use std::path::Path;

/// Marker identifying a guarded script.
pub const SCRIPT_SENTINEL: &str = "bundleguardSecurityGuard";
/// Marker identifying guarded markup.
pub const MARKUP_SENTINEL: &str = "id=\"bundleguard-security\"";
/// Guard script written at the bundle root.
pub const GUARD_SCRIPT: &str = "security.js";
/// Selection-lock stylesheet, relative to the bundle root.
pub const GUARD_STYLESHEET: &str = "popup/security.css";
/// Policy applied to the bundle's extension pages.
pub const EXTENSION_PAGES_CSP: &str = "script-src 'self'; object-src 'self'";

const GUARD_TEMPLATE: &str = include_str!("../assets/security_guard.js");
const STYLESHEET: &str = include_str!("../assets/security.css");

pub struct SecurityPass<'a> {
    options: &'a PatchOptions,
}

impl<'a> SecurityPass<'a> {
    #[must_use]
    pub fn new(options: &'a PatchOptions) -> Self {
        Self { options }
    }

    /// The guard script, scoped to the configured internal scheme.
    #[must_use]
    pub fn guard_script(&self) -> String {
        GUARD_TEMPLATE
            .replace(
                "{{INTERNAL_SCHEME}}",
                &Value::from(self.options.internal_scheme.as_str()).to_string(),
            )
            .replace(
                "{{DEVTOOLS_THRESHOLD}}",
                &self.options.devtools_threshold_px.to_string(),
            )
    }

    /// Markup hook; `prefix` climbs from the page back to the bundle root.
    #[must_use]
    pub fn markup_hook(prefix: &str) -> String {
        format!(
            "<script {MARKUP_SENTINEL} src=\"{prefix}{GUARD_SCRIPT}\"></script>\n\
             <link rel=\"stylesheet\" href=\"{prefix}{GUARD_STYLESHEET}\">"
        )
    }

    /// Configured content scripts followed by those the manifest declares,
    /// without duplicates.
    fn content_scripts(&self, manifest: Option<&BundleManifest>) -> Vec<String> {
        let declared = manifest.map(BundleManifest::content_script_paths).unwrap_or_default();
        let mut scripts: Vec<String> = Vec::new();
        for path in self.options.content_scripts.iter().chain(declared.iter()) {
            let path = path.trim_start_matches('/').to_string();
            if !scripts.contains(&path) {
                scripts.push(path);
            }
        }
        scripts
    }
}

impl PatchPass for SecurityPass<'_> {
    fn name(&self) -> &'static str {
        "security"
    }

    fn apply(&self, root: &Path) -> PatchReport {
        let mut report = PatchReport::new(self.name());

        let manifest = match BundleManifest::load(root) {
            Ok(m) => Some(m),
            Err(e) => {
                report.record(MANIFEST_FILE, AssetOutcome::Skipped(e));
                None
            }
        };

        let guard = self.guard_script();
        for rel in self.content_scripts(manifest.as_ref()) {
            let outcome = asset::bundle_path(root, &rel)
                .and_then(|path| asset::patch_file(&path, SCRIPT_SENTINEL, &guard))
                .unwrap_or_else(AssetOutcome::Skipped);
            report.record(rel, outcome);
        }

        for path in asset::collect(root, AssetKind::Markup) {
            let hook = Self::markup_hook(&asset::root_prefix(root, &path));
            let outcome = asset::patch_file(&path, MARKUP_SENTINEL, &hook)
                .unwrap_or_else(AssetOutcome::Skipped);
            report.record(asset::relative(root, &path), outcome);
        }

        let outcome = asset::write_generated(&root.join(GUARD_STYLESHEET), STYLESHEET)
            .unwrap_or_else(AssetOutcome::Skipped);
        report.record(GUARD_STYLESHEET, outcome);

        let outcome = asset::write_generated(&root.join(GUARD_SCRIPT), &guard)
            .unwrap_or_else(AssetOutcome::Skipped);
        report.record(GUARD_SCRIPT, outcome);

        if let Some(mut manifest) = manifest {
            manifest.declare_resource(GUARD_SCRIPT, &[ALL_URLS]);
            manifest.set_extension_pages_csp(EXTENSION_PAGES_CSP);
            let outcome = match manifest.save() {
                Ok(true) => AssetOutcome::Patched,
                Ok(false) => AssetOutcome::AlreadyPatched,
                Err(e) => AssetOutcome::Skipped(e),
            };
            report.record(MANIFEST_FILE, outcome);
        }

        report.log_summary();
        report
    }
}
