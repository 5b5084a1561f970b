//! Key-injection pass: embeds the license check into the bundle.
//!
//! The pass writes a self-contained check script carrying the token,
//! registers it to run before any other background code, and references it
//! from every markup page.
//!
//! The secret is embedded split into four fragments. That only keeps the
//! token from showing up in a plain text search of the bundle; anyone reading
//! the script can reassemble it.

use crate::asset::{self, AssetKind, TextAsset};
use crate::error::PatchResult;
use crate::manifest::{Background, BundleManifest, MANIFEST_FILE};
use crate::options::PatchOptions;
use crate::report::{AssetOutcome, PatchReport};
use crate::PatchPass;
use bundleguard_license::Token;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, warn};

const CHECK_TEMPLATE: &str = include_str!("../assets/license_check.js");

pub struct KeyInjectionPass<'a> {
    token: &'a Token,
    options: &'a PatchOptions,
}

impl<'a> KeyInjectionPass<'a> {
    #[must_use]
    pub fn new(token: &'a Token, options: &'a PatchOptions) -> Self {
        Self { token, options }
    }

    /// Renders the license-check script for this token.
    #[must_use]
    pub fn check_script(&self) -> String {
        let [s0, s1, s2, s3] = secret_fragments(self.token.secret());
        let o = self.options;
        CHECK_TEMPLATE
            .replace("{{SECRET_0}}", &js_string(&s0))
            .replace("{{SECRET_1}}", &js_string(&s1))
            .replace("{{SECRET_2}}", &js_string(&s2))
            .replace("{{SECRET_3}}", &js_string(&s3))
            .replace("{{EXPIRY}}", &js_string(self.token.expiry_hex()))
            .replace("{{MACHINE_HASH}}", &js_string(self.token.machine_hash()))
            .replace("{{SALT}}", &js_string(self.token.salt()))
            .replace("{{SIGNATURE}}", &js_string(self.token.signature()))
            .replace("{{INTERNAL_SCHEME}}", &js_string(&o.internal_scheme))
            .replace("{{WARNING_DAYS}}", &o.warning_days.to_string())
            .replace("{{SUPPORT_CONTACT}}", &js_string(&o.support_contact))
    }

    /// Script tag for a page; `prefix` climbs from the page to the root.
    #[must_use]
    pub fn script_tag(&self, prefix: &str) -> String {
        format!(
            "<script src=\"{prefix}{}\"></script>",
            self.options.validation_script
        )
    }

    /// Registers the check script as the first background script, or wraps
    /// the service worker so the check is imported before it.
    fn register(&self, root: &Path, manifest: &mut BundleManifest, report: &mut PatchReport) {
        let check = self.options.validation_script.as_str();
        let wrapper = self.options.wrapper_script.as_str();

        match manifest.background() {
            Background::Absent | Background::Scripts(_) => {
                if manifest.prepend_background_script(check) {
                    debug!("registered {check} as first background script");
                }
            }
            Background::ServiceWorker { entry, .. } if entry == wrapper => {
                debug!("service worker already wrapped by {wrapper}");
            }
            Background::ServiceWorker { entry, module } => {
                let outcome = asset::bundle_path(root, wrapper)
                    .and_then(|path| {
                        asset::write_generated(&path, &render_wrapper(check, &entry, module))
                    })
                    .unwrap_or_else(AssetOutcome::Skipped);
                let written = !matches!(outcome, AssetOutcome::Skipped(_));
                report.record(wrapper, outcome);
                if written {
                    manifest.set_service_worker(wrapper);
                }
            }
            Background::Unrecognised => {
                warn!("unrecognised background declaration, {check} not registered");
            }
        }
    }

    fn inject_markup(&self, root: &Path, path: &Path) -> PatchResult<AssetOutcome> {
        let mut page = TextAsset::load(path)?;
        let tag = self.script_tag(&asset::root_prefix(root, path));
        if !asset::apply_hook(&mut page, &self.options.validation_script, &tag) {
            return Ok(AssetOutcome::AlreadyPatched);
        }
        page.save()?;
        Ok(AssetOutcome::Patched)
    }
}

impl PatchPass for KeyInjectionPass<'_> {
    fn name(&self) -> &'static str {
        "key-injection"
    }

    fn apply(&self, root: &Path) -> PatchReport {
        let mut report = PatchReport::new(self.name());
        let check = self.options.validation_script.as_str();

        let check_path = match asset::bundle_path(root, check) {
            Ok(path) => path,
            Err(e) => {
                report.record(check, AssetOutcome::Skipped(e));
                report.log_summary();
                return report;
            }
        };
        let outcome = asset::write_generated(&check_path, &self.check_script())
            .unwrap_or_else(AssetOutcome::Skipped);
        report.record(check, outcome);

        match BundleManifest::load(root) {
            Ok(mut manifest) => {
                self.register(root, &mut manifest, &mut report);
                let outcome = match manifest.save() {
                    Ok(true) => AssetOutcome::Patched,
                    Ok(false) => AssetOutcome::AlreadyPatched,
                    Err(e) => AssetOutcome::Skipped(e),
                };
                report.record(MANIFEST_FILE, outcome);
            }
            Err(e) => report.record(MANIFEST_FILE, AssetOutcome::Skipped(e)),
        }

        for path in asset::collect(root, AssetKind::Markup) {
            let outcome = self
                .inject_markup(root, &path)
                .unwrap_or_else(AssetOutcome::Skipped);
            report.record(asset::relative(root, &path), outcome);
        }

        report.log_summary();
        report
    }
}

/// Splits `secret` into four consecutive fragments of near-equal length.
#[must_use]
pub fn secret_fragments(secret: &str) -> [String; 4] {
    let chars: Vec<char> = secret.chars().collect();
    let base = chars.len() / 4;
    let extra = chars.len() % 4;
    let mut fragments: [String; 4] = Default::default();
    let mut start = 0;
    for (i, fragment) in fragments.iter_mut().enumerate() {
        let len = base + usize::from(i < extra);
        *fragment = chars[start..start + len].iter().collect();
        start += len;
    }
    fragments
}

/// Service-worker wrapper that loads the check before the original entry.
#[must_use]
pub fn render_wrapper(check: &str, entry: &str, module: bool) -> String {
    if module {
        format!(
            "// bundleguard: startup wrapper\nimport {};\nimport {};\n",
            js_string(&module_specifier(check)),
            js_string(&module_specifier(entry))
        )
    } else {
        format!(
            "// bundleguard: startup wrapper\nimportScripts({}, {});\n",
            js_string(check),
            js_string(entry)
        )
    }
}

fn module_specifier(path: &str) -> String {
    if path.starts_with("./") || path.starts_with("../") || path.starts_with('/') {
        path.to_string()
    } else {
        format!("./{path}")
    }
}

fn js_string(s: &str) -> String {
    Value::from(s).to_string()
}
