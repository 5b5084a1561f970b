//! Patch pass settings (the `[patch]` section of the configuration file).

use serde::{Deserialize, Serialize};

/// Settings shared by the security and key-injection passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatchOptions {
    /// URL scheme (with trailing colon) of the bundle's own pages. Guards
    /// only act when the hosting page uses this scheme.
    pub internal_scheme: String,
    /// Content scripts to guard, relative to the bundle root, in addition to
    /// those declared in the manifest.
    pub content_scripts: Vec<String>,
    /// File name of the generated license-check script.
    pub validation_script: String,
    /// File name of the generated service-worker wrapper.
    pub wrapper_script: String,
    /// Show the expiry warning when this many days or fewer remain.
    pub warning_days: u32,
    /// Outer/inner window size gap (px) taken to mean an inspector is open.
    pub devtools_threshold_px: u32,
    /// Contact line shown on the denial view.
    pub support_contact: String,
}

impl Default for PatchOptions {
    fn default() -> Self {
        Self {
            internal_scheme: "chrome-extension:".to_string(),
            content_scripts: vec!["content/content.js".to_string()],
            validation_script: "license_check.js".to_string(),
            wrapper_script: "startup_wrapper.js".to_string(),
            warning_days: 2,
            devtools_threshold_px: 160,
            support_contact: "Please contact your administrator for a new key for this computer."
                .to_string(),
        }
    }
}
