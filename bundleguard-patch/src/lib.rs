//! Bundle patching for bundleguard.
//!
//! Two passes mutate an unpacked bundle (a `manifest.json` plus scripts and
//! markup) in place:
//!
//! - [`SecurityPass`] guards content scripts and markup against casual
//!   inspection on the bundle's own pages.
//! - [`KeyInjectionPass`] embeds a license-check script carrying a token and
//!   makes it run first.
//!
//! Both passes are idempotent: each asset kind carries a marker that is
//! checked before inserting, and generated files are only rewritten when
//! their content differs. Failures are per asset; a missing or unparseable
//! asset is recorded in the [`PatchReport`] and the pass carries on.

use std::path::Path;

mod asset;
mod error;
mod inject;
mod manifest;
mod options;
mod report;
mod security;

pub use asset::{
    apply_hook, collect, root_prefix, AssetKind, HookHost, ResourceHost, TextAsset, HEAD_TAG,
};
pub use error::{PatchError, PatchResult};
pub use inject::{render_wrapper, secret_fragments, KeyInjectionPass};
pub use manifest::{Background, BundleManifest, ALL_URLS, MANIFEST_FILE};
pub use options::PatchOptions;
pub use report::{AssetOutcome, AssetRecord, PatchReport};
pub use security::{
    SecurityPass, EXTENSION_PAGES_CSP, GUARD_SCRIPT, GUARD_STYLESHEET, MARKUP_SENTINEL,
    SCRIPT_SENTINEL,
};

/// One idempotent sweep over a bundle directory.
pub trait PatchPass {
    /// Short name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Applies the pass to the bundle rooted at `root`. Never fails as a
    /// whole; per-asset problems are in the report.
    fn apply(&self, root: &Path) -> PatchReport;
}
