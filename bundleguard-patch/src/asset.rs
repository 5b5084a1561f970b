//! Bundle assets and the capabilities the patch passes rely on.

use crate::error::{PatchError, PatchResult};
use crate::report::AssetOutcome;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// Literal tag after which hooks are placed in markup.
pub const HEAD_TAG: &str = "<head>";

/// Kind of a file inside a bundle, decided by name and extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Manifest,
    Markup,
    Script,
    Stylesheet,
    Other,
}

impl AssetKind {
    #[must_use]
    pub fn of(path: &Path) -> Self {
        if path.file_name().is_some_and(|n| n == crate::manifest::MANIFEST_FILE) {
            return Self::Manifest;
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("html" | "htm") => Self::Markup,
            Some("js" | "mjs") => Self::Script,
            Some("css") => Self::Stylesheet,
            _ => Self::Other,
        }
    }
}

/// An asset that can carry an injected hook.
pub trait HookHost {
    /// Returns true if `marker` already occurs in the asset.
    fn contains_marker(&self, marker: &str) -> bool;

    /// Inserts `hook` at the asset's insertion point.
    fn insert_hook(&mut self, hook: &str);
}

/// An asset that can declare resources visible to external pages.
pub trait ResourceHost {
    /// Makes `resource` web-accessible. Returns false if it already was.
    fn declare_resource(&mut self, resource: &str, matches: &[&str]) -> bool;
}

/// A script or markup file loaded into memory.
#[derive(Debug, Clone)]
pub struct TextAsset {
    path: PathBuf,
    kind: AssetKind,
    content: String,
    modified: bool,
}

impl TextAsset {
    /// Reads an asset from disk.
    ///
    /// # Errors
    ///
    /// [`PatchError::AssetMissing`] if the file does not exist,
    /// [`PatchError::Io`] for other read failures.
    pub fn load(path: impl Into<PathBuf>) -> PatchResult<Self> {
        let path = path.into();
        if !path.is_file() {
            return Err(PatchError::AssetMissing(path));
        }
        let content = fs::read_to_string(&path).map_err(|e| PatchError::io(&path, e))?;
        Ok(Self::from_content(path, content))
    }

    /// Wraps in-memory content; the kind comes from `path`.
    #[must_use]
    pub fn from_content(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            kind: AssetKind::of(&path),
            path,
            content: content.into(),
            modified: false,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Writes the asset back if it was modified. Returns whether it wrote.
    ///
    /// # Errors
    ///
    /// [`PatchError::Io`] if the write fails.
    pub fn save(&self) -> PatchResult<bool> {
        if !self.modified {
            return Ok(false);
        }
        fs::write(&self.path, &self.content).map_err(|e| PatchError::io(&self.path, e))?;
        debug!("wrote {}", self.path.display());
        Ok(true)
    }
}

impl HookHost for TextAsset {
    fn contains_marker(&self, marker: &str) -> bool {
        self.content.contains(marker)
    }

    /// Markup gets the hook right after the first `<head>`, or at the top
    /// when there is none. Everything else gets it at the top.
    fn insert_hook(&mut self, hook: &str) {
        let hook = hook.trim_end();
        self.content = match (self.kind, self.content.find(HEAD_TAG)) {
            (AssetKind::Markup, Some(pos)) => {
                let split = pos + HEAD_TAG.len();
                format!("{}\n{hook}{}", &self.content[..split], &self.content[split..])
            }
            _ => format!("{hook}\n{}", self.content),
        };
        self.modified = true;
    }
}

/// Inserts `hook` unless `marker` is already present. Returns whether the
/// host changed.
pub fn apply_hook<H: HookHost + ?Sized>(host: &mut H, marker: &str, hook: &str) -> bool {
    if host.contains_marker(marker) {
        return false;
    }
    host.insert_hook(hook);
    true
}

/// Loads the text asset at `path`, hooks it, and writes it back.
pub(crate) fn patch_file(path: &Path, marker: &str, hook: &str) -> PatchResult<AssetOutcome> {
    let mut asset = TextAsset::load(path)?;
    if !apply_hook(&mut asset, marker, hook) {
        return Ok(AssetOutcome::AlreadyPatched);
    }
    asset.save()?;
    Ok(AssetOutcome::Patched)
}

/// Joins a bundle-relative name onto `root`. Names that are absolute or
/// climb with `..` are refused.
pub(crate) fn bundle_path(root: &Path, rel: &str) -> PatchResult<PathBuf> {
    let rel_path = Path::new(rel);
    let contained = rel_path
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !contained || rel.is_empty() {
        return Err(PatchError::OutsideBundle(rel_path.to_path_buf()));
    }
    Ok(root.join(rel_path))
}

/// Writes generated content unless the file already holds exactly that.
pub(crate) fn write_generated(path: &Path, content: &str) -> PatchResult<AssetOutcome> {
    let existing = fs::read_to_string(path).ok();
    if existing.as_deref() == Some(content) {
        return Ok(AssetOutcome::AlreadyPatched);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| PatchError::io(parent, e))?;
    }
    fs::write(path, content).map_err(|e| PatchError::io(path, e))?;
    Ok(if existing.is_some() {
        AssetOutcome::Patched
    } else {
        AssetOutcome::Created
    })
}

/// Lists files of `kind` under `root`, sorted. Unreadable directories are
/// logged and skipped.
#[must_use]
pub fn collect(root: &Path, kind: AssetKind) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("cannot list {}: {}", dir.display(), e);
                continue;
            }
        };
        for entry in entries.filter_map(Result::ok) {
            let path = entry.path();
            match entry.file_type() {
                Ok(ft) if ft.is_dir() => pending.push(path),
                Ok(ft) if ft.is_file() && AssetKind::of(&path) == kind => found.push(path),
                _ => {}
            }
        }
    }

    found.sort();
    found
}

/// `path` relative to `root`, for reports. Falls back to `path` itself.
pub(crate) fn relative(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root).unwrap_or(path).to_path_buf()
}

/// Prefix that climbs from the directory of `asset` back to `root`,
/// e.g. `../../` for `root/a/b/page.html`.
#[must_use]
pub fn root_prefix(root: &Path, asset: &Path) -> String {
    let depth = asset
        .strip_prefix(root)
        .ok()
        .and_then(Path::parent)
        .map_or(0, |p| p.components().count());
    "../".repeat(depth)
}
