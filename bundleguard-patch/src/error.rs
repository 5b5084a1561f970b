//! Error types for the patch crate.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("asset not found: {}", .0.display())]
    AssetMissing(PathBuf),

    #[error("path leaves the bundle: {}", .0.display())]
    OutsideBundle(PathBuf),

    #[error("cannot parse {}: {reason}", path.display())]
    AssetParse { path: PathBuf, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PatchError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type PatchResult<T> = Result<T, PatchError>;
