//! Error types for the pack crate.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PackError {
    #[error("bundle directory not found: {}", .0.display())]
    BundleNotFound(PathBuf),

    #[error("output directory {} is inside bundle {}", output.display(), bundle.display())]
    OutputInsideBundle { bundle: PathBuf, output: PathBuf },

    #[error("invalid {kind} '{value}': must be a non-empty file name")]
    InvalidName { kind: &'static str, value: String },

    #[error("failed to copy {}: {source}", path.display())]
    Copy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to archive {}: {source}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}

impl PackError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type PackResult<T> = Result<T, PackError>;
