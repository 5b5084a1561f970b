//! Run-scoped state for one packaging run.
//!
//! Each run works in `<output>/package_<user>/.work-<uuid>`, so concurrent
//! runs never share a working directory. The directory is removed when the
//! [`RunContext`] is dropped, on success and on every error path.

use crate::error::{PackError, PackResult};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

const WORK_PREFIX: &str = ".work-";
const BUNDLE_DIR: &str = "bundle";

/// Rejects values that would escape the output directory when used in a
/// file name.
pub(crate) fn file_component<'a>(kind: &'static str, value: &'a str) -> PackResult<&'a str> {
    let bad = value.trim().is_empty()
        || value == "."
        || value == ".."
        || value.contains(['/', '\\', ':', '\0']);
    if bad {
        return Err(PackError::InvalidName {
            kind,
            value: value.to_string(),
        });
    }
    Ok(value)
}

#[derive(Debug)]
pub struct RunContext {
    run_id: Uuid,
    product: String,
    user: String,
    output_dir: PathBuf,
    user_dir: PathBuf,
    work_dir: PathBuf,
    started_at: DateTime<Utc>,
}

impl RunContext {
    /// Creates the user directory and a fresh working directory inside it.
    ///
    /// # Errors
    ///
    /// [`PackError::InvalidName`] for an unusable product or user name,
    /// [`PackError::Io`] if the directories cannot be created.
    pub fn create(
        output_dir: &Path,
        product: &str,
        user: &str,
        started_at: DateTime<Utc>,
    ) -> PackResult<Self> {
        let product = file_component("product name", product)?;
        let user = file_component("user", user)?;

        let run_id = Uuid::new_v4();
        let user_dir = output_dir.join(format!("package_{user}"));
        let work_dir = user_dir.join(format!("{WORK_PREFIX}{run_id}"));
        fs::create_dir_all(&work_dir).map_err(|e| PackError::io(&work_dir, e))?;
        debug!("run {} working in {:?}", run_id, work_dir);

        Ok(Self {
            run_id,
            product: product.to_string(),
            user: user.to_string(),
            output_dir: output_dir.to_path_buf(),
            user_dir,
            work_dir,
            started_at,
        })
    }

    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    #[must_use]
    pub fn product(&self) -> &str {
        &self.product
    }

    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Where the archive and companion documents end up.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// `<output>/package_<user>`.
    #[must_use]
    pub fn user_dir(&self) -> &Path {
        &self.user_dir
    }

    #[must_use]
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Staged package, `<work>/<product>`; becomes the archive's top folder.
    #[must_use]
    pub fn package_dir(&self) -> PathBuf {
        self.work_dir.join(&self.product)
    }

    /// Patched bundle copy inside the staged package.
    #[must_use]
    pub fn bundle_dir(&self) -> PathBuf {
        self.package_dir().join(BUNDLE_DIR)
    }
}

impl Drop for RunContext {
    fn drop(&mut self) {
        match fs::remove_dir_all(&self.work_dir) {
            Ok(()) => debug!("removed working directory {:?}", self.work_dir),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove working directory {:?}: {}",
                self.work_dir, e
            ),
        }
        // Succeeds only when no other run is using the user directory.
        let _ = fs::remove_dir(&self.user_dir);
    }
}
