//! Recursive bundle copy.

use crate::error::{PackError, PackResult};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Copies the tree at `from` into `to` (created if needed). Symlinks and
/// other special files are skipped. Returns the number of files copied.
///
/// # Errors
///
/// [`PackError::Copy`] naming the first path that failed.
pub fn copy_tree(from: &Path, to: &Path) -> PackResult<u64> {
    fs::create_dir_all(to).map_err(|e| copy_err(to, e))?;
    let mut copied = 0;

    let mut entries: Vec<_> = fs::read_dir(from)
        .map_err(|e| copy_err(from, e))?
        .collect::<Result<_, _>>()
        .map_err(|e| copy_err(from, e))?;
    entries.sort_by_key(fs::DirEntry::file_name);

    for entry in entries {
        let src = entry.path();
        let dst = to.join(entry.file_name());
        let file_type = entry.file_type().map_err(|e| copy_err(&src, e))?;

        if file_type.is_dir() {
            copied += copy_tree(&src, &dst)?;
        } else if file_type.is_file() {
            fs::copy(&src, &dst).map_err(|e| copy_err(&src, e))?;
            copied += 1;
        } else {
            debug!("skipping special file {:?}", src);
        }
    }
    Ok(copied)
}

fn copy_err(path: &Path, source: std::io::Error) -> PackError {
    PackError::Copy {
        path: path.to_path_buf(),
        source,
    }
}
