//! ZIP archival of the staged package.

use crate::error::{PackError, PackResult};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Writes `dir` to a new archive at `zip_path`, with `dir`'s own name as
/// the single top-level folder. Entries are written in sorted order.
/// Returns the number of files archived.
///
/// # Errors
///
/// [`PackError::Archive`] for ZIP failures, [`PackError::Io`] for
/// filesystem ones.
pub fn archive_dir(dir: &Path, zip_path: &Path) -> PackResult<u64> {
    let top = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let file = File::create(zip_path).map_err(|e| PackError::io(zip_path, e))?;
    let mut zip = ZipWriter::new(file);
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let zip_err = |source| PackError::Archive {
        path: zip_path.to_path_buf(),
        source,
    };

    zip.add_directory(format!("{top}/"), options).map_err(zip_err)?;
    let count = add_tree(&mut zip, dir, &top, options, zip_path)?;
    zip.finish().map_err(zip_err)?;
    Ok(count)
}

fn add_tree(
    zip: &mut ZipWriter<File>,
    dir: &Path,
    prefix: &str,
    options: SimpleFileOptions,
    zip_path: &Path,
) -> PackResult<u64> {
    let zip_err = |source| PackError::Archive {
        path: zip_path.to_path_buf(),
        source,
    };

    let mut entries: Vec<_> = fs::read_dir(dir)
        .map_err(|e| PackError::io(dir, e))?
        .collect::<Result<_, _>>()
        .map_err(|e| PackError::io(dir, e))?;
    entries.sort_by_key(fs::DirEntry::file_name);

    let mut count = 0;
    for entry in entries {
        let path = entry.path();
        let name = format!("{prefix}/{}", entry.file_name().to_string_lossy());
        if path.is_dir() {
            zip.add_directory(format!("{name}/"), options).map_err(zip_err)?;
            count += add_tree(zip, &path, &name, options, zip_path)?;
        } else {
            let data = fs::read(&path).map_err(|e| PackError::io(&path, e))?;
            zip.start_file(name, options).map_err(zip_err)?;
            zip.write_all(&data).map_err(|e| PackError::io(zip_path, e))?;
            count += 1;
        }
    }
    Ok(count)
}
