//! Shared fixtures for pipeline tests.

#![allow(dead_code)]

use bundleguard_license::{FixedClock, MachineIdentity};
use bundleguard_pack::{PackConfig, PackRequest, Packager};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use tempfile::TempDir;
use zip::ZipArchive;

/// 2023-11-14T22:13:20Z
pub const NOW: i64 = 1_700_000_000;

pub fn packager() -> Packager<FixedClock> {
    Packager::with_clock(PackConfig::default(), FixedClock::at_secs(NOW))
}

pub fn identity() -> MachineIdentity {
    MachineIdentity::new("build-host-7")
}

/// A minimal bundle: service-worker manifest, content script and a popup.
pub fn fixture_bundle() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "manifest.json",
        r#"{"manifest_version":3,"name":"Recorder","background":{"service_worker":"sw.js"}}"#,
    );
    write(dir.path(), "sw.js", "// worker\n");
    write(dir.path(), "content/content.js", "// content\n");
    write(dir.path(), "popup/popup.html", "<html><head></head><body></body></html>\n");
    dir
}

pub fn request(bundle: &Path, out: &Path) -> PackRequest {
    let mut req = PackRequest::new(bundle, out, "alice");
    req.machine = Some(identity());
    req
}

pub fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Entry name to contents for every file in the archive.
pub fn zip_files(path: &Path) -> BTreeMap<String, String> {
    let mut archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut files = BTreeMap::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).unwrap();
        if entry.is_dir() {
            continue;
        }
        let mut text = String::new();
        entry.read_to_string(&mut text).unwrap();
        files.insert(entry.name().to_string(), text);
    }
    files
}

/// Names directly under `dir`.
pub fn listing(dir: &Path) -> Vec<String> {
    let mut names: Vec<_> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
