//! Shared fixtures for patch tests.

#![allow(dead_code)]

use bundleguard_license::{MachineIdentity, Token};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const MANIFEST: &str = r#"{
  "manifest_version": 3,
  "name": "Recorder",
  "version": "1.2.0",
  "action": { "default_popup": "popup/popup.html" },
  "background": { "service_worker": "sw.js" },
  "content_scripts": [
    { "matches": ["<all_urls>"], "js": ["content/content.js"] }
  ],
  "permissions": ["storage", "tabs"]
}"#;

pub const CONTENT_JS: &str = "console.log('recording');\n";
pub const POPUP_HTML: &str =
    "<!DOCTYPE html>\n<html>\n<head>\n<title>Popup</title>\n</head>\n<body></body>\n</html>\n";
pub const HEADLESS_HTML: &str = "<div>options</div>\n";

/// Writes a small bundle: manifest, service worker, content script, a popup
/// page with a head and a root page without one.
pub fn fixture_bundle() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fill_bundle(dir.path());
    dir
}

/// Fixture bundle at `<tmp>/ext`, so files next to it can be checked.
pub fn nested_bundle() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("ext");
    fill_bundle(&root);
    (dir, root)
}

fn fill_bundle(root: &Path) {
    write(root, "manifest.json", MANIFEST);
    write(root, "sw.js", "self.addEventListener('install', () => {});\n");
    write(root, "content/content.js", CONTENT_JS);
    write(root, "popup/popup.html", POPUP_HTML);
    write(root, "options.html", HEADLESS_HTML);
}

pub fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

pub fn read(root: &Path, rel: &str) -> String {
    fs::read_to_string(root.join(rel)).unwrap()
}

pub fn manifest_json(root: &Path) -> serde_json::Value {
    serde_json::from_str(&read(root, "manifest.json")).unwrap()
}

/// Every file under `root` with its bytes.
pub fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    let mut files = BTreeMap::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                pending.push(path);
            } else {
                let rel = path.strip_prefix(root).unwrap().to_path_buf();
                files.insert(rel, fs::read(&path).unwrap());
            }
        }
    }
    files
}

pub fn test_token() -> Token {
    let id = MachineIdentity::new("host-A");
    Token::from_parts("AbCdEfGh12345678", "7fffffff", &id.hash_prefix(), "salt5678")
}
