mod common;

use bundleguard_patch::{
    AssetOutcome, PatchError, PatchOptions, PatchPass, SecurityPass, EXTENSION_PAGES_CSP,
    GUARD_SCRIPT, GUARD_STYLESHEET, MARKUP_SENTINEL, SCRIPT_SENTINEL,
};
use common::{
    fixture_bundle, manifest_json, nested_bundle, read, snapshot, write, CONTENT_JS, HEADLESS_HTML,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::fs;
use std::path::Path;

fn run(root: &Path) -> bundleguard_patch::PatchReport {
    SecurityPass::new(&PatchOptions::default()).apply(root)
}

#[test]
fn content_script_gets_guard_first() {
    let bundle = fixture_bundle();
    let report = run(bundle.path());

    let content = read(bundle.path(), "content/content.js");
    assert!(content.starts_with("// bundleguard: inspection guard"));
    assert!(content.contains(SCRIPT_SENTINEL));
    assert!(content.ends_with(CONTENT_JS));
    assert!(content.contains("!== \"chrome-extension:\""));
    assert!(matches!(
        report.outcome_for("content/content.js"),
        Some(AssetOutcome::Patched)
    ));
}

#[test]
fn markup_references_guard_files() {
    let bundle = fixture_bundle();
    run(bundle.path());

    let popup = read(bundle.path(), "popup/popup.html");
    assert!(popup.contains(
        "<head>\n<script id=\"bundleguard-security\" src=\"../security.js\"></script>\n\
         <link rel=\"stylesheet\" href=\"../popup/security.css\">\n<title>"
    ));

    let options = read(bundle.path(), "options.html");
    assert!(options.starts_with("<script id=\"bundleguard-security\" src=\"security.js\">"));
    assert!(options.ends_with(HEADLESS_HTML));
}

#[test]
fn guard_files_are_written() {
    let bundle = fixture_bundle();
    let report = run(bundle.path());

    assert!(read(bundle.path(), GUARD_SCRIPT).contains(SCRIPT_SENTINEL));
    assert!(read(bundle.path(), GUARD_STYLESHEET).contains("user-select: none"));
    assert!(matches!(report.outcome_for(GUARD_SCRIPT), Some(AssetOutcome::Created)));
    assert!(matches!(report.outcome_for(GUARD_STYLESHEET), Some(AssetOutcome::Created)));
}

#[test]
fn manifest_gains_resource_and_policy_only() {
    let bundle = fixture_bundle();
    run(bundle.path());

    let m = manifest_json(bundle.path());
    assert_eq!(
        m["web_accessible_resources"],
        json!([{ "resources": ["security.js"], "matches": ["<all_urls>"] }])
    );
    assert_eq!(m["content_security_policy"]["extension_pages"], EXTENSION_PAGES_CSP);
    assert_eq!(m["name"], "Recorder");
    assert_eq!(m["permissions"], json!(["storage", "tabs"]));
    assert_eq!(m["background"], json!({ "service_worker": "sw.js" }));

    let keys: Vec<_> = m.as_object().unwrap().keys().cloned().collect();
    assert_eq!(
        keys,
        [
            "manifest_version",
            "name",
            "version",
            "action",
            "background",
            "content_scripts",
            "permissions",
            "web_accessible_resources",
            "content_security_policy"
        ]
    );
}

#[test]
fn existing_resource_group_is_extended() {
    let bundle = fixture_bundle();
    write(
        bundle.path(),
        "manifest.json",
        r#"{"web_accessible_resources":[
            {"resources":["img/*.png"],"matches":["https://example.com/*"]}
        ]}"#,
    );
    run(bundle.path());
    run(bundle.path());

    assert_eq!(
        manifest_json(bundle.path())["web_accessible_resources"],
        json!([{ "resources": ["img/*.png", "security.js"], "matches": ["https://example.com/*"] }])
    );
}

#[test]
fn second_run_changes_nothing() {
    let bundle = fixture_bundle();
    run(bundle.path());
    let once = snapshot(bundle.path());

    let report = run(bundle.path());
    assert_eq!(snapshot(bundle.path()), once);
    assert_eq!(report.changed(), 0);
    assert!(report.is_clean());
}

#[test]
fn missing_content_script_is_skipped() {
    let bundle = fixture_bundle();
    fs::remove_file(bundle.path().join("content/content.js")).unwrap();

    let report = run(bundle.path());
    assert!(matches!(
        report.outcome_for("content/content.js"),
        Some(AssetOutcome::Skipped(PatchError::AssetMissing(_)))
    ));
    assert!(read(bundle.path(), "popup/popup.html").contains(MARKUP_SENTINEL));
    assert!(matches!(report.outcome_for("manifest.json"), Some(AssetOutcome::Patched)));
}

#[test]
fn malformed_manifest_is_skipped_and_left_alone() {
    let bundle = fixture_bundle();
    write(bundle.path(), "manifest.json", "{ not json");

    let report = run(bundle.path());
    assert!(matches!(
        report.outcome_for("manifest.json"),
        Some(AssetOutcome::Skipped(PatchError::AssetParse { .. }))
    ));
    assert_eq!(read(bundle.path(), "manifest.json"), "{ not json");
    assert!(read(bundle.path(), "content/content.js").contains(SCRIPT_SENTINEL));
    assert!(read(bundle.path(), "options.html").contains(MARKUP_SENTINEL));
    assert!(!report.is_clean());
}

#[test]
fn missing_manifest_still_patches_assets() {
    let bundle = fixture_bundle();
    fs::remove_file(bundle.path().join("manifest.json")).unwrap();

    let report = run(bundle.path());
    assert!(matches!(
        report.outcome_for("manifest.json"),
        Some(AssetOutcome::Skipped(PatchError::AssetMissing(_)))
    ));
    assert!(!bundle.path().join("manifest.json").exists());
    assert!(read(bundle.path(), "popup/popup.html").contains(MARKUP_SENTINEL));
}

#[test]
fn declared_content_scripts_are_guarded_too() {
    let bundle = fixture_bundle();
    write(
        bundle.path(),
        "manifest.json",
        r#"{"content_scripts":[
            {"matches":["<all_urls>"],"js":["content/content.js","content/recorder.js"]}
        ]}"#,
    );
    write(bundle.path(), "content/recorder.js", "record();\n");

    run(bundle.path());
    assert!(read(bundle.path(), "content/recorder.js").contains(SCRIPT_SENTINEL));
}

#[test]
fn content_script_outside_bundle_is_refused() {
    let (dir, root) = nested_bundle();
    write(dir.path(), "secret.js", "keep();\n");
    write(
        &root,
        "manifest.json",
        r#"{"content_scripts":[{"js":["../secret.js","content/content.js"]}]}"#,
    );

    let report = run(&root);
    assert!(matches!(
        report.outcome_for("../secret.js"),
        Some(AssetOutcome::Skipped(PatchError::OutsideBundle(_)))
    ));
    assert_eq!(read(dir.path(), "secret.js"), "keep();\n");
    assert!(read(&root, "content/content.js").contains(SCRIPT_SENTINEL));
}
