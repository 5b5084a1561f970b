use bundleguard_cli::{run, Cli, Command};
use bundleguard_license::{Expiry, MachineIdentity, TokenIssuer, MAX_VALID_DAYS};
use clap::Parser;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("bundleguard").chain(args.iter().copied())).unwrap()
}

fn run_to_string(cli: &Cli) -> (bool, String) {
    let mut out = Vec::new();
    let ok = run(cli, &mut out).unwrap();
    (ok, String::from_utf8(out).unwrap())
}

fn no_config(dir: &Path) -> String {
    dir.join("absent.toml").display().to_string()
}

// ── Argument parsing ────────────────────────────────────────────

#[test]
fn pack_defaults() {
    let cli = parse(&["pack", "./ext"]);
    let Command::Pack {
        bundle,
        output,
        key,
        user,
        no_patch,
    } = cli.command
    else {
        panic!("expected pack");
    };
    assert_eq!(bundle, Path::new("./ext"));
    assert_eq!(output, Path::new("dist"));
    assert_eq!(user, "user");
    assert!(!no_patch);
    assert_eq!(key.expiry(5), Expiry::Days(5));
    assert!(key.identity().is_none());
    assert!(!cli.verbose);
}

#[test]
fn expiration_text_falls_back_to_days() {
    let cli = parse(&["issue", "-d", "3", "-e", "2030-01-31", "-m", "host-A"]);
    let Command::Issue { key } = cli.command else {
        panic!("expected issue");
    };
    assert_eq!(key.expiry(5), Expiry::text("2030-01-31", 3));
    assert_eq!(key.identity(), Some(MachineIdentity::new("host-A")));
}

#[test]
fn global_flags_after_subcommand() {
    let cli = parse(&["verify", "a.b.c.d.e", "--verbose", "--config", "x.toml"]);
    assert!(cli.verbose);
    assert_eq!(cli.config.as_deref(), Some(Path::new("x.toml")));
}

#[test]
fn zero_days_is_rejected() {
    assert!(Cli::try_parse_from(["bundleguard", "issue", "--days", "0"]).is_err());
    assert!(Cli::try_parse_from(["bundleguard", "pack"]).is_err());
}

#[test]
fn day_count_is_bounded() {
    assert!(Cli::try_parse_from(["bundleguard", "issue", "-d", "200000000"]).is_err());
    let max = MAX_VALID_DAYS.to_string();
    let Command::Issue { key } = parse(&["issue", "-d", &max]).command else {
        panic!("expected issue");
    };
    assert_eq!(key.days, Some(MAX_VALID_DAYS));
}

// ── Commands ────────────────────────────────────────────────────

#[test]
fn issue_then_verify_on_same_machine() {
    let dir = tempfile::tempdir().unwrap();
    let config = no_config(dir.path());

    let (ok, printed) = run_to_string(&parse(&["issue", "-m", "host-A", "--config", &config]));
    assert!(ok);
    let token = printed
        .lines()
        .find_map(|l| l.strip_prefix("Key: "))
        .unwrap()
        .to_string();
    assert!(printed.contains("Machine ID: host-A"));

    let (ok, printed) =
        run_to_string(&parse(&["verify", &token, "-m", "host-A", "--config", &config]));
    assert!(ok);
    assert!(printed.starts_with("Key is valid for 4 days and 23 hours"));
}

#[test]
fn issue_reports_unparsed_expiration() {
    let dir = tempfile::tempdir().unwrap();
    let config = no_config(dir.path());
    let cli = parse(&["issue", "-e", "garbage", "-d", "3", "-m", "host-A", "--config", &config]);

    let (ok, printed) = run_to_string(&cli);
    assert!(ok);
    let mut lines = printed.lines();
    assert_eq!(
        lines.next(),
        Some("Expiration 'garbage' not understood, using the fallback validity")
    );
    assert!(lines.next().is_some_and(|l| l.starts_with("Key: ")));
}

#[test]
fn verify_reports_wrong_machine() {
    let dir = tempfile::tempdir().unwrap();
    let issued = TokenIssuer::new().issue(&Expiry::Days(2), &MachineIdentity::new("host-A"));

    let token = issued.token.to_string();
    let (ok, printed) = run_to_string(&parse(&[
        "verify",
        &token,
        "-m",
        "host-B",
        "--config",
        &no_config(dir.path()),
    ]));
    assert!(!ok);
    assert!(printed.starts_with("Key is invalid: wrong machine"));
}

#[test]
fn verify_reports_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let (ok, printed) = run_to_string(&parse(&[
        "verify",
        "not-a-key",
        "-m",
        "host-A",
        "--config",
        &no_config(dir.path()),
    ]));
    assert!(!ok);
    assert!(printed.starts_with("Key is invalid: malformed token"));
}

#[test]
fn pack_writes_archive_and_prints_summary() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = dir.path().join("ext");
    fs::create_dir_all(bundle.join("content")).unwrap();
    fs::write(bundle.join("manifest.json"), r#"{"name":"Recorder"}"#).unwrap();
    fs::write(bundle.join("content/content.js"), "// content\n").unwrap();
    let out_dir = dir.path().join("dist");

    let config = dir.path().join("config.toml");
    fs::write(&config, "product_name = \"Recorder\"\n").unwrap();

    let cli = parse(&[
        "pack",
        bundle.to_str().unwrap(),
        "-o",
        out_dir.to_str().unwrap(),
        "-u",
        "alice",
        "-m",
        "host-A",
        "--config",
        config.to_str().unwrap(),
    ]);
    let (ok, printed) = run_to_string(&cli);
    assert!(ok);

    let archive = printed
        .lines()
        .find_map(|l| l.strip_prefix("Package: "))
        .unwrap();
    assert!(Path::new(archive).is_file());
    assert!(archive.contains("Recorder_alice_"));
    assert!(printed.contains("Machine ID: host-A"));
    assert!(!printed.contains("Skipped"));
    assert!(!printed.contains("not understood"));
}

#[test]
fn pack_reports_unparsed_expiration() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = dir.path().join("ext");
    fs::create_dir_all(&bundle).unwrap();
    fs::write(bundle.join("manifest.json"), r#"{"name":"Recorder"}"#).unwrap();
    let out_dir = dir.path().join("dist");

    let cli = parse(&[
        "pack",
        bundle.to_str().unwrap(),
        "-o",
        out_dir.to_str().unwrap(),
        "-e",
        "31/01/2030",
        "-m",
        "host-A",
        "--config",
        &no_config(dir.path()),
    ]);
    let (ok, printed) = run_to_string(&cli);
    assert!(ok);
    let notice = "Expiration '31/01/2030' not understood, using the fallback validity";
    assert!(printed.lines().any(|l| l == notice));
}

#[test]
fn pack_missing_bundle_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing");
    let cli = parse(&[
        "pack",
        missing.to_str().unwrap(),
        "-o",
        dir.path().to_str().unwrap(),
        "-m",
        "host-A",
        "--config",
        &no_config(dir.path()),
    ]);
    let err = run(&cli, &mut Vec::new()).unwrap_err();
    assert!(err.to_string().starts_with("Failed to package"));
    assert!(format!("{err:#}").contains("bundle directory not found"));
}
