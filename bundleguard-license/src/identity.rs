//! Machine identity resolution for license binding.
//!
//! Resolves a best-effort stable identifier for the host by walking an
//! ordered chain of probes. Every probe swallows its own failures; the
//! resolver falls through to the next one and ends on a fixed placeholder,
//! so resolution never fails and never yields an empty string.
//!
//! Identity is not persisted. Hostname-based fallbacks can change between
//! runs, which makes a token minted earlier look like it belongs to another
//! machine.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use tracing::{debug, warn};

/// Placeholder identity used when every probe fails.
pub const UNKNOWN_MACHINE: &str = "unknown-machine";

/// Number of hex characters kept from the identity hash.
pub const MACHINE_HASH_LEN: usize = 12;

/// An opaque, non-empty string identifying a host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MachineIdentity(String);

impl MachineIdentity {
    /// Wraps an explicit identity (e.g. one supplied by an operator for a
    /// remote machine). Blank input becomes [`UNKNOWN_MACHINE`].
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            Self(UNKNOWN_MACHINE.to_string())
        } else {
            Self(trimmed.to_string())
        }
    }

    /// Resolves the identity of the current host with the platform probe chain.
    #[must_use]
    pub fn resolve() -> Self {
        IdentityResolver::platform_default().resolve()
    }

    /// Returns the identity string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the first 12 hex characters of the SHA-256 of the identity.
    ///
    /// This is the value embedded in tokens as the machine binding.
    #[must_use]
    pub fn hash_prefix(&self) -> String {
        machine_hash(&self.0)
    }
}

impl fmt::Display for MachineIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Truncated SHA-256 of an identity string, lowercase hex.
#[must_use]
pub fn machine_hash(identity: &str) -> String {
    let digest = Sha256::digest(identity.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(MACHINE_HASH_LEN);
    hex
}

/// One step of the identity probe chain.
#[derive(Clone, Copy)]
pub struct Probe {
    /// Short name used in logs.
    pub name: &'static str,
    /// Returns a candidate identity, or `None` to fall through.
    pub run: fn() -> Option<String>,
}

impl fmt::Debug for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Probe").field("name", &self.name).finish()
    }
}

/// Walks an ordered list of probes and returns the first usable identity.
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    probes: Vec<Probe>,
}

impl IdentityResolver {
    /// Platform registry value, then hostname plus hardware address, then
    /// bare hostname, then a digest of the (lossily decoded) hostname.
    #[must_use]
    pub fn platform_default() -> Self {
        Self::with_probes(vec![
            Probe {
                name: "platform-registry",
                run: platform_machine_id,
            },
            Probe {
                name: "hostname-hwaddr",
                run: hostname_with_hardware_address,
            },
            Probe {
                name: "hostname",
                run: hostname,
            },
            Probe {
                name: "hostname-digest",
                run: hostname_digest,
            },
        ])
    }

    /// Builds a resolver over an explicit probe chain.
    #[must_use]
    pub fn with_probes(probes: Vec<Probe>) -> Self {
        Self { probes }
    }

    /// Returns the probe chain in evaluation order.
    #[must_use]
    pub fn probes(&self) -> &[Probe] {
        &self.probes
    }

    /// Runs the chain. Blank probe results count as failures.
    #[must_use]
    pub fn resolve(&self) -> MachineIdentity {
        for probe in &self.probes {
            match (probe.run)().map(|v| v.trim().to_string()) {
                Some(value) if !value.is_empty() => {
                    debug!("machine identity resolved by probe '{}'", probe.name);
                    return MachineIdentity(value);
                }
                _ => debug!("identity probe '{}' yielded nothing", probe.name),
            }
        }

        warn!(
            "all {} identity probes failed, using placeholder '{}'",
            self.probes.len(),
            UNKNOWN_MACHINE
        );
        MachineIdentity(UNKNOWN_MACHINE.to_string())
    }
}

impl Default for IdentityResolver {
    fn default() -> Self {
        Self::platform_default()
    }
}

fn hostname() -> Option<String> {
    hostname::get().ok().and_then(|h| h.into_string().ok())
}

fn hostname_digest() -> Option<String> {
    let raw = hostname::get().ok()?;
    let digest = Sha256::digest(raw.to_string_lossy().as_bytes());
    Some(hex::encode(&digest[..16]))
}

fn hostname_with_hardware_address() -> Option<String> {
    let host = hostname()?;
    let mac = hardware_address()?;
    Some(format!("{host}-{mac}"))
}

/// Gets the platform's persistent machine identifier.
fn platform_machine_id() -> Option<String> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("ioreg")
            .args(["-rd1", "-c", "IOPlatformExpertDevice"])
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .and_then(|output| {
                output
                    .lines()
                    .find(|l| l.contains("IOPlatformUUID"))
                    .and_then(|l| l.split('"').nth(3))
                    .map(String::from)
            })
    }

    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/etc/machine-id")
            .or_else(|_| std::fs::read_to_string("/var/lib/dbus/machine-id"))
            .ok()
            .map(|s| s.trim().to_string())
    }

    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("reg")
            .args([
                "query",
                r"HKLM\SOFTWARE\Microsoft\Cryptography",
                "/v",
                "MachineGuid",
            ])
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .and_then(|output| {
                output
                    .lines()
                    .find(|l| l.contains("MachineGuid"))
                    .and_then(|l| l.split_whitespace().last())
                    .map(String::from)
            })
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
    {
        None
    }
}

/// Gets the first non-loopback hardware address, `aa:bb:cc:dd:ee:ff` form.
fn hardware_address() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        let mut interfaces: Vec<_> = std::fs::read_dir("/sys/class/net")
            .ok()?
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.file_name().is_some_and(|n| n != "lo"))
            .collect();
        interfaces.sort();
        interfaces
            .iter()
            .filter_map(|p| std::fs::read_to_string(p.join("address")).ok())
            .map(|s| s.trim().to_lowercase())
            .find(|mac| is_usable_mac(mac))
    }

    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("ifconfig")
            .arg("en0")
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .and_then(|output| {
                output
                    .lines()
                    .map(str::trim)
                    .find_map(|l| l.strip_prefix("ether "))
                    .map(|mac| mac.trim().to_lowercase())
            })
            .filter(|mac| is_usable_mac(mac))
    }

    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("getmac")
            .args(["/fo", "csv", "/nh"])
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .and_then(|output| {
                output
                    .lines()
                    .filter_map(|l| l.split(',').next())
                    .map(|mac| mac.trim_matches('"').replace('-', ":").to_lowercase())
                    .find(|mac| is_usable_mac(mac))
            })
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
    {
        None
    }
}

#[allow(dead_code)]
fn is_usable_mac(mac: &str) -> bool {
    mac.len() == 17 && mac != "00:00:00:00:00:00"
}
