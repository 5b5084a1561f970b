//! Plaintext companion documents shipped with a package.

use bundleguard_license::{format_local, Issued};
use chrono::{DateTime, Utc};

pub const README_FILE: &str = "README.txt";
pub const KEY_FILE: &str = "license_key.txt";

/// Package README: token, expiry, bound machine and launch instructions.
#[must_use]
pub fn render_readme(product: &str, launcher: &str, issued: &Issued) -> String {
    let title = format!("{product} Package");
    let underline = "=".repeat(title.len());
    format!(
        "{title}
{underline}

This package contains {product} with its license check installed.

LICENSE KEY INFORMATION:
------------------------
License Key: {token}
Expiration Date: {expires}
Machine ID: {machine}

IMPORTANT: This key is specific to this computer and will not work on other machines.
The key is valid until the expiration date shown above.
After expiration, you will need to request a new key.

Instructions:
1. Double-click \"{launcher}\" to start Chrome with {product} loaded
2. Chrome will open with a separate profile that only has {product} enabled
3. Use {product} as normal

Notes:
- You must have Google Chrome installed on your computer
- If Chrome is not found automatically, you will be prompted to enter its location

For support or to request a new key, please contact your administrator.
",
        token = issued.token,
        expires = issued.readable_expiry(),
        machine = issued.identity,
    )
}

/// Key reference sheet.
#[must_use]
pub fn render_key_sheet(issued: &Issued, generated_at: DateTime<Utc>) -> String {
    format!(
        "LICENSE KEY: {}
EXPIRATION: {}
MACHINE ID: {}
MACHINE HASH: {}
GENERATED: {}

This key is valid until the expiration date shown above and only works on this specific computer.
",
        issued.token,
        issued.readable_expiry(),
        issued.identity,
        issued.token.machine_hash(),
        format_local(generated_at),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bundleguard_license::{Expiry, FixedClock, MachineIdentity, TokenIssuer};

    fn issued() -> Issued {
        TokenIssuer::with_clock(FixedClock::at_secs(1_700_000_000))
            .issue(&Expiry::Days(5), &MachineIdentity::new("host-A"))
    }

    #[test]
    fn readme_names_token_machine_and_launcher() {
        let issued = issued();
        let readme = render_readme("Recorder", "Launch_Recorder.bat", &issued);
        assert!(readme.starts_with("Recorder Package\n================\n"));
        assert!(readme.contains(&format!("License Key: {}", issued.token)));
        assert!(readme.contains("Machine ID: host-A"));
        assert!(readme.contains(&format!("Expiration Date: {}", issued.readable_expiry())));
        assert!(readme.contains("\"Launch_Recorder.bat\""));
    }

    #[test]
    fn key_sheet_lists_binding() {
        let issued = issued();
        let sheet = render_key_sheet(&issued, FixedClock::at_secs(1_700_000_000).0);
        assert!(sheet.starts_with(&format!("LICENSE KEY: {}\n", issued.token)));
        assert!(sheet.contains(&format!("MACHINE HASH: {}", issued.token.machine_hash())));
    }
}
