//! Shared test helpers for license tests.

#![allow(dead_code)]

use bundleguard_license::{Expiry, FixedClock, Issued, MachineIdentity, TokenIssuer, Verifier};

/// 2023-11-14 22:13:20 UTC.
pub const NOW: i64 = 1_700_000_000;

pub fn clock() -> FixedClock {
    FixedClock::at_secs(NOW)
}

pub fn verifier() -> Verifier<FixedClock> {
    Verifier::with_clock(clock())
}

/// Issues a token for `identity` valid for `days` days from [`NOW`].
pub fn issue_for(identity: &str, days: i64) -> Issued {
    TokenIssuer::with_clock(clock()).issue(&Expiry::Days(days), &MachineIdentity::new(identity))
}

/// Replaces the character at `index` of `field` with a different alphanumeric one.
pub fn mutate_char(field: &str, index: usize) -> String {
    field
        .char_indices()
        .map(|(i, c)| {
            if i == index {
                if c == 'a' { 'b' } else { 'a' }
            } else {
                c
            }
        })
        .collect()
}
