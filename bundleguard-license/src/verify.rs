//! Token verification against a machine identity and a clock.
//!
//! Checks run in a fixed order and stop at the first failure:
//! format, machine binding, signature, expiry encoding, expiry.
//! The binding check precedes the signature check so a token carried to
//! another machine is reported as such even if it was also edited.

use crate::clock::{Clock, SystemClock};
use crate::identity::MachineIdentity;
use crate::token::{format_local, Token};
use chrono::{DateTime, Utc};
use std::fmt;

const SECS_PER_HOUR: i64 = 60 * 60;
const SECS_PER_DAY: i64 = 24 * SECS_PER_HOUR;

/// Time left on a valid token, at day/hour granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Remaining {
    /// Whole days left.
    pub days: i64,
    /// Whole hours left beyond `days`, 0 to 23.
    pub hours: i64,
}

impl Remaining {
    /// Splits a non-negative number of seconds into whole days and hours.
    #[must_use]
    pub fn from_secs(secs: i64) -> Self {
        let secs = secs.max(0);
        Self {
            days: secs / SECS_PER_DAY,
            hours: (secs % SECS_PER_DAY) / SECS_PER_HOUR,
        }
    }
}

impl fmt::Display for Remaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.days > 0 {
            write!(f, "{} days and {} hours", self.days, self.hours)
        } else {
            write!(f, "{} hours", self.hours)
        }
    }
}

/// Why a token was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Not five non-empty dot-separated fields.
    Malformed(String),
    /// Bound to a different machine.
    WrongMachine { token_hash: String, current_hash: String },
    /// Signature does not match the other four fields.
    BadSignature,
    /// Expiry field is not a hex timestamp.
    BadExpiryEncoding(String),
    /// Expired at the given instant.
    Expired { expired_at: DateTime<Utc> },
}

impl Rejection {
    /// Short machine-readable reason.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed",
            Self::WrongMachine { .. } => "wrong machine",
            Self::BadSignature => "bad signature",
            Self::BadExpiryEncoding(_) => "bad expiry encoding",
            Self::Expired { .. } => "expired",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(detail) => write!(f, "malformed token: {detail}"),
            Self::WrongMachine {
                token_hash,
                current_hash,
            } => write!(
                f,
                "wrong machine: token is bound to {token_hash}, this machine is {current_hash}"
            ),
            Self::BadSignature => f.write_str("bad signature"),
            Self::BadExpiryEncoding(detail) => write!(f, "bad expiry encoding: {detail}"),
            Self::Expired { expired_at } => write!(f, "expired on {}", format_local(*expired_at)),
        }
    }
}

/// Outcome of verifying a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Valid {
        remaining: Remaining,
        expires_at: DateTime<Utc>,
    },
    Invalid(Rejection),
}

impl Verdict {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    /// Returns the rejection, if any.
    #[must_use]
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Valid { .. } => None,
            Self::Invalid(r) => Some(r),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid {
                remaining,
                expires_at,
            } => write!(
                f,
                "valid for {remaining} (until {})",
                format_local(*expires_at)
            ),
            Self::Invalid(r) => write!(f, "invalid: {r}"),
        }
    }
}

/// Verifies tokens against a clock.
#[derive(Debug, Clone, Default)]
pub struct Verifier<C = SystemClock> {
    clock: C,
}

impl Verifier<SystemClock> {
    /// Creates a verifier reading the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self { clock: SystemClock }
    }
}

impl<C: Clock> Verifier<C> {
    pub fn with_clock(clock: C) -> Self {
        Self { clock }
    }

    /// Parses and verifies token text.
    pub fn verify_str(&self, text: &str, identity: &MachineIdentity) -> Verdict {
        match Token::parse(text) {
            Ok(token) => self.verify(&token, identity),
            Err(e) => Verdict::Invalid(Rejection::Malformed(e.to_string())),
        }
    }

    /// Verifies a parsed token. The clock is read once.
    pub fn verify(&self, token: &Token, identity: &MachineIdentity) -> Verdict {
        let current_hash = identity.hash_prefix();
        if token.machine_hash() != current_hash {
            return Verdict::Invalid(Rejection::WrongMachine {
                token_hash: token.machine_hash().to_string(),
                current_hash,
            });
        }

        if token.signature() != token.expected_signature() {
            return Verdict::Invalid(Rejection::BadSignature);
        }

        let expires_at = match token.expires_at() {
            Ok(at) => at,
            Err(e) => return Verdict::Invalid(Rejection::BadExpiryEncoding(e.to_string())),
        };

        let now = self.clock.now();
        if now > expires_at {
            return Verdict::Invalid(Rejection::Expired {
                expired_at: expires_at,
            });
        }

        Verdict::Valid {
            remaining: Remaining::from_secs((expires_at - now).num_seconds()),
            expires_at,
        }
    }
}

/// Verifies token text against the system clock.
#[must_use]
pub fn verify(text: &str, identity: &MachineIdentity) -> Verdict {
    Verifier::new().verify_str(text, identity)
}
