//! License token construction and parsing.
//!
//! Tokens use the format: `secret.expiry_hex.machine_hash.salt.signature`
//!
//! - `secret`: 16 random alphanumeric characters (OS RNG)
//! - `expiry_hex`: expiry as Unix seconds, lowercase hex, no padding
//! - `machine_hash`: first 12 hex chars of SHA-256 of the machine identity
//! - `salt`: 8 random alphanumeric characters
//! - `signature`: first 12 hex chars of SHA-256 over
//!   `secret:expiry_hex:machine_hash:salt`
//!
//! The signature is keyless. It detects edits to a single field, not forgery
//! by someone who knows the construction.

use crate::clock::{Clock, SystemClock};
use crate::error::{LicenseError, LicenseResult};
use crate::identity::MachineIdentity;
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Field separator of the wire format.
pub const SEPARATOR: char = '.';
/// Length of the random secret field.
pub const SECRET_LEN: usize = 16;
/// Length of the random salt field.
pub const SALT_LEN: usize = 8;
/// Hex characters kept from the signing hash.
pub const SIGNATURE_LEN: usize = 12;
/// Validity period applied when none is given or the given one is unusable.
pub const DEFAULT_VALID_DAYS: i64 = 5;
/// Longest validity period accepted for a day offset.
pub const MAX_VALID_DAYS: i64 = 36_500;

/// Layout for a full expiry timestamp.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Layout for a date-only expiry; the time becomes 23:59:59 local.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A parsed license token. Immutable once built.
///
/// Serializes as its wire string; deserializing goes through [`Token::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Token {
    secret: String,
    expiry_hex: String,
    machine_hash: String,
    salt: String,
    signature: String,
}

impl Token {
    /// Splits token text into its five fields.
    ///
    /// Only the shape is checked here; the signature, binding, and expiry
    /// encoding are left to the verifier.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::InvalidTokenFormat`] unless the text splits
    /// into exactly five non-empty fields.
    pub fn parse(text: &str) -> LicenseResult<Self> {
        let parts: Vec<&str> = text.trim().split(SEPARATOR).collect();
        if parts.len() != 5 {
            return Err(LicenseError::InvalidTokenFormat(format!(
                "expected 5 fields separated by '{SEPARATOR}', found {}",
                parts.len()
            )));
        }
        if let Some(pos) = parts.iter().position(|p| p.is_empty()) {
            return Err(LicenseError::InvalidTokenFormat(format!(
                "field {} is empty",
                pos + 1
            )));
        }

        Ok(Self {
            secret: parts[0].to_string(),
            expiry_hex: parts[1].to_string(),
            machine_hash: parts[2].to_string(),
            salt: parts[3].to_string(),
            signature: parts[4].to_string(),
        })
    }

    /// Builds a token from its first four fields and signs it.
    #[must_use]
    pub fn from_parts(secret: &str, expiry_hex: &str, machine_hash: &str, salt: &str) -> Self {
        Self {
            signature: sign(secret, expiry_hex, machine_hash, salt),
            secret: secret.to_string(),
            expiry_hex: expiry_hex.to_string(),
            machine_hash: machine_hash.to_string(),
            salt: salt.to_string(),
        }
    }

    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }

    #[must_use]
    pub fn expiry_hex(&self) -> &str {
        &self.expiry_hex
    }

    #[must_use]
    pub fn machine_hash(&self) -> &str {
        &self.machine_hash
    }

    #[must_use]
    pub fn salt(&self) -> &str {
        &self.salt
    }

    #[must_use]
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Recomputes the signature from the other four fields.
    #[must_use]
    pub fn expected_signature(&self) -> String {
        sign(&self.secret, &self.expiry_hex, &self.machine_hash, &self.salt)
    }

    /// Decodes the expiry field.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::InvalidExpiryEncoding`] if the field is not
    /// plain hex or is out of the representable range.
    pub fn expires_at(&self) -> LicenseResult<DateTime<Utc>> {
        decode_expiry(&self.expiry_hex)
    }

    /// Renders the wire format.
    #[must_use]
    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{SEPARATOR}{}{SEPARATOR}{}{SEPARATOR}{}{SEPARATOR}{}",
            self.secret, self.expiry_hex, self.machine_hash, self.salt, self.signature
        )
    }
}

impl FromStr for Token {
    type Err = LicenseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Token {
    type Error = LicenseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Token> for String {
    fn from(token: Token) -> Self {
        token.to_string()
    }
}

/// Truncated SHA-256 over the colon-joined signing input.
#[must_use]
pub fn sign(secret: &str, expiry_hex: &str, machine_hash: &str, salt: &str) -> String {
    let input = format!("{secret}:{expiry_hex}:{machine_hash}:{salt}");
    let mut hex = hex::encode(Sha256::digest(input.as_bytes()));
    hex.truncate(SIGNATURE_LEN);
    hex
}

/// Encodes a Unix timestamp as the expiry field. Pre-epoch clamps to zero.
#[must_use]
pub fn encode_expiry(at: DateTime<Utc>) -> String {
    format!("{:x}", u64::try_from(at.timestamp()).unwrap_or(0))
}

/// Decodes the expiry field into a timestamp.
///
/// # Errors
///
/// Returns [`LicenseError::InvalidExpiryEncoding`] for non-hex input or
/// timestamps chrono cannot represent.
pub fn decode_expiry(expiry_hex: &str) -> LicenseResult<DateTime<Utc>> {
    if expiry_hex.is_empty() || !expiry_hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(LicenseError::InvalidExpiryEncoding(expiry_hex.to_string()));
    }
    let secs = i64::from_str_radix(expiry_hex, 16)
        .map_err(|e| LicenseError::InvalidExpiryEncoding(format!("{expiry_hex}: {e}")))?;
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| LicenseError::InvalidExpiryEncoding(format!("{expiry_hex}: out of range")))
}

/// Parses an operator-supplied expiry in local time.
///
/// `YYYY-MM-DD HH:MM:SS` is tried first; a bare `YYYY-MM-DD` means the end
/// of that day (23:59:59).
///
/// # Errors
///
/// Returns [`LicenseError::InvalidExpiry`] when neither layout matches or the
/// local time does not exist (DST gap).
pub fn parse_expiry(text: &str) -> LicenseResult<DateTime<Utc>> {
    let text = text.trim();
    let naive = NaiveDateTime::parse_from_str(text, DATETIME_FORMAT)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, DATE_FORMAT)
                .ok()
                .and_then(|d| d.and_hms_opt(23, 59, 59))
        })
        .ok_or_else(|| LicenseError::InvalidExpiry(text.to_string()))?;

    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| LicenseError::InvalidExpiry(text.to_string()))
}

/// Formats a timestamp the way it appears in documents and logs (local time).
#[must_use]
pub fn format_local(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format(DATETIME_FORMAT).to_string()
}

/// How the expiry of a new token is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expiry {
    /// Valid for this many days from issuance.
    Days(i64),
    /// Valid until an exact instant.
    At(DateTime<Utc>),
    /// Operator text; falls back to `fallback_days` from now if unparseable.
    Text { text: String, fallback_days: i64 },
}

impl Expiry {
    /// Operator-supplied text with a fallback validity period.
    #[must_use]
    pub fn text(text: impl Into<String>, fallback_days: i64) -> Self {
        Self::Text {
            text: text.into(),
            fallback_days,
        }
    }
}

impl Default for Expiry {
    fn default() -> Self {
        Self::Days(DEFAULT_VALID_DAYS)
    }
}

/// The result of issuing a token.
#[derive(Debug, Clone)]
pub struct Issued {
    /// The minted token.
    pub token: Token,
    /// Decoded expiry, second precision.
    pub expires_at: DateTime<Utc>,
    /// The identity the token is bound to.
    pub identity: MachineIdentity,
    /// Expiry text that failed to parse, when the fallback period was used.
    pub rejected_expiry: Option<String>,
}

impl Issued {
    /// Expiry as `YYYY-MM-DD HH:MM:SS` local time.
    #[must_use]
    pub fn readable_expiry(&self) -> String {
        format_local(self.expires_at)
    }

    /// Returns true if the requested expiry was replaced by the fallback.
    #[must_use]
    pub fn used_fallback(&self) -> bool {
        self.rejected_expiry.is_some()
    }
}

/// Mints tokens against a clock.
#[derive(Debug, Clone, Default)]
pub struct TokenIssuer<C = SystemClock> {
    clock: C,
}

impl TokenIssuer<SystemClock> {
    /// Creates an issuer reading the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self { clock: SystemClock }
    }
}

impl<C: Clock> TokenIssuer<C> {
    /// Creates an issuer reading the given clock.
    pub fn with_clock(clock: C) -> Self {
        Self { clock }
    }

    /// Mints a token bound to `identity`.
    ///
    /// Unparseable expiry text is not an error: the fallback period is used
    /// and reported through [`Issued::rejected_expiry`].
    pub fn issue(&self, expiry: &Expiry, identity: &MachineIdentity) -> Issued {
        let now = self.clock.now();
        let mut rejected_expiry = None;

        let expires_at = match expiry {
            Expiry::Days(days) => days_from(now, *days),
            Expiry::At(at) => *at,
            Expiry::Text {
                text,
                fallback_days,
            } => match parse_expiry(text) {
                Ok(at) => at,
                Err(e) => {
                    warn!("{e}; using default validity of {fallback_days} days");
                    rejected_expiry = Some(text.clone());
                    days_from(now, *fallback_days)
                }
            },
        };

        let expiry_hex = encode_expiry(expires_at);
        let token = Token::from_parts(
            &random_alphanumeric(SECRET_LEN),
            &expiry_hex,
            &identity.hash_prefix(),
            &random_alphanumeric(SALT_LEN),
        );

        Issued {
            expires_at: decode_expiry(&expiry_hex).unwrap_or(expires_at),
            token,
            identity: identity.clone(),
            rejected_expiry,
        }
    }
}

/// `now` plus `days`. Counts outside `1..=MAX_VALID_DAYS` are replaced by
/// [`DEFAULT_VALID_DAYS`].
fn days_from(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    let days = if (1..=MAX_VALID_DAYS).contains(&days) {
        days
    } else {
        warn!("Validity of {days} days is out of range; using {DEFAULT_VALID_DAYS} days");
        DEFAULT_VALID_DAYS
    };
    Duration::try_days(days)
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(now)
}

fn random_alphanumeric(len: usize) -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
