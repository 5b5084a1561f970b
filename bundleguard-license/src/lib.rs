//! Machine-bound license tokens for bundleguard.
//!
//! This crate handles:
//! - Machine identity resolution with a fallback probe chain
//! - Token issuance bound to an identity and an expiry
//! - Offline token verification against an injectable clock
//!
//! # Token Format
//!
//! Tokens are formatted as: `secret.expiry_hex.machine_hash.salt.signature`
//! where the signature is a truncated SHA-256 over
//! `secret:expiry_hex:machine_hash:salt`.
//!
//! # Threat Model
//!
//! Both the token and the identity it is bound to can be read by the person
//! holding the machine. The scheme stops casual sharing between machines and
//! enforces expiry; it does not resist a determined local attacker and has no
//! revocation beyond expiry.

mod clock;
mod error;
mod identity;
mod token;
mod verify;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{LicenseError, LicenseResult};
pub use identity::{
    machine_hash, IdentityResolver, MachineIdentity, Probe, MACHINE_HASH_LEN, UNKNOWN_MACHINE,
};
pub use token::{
    decode_expiry, encode_expiry, format_local, parse_expiry, sign, Expiry, Issued, Token,
    TokenIssuer, DATETIME_FORMAT, DATE_FORMAT, DEFAULT_VALID_DAYS, MAX_VALID_DAYS, SALT_LEN,
    SECRET_LEN, SEPARATOR, SIGNATURE_LEN,
};
pub use verify::{verify, Rejection, Remaining, Verdict, Verifier};
