// src/models/session.rs
//! Session credential data model.
//!
//! A session credential is a compact HS256 JWT whose claims assert that the
//! holder proved possession of the key registered for `did` at `iat`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Credential type tag carried in every session token.
pub const DID_AUTH_TYPE: &str = "did_auth";

/// Claims embedded in a session credential.
///
/// # Wire Format
/// ```json
/// { "did": "did:hebeu:…", "publicKey": "04…", "type": "did_auth", "iat": 1700000000, "exp": 1700086400 }
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    /// Authenticated DID
    pub did: String,

    /// Public key the login signature was verified against, as registered on-chain
    #[serde(rename = "publicKey")]
    pub public_key: String,

    /// Always [`DID_AUTH_TYPE`] for credentials minted here
    #[serde(rename = "type")]
    pub credential_type: String,

    /// Issued-at, unix seconds
    pub iat: i64,

    /// Expiry, unix seconds
    pub exp: i64,
}

impl SessionClaims {
    pub fn subject(&self) -> Subject {
        Subject {
            did: self.did.clone(),
            public_key: self.public_key.clone(),
        }
    }
}

/// The identity a credential is minted for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub did: String,
    pub public_key: String,
}

/// Credential lifetime, kept together with the label it was configured as
/// (`"24h"`) because clients receive the label verbatim as `expiresIn`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTtl {
    label: String,
    duration: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid credential lifetime `{0}`: expected <number><s|m|h|d>")]
pub struct InvalidTtl(pub String);

impl SessionTtl {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn as_secs(&self) -> i64 {
        i64::try_from(self.duration.as_secs()).unwrap_or(i64::MAX)
    }
}

impl Default for SessionTtl {
    fn default() -> Self {
        SessionTtl {
            label: "24h".to_string(),
            duration: Duration::from_secs(24 * 3600),
        }
    }
}

impl FromStr for SessionTtl {
    type Err = InvalidTtl;

    /// Parses `<number><unit>` with unit one of `s`, `m`, `h`, `d`.
    /// A bare number is read as seconds. Zero is rejected, as is anything
    /// that does not fit a signed unix-seconds offset.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let invalid = || InvalidTtl(raw.to_string());

        let (digits, multiplier) = match trimmed.char_indices().last() {
            Some((i, 's')) => (&trimmed[..i], 1),
            Some((i, 'm')) => (&trimmed[..i], 60),
            Some((i, 'h')) => (&trimmed[..i], 3600),
            Some((i, 'd')) => (&trimmed[..i], 86_400),
            Some(_) => (trimmed, 1),
            None => return Err(invalid()),
        };

        let value: u64 = digits.parse().map_err(|_| invalid())?;
        let secs = value
            .checked_mul(multiplier)
            .filter(|s| *s > 0 && i64::try_from(*s).is_ok())
            .ok_or_else(invalid)?;

        Ok(SessionTtl {
            label: trimmed.to_string(),
            duration: Duration::from_secs(secs),
        })
    }
}

impl fmt::Display for SessionTtl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}
