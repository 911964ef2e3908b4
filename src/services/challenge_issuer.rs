// src/services/challenge_issuer.rs
//! Login challenge issuance.
//!
//! A challenge is the human-readable text a client signs to prove key
//! possession:
//!
//! ```text
//! DID Login Challenge
//! DID: did:hebeu:7aa029b5-4eb2-4231-9651-1c8ebe39edc0
//! Timestamp: 1700000000000
//! Nonce: k3j9x0a1b2c3d
//! ```

use crate::models::did::Did;
use crate::utils::encoding::random_base36;
use std::fmt;

/// First line of every challenge.
pub const CHALLENGE_HEADER: &str = "DID Login Challenge";

/// Length of the random nonce, in base-36 characters.
pub const NONCE_LEN: usize = 13;

/// A login challenge bound to a DID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub did: String,
    /// Unix milliseconds at issuance
    pub timestamp_ms: i64,
    pub nonce: String,
}

impl Challenge {
    /// The exact text the client is expected to sign.
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Recovers the fields of a challenge text.
    ///
    /// Returns `None` for anything that is not exactly the four-line format
    /// produced by [`ChallengeIssuer::generate_challenge`].
    pub fn parse(text: &str) -> Option<Challenge> {
        let mut lines = text.split('\n');
        if lines.next()? != CHALLENGE_HEADER {
            return None;
        }
        let did = lines.next()?.strip_prefix("DID: ")?;
        let timestamp_ms = lines.next()?.strip_prefix("Timestamp: ")?.parse().ok()?;
        let nonce = lines.next()?.strip_prefix("Nonce: ")?;
        if lines.next().is_some() || did.is_empty() || nonce.is_empty() {
            return None;
        }

        Some(Challenge {
            did: did.to_string(),
            timestamp_ms,
            nonce: nonce.to_string(),
        })
    }
}

impl fmt::Display for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\nDID: {}\nTimestamp: {}\nNonce: {}",
            CHALLENGE_HEADER, self.did, self.timestamp_ms, self.nonce
        )
    }
}

/// Stateless challenge generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChallengeIssuer;

impl ChallengeIssuer {
    pub fn new() -> Self {
        ChallengeIssuer
    }

    /// Creates a fresh challenge for `did`, stamped with the current time.
    pub fn generate_challenge(&self, did: &Did) -> Challenge {
        Challenge {
            did: did.as_str().to_string(),
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            nonce: random_base36(&mut rand::thread_rng(), NONCE_LEN),
        }
    }
}
