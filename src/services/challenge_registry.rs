// src/services/challenge_registry.rs
//! Issued-challenge registry.
//!
//! Optional login hardening: when enabled, every issued challenge is recorded
//! here and a login must present a challenge that this process issued for the
//! same DID, within the TTL, that has not been consumed yet.
//!
//! # Properties
//!
//! - Single use: consumption is an atomic remove, so two concurrent logins
//!   with the same challenge cannot both succeed
//! - Memory-bounded via `max_entries`, evicting the oldest challenge when full
//! - Expired entries are ignored on lookup and reclaimed periodically

use super::challenge_issuer::Challenge;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Default upper bound on outstanding challenges.
pub const DEFAULT_MAX_ENTRIES: usize = 100_000;

/// Why a submitted challenge was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ChallengeRejection {
    #[error("challenge was not issued here or was already used")]
    Unknown,

    #[error("challenge was issued for a different DID")]
    WrongIdentity,

    #[error("challenge has expired")]
    Expired,
}

struct Issued {
    did: String,
    at: Instant,
}

/// Concurrent map of outstanding challenges, keyed on the exact challenge text.
pub struct ChallengeRegistry {
    entries: DashMap<String, Issued>,
    ttl: Duration,
    max_entries: usize,
    insert_counter: AtomicU64,
}

impl ChallengeRegistry {
    /// Creates a registry whose challenges live for `ttl`.
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::with_capacity(max_entries.min(1024)),
            ttl,
            max_entries,
            insert_counter: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Records a freshly issued challenge.
    pub fn record(&self, challenge: &Challenge) {
        let count = self.insert_counter.fetch_add(1, Ordering::Relaxed);
        if count % 1000 == 0 {
            self.cleanup_expired();
        }

        if self.entries.len() >= self.max_entries {
            self.cleanup_expired();
            if self.entries.len() >= self.max_entries {
                self.evict_oldest();
            }
        }

        self.entries.insert(
            challenge.message(),
            Issued {
                did: challenge.did.clone(),
                at: Instant::now(),
            },
        );
    }

    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().at)
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }

    /// Checks that `message` is outstanding for `did`, without consuming it.
    ///
    /// A challenge naming another DID is refused as such even when this
    /// process never recorded it.
    pub fn check(&self, did: &str, message: &str) -> Result<(), ChallengeRejection> {
        let parsed = Challenge::parse(message).ok_or(ChallengeRejection::Unknown)?;
        if parsed.did != did {
            return Err(ChallengeRejection::WrongIdentity);
        }
        let entry = self.entries.get(message).ok_or(ChallengeRejection::Unknown)?;
        if entry.did != did {
            return Err(ChallengeRejection::WrongIdentity);
        }
        if entry.at.elapsed() >= self.ttl {
            return Err(ChallengeRejection::Expired);
        }
        Ok(())
    }

    /// Consumes `message` for `did`. Only one caller can ever succeed per challenge.
    pub fn consume(&self, did: &str, message: &str) -> Result<(), ChallengeRejection> {
        let now = Instant::now();
        let removed = self.entries.remove_if(message, |_, issued| {
            issued.did == did && now.duration_since(issued.at) < self.ttl
        });

        match removed {
            Some(_) => Ok(()),
            None => Err(self
                .check(did, message)
                .err()
                .unwrap_or(ChallengeRejection::Unknown)),
        }
    }

    /// Removes expired entries.
    pub fn cleanup_expired(&self) {
        let now = Instant::now();
        self.entries
            .retain(|_, issued| now.duration_since(issued.at) < self.ttl);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
