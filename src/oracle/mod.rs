// src/oracle/mod.rs
//! Read-only identity oracle.
//!
//! The protocol never talks to the ledger directly; it asks an
//! [`IdentityOracle`] whether a DID is registered and which key it carries.
//! [`crate::contracts::did_manager::DidManager`] answers from the chain,
//! [`memory::InMemoryRegistry`] answers from a local map.

pub mod memory;

use crate::models::did::{Did, DidDocument};
use async_trait::async_trait;

/// Oracle lookup failures.
///
/// `Unavailable` covers transport errors and timeouts and must never be
/// read as "the identity does not exist".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error("identity not found on ledger")]
    NotFound,

    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    #[error("ledger returned undecodable data: {0}")]
    Decode(String),
}

#[async_trait]
pub trait IdentityOracle: Send + Sync {
    /// Whether `did` is currently registered and active.
    async fn exists(&self, did: &Did) -> Result<bool, OracleError>;

    /// The registered main public key, hex-encoded as stored on the ledger.
    async fn public_key(&self, did: &Did) -> Result<String, OracleError>;

    /// The full registered DID document.
    async fn document(&self, did: &Did) -> Result<DidDocument, OracleError>;
}
