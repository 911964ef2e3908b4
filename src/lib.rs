// src/lib.rs

//! # DID Authentication Service
//!
//! Passwordless login for decentralized identities: a client proves it holds the
//! private key registered on-chain for a DID by signing a server-issued challenge,
//! and receives a signed session credential (HS256 JWT) in return.
//!
//! ## Architecture Overview
//! 1. **Blockchain Layer**: `LedgerClient` and the `DidManager` contract binding
//! 2. **Oracle Layer**: the `IdentityOracle` seam the protocol reads identities through
//! 3. **Services Layer**: challenge issuance, signature verification, session
//!    credentials, the login state machine and the HTTP API
//! 4. **Cryptography Layer**: public-key normalization and address derivation

pub mod blockchain;    // JSON-RPC access and network table
pub mod contracts;     // DIDManager contract binding
pub mod error;         // Protocol error taxonomy
pub mod models;        // Data structures
pub mod oracle;        // Identity oracle trait and in-memory registry
pub mod services;      // Business logic and API
pub mod settings;      // Environment-driven configuration
pub mod utils;         // Helper functions

pub use error::{AuthError, ErrorKind};
pub use models::did::{Did, DidDocument};
pub use models::session::{SessionClaims, SessionTtl, Subject};
pub use oracle::{IdentityOracle, OracleError};
pub use services::auth_service::{AuthConfig, AuthService, LoginOutcome};
