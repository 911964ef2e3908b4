// src/error.rs
//! Protocol error taxonomy.
//!
//! Every failure of the authentication protocol is an [`AuthError`]. Its
//! `Display` output carries internal detail for server logs; only the
//! [`ErrorKind`] code and its fixed public message cross to the client.

use serde::Serialize;

/// Client-visible error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    UnknownIdentity,
    KeyUnavailable,
    SignatureMismatch,
    OracleUnavailable,
    MalformedCredential,
    Expired,
    IdentityRevoked,
    ChallengeRejected,
    Internal,
}

impl ErrorKind {
    /// Stable machine-readable code.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::UnknownIdentity => "unknown_identity",
            ErrorKind::KeyUnavailable => "key_unavailable",
            ErrorKind::SignatureMismatch => "signature_mismatch",
            ErrorKind::OracleUnavailable => "oracle_unavailable",
            ErrorKind::MalformedCredential => "malformed_credential",
            ErrorKind::Expired => "expired",
            ErrorKind::IdentityRevoked => "identity_revoked",
            ErrorKind::ChallengeRejected => "challenge_rejected",
            ErrorKind::Internal => "internal",
        }
    }

    /// Fixed text returned to clients. Never includes request-specific detail.
    pub fn public_message(self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "request parameters are invalid",
            ErrorKind::UnknownIdentity => "identity is not registered",
            ErrorKind::KeyUnavailable => "registered public key could not be retrieved",
            ErrorKind::SignatureMismatch => "authentication failed",
            ErrorKind::OracleUnavailable => "identity ledger is unavailable, retry later",
            ErrorKind::MalformedCredential => "credential is invalid, login again",
            ErrorKind::Expired => "credential has expired, login again",
            ErrorKind::IdentityRevoked => "identity is no longer active, login again",
            ErrorKind::ChallengeRejected => "challenge is unknown, expired or already used",
            ErrorKind::Internal => "internal server error",
        }
    }

    /// Whether the same request may succeed if retried later.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::OracleUnavailable)
    }
}

/// Failure of a protocol operation, with internal detail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("identity {0} is not registered")]
    UnknownIdentity(String),

    #[error("public key unavailable for {did}: {reason}")]
    KeyUnavailable { did: String, reason: String },

    #[error("signature rejected for {did}: {reason}")]
    SignatureMismatch { did: String, reason: String },

    #[error("identity oracle unavailable: {0}")]
    OracleUnavailable(String),

    #[error("malformed credential: {0}")]
    MalformedCredential(String),

    #[error("credential expired")]
    Expired,

    #[error("identity {0} is no longer registered")]
    IdentityRevoked(String),

    #[error("challenge rejected: {0}")]
    ChallengeRejected(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::InvalidInput(_) => ErrorKind::InvalidInput,
            AuthError::UnknownIdentity(_) => ErrorKind::UnknownIdentity,
            AuthError::KeyUnavailable { .. } => ErrorKind::KeyUnavailable,
            AuthError::SignatureMismatch { .. } => ErrorKind::SignatureMismatch,
            AuthError::OracleUnavailable(_) => ErrorKind::OracleUnavailable,
            AuthError::MalformedCredential(_) => ErrorKind::MalformedCredential,
            AuthError::Expired => ErrorKind::Expired,
            AuthError::IdentityRevoked(_) => ErrorKind::IdentityRevoked,
            AuthError::ChallengeRejected(_) => ErrorKind::ChallengeRejected,
            AuthError::Internal(_) => ErrorKind::Internal,
        }
    }
}
