// src/services/session_codec.rs
//! Session credential codec.
//!
//! Mints and verifies compact HS256 JWTs carrying [`SessionClaims`]. The
//! algorithm is pinned on decode, so tokens signed with anything but HS256
//! (including `none`) are rejected, and expiry is checked with zero leeway.

use crate::models::session::{SessionClaims, SessionTtl, Subject, DID_AUTH_TYPE};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Signature does not verify under the configured secret, or the header
    /// names another algorithm.
    #[error("credential signature is invalid")]
    BadSignature,

    #[error("credential has expired")]
    Expired,

    #[error("credential is malformed: {0}")]
    Malformed(String),

    #[error("failed to encode credential: {0}")]
    Encoding(String),
}

/// HS256 credential codec holding the server secret.
#[derive(Clone)]
pub struct SessionCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for SessionCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCodec")
            .field("algorithm", &Algorithm::HS256)
            .finish_non_exhaustive()
    }
}

impl SessionCodec {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat"]);

        SessionCodec {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Mints a credential for `subject` issued now.
    pub fn mint(
        &self,
        subject: &Subject,
        ttl: &SessionTtl,
    ) -> Result<(String, SessionClaims), CodecError> {
        self.mint_at(subject, chrono::Utc::now().timestamp(), ttl)
    }

    /// Mints a credential with an explicit issued-at (unix seconds).
    pub fn mint_at(
        &self,
        subject: &Subject,
        issued_at: i64,
        ttl: &SessionTtl,
    ) -> Result<(String, SessionClaims), CodecError> {
        self.mint_until(subject, issued_at, issued_at.saturating_add(ttl.as_secs()))
    }

    /// Mints a credential with explicit issued-at and expiry (unix seconds).
    pub fn mint_until(
        &self,
        subject: &Subject,
        issued_at: i64,
        expires_at: i64,
    ) -> Result<(String, SessionClaims), CodecError> {
        let claims = SessionClaims {
            did: subject.did.clone(),
            public_key: subject.public_key.clone(),
            credential_type: DID_AUTH_TYPE.to_string(),
            iat: issued_at,
            exp: expires_at,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| CodecError::Encoding(e.to_string()))?;
        Ok((token, claims))
    }

    /// Verifies signature and expiry and returns the embedded claims.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, CodecError> {
        decode::<SessionClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                JwtErrorKind::ExpiredSignature => CodecError::Expired,
                JwtErrorKind::InvalidSignature | JwtErrorKind::InvalidAlgorithm => {
                    CodecError::BadSignature
                }
                _ => CodecError::Malformed(e.to_string()),
            })
    }
}
