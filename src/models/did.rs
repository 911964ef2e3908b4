// src/models/did.rs
//! Decentralized Identifier (DID) data model.
//!
//! Identifiers accepted by this service follow the grammar
//! ```text
//! did:<namespace>:xxxxxxxx-xxxx-4xxx-yxxx-xxxxxxxxxxxx
//! ```
//! where the trailing segment is a hyphenated UUID v4 (`y` in `8, 9, a, b`).
//! The whole identifier is matched case-insensitively, but the original spelling
//! is kept because the ledger keys documents on the exact string.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::{Uuid, Variant};

/// Namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "hebeu";

const SCHEME: &str = "did:";
const HYPHEN_POSITIONS: [usize; 4] = [8, 13, 18, 23];

/// Reasons an identifier string is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DidError {
    #[error("missing `did:` scheme")]
    MissingScheme,

    #[error("namespace does not match `{expected}`")]
    WrongNamespace { expected: String },

    #[error("method-specific id is not a hyphenated UUID")]
    MalformedUuid,

    #[error("UUID version nibble must be 4")]
    WrongVersion,

    #[error("UUID variant nibble must be one of 8, 9, a, b")]
    WrongVariant,
}

/// A syntactically valid DID.
///
/// Construction goes through [`Did::parse`], so holding a `Did` means the
/// grammar check has already passed. Existence is only ever decided by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Did(String);

impl Did {
    /// Validates `raw` against the DID grammar for `namespace`.
    pub fn parse(raw: &str, namespace: &str) -> Result<Self, DidError> {
        let rest = strip_prefix_ignore_case(raw, SCHEME).ok_or(DidError::MissingScheme)?;
        let (found_namespace, id) = rest.split_once(':').ok_or_else(|| DidError::WrongNamespace {
            expected: namespace.to_string(),
        })?;

        if !found_namespace.eq_ignore_ascii_case(namespace) {
            return Err(DidError::WrongNamespace {
                expected: namespace.to_string(),
            });
        }

        check_uuid_v4(id)?;
        Ok(Did(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Did {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn strip_prefix_ignore_case<'a>(raw: &'a str, prefix: &str) -> Option<&'a str> {
    let head = raw.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &raw[prefix.len()..])
}

/// `Uuid::try_parse` also accepts the simple, braced and urn forms, so the
/// 8-4-4-4-12 layout is checked first.
fn check_uuid_v4(id: &str) -> Result<(), DidError> {
    let bytes = id.as_bytes();
    if bytes.len() != 36 || HYPHEN_POSITIONS.iter().any(|&i| bytes[i] != b'-') {
        return Err(DidError::MalformedUuid);
    }

    let uuid = Uuid::try_parse(id).map_err(|_| DidError::MalformedUuid)?;
    if uuid.get_version_num() != 4 {
        return Err(DidError::WrongVersion);
    }
    if uuid.get_variant() != Variant::RFC4122 {
        return Err(DidError::WrongVariant);
    }
    Ok(())
}

/// On-chain DID document as stored by the `DIDManager` contract.
///
/// Field names serialize in camelCase to match the contract struct and the
/// JSON the client applications already consume.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DidDocument {
    /// The complete DID string identifier
    pub did: String,

    /// Document revision counter, bumped on every update
    pub version: u64,

    pub created_at: String,
    pub updated_at: String,

    /// Hex-encoded secp256k1 key used for login challenges
    pub main_public_key: String,

    /// Hex-encoded recovery key
    pub reco_public_key: String,

    pub service_endpoint: String,

    /// Signature the holder produced when registering the document
    pub did_proof: String,

    /// Account that registered the document (0x-prefixed, lowercase)
    pub owner: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "did:hebeu:7aa029b5-4eb2-4231-9651-1c8ebe39edc0";

    #[test]
    fn accepts_canonical_identifier() {
        let did = Did::parse(VALID, DEFAULT_NAMESPACE).unwrap();
        assert_eq!(did.as_str(), VALID);
    }

    #[test]
    fn matching_is_case_insensitive_and_preserves_spelling() {
        let upper = "DID:HEBEU:7AA029B5-4EB2-4231-9651-1C8EBE39EDC0";
        let did = Did::parse(upper, DEFAULT_NAMESPACE).unwrap();
        assert_eq!(did.to_string(), upper);
    }

    #[test]
    fn rejects_missing_scheme() {
        let raw = "hebeu:7aa029b5-4eb2-4231-9651-1c8ebe39edc0";
        assert_eq!(Did::parse(raw, DEFAULT_NAMESPACE), Err(DidError::MissingScheme));
    }

    #[test]
    fn rejects_other_namespace() {
        let raw = "did:example:7aa029b5-4eb2-4231-9651-1c8ebe39edc0";
        assert!(matches!(
            Did::parse(raw, DEFAULT_NAMESPACE),
            Err(DidError::WrongNamespace { .. })
        ));
        assert!(Did::parse(raw, "example").is_ok());
    }

    #[test]
    fn rejects_wrong_version_nibble() {
        let raw = "did:hebeu:7aa029b5-4eb2-1231-9651-1c8ebe39edc0";
        assert_eq!(Did::parse(raw, DEFAULT_NAMESPACE), Err(DidError::WrongVersion));
    }

    #[test]
    fn rejects_wrong_variant_nibble() {
        let raw = "did:hebeu:7aa029b5-4eb2-4231-c651-1c8ebe39edc0";
        assert_eq!(Did::parse(raw, DEFAULT_NAMESPACE), Err(DidError::WrongVariant));
    }

    #[test]
    fn rejects_non_hyphenated_and_braced_forms() {
        for raw in [
            "did:hebeu:7aa029b54eb2423196511c8ebe39edc0",
            "did:hebeu:{7aa029b5-4eb2-4231-9651-1c8ebe39edc}",
            "did:hebeu:7aa029b5-4eb2-4231-9651-1c8ebe39edc0-",
            "did:hebeu:7aa029b5-4eb2-4231-9651-1c8ebe39edcg",
            "did:hebeu:",
            "did:",
            "",
        ] {
            assert!(Did::parse(raw, DEFAULT_NAMESPACE).is_err(), "accepted {raw}");
        }
    }

    #[test]
    fn document_serializes_in_camel_case() {
        let document = DidDocument {
            did: VALID.to_string(),
            version: 1,
            created_at: "2025-01-01".into(),
            updated_at: "2025-01-01".into(),
            main_public_key: "02ab".into(),
            reco_public_key: "03cd".into(),
            service_endpoint: "https://example.com".into(),
            did_proof: "0x00".into(),
            owner: "0x0000000000000000000000000000000000000001".into(),
        };

        let json = serde_json::to_value(&document).unwrap();
        assert_eq!(json["mainPublicKey"], "02ab");
        assert_eq!(json["serviceEndpoint"], "https://example.com");
        assert_eq!(json["didProof"], "0x00");
    }
}
