// src/utils/crypto.rs
//! Cryptographic utilities optimized for blockchain compatibility.
//!
//! Uses Keccak-256 (Ethereum's standard hash function) for address derivation
//! and secp256k1 (via `k256`) for point decoding.

use crate::utils::encoding::{is_hex_of_len, strip_hex_prefix};
use ethers::types::Address;
use ethers::utils::{hex, keccak256};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::PublicKey;

/// Length of an encoded (r, s, v) signature in hex characters.
pub const SIGNATURE_HEX_LEN: usize = 130;

/// Malformed inputs to the verification primitives.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid public key format: {0}")]
    InvalidPublicKeyFormat(String),

    #[error("invalid signature format: expected 130 hex characters")]
    InvalidSignatureFormat,
}

/// Computes a Keccak-256 hash of the input data (Ethereum-compatible).
pub fn hash_data(data: &[u8]) -> [u8; 32] {
    keccak256(data)
}

/// A secp256k1 public key, tagged by the encoding it arrived in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKeyEncoding {
    /// SEC1 compressed point (`02`/`03` prefix, 33 bytes).
    Compressed([u8; 33]),

    /// SEC1 uncompressed point (`04` prefix, 65 bytes). Inputs that arrived
    /// as the bare 64-byte X‖Y have the prefix restored.
    Uncompressed([u8; 65]),

    /// Bare 32-byte x coordinate.
    ///
    /// The ledger does not record the y parity for these keys, so an even y
    /// (`02` prefix) is assumed. For a key whose real point has odd y this
    /// decodes to the negated point and every signature from the real key
    /// will fail to verify.
    RawNoPrefix([u8; 32]),
}

impl PublicKeyEncoding {
    /// SEC1 bytes for this key, with the assumed `02` prefix for x-only keys.
    pub fn sec1_bytes(&self) -> Vec<u8> {
        match self {
            PublicKeyEncoding::Compressed(bytes) => bytes.to_vec(),
            PublicKeyEncoding::Uncompressed(bytes) => bytes.to_vec(),
            PublicKeyEncoding::RawNoPrefix(x) => {
                let mut bytes = Vec::with_capacity(33);
                bytes.push(0x02);
                bytes.extend_from_slice(x);
                bytes
            }
        }
    }

    /// True for the x-only encoding whose parity is assumed rather than known.
    pub fn is_parity_assumed(&self) -> bool {
        matches!(self, PublicKeyEncoding::RawNoPrefix(_))
    }

    /// Decodes the key to a curve point, rejecting encodings that are not on secp256k1.
    pub fn to_point(&self) -> Result<PublicKey, CryptoError> {
        PublicKey::from_sec1_bytes(&self.sec1_bytes())
            .map_err(|_| CryptoError::InvalidPublicKeyFormat("not a secp256k1 point".into()))
    }
}

/// Decodes a hex public key into its tagged encoding.
///
/// Accepted lengths (after an optional `0x`):
/// - 64 hex: bare x coordinate, see [`PublicKeyEncoding::RawNoPrefix`]
/// - 66 hex: compressed, must start with `02` or `03`
/// - 128 hex: uncompressed without the `04` prefix
/// - 130 hex: uncompressed with the `04` prefix
pub fn normalize_public_key(raw: &str) -> Result<PublicKeyEncoding, CryptoError> {
    let clean = strip_hex_prefix(raw.trim());
    let bytes = hex::decode(clean)
        .map_err(|e| CryptoError::InvalidPublicKeyFormat(format!("not hex: {e}")))?;

    match bytes.len() {
        32 => {
            let mut x = [0u8; 32];
            x.copy_from_slice(&bytes);
            Ok(PublicKeyEncoding::RawNoPrefix(x))
        }
        33 if matches!(bytes[0], 0x02 | 0x03) => {
            let mut compressed = [0u8; 33];
            compressed.copy_from_slice(&bytes);
            Ok(PublicKeyEncoding::Compressed(compressed))
        }
        64 => {
            let mut uncompressed = [0u8; 65];
            uncompressed[0] = 0x04;
            uncompressed[1..].copy_from_slice(&bytes);
            Ok(PublicKeyEncoding::Uncompressed(uncompressed))
        }
        65 if bytes[0] == 0x04 => {
            let mut uncompressed = [0u8; 65];
            uncompressed.copy_from_slice(&bytes);
            Ok(PublicKeyEncoding::Uncompressed(uncompressed))
        }
        33 | 65 => Err(CryptoError::InvalidPublicKeyFormat(format!(
            "unexpected prefix byte 0x{:02x}",
            bytes[0]
        ))),
        n => Err(CryptoError::InvalidPublicKeyFormat(format!(
            "unsupported length of {} hex characters",
            n * 2
        ))),
    }
}

/// Derives the Ethereum address a key signs as: the low 20 bytes of
/// Keccak-256 over the uncompressed X‖Y coordinates.
pub fn derive_verification_address(key: &PublicKeyEncoding) -> Result<Address, CryptoError> {
    let point = key.to_point()?.to_encoded_point(false);
    let hash = hash_data(&point.as_bytes()[1..]);
    Ok(Address::from_slice(&hash[12..]))
}

/// Syntax check for a signature: optional `0x` plus exactly 130 hex characters.
pub fn validate_signature_format(signature: &str) -> bool {
    is_hex_of_len(strip_hex_prefix(signature), SIGNATURE_HEX_LEN)
}

/// Decodes a signature that passes [`validate_signature_format`] into its 65 raw bytes.
pub fn decode_signature(signature: &str) -> Result<[u8; 65], CryptoError> {
    if !validate_signature_format(signature) {
        return Err(CryptoError::InvalidSignatureFormat);
    }
    let bytes = hex::decode(strip_hex_prefix(signature))
        .map_err(|_| CryptoError::InvalidSignatureFormat)?;
    let mut raw = [0u8; 65];
    raw.copy_from_slice(&bytes);
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::signers::{LocalWallet, Signer};
    use k256::ecdsa::SigningKey;

    fn wallet() -> (LocalWallet, SigningKey) {
        let key = SigningKey::random(&mut rand::thread_rng());
        (LocalWallet::from(key.clone()), key)
    }

    fn encoded(key: &SigningKey, compress: bool) -> Vec<u8> {
        key.verifying_key().to_encoded_point(compress).as_bytes().to_vec()
    }

    #[test]
    fn every_encoding_derives_the_wallet_address() {
        let (wallet, key) = wallet();
        let uncompressed = encoded(&key, false);
        let compressed = encoded(&key, true);

        let inputs = [
            hex::encode(&uncompressed),
            format!("0x{}", hex::encode(&uncompressed)),
            hex::encode(&uncompressed[1..]),
            hex::encode(&compressed),
            format!("0x{}", hex::encode(&compressed)),
        ];

        for input in inputs {
            let normalized = normalize_public_key(&input).unwrap();
            assert_eq!(derive_verification_address(&normalized).unwrap(), wallet.address());
        }
    }

    #[test]
    fn derivation_is_deterministic() {
        let (_, key) = wallet();
        let normalized = normalize_public_key(&hex::encode(encoded(&key, true))).unwrap();
        let first = derive_verification_address(&normalized).unwrap();
        for _ in 0..5 {
            assert_eq!(derive_verification_address(&normalized).unwrap(), first);
        }
    }

    #[test]
    fn x_only_key_matches_only_when_parity_is_even() {
        let mut seen_even = false;
        let mut seen_odd = false;

        while !(seen_even && seen_odd) {
            let (wallet, key) = wallet();
            let compressed = encoded(&key, true);
            let x_only = normalize_public_key(&hex::encode(&compressed[1..])).unwrap();
            assert!(x_only.is_parity_assumed());

            let derived = derive_verification_address(&x_only).unwrap();
            if compressed[0] == 0x02 {
                assert_eq!(derived, wallet.address());
                seen_even = true;
            } else {
                assert_ne!(derived, wallet.address());
                seen_odd = true;
            }
        }
    }

    #[test]
    fn tags_each_encoding() {
        let (_, key) = wallet();
        let uncompressed = encoded(&key, false);
        let compressed = encoded(&key, true);

        assert!(matches!(
            normalize_public_key(&hex::encode(&compressed)),
            Ok(PublicKeyEncoding::Compressed(_))
        ));
        assert!(matches!(
            normalize_public_key(&hex::encode(&uncompressed)),
            Ok(PublicKeyEncoding::Uncompressed(_))
        ));
        assert!(matches!(
            normalize_public_key(&hex::encode(&uncompressed[1..])),
            Ok(PublicKeyEncoding::Uncompressed(_))
        ));
        assert!(matches!(
            normalize_public_key(&hex::encode(&compressed[1..])),
            Ok(PublicKeyEncoding::RawNoPrefix(_))
        ));
    }

    #[test]
    fn rejects_unsupported_lengths_and_prefixes() {
        let bad = [
            String::new(),
            "0x".to_string(),
            "ab".repeat(31),
            "ab".repeat(34),
            "zz".repeat(32),
            format!("05{}", "ab".repeat(32)),
            format!("02{}", "ab".repeat(64)),
            "a".repeat(65),
        ];
        for input in bad {
            assert!(
                matches!(normalize_public_key(&input), Err(CryptoError::InvalidPublicKeyFormat(_))),
                "accepted {input:?}"
            );
        }
    }

    #[test]
    fn off_curve_point_is_rejected_at_derivation() {
        let mut bogus = [0u8; 65];
        bogus[0] = 0x04;
        let normalized = normalize_public_key(&hex::encode(bogus)).unwrap();
        assert!(derive_verification_address(&normalized).is_err());
    }

    #[test]
    fn signature_syntax() {
        let body = "ab".repeat(65);
        assert!(validate_signature_format(&body));
        assert!(validate_signature_format(&format!("0x{body}")));
        assert!(validate_signature_format(&body.to_uppercase()));
        assert!(!validate_signature_format(&body[..128]));
        assert!(!validate_signature_format(&format!("{body}00")));
        assert!(!validate_signature_format(&format!("0x{}", "zz".repeat(65))));
        assert_eq!(decode_signature("nope"), Err(CryptoError::InvalidSignatureFormat));
        assert_eq!(decode_signature(&body).unwrap()[64], 0xab);
    }
}
