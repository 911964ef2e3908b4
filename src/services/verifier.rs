// src/services/verifier.rs
//! Personal-message signature verification for the DID system.
//!
//! A login signature is an Ethereum `personal_sign` signature over the
//! challenge text. It is accepted when the address recovered from it equals
//! the address derived from the public key registered for the DID.

use crate::utils::crypto::{
    decode_signature, derive_verification_address, normalize_public_key, CryptoError,
};
use ethers::types::Signature;
use log::debug;

/// Verifies `signature` over `message` against `expected_public_key`.
///
/// # Arguments
/// * `message` - Exact challenge text the client signed
/// * `signature` - 65-byte (r, s, v) signature as 130 hex characters, `0x` optional
/// * `expected_public_key` - Registered key in any encoding accepted by
///   [`normalize_public_key`]
///
/// # Returns
/// - `Ok(true)` if the recovered signer matches the key's address
/// - `Ok(false)` if it does not, or if the signature decodes but cannot be recovered
/// - `Err` if the key or the signature is syntactically malformed
///
/// # Process Flow
/// 1. Normalizes the key and derives its address
/// 2. Applies the EIP-191 prefix (`"\x19Ethereum Signed Message:\n" + len`) and hashes
/// 3. Recovers the signer and compares addresses
pub fn verify(
    message: &str,
    signature: &str,
    expected_public_key: &str,
) -> Result<bool, CryptoError> {
    let key = normalize_public_key(expected_public_key)?;
    let raw = decode_signature(signature)?;

    if key.is_parity_assumed() {
        debug!("verifying against an x-only key, assuming even parity");
    }
    let expected = derive_verification_address(&key)?;

    let signature = match Signature::try_from(&raw[..]) {
        Ok(signature) => signature,
        Err(e) => {
            debug!("signature does not decode: {}", e);
            return Ok(false);
        }
    };

    match signature.recover(message) {
        Ok(recovered) => {
            debug!("recovered signer {:?}, expected {:?}", recovered, expected);
            Ok(recovered == expected)
        }
        Err(e) => {
            debug!("signer recovery failed: {}", e);
            Ok(false)
        }
    }
}
