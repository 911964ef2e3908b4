// src/utils/encoding.rs
//! Text encoding helpers shared by the verifier and the challenge issuer.

use rand::Rng;

const BASE36_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Removes a single leading `0x`/`0X`, if present.
pub fn strip_hex_prefix(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}

/// True when `value` is exactly `len` ASCII hex digits (either case).
pub fn is_hex_of_len(value: &str, len: usize) -> bool {
    value.len() == len && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Random lowercase base-36 string of `len` characters.
pub fn random_base36<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| BASE36_ALPHABET[rng.gen_range(0..BASE36_ALPHABET.len())] as char)
        .collect()
}
