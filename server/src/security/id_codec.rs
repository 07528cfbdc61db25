//! Reversible obfuscation of numeric ids for public URLs.
//!
//! An id is scaled by ten, its repeated digit sum is added as the last
//! decimal digit, and the result is written in base 58 (Bitcoin alphabet,
//! no `0 O I l`), most significant digit first, without padding.

use tracing::debug;

use crate::security::AuthError;

const ALPHABET: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Largest id whose scaled form still fits in an `i64`.
pub const MAX_ID: i64 = (i64::MAX - 9) / 10;

/// Collapse `value` to a single digit by summing its decimal digits until
/// one remains. Values below ten are returned as-is.
pub fn digit_sum(mut value: i64) -> i64 {
    while value >= 10 {
        let mut sum = 0;
        while value > 0 {
            sum += value % 10;
            value /= 10;
        }
        value = sum;
    }
    value
}

/// Encode `id` as an opaque base-58 string.
///
/// Negative ids and ids above [`MAX_ID`] are rejected.
pub fn obfuscate(id: i64) -> Result<String, AuthError> {
    if !(0..=MAX_ID).contains(&id) {
        return Err(AuthError::InvalidArgument(format!(
            "id {} is outside the encodable range 0..={}",
            id, MAX_ID
        )));
    }

    let scaled = id * 10 + digit_sum(id);
    Ok(encode_base58(scaled as u64))
}

/// Decode an opaque id.
///
/// Permissive: unknown characters, the empty string and values too long for
/// 64 bits all decode to `0`. The trailing checksum digit is dropped without
/// being checked. Existing links rely on this; use [`try_deobfuscate`] where
/// a wrong answer matters.
pub fn deobfuscate(encoded: &str) -> i64 {
    match decode_base58(encoded) {
        Some(scaled) => (scaled / 10) as i64,
        None => {
            debug!("Opaque id contains characters outside the alphabet");
            0
        }
    }
}

/// Strict variant of [`deobfuscate`]: rejects unknown characters, values
/// that overflow, and ids whose checksum digit does not match.
pub fn try_deobfuscate(encoded: &str) -> Result<i64, AuthError> {
    if encoded.is_empty() {
        return Err(AuthError::InvalidArgument("empty opaque id".into()));
    }

    let scaled = decode_base58(encoded)
        .filter(|v| *v <= i64::MAX as u64)
        .ok_or_else(|| AuthError::InvalidArgument(format!("invalid opaque id: {}", encoded)))?
        as i64;

    let id = scaled / 10;
    if scaled % 10 != digit_sum(id) {
        return Err(AuthError::InvalidArgument(format!(
            "checksum mismatch in opaque id: {}",
            encoded
        )));
    }

    Ok(id)
}

fn encode_base58(mut value: u64) -> String {
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(ALPHABET[(value % 58) as usize]);
        value /= 58;
    }
    digits.reverse();

    // Alphabet is ASCII.
    digits.into_iter().map(char::from).collect()
}

/// `None` on an unknown character or overflow.
fn decode_base58(encoded: &str) -> Option<u64> {
    encoded.bytes().try_fold(0u64, |acc, byte| {
        let pos = ALPHABET.iter().position(|&c| c == byte)? as u64;
        acc.checked_mul(58)?.checked_add(pos)
    })
}
