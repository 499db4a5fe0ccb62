//! Fixed-width base-58 encoding used by the content identifier format.
//!
//! Unlike the usual Bitcoin-style encoding, leading zero bytes are not
//! special-cased: the value is always left-padded with the zero digit to a
//! fixed width, so every 512-bit digest encodes to exactly [`ENCODED_DIGITS`]
//! characters and decodes back to exactly 64 bytes.

const ALPHABET: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Number of base-58 digits needed for 64 bytes (58^88 > 2^512 > 58^87).
pub(super) const ENCODED_DIGITS: usize = 88;

pub(super) fn encode_fixed(bytes: &[u8], width: usize) -> String {
    // Little-endian base-58 digits.
    let mut digits: Vec<u8> = Vec::with_capacity(width);

    for &byte in bytes {
        let mut carry = u32::from(byte);
        for digit in digits.iter_mut() {
            carry += u32::from(*digit) << 8;
            *digit = (carry % 58) as u8;
            carry /= 58;
        }
        while carry > 0 {
            digits.push((carry % 58) as u8);
            carry /= 58;
        }
    }

    debug_assert!(digits.len() <= width, "value does not fit in {width} digits");
    digits.resize(width.max(digits.len()), 0);

    digits
        .iter()
        .rev()
        .map(|&d| ALPHABET[d as usize] as char)
        .collect()
}

/// Decodes `encoded` into exactly `byte_len` bytes.
///
/// Returns `None` for characters outside the alphabet or values that do not
/// fit in `byte_len` bytes.
pub(super) fn decode_fixed(encoded: &str, byte_len: usize) -> Option<Vec<u8>> {
    // Little-endian bytes.
    let mut bytes: Vec<u8> = Vec::with_capacity(byte_len);

    for c in encoded.bytes() {
        let value = ALPHABET.iter().position(|&a| a == c)?;
        let mut carry = value as u32;
        for byte in bytes.iter_mut() {
            carry += u32::from(*byte) * 58;
            *byte = (carry & 0xff) as u8;
            carry >>= 8;
        }
        while carry > 0 {
            bytes.push((carry & 0xff) as u8);
            carry >>= 8;
        }
    }

    if bytes.len() > byte_len {
        return None;
    }
    bytes.resize(byte_len, 0);
    bytes.reverse();
    Some(bytes)
}
