use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Base58 alphabet without the visually ambiguous `0`, `O`, `I` and `l`
pub const ALPHABET: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Number of checksum bytes appended to the raw address
pub const CHECKSUM_LEN: usize = 4;

const BASE: u32 = 58;

/// Reverse lookup from ASCII byte to digit value
static ALPHABET_MAP: Lazy<[Option<u8>; 128]> = Lazy::new(|| {
    let mut map = [None; 128];
    for (value, &symbol) in ALPHABET.iter().enumerate() {
        map[symbol as usize] = Some(value as u8);
    }
    map
});

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Invalid base58 character '{character}' at position {position}")]
    InvalidCharacter { character: char, position: usize },
    #[error("Decoded payload too short to carry a checksum: {length} bytes")]
    ChecksumTooShort { length: usize },
    #[error("Checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: String, got: String },
    #[error("Invalid hex address: {0}")]
    InvalidHex(String),
}

/// First four bytes of SHA-256(SHA-256(payload))
pub fn checksum(payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    let first = Sha256::digest(payload);
    let second = Sha256::digest(first);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&second[..CHECKSUM_LEN]);
    out
}

/// Encode a raw hex address into its public base58check form
pub fn encode(raw_hex: &str) -> Result<String, CodecError> {
    let trimmed = raw_hex.trim();
    let without_prefix = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let bytes = hex::decode(without_prefix).map_err(|_| CodecError::InvalidHex(raw_hex.to_string()))?;
    Ok(encode_bytes(&bytes))
}

/// Append the checksum to `payload` and render the result in base58
pub fn encode_bytes(payload: &[u8]) -> String {
    let mut buffer = Vec::with_capacity(payload.len() + CHECKSUM_LEN);
    buffer.extend_from_slice(payload);
    buffer.extend_from_slice(&checksum(payload));
    base58_encode(&buffer)
}

/// Decode a public address back into raw hex, without verifying the checksum
pub fn decode(public: &str) -> Result<String, CodecError> {
    let (payload, _) = split_checksum(public)?;
    Ok(hex::encode(payload))
}

/// Decode a public address and verify its trailing checksum
pub fn decode_checked(public: &str) -> Result<String, CodecError> {
    let payload = decode_checked_bytes(public)?;
    Ok(hex::encode(payload))
}

/// Verify `public` and return its canonical encoding
pub fn canonicalize(public: &str) -> Result<String, CodecError> {
    let payload = decode_checked_bytes(public)?;
    Ok(encode_bytes(&payload))
}

fn decode_checked_bytes(public: &str) -> Result<Vec<u8>, CodecError> {
    let (payload, found) = split_checksum(public)?;
    let expected = checksum(&payload);
    if expected[..] != found[..] {
        return Err(CodecError::ChecksumMismatch {
            expected: hex::encode(expected),
            got: hex::encode(found),
        });
    }
    Ok(payload)
}

fn split_checksum(public: &str) -> Result<(Vec<u8>, Vec<u8>), CodecError> {
    let mut bytes = base58_decode(public)?;
    if bytes.len() <= CHECKSUM_LEN {
        return Err(CodecError::ChecksumTooShort { length: bytes.len() });
    }
    let found = bytes.split_off(bytes.len() - CHECKSUM_LEN);
    Ok((bytes, found))
}

fn base58_encode(buffer: &[u8]) -> String {
    // little-endian base58 digits
    let mut digits: Vec<u32> = vec![0];

    for &byte in buffer {
        for digit in digits.iter_mut() {
            *digit <<= 8;
        }
        digits[0] += byte as u32;

        let mut carry = 0u32;
        for digit in digits.iter_mut() {
            *digit += carry;
            carry = *digit / BASE;
            *digit %= BASE;
        }
        while carry > 0 {
            digits.push(carry % BASE);
            carry /= BASE;
        }
    }

    let leading_zeros = buffer
        .iter()
        .take(buffer.len().saturating_sub(1))
        .take_while(|&&b| b == 0)
        .count();
    digits.extend(std::iter::repeat(0).take(leading_zeros));

    digits
        .iter()
        .rev()
        .map(|&d| ALPHABET[d as usize] as char)
        .collect()
}

fn base58_decode(input: &str) -> Result<Vec<u8>, CodecError> {
    if input.is_empty() {
        return Ok(Vec::new());
    }

    // little-endian base256 bytes
    let mut bytes: Vec<u32> = vec![0];

    for (position, character) in input.chars().enumerate() {
        let value = lookup(character).ok_or(CodecError::InvalidCharacter { character, position })?;

        for byte in bytes.iter_mut() {
            *byte *= BASE;
        }
        bytes[0] += value as u32;

        let mut carry = 0u32;
        for byte in bytes.iter_mut() {
            *byte += carry;
            carry = *byte >> 8;
            *byte &= 0xff;
        }
        while carry > 0 {
            bytes.push(carry & 0xff);
            carry >>= 8;
        }
    }

    let char_count = input.chars().count();
    let leading_ones = input
        .chars()
        .take(char_count - 1)
        .take_while(|&c| c == '1')
        .count();
    bytes.extend(std::iter::repeat(0).take(leading_ones));

    Ok(bytes.iter().rev().map(|&b| b as u8).collect())
}

fn lookup(character: char) -> Option<u8> {
    if character.is_ascii() {
        ALPHABET_MAP[character as usize]
    } else {
        None
    }
}

/// Check whether a string is a well-formed public address with a valid checksum
pub fn is_valid_public_address(public: &str) -> bool {
    decode_checked(public).is_ok()
}
