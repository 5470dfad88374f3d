//! Hashing and binary encoding primitives shared by every wire format in the crate.
//!
//! Covers SHA-256/double-SHA-256/hash160 digests, Bitcoin-style CompactSize
//! varints, and Base58Check. Hex helpers live on [`crate::types::Hash256`]
//! directly since that is the only type that needs them.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use crate::error::EncodingError;

/// SHA-256 digest.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// SHA-256 applied twice, the digest used throughout the protocol for txids,
/// block hashes, and checksums.
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// `RIPEMD160(SHA256(data))`, the 20-byte digest used for P2PKH scripts.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let first = sha256(data);
    Ripemd160::digest(first).into()
}

/// Encode `value` using Bitcoin's CompactSize varint rule.
pub fn write_varint(out: &mut Vec<u8>, value: u64) {
    if value < 0xfd {
        out.push(value as u8);
    } else if value <= 0xffff {
        out.push(0xfd);
        out.extend_from_slice(&(value as u16).to_le_bytes());
    } else if value <= 0xffff_ffff {
        out.push(0xfe);
        out.extend_from_slice(&(value as u32).to_le_bytes());
    } else {
        out.push(0xff);
        out.extend_from_slice(&value.to_le_bytes());
    }
}

/// Decode a CompactSize varint from the front of `data`.
///
/// Returns the decoded value and the number of bytes consumed. Rejects
/// non-canonical (overlong) encodings, matching Bitcoin's strict decoder.
pub fn read_varint(data: &[u8]) -> Result<(u64, usize), EncodingError> {
    let tag = *data.first().ok_or(EncodingError::UnexpectedEof)?;
    match tag {
        0..=0xfc => Ok((tag as u64, 1)),
        0xfd => {
            let bytes = data.get(1..3).ok_or(EncodingError::UnexpectedEof)?;
            let value = u16::from_le_bytes(bytes.try_into().unwrap());
            if value < 0xfd {
                return Err(EncodingError::NonCanonicalVarint);
            }
            Ok((value as u64, 3))
        }
        0xfe => {
            let bytes = data.get(1..5).ok_or(EncodingError::UnexpectedEof)?;
            let value = u32::from_le_bytes(bytes.try_into().unwrap());
            if value <= 0xffff {
                return Err(EncodingError::NonCanonicalVarint);
            }
            Ok((value as u64, 5))
        }
        0xff => {
            let bytes = data.get(1..9).ok_or(EncodingError::UnexpectedEof)?;
            let value = u64::from_le_bytes(bytes.try_into().unwrap());
            if value <= 0xffff_ffff {
                return Err(EncodingError::NonCanonicalVarint);
            }
            Ok((value, 9))
        }
    }
}

/// Encode `payload` as Base58Check with the given version byte.
///
/// Prepends `version`, appends the first 4 bytes of
/// `double_sha256(version || payload)`, then Base58-encodes the result.
pub fn base58check_encode(version: u8, payload: &[u8]) -> String {
    let mut buf = Vec::with_capacity(1 + payload.len() + 4);
    buf.push(version);
    buf.extend_from_slice(payload);
    let checksum = double_sha256(&buf);
    buf.extend_from_slice(&checksum[0..4]);
    bs58::encode(buf).into_string()
}

/// Decode a Base58Check string, returning `(version_byte, payload)`.
///
/// Fails with [`EncodingError::InvalidEncoding`] if the string is not valid
/// Base58, too short to hold a version byte and checksum, or the checksum
/// does not match.
pub fn base58check_decode(input: &str) -> Result<(u8, Vec<u8>), EncodingError> {
    let raw = bs58::decode(input)
        .into_vec()
        .map_err(|_| EncodingError::InvalidEncoding)?;
    if raw.len() < 5 {
        return Err(EncodingError::InvalidEncoding);
    }
    let (body, checksum) = raw.split_at(raw.len() - 4);
    let expected = double_sha256(body);
    if &expected[0..4] != checksum {
        return Err(EncodingError::InvalidEncoding);
    }
    let version = body[0];
    let payload = body[1..].to_vec();
    Ok((version, payload))
}
