//! Byte framing for serialized contexts and ciphertexts.
//!
//! Layout: `magic(4) | version(1) | tag(1) | body | sha256(32)` where the
//! digest covers everything before it. The body is bincode.

use sha2::{Digest, Sha256};

pub const FORMAT_VERSION: u8 = 1;

const HEADER_LEN: usize = 6;
const DIGEST_LEN: usize = 32;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FramingError {
    #[error("input truncated ({0} bytes)")]
    Truncated(usize),

    #[error("unrecognized magic bytes")]
    BadMagic,

    #[error("unsupported format version {0}")]
    UnsupportedVersion(u8),

    #[error("integrity digest mismatch")]
    DigestMismatch,
}

/// Frame `body` under `magic` and `tag`.
pub fn frame(magic: &[u8; 4], tag: u8, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + body.len() + DIGEST_LEN);
    out.extend_from_slice(magic);
    out.push(FORMAT_VERSION);
    out.push(tag);
    out.extend_from_slice(body);
    let digest = Sha256::digest(&out);
    out.extend_from_slice(&digest);
    out
}

/// Check framing and return `(tag, body)`.
pub fn unframe<'a>(magic: &[u8; 4], bytes: &'a [u8]) -> Result<(u8, &'a [u8]), FramingError> {
    if bytes.len() < HEADER_LEN + DIGEST_LEN {
        return Err(FramingError::Truncated(bytes.len()));
    }
    if &bytes[..4] != magic {
        return Err(FramingError::BadMagic);
    }
    if bytes[4] != FORMAT_VERSION {
        return Err(FramingError::UnsupportedVersion(bytes[4]));
    }
    let (payload, digest) = bytes.split_at(bytes.len() - DIGEST_LEN);
    if Sha256::digest(payload).as_slice() != digest {
        return Err(FramingError::DigestMismatch);
    }
    Ok((bytes[5], &payload[HEADER_LEN..]))
}
