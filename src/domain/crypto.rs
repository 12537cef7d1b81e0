//! Cryptographic byte containers shared between the scheme and the store.
//!
//! The scheme adapter produces these; the store persists them opaquely.
//!
//! # Memory Security
//!
//! `SecretContextBytes` implements `Zeroize` and `ZeroizeOnDrop`: the secret
//! form reconstructs the enrolled biometric, so it is erased when dropped and
//! never printed by `Debug`.

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Error type for scheme operations.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Invalid scheme parameters: {0}")]
    InvalidParameters(String),

    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Encoding failed: {0}")]
    Encoding(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Malformed context: {0}")]
    MalformedContext(String),

    #[error("Homomorphic operation failed: {0}")]
    Computation(String),

    #[error("No Galois key available for rotation by {0} slots")]
    MissingGaloisKeys(usize),

    #[error("Serialization failed: {0}")]
    Serialization(String),
}

/// Secret form of an encryption context.
///
/// Possessing these bytes together with a ciphertext reconstructs the
/// plaintext embedding. Store with the same care as a plaintext template.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretContextBytes {
    inner: Vec<u8>,
}

impl SecretContextBytes {
    /// Wrap serialized secret-form bytes.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { inner: bytes }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.inner
    }

    /// Key fingerprint for logs. Hash of the bytes, not the bytes.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        compute_fingerprint(&self.inner)
    }
}

// Intentionally NOT exposing the bytes in Debug output.
impl std::fmt::Debug for SecretContextBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretContextBytes")
            .field("fingerprint", &self.fingerprint())
            .field("size_bytes", &self.inner.len())
            .finish()
    }
}

/// Public form of an encryption context: evaluation keys only, cannot decrypt.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicContextBytes {
    inner: Vec<u8>,
}

impl PublicContextBytes {
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { inner: bytes }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.inner
    }

    #[must_use]
    pub fn fingerprint(&self) -> String {
        compute_fingerprint(&self.inner)
    }
}

impl std::fmt::Debug for PublicContextBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicContextBytes")
            .field("fingerprint", &self.fingerprint())
            .field("size_bytes", &self.inner.len())
            .finish()
    }
}

/// Serialized ciphertext of one embedding.
///
/// Opaque to everything but the scheme adapter, which embeds the identifier
/// of the context that produced it.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedVector {
    ciphertext: Vec<u8>,
}

impl EncryptedVector {
    #[must_use]
    pub fn from_bytes(ciphertext: Vec<u8>) -> Self {
        Self { ciphertext }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Get the size of the ciphertext in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.ciphertext.len()
    }
}

impl std::fmt::Debug for EncryptedVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedVector")
            .field("size_bytes", &self.ciphertext.len())
            .finish()
    }
}

/// Compute a short fingerprint for identification using SHA-256.
///
/// First 8 bytes of the digest, hex encoded.
pub(crate) fn compute_fingerprint(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};

    let digest = Sha256::digest(bytes);
    digest[..8].iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_context_debug_no_leak() {
        let secret = SecretContextBytes::from_bytes(vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        let debug_output = format!("{secret:?}");

        assert!(!debug_output.contains("1, 2, 3"));
        assert!(debug_output.contains("fingerprint"));
        assert!(debug_output.contains("size_bytes: 10"));
    }

    #[test]
    fn test_fingerprint_uses_hash() {
        let fp = compute_fingerprint(&[0xde, 0xad, 0xbe, 0xef]);
        assert_ne!(fp, "deadbeef");
        assert_eq!(fp.len(), 16);
    }

    #[test]
    fn test_same_bytes_same_fingerprint() {
        let a = PublicContextBytes::from_bytes(vec![1, 2, 3, 4]);
        let b = PublicContextBytes::from_bytes(vec![1, 2, 3, 4]);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), PublicContextBytes::from_bytes(vec![4, 3, 2, 1]).fingerprint());
    }

    #[test]
    fn test_encrypted_vector_size() {
        let encrypted = EncryptedVector::from_bytes(vec![0u8; 1024]);
        assert_eq!(encrypted.size_bytes(), 1024);
        assert_eq!(format!("{encrypted:?}"), "EncryptedVector { size_bytes: 1024 }");
    }
}
