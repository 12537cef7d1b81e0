//! Homomorphic scheme port: encryption-context lifecycle and vector codec.
//!
//! Flows depend on this trait only, so the concrete library behind it can be
//! swapped without touching enrollment or verification logic.

use crate::domain::{
    CryptoError, EncryptedVector, FaceEmbedding, PublicContextBytes, SchemeConfig,
    SecretContextBytes,
};

/// Trait for homomorphic encryption schemes.
///
/// An implementation is bound to one `SchemeConfig`; every context it creates
/// or accepts uses exactly those parameters.
pub trait HomomorphicScheme: Send + Sync {
    /// Parameters plus key material. Holds the secret key only when created
    /// fresh or rebuilt from the secret form.
    type Context: Send + Sync;

    /// The parameters this scheme instance was configured with.
    fn config(&self) -> &SchemeConfig;

    /// Generate a fresh context with new key material.
    ///
    /// Uses a cryptographically secure random number generator. No two
    /// contexts can decrypt each other's ciphertexts.
    ///
    /// # Errors
    /// Returns `CryptoError::KeyGeneration` if key generation fails.
    fn create_context(&self) -> Result<Self::Context, CryptoError>;

    /// Serialize a context including its secret key.
    ///
    /// # Errors
    /// Returns `CryptoError::Serialization` if the context holds no secret key.
    fn serialize_secret(&self, ctx: &Self::Context) -> Result<SecretContextBytes, CryptoError>;

    /// Serialize a context without its secret key.
    ///
    /// # Errors
    /// Returns `CryptoError::Serialization` if serialization fails.
    fn serialize_public(&self, ctx: &Self::Context) -> Result<PublicContextBytes, CryptoError>;

    /// Rebuild a context from either serialized form.
    ///
    /// # Errors
    /// Returns `CryptoError::MalformedContext` if the bytes are truncated or
    /// corrupt, are not of the expected form, or were produced under
    /// different scheme parameters.
    fn deserialize_context(
        &self,
        bytes: &[u8],
        expect_secret: bool,
    ) -> Result<Self::Context, CryptoError>;

    /// Encrypt an embedding under the context's public key.
    ///
    /// # Errors
    /// Returns `CryptoError::Encoding` if the embedding is empty, too long for
    /// the slot count, or holds values the scheme cannot represent.
    fn encrypt(
        &self,
        embedding: &FaceEmbedding,
        ctx: &Self::Context,
    ) -> Result<EncryptedVector, CryptoError>;

    /// Decrypt a ciphertext with the context's secret key.
    ///
    /// Results are approximate; callers must tolerate small numeric drift.
    ///
    /// # Errors
    /// Returns `CryptoError::Decryption` if the context has no secret key or
    /// the ciphertext was not produced under this context.
    fn decrypt(
        &self,
        vector: &EncryptedVector,
        ctx: &Self::Context,
    ) -> Result<FaceEmbedding, CryptoError>;
}
