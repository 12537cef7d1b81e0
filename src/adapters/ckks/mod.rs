//! CKKS adapter: Implementation of HomomorphicScheme.
//!
//! A self-contained approximate-arithmetic RLWE scheme over
//! Z_q[X]/(X^N + 1) with a single 60-bit NTT prime.
//!
//! # Security
//!
//! - Key material comes from ChaCha20 seeded from OS entropy
//! - Ciphertexts carry the SHA-256 key id of their context; decrypting or
//!   linking under any other context fails instead of returning garbage
//! - Serialized contexts and ciphertexts are framed with an integrity digest
//! - Secret keys are zeroized on drop and never printed
//!
//! # Depth
//!
//! There is no relinearization or rescaling: supported homomorphic
//! operations are addition, subtraction and slot rotation. Encrypted
//! ciphertext multiplication is out of scope.

mod ciphertext;
mod context;
mod encoding;
mod framing;
mod keys;
mod params;
mod ring;
mod sampling;
mod vector;

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

pub use context::CkksContext;
pub use vector::{CkksVector, LazyVector};

use crate::domain::{
    CryptoError, EncryptedVector, FaceEmbedding, PublicContextBytes, SchemeConfig,
    SecretContextBytes,
};
use crate::ports::HomomorphicScheme;

/// CKKS-backed homomorphic scheme bound to one `SchemeConfig`.
#[derive(Debug, Clone)]
pub struct CkksAdapter {
    config: SchemeConfig,
}

impl CkksAdapter {
    /// Create an adapter for `config`.
    ///
    /// # Errors
    /// Returns `CryptoError::InvalidParameters` if `config` is out of range.
    pub fn new(config: SchemeConfig) -> Result<Self, CryptoError> {
        config.validate()?;
        tracing::info!(
            "Initializing CkksAdapter (N={}, scale=2^{:.0}, galois_keys={})",
            config.polynomial_modulus_degree,
            config.global_scale.log2(),
            config.galois_keys_enabled
        );
        Ok(Self { config })
    }

    /// Parse an encrypted vector without binding it to a context.
    ///
    /// # Errors
    /// Returns `CryptoError::Decryption` if the bytes are not a ciphertext.
    pub fn lazy_vector(&self, vector: &EncryptedVector) -> Result<LazyVector, CryptoError> {
        LazyVector::from_encrypted(vector)
    }

    /// Bind a lazy vector to `ctx` without re-encoding.
    ///
    /// # Errors
    /// Returns `CryptoError::Decryption` if the vector belongs to another context.
    pub fn link_context<'a>(
        &self,
        lazy: LazyVector,
        ctx: &'a CkksContext,
    ) -> Result<CkksVector<'a>, CryptoError> {
        lazy.link_context(ctx)
    }
}

impl HomomorphicScheme for CkksAdapter {
    type Context = CkksContext;

    fn config(&self) -> &SchemeConfig {
        &self.config
    }

    fn create_context(&self) -> Result<CkksContext, CryptoError> {
        tracing::debug!("Generating CKKS context...");
        let mut rng = ChaCha20Rng::from_entropy();
        let ctx = CkksContext::generate(self.config, &mut rng)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
        tracing::info!("Generated CKKS context - fingerprint: {}", ctx.fingerprint());
        Ok(ctx)
    }

    fn serialize_secret(&self, ctx: &CkksContext) -> Result<SecretContextBytes, CryptoError> {
        ctx.serialize(true).map(SecretContextBytes::from_bytes)
    }

    fn serialize_public(&self, ctx: &CkksContext) -> Result<PublicContextBytes, CryptoError> {
        ctx.serialize(false).map(PublicContextBytes::from_bytes)
    }

    fn deserialize_context(
        &self,
        bytes: &[u8],
        expect_secret: bool,
    ) -> Result<CkksContext, CryptoError> {
        let ctx = CkksContext::deserialize(bytes, &self.config, expect_secret)?;
        tracing::debug!(
            "Loaded {} context - fingerprint: {}",
            if expect_secret { "secret" } else { "public" },
            ctx.fingerprint()
        );
        Ok(ctx)
    }

    fn encrypt(
        &self,
        embedding: &FaceEmbedding,
        ctx: &CkksContext,
    ) -> Result<EncryptedVector, CryptoError> {
        tracing::debug!("Encrypting embedding ({} components)...", embedding.dimension());
        let mut rng = ChaCha20Rng::from_entropy();
        let encrypted = CkksVector::encrypt(ctx, embedding.as_slice(), &mut rng)?.serialize()?;
        tracing::debug!("Encrypted embedding - {} bytes", encrypted.size_bytes());
        Ok(encrypted)
    }

    fn decrypt(
        &self,
        vector: &EncryptedVector,
        ctx: &CkksContext,
    ) -> Result<FaceEmbedding, CryptoError> {
        tracing::debug!("Decrypting embedding...");
        let values = self.link_context(self.lazy_vector(vector)?, ctx)?.decrypt()?;
        Ok(FaceEmbedding::new(values))
    }
}
