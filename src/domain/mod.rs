//! Domain layer: Core types and the match decision.
//!
//! Pure Rust types with no storage or scheme dependencies. Anything that can
//! reconstruct a biometric redacts itself in `Debug`.

mod crypto;
mod embedding;
pub mod matching;
mod scheme;
pub mod seal;
mod user;

pub use crypto::{CryptoError, EncryptedVector, PublicContextBytes, SecretContextBytes};
pub(crate) use crypto::compute_fingerprint;
pub use embedding::{FaceEmbedding, DEFAULT_EMBEDDING_DIMENSION};
pub use matching::{DimensionMismatch, MatchOutcome, MatchPolicy, DEFAULT_MATCH_THRESHOLD};
pub use scheme::{SchemeConfig, DEFAULT_SCALE_BITS, MAX_POLY_MODULUS_DEGREE, MIN_POLY_MODULUS_DEGREE};
pub use user::UserRecord;
