//! # Facecrypt
//!
//! Face verification with biometric templates encrypted at rest under a
//! CKKS-style homomorphic encryption scheme.
//!
//! Enrollment extracts a face embedding, generates a fresh encryption
//! context for the user, encrypts the embedding and stores the ciphertext
//! with both serialized forms of the context. Verification rebuilds the
//! context from its secret form, decrypts the stored template and compares
//! it with a fresh capture by Euclidean distance.
//!
//! ## Trust boundary
//!
//! The verifier holds the secret key: every stored record carries the secret
//! form of its context, so whoever can read the store (and its seal password,
//! if sealing is enabled) can recover the enrolled embedding. Encryption
//! protects templates at rest against a store dump; it is **not** a
//! zero-knowledge protocol and the comparison runs on plaintext.
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core types (embeddings, encrypted vectors, user records, match policy)
//! - `ports`: Trait definitions for the scheme, the user store and the extractor
//! - `adapters`: Concrete implementations (CKKS, SQLite, in-memory, JSON extractor)
//! - `application`: Enrollment and verification flows
//! - `config`: Environment-driven configuration

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use domain::{FaceEmbedding, MatchOutcome, MatchPolicy, SchemeConfig, UserRecord};

/// Result type for Facecrypt operations
pub type Result<T> = std::result::Result<T, FacecryptError>;

/// Main error type for Facecrypt
#[derive(Debug, thiserror::Error)]
pub enum FacecryptError {
    #[error("No face detected in the provided image")]
    NoFaceDetected,

    #[error(transparent)]
    DimensionMismatch(#[from] domain::DimensionMismatch),

    #[error("Cryptographic operation failed: {0}")]
    Crypto(#[from] domain::CryptoError),

    #[error("User already enrolled: {0}")]
    DuplicateUser(String),

    #[error("Unknown user: {0}")]
    UnknownUser(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Feature extraction failed: {0}")]
    Extraction(#[from] ports::ExtractionError),

    #[error("Storage operation failed: {0}")]
    Storage(adapters::StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<adapters::StorageError> for FacecryptError {
    fn from(err: adapters::StorageError) -> Self {
        match err {
            adapters::StorageError::DuplicateUser(username) => Self::DuplicateUser(username),
            other => Self::Storage(other),
        }
    }
}

/// Flat classification of every failure, for callers that branch on outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NoFaceDetected,
    DimensionMismatch,
    Encoding,
    Decryption,
    MalformedContext,
    DuplicateUser,
    UnknownUser,
    InvalidInput,
    Extraction,
    Storage,
    Config,
    Internal,
}

impl FacecryptError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        use domain::CryptoError;

        match self {
            Self::NoFaceDetected => ErrorKind::NoFaceDetected,
            Self::DimensionMismatch(_) => ErrorKind::DimensionMismatch,
            Self::Crypto(CryptoError::Encoding(_)) => ErrorKind::Encoding,
            Self::Crypto(CryptoError::Decryption(_)) => ErrorKind::Decryption,
            Self::Crypto(CryptoError::MalformedContext(_)) => ErrorKind::MalformedContext,
            Self::Crypto(CryptoError::InvalidParameters(_)) => ErrorKind::Config,
            Self::Crypto(_) => ErrorKind::Internal,
            Self::DuplicateUser(_) => ErrorKind::DuplicateUser,
            Self::UnknownUser(_) => ErrorKind::UnknownUser,
            Self::InvalidInput(_) | Self::Serialization(_) => ErrorKind::InvalidInput,
            Self::Extraction(_) => ErrorKind::Extraction,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Config(_) => ErrorKind::Config,
            Self::Io(_) => ErrorKind::Internal,
        }
    }
}
