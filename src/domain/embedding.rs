//! Face embeddings produced by the external feature extractor.

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Default dimensionality of extractor output.
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 128;

/// A plaintext face feature vector.
///
/// Treated as biometric data: zeroized on drop and never printed by `Debug`.
/// Two embeddings are only comparable when produced by the same extractor.
#[derive(Clone, PartialEq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct FaceEmbedding {
    values: Vec<f64>,
}

impl FaceEmbedding {
    #[must_use]
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Number of components.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<Vec<f64>> for FaceEmbedding {
    fn from(values: Vec<f64>) -> Self {
        Self::new(values)
    }
}

impl std::fmt::Debug for FaceEmbedding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaceEmbedding")
            .field("dimension", &self.values.len())
            .finish()
    }
}
