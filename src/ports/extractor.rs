//! Feature extractor port: image bytes in, face embeddings out.

use crate::domain::FaceEmbedding;

/// Errors raised by an extractor other than "no face found".
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("Invalid image data: {0}")]
    InvalidImage(String),

    #[error("Extractor failure: {0}")]
    Backend(String),
}

/// Trait for biometric feature extractors.
///
/// Returns every detected face in detector order; an empty vector means no
/// face was found. Picking a face is the caller's policy.
pub trait EmbeddingExtractor: Send + Sync {
    /// # Errors
    /// Returns `ExtractionError` if the image cannot be processed at all.
    fn extract(&self, image: &[u8]) -> Result<Vec<FaceEmbedding>, ExtractionError>;
}
