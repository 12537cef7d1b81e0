//! Precomputed-embedding extractor.
//!
//! Stands in for a face detector + encoder: the "image" is the detector's
//! JSON output, either `{"faces": [[f64, ...], ...]}` or a bare list of
//! faces. Faces are returned in file order.

use serde::Deserialize;

use crate::domain::FaceEmbedding;
use crate::ports::{EmbeddingExtractor, ExtractionError};

#[derive(Deserialize)]
#[serde(untagged)]
enum FaceFile {
    Wrapped { faces: Vec<Vec<f64>> },
    Bare(Vec<Vec<f64>>),
}

/// Reads face embeddings from JSON produced by an external detector.
#[derive(Debug, Default, Clone)]
pub struct PrecomputedEmbeddingExtractor;

impl PrecomputedEmbeddingExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl EmbeddingExtractor for PrecomputedEmbeddingExtractor {
    fn extract(&self, image: &[u8]) -> Result<Vec<FaceEmbedding>, ExtractionError> {
        let parsed: FaceFile = serde_json::from_slice(image)
            .map_err(|e| ExtractionError::InvalidImage(format!("Invalid face list: {e}")))?;
        let faces = match parsed {
            FaceFile::Wrapped { faces } | FaceFile::Bare(faces) => faces,
        };
        tracing::debug!("Extractor returned {} face(s)", faces.len());
        Ok(faces.into_iter().map(FaceEmbedding::new).collect())
    }
}
