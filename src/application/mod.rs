//! Application layer: Use cases orchestrating domain and ports.
//!
//! Contains the enrollment and verification flows. Both are synchronous
//! units of work; services are `Send + Sync` and can be shared across
//! worker threads behind an `Arc`.

mod enrollment;
mod verification;

pub use enrollment::{EnrollmentReceipt, EnrollmentService};
pub use verification::VerificationService;

use crate::adapters::StorageError;
use crate::domain::{DimensionMismatch, FaceEmbedding};
use crate::FacecryptError;

/// Lift a store's error into the crate error, keeping duplicate-user intact.
fn storage_error<E: Into<StorageError>>(err: E) -> FacecryptError {
    let err: StorageError = err.into();
    err.into()
}

/// Pick the face to use from extractor output: the first one.
///
/// # Errors
/// `NoFaceDetected` for an empty list, `DimensionMismatch` if the chosen face
/// does not have `expected_dimension` components.
fn select_face(
    faces: Vec<FaceEmbedding>,
    expected_dimension: usize,
) -> Result<FaceEmbedding, FacecryptError> {
    let count = faces.len();
    let face = faces
        .into_iter()
        .next()
        .ok_or(FacecryptError::NoFaceDetected)?;
    if count > 1 {
        tracing::warn!("Detected {count} faces, using the first one");
    }
    if face.dimension() != expected_dimension {
        return Err(DimensionMismatch {
            expected: expected_dimension,
            actual: face.dimension(),
        }
        .into());
    }
    Ok(face)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared fixtures for flow tests.

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::adapters::{CkksAdapter, InMemoryUserStore};
    use crate::domain::{FaceEmbedding, SchemeConfig};
    use crate::ports::{EmbeddingExtractor, ExtractionError};

    /// Returns a fixed face list and counts invocations.
    pub struct StubExtractor {
        faces: Vec<Vec<f64>>,
        pub calls: AtomicUsize,
    }

    impl StubExtractor {
        pub fn returning(faces: Vec<Vec<f64>>) -> Arc<Self> {
            Arc::new(Self {
                faces,
                calls: AtomicUsize::new(0),
            })
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl EmbeddingExtractor for StubExtractor {
        fn extract(&self, _image: &[u8]) -> Result<Vec<FaceEmbedding>, ExtractionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.faces.iter().cloned().map(FaceEmbedding::new).collect())
        }
    }

    pub fn scheme() -> Arc<CkksAdapter> {
        Arc::new(
            CkksAdapter::new(SchemeConfig::with_scale_bits(4096, 40, false)).expect("adapter"),
        )
    }

    pub fn store() -> Arc<InMemoryUserStore> {
        Arc::new(InMemoryUserStore::new())
    }

    /// Deterministic 128-d embedding with components in [-0.2, 0.2].
    pub fn face(seed: f64) -> Vec<f64> {
        (0..128).map(|i| ((i as f64 + seed) * 0.37).sin() * 0.2).collect()
    }
}
