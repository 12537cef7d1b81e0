//! Ports layer: Trait definitions for external operations.
//!
//! These traits are the seams between the flows and everything they do not
//! own: the homomorphic scheme, the user store, and the feature extractor.

mod extractor;
mod scheme;
mod storage;

pub use extractor::{EmbeddingExtractor, ExtractionError};
pub use scheme::HomomorphicScheme;
pub use storage::UserStore;
