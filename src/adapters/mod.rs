//! Adapters layer: Concrete implementations of ports.
//!
//! - `ckks`: CKKS-style homomorphic encryption
//! - `sqlite`: SQLite user store
//! - `memory`: in-memory user store
//! - `extractor`: precomputed-embedding extractor
//! - `sanitize`: log redaction

pub mod ckks;
pub mod extractor;
pub mod memory;
pub mod sanitize;
pub mod sqlite;

pub use ckks::{CkksAdapter, CkksContext, CkksVector, LazyVector};
pub use extractor::PrecomputedEmbeddingExtractor;
pub use memory::InMemoryUserStore;
pub use sqlite::{SqliteUserStore, StorageError};
