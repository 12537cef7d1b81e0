//! Enrollment service: registers a user's encrypted face template.
//!
//! This service coordinates:
//! - Input validation and the duplicate check
//! - Feature extraction
//! - Fresh per-user context generation
//! - Template encryption
//! - Storage persistence

use std::sync::Arc;

use super::{select_face, storage_error};
use crate::domain::{UserRecord, DEFAULT_EMBEDDING_DIMENSION};
use crate::ports::{EmbeddingExtractor, HomomorphicScheme, UserStore};
use crate::FacecryptError;

/// What a successful enrollment produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentReceipt {
    pub username: String,
    /// Fingerprint of the user's public context
    pub context_fingerprint: String,
    pub ciphertext_bytes: usize,
}

/// Service for enrolling and removing users.
///
/// # Key Memory Security
///
/// The freshly generated context lives only for the duration of one
/// `enroll` call. Its secret form leaves the service solely inside the
/// persisted `UserRecord`.
pub struct EnrollmentService<H, S, X>
where
    H: HomomorphicScheme,
    S: UserStore,
    X: EmbeddingExtractor,
{
    scheme: Arc<H>,
    store: Arc<S>,
    extractor: Arc<X>,
    embedding_dimension: usize,
}

impl<H, S, X> EnrollmentService<H, S, X>
where
    H: HomomorphicScheme,
    S: UserStore,
    S::Error: Into<crate::adapters::StorageError>,
    X: EmbeddingExtractor,
{
    /// Create a new enrollment service.
    pub fn new(scheme: Arc<H>, store: Arc<S>, extractor: Arc<X>) -> Self {
        Self {
            scheme,
            store,
            extractor,
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
        }
    }

    /// Expected extractor output dimension.
    #[must_use]
    pub fn with_embedding_dimension(mut self, dimension: usize) -> Self {
        self.embedding_dimension = dimension;
        self
    }

    /// Enroll `username` with the face found in `image`.
    ///
    /// The duplicate check runs before any extraction or encryption work.
    ///
    /// # Errors
    /// - `InvalidInput` for an empty username or email
    /// - `DuplicateUser` if the username is taken (also when a concurrent
    ///   enrollment wins the race at insert time)
    /// - `NoFaceDetected` / `DimensionMismatch` for unusable extractor output
    /// - `Crypto` if context generation or encryption fails
    pub fn enroll(
        &self,
        username: &str,
        email: &str,
        image: &[u8],
    ) -> Result<EnrollmentReceipt, FacecryptError> {
        let username = username.trim();
        let email = email.trim();
        if username.is_empty() {
            return Err(FacecryptError::InvalidInput("username is required".into()));
        }
        if email.is_empty() {
            return Err(FacecryptError::InvalidInput("email is required".into()));
        }

        tracing::info!("Enrolling user {username}...");

        if self.store.exists(username).map_err(storage_error)? {
            tracing::info!("Enrollment rejected: {username} already exists");
            return Err(FacecryptError::DuplicateUser(username.to_string()));
        }

        tracing::debug!("Step 1: Extracting face embedding...");
        let faces = self.extractor.extract(image)?;
        let face = select_face(faces, self.embedding_dimension)?;

        tracing::debug!("Step 2: Generating encryption context...");
        let ctx = self.scheme.create_context()?;

        tracing::debug!("Step 3: Encrypting embedding...");
        let enc_face = self.scheme.encrypt(&face, &ctx)?;
        drop(face);

        tracing::debug!("Step 4: Serializing context forms...");
        let secret_context = self.scheme.serialize_secret(&ctx)?;
        let public_context = self.scheme.serialize_public(&ctx)?;
        drop(ctx);

        let receipt = EnrollmentReceipt {
            username: username.to_string(),
            context_fingerprint: public_context.fingerprint(),
            ciphertext_bytes: enc_face.size_bytes(),
        };

        tracing::debug!("Step 5: Saving user record...");
        let record = UserRecord::new(username, email, enc_face, secret_context, public_context);
        self.store.put(&record).map_err(storage_error)?;

        tracing::info!(
            "Enrolled {username} - context fingerprint: {}, ciphertext size: {} bytes",
            receipt.context_fingerprint,
            receipt.ciphertext_bytes
        );
        Ok(receipt)
    }

    /// Remove `username` and with it the only copy of their context.
    ///
    /// # Errors
    /// `UnknownUser` if no such user is enrolled.
    pub fn unenroll(&self, username: &str) -> Result<(), FacecryptError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(FacecryptError::InvalidInput("username is required".into()));
        }
        if !self.store.delete(username).map_err(storage_error)? {
            return Err(FacecryptError::UnknownUser(username.to_string()));
        }
        tracing::info!("Unenrolled {username}");
        Ok(())
    }

    /// Enrolled usernames, sorted.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    pub fn list_users(&self) -> Result<Vec<String>, FacecryptError> {
        self.store.list_usernames().map_err(storage_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{face, scheme, store, StubExtractor};
    use crate::ErrorKind;

    #[test]
    fn enroll_persists_both_context_forms() {
        let store = store();
        let service =
            EnrollmentService::new(scheme(), store.clone(), StubExtractor::returning(vec![face(1.0)]));

        let receipt = service
            .enroll("alice", "alice@example.com", b"img")
            .expect("enroll");
        assert_eq!(receipt.username, "alice");

        let record = store.get("alice").expect("get").expect("record");
        assert_eq!(record.email, "alice@example.com");
        assert!(!record.secret_context.as_bytes().is_empty());
        assert!(!record.public_context.as_bytes().is_empty());
        assert_ne!(record.secret_context.as_bytes(), record.public_context.as_bytes());
        assert_eq!(record.public_context.fingerprint(), receipt.context_fingerprint);
        assert_eq!(record.enc_face.size_bytes(), receipt.ciphertext_bytes);
    }

    #[test]
    fn duplicate_is_rejected_before_extraction() {
        let store = store();
        let extractor = StubExtractor::returning(vec![face(1.0)]);
        let service = EnrollmentService::new(scheme(), store.clone(), extractor.clone());

        service.enroll("bob", "bob@example.com", b"img").expect("first");
        let first = store.get("bob").expect("get").expect("record");
        assert_eq!(extractor.call_count(), 1);

        let err = service
            .enroll("bob", "other@example.com", b"img")
            .expect_err("duplicate");
        assert_eq!(err.kind(), ErrorKind::DuplicateUser);
        assert_eq!(extractor.call_count(), 1);

        let kept = store.get("bob").expect("get").expect("record");
        assert_eq!(kept.email, "bob@example.com");
        assert_eq!(kept.enc_face, first.enc_face);
    }

    #[test]
    fn no_face_stores_nothing() {
        let store = store();
        let service = EnrollmentService::new(scheme(), store.clone(), StubExtractor::returning(vec![]));
        let err = service
            .enroll("carol", "carol@example.com", b"img")
            .expect_err("no face");
        assert_eq!(err.kind(), ErrorKind::NoFaceDetected);
        assert_eq!(store.count().expect("count"), 0);
    }

    #[test]
    fn wrong_dimension_is_rejected() {
        let service = EnrollmentService::new(
            scheme(),
            store(),
            StubExtractor::returning(vec![vec![0.1; 64]]),
        );
        let err = service
            .enroll("dan", "dan@example.com", b"img")
            .expect_err("dimension");
        assert_eq!(err.kind(), ErrorKind::DimensionMismatch);
    }

    #[test]
    fn required_fields() {
        let extractor = StubExtractor::returning(vec![face(1.0)]);
        let service = EnrollmentService::new(scheme(), store(), extractor.clone());
        for (user, email) in [("", "e@example.com"), ("erin", "  ")] {
            let err = service.enroll(user, email, b"img").expect_err("invalid");
            assert_eq!(err.kind(), ErrorKind::InvalidInput);
        }
        assert_eq!(extractor.call_count(), 0);
    }

    #[test]
    fn unenroll_removes_record() {
        let store = store();
        let service =
            EnrollmentService::new(scheme(), store.clone(), StubExtractor::returning(vec![face(2.0)]));
        service.enroll("frank", "frank@example.com", b"img").expect("enroll");
        assert_eq!(service.list_users().expect("list"), vec!["frank".to_string()]);

        service.unenroll("frank").expect("unenroll");
        assert!(!store.exists("frank").expect("exists"));
        assert_eq!(
            service.unenroll("frank").expect_err("gone").kind(),
            ErrorKind::UnknownUser
        );
    }
}
