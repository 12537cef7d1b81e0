//! Verification service: compares a fresh capture against the enrolled template.

use std::sync::Arc;

use super::{select_face, storage_error};
use crate::domain::{MatchOutcome, MatchPolicy, DEFAULT_EMBEDDING_DIMENSION};
use crate::ports::{EmbeddingExtractor, HomomorphicScheme, UserStore};
use crate::FacecryptError;

/// Service for 1:1 verification of an enrolled user.
///
/// The verifier rebuilds the user's context from its secret form and
/// decrypts the stored template, so the comparison happens in the clear
/// inside this process. The live capture is never encrypted: it would be
/// decrypted again immediately by the same key holder.
pub struct VerificationService<H, S, X>
where
    H: HomomorphicScheme,
    S: UserStore,
    X: EmbeddingExtractor,
{
    scheme: Arc<H>,
    store: Arc<S>,
    extractor: Arc<X>,
    policy: MatchPolicy,
    embedding_dimension: usize,
}

impl<H, S, X> VerificationService<H, S, X>
where
    H: HomomorphicScheme,
    S: UserStore,
    S::Error: Into<crate::adapters::StorageError>,
    X: EmbeddingExtractor,
{
    /// Create a new verification service with the default match policy.
    pub fn new(scheme: Arc<H>, store: Arc<S>, extractor: Arc<X>) -> Self {
        Self {
            scheme,
            store,
            extractor,
            policy: MatchPolicy::default(),
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_embedding_dimension(mut self, dimension: usize) -> Self {
        self.embedding_dimension = dimension;
        self
    }

    /// Verify the face in `image` against `username`'s enrolled template.
    ///
    /// A non-match is an `Ok` outcome, not an error.
    ///
    /// # Errors
    /// - `UnknownUser` if nobody is enrolled under `username` (checked
    ///   before the extractor runs)
    /// - `NoFaceDetected` / `DimensionMismatch` for unusable extractor output
    /// - `Crypto` if the stored context or ciphertext cannot be used
    pub fn verify(&self, username: &str, image: &[u8]) -> Result<MatchOutcome, FacecryptError> {
        let username = username.trim();
        tracing::info!("Verifying user {username}...");

        let record = self
            .store
            .get(username)
            .map_err(storage_error)?
            .ok_or_else(|| FacecryptError::UnknownUser(username.to_string()))?;

        tracing::debug!("Step 1: Extracting face embedding...");
        let faces = self.extractor.extract(image)?;
        let probe = select_face(faces, self.embedding_dimension)?;

        tracing::debug!("Step 2: Loading enrollment context...");
        let ctx = self
            .scheme
            .deserialize_context(record.secret_context.as_bytes(), true)?;

        tracing::debug!("Step 3: Decrypting enrolled template...");
        let enrolled = self.scheme.decrypt(&record.enc_face, &ctx)?;
        drop(ctx);

        let outcome = self.policy.evaluate(&enrolled, &probe)?;
        tracing::info!(
            "Verification for {username}: {} (distance {:.4}, threshold {:.2})",
            if outcome.matched { "match" } else { "no match" },
            outcome.distance,
            outcome.threshold
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{face, scheme, store, StubExtractor};
    use crate::application::EnrollmentService;
    use crate::ErrorKind;

    fn enroll(store: &Arc<crate::adapters::InMemoryUserStore>, username: &str, seed: f64) {
        EnrollmentService::new(scheme(), store.clone(), StubExtractor::returning(vec![face(seed)]))
            .enroll(username, "user@example.com", b"img")
            .expect("enroll");
    }

    #[test]
    fn identical_face_matches() {
        let store = store();
        enroll(&store, "alice", 1.0);

        let service =
            VerificationService::new(scheme(), store, StubExtractor::returning(vec![face(1.0)]));
        let outcome = service.verify("alice", b"probe").expect("verify");
        assert!(outcome.matched);
        assert!(outcome.distance < 1e-3, "distance {}", outcome.distance);
    }

    #[test]
    fn shifted_face_does_not_match() {
        let store = store();
        enroll(&store, "bob", 1.0);

        let shifted: Vec<f64> = face(1.0).iter().map(|v| v + 1.0).collect();
        let service =
            VerificationService::new(scheme(), store, StubExtractor::returning(vec![shifted]));
        let outcome = service.verify("bob", b"probe").expect("verify");
        assert!(!outcome.matched);
        assert!(
            (outcome.distance - 128f64.sqrt()).abs() < 1e-2,
            "distance {}",
            outcome.distance
        );
    }

    #[test]
    fn unknown_user_skips_extraction() {
        let extractor = StubExtractor::returning(vec![]);
        let service = VerificationService::new(scheme(), store(), extractor.clone());
        let err = service.verify("nobody", b"probe").expect_err("unknown");
        assert_eq!(err.kind(), ErrorKind::UnknownUser);
        assert_eq!(extractor.call_count(), 0);
    }

    #[test]
    fn no_face_in_probe() {
        let store = store();
        enroll(&store, "carol", 3.0);
        let service = VerificationService::new(scheme(), store, StubExtractor::returning(vec![]));
        let err = service.verify("carol", b"probe").expect_err("no face");
        assert_eq!(err.kind(), ErrorKind::NoFaceDetected);
    }

    #[test]
    fn policy_threshold_is_applied() {
        let store = store();
        enroll(&store, "dave", 1.0);

        let nudged: Vec<f64> = face(1.0).iter().map(|v| v + 0.05).collect();
        let strict = VerificationService::new(
            scheme(),
            store.clone(),
            StubExtractor::returning(vec![nudged.clone()]),
        )
        .with_policy(MatchPolicy::with_threshold(0.1));
        assert!(!strict.verify("dave", b"probe").expect("verify").matched);

        let lenient =
            VerificationService::new(scheme(), store, StubExtractor::returning(vec![nudged]));
        assert!(lenient.verify("dave", b"probe").expect("verify").matched);
    }

    #[test]
    fn other_users_context_cannot_open_template() {
        let store = store();
        enroll(&store, "erin", 1.0);
        enroll(&store, "frank", 2.0);

        let mut record = store.get("erin").expect("get").expect("record");
        let other = store.get("frank").expect("get").expect("record");
        record.username = "mallory".into();
        record.secret_context = other.secret_context.clone();
        store.put(&record).expect("put");

        let service =
            VerificationService::new(scheme(), store, StubExtractor::returning(vec![face(1.0)]));
        let err = service.verify("mallory", b"probe").expect_err("isolated");
        assert_eq!(err.kind(), ErrorKind::Decryption);
    }
}
