//! Enrolled user record, as persisted by the user store.

use super::{EncryptedVector, PublicContextBytes, SecretContextBytes};

/// One enrolled user.
///
/// `enc_face` can only be decrypted with the context in `secret_context`.
#[derive(Clone)]
pub struct UserRecord {
    /// Unique key in the store
    pub username: String,

    pub email: String,

    /// Encrypted enrollment embedding
    pub enc_face: EncryptedVector,

    /// Secret form of the enrollment context
    pub secret_context: SecretContextBytes,

    /// Public form of the enrollment context (kept, unused by verification)
    pub public_context: PublicContextBytes,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl UserRecord {
    /// Create a record stamped with the current time.
    #[must_use]
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        enc_face: EncryptedVector,
        secret_context: SecretContextBytes,
        public_context: PublicContextBytes,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            enc_face,
            secret_context,
            public_context,
            created_at: chrono::Utc::now(),
        }
    }
}

// Email and key material stay out of logs.
impl std::fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserRecord")
            .field("username", &self.username)
            .field("enc_face", &self.enc_face)
            .field("secret_context", &self.secret_context)
            .field("public_context", &self.public_context)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}
