//! SQLite adapter: Implementation of UserStore.
//!
//! Persists one row per enrolled user: contact fields, the encrypted face
//! template and both serialized context forms.
//!
//! # Security
//!
//! The secret context together with the ciphertext reconstructs the
//! enrolled face. When a seal password is configured, the `secret_context`
//! column is sealed at rest:
//! - Argon2id for key derivation from password
//! - AES-256-GCM for authenticated encryption
//! - Fresh salt and nonce per record
//!
//! # Mutex Behavior
//!
//! Database connection is protected by `Mutex`. A poisoned mutex (from panic
//! in another thread) will cause panic. This fail-fast behavior is intentional
//! for data integrity of biometric records.
use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use zeroize::Zeroizing;

use crate::domain::seal::{self, SealError, SealedSecret};
use crate::domain::{EncryptedVector, PublicContextBytes, SecretContextBytes, UserRecord};
use crate::ports::UserStore;

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("User already enrolled: {0}")]
    DuplicateUser(String),

    #[error("Sealing failed: {0}")]
    Seal(#[from] SealError),

    #[error("Secret context unseal failed: wrong password or corrupted data")]
    Unseal,

    #[error("Stored context fingerprint for {0} does not match its public context")]
    FingerprintMismatch(String),

    #[error("Missing seal password: record for {0} is sealed but no password is configured")]
    MissingPassword(String),
}

/// SQLite user store.
pub struct SqliteUserStore {
    conn: Mutex<Connection>,
    seal_password: Option<Zeroizing<String>>,
}

impl SqliteUserStore {
    /// Open (or create) the database at `path`.
    ///
    /// # Errors
    /// Returns error if database cannot be opened or initialized.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
            seal_password: None,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory SQLite database (for testing).
    ///
    /// # Errors
    /// Returns error if database cannot be created.
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
            seal_password: None,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Seal secret contexts written from now on, and unseal on read.
    #[must_use]
    pub fn with_seal_password(mut self, password: Zeroizing<String>) -> Self {
        self.seal_password = Some(password);
        self
    }

    /// Whether new records are sealed.
    pub fn is_sealing(&self) -> bool {
        self.seal_password.is_some()
    }

    fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.conn.lock().expect("Lock failed");

        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS users (
                username TEXT PRIMARY KEY,
                email TEXT NOT NULL,
                enc_face BLOB NOT NULL,
                secret_context BLOB NOT NULL,
                secret_sealed INTEGER NOT NULL,
                public_context BLOB NOT NULL,
                context_fingerprint TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            ",
        )?;

        Ok(())
    }

    fn seal_secret(&self, secret: &SecretContextBytes) -> Result<(Vec<u8>, bool), StorageError> {
        match &self.seal_password {
            Some(password) => {
                let sealed = seal::seal(secret.as_bytes(), password.as_str())?;
                Ok((sealed.to_bytes(), true))
            }
            None => Ok((secret.as_bytes().to_vec(), false)),
        }
    }

    fn unseal_secret(
        &self,
        username: &str,
        stored: Vec<u8>,
        sealed: bool,
    ) -> Result<SecretContextBytes, StorageError> {
        if !sealed {
            return Ok(SecretContextBytes::from_bytes(stored));
        }
        let password = self
            .seal_password
            .as_ref()
            .ok_or_else(|| StorageError::MissingPassword(username.to_string()))?;
        let envelope = SealedSecret::from_bytes(&stored).map_err(|_| StorageError::Unseal)?;
        let plaintext =
            seal::unseal(&envelope, password.as_str()).map_err(|_| StorageError::Unseal)?;
        Ok(SecretContextBytes::from_bytes(plaintext.to_vec()))
    }
}

struct UserRow {
    username: String,
    email: String,
    enc_face: Vec<u8>,
    secret_context: Vec<u8>,
    secret_sealed: bool,
    public_context: Vec<u8>,
    context_fingerprint: String,
    created_at: String,
}

impl UserStore for SqliteUserStore {
    type Error = StorageError;

    fn get(&self, username: &str) -> Result<Option<UserRecord>, Self::Error> {
        let row = {
            let conn = self.conn.lock().expect("Lock failed");
            conn.query_row(
                r"
                SELECT username, email, enc_face, secret_context, secret_sealed,
                       public_context, context_fingerprint, created_at
                FROM users WHERE username = ?1
                ",
                params![username],
                |row| {
                    Ok(UserRow {
                        username: row.get(0)?,
                        email: row.get(1)?,
                        enc_face: row.get(2)?,
                        secret_context: row.get(3)?,
                        secret_sealed: row.get::<_, i64>(4)? != 0,
                        public_context: row.get(5)?,
                        context_fingerprint: row.get(6)?,
                        created_at: row.get(7)?,
                    })
                },
            )
            .optional()?
        };

        let Some(row) = row else {
            return Ok(None);
        };

        let public_context = PublicContextBytes::from_bytes(row.public_context);
        if public_context.fingerprint() != row.context_fingerprint {
            return Err(StorageError::FingerprintMismatch(row.username));
        }

        let created_at = chrono::DateTime::parse_from_rfc3339(&row.created_at)
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .map_err(|e| StorageError::Serialization(format!("Invalid created_at: {e}")))?;
        let secret_context =
            self.unseal_secret(&row.username, row.secret_context, row.secret_sealed)?;

        Ok(Some(UserRecord {
            username: row.username,
            email: row.email,
            enc_face: EncryptedVector::from_bytes(row.enc_face),
            secret_context,
            public_context,
            created_at,
        }))
    }

    fn exists(&self, username: &str) -> Result<bool, Self::Error> {
        let conn = self.conn.lock().expect("Lock failed");

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE username = ?1",
            params![username],
            |row| row.get(0),
        )?;

        Ok(count > 0)
    }

    fn put(&self, record: &UserRecord) -> Result<(), Self::Error> {
        let (secret_blob, sealed) = self.seal_secret(&record.secret_context)?;
        let secret_blob = Zeroizing::new(secret_blob);
        let conn = self.conn.lock().expect("Lock failed");

        let result = conn.execute(
            r"
            INSERT INTO users (
                username, email, enc_face, secret_context, secret_sealed,
                public_context, context_fingerprint, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
            params![
                record.username,
                record.email,
                record.enc_face.as_bytes(),
                secret_blob.as_slice(),
                i64::from(sealed),
                record.public_context.as_bytes(),
                record.public_context.fingerprint(),
                record.created_at.to_rfc3339(),
            ],
        );

        match result {
            Ok(_) => {
                tracing::debug!("Saved user {} to storage (sealed={sealed})", record.username);
                Ok(())
            }
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(StorageError::DuplicateUser(record.username.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, username: &str) -> Result<bool, Self::Error> {
        let conn = self.conn.lock().expect("Lock failed");
        let removed = conn.execute("DELETE FROM users WHERE username = ?1", params![username])?;
        if removed > 0 {
            tracing::info!("Deleted user {username} from storage");
        }
        Ok(removed > 0)
    }

    fn list_usernames(&self) -> Result<Vec<String>, Self::Error> {
        let conn = self.conn.lock().expect("Lock failed");

        let mut stmt = conn.prepare("SELECT username FROM users ORDER BY username ASC")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        Ok(names)
    }

    fn count(&self) -> Result<usize, Self::Error> {
        let conn = self.conn.lock().expect("Lock failed");

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;

        Ok(count as usize)
    }
}
