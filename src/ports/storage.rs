//! User store port: persistence of enrolled user records.

use crate::domain::UserRecord;

/// Trait for user-record storage keyed by username.
///
/// Username uniqueness is enforced here: `put` is the authority that rejects
/// the loser of two concurrent enrollments for the same name.
pub trait UserStore: Send + Sync {
    /// Error type for storage operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load a record.
    ///
    /// # Returns
    /// `None` if no such user exists.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn get(&self, username: &str) -> Result<Option<UserRecord>, Self::Error>;

    /// Check whether a username is taken.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn exists(&self, username: &str) -> Result<bool, Self::Error>;

    /// Insert a new record.
    ///
    /// # Errors
    /// Returns a duplicate-user error if the username already exists; the
    /// existing record is left untouched.
    fn put(&self, record: &UserRecord) -> Result<(), Self::Error>;

    /// Delete a record and with it the user's context material.
    ///
    /// # Returns
    /// `true` if a record was removed.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn delete(&self, username: &str) -> Result<bool, Self::Error>;

    /// All usernames, sorted.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn list_usernames(&self) -> Result<Vec<String>, Self::Error>;

    /// Number of enrolled users.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn count(&self) -> Result<usize, Self::Error>;
}
