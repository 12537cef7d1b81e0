//! In-memory user store (tests and ephemeral runs).
//!
//! Thread-safe via `RwLock`. Not persistent: data lost on drop. Uniqueness is
//! checked and the record inserted under one write lock.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::RwLock;

use super::StorageError;
use crate::domain::UserRecord;
use crate::ports::UserStore;

#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserStore for InMemoryUserStore {
    type Error = StorageError;

    fn get(&self, username: &str) -> Result<Option<UserRecord>, Self::Error> {
        Ok(self.users.read().expect("Lock failed").get(username).cloned())
    }

    fn exists(&self, username: &str) -> Result<bool, Self::Error> {
        Ok(self.users.read().expect("Lock failed").contains_key(username))
    }

    fn put(&self, record: &UserRecord) -> Result<(), Self::Error> {
        match self
            .users
            .write()
            .expect("Lock failed")
            .entry(record.username.clone())
        {
            Entry::Occupied(_) => Err(StorageError::DuplicateUser(record.username.clone())),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(())
            }
        }
    }

    fn delete(&self, username: &str) -> Result<bool, Self::Error> {
        Ok(self
            .users
            .write()
            .expect("Lock failed")
            .remove(username)
            .is_some())
    }

    fn list_usernames(&self) -> Result<Vec<String>, Self::Error> {
        let mut names: Vec<String> = self
            .users
            .read()
            .expect("Lock failed")
            .keys()
            .cloned()
            .collect();
        names.sort();
        Ok(names)
    }

    fn count(&self) -> Result<usize, Self::Error> {
        Ok(self.users.read().expect("Lock failed").len())
    }
}
