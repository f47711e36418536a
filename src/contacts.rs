use crate::phone::validate_e164;
use crate::store::JsonStore;
use anyhow::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub const CONTACTS_FILE: &str = "contacts.json";

/// Phone number (E.164) to display name.
pub type Contacts = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum ContactError {
    #[error("Invalid phone number format: {0}")]
    InvalidNumber(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub struct ContactsDirectory {
    inner: JsonStore<Contacts>,
}

impl ContactsDirectory {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let inner = JsonStore::open(path)?;
        Ok(Self { inner })
    }

    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    pub async fn list(&self) -> Contacts {
        self.inner.snapshot().await
    }

    pub async fn lookup(&self, number: &str) -> Option<String> {
        self.inner.read(|contacts| contacts.get(number).cloned()).await
    }

    /// Inserts or overwrites the name stored for `number`.
    pub async fn upsert(&self, number: &str, name: &str) -> Result<(), ContactError> {
        let number =
            validate_e164(number).ok_or_else(|| ContactError::InvalidNumber(number.to_string()))?;
        self.inner
            .update(|contacts| {
                contacts.insert(number.clone(), name.to_string());
                Ok::<_, ContactError>(())
            })
            .await?;
        info!(number = %number, name, "contact saved");
        Ok(())
    }

    /// Removes `number`; absent numbers are not an error. Returns whether a
    /// contact was removed.
    pub async fn delete(&self, number: &str) -> Result<bool, ContactError> {
        let number = number.trim();
        if !self.inner.read(|contacts| contacts.contains_key(number)).await {
            return Ok(false);
        }
        let removed = self
            .inner
            .update(|contacts| Ok::<_, ContactError>(contacts.remove(number).is_some()))
            .await?;
        if removed {
            info!(number, "contact deleted");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::load_json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_upsert_overwrites() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONTACTS_FILE);
        let directory = ContactsDirectory::open(&path).unwrap();

        directory.upsert("+12125551234", "Alice").await.unwrap();
        directory.upsert("+12125551234", "Alice Smith").await.unwrap();
        directory.upsert("+972501234567", "").await.unwrap();

        let contacts = directory.list().await;
        assert_eq!(contacts.len(), 2);
        assert_eq!(contacts["+12125551234"], "Alice Smith");
        assert_eq!(
            directory.lookup("+972501234567").await.as_deref(),
            Some("")
        );

        let on_disk: Contacts = load_json(&path);
        assert_eq!(on_disk, contacts);
    }

    #[tokio::test]
    async fn test_upsert_rejects_invalid_number() {
        let dir = tempdir().unwrap();
        let directory = ContactsDirectory::open(dir.path().join(CONTACTS_FILE)).unwrap();
        let result = directory.upsert("555-1234", "Bob").await;
        assert!(matches!(result, Err(ContactError::InvalidNumber(_))));
        assert!(directory.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONTACTS_FILE);
        let directory = ContactsDirectory::open(&path).unwrap();
        directory.upsert("+12125551234", "Alice").await.unwrap();

        assert!(!directory.delete("+447700900000").await.unwrap());
        assert_eq!(directory.list().await.len(), 1);

        assert!(directory.delete("+12125551234").await.unwrap());
        assert!(!directory.delete("+12125551234").await.unwrap());
        assert!(directory.list().await.is_empty());
        let on_disk: Contacts = load_json(&path);
        assert!(on_disk.is_empty());
    }

    #[tokio::test]
    async fn test_open_corrupt_file_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONTACTS_FILE);
        std::fs::write(&path, "not json").unwrap();
        let directory = ContactsDirectory::open(&path).unwrap();
        assert!(directory.list().await.is_empty());
        assert_eq!(directory.lookup("+12125551234").await, None);
    }
}
