//! In-memory storage implementation.
//!
//! All data is held in RAM behind a [`RwLock`] and is lost when the process
//! exits. Records live in `Vec`s so that listing preserves insertion order.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use super::{CredentialFilter, IdentifierFilter, Storage, StorageError};
use crate::credential::{UniqueCredential, UniquePresentation};
use crate::identifier::Identifier;
use crate::kms::StoredKey;
use crate::message::Message;

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Inner {
    identifiers: Vec<Identifier>,
    keys: HashMap<String, StoredKey>,
    credentials: Vec<UniqueCredential>,
    presentations: Vec<UniquePresentation>,
    messages: Vec<Message>,
}

// ---------------------------------------------------------------------------
// MemoryStorage
// ---------------------------------------------------------------------------

/// Thread-safe, in-memory implementation of [`Storage`].
#[derive(Default)]
pub struct MemoryStorage {
    inner: RwLock<Inner>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn key_count(&self) -> usize {
        self.inner.read().map(|inner| inner.keys.len()).unwrap_or_default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, StorageError> {
        self.inner
            .read()
            .map_err(|_| StorageError::Internal("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, StorageError> {
        self.inner
            .write()
            .map_err(|_| StorageError::Internal("memory store lock poisoned".into()))
    }
}

// ---------------------------------------------------------------------------
// Storage impl
// ---------------------------------------------------------------------------

#[async_trait]
impl Storage for MemoryStorage {
    // --- Identifiers ---------------------------------------------------------

    async fn create_identifier(&self, identifier: &Identifier) -> Result<(), StorageError> {
        let mut inner = self.write()?;
        if inner.identifiers.iter().any(|i| i.did == identifier.did) {
            return Err(StorageError::Conflict(format!(
                "identifier {} already exists",
                identifier.did
            )));
        }
        if let Some(alias) = &identifier.alias {
            let taken = inner
                .identifiers
                .iter()
                .any(|i| i.provider == identifier.provider && i.alias.as_ref() == Some(alias));
            if taken {
                return Err(StorageError::Conflict(format!(
                    "{} identifier with alias {alias} already exists",
                    identifier.provider
                )));
            }
        }
        inner.identifiers.push(identifier.clone());
        Ok(())
    }

    async fn update_identifier(&self, identifier: &Identifier) -> Result<(), StorageError> {
        let mut inner = self.write()?;
        let slot = inner
            .identifiers
            .iter_mut()
            .find(|i| i.did == identifier.did)
            .ok_or(StorageError::NotFound)?;
        *slot = identifier.clone();
        Ok(())
    }

    async fn get_identifier(&self, did: &str) -> Result<Option<Identifier>, StorageError> {
        let inner = self.read()?;
        Ok(inner.identifiers.iter().find(|i| i.did == did).cloned())
    }

    async fn find_identifiers(
        &self,
        filter: &IdentifierFilter,
    ) -> Result<Vec<Identifier>, StorageError> {
        let inner = self.read()?;
        Ok(inner
            .identifiers
            .iter()
            .filter(|i| filter.matches(i))
            .cloned()
            .collect())
    }

    async fn delete_identifier(&self, did: &str) -> Result<(), StorageError> {
        let mut inner = self.write()?;
        let before = inner.identifiers.len();
        inner.identifiers.retain(|i| i.did != did);
        if inner.identifiers.len() == before {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    // --- Keys ----------------------------------------------------------------

    async fn put_key(&self, key: &StoredKey) -> Result<(), StorageError> {
        let mut inner = self.write()?;
        inner.keys.insert(key.public.kid.clone(), key.clone());
        Ok(())
    }

    async fn get_key(&self, kid: &str) -> Result<Option<StoredKey>, StorageError> {
        let inner = self.read()?;
        Ok(inner.keys.get(kid).cloned())
    }

    async fn delete_key(&self, kid: &str) -> Result<(), StorageError> {
        let mut inner = self.write()?;
        inner.keys.remove(kid);
        Ok(())
    }

    // --- Credentials ---------------------------------------------------------

    async fn put_credential(&self, credential: &UniqueCredential) -> Result<bool, StorageError> {
        let mut inner = self.write()?;
        if inner.credentials.iter().any(|c| c.hash == credential.hash) {
            return Ok(false);
        }
        inner.credentials.push(credential.clone());
        Ok(true)
    }

    async fn list_credentials(
        &self,
        filter: &CredentialFilter,
    ) -> Result<Vec<UniqueCredential>, StorageError> {
        let inner = self.read()?;
        Ok(inner
            .credentials
            .iter()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect())
    }

    // --- Presentations -------------------------------------------------------

    async fn put_presentation(
        &self,
        presentation: &UniquePresentation,
    ) -> Result<bool, StorageError> {
        let mut inner = self.write()?;
        if inner.presentations.iter().any(|p| p.hash == presentation.hash) {
            return Ok(false);
        }
        inner.presentations.push(presentation.clone());
        Ok(true)
    }

    async fn list_presentations(&self) -> Result<Vec<UniquePresentation>, StorageError> {
        Ok(self.read()?.presentations.clone())
    }

    // --- Messages ------------------------------------------------------------

    async fn put_message(&self, message: &Message) -> Result<(), StorageError> {
        let mut inner = self.write()?;
        match inner.messages.iter_mut().find(|m| m.id == message.id) {
            Some(existing) => *existing = message.clone(),
            None => inner.messages.push(message.clone()),
        }
        Ok(())
    }

    async fn list_messages(&self) -> Result<Vec<Message>, StorageError> {
        Ok(self.read()?.messages.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
