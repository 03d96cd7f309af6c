//! Storage abstraction for the agent's data store.
//!
//! The [`Storage`] trait is the only thing the key manager, DID manager and
//! credential store know about persistence. Records go in and come back out
//! unchanged; all validation happens above this layer.
//!
//! # Implementations
//!
//! | Type | When to use |
//! |------|-------------|
//! | [`MemoryStorage`] | Tests, throwaway agents |
//! | [`SqliteStorage`] | Demo servers; durable single-file database |
//!
//! [`MemoryStorage`]: memory::MemoryStorage
//! [`SqliteStorage`]: sqlite::SqliteStorage

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::credential::{UniqueCredential, UniquePresentation};
use crate::identifier::{DidProvider, Identifier};
use crate::kms::StoredKey;
use crate::message::Message;

// ---------------------------------------------------------------------------
// StorageError
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested item does not exist.
    #[error("not found")]
    NotFound,

    /// An item with the same key already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// An unexpected error in the underlying storage backend.
    #[error("internal storage error: {0}")]
    Internal(String),
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Query for [`Storage::find_identifiers`]. `None` fields match everything.
#[derive(Debug, Clone, Default)]
pub struct IdentifierFilter {
    pub provider: Option<DidProvider>,
    pub alias: Option<String>,
}

impl IdentifierFilter {
    pub fn matches(&self, identifier: &Identifier) -> bool {
        self.provider.map_or(true, |p| p == identifier.provider)
            && self
                .alias
                .as_deref()
                .map_or(true, |a| identifier.alias.as_deref() == Some(a))
    }
}

/// Query for [`Storage::list_credentials`].
#[derive(Debug, Clone, Default)]
pub struct CredentialFilter {
    /// Include only credentials issued by one of these DIDs. Empty means any
    /// issuer.
    pub issuers: Vec<String>,

    /// Include only credentials whose `credentialSubject.id` equals this.
    pub subject: Option<String>,
}

impl CredentialFilter {
    pub fn matches(&self, credential: &UniqueCredential) -> bool {
        let vc = &credential.verifiable_credential;
        let issuer_ok = self.issuers.is_empty()
            || vc
                .issuer_id()
                .is_some_and(|iss| self.issuers.iter().any(|i| i == iss));
        let subject_ok = self
            .subject
            .as_deref()
            .map_or(true, |s| vc.subject_id() == Some(s));
        issuer_ok && subject_ok
    }
}

// ---------------------------------------------------------------------------
// Storage trait
// ---------------------------------------------------------------------------

/// The persistence contract for an agent.
///
/// Implementations must be `Send + Sync + 'static` so they can be shared as an
/// `Arc<dyn Storage>`. Listing methods return records in insertion order.
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    // --- Identifiers ---------------------------------------------------------

    /// Insert a new identifier. Returns [`StorageError::Conflict`] if the DID
    /// already exists.
    async fn create_identifier(&self, identifier: &Identifier) -> Result<(), StorageError>;

    /// Replace a stored identifier. Returns [`StorageError::NotFound`] if the
    /// DID is unknown.
    async fn update_identifier(&self, identifier: &Identifier) -> Result<(), StorageError>;

    async fn get_identifier(&self, did: &str) -> Result<Option<Identifier>, StorageError>;

    async fn find_identifiers(
        &self,
        filter: &IdentifierFilter,
    ) -> Result<Vec<Identifier>, StorageError>;

    /// Returns [`StorageError::NotFound`] if the DID is unknown.
    async fn delete_identifier(&self, did: &str) -> Result<(), StorageError>;

    // --- Keys ----------------------------------------------------------------

    /// Insert or replace a key, keyed by `kid`.
    async fn put_key(&self, key: &StoredKey) -> Result<(), StorageError>;

    async fn get_key(&self, kid: &str) -> Result<Option<StoredKey>, StorageError>;

    /// Deleting an unknown key is not an error.
    async fn delete_key(&self, kid: &str) -> Result<(), StorageError>;

    // --- Credentials ---------------------------------------------------------

    /// Save a credential. Saving the same hash twice keeps the first copy and
    /// returns `false`.
    async fn put_credential(&self, credential: &UniqueCredential) -> Result<bool, StorageError>;

    async fn list_credentials(
        &self,
        filter: &CredentialFilter,
    ) -> Result<Vec<UniqueCredential>, StorageError>;

    // --- Presentations -------------------------------------------------------

    /// Idempotent by hash, like [`put_credential`](Self::put_credential).
    async fn put_presentation(
        &self,
        presentation: &UniquePresentation,
    ) -> Result<bool, StorageError>;

    async fn list_presentations(&self) -> Result<Vec<UniquePresentation>, StorageError>;

    // --- Messages ------------------------------------------------------------

    /// Save a handled message. Re-saving a message id replaces it.
    async fn put_message(&self, message: &Message) -> Result<(), StorageError>;

    async fn list_messages(&self) -> Result<Vec<Message>, StorageError>;
}

// ---------------------------------------------------------------------------
// Test fixtures shared by the backend tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod fixtures {
    use serde_json::json;

    use crate::credential::{
        Proof, UniqueCredential, UniquePresentation, UnsignedCredential, UnsignedPresentation,
        VerifiableCredential, VerifiablePresentation,
    };
    use crate::identifier::{DidProvider, Identifier, Service};
    use crate::kms::{KeyType, PublicKey, StoredKey};
    use crate::message::{Message, MessageType};

    pub fn stored_key(kid: &str) -> StoredKey {
        StoredKey {
            public: PublicKey {
                kid: kid.into(),
                kms: "local".into(),
                key_type: KeyType::Ed25519,
                public_key_hex: kid.into(),
            },
            private_key: "00".repeat(32),
            sealed: false,
        }
    }

    pub fn identifier(did: &str, alias: Option<&str>, provider: DidProvider) -> Identifier {
        Identifier {
            did: did.into(),
            alias: alias.map(str::to_string),
            provider,
            controller_key_id: Some("aa".into()),
            keys: vec![stored_key("aa").public],
            services: vec![Service::new(format!("{did}#messaging-1"), "Messaging", "https://example.com/messaging")],
        }
    }

    pub fn verifiable_credential(issuer: &str, subject: &str, name: &str) -> VerifiableCredential {
        let credential: UnsignedCredential = serde_json::from_value(json!({
            "@context": ["https://www.w3.org/2018/credentials/v1"],
            "type": ["VerifiableCredential"],
            "issuer": { "id": issuer },
            "issuanceDate": "2021-04-07T11:36:01.000Z",
            "credentialSubject": { "id": subject, "name": name }
        }))
        .unwrap();
        VerifiableCredential {
            credential,
            proof: Proof::jwt(format!("header.{name}.signature")),
        }
    }

    pub fn credential(issuer: &str, subject: &str, name: &str) -> UniqueCredential {
        UniqueCredential::new(verifiable_credential(issuer, subject, name)).unwrap()
    }

    pub fn presentation(holder: &str) -> UniquePresentation {
        let vp = VerifiablePresentation {
            presentation: UnsignedPresentation {
                holder: holder.into(),
                verifier: vec!["did:web:bank.example".into()],
                verifiable_credential: vec![verifiable_credential("did:web:issuer", holder, "x")],
                ..Default::default()
            },
            proof: Proof::jwt("header.vp.signature"),
        };
        UniquePresentation::new(vp).unwrap()
    }

    pub fn message(id: &str) -> Message {
        Message {
            id: id.into(),
            message_type: MessageType::W3cVc,
            from: Some("did:web:issuer".into()),
            to: Some("did:key:z6MkAlice".into()),
            created_at: Some("2021-04-07T11:36:01.000Z".into()),
            raw: "header.payload.signature".into(),
            data: None,
            credentials: vec![verifiable_credential("did:web:issuer", "did:key:z6MkAlice", "x")],
            presentations: Vec::new(),
        }
    }
}
