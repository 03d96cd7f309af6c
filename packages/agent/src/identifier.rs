//! Managed identifiers: DIDs this agent controls.
//!
//! An [`Identifier`] ties a DID to the keys the [`KeyManager`] holds for it and
//! to the service endpoints published in its DID document. Two providers are
//! supported:
//!
//! | Provider | DID |
//! |----------|-----|
//! | `did:key` | derived from the Ed25519 public key (`did:key:z6Mk…`) |
//! | `did:web` | `did:web:<alias>`, the alias being a hostname; a port's `:` is written `%3A` |

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::kms::{KeyManager, KeyType, KmsError, PublicKey};
use crate::storage::{IdentifierFilter, Storage, StorageError};

/// Multicodec prefix for an Ed25519 public key.
const ED25519_MULTICODEC: [u8; 2] = [0xed, 0x01];

#[derive(Debug, Error)]
pub enum DidManagerError {
    #[error("identifier {0} not found")]
    NotFound(String),

    #[error("no {provider} identifier with alias {alias}")]
    AliasNotFound { provider: DidProvider, alias: String },

    #[error("unsupported DID provider: {0}")]
    UnsupportedProvider(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0} identifiers need an alias")]
    AliasRequired(DidProvider),

    #[error("service {service} not found on {did}")]
    ServiceNotFound { did: String, service: String },

    #[error(transparent)]
    Kms(#[from] KmsError),

    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for DidManagerError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Conflict(msg) => DidManagerError::Conflict(msg),
            other => DidManagerError::Storage(other),
        }
    }
}

// ---------------------------------------------------------------------------
// DidProvider
// ---------------------------------------------------------------------------

/// The DID method used when the agent creates identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DidProvider {
    #[serde(rename = "did:key")]
    Key,
    #[serde(rename = "did:web")]
    Web,
}

impl DidProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            DidProvider::Key => "did:key",
            DidProvider::Web => "did:web",
        }
    }
}

impl fmt::Display for DidProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DidProvider {
    type Err = DidManagerError;

    /// Accepts `did:key`/`did:web` and the bare method names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "did:key" | "key" => Ok(DidProvider::Key),
            "did:web" | "web" => Ok(DidProvider::Web),
            other => Err(DidManagerError::UnsupportedProvider(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Identifier
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    #[serde(rename = "type")]
    pub service_type: String,
    pub service_endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Service {
    pub fn new(
        id: impl Into<String>,
        service_type: impl Into<String>,
        service_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            service_type: service_type.into(),
            service_endpoint: service_endpoint.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A DID managed by this agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identifier {
    pub did: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub provider: DidProvider,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_key_id: Option<String>,
    #[serde(default)]
    pub keys: Vec<PublicKey>,
    #[serde(default)]
    pub services: Vec<Service>,
}

impl Identifier {
    /// The key used to sign on behalf of this identifier: the controller key
    /// when it is an Ed25519 key, otherwise the first Ed25519 key listed.
    pub fn signing_key(&self) -> Option<&PublicKey> {
        let ed25519 = |k: &&PublicKey| k.key_type == KeyType::Ed25519;
        self.controller_key_id
            .as_deref()
            .and_then(|kid| self.keys.iter().find(|k| k.kid == kid))
            .filter(ed25519)
            .or_else(|| self.keys.iter().find(ed25519))
    }

    pub fn service(&self, service_type: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.service_type == service_type)
    }

    /// The verification method id a key is published under: `did#<multibase>`
    /// for the key a `did:key` is derived from, `did#<kid>` otherwise.
    pub fn key_reference(&self, key: &PublicKey) -> String {
        match self.did.strip_prefix("did:key:") {
            Some(multibase) if self.controller_key_id.as_deref() == Some(key.kid.as_str()) => {
                format!("{}#{multibase}", self.did)
            }
            _ => format!("{}#{}", self.did, key.kid),
        }
    }

    /// DID document in the 2018 `publicKey`/`publicKeyHex` format, as served
    /// at `/.well-known/did.json` for `did:web` identifiers.
    pub fn did_document(&self) -> Value {
        let public_keys: Vec<Value> = self
            .keys
            .iter()
            .map(|key| {
                json!({
                    "id": format!("{}#{}", self.did, key.kid),
                    "type": match key.key_type {
                        KeyType::Secp256k1 => "Secp256k1VerificationKey2018",
                        KeyType::Ed25519 => "Ed25519VerificationKey2018",
                    },
                    "controller": self.did,
                    "publicKeyHex": key.public_key_hex,
                })
            })
            .collect();
        let authentication: Vec<Value> = self
            .keys
            .iter()
            .map(|key| {
                json!({
                    "type": match key.key_type {
                        KeyType::Secp256k1 => "Secp256k1SignatureAuthentication2018",
                        KeyType::Ed25519 => "Ed25519SignatureAuthentication2018",
                    },
                    "publicKey": format!("{}#{}", self.did, key.kid),
                })
            })
            .collect();

        json!({
            "@context": "https://w3id.org/did/v1",
            "id": self.did,
            "publicKey": public_keys,
            "authentication": authentication,
            "service": self.services,
        })
    }
}

// ---------------------------------------------------------------------------
// DID derivation
// ---------------------------------------------------------------------------

/// `z`-prefixed base58btc multibase of an Ed25519 public key with its
/// multicodec prefix.
pub fn ed25519_multibase(public_key: &[u8]) -> String {
    let mut prefixed = ED25519_MULTICODEC.to_vec();
    prefixed.extend_from_slice(public_key);
    format!("z{}", bs58::encode(prefixed).into_string())
}

/// Inverse of [`ed25519_multibase`]. `None` unless the input is a `z`
/// multibase string carrying exactly one Ed25519 key.
pub fn decode_ed25519_multibase(multibase: &str) -> Option<[u8; 32]> {
    let encoded = multibase.strip_prefix('z')?;
    let decoded = bs58::decode(encoded).into_vec().ok()?;
    let key = decoded.strip_prefix(&ED25519_MULTICODEC[..])?;
    key.try_into().ok()
}

pub fn did_key(public_key: &[u8]) -> String {
    format!("did:key:{}", ed25519_multibase(public_key))
}

/// `did:web` DID for a hostname alias such as `localhost:3000`.
pub fn did_web(alias: &str) -> String {
    format!("did:web:{}", alias.replace(':', "%3A"))
}

// ---------------------------------------------------------------------------
// DidManager
// ---------------------------------------------------------------------------

fn alias_conflict(provider: DidProvider, alias: &str) -> DidManagerError {
    DidManagerError::Conflict(format!(
        "{provider} identifier with alias {alias} already exists"
    ))
}

/// Creates and maintains identifiers in storage.
pub struct DidManager {
    store: Arc<dyn Storage>,
    keys: Arc<KeyManager>,
}

impl DidManager {
    pub fn new(store: Arc<dyn Storage>, keys: Arc<KeyManager>) -> Self {
        Self { store, keys }
    }

    /// Create a new identifier with a fresh Ed25519 key.
    ///
    /// `did:web` identifiers require an alias. Returns
    /// [`DidManagerError::Conflict`] if the provider already has an identifier
    /// with this alias.
    pub async fn create(
        &self,
        provider: DidProvider,
        alias: Option<&str>,
        kms: &str,
    ) -> Result<Identifier, DidManagerError> {
        self.create_with(provider, alias, kms, 0, |_| Vec::new()).await
    }

    /// Create an identifier carrying `extra_keys` more Ed25519 keys and the
    /// services `services` builds for the new DID.
    ///
    /// The identifier is stored complete in a single insert, so readers never
    /// see it half built. Keys created for an identifier that fails to insert
    /// are deleted again.
    pub async fn create_with<F>(
        &self,
        provider: DidProvider,
        alias: Option<&str>,
        kms: &str,
        extra_keys: usize,
        services: F,
    ) -> Result<Identifier, DidManagerError>
    where
        F: FnOnce(&str) -> Vec<Service> + Send,
    {
        if provider == DidProvider::Web && alias.is_none() {
            return Err(DidManagerError::AliasRequired(provider));
        }
        if let Some(alias) = alias {
            if self.find_one(provider, alias).await?.is_some() {
                return Err(alias_conflict(provider, alias));
            }
        }

        let mut created = Vec::new();
        let result = self
            .insert_new(provider, alias, kms, extra_keys, services, &mut created)
            .await;
        if result.is_err() {
            for key in &created {
                if let Err(e) = self.store.delete_key(&key.kid).await {
                    warn!(kid = %key.kid, "cannot discard key of unsaved identifier: {e}");
                }
            }
        }
        let identifier = result?;

        info!(did = %identifier.did, %provider, "identifier created");
        Ok(identifier)
    }

    async fn insert_new<F>(
        &self,
        provider: DidProvider,
        alias: Option<&str>,
        kms: &str,
        extra_keys: usize,
        services: F,
        created: &mut Vec<PublicKey>,
    ) -> Result<Identifier, DidManagerError>
    where
        F: FnOnce(&str) -> Vec<Service> + Send,
    {
        let controller = self.keys.create_key(kms, KeyType::Ed25519).await?;
        created.push(controller.clone());
        for _ in 0..extra_keys {
            created.push(self.keys.create_key(kms, KeyType::Ed25519).await?);
        }

        let did = match (provider, alias) {
            (DidProvider::Web, Some(alias)) => did_web(alias),
            _ => {
                let public = hex::decode(&controller.public_key_hex).map_err(|_| {
                    DidManagerError::Kms(KmsError::MalformedKey(controller.kid.clone()))
                })?;
                did_key(&public)
            }
        };

        let identifier = Identifier {
            services: services(&did),
            did,
            alias: alias.map(str::to_string),
            provider,
            controller_key_id: Some(controller.kid),
            keys: created.clone(),
        };
        match self.store.create_identifier(&identifier).await {
            Ok(()) => Ok(identifier),
            // Lost a race with another insert under the same alias.
            Err(StorageError::Conflict(msg)) => Err(match alias {
                Some(alias) => alias_conflict(provider, alias),
                None => DidManagerError::Conflict(msg),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Return the identifier with this alias, creating it if needed.
    ///
    /// Safe to call concurrently: every caller gets the same identifier.
    pub async fn get_or_create(
        &self,
        provider: DidProvider,
        alias: &str,
        kms: &str,
    ) -> Result<Identifier, DidManagerError> {
        if let Some(existing) = self.find_one(provider, alias).await? {
            return Ok(existing);
        }
        match self.create(provider, Some(alias), kms).await {
            Err(DidManagerError::Conflict(_)) => self.get_by_alias(provider, alias).await,
            other => other,
        }
    }

    pub async fn get(&self, did: &str) -> Result<Identifier, DidManagerError> {
        self.store
            .get_identifier(did)
            .await?
            .ok_or_else(|| DidManagerError::NotFound(did.to_string()))
    }

    pub async fn get_by_alias(
        &self,
        provider: DidProvider,
        alias: &str,
    ) -> Result<Identifier, DidManagerError> {
        self.find_one(provider, alias)
            .await?
            .ok_or_else(|| DidManagerError::AliasNotFound {
                provider,
                alias: alias.to_string(),
            })
    }

    /// All identifiers, optionally narrowed by provider and alias, in
    /// creation order.
    pub async fn find(
        &self,
        provider: Option<DidProvider>,
        alias: Option<&str>,
    ) -> Result<Vec<Identifier>, DidManagerError> {
        let filter = IdentifierFilter {
            provider,
            alias: alias.map(str::to_string),
        };
        Ok(self.store.find_identifiers(&filter).await?)
    }

    /// Attach an existing key. Adding a key twice is a no-op.
    pub async fn add_key(&self, did: &str, key: PublicKey) -> Result<Identifier, DidManagerError> {
        let mut identifier = self.get(did).await?;
        if !identifier.keys.iter().any(|k| k.kid == key.kid) {
            identifier.keys.push(key);
            self.store.update_identifier(&identifier).await?;
        }
        Ok(identifier)
    }

    /// Add a service, replacing any existing service with the same id.
    pub async fn add_service(
        &self,
        did: &str,
        service: Service,
    ) -> Result<Identifier, DidManagerError> {
        let mut identifier = self.get(did).await?;
        match identifier.services.iter_mut().find(|s| s.id == service.id) {
            Some(existing) if *existing == service => return Ok(identifier),
            Some(existing) => *existing = service,
            None => identifier.services.push(service),
        }
        self.store.update_identifier(&identifier).await?;
        Ok(identifier)
    }

    pub async fn remove_service(
        &self,
        did: &str,
        service_id: &str,
    ) -> Result<Identifier, DidManagerError> {
        let mut identifier = self.get(did).await?;
        let before = identifier.services.len();
        identifier.services.retain(|s| s.id != service_id);
        if identifier.services.len() == before {
            return Err(DidManagerError::ServiceNotFound {
                did: did.to_string(),
                service: service_id.to_string(),
            });
        }
        self.store.update_identifier(&identifier).await?;
        Ok(identifier)
    }

    /// Delete the identifier and the keys it lists.
    pub async fn delete(&self, did: &str) -> Result<(), DidManagerError> {
        let identifier = self.get(did).await?;
        for key in &identifier.keys {
            self.store.delete_key(&key.kid).await?;
        }
        self.store.delete_identifier(did).await?;
        info!(%did, "identifier deleted");
        Ok(())
    }

    async fn find_one(
        &self,
        provider: DidProvider,
        alias: &str,
    ) -> Result<Option<Identifier>, DidManagerError> {
        Ok(self
            .find(Some(provider), Some(alias))
            .await?
            .into_iter()
            .next())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kms::SecretBox;
    use crate::storage::memory::MemoryStorage;
    use crate::storage::sqlite::SqliteStorage;

    fn manager() -> DidManager {
        let store: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let keys = Arc::new(KeyManager::new(
            Arc::clone(&store),
            Some(SecretBox::new(&SecretBox::create_secret_key()).unwrap()),
        ));
        DidManager::new(store, keys)
    }

    #[test]
    fn multibase_round_trip() {
        let public = [42u8; 32];
        let mb = ed25519_multibase(&public);
        assert!(mb.starts_with("z6Mk"));
        assert_eq!(decode_ed25519_multibase(&mb), Some(public));
        assert_eq!(decode_ed25519_multibase("f00"), None);
    }

    #[test]
    fn web_did_encodes_port() {
        assert_eq!(did_web("localhost:3000"), "did:web:localhost%3A3000");
        assert_eq!(did_web("example.com"), "did:web:example.com");
    }

    #[test]
    fn provider_parsing() {
        assert_eq!("did:key".parse::<DidProvider>().unwrap(), DidProvider::Key);
        assert_eq!("web".parse::<DidProvider>().unwrap(), DidProvider::Web);
        assert!(matches!(
            "did:ethr".parse::<DidProvider>(),
            Err(DidManagerError::UnsupportedProvider(_))
        ));
    }

    #[test]
    fn legacy_document_lists_keys_and_services() {
        let mut id = Identifier {
            did: "did:web:example.com".into(),
            alias: Some("example.com".into()),
            provider: DidProvider::Web,
            controller_key_id: Some("ab".into()),
            keys: vec![
                PublicKey { kid: "ab".into(), kms: "local".into(), key_type: KeyType::Ed25519, public_key_hex: "ab".into() },
                PublicKey { kid: "02cd".into(), kms: "local".into(), key_type: KeyType::Secp256k1, public_key_hex: "02cd".into() },
            ],
            services: Vec::new(),
        };
        id.services.push(Service::new("did:web:example.com#messaging-1", "Messaging", "https://example.com/messaging"));

        let doc = id.did_document();
        assert_eq!(doc["@context"], "https://w3id.org/did/v1");
        assert_eq!(doc["publicKey"][0]["id"], "did:web:example.com#ab");
        assert_eq!(doc["publicKey"][0]["type"], "Ed25519VerificationKey2018");
        assert_eq!(doc["publicKey"][1]["type"], "Secp256k1VerificationKey2018");
        assert_eq!(doc["authentication"][1]["type"], "Secp256k1SignatureAuthentication2018");
        assert_eq!(doc["authentication"][0]["publicKey"], "did:web:example.com#ab");
        assert_eq!(doc["service"][0]["serviceEndpoint"], "https://example.com/messaging");
        assert_eq!(id.key_reference(&id.keys[0]), "did:web:example.com#ab");
    }

    #[tokio::test]
    async fn creates_did_key_identifier() {
        let dm = manager();
        let id = dm.create(DidProvider::Key, Some("agent"), "local").await.unwrap();
        assert!(id.did.starts_with("did:key:z6Mk"), "got {}", id.did);
        assert_eq!(id.keys.len(), 1);
        assert_eq!(id.controller_key_id.as_deref(), Some(id.keys[0].kid.as_str()));
        assert_eq!(id.signing_key().unwrap().kid, id.keys[0].kid);
        let multibase = id.did.strip_prefix("did:key:").unwrap();
        assert_eq!(id.key_reference(&id.keys[0]), format!("{}#{multibase}", id.did));
    }

    #[tokio::test]
    async fn web_identifier_requires_alias() {
        let dm = manager();
        assert!(matches!(
            dm.create(DidProvider::Web, None, "local").await,
            Err(DidManagerError::AliasRequired(DidProvider::Web))
        ));
        let id = dm.create(DidProvider::Web, Some("localhost:3000"), "local").await.unwrap();
        assert_eq!(id.did, "did:web:localhost%3A3000");
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let dm = manager();
        let a = dm.get_or_create(DidProvider::Key, "agent", "local").await.unwrap();
        let b = dm.get_or_create(DidProvider::Key, "agent", "local").await.unwrap();
        assert_eq!(a.did, b.did);
        assert_eq!(dm.find(None, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_alias_conflicts() {
        let dm = manager();
        dm.create(DidProvider::Key, Some("agent"), "local").await.unwrap();
        assert!(matches!(
            dm.create(DidProvider::Key, Some("agent"), "local").await,
            Err(DidManagerError::Conflict(_))
        ));
        // The same alias under another provider is fine.
        dm.create(DidProvider::Web, Some("agent"), "local").await.unwrap();
    }

    async fn race_get_or_create(store: Arc<dyn Storage>) -> Vec<Identifier> {
        let keys = Arc::new(KeyManager::new(Arc::clone(&store), None));
        let dm = Arc::new(DidManager::new(store, keys));
        let barrier = Arc::new(tokio::sync::Barrier::new(32));
        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let dm = Arc::clone(&dm);
                let barrier = Arc::clone(&barrier);
                tokio::spawn(async move {
                    barrier.wait().await;
                    dm.get_or_create(DidProvider::Key, "agent", "local").await
                })
            })
            .collect();
        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap().unwrap());
        }
        ids
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_get_or_create_in_memory() {
        let store = Arc::new(MemoryStorage::new());
        let ids = race_get_or_create(store.clone()).await;
        assert!(ids.iter().all(|id| id.did == ids[0].did));
        assert_eq!(store.find_identifiers(&IdentifierFilter::default()).await.unwrap().len(), 1);
        // Keys minted by the losing callers are discarded.
        assert_eq!(store.key_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_get_or_create_in_sqlite() {
        let store = Arc::new(SqliteStorage::open_in_memory().unwrap());
        let ids = race_get_or_create(store.clone()).await;
        assert!(ids.iter().all(|id| id.did == ids[0].did));
        assert_eq!(store.find_identifiers(&IdentifierFilter::default()).await.unwrap().len(), 1);
        assert_eq!(store.key_count(), 1);
    }

    #[tokio::test]
    async fn create_with_stores_keys_and_services_at_once() {
        let dm = manager();
        let id = dm
            .create_with(DidProvider::Web, Some("localhost:3000"), "local", 1, |did| {
                vec![Service::new(format!("{did}#messaging-1"), "Messaging", "https://localhost:3000/messaging")]
            })
            .await
            .unwrap();
        assert_eq!(id.keys.len(), 2);
        assert_eq!(id.controller_key_id.as_deref(), Some(id.keys[0].kid.as_str()));
        assert_eq!(id.services[0].id, "did:web:localhost%3A3000#messaging-1");
        assert_eq!(dm.get(&id.did).await.unwrap(), id);
    }

    #[tokio::test]
    async fn find_filters_by_provider_and_alias() {
        let dm = manager();
        dm.create(DidProvider::Key, Some("one"), "local").await.unwrap();
        dm.create(DidProvider::Key, Some("two"), "local").await.unwrap();
        dm.create(DidProvider::Web, Some("example.com"), "local").await.unwrap();

        assert_eq!(dm.find(None, None).await.unwrap().len(), 3);
        assert_eq!(dm.find(Some(DidProvider::Key), None).await.unwrap().len(), 2);
        let two = dm.find(None, Some("two")).await.unwrap();
        assert_eq!(two.len(), 1);
        assert_eq!(two[0].alias.as_deref(), Some("two"));
    }

    #[tokio::test]
    async fn services_are_upserted_and_removed() {
        let dm = manager();
        let id = dm.create(DidProvider::Web, Some("example.com"), "local").await.unwrap();
        let svc = Service::new(format!("{}#messaging-1", id.did), "Messaging", "https://example.com/messaging");

        dm.add_service(&id.did, svc.clone()).await.unwrap();
        dm.add_service(&id.did, svc.clone().with_description("inbox")).await.unwrap();
        let stored = dm.get(&id.did).await.unwrap();
        assert_eq!(stored.services.len(), 1);
        assert_eq!(stored.services[0].description.as_deref(), Some("inbox"));

        dm.remove_service(&id.did, &svc.id).await.unwrap();
        assert!(dm.get(&id.did).await.unwrap().services.is_empty());
        assert!(matches!(
            dm.remove_service(&id.did, &svc.id).await,
            Err(DidManagerError::ServiceNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn add_key_skips_duplicates() {
        let dm = manager();
        let id = dm.create(DidProvider::Key, None, "local").await.unwrap();
        let key = id.keys[0].clone();
        let updated = dm.add_key(&id.did, key).await.unwrap();
        assert_eq!(updated.keys.len(), 1);
    }

    #[tokio::test]
    async fn delete_removes_identifier() {
        let dm = manager();
        let id = dm.create(DidProvider::Key, None, "local").await.unwrap();
        dm.delete(&id.did).await.unwrap();
        assert!(matches!(dm.get(&id.did).await, Err(DidManagerError::NotFound(_))));
        assert!(matches!(dm.delete(&id.did).await, Err(DidManagerError::NotFound(_))));
    }
}
