//! Key management: Ed25519 keypairs and the secret box that seals them.
//!
//! Every key is identified by its `kid`, the hex-encoded public key. The
//! private half never leaves this module: callers ask the [`KeyManager`] to
//! sign on their behalf.
//!
//! When the agent is configured with a KMS key, private keys are sealed with
//! a [`SecretBox`] (ChaCha20-Poly1305) before they reach storage; otherwise
//! they are stored as plain hex.

use std::sync::Arc;

use chacha20poly1305::aead::{Aead, KeyInit, OsRng as AeadOsRng};
use chacha20poly1305::{AeadCore, ChaCha20Poly1305, Key, Nonce};
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::storage::{Storage, StorageError};

/// ChaCha20-Poly1305 nonce length (96 bits).
const NONCE_LEN: usize = 12;

/// Secret box keys are 32 bytes, written as 64 hex characters.
pub const SECRET_KEY_HEX_LEN: usize = 64;

#[derive(Debug, Error)]
pub enum KmsError {
    #[error("secret box key must be {SECRET_KEY_HEX_LEN} hex characters")]
    InvalidSecretKey,

    #[error("failed to seal private key")]
    Seal,

    #[error("failed to open sealed private key: wrong secret box key or corrupted data")]
    Open,

    #[error("key {0} is sealed but no secret box key is configured")]
    Locked(String),

    #[error("key {0} not found")]
    KeyNotFound(String),

    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),

    #[error("stored private key for {0} is malformed")]
    MalformedKey(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// The key algorithms an identifier may list.
///
/// Only [`KeyType::Ed25519`] keys can be created and used for signing here;
/// `Secp256k1` keys can be attached to an identifier as public keys only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyType {
    Ed25519,
    Secp256k1,
}

impl std::fmt::Display for KeyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyType::Ed25519 => write!(f, "Ed25519"),
            KeyType::Secp256k1 => write!(f, "Secp256k1"),
        }
    }
}

impl std::str::FromStr for KeyType {
    type Err = KmsError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Ed25519" => Ok(KeyType::Ed25519),
            "Secp256k1" => Ok(KeyType::Secp256k1),
            other => Err(KmsError::UnsupportedKeyType(other.to_string())),
        }
    }
}

/// The public view of a managed key, as listed on an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKey {
    pub kid: String,
    pub kms: String,
    #[serde(rename = "type")]
    pub key_type: KeyType,
    pub public_key_hex: String,
}

/// A key as persisted by [`Storage`].
///
/// `private_key` is the hex seed, or the hex sealed blob when `sealed` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredKey {
    pub public: PublicKey,
    pub private_key: String,
    pub sealed: bool,
}

// ---------------------------------------------------------------------------
// SecretBox
// ---------------------------------------------------------------------------

/// Authenticated encryption for private keys at rest.
///
/// Sealed format: hex(`nonce || ciphertext`), with a fresh random nonce per
/// seal.
#[derive(Clone)]
pub struct SecretBox {
    cipher: ChaCha20Poly1305,
}

impl SecretBox {
    /// Build a box from a 64-character hex key.
    pub fn new(key_hex: &str) -> Result<Self, KmsError> {
        let bytes = hex::decode(key_hex.trim()).map_err(|_| KmsError::InvalidSecretKey)?;
        if bytes.len() * 2 != SECRET_KEY_HEX_LEN {
            return Err(KmsError::InvalidSecretKey);
        }
        Ok(Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(&bytes)),
        })
    }

    /// Generate a fresh random secret box key, hex-encoded.
    pub fn create_secret_key() -> String {
        hex::encode(ChaCha20Poly1305::generate_key(&mut AeadOsRng))
    }

    pub fn seal(&self, plaintext: &[u8]) -> Result<String, KmsError> {
        let nonce = ChaCha20Poly1305::generate_nonce(&mut AeadOsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| KmsError::Seal)?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(hex::encode(blob))
    }

    pub fn open(&self, sealed: &str) -> Result<Vec<u8>, KmsError> {
        let blob = hex::decode(sealed).map_err(|_| KmsError::Open)?;
        if blob.len() <= NONCE_LEN {
            return Err(KmsError::Open);
        }
        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| KmsError::Open)
    }
}

impl std::fmt::Debug for SecretBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretBox(..)")
    }
}

// ---------------------------------------------------------------------------
// KeyManager
// ---------------------------------------------------------------------------

/// Creates, stores and signs with keys.
pub struct KeyManager {
    store: Arc<dyn Storage>,
    secret_box: Option<SecretBox>,
}

impl KeyManager {
    pub fn new(store: Arc<dyn Storage>, secret_box: Option<SecretBox>) -> Self {
        Self { store, secret_box }
    }

    /// Generate and persist a new key in the named KMS.
    pub async fn create_key(&self, kms: &str, key_type: KeyType) -> Result<PublicKey, KmsError> {
        if key_type != KeyType::Ed25519 {
            return Err(KmsError::UnsupportedKeyType(key_type.to_string()));
        }
        let signing_key = SigningKey::generate(&mut OsRng);
        self.persist(kms, &signing_key).await
    }

    /// Persist an existing Ed25519 seed.
    pub async fn import_ed25519(&self, kms: &str, seed: &[u8; 32]) -> Result<PublicKey, KmsError> {
        self.persist(kms, &SigningKey::from_bytes(seed)).await
    }

    pub async fn get(&self, kid: &str) -> Result<PublicKey, KmsError> {
        self.store
            .get_key(kid)
            .await?
            .map(|k| k.public)
            .ok_or_else(|| KmsError::KeyNotFound(kid.to_string()))
    }

    /// Sign `data` with the private key behind `kid`.
    pub async fn sign(&self, kid: &str, data: &[u8]) -> Result<Vec<u8>, KmsError> {
        let signing_key = self.signing_key(kid).await?;
        Ok(signing_key.sign(data).to_bytes().to_vec())
    }

    async fn persist(&self, kms: &str, signing_key: &SigningKey) -> Result<PublicKey, KmsError> {
        let public_key_hex = hex::encode(signing_key.verifying_key().as_bytes());
        let public = PublicKey {
            kid: public_key_hex.clone(),
            kms: kms.to_string(),
            key_type: KeyType::Ed25519,
            public_key_hex,
        };

        let seed = signing_key.to_bytes();
        let (private_key, sealed) = match &self.secret_box {
            Some(secret_box) => (secret_box.seal(&seed)?, true),
            None => (hex::encode(seed), false),
        };

        self.store
            .put_key(&StoredKey {
                public: public.clone(),
                private_key,
                sealed,
            })
            .await?;

        debug!(kid = %public.kid, kms, sealed, "key created");
        Ok(public)
    }

    async fn signing_key(&self, kid: &str) -> Result<SigningKey, KmsError> {
        let stored = self
            .store
            .get_key(kid)
            .await?
            .ok_or_else(|| KmsError::KeyNotFound(kid.to_string()))?;

        if stored.public.key_type != KeyType::Ed25519 {
            return Err(KmsError::UnsupportedKeyType(stored.public.key_type.to_string()));
        }

        let seed = if stored.sealed {
            let secret_box = self
                .secret_box
                .as_ref()
                .ok_or_else(|| KmsError::Locked(kid.to_string()))?;
            secret_box.open(&stored.private_key)?
        } else {
            hex::decode(&stored.private_key).map_err(|_| KmsError::MalformedKey(kid.to_string()))?
        };

        let seed: [u8; 32] = seed
            .try_into()
            .map_err(|_| KmsError::MalformedKey(kid.to_string()))?;
        Ok(SigningKey::from_bytes(&seed))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
