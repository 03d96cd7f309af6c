//! SQLite-backed storage implementation.
//!
//! Uses `rusqlite` (with bundled SQLite) wrapped in an `Arc<Mutex<Connection>>`
//! to satisfy the `Send + Sync` requirements. All blocking calls are offloaded
//! to a thread-pool via `tokio::task::spawn_blocking`.
//!
//! # Schema
//!
//! - `identifiers`: full JSON blob (keys and services included) plus
//!   provider and alias, unique together when an alias is set.
//! - `keys`: key material; `private_key` is sealed when `sealed = 1`.
//! - `credentials`: JSON blob keyed by content hash, with issuer and subject
//!   columns for filtering.
//! - `presentations`: JSON blob keyed by content hash.
//! - `messages`: handled inbound messages.
//!
//! Every table carries an autoincrement `seq` so listings come back in
//! insertion order.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::de::DeserializeOwned;

use super::{CredentialFilter, IdentifierFilter, Storage, StorageError};
use crate::credential::{UniqueCredential, UniquePresentation};
use crate::identifier::Identifier;
use crate::kms::{KeyType, PublicKey, StoredKey};
use crate::message::Message;

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS identifiers (
    seq       INTEGER PRIMARY KEY AUTOINCREMENT,
    did       TEXT NOT NULL UNIQUE,
    provider  TEXT NOT NULL,
    alias     TEXT,
    data      TEXT NOT NULL
);
DROP INDEX IF EXISTS idx_identifiers_alias;
CREATE UNIQUE INDEX IF NOT EXISTS idx_identifiers_provider_alias
    ON identifiers(provider, alias) WHERE alias IS NOT NULL;

CREATE TABLE IF NOT EXISTS keys (
    kid             TEXT PRIMARY KEY,
    kms             TEXT NOT NULL,
    type            TEXT NOT NULL,
    public_key_hex  TEXT NOT NULL,
    private_key     TEXT NOT NULL,
    sealed          INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS credentials (
    seq      INTEGER PRIMARY KEY AUTOINCREMENT,
    hash     TEXT NOT NULL UNIQUE,
    issuer   TEXT,
    subject  TEXT,
    data     TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_credentials_issuer  ON credentials(issuer);
CREATE INDEX IF NOT EXISTS idx_credentials_subject ON credentials(subject);

CREATE TABLE IF NOT EXISTS presentations (
    seq     INTEGER PRIMARY KEY AUTOINCREMENT,
    hash    TEXT NOT NULL UNIQUE,
    holder  TEXT NOT NULL,
    data    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS messages (
    seq   INTEGER PRIMARY KEY AUTOINCREMENT,
    id    TEXT NOT NULL UNIQUE,
    type  TEXT NOT NULL,
    data  TEXT NOT NULL
);
";

// ---------------------------------------------------------------------------
// SqliteStorage
// ---------------------------------------------------------------------------

/// SQLite-backed implementation of [`Storage`].
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Open (or create) the SQLite database at `path` and apply the schema.
    pub fn open(path: &str) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database (data is lost when dropped).
    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    #[cfg(test)]
    pub(crate) fn key_count(&self) -> usize {
        self.conn
            .lock()
            .ok()
            .and_then(|conn| {
                conn.query_row("SELECT COUNT(*) FROM keys", [], |row| row.get::<_, i64>(0))
                    .ok()
            })
            .map_or(0, |n| n as usize)
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StorageError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| StorageError::Internal("sqlite connection lock poisoned".into()))?;
            f(&conn)
        })
        .await
        .map_err(|e| StorageError::Internal(format!("task join error: {e}")))?
    }
}

// ---------------------------------------------------------------------------
// Error conversions
// ---------------------------------------------------------------------------

fn map_err(e: rusqlite::Error) -> StorageError {
    StorageError::Internal(e.to_string())
}

fn map_json_err(e: serde_json::Error) -> StorageError {
    StorageError::Internal(format!("JSON error: {e}"))
}

fn from_json<T: DeserializeOwned>(data: &str) -> Result<T, StorageError> {
    serde_json::from_str(data).map_err(map_json_err)
}

/// Collect the `data` column of a query into typed records.
fn query_data<T: DeserializeOwned>(
    conn: &Connection,
    sql: &str,
    args: &[String],
) -> Result<Vec<T>, StorageError> {
    let mut stmt = conn.prepare(sql).map_err(map_err)?;
    let rows = stmt
        .query_map(params_from_iter(args.iter()), |row| row.get::<_, String>(0))
        .map_err(map_err)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(from_json(&row.map_err(map_err)?)?);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Storage impl
// ---------------------------------------------------------------------------

#[async_trait]
impl Storage for SqliteStorage {
    // --- Identifiers ---------------------------------------------------------

    async fn create_identifier(&self, identifier: &Identifier) -> Result<(), StorageError> {
        let identifier = identifier.clone();
        self.with_conn(move |conn| {
            let data = serde_json::to_string(&identifier).map_err(map_json_err)?;
            let inserted = conn
                .execute(
                    "INSERT OR IGNORE INTO identifiers (did, provider, alias, data)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        identifier.did,
                        identifier.provider.as_str(),
                        identifier.alias,
                        data
                    ],
                )
                .map_err(map_err)?;
            if inserted == 0 {
                return Err(StorageError::Conflict(format!(
                    "identifier {} or its {} alias already exists",
                    identifier.did, identifier.provider
                )));
            }
            Ok(())
        })
        .await
    }

    async fn update_identifier(&self, identifier: &Identifier) -> Result<(), StorageError> {
        let identifier = identifier.clone();
        self.with_conn(move |conn| {
            let data = serde_json::to_string(&identifier).map_err(map_json_err)?;
            let updated = conn
                .execute(
                    "UPDATE identifiers SET provider = ?2, alias = ?3, data = ?4 WHERE did = ?1",
                    params![
                        identifier.did,
                        identifier.provider.as_str(),
                        identifier.alias,
                        data
                    ],
                )
                .map_err(map_err)?;
            if updated == 0 {
                return Err(StorageError::NotFound);
            }
            Ok(())
        })
        .await
    }

    async fn get_identifier(&self, did: &str) -> Result<Option<Identifier>, StorageError> {
        let did = did.to_string();
        self.with_conn(move |conn| {
            let data: Option<String> = conn
                .query_row(
                    "SELECT data FROM identifiers WHERE did = ?1",
                    params![did],
                    |row| row.get(0),
                )
                .optional()
                .map_err(map_err)?;
            data.map(|d| from_json(&d)).transpose()
        })
        .await
    }

    async fn find_identifiers(
        &self,
        filter: &IdentifierFilter,
    ) -> Result<Vec<Identifier>, StorageError> {
        let filter = filter.clone();
        self.with_conn(move |conn| {
            let mut sql = String::from("SELECT data FROM identifiers WHERE 1=1");
            let mut args = Vec::new();
            if let Some(provider) = filter.provider {
                sql.push_str(" AND provider = ?");
                args.push(provider.as_str().to_string());
            }
            if let Some(alias) = filter.alias {
                sql.push_str(" AND alias = ?");
                args.push(alias);
            }
            sql.push_str(" ORDER BY seq ASC");
            query_data(conn, &sql, &args)
        })
        .await
    }

    async fn delete_identifier(&self, did: &str) -> Result<(), StorageError> {
        let did = did.to_string();
        self.with_conn(move |conn| {
            let deleted = conn
                .execute("DELETE FROM identifiers WHERE did = ?1", params![did])
                .map_err(map_err)?;
            if deleted == 0 {
                return Err(StorageError::NotFound);
            }
            Ok(())
        })
        .await
    }

    // --- Keys ----------------------------------------------------------------

    async fn put_key(&self, key: &StoredKey) -> Result<(), StorageError> {
        let key = key.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO keys (kid, kms, type, public_key_hex, private_key, sealed)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    key.public.kid,
                    key.public.kms,
                    key.public.key_type.to_string(),
                    key.public.public_key_hex,
                    key.private_key,
                    key.sealed,
                ],
            )
            .map_err(map_err)?;
            Ok(())
        })
        .await
    }

    async fn get_key(&self, kid: &str) -> Result<Option<StoredKey>, StorageError> {
        let kid = kid.to_string();
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT kid, kms, type, public_key_hex, private_key, sealed
                     FROM keys WHERE kid = ?1",
                    params![kid],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, String>(4)?,
                            row.get::<_, bool>(5)?,
                        ))
                    },
                )
                .optional()
                .map_err(map_err)?;

            let Some((kid, kms, key_type, public_key_hex, private_key, sealed)) = row else {
                return Ok(None);
            };
            let key_type: KeyType = key_type
                .parse()
                .map_err(|e: crate::kms::KmsError| StorageError::Internal(e.to_string()))?;
            Ok(Some(StoredKey {
                public: PublicKey {
                    kid,
                    kms,
                    key_type,
                    public_key_hex,
                },
                private_key,
                sealed,
            }))
        })
        .await
    }

    async fn delete_key(&self, kid: &str) -> Result<(), StorageError> {
        let kid = kid.to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM keys WHERE kid = ?1", params![kid])
                .map_err(map_err)?;
            Ok(())
        })
        .await
    }

    // --- Credentials ---------------------------------------------------------

    async fn put_credential(&self, credential: &UniqueCredential) -> Result<bool, StorageError> {
        let credential = credential.clone();
        self.with_conn(move |conn| {
            let vc = &credential.verifiable_credential;
            let data = serde_json::to_string(&credential).map_err(map_json_err)?;
            let inserted = conn
                .execute(
                    "INSERT OR IGNORE INTO credentials (hash, issuer, subject, data)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![credential.hash, vc.issuer_id(), vc.subject_id(), data],
                )
                .map_err(map_err)?;
            Ok(inserted > 0)
        })
        .await
    }

    async fn list_credentials(
        &self,
        filter: &CredentialFilter,
    ) -> Result<Vec<UniqueCredential>, StorageError> {
        let filter = filter.clone();
        self.with_conn(move |conn| {
            let mut sql = String::from("SELECT data FROM credentials WHERE 1=1");
            let mut args = Vec::new();
            if !filter.issuers.is_empty() {
                let placeholders: Vec<&str> = filter.issuers.iter().map(|_| "?").collect();
                sql.push_str(&format!(" AND issuer IN ({})", placeholders.join(",")));
                args.extend(filter.issuers);
            }
            if let Some(subject) = filter.subject {
                sql.push_str(" AND subject = ?");
                args.push(subject);
            }
            sql.push_str(" ORDER BY seq ASC");
            query_data(conn, &sql, &args)
        })
        .await
    }

    // --- Presentations -------------------------------------------------------

    async fn put_presentation(
        &self,
        presentation: &UniquePresentation,
    ) -> Result<bool, StorageError> {
        let presentation = presentation.clone();
        self.with_conn(move |conn| {
            let data = serde_json::to_string(&presentation).map_err(map_json_err)?;
            let inserted = conn
                .execute(
                    "INSERT OR IGNORE INTO presentations (hash, holder, data) VALUES (?1, ?2, ?3)",
                    params![
                        presentation.hash,
                        presentation.verifiable_presentation.presentation.holder,
                        data
                    ],
                )
                .map_err(map_err)?;
            Ok(inserted > 0)
        })
        .await
    }

    async fn list_presentations(&self) -> Result<Vec<UniquePresentation>, StorageError> {
        self.with_conn(|conn| {
            query_data(conn, "SELECT data FROM presentations ORDER BY seq ASC", &[])
        })
        .await
    }

    // --- Messages ------------------------------------------------------------

    async fn put_message(&self, message: &Message) -> Result<(), StorageError> {
        let message = message.clone();
        self.with_conn(move |conn| {
            let data = serde_json::to_string(&message).map_err(map_json_err)?;
            conn.execute(
                "INSERT INTO messages (id, type, data) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET type = excluded.type, data = excluded.data",
                params![message.id, message.message_type.to_string(), data],
            )
            .map_err(map_err)?;
            Ok(())
        })
        .await
    }

    async fn list_messages(&self) -> Result<Vec<Message>, StorageError> {
        self.with_conn(|conn| query_data(conn, "SELECT data FROM messages ORDER BY seq ASC", &[]))
            .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
