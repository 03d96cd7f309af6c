//! DID resolution.
//!
//! [`MultiResolver`] dispatches on the DID method:
//!
//! | Method | Resolver |
//! |--------|----------|
//! | `key` | [`KeyResolver`]: expands the key into a document locally |
//! | `web` | [`WebResolver`]: fetches `did.json` over HTTP(S) |
//! | other | the fallback, normally a [`UniResolverClient`] |
//!
//! Method-level failures (an unknown DID, an unsupported method) come back as
//! a [`ResolutionResult`] with `didDocument: null` and an `error` in the
//! resolution metadata. [`ResolutionError`] is reserved for failures to talk
//! to a remote resolver at all.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use selfkey_did::{DidUrl, ResolutionError, ResolutionResult, UniResolverClient};

use crate::identifier::decode_ed25519_multibase;

pub const DID_CONTEXT: &str = "https://www.w3.org/ns/did/v1";
pub const ED25519_2020_CONTEXT: &str = "https://w3id.org/security/suites/ed25519-2020/v1";

#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolve a bare DID (no path, query or fragment).
    async fn resolve(&self, did: &str) -> Result<ResolutionResult, ResolutionError>;
}

#[async_trait]
impl Resolver for UniResolverClient {
    async fn resolve(&self, did: &str) -> Result<ResolutionResult, ResolutionError> {
        UniResolverClient::resolve(self, did).await
    }
}

/// The DID to resolve for a parsed DID URL.
///
/// The DID URL grammar stops the method-specific id at `%`, so the encoded
/// port in `did:web:localhost%3A3000` lands in `path`. Anything in the path
/// that does not start with `/` still belongs to the DID.
pub fn did_for_url(url: &DidUrl) -> String {
    if url.path.is_empty() || url.path.starts_with('/') {
        url.did.clone()
    } else {
        match url.path.find('/') {
            Some(slash) => format!("{}{}", url.did, &url.path[..slash]),
            None => format!("{}{}", url.did, url.path),
        }
    }
}

// ---------------------------------------------------------------------------
// did:key
// ---------------------------------------------------------------------------

/// Expands `did:key` Ed25519 keys into DID documents.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyResolver;

impl KeyResolver {
    pub fn document(did: &str) -> Option<Value> {
        let multibase = did.strip_prefix("did:key:")?;
        decode_ed25519_multibase(multibase)?;
        let vm_id = format!("{did}#{multibase}");
        Some(json!({
            "@context": [DID_CONTEXT, ED25519_2020_CONTEXT],
            "id": did,
            "verificationMethod": [{
                "id": vm_id,
                "type": "Ed25519VerificationKey2020",
                "controller": did,
                "publicKeyMultibase": multibase,
            }],
            "authentication": [vm_id],
            "assertionMethod": [vm_id],
            "capabilityInvocation": [vm_id],
            "capabilityDelegation": [vm_id],
        }))
    }
}

#[async_trait]
impl Resolver for KeyResolver {
    async fn resolve(&self, did: &str) -> Result<ResolutionResult, ResolutionError> {
        Ok(match Self::document(did) {
            Some(doc) => ResolutionResult::found(doc),
            None => ResolutionResult::failure("invalidDid", format!("not an Ed25519 did:key: {did}")),
        })
    }
}

// ---------------------------------------------------------------------------
// did:web
// ---------------------------------------------------------------------------

/// Fetches `did:web` documents.
#[derive(Debug, Clone)]
pub struct WebResolver {
    http: Client,
    scheme: String,
}

impl WebResolver {
    /// A resolver that fetches over `https`.
    pub fn new() -> Self {
        Self::with_scheme("https")
    }

    /// Use another scheme, e.g. `http` for local demo servers.
    pub fn with_scheme(scheme: impl Into<String>) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            http,
            scheme: scheme.into(),
        }
    }

    /// The `did.json` URL for a `did:web` DID.
    ///
    /// `did:web:example.com` maps to `/.well-known/did.json`;
    /// `did:web:example.com:users:alice` to `/users/alice/did.json`. A `%3A`
    /// in the host is a port separator.
    pub fn document_url(&self, did: &str) -> Option<String> {
        let id = did.strip_prefix("did:web:")?;
        let mut segments = id.split(':');
        let host = segments.next().filter(|h| !h.is_empty())?;
        let host = urlencoding::decode(host).ok()?.into_owned();

        let path: Vec<String> = segments
            .map(|s| urlencoding::decode(s).map(|d| d.into_owned()))
            .collect::<Result<_, _>>()
            .ok()?;

        Some(if path.is_empty() {
            format!("{}://{host}/.well-known/did.json", self.scheme)
        } else {
            format!("{}://{host}/{}/did.json", self.scheme, path.join("/"))
        })
    }
}

impl Default for WebResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Resolver for WebResolver {
    async fn resolve(&self, did: &str) -> Result<ResolutionResult, ResolutionError> {
        let Some(url) = self.document_url(did) else {
            return Ok(ResolutionResult::failure("invalidDid", format!("not a did:web DID: {did}")));
        };
        debug!(%did, %url, "fetching did:web document");

        let resp = self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/did+json, application/json")
            .send()
            .await
            .map_err(ResolutionError::transport)?;

        let status = resp.status();
        if !status.is_success() {
            return Ok(ResolutionResult::failure(
                "notFound",
                format!("{url} returned {status}"),
            ));
        }

        let doc: Value = match resp.json().await {
            Ok(doc) => doc,
            Err(e) => {
                return Ok(ResolutionResult::failure(
                    "invalidDidDocument",
                    format!("{url}: {e}"),
                ))
            }
        };
        if doc.get("id").and_then(Value::as_str) != Some(did) {
            return Ok(ResolutionResult::failure(
                "invalidDidDocument",
                format!("document at {url} does not describe {did}"),
            ));
        }
        Ok(ResolutionResult::found(doc))
    }
}

// ---------------------------------------------------------------------------
// MultiResolver
// ---------------------------------------------------------------------------

/// Dispatches to a resolver per DID method, with an optional fallback.
#[derive(Clone, Default)]
pub struct MultiResolver {
    methods: HashMap<String, Arc<dyn Resolver>>,
    fallback: Option<Arc<dyn Resolver>>,
}

impl MultiResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// `did:key` and `did:web` locally; everything else through the
    /// universal resolver when one is given.
    pub fn standard(web: WebResolver, universal: Option<UniResolverClient>) -> Self {
        let resolver = Self::new()
            .with_method("key", Arc::new(KeyResolver))
            .with_method("web", Arc::new(web));
        match universal {
            Some(client) => resolver.with_fallback(Arc::new(client)),
            None => resolver,
        }
    }

    pub fn with_method(mut self, method: &str, resolver: Arc<dyn Resolver>) -> Self {
        self.methods.insert(method.to_string(), resolver);
        self
    }

    pub fn with_fallback(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.fallback = Some(resolver);
        self
    }
}

#[async_trait]
impl Resolver for MultiResolver {
    async fn resolve(&self, did: &str) -> Result<ResolutionResult, ResolutionError> {
        let method = match did.split(':').collect::<Vec<_>>().as_slice() {
            ["did", method, rest @ ..] if !method.is_empty() && !rest.is_empty() => *method,
            _ => return Ok(ResolutionResult::failure("invalidDid", "Invalid DID")),
        };

        match self.methods.get(method).or(self.fallback.as_ref()) {
            Some(resolver) => resolver.resolve(did).await,
            None => Ok(ResolutionResult::failure(
                "methodNotSupported",
                format!("no resolver for did:{method}"),
            )),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
