//! HTTP client for a Universal Resolver instance.
//!
//! The resolver exposes `GET {endpoint}/1.0/identifiers/{did}` and answers
//! with a [`ResolutionResult`] document. Any non-2xx answer is surfaced as a
//! [`ResolutionError`] carrying the HTTP status and the response body.

use std::time::Duration;

use reqwest::{header::ACCEPT, Client};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{ParameterValidationError, ResolutionError};
use crate::resolution::ResolutionResult;
use crate::url::parse_did_url;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Options for [`UniResolverClient::new`].
///
/// `endpoint` is required; it is optional here only so that configuration
/// read from JSON or the environment can be validated in one place.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UniResolverOptions {
    pub endpoint: Option<String>,
    #[serde(skip)]
    pub timeout: Option<Duration>,
}

impl UniResolverOptions {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            timeout: None,
        }
    }
}

/// A client for one Universal Resolver endpoint.
///
/// Cheap to clone: `reqwest::Client` wraps an `Arc` internally.
#[derive(Debug, Clone)]
pub struct UniResolverClient {
    endpoint: String,
    base_url: String,
    http: Client,
}

impl UniResolverClient {
    /// Build a client from options.
    ///
    /// # Errors
    ///
    /// [`ParameterValidationError`] when `endpoint` is absent or blank.
    pub fn new(options: UniResolverOptions) -> Result<Self, ParameterValidationError> {
        let endpoint = options
            .endpoint
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| ParameterValidationError::new(["endpoint"]))?;

        let http = Client::builder()
            .timeout(options.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()
            .unwrap_or_default();

        Ok(Self::with_client(endpoint, http))
    }

    /// Build a client around an existing `reqwest::Client`.
    pub fn with_client(endpoint: impl Into<String>, http: Client) -> Self {
        let endpoint = endpoint.into();
        let base_url = format!("{}/1.0/", endpoint.trim_end_matches('/'));
        Self {
            endpoint,
            base_url,
            http,
        }
    }

    /// The endpoint this client was configured with.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Resolve a bare DID.
    ///
    /// # Errors
    ///
    /// [`ResolutionError`] with the HTTP status and body for non-2xx answers,
    /// code `0` for transport failures, and the response status for 2xx
    /// bodies that are not a valid resolution result.
    pub async fn resolve(&self, did: &str) -> Result<ResolutionResult, ResolutionError> {
        let url = format!("{}identifiers/{}", self.base_url, did);
        debug!(%url, "universal resolver request");

        let resp = self
            .http
            .get(&url)
            .header(ACCEPT, "application/did+ld+json, application/json")
            .send()
            .await
            .map_err(ResolutionError::transport)?;

        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(ResolutionError::transport)?;

        if !(200..300).contains(&status) {
            return Err(ResolutionError::new(status, body));
        }

        let value: Value = serde_json::from_str(&body)
            .map_err(|e| ResolutionError::new(status, format!("invalid resolution result: {e}")))?;

        ResolutionResult::from_value(value).map_err(|e| ResolutionError::new(status, e.to_string()))
    }

    /// Resolve the DID part of a DID URL; path, query and fragment are ignored.
    ///
    /// # Errors
    ///
    /// [`ResolutionError`] with code `400` when `did_url` is not a DID URL,
    /// otherwise as [`resolve`](Self::resolve).
    pub async fn resolve_url(&self, did_url: &str) -> Result<ResolutionResult, ResolutionError> {
        let parsed = parse_did_url(did_url).map_err(|e| ResolutionError::new(400, e.to_string()))?;
        self.resolve(&parsed.did).await
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    use axum::{extract::Path, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
    use serde_json::json;

    const KNOWN: &str = "did:example:123456789abcdefghi";

    async fn identifiers(Path(did): Path<String>) -> axum::response::Response {
        match did.as_str() {
            KNOWN => Json(json!({
                "@context": "https://w3id.org/did-resolution/v1",
                "didDocument": { "id": KNOWN },
                "didResolutionMetadata": { "contentType": "application/did+ld+json" },
                "didDocumentMetadata": {}
            }))
            .into_response(),
            "did:example:partial" => {
                Json(json!({ "didDocument": { "id": "did:example:partial" } })).into_response()
            }
            _ => (StatusCode::NOT_FOUND, "notFound").into_response(),
        }
    }

    async fn spawn_resolver() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/1.0/identifiers/{did}", get(identifiers));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn keeps_the_endpoint() {
        let client = UniResolverClient::new(UniResolverOptions::new("http://localhost:8080")).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:8080");
    }

    #[test]
    fn missing_endpoint_is_a_parameter_error() {
        let err = UniResolverClient::new(UniResolverOptions::default()).unwrap_err();
        assert_eq!(err.missing, vec!["endpoint".to_string()]);
    }

    #[test]
    fn options_deserialize_without_endpoint() {
        let opts: UniResolverOptions = serde_json::from_str("{}").unwrap();
        assert!(UniResolverClient::new(opts).is_err());
    }

    #[tokio::test]
    async fn resolves_known_did() {
        let base = spawn_resolver().await;
        let client = UniResolverClient::new(UniResolverOptions::new(base)).unwrap();
        let result = client.resolve(KNOWN).await.unwrap();
        assert_eq!(result.did_document["id"], KNOWN);
    }

    #[tokio::test]
    async fn trailing_slash_on_endpoint_is_tolerated() {
        let base = spawn_resolver().await;
        let client = UniResolverClient::new(UniResolverOptions::new(format!("{base}/"))).unwrap();
        assert!(client.resolve(KNOWN).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_did_carries_status_and_body() {
        let base = spawn_resolver().await;
        let client = UniResolverClient::new(UniResolverOptions::new(base)).unwrap();
        let err = client.resolve("did:example:nobody").await.unwrap_err();
        assert_eq!(err, ResolutionError::new(404, "notFound"));
    }

    #[tokio::test]
    async fn incomplete_result_is_rejected() {
        let base = spawn_resolver().await;
        let client = UniResolverClient::new(UniResolverOptions::new(base)).unwrap();
        let err = client.resolve("did:example:partial").await.unwrap_err();
        assert_eq!(err.code, 200);
        assert!(err.message.contains("didResolutionMetadata"));
    }

    #[tokio::test]
    async fn resolve_url_strips_fragment() {
        let base = spawn_resolver().await;
        let client = UniResolverClient::new(UniResolverOptions::new(base)).unwrap();
        let result = client.resolve_url(&format!("{KNOWN}#keys-1")).await.unwrap();
        assert_eq!(result.did_document["id"], KNOWN);
    }

    #[tokio::test]
    async fn resolve_url_rejects_invalid_did() {
        let client = UniResolverClient::new(UniResolverOptions::new("http://127.0.0.1:1")).unwrap();
        let err = client.resolve_url("not-a-did").await.unwrap_err();
        assert_eq!(err.code, 400);
        assert_eq!(err.message, "Invalid DID");
    }

    #[tokio::test]
    async fn connection_failure_has_code_zero() {
        let client = UniResolverClient::new(UniResolverOptions::new("http://127.0.0.1:1")).unwrap();
        let err = client.resolve(KNOWN).await.unwrap_err();
        assert_eq!(err.code, 0);
    }
}
