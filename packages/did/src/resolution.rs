//! The W3C DID resolution result.
//!
//! ```json
//! {
//!   "@context": "https://w3id.org/did-resolution/v1",
//!   "didDocument": { "id": "did:example:123", ... },
//!   "didResolutionMetadata": { "contentType": "application/did+ld+json" },
//!   "didDocumentMetadata": { "created": "2019-03-23T06:35:22Z" }
//! }
//! ```
//!
//! The document and both metadata objects are kept as opaque JSON: their
//! shape depends on the DID method.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::ParameterValidationError;

/// The `@context` used for resolution results built locally.
pub const RESOLUTION_CONTEXT: &str = "https://w3id.org/did-resolution/v1";

const REQUIRED: [&str; 3] = ["didDocument", "didResolutionMetadata", "didDocumentMetadata"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionResult {
    #[serde(rename = "@context", skip_serializing_if = "Option::is_none", default)]
    pub context: Option<Value>,
    pub did_document: Value,
    pub did_resolution_metadata: Value,
    pub did_document_metadata: Value,
}

impl ResolutionResult {
    /// Build a resolution result from a JSON document, checking that all three
    /// required members are present.
    ///
    /// A member that is present with a `null` value is accepted; only absent
    /// keys are reported.
    ///
    /// # Errors
    ///
    /// [`ParameterValidationError`] naming every missing member. A value that
    /// is not a JSON object is missing all of them.
    pub fn from_value(value: Value) -> Result<Self, ParameterValidationError> {
        let Value::Object(mut doc) = value else {
            return Err(ParameterValidationError::new(REQUIRED));
        };

        let missing: Vec<&str> = REQUIRED.into_iter().filter(|k| !doc.contains_key(*k)).collect();
        if !missing.is_empty() {
            return Err(ParameterValidationError::new(missing));
        }

        Ok(Self {
            context: doc.remove("@context"),
            did_document: doc.remove("didDocument").unwrap_or_default(),
            did_resolution_metadata: doc.remove("didResolutionMetadata").unwrap_or_default(),
            did_document_metadata: doc.remove("didDocumentMetadata").unwrap_or_default(),
        })
    }

    /// A successful result for a locally built document.
    pub fn found(document: Value) -> Self {
        Self {
            context: Some(Value::String(RESOLUTION_CONTEXT.into())),
            did_document: document,
            did_resolution_metadata: json!({ "contentType": "application/did+ld+json" }),
            did_document_metadata: Value::Object(Map::new()),
        }
    }

    /// A failed result carrying a DID Core error code such as `notFound`,
    /// `invalidDid` or `methodNotSupported`.
    pub fn failure(error: &str, message: impl Into<String>) -> Self {
        Self {
            context: Some(Value::String(RESOLUTION_CONTEXT.into())),
            did_document: Value::Null,
            did_resolution_metadata: json!({ "error": error, "message": message.into() }),
            did_document_metadata: Value::Object(Map::new()),
        }
    }

    /// The DID document, or `None` when resolution produced `null`.
    pub fn document(&self) -> Option<&Value> {
        match &self.did_document {
            Value::Null => None,
            doc => Some(doc),
        }
    }

    /// The `error` code from the resolution metadata, if any.
    pub fn error(&self) -> Option<&str> {
        self.did_resolution_metadata.get("error").and_then(Value::as_str)
    }
}
