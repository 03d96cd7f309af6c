//! Error types shared by the DID utilities.

use thiserror::Error;

/// Returned by [`parse_did_url`](crate::parse_did_url) when the input is not a
/// well-formed DID URL.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("Invalid DID")]
pub struct InvalidDidError;

/// A DID could not be resolved.
///
/// `code` carries the HTTP status returned by the resolver, or `0` when the
/// request never produced a response (connection refused, timeout, …).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ResolutionError {
    pub code: u16,
    pub message: String,
}

impl ResolutionError {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// A failure before any HTTP status was received.
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::new(0, err.to_string())
    }
}

/// One or more required fields are missing from an options object or an input
/// document.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("missing required parameter(s): {}", .missing.join(", "))]
pub struct ParameterValidationError {
    /// Names of every missing field, in the order they were checked.
    pub missing: Vec<String>,
}

impl ParameterValidationError {
    pub fn new<I, S>(missing: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            missing: missing.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_did_message() {
        assert_eq!(InvalidDidError.to_string(), "Invalid DID");
    }

    #[test]
    fn invalid_did_is_std_error() {
        let err: Box<dyn std::error::Error> = Box::new(InvalidDidError);
        assert_eq!(err.to_string(), "Invalid DID");
    }

    #[test]
    fn resolution_error_keeps_code_and_message() {
        let err = ResolutionError::new(404, "notFound");
        assert_eq!(err.code, 404);
        assert_eq!(err.to_string(), "notFound");
    }

    #[test]
    fn parameter_error_lists_all_fields() {
        let err = ParameterValidationError::new(["didDocument", "didDocumentMetadata"]);
        assert_eq!(
            err.to_string(),
            "missing required parameter(s): didDocument, didDocumentMetadata"
        );
    }
}
