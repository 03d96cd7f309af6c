//! HTTP request handlers for the demo servers.
//!
//! [`common`] holds the routes every role serves; [`issuer`], [`holder`]
//! and [`bank`] hold the role-specific ones. Handlers are async functions
//! that take Axum extractors and return `Result<impl IntoResponse, AppError>`.

pub mod bank;
pub mod common;
pub mod holder;
pub mod issuer;

use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};

use selfkey_agent::{Agent, Identifier};

use crate::{config::Role, error::AppError, web_did};

/// Shared application state threaded through all Axum handlers via [`axum::extract::State`].
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<Agent>,
    pub role: Role,
}

impl AppState {
    pub fn new(agent: Arc<Agent>, role: Role) -> Self {
        Self { agent, role }
    }

    /// The `did:web` identity for a request host.
    pub async fn identity(&self, host: &RequestHost) -> Result<Identifier, AppError> {
        Ok(web_did::get_or_create_identifier(&self.agent, self.role, &host.0).await?)
    }
}

// ---------------------------------------------------------------------------
// RequestHost extractor
// ---------------------------------------------------------------------------

/// The host (and port, if any) the request was addressed to, lower-cased.
///
/// Taken from the `Host` header, or from the URI authority when there is no
/// header. Rejects with 400 when neither is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHost(pub String);

impl<S> FromRequestParts<S> for RequestHost
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let from_header = parts
            .headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let host = from_header
            .or_else(|| parts.uri.authority().map(|a| a.as_str().to_string()))
            .map(|h| h.trim().to_ascii_lowercase())
            .filter(|h| !h.is_empty() && !h.contains(['/', '<', '>', '"', ' ']))
            .ok_or_else(|| AppError::BadRequest("missing or invalid Host header".into()))?;
        Ok(RequestHost(host))
    }
}

/// Minimal HTML escaping for text interpolated into the index pages.
pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_html("<a href=\"x\">&</a>"), "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;");
        assert_eq!(escape_html("did:web:localhost%3A3000"), "did:web:localhost%3A3000");
    }
}
