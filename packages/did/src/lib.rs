//! DID utilities for the SelfKey agent.
//!
//! This crate is deliberately small: it decomposes DID URLs, models the
//! W3C DID resolution result, and talks to a
//! [Universal Resolver](https://github.com/decentralized-identity/universal-resolver)
//! over HTTP. Method-specific resolution lives in `selfkey-agent`.
//!
//! # Crate layout
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`url`] | [`parse_did_url`] and the [`DidUrl`] components |
//! | [`error`] | [`InvalidDidError`], [`ResolutionError`], [`ParameterValidationError`] |
//! | [`resolution`] | [`ResolutionResult`] |
//! | [`client`] | [`UniResolverClient`] |
//!
//! # Quick start
//!
//! ```rust,ignore
//! use selfkey_did::parse_did_url;
//!
//! let url = parse_did_url("did:example:123/path?versionId=1#keys-1")?;
//! assert_eq!(url.method, "example");
//! assert_eq!(url.did, "did:example:123");
//! assert_eq!(url.fragment, "keys-1");
//! ```

pub mod client;
pub mod error;
pub mod resolution;
pub mod url;

pub use client::{UniResolverClient, UniResolverOptions};
pub use error::{InvalidDidError, ParameterValidationError, ResolutionError};
pub use resolution::ResolutionResult;
pub use url::{parse_did_url, DidUrl, QueryValue};
