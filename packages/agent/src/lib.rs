//! SelfKey identity agent.
//!
//! An [`Agent`] bundles a key manager, a DID manager, a resolver and a data
//! store behind one facade. The issuer and holder demo servers each run one.
//!
//! # Crate layout
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`agent`] | The [`Agent`] facade |
//! | [`options`] | [`AgentOptions`] |
//! | [`kms`] | Ed25519 keys, sealed at rest with a secret box |
//! | [`identifier`] | `did:key` / `did:web` identifiers and their documents |
//! | [`resolver`] | Per-method DID resolution, universal resolver fallback |
//! | [`jwt`] | EdDSA JOSE compact serialization |
//! | [`credential`] | VC/VP data model and the VC-JWT mapping |
//! | [`verify`] | JWT signature and claim verification |
//! | [`message`] | Inbound credential messages |
//! | [`storage`] | The [`Storage`](storage::Storage) trait, memory and SQLite backends |
//!
//! # Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use selfkey_agent::{Agent, AgentOptions, DidProvider, IssueOptions};
//! use selfkey_agent::storage::memory::MemoryStorage;
//!
//! let agent = Agent::new(AgentOptions::new(Arc::new(MemoryStorage::new()), DidProvider::Key))?;
//! let did = agent.ensure_agent_did().await?;
//! let vc = agent.issue_credential(credential, &IssueOptions::default()).await?;
//! let verified = agent.verify_credential(&(&vc).into(), &Default::default()).await?;
//! ```

pub mod agent;
pub mod credential;
pub mod error;
pub mod identifier;
pub mod jwt;
pub mod kms;
pub mod message;
pub mod options;
pub mod resolver;
pub mod storage;
pub mod verify;

pub use agent::{Agent, IssueOptions, PresentationOptions};
pub use credential::{
    JwtInput, UniqueCredential, UniquePresentation, UnsignedCredential, UnsignedPresentation,
    VerifiableCredential, VerifiablePresentation,
};
pub use error::AgentError;
pub use identifier::{DidProvider, Identifier, Service};
pub use message::{Message, MessageType};
pub use options::AgentOptions;
pub use resolver::Resolver;
pub use verify::{VerifiedCredential, VerifiedPresentation, VerifyOptions};
