use thiserror::Error;

use selfkey_did::{InvalidDidError, ParameterValidationError, ResolutionError};

use crate::credential::CredentialError;
use crate::identifier::DidManagerError;
use crate::jwt::JwtError;
use crate::kms::KmsError;
use crate::storage::StorageError;
use crate::verify::VerificationError;

/// Everything an [`Agent`](crate::Agent) operation can fail with.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Kms(#[from] KmsError),

    #[error(transparent)]
    DidManager(#[from] DidManagerError),

    #[error(transparent)]
    InvalidDid(#[from] InvalidDidError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Parameters(#[from] ParameterValidationError),

    #[error("credential issuer {0} is not a DID managed by this agent")]
    IssuerNotManaged(String),

    #[error("Holder DID is not defined")]
    HolderNotDefined,

    #[error("identifier {0} has no Ed25519 signing key")]
    NoSigningKey(String),

    #[error("unsupported proof format: {0}")]
    UnsupportedProofFormat(String),

    #[error("Invalid credential")]
    InvalidCredential,

    #[error("Invalid presentation")]
    InvalidPresentation,

    #[error("message is neither a verifiable credential nor a presentation")]
    UnsupportedMessage,

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Jwt(#[from] JwtError),

    #[error(transparent)]
    Verification(#[from] VerificationError),
}

impl AgentError {
    /// Whether the error means "no such thing" rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AgentError::DidManager(DidManagerError::NotFound(_))
                | AgentError::DidManager(DidManagerError::AliasNotFound { .. })
                | AgentError::Storage(StorageError::NotFound)
        )
    }
}
