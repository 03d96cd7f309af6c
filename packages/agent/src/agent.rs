//! The [`Agent`] facade.
//!
//! One agent owns a store, a key manager, a DID manager and a resolver, and
//! exposes the identity operations the demo servers need: keeping its own
//! DID, resolving DIDs, issuing and verifying credentials and presentations,
//! listing what it has stored, and handling inbound credential messages.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use selfkey_did::{parse_did_url, ResolutionResult, UniResolverClient, UniResolverOptions};

use crate::credential::{
    self, content_hash, Issuer, JwtInput, UniqueCredential, UniquePresentation,
    UnsignedCredential, UnsignedPresentation, VerifiableCredential, VerifiablePresentation,
};
use crate::error::AgentError;
use crate::identifier::{DidManager, DidManagerError, DidProvider, Identifier, Service};
use crate::jwt::{self, Header};
use crate::kms::{KeyManager, KeyType, PublicKey, SecretBox};
use crate::message::{self, Message, MessageType};
use crate::options::AgentOptions;
use crate::resolver::{did_for_url, MultiResolver, Resolver, WebResolver};
use crate::storage::{CredentialFilter, Storage};
use crate::verify::{
    self, VerifiedCredential, VerifiedPresentation, VerifyOptions,
};

/// Options for [`Agent::issue_credential`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IssueOptions {
    pub save: bool,
    /// Only `jwt` is supported; compared case-insensitively.
    pub proof_format: String,
}

impl Default for IssueOptions {
    fn default() -> Self {
        Self {
            save: false,
            proof_format: "jwt".into(),
        }
    }
}

/// Options for [`Agent::issue_presentation`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PresentationOptions {
    pub save: bool,
}

pub struct Agent {
    store: Arc<dyn Storage>,
    keys: Arc<KeyManager>,
    dids: DidManager,
    resolver: Arc<dyn Resolver>,
    provider: DidProvider,
    kms_name: String,
    agent_name: String,
}

impl Agent {
    /// Build an agent.
    ///
    /// # Errors
    ///
    /// A malformed `kms_key`, or a blank universal resolver endpoint.
    pub fn new(options: AgentOptions) -> Result<Self, AgentError> {
        let secret_box = options.kms_key.as_deref().map(SecretBox::new).transpose()?;
        let keys = Arc::new(KeyManager::new(Arc::clone(&options.store), secret_box));
        let dids = DidManager::new(Arc::clone(&options.store), Arc::clone(&keys));

        let universal = options
            .universal_resolver
            .map(|endpoint| UniResolverClient::new(UniResolverOptions::new(endpoint)))
            .transpose()?;
        let resolver = MultiResolver::standard(WebResolver::with_scheme(options.web_scheme), universal);

        Ok(Self {
            store: options.store,
            keys,
            dids,
            resolver: Arc::new(resolver),
            provider: options.did_provider,
            kms_name: options.kms_name,
            agent_name: options.agent_name,
        })
    }

    /// Replace the resolver, e.g. with one that knows about test fixtures.
    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// A fresh random secret box key (64 hex characters).
    pub fn generate_kms_key() -> String {
        SecretBox::create_secret_key()
    }

    pub fn store(&self) -> &Arc<dyn Storage> {
        &self.store
    }

    pub fn resolver(&self) -> Arc<dyn Resolver> {
        Arc::clone(&self.resolver)
    }

    pub fn provider(&self) -> DidProvider {
        self.provider
    }

    pub fn kms_name(&self) -> &str {
        &self.kms_name
    }

    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    // --- Agent identity ------------------------------------------------------

    /// The agent's own identifier, created on first use.
    pub async fn agent_identifier(&self) -> Result<Identifier, AgentError> {
        Ok(self
            .dids
            .get_or_create(self.provider, &self.agent_name, &self.kms_name)
            .await?)
    }

    /// The agent's own DID. Idempotent.
    pub async fn ensure_agent_did(&self) -> Result<String, AgentError> {
        Ok(self.agent_identifier().await?.did)
    }

    pub async fn get_agent_did_document(&self) -> Result<Option<Value>, AgentError> {
        let did = self.ensure_agent_did().await?;
        self.resolve_did_doc(&did).await
    }

    // --- Resolution ----------------------------------------------------------

    /// Resolve the DID in a DID URL. Query and fragment are ignored.
    ///
    /// Input that is not a DID URL yields an `invalidDid` result rather than
    /// an error.
    pub async fn resolve_did(&self, did_url: &str) -> Result<ResolutionResult, AgentError> {
        let url = match parse_did_url(did_url) {
            Ok(url) => url,
            Err(e) => return Ok(ResolutionResult::failure("invalidDid", e.to_string())),
        };
        let did = did_for_url(&url);
        debug!(%did, "resolving");
        Ok(self.resolver.resolve(&did).await?)
    }

    /// Just the DID document; `None` when resolution found nothing.
    pub async fn resolve_did_doc(&self, did_url: &str) -> Result<Option<Value>, AgentError> {
        let result = self.resolve_did(did_url).await?;
        Ok(result.document().cloned())
    }

    /// The 2018-style DID document of a stored identifier, or `None` if the
    /// DID is not managed here.
    pub async fn generate_did_doc(&self, did: &str) -> Result<Option<Value>, AgentError> {
        match self.dids.get(did).await {
            Ok(identifier) => Ok(Some(identifier.did_document())),
            Err(DidManagerError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    // --- Issuance ------------------------------------------------------------

    /// Sign a credential as a VC-JWT.
    ///
    /// A credential without an issuer is issued by the agent's own DID; any
    /// other issuer must be an identifier managed by this agent.
    pub async fn issue_credential(
        &self,
        mut credential: UnsignedCredential,
        options: &IssueOptions,
    ) -> Result<VerifiableCredential, AgentError> {
        if !options.proof_format.eq_ignore_ascii_case("jwt") {
            return Err(AgentError::UnsupportedProofFormat(options.proof_format.clone()));
        }

        let agent_did = self.ensure_agent_did().await?;
        let issuer = credential
            .issuer
            .get_or_insert_with(|| Issuer::from(agent_did.as_str()))
            .id()
            .to_string();
        let identifier = match self.dids.get(&issuer).await {
            Ok(identifier) => identifier,
            Err(DidManagerError::NotFound(_)) => return Err(AgentError::IssuerNotManaged(issuer)),
            Err(e) => return Err(e.into()),
        };

        let credential = credential.with_defaults(Utc::now());
        let payload = credential::credential_payload(&credential)?;
        let token = self.sign_jwt(&identifier, &payload).await?;
        let vc = credential::decode_credential(&token)?;

        if options.save {
            self.store.put_credential(&UniqueCredential::new(vc.clone())?).await?;
        }
        info!(%issuer, subject = ?vc.subject_id(), saved = options.save, "credential issued");
        Ok(vc)
    }

    /// Wrap credentials in a VP-JWT addressed to `verifier_did`.
    ///
    /// The holder defaults to the agent's DID and must be managed here.
    pub async fn issue_presentation(
        &self,
        credentials: Vec<VerifiableCredential>,
        verifier_did: &str,
        holder_did: Option<&str>,
        options: &PresentationOptions,
    ) -> Result<VerifiablePresentation, AgentError> {
        let holder = match holder_did {
            Some(did) => did.to_string(),
            None => self.ensure_agent_did().await?,
        };
        let identifier = match self.dids.get(&holder).await {
            Ok(identifier) => identifier,
            Err(DidManagerError::NotFound(_)) => return Err(AgentError::HolderNotDefined),
            Err(e) => return Err(e.into()),
        };

        let presentation = UnsignedPresentation {
            holder,
            verifier: vec![verifier_did.to_string()],
            verifiable_credential: credentials,
            ..Default::default()
        }
        .with_defaults(Utc::now());

        let payload = credential::presentation_payload(&presentation)?;
        let token = self.sign_jwt(&identifier, &payload).await?;
        let vp = credential::decode_presentation(&token)?;

        if options.save {
            self.store
                .put_presentation(&UniquePresentation::new(vp.clone())?)
                .await?;
        }
        info!(holder = %vp.presentation.holder, verifier = %verifier_did, "presentation issued");
        Ok(vp)
    }

    async fn sign_jwt(&self, identifier: &Identifier, payload: &Value) -> Result<String, AgentError> {
        let key = identifier
            .signing_key()
            .ok_or_else(|| AgentError::NoSigningKey(identifier.did.clone()))?;
        let header = Header {
            kid: Some(identifier.key_reference(key)),
            ..Header::eddsa()
        };
        let input = jwt::signing_input(&header, payload)?;
        let signature = self.keys.sign(&key.kid, input.as_bytes()).await?;
        Ok(jwt::assemble(&input, &signature))
    }

    // --- Verification --------------------------------------------------------

    /// Verify a VC-JWT, given either as the token or as a credential whose
    /// `proof.jwt` holds it.
    pub async fn verify_credential(
        &self,
        vc: &JwtInput,
        options: &VerifyOptions,
    ) -> Result<VerifiedCredential, AgentError> {
        let token = vc.jwt().ok_or(AgentError::InvalidCredential)?;
        Ok(verify::verify_credential_jwt(self.resolver.as_ref(), token, options).await?)
    }

    /// Verify a VP-JWT. The audience defaults to the agent's DID.
    pub async fn verify_presentation(
        &self,
        vp: &JwtInput,
        options: &VerifyOptions,
    ) -> Result<VerifiedPresentation, AgentError> {
        let token = vp.jwt().ok_or(AgentError::InvalidPresentation)?;
        let mut options = options.clone();
        if options.audience.is_none() {
            options.audience = Some(self.ensure_agent_did().await?);
        }
        Ok(verify::verify_presentation_jwt(self.resolver.as_ref(), token, &options).await?)
    }

    // --- Data store ----------------------------------------------------------

    /// Every stored credential, oldest first.
    pub async fn list_credentials(&self) -> Result<Vec<UniqueCredential>, AgentError> {
        Ok(self.store.list_credentials(&CredentialFilter::default()).await?)
    }

    pub async fn list_credentials_for_subject_id(
        &self,
        subject: &str,
    ) -> Result<Vec<UniqueCredential>, AgentError> {
        let filter = CredentialFilter {
            subject: Some(subject.to_string()),
            ..Default::default()
        };
        Ok(self.store.list_credentials(&filter).await?)
    }

    /// Credentials issued by any of `issuers`.
    pub async fn list_credentials_for_issuer_id<I, S>(
        &self,
        issuers: I,
    ) -> Result<Vec<UniqueCredential>, AgentError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let filter = CredentialFilter {
            issuers: issuers.into_iter().map(Into::into).collect(),
            ..Default::default()
        };
        if filter.issuers.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.store.list_credentials(&filter).await?)
    }

    pub async fn list_presentations(&self) -> Result<Vec<UniquePresentation>, AgentError> {
        Ok(self.store.list_presentations().await?)
    }

    pub async fn list_messages(&self) -> Result<Vec<Message>, AgentError> {
        Ok(self.store.list_messages().await?)
    }

    // --- Messages ------------------------------------------------------------

    /// Verify and store an inbound VC-JWT or VP-JWT.
    ///
    /// Presentations are checked against `audience`, defaulting to the
    /// agent's DID; their embedded credentials are verified and stored too.
    pub async fn handle_message(
        &self,
        raw: &str,
        audience: Option<&str>,
    ) -> Result<Message, AgentError> {
        let (token, message_type) = message::classify(raw).ok_or(AgentError::UnsupportedMessage)?;
        let id = content_hash(&token)?;

        let message = match message_type {
            MessageType::W3cVc => {
                let verified = self
                    .verify_credential(&JwtInput::Jwt(token), &VerifyOptions::default())
                    .await?;
                let vc = verified.verifiable_credential;
                self.store.put_credential(&UniqueCredential::new(vc.clone())?).await?;
                Message {
                    id,
                    message_type,
                    from: vc.issuer_id().map(str::to_string),
                    to: vc.subject_id().map(str::to_string),
                    created_at: vc.credential.issuance_date.clone(),
                    raw: raw.to_string(),
                    data: Some(verified.verified.payload),
                    credentials: vec![vc],
                    presentations: Vec::new(),
                }
            }
            MessageType::W3cVp => {
                let options = VerifyOptions {
                    audience: audience.map(str::to_string),
                    ..Default::default()
                };
                let verified = self.verify_presentation(&JwtInput::Jwt(token), &options).await?;
                let vp = verified.verifiable_presentation;

                let mut credentials = Vec::with_capacity(vp.presentation.verifiable_credential.len());
                for embedded in &vp.presentation.verifiable_credential {
                    let vc = self
                        .verify_credential(&JwtInput::from(embedded), &VerifyOptions::default())
                        .await?
                        .verifiable_credential;
                    self.store.put_credential(&UniqueCredential::new(vc.clone())?).await?;
                    credentials.push(vc);
                }
                self.store
                    .put_presentation(&UniquePresentation::new(vp.clone())?)
                    .await?;

                Message {
                    id,
                    message_type,
                    from: Some(vp.presentation.holder.clone()),
                    to: vp.presentation.verifier.first().cloned(),
                    created_at: vp.presentation.issuance_date.clone(),
                    raw: raw.to_string(),
                    data: Some(verified.verified.payload),
                    credentials,
                    presentations: vec![vp],
                }
            }
        };

        self.store.put_message(&message).await?;
        info!(id = %message.id, r#type = %message.message_type, from = ?message.from, "message handled");
        Ok(message)
    }

    // --- Identifiers ---------------------------------------------------------

    pub async fn create_identifier(
        &self,
        provider: DidProvider,
        alias: Option<&str>,
    ) -> Result<Identifier, AgentError> {
        Ok(self.dids.create(provider, alias, &self.kms_name).await?)
    }

    /// Create an identifier with `extra_keys` more keys and the services
    /// built for its DID, stored in one write.
    pub async fn create_identifier_with<F>(
        &self,
        provider: DidProvider,
        alias: Option<&str>,
        extra_keys: usize,
        services: F,
    ) -> Result<Identifier, AgentError>
    where
        F: FnOnce(&str) -> Vec<Service> + Send,
    {
        Ok(self
            .dids
            .create_with(provider, alias, &self.kms_name, extra_keys, services)
            .await?)
    }

    pub async fn get_or_create_identifier(
        &self,
        provider: DidProvider,
        alias: &str,
    ) -> Result<Identifier, AgentError> {
        Ok(self.dids.get_or_create(provider, alias, &self.kms_name).await?)
    }

    pub async fn identifier(&self, did: &str) -> Result<Identifier, AgentError> {
        Ok(self.dids.get(did).await?)
    }

    pub async fn identifier_by_alias(
        &self,
        provider: DidProvider,
        alias: &str,
    ) -> Result<Identifier, AgentError> {
        Ok(self.dids.get_by_alias(provider, alias).await?)
    }

    pub async fn identifiers(
        &self,
        provider: Option<DidProvider>,
        alias: Option<&str>,
    ) -> Result<Vec<Identifier>, AgentError> {
        Ok(self.dids.find(provider, alias).await?)
    }

    /// A new Ed25519 key in the agent's KMS, not yet attached to anything.
    pub async fn create_key(&self) -> Result<PublicKey, AgentError> {
        Ok(self.keys.create_key(&self.kms_name, KeyType::Ed25519).await?)
    }

    pub async fn add_key(&self, did: &str, key: PublicKey) -> Result<Identifier, AgentError> {
        Ok(self.dids.add_key(did, key).await?)
    }

    pub async fn add_service(&self, did: &str, service: Service) -> Result<Identifier, AgentError> {
        Ok(self.dids.add_service(did, service).await?)
    }

    pub async fn remove_service(&self, did: &str, service_id: &str) -> Result<Identifier, AgentError> {
        Ok(self.dids.remove_service(did, service_id).await?)
    }

    pub async fn delete_identifier(&self, did: &str) -> Result<(), AgentError> {
        Ok(self.dids.delete(did).await?)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
