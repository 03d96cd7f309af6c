//! W3C verifiable credentials and presentations with JWT proofs.
//!
//! Credentials travel as VC-JWTs. The claims are mapped onto registered JWT
//! claims the usual way:
//!
//! | Credential | JWT |
//! |------------|-----|
//! | `issuer.id` | `iss` |
//! | `credentialSubject.id` | `sub` |
//! | `issuanceDate` | `nbf` |
//! | `expirationDate` | `exp` |
//! | `id` | `jti` |
//! | everything else | `vc` |
//!
//! Presentations map `holder` to `iss` and `verifier` to `aud`; the embedded
//! credentials go into `vp.verifiableCredential` as JWT strings.
//!
//! Decoding reverses the mapping and attaches a `JwtProof2020` proof holding
//! the original token.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::jwt::{self, JwtError};

pub const CREDENTIALS_CONTEXT_V1: &str = "https://www.w3.org/2018/credentials/v1";
pub const VERIFIABLE_CREDENTIAL: &str = "VerifiableCredential";
pub const VERIFIABLE_PRESENTATION: &str = "VerifiablePresentation";
pub const JWT_PROOF_2020: &str = "JwtProof2020";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential has no issuer")]
    MissingIssuer,

    #[error("invalid date {0:?}: expected RFC 3339")]
    InvalidDate(String),

    #[error("JWT payload has no {0} claim")]
    MissingClaim(&'static str),

    #[error("malformed {0}: {1}")]
    Malformed(&'static str, String),

    #[error(transparent)]
    Jwt(#[from] JwtError),
}

// ---------------------------------------------------------------------------
// Data model
// ---------------------------------------------------------------------------

/// A credential issuer: either a bare DID or an object with an `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Issuer {
    Id(String),
    Object {
        id: String,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
}

impl Issuer {
    pub fn id(&self) -> &str {
        match self {
            Issuer::Id(id) | Issuer::Object { id, .. } => id,
        }
    }
}

impl From<&str> for Issuer {
    fn from(id: &str) -> Self {
        Issuer::Object {
            id: id.to_string(),
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CredentialSubject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub claims: Map<String, Value>,
}

/// A credential before it is signed.
///
/// Absent `@context`, `type` and `issuanceDate` are filled in on issue; an
/// absent `issuer` becomes the agent's own DID.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedCredential {
    #[serde(
        rename = "@context",
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub context: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(
        rename = "type",
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<Issuer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuance_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<String>,
    #[serde(default)]
    pub credential_subject: CredentialSubject,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_status: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UnsignedCredential {
    /// Fill in the default context, type and issuance date.
    pub fn with_defaults(mut self, now: DateTime<Utc>) -> Self {
        if !self.context.iter().any(|c| c == CREDENTIALS_CONTEXT_V1) {
            self.context.insert(0, Value::String(CREDENTIALS_CONTEXT_V1.into()));
        }
        if !self.types.iter().any(|t| t == VERIFIABLE_CREDENTIAL) {
            self.types.insert(0, VERIFIABLE_CREDENTIAL.into());
        }
        if self.issuance_date.is_none() {
            self.issuance_date = Some(format_date(now));
        }
        self
    }

    pub fn issuer_id(&self) -> Option<&str> {
        self.issuer.as_ref().map(Issuer::id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    #[serde(rename = "type")]
    pub proof_type: String,
    pub jwt: String,
}

impl Proof {
    pub fn jwt(jwt: impl Into<String>) -> Self {
        Self {
            proof_type: JWT_PROOF_2020.into(),
            jwt: jwt.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiableCredential {
    #[serde(flatten)]
    pub credential: UnsignedCredential,
    pub proof: Proof,
}

impl VerifiableCredential {
    pub fn issuer_id(&self) -> Option<&str> {
        self.credential.issuer_id()
    }

    pub fn subject_id(&self) -> Option<&str> {
        self.credential.credential_subject.id.as_deref()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedPresentation {
    #[serde(
        rename = "@context",
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub context: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(
        rename = "type",
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub types: Vec<String>,
    pub holder: String,
    #[serde(default, deserialize_with = "one_or_many")]
    pub verifier: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuance_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<String>,
    #[serde(default)]
    pub verifiable_credential: Vec<VerifiableCredential>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UnsignedPresentation {
    pub fn with_defaults(mut self, now: DateTime<Utc>) -> Self {
        if !self.context.iter().any(|c| c == CREDENTIALS_CONTEXT_V1) {
            self.context.insert(0, Value::String(CREDENTIALS_CONTEXT_V1.into()));
        }
        if !self.types.iter().any(|t| t == VERIFIABLE_PRESENTATION) {
            self.types.insert(0, VERIFIABLE_PRESENTATION.into());
        }
        if self.issuance_date.is_none() {
            self.issuance_date = Some(format_date(now));
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiablePresentation {
    #[serde(flatten)]
    pub presentation: UnsignedPresentation,
    pub proof: Proof,
}

/// What the verifier accepts: a JWT string or a JSON credential whose proof
/// carries one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JwtInput {
    Jwt(String),
    Json(Value),
}

impl JwtInput {
    /// The token, if there is one: the string itself or `proof.jwt`.
    pub fn jwt(&self) -> Option<&str> {
        match self {
            JwtInput::Jwt(jwt) => Some(jwt),
            JwtInput::Json(value) => value.pointer("/proof/jwt").and_then(Value::as_str),
        }
    }
}

impl From<&VerifiableCredential> for JwtInput {
    fn from(vc: &VerifiableCredential) -> Self {
        JwtInput::Jwt(vc.proof.jwt.clone())
    }
}

impl From<&VerifiablePresentation> for JwtInput {
    fn from(vp: &VerifiablePresentation) -> Self {
        JwtInput::Jwt(vp.proof.jwt.clone())
    }
}

/// A stored credential and its content hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniqueCredential {
    pub hash: String,
    pub verifiable_credential: VerifiableCredential,
}

impl UniqueCredential {
    pub fn new(vc: VerifiableCredential) -> Result<Self, CredentialError> {
        Ok(Self {
            hash: content_hash(&vc)?,
            verifiable_credential: vc,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniquePresentation {
    pub hash: String,
    pub verifiable_presentation: VerifiablePresentation,
}

impl UniquePresentation {
    pub fn new(vp: VerifiablePresentation) -> Result<Self, CredentialError> {
        Ok(Self {
            hash: content_hash(&vp)?,
            verifiable_presentation: vp,
        })
    }
}

/// Hex SHA-256 of the JCS-canonical JSON of `value`.
pub fn content_hash<T: Serialize>(value: &T) -> Result<String, CredentialError> {
    let canonical =
        serde_jcs::to_vec(value).map_err(|e| CredentialError::Malformed("JSON", e.to_string()))?;
    Ok(hex::encode(Sha256::digest(canonical)))
}

// ---------------------------------------------------------------------------
// Credential <-> JWT payload
// ---------------------------------------------------------------------------

/// Build the VC-JWT payload for a credential.
pub fn credential_payload(credential: &UnsignedCredential) -> Result<Value, CredentialError> {
    let issuer = credential.issuer.as_ref().ok_or(CredentialError::MissingIssuer)?;

    let mut vc = Map::new();
    if !credential.context.is_empty() {
        vc.insert("@context".into(), Value::Array(credential.context.clone()));
    }
    if !credential.types.is_empty() {
        vc.insert("type".into(), to_value(&credential.types)?);
    }
    vc.insert(
        "credentialSubject".into(),
        Value::Object(credential.credential_subject.claims.clone()),
    );
    if let Some(status) = &credential.credential_status {
        vc.insert("credentialStatus".into(), status.clone());
    }
    if let Issuer::Object { extra, .. } = issuer {
        if !extra.is_empty() {
            vc.insert("issuer".into(), Value::Object(extra.clone()));
        }
    }
    for (k, v) in &credential.extra {
        vc.insert(k.clone(), v.clone());
    }

    let mut payload = Map::new();
    payload.insert("vc".into(), Value::Object(vc));
    payload.insert("iss".into(), Value::String(issuer.id().to_string()));
    if let Some(sub) = &credential.credential_subject.id {
        payload.insert("sub".into(), Value::String(sub.clone()));
    }
    if let Some(date) = &credential.issuance_date {
        payload.insert("nbf".into(), Value::from(parse_date(date)?.timestamp()));
    }
    if let Some(date) = &credential.expiration_date {
        payload.insert("exp".into(), Value::from(parse_date(date)?.timestamp()));
    }
    if let Some(id) = &credential.id {
        payload.insert("jti".into(), Value::String(id.clone()));
    }
    Ok(Value::Object(payload))
}

/// Rebuild a credential from a VC-JWT payload.
pub fn credential_from_payload(
    payload: &Value,
    token: &str,
) -> Result<VerifiableCredential, CredentialError> {
    let claims = payload
        .as_object()
        .ok_or_else(|| CredentialError::Malformed("payload", "not an object".into()))?;
    let mut vc = match claims.get("vc") {
        Some(Value::Object(vc)) => vc.clone(),
        _ => return Err(CredentialError::MissingClaim("vc")),
    };
    let iss = claims
        .get("iss")
        .and_then(Value::as_str)
        .ok_or(CredentialError::MissingClaim("iss"))?;

    let issuer_extra = match vc.remove("issuer") {
        Some(Value::Object(extra)) => extra,
        _ => Map::new(),
    };
    vc.insert(
        "issuer".into(),
        to_value(&Issuer::Object {
            id: iss.to_string(),
            extra: issuer_extra,
        })?,
    );

    let mut subject = match vc.remove("credentialSubject") {
        Some(Value::Object(subject)) => subject,
        _ => Map::new(),
    };
    if let Some(sub) = claims.get("sub").and_then(Value::as_str) {
        subject.insert("id".into(), Value::String(sub.to_string()));
    }
    vc.insert("credentialSubject".into(), Value::Object(subject));

    apply_registered_claims(claims, &mut vc)?;

    let credential: UnsignedCredential = serde_json::from_value(Value::Object(vc))
        .map_err(|e| CredentialError::Malformed("credential", e.to_string()))?;
    Ok(VerifiableCredential {
        credential,
        proof: Proof::jwt(token),
    })
}

/// Decode a VC-JWT without verifying it.
pub fn decode_credential(token: &str) -> Result<VerifiableCredential, CredentialError> {
    let decoded = jwt::decode(token)?;
    credential_from_payload(&decoded.payload, token.trim())
}

// ---------------------------------------------------------------------------
// Presentation <-> JWT payload
// ---------------------------------------------------------------------------

pub fn presentation_payload(presentation: &UnsignedPresentation) -> Result<Value, CredentialError> {
    let mut vp = Map::new();
    if !presentation.context.is_empty() {
        vp.insert("@context".into(), Value::Array(presentation.context.clone()));
    }
    if !presentation.types.is_empty() {
        vp.insert("type".into(), to_value(&presentation.types)?);
    }
    vp.insert(
        "verifiableCredential".into(),
        Value::Array(
            presentation
                .verifiable_credential
                .iter()
                .map(|vc| Value::String(vc.proof.jwt.clone()))
                .collect(),
        ),
    );
    for (k, v) in &presentation.extra {
        vp.insert(k.clone(), v.clone());
    }

    let mut payload = Map::new();
    payload.insert("vp".into(), Value::Object(vp));
    payload.insert("iss".into(), Value::String(presentation.holder.clone()));
    if !presentation.verifier.is_empty() {
        payload.insert("aud".into(), to_value(&presentation.verifier)?);
    }
    if let Some(date) = &presentation.issuance_date {
        payload.insert("nbf".into(), Value::from(parse_date(date)?.timestamp()));
    }
    if let Some(date) = &presentation.expiration_date {
        payload.insert("exp".into(), Value::from(parse_date(date)?.timestamp()));
    }
    if let Some(id) = &presentation.id {
        payload.insert("jti".into(), Value::String(id.clone()));
    }
    Ok(Value::Object(payload))
}

/// Rebuild a presentation from a VP-JWT payload. Embedded credentials are
/// decoded but not verified.
pub fn presentation_from_payload(
    payload: &Value,
    token: &str,
) -> Result<VerifiablePresentation, CredentialError> {
    let claims = payload
        .as_object()
        .ok_or_else(|| CredentialError::Malformed("payload", "not an object".into()))?;
    let mut vp = match claims.get("vp") {
        Some(Value::Object(vp)) => vp.clone(),
        _ => return Err(CredentialError::MissingClaim("vp")),
    };
    let iss = claims
        .get("iss")
        .and_then(Value::as_str)
        .ok_or(CredentialError::MissingClaim("iss"))?;
    vp.insert("holder".into(), Value::String(iss.to_string()));

    let verifier = match claims.get("aud") {
        Some(Value::String(aud)) => vec![Value::String(aud.clone())],
        Some(Value::Array(aud)) => aud.clone(),
        _ => Vec::new(),
    };
    vp.insert("verifier".into(), Value::Array(verifier));

    let embedded = match vp.remove("verifiableCredential") {
        Some(Value::Array(items)) => items,
        Some(single) => vec![single],
        None => Vec::new(),
    };
    let mut credentials = Vec::with_capacity(embedded.len());
    for item in embedded {
        let vc = match item {
            Value::String(token) => decode_credential(&token)?,
            other => serde_json::from_value(other)
                .map_err(|e| CredentialError::Malformed("embedded credential", e.to_string()))?,
        };
        credentials.push(to_value(&vc)?);
    }
    vp.insert("verifiableCredential".into(), Value::Array(credentials));

    apply_registered_claims(claims, &mut vp)?;

    let presentation: UnsignedPresentation = serde_json::from_value(Value::Object(vp))
        .map_err(|e| CredentialError::Malformed("presentation", e.to_string()))?;
    Ok(VerifiablePresentation {
        presentation,
        proof: Proof::jwt(token),
    })
}

pub fn decode_presentation(token: &str) -> Result<VerifiablePresentation, CredentialError> {
    let decoded = jwt::decode(token)?;
    presentation_from_payload(&decoded.payload, token.trim())
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

/// RFC 3339 with millisecond precision, e.g. `2021-04-07T11:36:01.000Z`.
pub fn format_date(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_date(s: &str) -> Result<DateTime<Utc>, CredentialError> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|_| CredentialError::InvalidDate(s.to_string()))
}

fn timestamp_to_date(ts: i64) -> Result<String, CredentialError> {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(format_date)
        .ok_or_else(|| CredentialError::InvalidDate(ts.to_string()))
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// `nbf`, `exp` and `jti` back onto the credential or presentation.
fn apply_registered_claims(
    claims: &Map<String, Value>,
    target: &mut Map<String, Value>,
) -> Result<(), CredentialError> {
    if let Some(nbf) = claims.get("nbf").and_then(Value::as_i64) {
        target.insert("issuanceDate".into(), Value::String(timestamp_to_date(nbf)?));
    }
    if let Some(exp) = claims.get("exp").and_then(Value::as_i64) {
        target.insert("expirationDate".into(), Value::String(timestamp_to_date(exp)?));
    }
    if let Some(jti) = claims.get("jti").and_then(Value::as_str) {
        target.insert("id".into(), Value::String(jti.to_string()));
    }
    Ok(())
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, CredentialError> {
    serde_json::to_value(value).map_err(|e| CredentialError::Malformed("JSON", e.to_string()))
}

/// Accept either a single value or an array of values.
fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        Many(Vec<T>),
        One(T),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::Many(items) => items,
        OneOrMany::One(item) => vec![item],
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
