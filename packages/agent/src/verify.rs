//! JWT verification against the issuer's DID document.
//!
//! A token is accepted when:
//!
//! 1. it decodes and is signed with `EdDSA`;
//! 2. `nbf`/`iat` are not in the future and `exp` is not in the past, both
//!    with a clock-skew allowance;
//! 3. if it has an `aud` claim, the expected audience is one of its values;
//! 4. the `iss` DID resolves, and one of the Ed25519 keys in its document
//!    verifies the signature. That verification method becomes the `signer`.

use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use base64ct::{Base64UrlUnpadded, Encoding};
use selfkey_did::{parse_did_url, ResolutionResult};

use crate::credential::{
    self, CredentialError, VerifiableCredential, VerifiablePresentation,
};
use crate::identifier::decode_ed25519_multibase;
use crate::jwt::{self, DecodedJwt, JwtError, ALG_EDDSA};
use crate::resolver::{did_for_url, Resolver};

/// Default clock-skew allowance, in seconds.
pub const DEFAULT_SKEW_SECONDS: i64 = 300;

/// Verification method properties that can reference keys in the document.
const KEY_SECTIONS: [&str; 4] = [
    "verificationMethod",
    "publicKey",
    "assertionMethod",
    "authentication",
];

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error(transparent)]
    Jwt(#[from] JwtError),

    #[error("unsupported JWT algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("JWT has no iss claim")]
    MissingIssuer,

    #[error("JWT not valid before {0}")]
    NotYetValid(i64),

    #[error("JWT has expired: exp {0}")]
    Expired(i64),

    #[error("JWT audience is required but no expected audience was given")]
    AudienceRequired,

    #[error("JWT audience does not match {0}")]
    AudienceMismatch(String),

    #[error("unable to resolve DID document for {did}: {reason}")]
    UnresolvableIssuer { did: String, reason: String },

    #[error("invalid signature: no matching public key found for {0}")]
    InvalidSignature(String),

    #[error(transparent)]
    Credential(#[from] CredentialError),
}

/// Options for [`verify_jwt`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VerifyOptions {
    /// The audience to require in `aud`.
    pub audience: Option<String>,
    pub skew_seconds: i64,
    /// Verify as of this instant instead of now.
    pub at: Option<DateTime<Utc>>,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            audience: None,
            skew_seconds: DEFAULT_SKEW_SECONDS,
            at: None,
        }
    }
}

/// A token whose signature and claims checked out.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedJwt {
    pub payload: Value,
    pub issuer: String,
    /// The verification method whose key validated the signature.
    pub signer: Value,
    pub jwt: String,
    pub did_resolution_result: ResolutionResult,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedCredential {
    #[serde(flatten)]
    pub verified: VerifiedJwt,
    pub verifiable_credential: VerifiableCredential,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedPresentation {
    #[serde(flatten)]
    pub verified: VerifiedJwt,
    pub verifiable_presentation: VerifiablePresentation,
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

pub async fn verify_jwt(
    resolver: &dyn Resolver,
    token: &str,
    options: &VerifyOptions,
) -> Result<VerifiedJwt, VerificationError> {
    let token = token.trim();
    let decoded = jwt::decode(token)?;
    if decoded.header.alg != ALG_EDDSA {
        return Err(VerificationError::UnsupportedAlgorithm(decoded.header.alg));
    }

    let issuer = decoded
        .payload
        .get("iss")
        .and_then(Value::as_str)
        .ok_or(VerificationError::MissingIssuer)?
        .to_string();

    check_times(&decoded.payload, options)?;
    check_audience(&decoded.payload, options)?;

    let did = parse_did_url(&issuer)
        .map(|url| did_for_url(&url))
        .map_err(|e| VerificationError::UnresolvableIssuer {
            did: issuer.clone(),
            reason: e.to_string(),
        })?;
    let resolution = resolver
        .resolve(&did)
        .await
        .map_err(|e| VerificationError::UnresolvableIssuer {
            did: did.clone(),
            reason: e.to_string(),
        })?;
    let Some(document) = resolution.document() else {
        return Err(VerificationError::UnresolvableIssuer {
            reason: resolution.error().unwrap_or("notFound").to_string(),
            did,
        });
    };

    let signer = find_signer(document, &decoded).ok_or_else(|| {
        VerificationError::InvalidSignature(did.clone())
    })?;
    debug!(issuer = %issuer, signer = %signer["id"], "JWT signature verified");

    Ok(VerifiedJwt {
        payload: decoded.payload,
        issuer,
        signer,
        jwt: token.to_string(),
        did_resolution_result: resolution,
    })
}

pub async fn verify_credential_jwt(
    resolver: &dyn Resolver,
    token: &str,
    options: &VerifyOptions,
) -> Result<VerifiedCredential, VerificationError> {
    let verified = verify_jwt(resolver, token, options).await?;
    let verifiable_credential = credential::credential_from_payload(&verified.payload, &verified.jwt)?;
    Ok(VerifiedCredential {
        verified,
        verifiable_credential,
    })
}

pub async fn verify_presentation_jwt(
    resolver: &dyn Resolver,
    token: &str,
    options: &VerifyOptions,
) -> Result<VerifiedPresentation, VerificationError> {
    let verified = verify_jwt(resolver, token, options).await?;
    let verifiable_presentation =
        credential::presentation_from_payload(&verified.payload, &verified.jwt)?;
    Ok(VerifiedPresentation {
        verified,
        verifiable_presentation,
    })
}

// ---------------------------------------------------------------------------
// Claims
// ---------------------------------------------------------------------------

fn check_times(payload: &Value, options: &VerifyOptions) -> Result<(), VerificationError> {
    let now = options.at.unwrap_or_else(Utc::now).timestamp();
    let skew = options.skew_seconds.max(0);

    for claim in ["nbf", "iat"] {
        if let Some(t) = payload.get(claim).and_then(Value::as_i64) {
            if t > now + skew {
                return Err(VerificationError::NotYetValid(t));
            }
            // iat only matters when nbf is absent
            break;
        }
    }
    if let Some(exp) = payload.get("exp").and_then(Value::as_i64) {
        if exp <= now - skew {
            return Err(VerificationError::Expired(exp));
        }
    }
    Ok(())
}

fn check_audience(payload: &Value, options: &VerifyOptions) -> Result<(), VerificationError> {
    let audiences: Vec<&str> = match payload.get("aud") {
        None | Some(Value::Null) => return Ok(()),
        Some(Value::String(aud)) => vec![aud.as_str()],
        Some(Value::Array(auds)) => auds.iter().filter_map(Value::as_str).collect(),
        Some(_) => Vec::new(),
    };
    let expected = options
        .audience
        .as_deref()
        .ok_or(VerificationError::AudienceRequired)?;
    if audiences.contains(&expected) {
        Ok(())
    } else {
        Err(VerificationError::AudienceMismatch(expected.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// The first verification method in `document` whose key validates the
/// signature. When the header names a `kid`, that method is tried first.
fn find_signer(document: &Value, decoded: &DecodedJwt) -> Option<Value> {
    let signature = Signature::from_slice(&decoded.signature).ok()?;
    let mut methods = verification_methods(document);
    if let Some(kid) = decoded.header.kid.as_deref() {
        methods.sort_by_key(|m| m.get("id").and_then(Value::as_str) != Some(kid));
    }

    methods.into_iter().find(|method| {
        ed25519_public_key(method)
            .and_then(|bytes| VerifyingKey::from_bytes(&bytes).ok())
            .is_some_and(|key| {
                key.verify(decoded.signing_input.as_bytes(), &signature)
                    .is_ok()
            })
    })
}

/// Every embedded verification method object in the document, de-duplicated
/// by id. String references are skipped; they point at entries already
/// listed in `verificationMethod` or `publicKey`.
fn verification_methods(document: &Value) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::new();
    for section in KEY_SECTIONS {
        let Some(Value::Array(entries)) = document.get(section) else {
            continue;
        };
        for entry in entries.iter().filter(|e| e.is_object()) {
            let id = entry.get("id");
            if id.is_some() && out.iter().any(|m| m.get("id") == id) {
                continue;
            }
            out.push(entry.clone());
        }
    }
    out
}

/// Extract a raw Ed25519 public key from a verification method.
///
/// Understands `publicKeyMultibase` (with or without the multicodec prefix),
/// `publicKeyBase58`, `publicKeyHex` and OKP `publicKeyJwk`.
pub fn ed25519_public_key(method: &Value) -> Option<[u8; 32]> {
    let key_type = method.get("type").and_then(Value::as_str).unwrap_or_default();
    if key_type.starts_with("Secp256k1") || key_type.starts_with("EcdsaSecp256k1") {
        return None;
    }

    if let Some(mb) = method.get("publicKeyMultibase").and_then(Value::as_str) {
        if let Some(key) = decode_ed25519_multibase(mb) {
            return Some(key);
        }
        let raw = bs58::decode(mb.strip_prefix('z')?).into_vec().ok()?;
        return raw.try_into().ok();
    }
    if let Some(b58) = method.get("publicKeyBase58").and_then(Value::as_str) {
        return bs58::decode(b58).into_vec().ok()?.try_into().ok();
    }
    if let Some(hex_key) = method.get("publicKeyHex").and_then(Value::as_str) {
        return hex::decode(hex_key).ok()?.try_into().ok();
    }
    if let Some(jwk) = method.get("publicKeyJwk") {
        if jwk.get("kty").and_then(Value::as_str) != Some("OKP")
            || jwk.get("crv").and_then(Value::as_str) != Some("Ed25519")
        {
            return None;
        }
        let x = jwk.get("x").and_then(Value::as_str)?;
        return Base64UrlUnpadded::decode_vec(x).ok()?.try_into().ok();
    }
    None
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ed25519_dalek::{Signer, SigningKey};
    use rand::rngs::OsRng;
    use selfkey_did::ResolutionError;
    use serde_json::json;

    use crate::identifier::did_key;
    use crate::jwt::Header;
    use crate::resolver::KeyResolver;

    const NOW: i64 = 1_700_000_000;

    fn at_now() -> VerifyOptions {
        VerifyOptions {
            at: DateTime::<Utc>::from_timestamp(NOW, 0),
            ..Default::default()
        }
    }

    fn sign(key: &SigningKey, header: Header, payload: Value) -> String {
        let input = jwt::signing_input(&header, &payload).unwrap();
        jwt::assemble(&input, &key.sign(input.as_bytes()).to_bytes())
    }

    fn keyed() -> (SigningKey, String) {
        let key = SigningKey::generate(&mut OsRng);
        let did = did_key(key.verifying_key().as_bytes());
        (key, did)
    }

    /// Serves a legacy `publicKey`/`publicKeyHex` document for any DID.
    struct LegacyDocs(String);

    #[async_trait]
    impl Resolver for LegacyDocs {
        async fn resolve(&self, did: &str) -> Result<ResolutionResult, ResolutionError> {
            Ok(ResolutionResult::found(json!({
                "@context": "https://w3id.org/did/v1",
                "id": did,
                "publicKey": [
                    { "id": format!("{did}#secp"), "type": "Secp256k1VerificationKey2018", "publicKeyHex": "02aa" },
                    { "id": format!("{did}#{}", self.0), "type": "Ed25519VerificationKey2018", "publicKeyHex": self.0 }
                ]
            })))
        }
    }

    #[tokio::test]
    async fn verifies_against_did_key() {
        let (key, did) = keyed();
        let token = sign(&key, Header::eddsa(), json!({ "iss": did, "nbf": NOW - 10 }));
        let verified = verify_jwt(&KeyResolver, &token, &at_now()).await.unwrap();
        assert_eq!(verified.issuer, did);
        assert_eq!(verified.signer["type"], "Ed25519VerificationKey2020");
    }

    #[tokio::test]
    async fn verifies_against_legacy_hex_keys() {
        let (key, _) = keyed();
        let hex_key = hex::encode(key.verifying_key().as_bytes());
        let token = sign(&key, Header::eddsa(), json!({ "iss": "did:web:example.com" }));
        let verified = verify_jwt(&LegacyDocs(hex_key.clone()), &token, &at_now()).await.unwrap();
        assert_eq!(verified.signer["publicKeyHex"], hex_key);
    }

    #[tokio::test]
    async fn wrong_key_is_an_invalid_signature() {
        let (key, _) = keyed();
        let (_, other_did) = keyed();
        let token = sign(&key, Header::eddsa(), json!({ "iss": other_did }));
        assert!(matches!(
            verify_jwt(&KeyResolver, &token, &at_now()).await,
            Err(VerificationError::InvalidSignature(_))
        ));
    }

    #[tokio::test]
    async fn rejects_other_algorithms() {
        let (key, did) = keyed();
        let header = Header { alg: "ES256K".into(), typ: Some("JWT".into()), kid: None };
        let token = sign(&key, header, json!({ "iss": did }));
        assert!(matches!(
            verify_jwt(&KeyResolver, &token, &at_now()).await,
            Err(VerificationError::UnsupportedAlgorithm(_))
        ));
    }

    #[tokio::test]
    async fn time_window_honours_skew() {
        let (key, did) = keyed();
        let opts = at_now();

        let soon = sign(&key, Header::eddsa(), json!({ "iss": did, "nbf": NOW + 60 }));
        assert!(verify_jwt(&KeyResolver, &soon, &opts).await.is_ok());

        let future = sign(&key, Header::eddsa(), json!({ "iss": did, "nbf": NOW + 3600 }));
        assert!(matches!(
            verify_jwt(&KeyResolver, &future, &opts).await,
            Err(VerificationError::NotYetValid(_))
        ));

        let expired = sign(&key, Header::eddsa(), json!({ "iss": did, "exp": NOW - 3600 }));
        assert!(matches!(
            verify_jwt(&KeyResolver, &expired, &opts).await,
            Err(VerificationError::Expired(_))
        ));

        let strict = VerifyOptions { skew_seconds: 0, ..at_now() };
        assert!(verify_jwt(&KeyResolver, &soon, &strict).await.is_err());
    }

    #[tokio::test]
    async fn audience_must_match_when_present() {
        let (key, did) = keyed();
        let token = sign(&key, Header::eddsa(), json!({ "iss": did, "aud": ["did:web:bank"] }));

        assert!(matches!(
            verify_jwt(&KeyResolver, &token, &at_now()).await,
            Err(VerificationError::AudienceRequired)
        ));
        let wrong = VerifyOptions { audience: Some("did:web:other".into()), ..at_now() };
        assert!(matches!(
            verify_jwt(&KeyResolver, &token, &wrong).await,
            Err(VerificationError::AudienceMismatch(_))
        ));
        let right = VerifyOptions { audience: Some("did:web:bank".into()), ..at_now() };
        assert!(verify_jwt(&KeyResolver, &token, &right).await.is_ok());
    }

    #[tokio::test]
    async fn unresolvable_issuer() {
        let (key, _) = keyed();
        let token = sign(&key, Header::eddsa(), json!({ "iss": "did:key:zBogus" }));
        assert!(matches!(
            verify_jwt(&KeyResolver, &token, &at_now()).await,
            Err(VerificationError::UnresolvableIssuer { .. })
        ));
    }

    #[test]
    fn extracts_keys_from_every_encoding() {
        let raw = [5u8; 32];
        let methods = [
            json!({ "publicKeyMultibase": crate::identifier::ed25519_multibase(&raw) }),
            json!({ "publicKeyMultibase": format!("z{}", bs58::encode(raw).into_string()) }),
            json!({ "publicKeyBase58": bs58::encode(raw).into_string() }),
            json!({ "publicKeyHex": hex::encode(raw) }),
            json!({ "publicKeyJwk": { "kty": "OKP", "crv": "Ed25519", "x": Base64UrlUnpadded::encode_string(&raw) } }),
        ];
        for method in methods {
            assert_eq!(ed25519_public_key(&method), Some(raw), "method: {method}");
        }
        let secp = json!({ "type": "Secp256k1VerificationKey2018", "publicKeyHex": hex::encode(raw) });
        assert_eq!(ed25519_public_key(&secp), None);
    }
}
