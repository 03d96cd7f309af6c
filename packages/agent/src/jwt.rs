//! JOSE compact serialization for Ed25519-signed JWTs.
//!
//! ```text
//! base64url(header) . base64url(payload) . base64url(signature)
//! ```
//!
//! Signing itself happens in the key manager; this module only builds the
//! signing input and splits a token back into its parts.

use base64ct::{Base64UrlUnpadded, Encoding};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// The only algorithm this agent signs and verifies with.
pub const ALG_EDDSA: &str = "EdDSA";

#[derive(Debug, Error, PartialEq)]
pub enum JwtError {
    #[error("JWT must have exactly three dot-separated segments")]
    Segments,

    #[error("invalid base64url in JWT {0}")]
    Base64(&'static str),

    #[error("invalid JSON in JWT {part}: {reason}")]
    Json { part: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub alg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

impl Header {
    /// `{"alg":"EdDSA","typ":"JWT"}`
    pub fn eddsa() -> Self {
        Self {
            alg: ALG_EDDSA.into(),
            typ: Some("JWT".into()),
            kid: None,
        }
    }
}

/// A token split into its parts. Nothing has been verified yet.
#[derive(Debug, Clone)]
pub struct DecodedJwt {
    pub header: Header,
    pub payload: Value,
    /// `header.payload` exactly as it appeared in the token.
    pub signing_input: String,
    pub signature: Vec<u8>,
}

/// Build the `header.payload` string that gets signed.
pub fn signing_input(header: &Header, payload: &Value) -> Result<String, JwtError> {
    let header_json = serde_json::to_vec(header).map_err(|e| JwtError::Json {
        part: "header",
        reason: e.to_string(),
    })?;
    let payload_json = serde_json::to_vec(payload).map_err(|e| JwtError::Json {
        part: "payload",
        reason: e.to_string(),
    })?;
    Ok(format!(
        "{}.{}",
        Base64UrlUnpadded::encode_string(&header_json),
        Base64UrlUnpadded::encode_string(&payload_json)
    ))
}

/// Append the signature to a signing input.
pub fn assemble(signing_input: &str, signature: &[u8]) -> String {
    format!("{signing_input}.{}", Base64UrlUnpadded::encode_string(signature))
}

/// Split a compact JWT into header, payload and signature.
pub fn decode(jwt: &str) -> Result<DecodedJwt, JwtError> {
    let parts: Vec<&str> = jwt.trim().split('.').collect();
    let &[header_b64, payload_b64, signature_b64] = parts.as_slice() else {
        return Err(JwtError::Segments);
    };

    let header_bytes =
        Base64UrlUnpadded::decode_vec(header_b64).map_err(|_| JwtError::Base64("header"))?;
    let payload_bytes =
        Base64UrlUnpadded::decode_vec(payload_b64).map_err(|_| JwtError::Base64("payload"))?;
    let signature =
        Base64UrlUnpadded::decode_vec(signature_b64).map_err(|_| JwtError::Base64("signature"))?;

    let header: Header = serde_json::from_slice(&header_bytes).map_err(|e| JwtError::Json {
        part: "header",
        reason: e.to_string(),
    })?;
    let payload: Value = serde_json::from_slice(&payload_bytes).map_err(|e| JwtError::Json {
        part: "payload",
        reason: e.to_string(),
    })?;

    Ok(DecodedJwt {
        header,
        payload,
        signing_input: format!("{header_b64}.{payload_b64}"),
        signature,
    })
}

/// Heuristic used by the message handler: three base64url segments.
pub fn looks_like_jwt(s: &str) -> bool {
    let s = s.trim();
    s.split('.').count() == 3
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey, Verifier};
    use rand::rngs::OsRng;
    use serde_json::json;

    #[test]
    fn sign_then_decode() {
        let key = SigningKey::generate(&mut OsRng);
        let payload = json!({ "iss": "did:key:z6MkTest", "nbf": 1617795361 });
        let input = signing_input(&Header::eddsa(), &payload).unwrap();
        let sig = key.sign(input.as_bytes());
        let jwt = assemble(&input, &sig.to_bytes());

        let decoded = decode(&jwt).unwrap();
        assert_eq!(decoded.header.alg, ALG_EDDSA);
        assert_eq!(decoded.payload, payload);
        assert_eq!(decoded.signing_input, input);

        let sig = ed25519_dalek::Signature::from_slice(&decoded.signature).unwrap();
        key.verifying_key()
            .verify(decoded.signing_input.as_bytes(), &sig)
            .expect("signature should verify");
    }

    #[test]
    fn rejects_wrong_segment_count() {
        assert_eq!(decode("a.b").unwrap_err(), JwtError::Segments);
        assert_eq!(decode("a.b.c.d").unwrap_err(), JwtError::Segments);
    }

    #[test]
    fn rejects_non_json_header() {
        let jwt = format!(
            "{}.{}.{}",
            Base64UrlUnpadded::encode_string(b"not json"),
            Base64UrlUnpadded::encode_string(b"{}"),
            Base64UrlUnpadded::encode_string(b"sig")
        );
        assert!(matches!(decode(&jwt), Err(JwtError::Json { part: "header", .. })));
    }

    #[test]
    fn jwt_heuristic() {
        assert!(looks_like_jwt("eyJhbGciOiJFZERTQSJ9.eyJpc3MiOiJ4In0.c2ln"));
        assert!(!looks_like_jwt("{\"vc\": {}}"));
        assert!(!looks_like_jwt("hello"));
    }
}
