//! Inbound messages carrying credentials or presentations.
//!
//! A raw message is either a compact JWT or a JSON document whose
//! `proof.jwt` holds one. The payload decides the type: a `vc` claim makes it
//! a `w3c.vc` message, a `vp` claim a `w3c.vp` message.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::credential::{VerifiableCredential, VerifiablePresentation};
use crate::jwt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    #[serde(rename = "w3c.vc")]
    W3cVc,
    #[serde(rename = "w3c.vp")]
    W3cVp,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::W3cVc => f.write_str("w3c.vc"),
            MessageType::W3cVp => f.write_str("w3c.vp"),
        }
    }
}

/// A handled message, as returned to the caller and saved in storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    pub raw: String,
    /// The decoded JWT payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default)]
    pub credentials: Vec<VerifiableCredential>,
    #[serde(default)]
    pub presentations: Vec<VerifiablePresentation>,
}

/// Work out what a raw message contains without verifying it.
///
/// Returns the JWT and the message type, or `None` when the message is
/// neither a VC-JWT nor a VP-JWT.
pub fn classify(raw: &str) -> Option<(String, MessageType)> {
    let token = extract_jwt(raw)?;
    let decoded = jwt::decode(&token).ok()?;
    let message_type = if decoded.payload.get("vc").is_some_and(Value::is_object) {
        MessageType::W3cVc
    } else if decoded.payload.get("vp").is_some_and(Value::is_object) {
        MessageType::W3cVp
    } else {
        return None;
    };
    Some((token, message_type))
}

fn extract_jwt(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if jwt::looks_like_jwt(raw) {
        return Some(raw.to_string());
    }
    let value: Value = serde_json::from_str(raw).ok()?;
    match &value {
        Value::String(s) if jwt::looks_like_jwt(s) => Some(s.trim().to_string()),
        _ => value
            .pointer("/proof/jwt")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use base64ct::{Base64UrlUnpadded, Encoding};
    use serde_json::json;

    fn unsigned(payload: Value) -> String {
        format!(
            "{}.{}.{}",
            Base64UrlUnpadded::encode_string(br#"{"alg":"EdDSA","typ":"JWT"}"#),
            Base64UrlUnpadded::encode_string(payload.to_string().as_bytes()),
            Base64UrlUnpadded::encode_string(b"sig")
        )
    }

    #[test]
    fn classifies_credentials_and_presentations() {
        let vc = unsigned(json!({ "iss": "did:web:a", "vc": {} }));
        let vp = unsigned(json!({ "iss": "did:web:a", "vp": {} }));
        assert_eq!(classify(&vc), Some((vc.clone(), MessageType::W3cVc)));
        assert_eq!(classify(&vp).map(|(_, t)| t), Some(MessageType::W3cVp));
    }

    #[test]
    fn finds_jwt_inside_json() {
        let vc = unsigned(json!({ "iss": "did:web:a", "vc": {} }));
        let wrapped = json!({ "proof": { "type": "JwtProof2020", "jwt": vc } }).to_string();
        assert_eq!(classify(&wrapped).map(|(t, _)| t), Some(vc.clone()));
        let quoted = Value::String(vc.clone()).to_string();
        assert_eq!(classify(&quoted).map(|(t, _)| t), Some(vc));
    }

    #[test]
    fn rejects_other_payloads() {
        assert_eq!(classify(&unsigned(json!({ "iss": "did:web:a" }))), None);
        assert_eq!(classify("hello"), None);
        assert_eq!(classify("{\"type\": \"ping\"}"), None);
    }

    #[test]
    fn type_serializes_with_dots() {
        assert_eq!(serde_json::to_value(MessageType::W3cVp).unwrap(), json!("w3c.vp"));
        assert_eq!(MessageType::W3cVc.to_string(), "w3c.vc");
    }
}
