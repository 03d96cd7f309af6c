//! Documents the issuer and bank publish about themselves: the issuer's
//! credential manifest and the bank's relying-party services, each carrying
//! a selective disclosure request for the claims they need.

use serde::{Deserialize, Serialize};

use selfkey_agent::Identifier;

use crate::error::AppError;

pub const KYC_CONTEXT: &str = "https://platform.selfkey.org/contexts/kyc/v1.jsonld";
pub const CERTIFICATE_OF_INCORPORATION: &str = "CertificateOfIncorporation";

const ISSUER_NAME: &str = "Super Corporate Registrar";
const TRUSTED_ISSUER_DID: &str = "did:web:issuer-selfkey.ngrok.io";
const TRUSTED_ISSUER_URL: &str = "https:////issuer-selfkey.ngrok.io";

// ---------------------------------------------------------------------------
// Selective disclosure request
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectiveDisclosureRequest {
    pub issuer: String,
    pub reply_url: String,
    pub claims: Vec<ClaimRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub claim_type: String,
    pub essential: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issuers: Vec<TrustedIssuer>,
}

impl ClaimRequest {
    fn essential(claim_type: &str) -> Self {
        Self {
            reason: None,
            claim_type: claim_type.into(),
            essential: true,
            credential_context: None,
            credential_type: None,
            issuers: Vec::new(),
        }
    }

    fn reason(mut self, reason: &str) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Require the claim from a certificate of incorporation by a trusted issuer.
    fn from_incorporation_certificate(mut self) -> Self {
        self.credential_context = Some(KYC_CONTEXT.into());
        self.credential_type = Some(CERTIFICATE_OF_INCORPORATION.into());
        self.issuers = vec![TrustedIssuer {
            did: TRUSTED_ISSUER_DID.into(),
            url: TRUSTED_ISSUER_URL.into(),
        }];
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustedIssuer {
    pub did: String,
    pub url: String,
}

fn messaging_endpoint(identifier: &Identifier) -> Result<&str, AppError> {
    identifier
        .service("Messaging")
        .map(|s| s.service_endpoint.as_str())
        .ok_or_else(|| AppError::Internal("No messaging endpoint".into()))
}

// ---------------------------------------------------------------------------
// Issuer: credential manifest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialManifest {
    pub issuer: ManifestIssuer,
    pub credential: ManifestCredential,
    pub sdr: SelectiveDisclosureRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestIssuer {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestCredential {
    #[serde(rename = "type")]
    pub credential_type: String,
    pub context: String,
}

/// What the issuer issues and which claims it needs to do so.
pub fn credential_manifest(identifier: &Identifier) -> Result<CredentialManifest, AppError> {
    let reply_url = messaging_endpoint(identifier)?;
    Ok(CredentialManifest {
        issuer: ManifestIssuer {
            id: identifier.did.clone(),
            name: ISSUER_NAME.into(),
        },
        credential: ManifestCredential {
            credential_type: CERTIFICATE_OF_INCORPORATION.into(),
            context: KYC_CONTEXT.into(),
        },
        sdr: SelectiveDisclosureRequest {
            issuer: identifier.did.clone(),
            reply_url: reply_url.into(),
            claims: vec![
                ClaimRequest::essential("legalName").reason("Please provide your company name"),
                ClaimRequest::essential("legalEntityType").reason("Please provide legal entity type"),
                ClaimRequest::essential("jurisdiction").reason("Please provide legal jurisdiction"),
                ClaimRequest::essential("foundingDate").reason("Please provide founding date"),
            ],
        },
    })
}

// ---------------------------------------------------------------------------
// Bank: relying-party services
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceType {
    CorporateBankAccountOpen,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelyingPartyService {
    pub name: String,
    #[serde(rename = "type")]
    pub service_type: ServiceType,
    pub service_provider: String,
    pub sdr: SelectiveDisclosureRequest,
}

/// The services the bank offers and the credentials each one asks for.
pub fn bank_services(identifier: &Identifier) -> Result<Vec<RelyingPartyService>, AppError> {
    let reply_url = messaging_endpoint(identifier)?;
    let claims = vec![
        ClaimRequest::essential("legalName")
            .reason("Please provide your company name")
            .from_incorporation_certificate(),
        ClaimRequest::essential("legalEntityType").from_incorporation_certificate(),
        ClaimRequest::essential("jurisdiction").from_incorporation_certificate(),
        ClaimRequest::essential("foundingDate").from_incorporation_certificate(),
    ];

    Ok(vec![RelyingPartyService {
        name: "Open Corporate Bank Account".into(),
        service_type: ServiceType::CorporateBankAccountOpen,
        service_provider: identifier.did.clone(),
        sdr: SelectiveDisclosureRequest {
            issuer: identifier.did.clone(),
            reply_url: reply_url.into(),
            claims,
        },
    }])
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use selfkey_agent::{DidProvider, Service};
    use serde_json::json;

    fn identifier(services: Vec<Service>) -> Identifier {
        Identifier {
            did: "did:web:issuer.example".into(),
            alias: Some("issuer.example".into()),
            provider: DidProvider::Web,
            controller_key_id: None,
            keys: Vec::new(),
            services,
        }
    }

    fn messaging() -> Service {
        Service::new("did:web:issuer.example#messaging-1", "Messaging", "https://issuer.example/messaging")
    }

    #[test]
    fn manifest_shape() {
        let manifest = credential_manifest(&identifier(vec![messaging()])).unwrap();
        let value = serde_json::to_value(&manifest).unwrap();
        assert_eq!(value["issuer"], json!({ "id": "did:web:issuer.example", "name": "Super Corporate Registrar" }));
        assert_eq!(
            value["credential"],
            json!({ "type": "CertificateOfIncorporation", "context": "https://platform.selfkey.org/contexts/kyc/v1.jsonld" })
        );
        assert_eq!(value["sdr"]["replyUrl"], "https://issuer.example/messaging");
        assert_eq!(
            value["sdr"]["claims"][3],
            json!({ "reason": "Please provide founding date", "claimType": "foundingDate", "essential": true })
        );
    }

    #[test]
    fn manifest_needs_messaging() {
        let err = credential_manifest(&identifier(Vec::new())).unwrap_err();
        assert!(matches!(err, AppError::Internal(msg) if msg == "No messaging endpoint"));
    }

    #[test]
    fn bank_service_shape() {
        let services = bank_services(&identifier(vec![messaging()])).unwrap();
        let value = serde_json::to_value(&services).unwrap();
        assert_eq!(value[0]["type"], "CORPORATE_BANK_ACCOUNT_OPEN");
        assert_eq!(value[0]["serviceProvider"], "did:web:issuer.example");

        let claims = value[0]["sdr"]["claims"].as_array().unwrap();
        assert_eq!(claims.len(), 4);
        assert_eq!(claims[0]["reason"], "Please provide your company name");
        assert!(claims[1].get("reason").is_none());
        assert_eq!(
            claims[2]["issuers"],
            json!([{ "did": "did:web:issuer-selfkey.ngrok.io", "url": "https:////issuer-selfkey.ngrok.io" }])
        );
        assert_eq!(claims[2]["credentialType"], "CertificateOfIncorporation");
    }
}
