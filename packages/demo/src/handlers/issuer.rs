//! Issuer routes.

use axum::{extract::State, Json};

use super::{AppState, RequestHost};
use crate::error::AppError;
use crate::manifest::{self, CredentialManifest};

/// `GET /.well-known/issuer.json`
///
/// The credential manifest: what this issuer issues and the claims it asks
/// for, with replies going to its messaging endpoint.
pub async fn credential_manifest(
    State(state): State<AppState>,
    host: RequestHost,
) -> Result<Json<CredentialManifest>, AppError> {
    let identity = state.identity(&host).await?;
    Ok(Json(manifest::credential_manifest(&identity)?))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use selfkey_agent::{IssueOptions, UnsignedCredential};

    use crate::config::Role;
    use crate::handlers::test_support::*;

    #[tokio::test]
    async fn serves_manifest() {
        let state = state(Role::Issuer);
        let resp = send(app(&state), get("/.well-known/issuer.json", "issuer.example")).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let manifest = body_json(resp).await;
        assert_eq!(manifest["issuer"]["id"], "did:web:issuer.example");
        assert_eq!(manifest["issuer"]["name"], "Super Corporate Registrar");
        assert_eq!(manifest["credential"]["type"], "CertificateOfIncorporation");
        assert_eq!(manifest["sdr"]["issuer"], "did:web:issuer.example");
        assert_eq!(manifest["sdr"]["replyUrl"], "https://issuer.example/messaging");
        assert_eq!(manifest["sdr"]["claims"].as_array().unwrap().len(), 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_first_manifest_requests_succeed() {
        let state = state(Role::Issuer);
        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let app = app(&state);
                tokio::spawn(async move { send(app, get("/.well-known/issuer.json", "fresh.example")).await })
            })
            .collect();
        for task in tasks {
            let resp = task.await.unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
            assert_eq!(body_json(resp).await["sdr"]["replyUrl"], "https://fresh.example/messaging");
        }
    }

    #[tokio::test]
    async fn manifest_route_is_issuer_only() {
        let state = state(Role::Holder);
        let resp = send(app(&state), get("/.well-known/issuer.json", "holder.example")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn messaging_accepts_credentials() {
        let state = state(Role::Issuer);
        let credential: UnsignedCredential = serde_json::from_value(json!({
            "credentialSubject": { "id": "did:key:z6MkHolder", "legalName": "Acme" }
        }))
        .unwrap();
        let vc = state
            .agent
            .issue_credential(credential, &IssueOptions::default())
            .await
            .unwrap();

        let resp = send(app(&state), post("/messaging", "issuer.example", vc.proof.jwt.clone())).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let message = body_json(resp).await;
        assert_eq!(message["type"], "w3c.vc");
        assert_eq!(message["to"], "did:key:z6MkHolder");
        assert_eq!(state.agent.list_credentials().await.unwrap().len(), 1);

        let resp = send(app(&state), post("/messaging", "issuer.example", "hello")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
