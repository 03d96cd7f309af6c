//! Holder routes.
//!
//! Every holder request runs through [`resolve_identity`], which attaches
//! the host's identity to the request before any handler sees it.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
    Extension, Json,
};

use selfkey_agent::{Identifier, UniqueCredential};

use super::{AppState, RequestHost};
use crate::error::AppError;

/// The holder identity for the current request.
#[derive(Debug, Clone)]
pub struct Identity(pub Identifier);

/// Middleware: look up (or create) the host's identity and store it in the
/// request extensions as [`Identity`].
pub async fn resolve_identity(
    State(state): State<AppState>,
    host: RequestHost,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = state.identity(&host).await?;
    req.extensions_mut().insert(Identity(identity));
    Ok(next.run(req).await)
}

/// `GET /credentials`
///
/// Stored credentials whose subject is the holder.
pub async fn credentials(
    State(state): State<AppState>,
    Extension(Identity(identity)): Extension<Identity>,
) -> Result<Json<Vec<UniqueCredential>>, AppError> {
    let credentials = state
        .agent
        .list_credentials_for_subject_id(&identity.did)
        .await?;
    Ok(Json(credentials))
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
    async fn lists_only_own_credentials() {
        let state = state(Role::Holder);
        let resp = send(app(&state), get("/credentials", "holder.example")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, json!([]));

        for subject in ["did:web:holder.example", "did:key:z6MkSomeoneElse"] {
            let credential: UnsignedCredential = serde_json::from_value(json!({
                "credentialSubject": { "id": subject, "legalName": "Acme" }
            }))
            .unwrap();
            let vc = state
                .agent
                .issue_credential(credential, &IssueOptions::default())
                .await
                .unwrap();
            let resp = send(app(&state), post("/messaging", "holder.example", vc.proof.jwt)).await;
            assert_eq!(resp.status(), StatusCode::OK);
        }

        let listed = body_json(send(app(&state), get("/credentials", "holder.example")).await).await;
        let listed = listed.as_array().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(
            listed[0]["verifiableCredential"]["credentialSubject"]["id"],
            "did:web:holder.example"
        );
        assert!(listed[0]["hash"].as_str().unwrap().len() == 64);
    }

    #[tokio::test]
    async fn identity_is_created_before_the_handler_runs() {
        let state = state(Role::Holder);
        send(app(&state), get("/credentials", "holder.example")).await;
        let id = state.agent.identifier("did:web:holder.example").await.unwrap();
        assert_eq!(id.service("Messaging").unwrap().service_endpoint, "https://holder.example/messaging");
    }
}
