//! Routes every demo server serves.

use axum::{
    body::Bytes,
    extract::{Path, State},
    response::Html,
    Json,
};
use serde_json::Value;

use selfkey_agent::Message;

use super::{escape_html, AppState, RequestHost};
use crate::config::Role;
use crate::error::AppError;
use crate::remote;

/// `GET /.well-known/did.json`
///
/// The DID document of the host's `did:web` identity, created on first
/// request.
pub async fn did_document(
    State(state): State<AppState>,
    host: RequestHost,
) -> Result<Json<Value>, AppError> {
    let identity = state.identity(&host).await?;
    let doc = state
        .agent
        .generate_did_doc(&identity.did)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no DID document for {}", identity.did)))?;
    Ok(Json(doc))
}

/// `POST /agent/{method}`
pub async fn agent_method(
    State(state): State<AppState>,
    Path(method): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let args = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("request body is not JSON: {e}")))?
    };
    tracing::debug!(%method, "agent method called");
    Ok(Json(remote::invoke(&state.agent, &method, args).await?))
}

/// `GET /open-api.json`
pub async fn open_api(State(state): State<AppState>, host: RequestHost) -> Json<Value> {
    let server = format!("https://{}/agent", host.0);
    Json(remote::open_api(state.role.title(), &server))
}

/// `POST /messaging` (issuer, holder) and `POST /didcomm` (bank)
///
/// The body is a VC-JWT or VP-JWT, bare or wrapped in JSON. Presentations
/// must be addressed to this host's identity.
pub async fn receive_message(
    State(state): State<AppState>,
    host: RequestHost,
    body: String,
) -> Result<Json<Message>, AppError> {
    let identity = state.identity(&host).await?;
    let message = state.agent.handle_message(&body, Some(&identity.did)).await?;
    Ok(Json(message))
}

/// `GET /`
pub async fn index(
    State(state): State<AppState>,
    host: RequestHost,
) -> Result<Html<String>, AppError> {
    let identity = state.identity(&host).await?;
    let title = state.role.title();

    let mut links = vec![
        ("/.well-known/did.json", "DID document"),
        ("/open-api.json", "Agent API"),
    ];
    match state.role {
        Role::Issuer => links.push(("/.well-known/issuer.json", "Credential manifest")),
        Role::Holder => links.push(("/credentials", "Credentials")),
        Role::Bank => links.push(("/services", "Services")),
    }
    let items: String = links
        .iter()
        .map(|(href, label)| format!("<li><a href=\"{href}\">{label}</a></li>"))
        .collect();

    Ok(Html(format!(
        "<!DOCTYPE html>\n<html>\n<head><title>{title}</title></head>\n<body>\n\
         <h1>{title}</h1>\n<p>DID: <code>{did}</code></p>\n<ul>{items}</ul>\n</body>\n</html>\n",
        did = escape_html(&identity.did),
    )))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::config::Role;
    use crate::handlers::test_support::*;

    #[tokio::test]
    async fn did_document_for_host() {
        let state = state(Role::Issuer);
        let resp = send(app(&state), get("/.well-known/did.json", "localhost:3000")).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let doc = body_json(resp).await;
        assert_eq!(doc["id"], "did:web:localhost%3A3000");
        assert_eq!(doc["@context"], "https://w3id.org/did/v1");
        assert_eq!(doc["publicKey"].as_array().unwrap().len(), 2);
        assert_eq!(doc["service"][0]["type"], "Messaging");
        assert_eq!(doc["service"][0]["serviceEndpoint"], "https://localhost:3000/messaging");
    }

    #[tokio::test]
    async fn each_host_gets_its_own_identity() {
        let state = state(Role::Issuer);
        let a = body_json(send(app(&state), get("/.well-known/did.json", "a.example")).await).await;
        let b = body_json(send(app(&state), get("/.well-known/did.json", "b.example")).await).await;
        assert_eq!(a["id"], "did:web:a.example");
        assert_eq!(b["id"], "did:web:b.example");
    }

    #[tokio::test]
    async fn index_names_role_and_identity() {
        let state = state(Role::Bank);
        let resp = send(app(&state), get("/", "bank.example")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let html = body_text(resp).await;
        assert!(html.contains("<h1>SelfKey Bank</h1>"));
        assert!(html.contains("did:web:bank.example"));
        assert!(html.contains("/services"));
    }

    #[tokio::test]
    async fn agent_methods_over_http() {
        let state = state(Role::Holder);
        let resp = send(
            app(&state),
            post("/agent/didManagerGetOrCreate", "holder.example", json!({ "alias": "alice" }).to_string()),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let id = body_json(resp).await;
        assert!(id["did"].as_str().unwrap().starts_with("did:key:"));

        let resp = send(app(&state), post("/agent/didManagerFind", "holder.example", "")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        // alice, plus the host's web identity created by the holder middleware
        assert_eq!(body_json(resp).await.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn agent_method_errors() {
        let state = state(Role::Issuer);
        let resp = send(app(&state), post("/agent/nope", "issuer.example", "{}")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(resp).await["code"], "not_found");

        let resp = send(app(&state), post("/agent/didManagerGet", "issuer.example", "{not json")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = send(
            app(&state),
            post("/agent/didManagerGet", "issuer.example", json!({ "did": "did:web:unknown" }).to_string()),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn open_api_document() {
        let state = state(Role::Issuer);
        let doc = body_json(send(app(&state), get("/open-api.json", "issuer.example")).await).await;
        assert_eq!(doc["info"]["title"], "SelfKey Issuer");
        assert_eq!(doc["servers"][0]["url"], "https://issuer.example/agent");
        assert!(doc["paths"]["/createVerifiableCredential"]["post"].is_object());
    }

    #[tokio::test]
    async fn missing_host_is_rejected() {
        let state = state(Role::Issuer);
        let req = axum::http::Request::builder()
            .uri("/.well-known/did.json")
            .body(axum::body::Body::empty())
            .unwrap();
        let resp = send(app(&state), req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
