//! Agent methods exposed over HTTP.
//!
//! `POST /agent/{method}` takes the method's arguments as a JSON object and
//! answers with the method's result as JSON. `GET /open-api.json` describes
//! the same methods as an OpenAPI 3 document.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use selfkey_agent::{
    Agent, DidProvider, IssueOptions, JwtInput, PresentationOptions, UnsignedCredential,
    VerifiableCredential, VerifyOptions,
};

use crate::error::AppError;

/// Exposed methods and their descriptions, in the order they are documented.
pub const METHODS: &[(&str, &str)] = &[
    ("resolveDid", "Resolve a DID URL to a DID resolution result"),
    ("didManagerGetOrCreate", "Get an identifier by alias, creating it if needed"),
    ("didManagerFind", "List identifiers, optionally by provider and alias"),
    ("didManagerGet", "Get an identifier by DID"),
    ("createVerifiableCredential", "Issue a credential with a JWT proof"),
    ("createVerifiablePresentation", "Issue a presentation with a JWT proof"),
    ("verifyCredential", "Verify a VC-JWT or a credential carrying one"),
    ("verifyPresentation", "Verify a VP-JWT or a presentation carrying one"),
    ("dataStoreORMGetVerifiableCredentials", "List stored credentials"),
    ("handleMessage", "Verify and store an inbound credential message"),
];

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResolveDidArgs {
    did_url: String,
}

#[derive(Deserialize)]
struct GetOrCreateArgs {
    alias: String,
    provider: Option<DidProvider>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct FindArgs {
    provider: Option<DidProvider>,
    alias: Option<String>,
}

#[derive(Deserialize)]
struct GetArgs {
    did: String,
}

#[derive(Deserialize)]
struct CreateCredentialArgs {
    credential: UnsignedCredential,
    #[serde(flatten)]
    options: IssueOptions,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PresentationArgs {
    holder: Option<String>,
    verifier: OneOrMany,
    #[serde(default)]
    verifiable_credential: Vec<VerifiableCredential>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePresentationArgs {
    presentation: PresentationArgs,
    #[serde(default)]
    save: bool,
    #[serde(default)]
    proof_format: Option<String>,
}

#[derive(Deserialize)]
struct VerifyCredentialArgs {
    credential: JwtInput,
    #[serde(flatten)]
    options: VerifyOptions,
}

#[derive(Deserialize)]
struct VerifyPresentationArgs {
    presentation: JwtInput,
    #[serde(flatten)]
    options: VerifyOptions,
}

/// `{ "column": "subject", "value": ["did:…"] }`
#[derive(Deserialize)]
struct WhereClause {
    column: String,
    #[serde(default)]
    value: Vec<String>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct FindCredentialsArgs {
    #[serde(rename = "where")]
    conditions: Vec<WhereClause>,
}

#[derive(Deserialize)]
struct HandleMessageArgs {
    raw: String,
    audience: Option<String>,
}

fn parse<T: DeserializeOwned>(method: &str, args: Value) -> Result<T, AppError> {
    serde_json::from_value(args)
        .map_err(|e| AppError::BadRequest(format!("invalid arguments for {method}: {e}")))
}

fn to_json<T: Serialize>(value: T) -> Result<Value, AppError> {
    serde_json::to_value(value).map_err(|e| AppError::Internal(e.to_string()))
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Run one exposed agent method. Unknown methods are [`AppError::NotFound`].
pub async fn invoke(agent: &Agent, method: &str, args: Value) -> Result<Value, AppError> {
    let args = if args.is_null() { Value::Object(Map::new()) } else { args };

    match method {
        "resolveDid" => {
            let a: ResolveDidArgs = parse(method, args)?;
            to_json(agent.resolve_did(&a.did_url).await?)
        }
        "didManagerGetOrCreate" => {
            let a: GetOrCreateArgs = parse(method, args)?;
            let provider = a.provider.unwrap_or(agent.provider());
            to_json(agent.get_or_create_identifier(provider, &a.alias).await?)
        }
        "didManagerFind" => {
            let a: FindArgs = parse(method, args)?;
            to_json(agent.identifiers(a.provider, a.alias.as_deref()).await?)
        }
        "didManagerGet" => {
            let a: GetArgs = parse(method, args)?;
            to_json(agent.identifier(&a.did).await?)
        }
        "createVerifiableCredential" => {
            let a: CreateCredentialArgs = parse(method, args)?;
            to_json(agent.issue_credential(a.credential, &a.options).await?)
        }
        "createVerifiablePresentation" => {
            let a: CreatePresentationArgs = parse(method, args)?;
            if let Some(format) = a.proof_format.filter(|f| !f.eq_ignore_ascii_case("jwt")) {
                return Err(AppError::BadRequest(format!("unsupported proof format: {format}")));
            }
            let verifier = match a.presentation.verifier {
                OneOrMany::One(v) => Some(v),
                OneOrMany::Many(v) => v.into_iter().next(),
            }
            .ok_or_else(|| AppError::BadRequest("presentation.verifier is empty".into()))?;
            let vp = agent
                .issue_presentation(
                    a.presentation.verifiable_credential,
                    &verifier,
                    a.presentation.holder.as_deref(),
                    &PresentationOptions { save: a.save },
                )
                .await?;
            to_json(vp)
        }
        "verifyCredential" => {
            let a: VerifyCredentialArgs = parse(method, args)?;
            to_json(agent.verify_credential(&a.credential, &a.options).await?)
        }
        "verifyPresentation" => {
            let a: VerifyPresentationArgs = parse(method, args)?;
            to_json(agent.verify_presentation(&a.presentation, &a.options).await?)
        }
        "dataStoreORMGetVerifiableCredentials" => {
            let a: FindCredentialsArgs = parse(method, args)?;
            let mut credentials = agent.list_credentials().await?;
            for clause in &a.conditions {
                let column = clause.column.as_str();
                if !matches!(column, "subject" | "issuer") {
                    return Err(AppError::BadRequest(format!("unsupported column: {column}")));
                }
                credentials.retain(|c| {
                    let vc = &c.verifiable_credential;
                    let value = if column == "subject" { vc.subject_id() } else { vc.issuer_id() };
                    value.is_some_and(|v| clause.value.iter().any(|x| x == v))
                });
            }
            to_json(credentials)
        }
        "handleMessage" => {
            let a: HandleMessageArgs = parse(method, args)?;
            to_json(agent.handle_message(&a.raw, a.audience.as_deref()).await?)
        }
        other => Err(AppError::NotFound(format!("unknown agent method: {other}"))),
    }
}

// ---------------------------------------------------------------------------
// OpenAPI
// ---------------------------------------------------------------------------

/// OpenAPI 3 description of [`METHODS`], served from `server_url`.
pub fn open_api(title: &str, server_url: &str) -> Value {
    let object = json!({ "type": "object" });
    let mut paths = Map::new();
    for (name, description) in METHODS {
        paths.insert(
            format!("/{name}"),
            json!({
                "post": {
                    "operationId": name,
                    "description": description,
                    "requestBody": {
                        "content": { "application/json": { "schema": object } }
                    },
                    "responses": {
                        "200": {
                            "description": "Successful response",
                            "content": { "application/json": { "schema": object } }
                        }
                    }
                }
            }),
        );
    }

    json!({
        "openapi": "3.0.0",
        "info": { "title": title, "version": env!("CARGO_PKG_VERSION") },
        "servers": [{ "url": server_url }],
        "paths": paths,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use selfkey_agent::storage::memory::MemoryStorage;
    use selfkey_agent::AgentOptions;

    fn agent() -> Agent {
        Agent::new(AgentOptions::new(Arc::new(MemoryStorage::new()), DidProvider::Key)).unwrap()
    }

    #[test]
    fn open_api_lists_every_method() {
        let doc = open_api("SelfKey Issuer", "https://issuer.example/agent");
        assert_eq!(doc["openapi"], "3.0.0");
        assert_eq!(doc["servers"][0]["url"], "https://issuer.example/agent");
        let paths = doc["paths"].as_object().unwrap();
        assert_eq!(paths.len(), METHODS.len());
        assert_eq!(paths["/handleMessage"]["post"]["operationId"], "handleMessage");
    }

    #[tokio::test]
    async fn unknown_method() {
        let err = invoke(&agent(), "keyManagerDelete", json!({})).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn bad_arguments() {
        let err = invoke(&agent(), "didManagerGet", json!({ "alias": "x" })).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg.starts_with("invalid arguments for didManagerGet")));
    }

    #[tokio::test]
    async fn identifiers_round_trip() {
        let agent = agent();
        let created = invoke(&agent, "didManagerGetOrCreate", json!({ "alias": "alice" })).await.unwrap();
        let did = created["did"].as_str().unwrap().to_string();
        assert!(did.starts_with("did:key:"));

        let found = invoke(&agent, "didManagerFind", Value::Null).await.unwrap();
        assert_eq!(found.as_array().unwrap().len(), 1);

        let got = invoke(&agent, "didManagerGet", json!({ "did": did })).await.unwrap();
        assert_eq!(got, created);

        let resolved = invoke(&agent, "resolveDid", json!({ "didUrl": format!("{did}#x") })).await.unwrap();
        assert_eq!(resolved["didDocument"]["id"], did);
    }

    #[tokio::test]
    async fn issue_verify_and_query() {
        let agent = agent();
        let vc = invoke(
            &agent,
            "createVerifiableCredential",
            json!({
                "credential": { "credentialSubject": { "id": "did:key:z6MkSubject", "legalName": "Acme" } },
                "save": true,
                "proofFormat": "jwt"
            }),
        )
        .await
        .unwrap();
        assert_eq!(vc["proof"]["type"], "JwtProof2020");

        let verified = invoke(&agent, "verifyCredential", json!({ "credential": vc["proof"]["jwt"] }))
            .await
            .unwrap();
        assert_eq!(verified["verifiableCredential"]["credentialSubject"]["legalName"], "Acme");

        let by_subject = invoke(
            &agent,
            "dataStoreORMGetVerifiableCredentials",
            json!({ "where": [{ "column": "subject", "value": ["did:key:z6MkSubject"] }] }),
        )
        .await
        .unwrap();
        assert_eq!(by_subject.as_array().unwrap().len(), 1);

        let nobody = invoke(
            &agent,
            "dataStoreORMGetVerifiableCredentials",
            json!({ "where": [{ "column": "issuer", "value": ["did:web:nobody"] }] }),
        )
        .await
        .unwrap();
        assert!(nobody.as_array().unwrap().is_empty());

        let bad = invoke(
            &agent,
            "dataStoreORMGetVerifiableCredentials",
            json!({ "where": [{ "column": "hash", "value": [] }] }),
        )
        .await;
        assert!(matches!(bad, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn presentations() {
        let agent = agent();
        let did = agent.ensure_agent_did().await.unwrap();
        let vp = invoke(
            &agent,
            "createVerifiablePresentation",
            json!({ "presentation": { "verifier": did, "verifiableCredential": [] } }),
        )
        .await
        .unwrap();
        assert_eq!(vp["holder"], did);

        let verified = invoke(&agent, "verifyPresentation", json!({ "presentation": vp }))
            .await
            .unwrap();
        assert_eq!(verified["verifiablePresentation"]["holder"], did);

        let handled = invoke(&agent, "handleMessage", json!({ "raw": vp["proof"]["jwt"] }))
            .await
            .unwrap();
        assert_eq!(handled["type"], "w3c.vp");

        let no_verifier = invoke(
            &agent,
            "createVerifiablePresentation",
            json!({ "presentation": { "verifier": [] } }),
        )
        .await;
        assert!(matches!(no_verifier, Err(AppError::BadRequest(_))));
    }
}
