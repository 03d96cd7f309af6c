//! Per-host `did:web` identities.
//!
//! Each server answers for whatever host name it is reached under. The first
//! request for a host creates `did:web:<host>` with an extra Ed25519 key and
//! the role's service endpoints; later requests reuse it.

use tracing::info;

use selfkey_agent::identifier::DidManagerError;
use selfkey_agent::{Agent, AgentError, DidProvider, Identifier, Service};

use crate::config::Role;

/// Services published in the DID document of a freshly created identity.
pub fn role_services(role: Role, did: &str, host: &str) -> Vec<Service> {
    let host = host.replace("%3A", ":").replace("%3a", ":");
    let messaging = |path: &str| {
        Service::new(
            format!("{did}#messaging-1"),
            "Messaging",
            format!("https://{host}/{path}"),
        )
        .with_description("didcomm v1 messaging service")
    };

    match role {
        Role::Issuer | Role::Holder => vec![messaging("messaging")],
        Role::Bank => vec![
            Service::new(format!("{did}#didcomm-1"), "DIDComm", format!("https://{host}/didcomm"))
                .with_description("https didcomm endpoint"),
            Service::new(format!("{did}#didcomm-2"), "DIDComm", format!("http://{host}/didcomm"))
                .with_description("http didcomm endpoint"),
            messaging("didcomm"),
        ],
    }
}

/// Return the `did:web` identifier for `host`, creating it on first use.
///
/// The identity is stored with its extra key and services in one write, so a
/// concurrent first request either creates it or finds it complete.
pub async fn get_or_create_identifier(
    agent: &Agent,
    role: Role,
    host: &str,
) -> Result<Identifier, AgentError> {
    match agent.identifier_by_alias(DidProvider::Web, host).await {
        Ok(existing) => return Ok(existing),
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e),
    }

    let created = agent
        .create_identifier_with(DidProvider::Web, Some(host), 1, |did| {
            role_services(role, did, host)
        })
        .await;
    match created {
        Ok(identifier) => {
            info!(did = %identifier.did, %role, "web identity created");
            Ok(identifier)
        }
        // Another request created it first.
        Err(AgentError::DidManager(DidManagerError::Conflict(_))) => {
            agent.identifier_by_alias(DidProvider::Web, host).await
        }
        Err(e) => Err(e),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
