//! Wiring a configured agent into a running server.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use selfkey_agent::storage::{memory::MemoryStorage, sqlite::SqliteStorage, Storage};
use selfkey_agent::{Agent, AgentOptions};

use crate::config::DemoConfig;
use crate::error::DemoError;
use crate::handlers::AppState;
use crate::router::build_router;

/// Open the configured store, creating the database directory if needed.
pub fn open_store(config: &DemoConfig) -> Result<Arc<dyn Storage>, DemoError> {
    match &config.db_path {
        Some(path) => {
            if let Some(dir) = Path::new(path).parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)?;
            }
            info!("storage: SQLite at {path}");
            let store = SqliteStorage::open(path).map_err(|e| DemoError::Database {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            Ok(Arc::new(store))
        }
        None => {
            info!("storage: in-memory (data will not survive restart)");
            Ok(Arc::new(MemoryStorage::new()))
        }
    }
}

/// Build the agent for a role.
pub fn build_agent(config: &DemoConfig) -> Result<Agent, DemoError> {
    let store = open_store(config)?;
    let mut options = AgentOptions::new(store, config.did_provider)
        .agent_name(format!("selfkey-{}", config.role))
        .web_scheme(config.web_scheme.clone());
    if let Some(key) = &config.kms_key {
        options = options.kms_key(key.clone());
    } else {
        warn!("no secret box key configured; private keys are stored unsealed");
    }
    if let Some(endpoint) = &config.universal_resolver {
        options = options.universal_resolver(endpoint.clone());
    }
    Ok(Agent::new(options)?)
}

/// Run the role's server until SIGINT or SIGTERM.
pub async fn serve(config: DemoConfig) -> Result<(), DemoError> {
    let agent = build_agent(&config)?;
    let did = agent.ensure_agent_did().await?;
    info!(role = %config.role, %did, "agent ready");

    let app = build_router(AppState::new(Arc::new(agent), config.role));

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Resolves on the first SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let interrupt = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "SIGINT",
            Err(e) => {
                warn!("cannot listen for SIGINT: {e}");
                std::future::pending::<&str>().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                "SIGTERM"
            }
            Err(e) => {
                warn!("cannot listen for SIGTERM: {e}");
                std::future::pending::<&str>().await
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<&str>();

    let received = tokio::select! {
        name = interrupt => name,
        name = terminate => name,
    };
    info!("{received} received! Shutting down.");
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Role;

    fn config(role: Role, db_path: Option<String>) -> DemoConfig {
        DemoConfig {
            role,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            kms_key: Some(Agent::generate_kms_key()),
            universal_resolver: None,
            db_path,
            did_provider: selfkey_agent::DidProvider::Key,
            web_scheme: "http".into(),
        }
    }

    #[tokio::test]
    async fn agent_name_follows_role() {
        let agent = build_agent(&config(Role::Bank, None)).unwrap();
        assert_eq!(agent.agent_name(), "selfkey-bank");
        agent.ensure_agent_did().await.unwrap();
        let ids = agent.identifiers(None, Some("selfkey-bank")).await.unwrap();
        assert_eq!(ids.len(), 1);
    }

    #[tokio::test]
    async fn sqlite_directory_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("issuer.sqlite");
        let cfg = config(Role::Issuer, Some(path.to_string_lossy().into_owned()));

        let did = build_agent(&cfg).unwrap().ensure_agent_did().await.unwrap();
        assert!(path.exists());
        // Reopening finds the same identity.
        let again = build_agent(&cfg).unwrap().ensure_agent_did().await.unwrap();
        assert_eq!(did, again);
    }
}
