//! Demo server configuration, populated from environment variables.

use std::fmt;
use std::net::SocketAddr;

use selfkey_agent::identifier::DidManagerError;
use selfkey_agent::DidProvider;

/// Which demo server to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Role {
    Issuer,
    Holder,
    Bank,
}

impl Role {
    /// Prefix of the role-specific environment variables.
    pub fn env_prefix(self) -> &'static str {
        match self {
            Role::Issuer => "ISSUER",
            Role::Holder => "HOLDER",
            Role::Bank => "BANK",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Issuer => "issuer",
            Role::Holder => "holder",
            Role::Bank => "bank",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Role::Issuer => "SelfKey Issuer",
            Role::Holder => "SelfKey Holder",
            Role::Bank => "SelfKey Bank",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be a port number, got {value:?}")]
    Port { var: String, value: String },

    #[error("SELFKEY_BIND_HOST {0:?} is not a valid IP address")]
    BindHost(String),

    #[error(transparent)]
    Provider(#[from] DidManagerError),
}

/// Runtime configuration for one demo server.
///
/// `{ROLE}` is `ISSUER`, `HOLDER` or `BANK`. A role-specific variable wins
/// over the shared one.
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `{ROLE}_PORT`, `PORT` | `3000` | TCP port to listen on |
/// | `SELFKEY_BIND_HOST` | `0.0.0.0` | Interface to bind |
/// | `{ROLE}_SECRET_BOX_KEY`, `SECRET_BOX_KEY` | (absent = keys unsealed) | Hex key sealing private keys at rest |
/// | `{ROLE}_UNIRESOLVER_URL`, `UNIRESOLVER_URL` | (absent) | Universal resolver for other DID methods |
/// | `{ROLE}_DB` | `tmp/{role}.sqlite` | SQLite database file |
/// | `SELFKEY_MEMORY` | (absent) | `1` or `true` keeps everything in memory |
/// | `{ROLE}_DID_PROVIDER`, `DID_PROVIDER` | `did:key` | Provider of the agent's own DID |
/// | `SELFKEY_WEB_SCHEME` | `https` | Scheme used to fetch `did:web` documents |
#[derive(Debug, Clone)]
pub struct DemoConfig {
    pub role: Role,

    pub bind_addr: SocketAddr,

    pub kms_key: Option<String>,

    pub universal_resolver: Option<String>,

    /// Path to the SQLite database file.
    /// `None` means use an in-memory store (data is lost on restart).
    pub db_path: Option<String>,

    pub did_provider: DidProvider,

    pub web_scheme: String,
}

impl DemoConfig {
    /// Populate config from environment variables, applying defaults where absent.
    pub fn from_env(role: Role) -> Result<Self, ConfigError> {
        Self::from_lookup(role, |var| std::env::var(var).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(role: Role, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let prefix = role.env_prefix();
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let either = |name: &str| {
            let specific = format!("{prefix}_{name}");
            get(&specific)
                .map(|v| (specific, v))
                .or_else(|| get(name).map(|v| (name.to_string(), v)))
        };

        let port = match either("PORT") {
            Some((var, value)) => value
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::Port { var, value })?,
            None => 3000,
        };
        let host = get("SELFKEY_BIND_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let ip = host
            .trim()
            .parse()
            .map_err(|_| ConfigError::BindHost(host.clone()))?;

        let in_memory = get("SELFKEY_MEMORY")
            .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
            .unwrap_or(false);
        let db_path = if in_memory {
            None
        } else {
            Some(get(&format!("{prefix}_DB")).unwrap_or_else(|| format!("tmp/{role}.sqlite")))
        };

        let did_provider = match either("DID_PROVIDER") {
            Some((_, value)) => value.parse()?,
            None => DidProvider::Key,
        };

        Ok(Self {
            role,
            bind_addr: SocketAddr::new(ip, port),
            kms_key: either("SECRET_BOX_KEY").map(|(_, v)| v),
            universal_resolver: either("UNIRESOLVER_URL").map(|(_, v)| v),
            db_path,
            did_provider,
            web_scheme: get("SELFKEY_WEB_SCHEME").unwrap_or_else(|| "https".into()),
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(role: Role, vars: &[(&str, &str)]) -> Result<DemoConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DemoConfig::from_lookup(role, |k| vars.get(k).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = config(Role::Issuer, &[]).unwrap();
        assert_eq!(cfg.bind_addr, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(cfg.db_path.as_deref(), Some("tmp/issuer.sqlite"));
        assert_eq!(cfg.kms_key, None);
        assert_eq!(cfg.universal_resolver, None);
        assert_eq!(cfg.did_provider, DidProvider::Key);
        assert_eq!(cfg.web_scheme, "https");
    }

    #[test]
    fn role_specific_variables_win() {
        let cfg = config(
            Role::Bank,
            &[("PORT", "4000"), ("BANK_PORT", "4100"), ("SECRET_BOX_KEY", "shared"), ("ISSUER_SECRET_BOX_KEY", "other")],
        )
        .unwrap();
        assert_eq!(cfg.bind_addr.port(), 4100);
        assert_eq!(cfg.kms_key.as_deref(), Some("shared"));

        let holder = config(Role::Holder, &[("PORT", "4000")]).unwrap();
        assert_eq!(holder.bind_addr.port(), 4000);
        assert_eq!(holder.db_path.as_deref(), Some("tmp/holder.sqlite"));
    }

    #[test]
    fn memory_mode_drops_the_database() {
        let cfg = config(Role::Holder, &[("SELFKEY_MEMORY", "1"), ("HOLDER_DB", "x.sqlite")]).unwrap();
        assert_eq!(cfg.db_path, None);
    }

    #[test]
    fn bad_values_are_reported() {
        let err = config(Role::Issuer, &[("ISSUER_PORT", "http")]).unwrap_err();
        assert_eq!(err.to_string(), "ISSUER_PORT must be a port number, got \"http\"");
        assert!(matches!(
            config(Role::Issuer, &[("SELFKEY_BIND_HOST", "nowhere")]),
            Err(ConfigError::BindHost(_))
        ));
        assert!(matches!(
            config(Role::Issuer, &[("DID_PROVIDER", "did:ethr")]),
            Err(ConfigError::Provider(_))
        ));
    }

    #[test]
    fn web_provider() {
        let cfg = config(Role::Issuer, &[("ISSUER_DID_PROVIDER", "did:web")]).unwrap();
        assert_eq!(cfg.did_provider, DidProvider::Web);
    }
}
