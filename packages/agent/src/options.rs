//! Agent construction options.

use std::fmt;
use std::sync::Arc;

use crate::identifier::DidProvider;
use crate::storage::Storage;

pub const DEFAULT_KMS_NAME: &str = "local";
pub const DEFAULT_AGENT_NAME: &str = "selfkey-agent";

/// Options for [`Agent::new`](crate::Agent::new).
///
/// | Field | Default |
/// |-------|---------|
/// | `store` | required |
/// | `did_provider` | required |
/// | `kms_key` | none: private keys stored unsealed |
/// | `kms_name` | `local` |
/// | `agent_name` | `selfkey-agent` |
/// | `universal_resolver` | none: only `did:key` and `did:web` resolve |
/// | `web_scheme` | `https` |
#[derive(Clone)]
pub struct AgentOptions {
    pub store: Arc<dyn Storage>,
    pub did_provider: DidProvider,
    /// Hex 32-byte secret box key.
    pub kms_key: Option<String>,
    pub kms_name: String,
    /// Alias of the agent's own identifier.
    pub agent_name: String,
    /// Universal resolver endpoint for every method besides `key` and `web`.
    pub universal_resolver: Option<String>,
    /// Scheme used to fetch `did:web` documents.
    pub web_scheme: String,
}

impl AgentOptions {
    pub fn new(store: Arc<dyn Storage>, did_provider: DidProvider) -> Self {
        Self {
            store,
            did_provider,
            kms_key: None,
            kms_name: DEFAULT_KMS_NAME.into(),
            agent_name: DEFAULT_AGENT_NAME.into(),
            universal_resolver: None,
            web_scheme: "https".into(),
        }
    }

    pub fn kms_key(mut self, key: impl Into<String>) -> Self {
        self.kms_key = Some(key.into());
        self
    }

    pub fn kms_name(mut self, name: impl Into<String>) -> Self {
        self.kms_name = name.into();
        self
    }

    pub fn agent_name(mut self, name: impl Into<String>) -> Self {
        self.agent_name = name.into();
        self
    }

    pub fn universal_resolver(mut self, endpoint: impl Into<String>) -> Self {
        self.universal_resolver = Some(endpoint.into());
        self
    }

    pub fn web_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.web_scheme = scheme.into();
        self
    }
}

impl fmt::Debug for AgentOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentOptions")
            .field("did_provider", &self.did_provider)
            .field("kms_key", &self.kms_key.as_ref().map(|_| "<redacted>"))
            .field("kms_name", &self.kms_name)
            .field("agent_name", &self.agent_name)
            .field("universal_resolver", &self.universal_resolver)
            .field("web_scheme", &self.web_scheme)
            .finish_non_exhaustive()
    }
}
