//! Credential store abstraction

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A stored SSH key pair
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SshPair {
    /// Owner the pair is scoped to
    pub owner: String,

    /// Purpose tag, e.g. `internal`
    pub service: String,

    /// Key pair name, unique per (owner, service)
    pub name: String,

    /// Public key in OpenSSH format
    pub public_key: String,

    /// Private key in OpenSSH format, not always handed out
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
}

/// Credential store failures
#[derive(Error, Debug)]
pub enum KeyStoreError {
    /// A pair with the same (owner, service, name) already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The store could not serve the request
    #[error("{0}")]
    Server(String),
}

/// Storage of SSH key pairs per owner and service
#[async_trait]
pub trait SshKeyStore: Send + Sync {
    /// All pairs of `owner` for `service`, in store order
    async fn get_pairs(&self, owner: &str, service: &str)
        -> Result<Vec<SshPair>, KeyStoreError>;

    /// Generate and persist a new pair
    async fn generate_pair(
        &self,
        owner: &str,
        service: &str,
        name: &str,
    ) -> Result<SshPair, KeyStoreError>;
}
