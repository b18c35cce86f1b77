//! SSH key store backed by Kubernetes secrets
//!
//! Each pair is one `kubernetes.io/ssh-auth` secret in a dedicated namespace.
//! The key service is a label so it can be selected server-side; owner ids are
//! free-form, so they live in an annotation and are filtered client-side.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::{
    api::{ListParams, ObjectMeta, PostParams},
    Api, Client,
};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use ssh_key::{Algorithm, LineEnding, PrivateKey};
use tracing::debug;

use crate::constants::FIELD_MANAGER;

use super::store::{KeyStoreError, SshKeyStore, SshPair};

const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
const SERVICE_LABEL: &str = "async-storage.che.eclipse.org/ssh-service";
const OWNER_ANNOTATION: &str = "async-storage.che.eclipse.org/ssh-owner";
const NAME_ANNOTATION: &str = "async-storage.che.eclipse.org/ssh-name";

const SSH_AUTH_SECRET_TYPE: &str = "kubernetes.io/ssh-auth";
const PRIVATE_KEY_KEY: &str = "ssh-privatekey";
const PUBLIC_KEY_KEY: &str = "ssh-publickey";

/// Longest name the API server accepts for a secret
const MAX_NAME_LEN: usize = 253;

/// Hex digits of the owner digest appended to every secret name
const OWNER_HASH_LEN: usize = 10;

/// Key store keeping every pair in its own secret
#[derive(Clone)]
pub struct SecretSshKeyStore {
    client: Client,
    namespace: String,
}

impl SecretSshKeyStore {
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    fn api(&self) -> Api<Secret> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }
}

#[async_trait]
impl SshKeyStore for SecretSshKeyStore {
    async fn get_pairs(&self, owner: &str, service: &str) -> Result<Vec<SshPair>, KeyStoreError> {
        let selector = format!(
            "{}={},{}={}",
            MANAGED_BY_LABEL,
            FIELD_MANAGER,
            SERVICE_LABEL,
            label_value(service)
        );
        let secrets = self
            .api()
            .list(&ListParams::default().labels(&selector))
            .await
            .map_err(|e| KeyStoreError::Server(e.to_string()))?;

        let mut pairs = Vec::new();
        for secret in &secrets.items {
            if annotation(secret, OWNER_ANNOTATION) != Some(owner) {
                continue;
            }
            pairs.push(pair_from_secret(secret, service)?);
        }
        debug!(owner = %owner, service = %service, count = pairs.len(), "Listed SSH key secrets");
        Ok(pairs)
    }

    async fn generate_pair(
        &self,
        owner: &str,
        service: &str,
        name: &str,
    ) -> Result<SshPair, KeyStoreError> {
        let (public_key, private_key) = generate_keys()?;
        let secret_name = secret_name(owner, service, name);

        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(secret_name.clone()),
                namespace: Some(self.namespace.clone()),
                labels: Some(BTreeMap::from([
                    (MANAGED_BY_LABEL.to_string(), FIELD_MANAGER.to_string()),
                    (SERVICE_LABEL.to_string(), label_value(service)),
                ])),
                annotations: Some(BTreeMap::from([
                    (OWNER_ANNOTATION.to_string(), owner.to_string()),
                    (NAME_ANNOTATION.to_string(), name.to_string()),
                ])),
                ..Default::default()
            },
            type_: Some(SSH_AUTH_SECRET_TYPE.to_string()),
            string_data: Some(BTreeMap::from([
                (PRIVATE_KEY_KEY.to_string(), private_key.clone()),
                (PUBLIC_KEY_KEY.to_string(), public_key.clone()),
            ])),
            ..Default::default()
        };

        self.api()
            .create(&PostParams::default(), &secret)
            .await
            .map_err(|e| match e {
                kube::Error::Api(resp) if resp.code == 409 => KeyStoreError::Conflict(format!(
                    "SSH pair '{}' for service '{}' already exists",
                    name, service
                )),
                other => KeyStoreError::Server(other.to_string()),
            })?;

        Ok(SshPair {
            owner: owner.to_string(),
            service: service.to_string(),
            name: name.to_string(),
            public_key,
            private_key: Some(private_key),
        })
    }
}

/// Fresh ed25519 pair as (public, private) OpenSSH text
fn generate_keys() -> Result<(String, String), KeyStoreError> {
    let private = PrivateKey::random(&mut OsRng, Algorithm::Ed25519)
        .map_err(|e| KeyStoreError::Server(format!("Failed to generate SSH key: {}", e)))?;
    let public_key = private
        .public_key()
        .to_openssh()
        .map_err(|e| KeyStoreError::Server(format!("Failed to encode public key: {}", e)))?;
    let private_key = private
        .to_openssh(LineEnding::LF)
        .map_err(|e| KeyStoreError::Server(format!("Failed to encode private key: {}", e)))?;
    Ok((public_key, private_key.as_str().to_string()))
}

fn annotation<'a>(secret: &'a Secret, key: &str) -> Option<&'a str> {
    secret
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(key))
        .map(String::as_str)
}

fn secret_string(secret: &Secret, key: &str) -> Result<Option<String>, KeyStoreError> {
    let Some(bytes) = secret.data.as_ref().and_then(|d| d.get(key)) else {
        return Ok(None);
    };
    String::from_utf8(bytes.0.clone()).map(Some).map_err(|e| {
        KeyStoreError::Server(format!(
            "Invalid UTF-8 in secret '{}' key '{}': {}",
            secret.metadata.name.as_deref().unwrap_or_default(),
            key,
            e
        ))
    })
}

fn pair_from_secret(secret: &Secret, service: &str) -> Result<SshPair, KeyStoreError> {
    let secret_name = secret.metadata.name.clone().unwrap_or_default();
    let public_key = secret_string(secret, PUBLIC_KEY_KEY)?.ok_or_else(|| {
        KeyStoreError::Server(format!(
            "Secret '{}' has no '{}' key",
            secret_name, PUBLIC_KEY_KEY
        ))
    })?;

    Ok(SshPair {
        owner: annotation(secret, OWNER_ANNOTATION)
            .unwrap_or_default()
            .to_string(),
        service: service.to_string(),
        name: annotation(secret, NAME_ANNOTATION)
            .map(str::to_string)
            .unwrap_or(secret_name),
        public_key,
        private_key: secret_string(secret, PRIVATE_KEY_KEY)?,
    })
}

/// Deterministic DNS-1123 name for the secret holding a pair
///
/// Sanitizing folds distinct owner ids together, so a digest of the raw
/// owner id is always kept at the end of the name.
pub fn secret_name(owner: &str, service: &str, name: &str) -> String {
    let raw = format!("ssh-{}-{}-{}", service, name, owner);
    let mut sanitized: String = raw
        .chars()
        .map(|c| match c.to_ascii_lowercase() {
            c @ ('a'..='z' | '0'..='9' | '-' | '.') => c,
            _ => '-',
        })
        .collect();
    sanitized.truncate(MAX_NAME_LEN - OWNER_HASH_LEN - 1);
    let prefix = sanitized.trim_end_matches(|c: char| !c.is_ascii_alphanumeric());

    let digest = hex::encode(Sha256::digest(owner.as_bytes()));
    format!("{}-{}", prefix, &digest[..OWNER_HASH_LEN])
}

/// Label values are limited to 63 alphanumerics, `-`, `_` and `.`
fn label_value(value: &str) -> String {
    let mut sanitized: String = value
        .chars()
        .map(|c| match c {
            c if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' => c,
            _ => '-',
        })
        .collect();
    sanitized.truncate(63);
    sanitized
}
