//! In-memory fakes of the cluster and the SSH key store

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use async_storage_provisioner::{
    config::ProvisionerConfig,
    control_plane::{ControlPlane, DesiredResource, ResourceKind},
    ssh::{KeyStoreError, SshKeyStore, SshPair},
    workspace::{ProvisioningRequest, RuntimeIdentity},
    AsyncStorageProvisioner, Error, Result,
};
use async_trait::async_trait;
use kube::api::ObjectMeta;

pub const NAMESPACE: &str = "user1-che";
pub const OWNER: &str = "user1";

// ============================================================================
// Control plane
// ============================================================================

#[derive(Default)]
struct ClusterState {
    /// Objects visible to list calls
    listed: BTreeMap<ResourceKind, Vec<String>>,
    /// Objects created concurrently after our list call
    unlisted: BTreeSet<(ResourceKind, String)>,
    /// Manifests of successful creates, in call order
    created: Vec<(ResourceKind, serde_json::Value)>,
    list_calls: usize,
    create_calls: usize,
    fail_create: Option<ResourceKind>,
    fail_list: Option<ResourceKind>,
    listed_kinds: Vec<ResourceKind>,
}

/// Namespace-agnostic fake cluster enforcing name uniqueness per kind
#[derive(Default)]
pub struct FakeControlPlane {
    state: Mutex<ClusterState>,
}

impl FakeControlPlane {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, kind: ResourceKind, name: &str) {
        let mut state = self.state.lock().unwrap();
        state.listed.entry(kind).or_default().push(name.to_string());
    }

    /// Make `name` exist without showing up in listings
    pub fn insert_unlisted(&self, kind: ResourceKind, name: &str) {
        let mut state = self.state.lock().unwrap();
        state.unlisted.insert((kind, name.to_string()));
    }

    pub fn fail_create_of(&self, kind: Option<ResourceKind>) {
        self.state.lock().unwrap().fail_create = kind;
    }

    pub fn fail_list_of(&self, kind: Option<ResourceKind>) {
        self.state.lock().unwrap().fail_list = kind;
    }

    /// Kinds passed to list calls, in call order
    pub fn listed_kinds(&self) -> Vec<ResourceKind> {
        self.state.lock().unwrap().listed_kinds.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().unwrap().list_calls
    }

    pub fn create_calls(&self) -> usize {
        self.state.lock().unwrap().create_calls
    }

    /// Successful creates as (kind, manifest)
    pub fn created(&self) -> Vec<(ResourceKind, serde_json::Value)> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn created_kinds(&self) -> Vec<ResourceKind> {
        self.created().into_iter().map(|(k, _)| k).collect()
    }

    pub fn manifest(&self, kind: ResourceKind) -> Option<serde_json::Value> {
        self.created()
            .into_iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, v)| v)
    }

    /// Every object name per kind, listed or not
    pub fn names(&self) -> BTreeMap<ResourceKind, BTreeSet<String>> {
        let state = self.state.lock().unwrap();
        let mut names: BTreeMap<ResourceKind, BTreeSet<String>> = BTreeMap::new();
        for (kind, list) in &state.listed {
            names.entry(*kind).or_default().extend(list.iter().cloned());
        }
        for (kind, name) in &state.unlisted {
            names.entry(*kind).or_default().insert(name.clone());
        }
        names
    }
}

#[async_trait]
impl ControlPlane for FakeControlPlane {
    async fn list(&self, _namespace: &str, kind: ResourceKind) -> Result<Vec<ObjectMeta>> {
        let mut state = self.state.lock().unwrap();
        state.list_calls += 1;
        state.listed_kinds.push(kind);
        if state.fail_list == Some(kind) {
            return Err(Error::Unauthorized(format!("cannot list {}", kind)));
        }
        Ok(state
            .listed
            .get(&kind)
            .map(|names| {
                names
                    .iter()
                    .map(|n| ObjectMeta {
                        name: Some(n.clone()),
                        ..Default::default()
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn create(&self, _namespace: &str, resource: &DesiredResource) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.create_calls += 1;
        let kind = resource.kind();
        let name = resource.name();

        if state.fail_create == Some(kind) {
            return Err(Error::Unauthorized(format!("cannot create {}", kind)));
        }

        let listed = state
            .listed
            .get(&kind)
            .map(|names| names.contains(&name))
            .unwrap_or(false);
        if listed || state.unlisted.contains(&(kind, name.clone())) {
            return Err(Error::AlreadyExists { kind, name });
        }

        let manifest = resource.to_value()?;
        state.listed.entry(kind).or_default().push(name);
        state.created.push((kind, manifest));
        Ok(())
    }
}

// ============================================================================
// Key store
// ============================================================================

#[derive(Default)]
struct KeyState {
    pairs: Vec<SshPair>,
    get_calls: usize,
    generate_calls: usize,
    fail_get: bool,
    fail_generate: Option<bool>,
}

#[derive(Default)]
pub struct FakeKeyStore {
    state: Mutex<KeyState>,
}

impl FakeKeyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_pairs(pairs: Vec<SshPair>) -> Arc<Self> {
        let store = Self::default();
        store.state.lock().unwrap().pairs = pairs;
        Arc::new(store)
    }

    pub fn fail_get(&self) {
        self.state.lock().unwrap().fail_get = true;
    }

    /// Fail generation with a conflict (`true`) or a server error (`false`)
    pub fn fail_generate(&self, conflict: bool) {
        self.state.lock().unwrap().fail_generate = Some(conflict);
    }

    pub fn get_calls(&self) -> usize {
        self.state.lock().unwrap().get_calls
    }

    pub fn generate_calls(&self) -> usize {
        self.state.lock().unwrap().generate_calls
    }

    pub fn pairs(&self) -> Vec<SshPair> {
        self.state.lock().unwrap().pairs.clone()
    }
}

#[async_trait]
impl SshKeyStore for FakeKeyStore {
    async fn get_pairs(
        &self,
        owner: &str,
        service: &str,
    ) -> std::result::Result<Vec<SshPair>, KeyStoreError> {
        let mut state = self.state.lock().unwrap();
        state.get_calls += 1;
        if state.fail_get {
            return Err(KeyStoreError::Server("database unavailable".to_string()));
        }
        Ok(state
            .pairs
            .iter()
            .filter(|p| p.owner == owner && p.service == service)
            .cloned()
            .collect())
    }

    async fn generate_pair(
        &self,
        owner: &str,
        service: &str,
        name: &str,
    ) -> std::result::Result<SshPair, KeyStoreError> {
        let mut state = self.state.lock().unwrap();
        state.generate_calls += 1;
        match state.fail_generate {
            Some(true) => {
                return Err(KeyStoreError::Conflict(format!(
                    "SSH pair '{}' already exists",
                    name
                )))
            }
            Some(false) => return Err(KeyStoreError::Server("disk full".to_string())),
            None => {}
        }
        let pair = pair(owner, name, &format!("ssh-ed25519 GENERATED{}", state.generate_calls));
        let pair = SshPair {
            service: service.to_string(),
            ..pair
        };
        state.pairs.push(pair.clone());
        Ok(pair)
    }
}

// ============================================================================
// Builders
// ============================================================================

pub fn pair(owner: &str, name: &str, public_key: &str) -> SshPair {
    SshPair {
        owner: owner.to_string(),
        service: "internal".to_string(),
        name: name.to_string(),
        public_key: public_key.to_string(),
        private_key: None,
    }
}

pub fn attrs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn request(attributes: BTreeMap<String, String>) -> ProvisioningRequest {
    ProvisioningRequest::new(
        RuntimeIdentity {
            workspace_id: "workspace123".to_string(),
            owner_id: OWNER.to_string(),
            infrastructure_namespace: NAMESPACE.to_string(),
        },
        attributes,
    )
}

/// asyncPersist=true on an ephemeral workspace
pub fn async_request() -> ProvisioningRequest {
    request(attrs(&[("asyncPersist", "true"), ("persistVolumes", "false")]))
}

pub fn config(strategy: &str) -> ProvisionerConfig {
    ProvisionerConfig {
        storage_image: "quay.io/eclipse/che-workspace-data-sync-storage:test".to_string(),
        pvc_quantity: "10Gi".to_string(),
        pvc_access_mode: "ReadWriteOnce".to_string(),
        pvc_strategy: strategy.to_string(),
        ..Default::default()
    }
}

pub fn provisioner(
    config: ProvisionerConfig,
    cluster: &Arc<FakeControlPlane>,
    keys: &Arc<FakeKeyStore>,
) -> AsyncStorageProvisioner {
    AsyncStorageProvisioner::new(config, cluster.clone(), keys.clone())
}
