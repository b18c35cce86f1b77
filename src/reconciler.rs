//! Async storage reconciler
//!
//! Brings a workspace namespace to the state where the async storage stack
//! exists:
//! - Workspace precondition check
//! - Per-kind existence check (claim, config map, pod, service)
//! - SSH key resolution, only when the config map is missing
//! - Creation of whatever is missing
//!
//! Existing objects are never updated. A failed create aborts the remaining
//! kinds without rolling back; the next run picks up where this one stopped.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::config::{ExistenceCheck, ProvisionerConfig};
use crate::constants::{ASYNC_STORAGE, ASYNC_STORAGE_CLAIM};
use crate::control_plane::{ControlPlane, DesiredResource, ResourceKind};
use crate::error::{Error, Result};
use crate::resources::{self, config_map_name};
use crate::ssh::{self, SshKeyStore};
use crate::validation::{self, Precondition};
use crate::workspace::ProvisioningRequest;

/// Terminal state of one resource kind after reconciliation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ResourceState {
    /// Already present; left untouched
    Exists,
    /// Created by this run
    Created,
    /// Not created because no SSH key pair was available
    Skipped,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceOutcome {
    pub kind: ResourceKind,
    pub name: String,
    pub state: ResourceState,
}

/// Summary of one provisioning attempt
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionReport {
    pub namespace: String,

    /// False when the workspace did not ask for async storage
    pub requested: bool,

    pub resources: Vec<ResourceOutcome>,

    pub started_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl ProvisionReport {
    fn start(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            requested: false,
            resources: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    fn record(&mut self, kind: ResourceKind, name: &str, state: ResourceState) {
        self.resources.push(ResourceOutcome {
            kind,
            name: name.to_string(),
            state,
        });
    }

    fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }

    pub fn state_of(&self, kind: ResourceKind) -> Option<ResourceState> {
        self.resources
            .iter()
            .find(|o| o.kind == kind)
            .map(|o| o.state)
    }

    pub fn created_count(&self) -> usize {
        self.resources
            .iter()
            .filter(|o| o.state == ResourceState::Created)
            .count()
    }
}

/// Provisions the async storage stack for workspaces
pub struct AsyncStorageProvisioner {
    config: ProvisionerConfig,
    control_plane: Arc<dyn ControlPlane>,
    key_store: Arc<dyn SshKeyStore>,
}

impl AsyncStorageProvisioner {
    pub fn new(
        config: ProvisionerConfig,
        control_plane: Arc<dyn ControlPlane>,
        key_store: Arc<dyn SshKeyStore>,
    ) -> Self {
        Self {
            config,
            control_plane,
            key_store,
        }
    }

    /// Run one provisioning attempt for `request`
    ///
    /// Warnings are appended to `request.warnings` and stay there when this
    /// returns an error.
    #[instrument(skip(self, request), fields(workspace = %request.identity.workspace_id, namespace = %request.namespace()))]
    pub async fn provision(&self, request: &mut ProvisioningRequest) -> Result<ProvisionReport> {
        let namespace = request.namespace().to_string();
        let mut report = ProvisionReport::start(&namespace);

        match validation::validate(&request.attributes, &self.config.pvc_strategy) {
            Ok(Precondition::Skip) => {
                debug!("Async storage not requested, nothing to provision");
                return Ok(report.finish());
            }
            Ok(Precondition::Proceed) => {}
            Err(rejection) => {
                request.add_warning(rejection.to_warning());
                return Err(Error::configuration(rejection.message));
            }
        }
        report.requested = true;

        info!(existence_check = ?self.config.existence_check, "Provisioning async storage");

        // claim
        let state = if self
            .exists(&namespace, ResourceKind::PersistentVolumeClaim, ASYNC_STORAGE_CLAIM)
            .await?
        {
            ResourceState::Exists
        } else {
            let claim = resources::build_claim(&self.config);
            self.create(&namespace, DesiredResource::Claim(claim)).await?
        };
        report.record(ResourceKind::PersistentVolumeClaim, ASYNC_STORAGE_CLAIM, state);

        // config map with the owner's public key
        let cm_name = config_map_name(&namespace);
        let state = if self
            .exists(&namespace, ResourceKind::ConfigMap, &cm_name)
            .await?
        {
            ResourceState::Exists
        } else {
            let owner = request.identity.owner_id.clone();
            let pairs =
                ssh::get_or_create_pairs(self.key_store.as_ref(), &owner, &mut request.warnings)
                    .await?;
            match resources::build_config_map(&namespace, ssh::canonical_pair(&pairs)) {
                Some(config_map) => {
                    self.create(&namespace, DesiredResource::ConfigMap(config_map))
                        .await?
                }
                None => {
                    debug!(name = %cm_name, "No SSH key pair available, skipping config map");
                    ResourceState::Skipped
                }
            }
        };
        report.record(ResourceKind::ConfigMap, &cm_name, state);

        // storage pod
        let state = if self
            .exists(&namespace, ResourceKind::Pod, ASYNC_STORAGE)
            .await?
        {
            ResourceState::Exists
        } else {
            let pod = resources::build_pod(&self.config, &namespace);
            self.create(&namespace, DesiredResource::Pod(pod)).await?
        };
        report.record(ResourceKind::Pod, ASYNC_STORAGE, state);

        // service
        let state = if self
            .exists(&namespace, ResourceKind::Service, ASYNC_STORAGE)
            .await?
        {
            ResourceState::Exists
        } else {
            let service = resources::build_service(&namespace);
            self.create(&namespace, DesiredResource::Service(service))
                .await?
        };
        report.record(ResourceKind::Service, ASYNC_STORAGE, state);

        let report = report.finish();
        info!(created = report.created_count(), "Async storage provisioned");
        Ok(report)
    }

    /// Whether an object of `kind` named `name` is already in the namespace
    ///
    /// With [`ExistenceCheck::Create`] nothing is listed and the create call
    /// itself detects existing objects.
    async fn exists(&self, namespace: &str, kind: ResourceKind, name: &str) -> Result<bool> {
        match self.config.existence_check {
            ExistenceCheck::Create => Ok(false),
            ExistenceCheck::List => {
                let items = self.control_plane.list(namespace, kind).await?;
                let found = items.iter().any(|meta| meta.name.as_deref() == Some(name));
                debug!(kind = %kind, name = %name, found, "Checked for existing resource");
                Ok(found)
            }
        }
    }

    /// Create `resource`; losing a creation race counts as already existing
    async fn create(&self, namespace: &str, resource: DesiredResource) -> Result<ResourceState> {
        let kind = resource.kind();
        let name = resource.name();
        match self.control_plane.create(namespace, &resource).await {
            Ok(()) => {
                info!(kind = %kind, name = %name, "Created async storage resource");
                Ok(ResourceState::Created)
            }
            Err(e) if e.is_already_exists() => {
                debug!(kind = %kind, name = %name, "Resource already exists");
                Ok(ResourceState::Exists)
            }
            Err(e) => Err(e),
        }
    }
}
