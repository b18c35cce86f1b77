//! Workspace runtime model consumed by the provisioner

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::{ASYNC_PERSIST_ATTRIBUTE, PERSIST_VOLUMES_ATTRIBUTE};

/// Identity of the workspace runtime being started
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeIdentity {
    /// Workspace id
    pub workspace_id: String,

    /// User owning the workspace; SSH keys are scoped to this owner
    pub owner_id: String,

    /// Namespace the workspace runs in
    pub infrastructure_namespace: String,
}

/// Non-fatal problem reported back to the workspace owner
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Warning {
    pub code: i32,
    pub message: String,
}

impl Warning {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Input of a single provisioning attempt
///
/// Identity and attributes are read-only; `warnings` is the append-only sink
/// the caller reports from, and it keeps everything recorded before a failure.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningRequest {
    pub identity: RuntimeIdentity,

    /// Workspace configuration attributes
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,

    /// Warnings accumulated while provisioning
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
}

impl ProvisioningRequest {
    pub fn new(identity: RuntimeIdentity, attributes: BTreeMap<String, String>) -> Self {
        Self {
            identity,
            attributes,
            warnings: Vec::new(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.identity.infrastructure_namespace
    }

    /// Record a warning and log it
    pub fn add_warning(&mut self, warning: Warning) {
        record_warning(&mut self.warnings, warning);
    }
}

/// Append a warning to a sink, logging it first
pub fn record_warning(sink: &mut Vec<Warning>, warning: Warning) {
    warn!(code = warning.code, "{}", warning.message);
    sink.push(warning);
}

/// Async storage is requested only by an exact `"true"` value
pub fn is_async_persist(attributes: &BTreeMap<String, String>) -> bool {
    attributes.get(ASYNC_PERSIST_ATTRIBUTE).map(String::as_str) == Some("true")
}

/// A workspace is ephemeral only when `persistVolumes` is explicitly `"false"`
pub fn is_ephemeral(attributes: &BTreeMap<String, String>) -> bool {
    attributes.get(PERSIST_VOLUMES_ATTRIBUTE).map(String::as_str) == Some("false")
}
