//! Async storage provisioner
//!
//! Provisions the backup/restore sidecar stack (claim, SSH config map, storage
//! pod and service) that lets ephemeral workspaces sync their projects to
//! persistent storage over rsync and SSH.

pub mod config;
pub mod constants;
pub mod control_plane;
pub mod error;
pub mod reconciler;
pub mod resources;
pub mod ssh;
pub mod validation;
pub mod workspace;

pub use error::{Error, Result};
pub use reconciler::{AsyncStorageProvisioner, ProvisionReport, ResourceState};
