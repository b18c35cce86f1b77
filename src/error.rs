//! Error types for the async storage provisioner

use thiserror::Error;

use crate::control_plane::ResourceKind;
use crate::ssh::KeyStoreError;

/// Result type alias using the provisioner's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Provisioner error types
#[derive(Error, Debug)]
pub enum Error {
    /// Workspace configuration rules out async storage
    #[error("{0}")]
    Configuration(String),

    /// SSH key pair could not be read or generated
    #[error("Unable to provision SSH keys: {0}")]
    Credential(#[source] KeyStoreError),

    /// A resource with the same name already exists
    #[error("{kind} '{name}' already exists")]
    AlreadyExists { kind: ResourceKind, name: String },

    /// The control plane rejected our credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Provisioner configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a workspace configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    /// Create a provisioner configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Classify a failed create call against the API server
    pub fn from_create(err: kube::Error, kind: ResourceKind, name: &str) -> Self {
        match err {
            kube::Error::Api(resp) if resp.code == 409 => Error::AlreadyExists {
                kind,
                name: name.to_string(),
            },
            other => Error::from_kube(other),
        }
    }

    /// Classify any other failed API call
    pub fn from_kube(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(resp) if resp.code == 401 || resp.code == 403 => {
                Error::Unauthorized(resp.message)
            }
            other => Error::Kube(other),
        }
    }

    /// Whether this error reports a uniqueness conflict on create
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Error::AlreadyExists { .. })
    }
}

#[cfg(test)]
mod tests {
    use kube::core::ErrorResponse;

    use super::*;

    fn api_error(code: u16, reason: &str) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: format!("{} failure", reason),
            reason: reason.to_string(),
            code,
        })
    }

    #[test]
    fn conflict_on_create_is_already_exists() {
        let err = Error::from_create(api_error(409, "AlreadyExists"), ResourceKind::Pod, "async-storage");
        assert!(err.is_already_exists());
        assert_eq!(err.to_string(), "Pod 'async-storage' already exists");
    }

    #[test]
    fn forbidden_is_unauthorized() {
        let err = Error::from_create(api_error(403, "Forbidden"), ResourceKind::Service, "async-storage");
        assert!(matches!(err, Error::Unauthorized(_)));
        assert!(!err.is_already_exists());
    }

    #[test]
    fn other_api_errors_pass_through() {
        let err = Error::from_kube(api_error(500, "InternalError"));
        assert!(matches!(err, Error::Kube(_)));
    }
}
