//! Control-plane access used by the reconciler
//!
//! The reconciler only needs two calls per resource kind: list what exists in
//! a namespace, and create a missing object. Keeping them behind a trait lets
//! the reconciliation logic run against an in-memory cluster in tests.

use std::fmt;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, PersistentVolumeClaim, Pod, Service};
use k8s_openapi::NamespaceResourceScope;
use kube::{
    api::{ListParams, ObjectMeta, PostParams},
    Api, Client, Resource, ResourceExt,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::constants::FIELD_MANAGER;
use crate::error::{Error, Result};

/// The four kinds making up an async storage stack, in reconciliation order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ResourceKind {
    PersistentVolumeClaim,
    ConfigMap,
    Pod,
    Service,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            ResourceKind::PersistentVolumeClaim => "PersistentVolumeClaim",
            ResourceKind::ConfigMap => "ConfigMap",
            ResourceKind::Pod => "Pod",
            ResourceKind::Service => "Service",
        };
        f.write_str(kind)
    }
}

/// A fully built object ready to be created
#[derive(Clone, Debug)]
pub enum DesiredResource {
    Claim(PersistentVolumeClaim),
    ConfigMap(ConfigMap),
    Pod(Pod),
    Service(Service),
}

impl DesiredResource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            DesiredResource::Claim(_) => ResourceKind::PersistentVolumeClaim,
            DesiredResource::ConfigMap(_) => ResourceKind::ConfigMap,
            DesiredResource::Pod(_) => ResourceKind::Pod,
            DesiredResource::Service(_) => ResourceKind::Service,
        }
    }

    pub fn name(&self) -> String {
        match self {
            DesiredResource::Claim(o) => o.name_any(),
            DesiredResource::ConfigMap(o) => o.name_any(),
            DesiredResource::Pod(o) => o.name_any(),
            DesiredResource::Service(o) => o.name_any(),
        }
    }

    /// Manifest as a JSON value
    pub fn to_value(&self) -> Result<serde_json::Value> {
        let value = match self {
            DesiredResource::Claim(o) => serde_json::to_value(o)?,
            DesiredResource::ConfigMap(o) => serde_json::to_value(o)?,
            DesiredResource::Pod(o) => serde_json::to_value(o)?,
            DesiredResource::Service(o) => serde_json::to_value(o)?,
        };
        Ok(value)
    }
}

/// Namespaced list/create access to the cluster
///
/// `create` must report a name collision as [`Error::AlreadyExists`].
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Metadata of every object of `kind` in `namespace`, unfiltered
    async fn list(&self, namespace: &str, kind: ResourceKind) -> Result<Vec<ObjectMeta>>;

    /// Create `resource` in `namespace`
    async fn create(&self, namespace: &str, resource: &DesiredResource) -> Result<()>;
}

/// [`ControlPlane`] talking to the Kubernetes API server
#[derive(Clone)]
pub struct KubeControlPlane {
    client: Client,
}

impl KubeControlPlane {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn list_meta<K>(&self, namespace: &str) -> Result<Vec<ObjectMeta>>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + fmt::Debug,
        K::DynamicType: Default,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list(&ListParams::default()).await.map_err(Error::from_kube)?;
        Ok(list.items.into_iter().map(|o| o.meta().clone()).collect())
    }

    async fn create_object<K>(&self, namespace: &str, kind: ResourceKind, object: &K) -> Result<()>
    where
        K: Resource<Scope = NamespaceResourceScope>
            + Clone
            + DeserializeOwned
            + Serialize
            + fmt::Debug,
        K::DynamicType: Default,
    {
        let name = object.name_any();
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        api.create(&params, object)
            .await
            .map_err(|e| Error::from_create(e, kind, &name))?;
        debug!(kind = %kind, name = %name, namespace = %namespace, "Created resource");
        Ok(())
    }
}

#[async_trait]
impl ControlPlane for KubeControlPlane {
    async fn list(&self, namespace: &str, kind: ResourceKind) -> Result<Vec<ObjectMeta>> {
        match kind {
            ResourceKind::PersistentVolumeClaim => {
                self.list_meta::<PersistentVolumeClaim>(namespace).await
            }
            ResourceKind::ConfigMap => self.list_meta::<ConfigMap>(namespace).await,
            ResourceKind::Pod => self.list_meta::<Pod>(namespace).await,
            ResourceKind::Service => self.list_meta::<Service>(namespace).await,
        }
    }

    async fn create(&self, namespace: &str, resource: &DesiredResource) -> Result<()> {
        let kind = resource.kind();
        match resource {
            DesiredResource::Claim(o) => self.create_object(namespace, kind, o).await,
            DesiredResource::ConfigMap(o) => self.create_object(namespace, kind, o).await,
            DesiredResource::Pod(o) => self.create_object(namespace, kind, o).await,
            DesiredResource::Service(o) => self.create_object(namespace, kind, o).await,
        }
    }
}
