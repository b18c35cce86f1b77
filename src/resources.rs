//! Desired state of the async storage stack
//!
//! Pure builders: every object is derived from the configuration, the
//! namespace and the owner's public key. Objects refer to each other by name
//! only, so none of them depends on what currently exists in the cluster.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, Container, ContainerPort, PersistentVolumeClaim,
    PersistentVolumeClaimSpec, PersistentVolumeClaimVolumeSource, Pod, PodSpec,
    ResourceRequirements, Service, ServicePort, ServiceSpec, Volume, VolumeMount,
    VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::ObjectMeta;

use crate::config::ProvisionerConfig;
use crate::constants::{
    APP_LABEL, ASYNC_STORAGE, ASYNC_STORAGE_CLAIM, ASYNC_STORAGE_CONFIG, ASYNC_STORAGE_DATA_PATH,
    AUTHORIZED_KEYS, CONFIG_MAP_VOLUME_NAME, MEMORY_LIMIT, MEMORY_REQUEST, SERVICE_PORT,
    SERVICE_PORT_NAME, SSH_KEY_PATH, STORAGE_VOLUME,
};
use crate::control_plane::DesiredResource;
use crate::error::Result;
use crate::ssh::SshPair;

/// Config map name for a namespace: the namespace with a fixed suffix
pub fn config_map_name(namespace: &str) -> String {
    format!("{}{}", namespace, ASYNC_STORAGE_CONFIG)
}

/// Label shared by the storage pod and the service selector
pub fn app_labels() -> BTreeMap<String, String> {
    BTreeMap::from([(APP_LABEL.to_string(), ASYNC_STORAGE.to_string())])
}

/// Claim holding the backups
pub fn build_claim(config: &ProvisionerConfig) -> PersistentVolumeClaim {
    new_pvc(ASYNC_STORAGE_CLAIM, &config.pvc_access_mode, &config.pvc_quantity)
}

/// Generic claim with a single access mode and a storage request
pub fn new_pvc(name: &str, access_mode: &str, quantity: &str) -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec![access_mode.to_string()]),
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(
                    "storage".to_string(),
                    Quantity(quantity.to_string()),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Config map publishing the owner's public key as `authorized_keys`
///
/// Returns `None` when no key pair is available; the caller skips the config
/// map in that case.
pub fn build_config_map(namespace: &str, pair: Option<&SshPair>) -> Option<ConfigMap> {
    let pair = pair?;
    Some(ConfigMap {
        metadata: ObjectMeta {
            name: Some(config_map_name(namespace)),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        data: Some(BTreeMap::from([(
            AUTHORIZED_KEYS.to_string(),
            pair.public_key.clone(),
        )])),
        ..Default::default()
    })
}

/// Storage pod running the rsync-over-SSH daemon
pub fn build_pod(config: &ProvisionerConfig, namespace: &str) -> Pod {
    let storage_volume = Volume {
        name: STORAGE_VOLUME.to_string(),
        persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
            claim_name: ASYNC_STORAGE_CLAIM.to_string(),
            read_only: Some(false),
        }),
        ..Default::default()
    };

    let ssh_key_volume = Volume {
        name: CONFIG_MAP_VOLUME_NAME.to_string(),
        config_map: Some(ConfigMapVolumeSource {
            name: config_map_name(namespace),
            ..Default::default()
        }),
        ..Default::default()
    };

    let storage_mount = VolumeMount {
        name: STORAGE_VOLUME.to_string(),
        mount_path: ASYNC_STORAGE_DATA_PATH.to_string(),
        read_only: Some(false),
        ..Default::default()
    };

    let ssh_key_mount = VolumeMount {
        name: CONFIG_MAP_VOLUME_NAME.to_string(),
        mount_path: SSH_KEY_PATH.to_string(),
        sub_path: Some(AUTHORIZED_KEYS.to_string()),
        read_only: Some(true),
        ..Default::default()
    };

    let container = Container {
        name: ASYNC_STORAGE.to_string(),
        image: Some(config.storage_image.clone()),
        resources: Some(ResourceRequirements {
            limits: Some(memory(MEMORY_LIMIT)),
            requests: Some(memory(MEMORY_REQUEST)),
            ..Default::default()
        }),
        ports: Some(vec![ContainerPort {
            container_port: SERVICE_PORT,
            protocol: Some("TCP".to_string()),
            ..Default::default()
        }]),
        volume_mounts: Some(vec![storage_mount, ssh_key_mount]),
        ..Default::default()
    };

    Pod {
        metadata: ObjectMeta {
            name: Some(ASYNC_STORAGE.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(app_labels()),
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers: vec![container],
            volumes: Some(vec![storage_volume, ssh_key_volume]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Service exposing the storage pod's SSH port
pub fn build_service(namespace: &str) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(ASYNC_STORAGE.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            ports: Some(vec![ServicePort {
                name: Some(SERVICE_PORT_NAME.to_string()),
                protocol: Some("TCP".to_string()),
                port: SERVICE_PORT,
                target_port: Some(IntOrString::Int(SERVICE_PORT)),
                ..Default::default()
            }]),
            selector: Some(app_labels()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn memory(quantity: &str) -> BTreeMap<String, Quantity> {
    BTreeMap::from([("memory".to_string(), Quantity(quantity.to_string()))])
}

/// The complete desired stack for a namespace
#[derive(Clone, Debug)]
pub struct DesiredResourceSet {
    pub claim: PersistentVolumeClaim,
    pub config_map: Option<ConfigMap>,
    pub pod: Pod,
    pub service: Service,
}

impl DesiredResourceSet {
    pub fn build(config: &ProvisionerConfig, namespace: &str, pair: Option<&SshPair>) -> Self {
        Self {
            claim: build_claim(config),
            config_map: build_config_map(namespace, pair),
            pod: build_pod(config, namespace),
            service: build_service(namespace),
        }
    }

    /// Objects in reconciliation order, skipping an absent config map
    pub fn into_resources(self) -> Vec<DesiredResource> {
        let mut resources = vec![DesiredResource::Claim(self.claim)];
        if let Some(config_map) = self.config_map {
            resources.push(DesiredResource::ConfigMap(config_map));
        }
        resources.push(DesiredResource::Pod(self.pod));
        resources.push(DesiredResource::Service(self.service));
        resources
    }
}

/// Render the desired stack as a multi-document YAML stream
pub fn render_manifests(set: DesiredResourceSet) -> Result<String> {
    let mut out = String::new();
    for resource in set.into_resources() {
        out.push_str("---\n");
        out.push_str(&serde_yaml::to_string(&resource.to_value()?)?);
    }
    Ok(out)
}
