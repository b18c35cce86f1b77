//! Well-known names shared with the backup/restore tooling
//!
//! These strings are a persisted contract: the workspace sidecars locate the
//! storage pod, its service and the SSH config map by these exact names, so
//! only one async storage stack can exist per namespace.

/// Name of the storage pod, its service and the `app` label value
pub const ASYNC_STORAGE: &str = "async-storage";

/// Suffix appended to the namespace to form the config map name
pub const ASYNC_STORAGE_CONFIG: &str = "async-storage-config";

/// Name of the persistent volume claim holding backups
pub const ASYNC_STORAGE_CLAIM: &str = "async-storage-claim";

/// Config map key (and mounted file name) carrying the public SSH key
pub const AUTHORIZED_KEYS: &str = "authorized_keys";

/// Port exposed by the rsync-over-SSH daemon
pub const SERVICE_PORT: i32 = 2222;

/// Service port name
pub const SERVICE_PORT_NAME: &str = "rsync-port";

/// Label key used as pod label and service selector
pub const APP_LABEL: &str = "app";

/// Pod volume backed by the storage claim
pub const STORAGE_VOLUME: &str = "async-storage-data";

/// Pod volume projecting the SSH config map
pub const CONFIG_MAP_VOLUME_NAME: &str = "async-storage-configvolume";

/// Mount path of the backup volume inside the storage container
pub const ASYNC_STORAGE_DATA_PATH: &str = "/var/lib/storage/data/";

/// Mount path of the authorized keys file inside the storage container
pub const SSH_KEY_PATH: &str = "/.ssh/authorized_keys";

/// Memory limit of the storage container
pub const MEMORY_LIMIT: &str = "512Mi";

/// Memory request of the storage container
pub const MEMORY_REQUEST: &str = "256Mi";

/// Name given to a freshly generated SSH key pair
pub const SSH_KEY_NAME: &str = "rsync-via-ssh";

/// Key service under which the rsync key pair is stored
pub const SSH_KEY_SERVICE: &str = "internal";

/// Workspace attribute enabling async storage
pub const ASYNC_PERSIST_ATTRIBUTE: &str = "asyncPersist";

/// Workspace attribute controlling whether workspace volumes are persistent
pub const PERSIST_VOLUMES_ATTRIBUTE: &str = "persistVolumes";

/// The only PVC strategy async storage can run with
pub const COMMON_STRATEGY: &str = "common";

/// Warning code recorded when the workspace configuration rules out async storage
pub const INVALID_CONFIGURATION_WARNING_CODE: i32 = 4200;

/// Warning code recorded when SSH keys cannot be read or generated
pub const NOT_ABLE_TO_PROVISION_SSH_KEYS: i32 = 4200;

pub const NOT_ABLE_TO_PROVISION_SSH_KEYS_MESSAGE: &str = "Not able to provision SSH keys";

/// Field manager used for writes against the API server
pub const FIELD_MANAGER: &str = "async-storage-provisioner";
