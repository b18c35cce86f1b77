//! Async storage provisioner
//!
//! Runs one provisioning attempt for the workspace described by a
//! `ProvisioningRequest` YAML file and prints the resulting report as JSON.
//!
//! Usage: async-storage-provisioner <request.yaml>

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use kube::Client;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use async_storage_provisioner::{
    config::ProvisionerConfig,
    control_plane::KubeControlPlane,
    ssh::SecretSshKeyStore,
    workspace::ProvisioningRequest,
    AsyncStorageProvisioner,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    let request_path: PathBuf = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .context("Usage: async-storage-provisioner <request.yaml>")?;

    let config = ProvisionerConfig::load()?;
    let content = std::fs::read_to_string(&request_path)
        .with_context(|| format!("Failed to read request {}", request_path.display()))?;
    let mut request: ProvisioningRequest = serde_yaml::from_str(&content)
        .with_context(|| format!("Invalid request {}", request_path.display()))?;

    info!(
        workspace = %request.identity.workspace_id,
        namespace = %request.namespace(),
        "Starting async storage provisioner"
    );

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes API server");

    let provisioner = AsyncStorageProvisioner::new(
        config.clone(),
        Arc::new(KubeControlPlane::new(client.clone())),
        Arc::new(SecretSshKeyStore::new(client, config.ssh_keys_namespace.clone())),
    );

    // Dropping the provisioning future on a signal can leave a partial stack;
    // every step is create-if-absent, so the next run completes it.
    let result = tokio::select! {
        result = provisioner.provision(&mut request) => Some(result),
        _ = shutdown_signal() => None,
    };

    for warning in &request.warnings {
        warn!(code = warning.code, message = %warning.message, "Workspace warning");
    }

    match result {
        Some(Ok(report)) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Some(Err(e)) => {
            error!(error = %e, "Provisioning failed");
            Err(e.into())
        }
        None => {
            info!("Received shutdown signal, provisioning interrupted");
            anyhow::bail!("Provisioning interrupted")
        }
    }
}

/// Initialize tracing subscriber
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,kube=warn,hyper=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received CTRL+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
