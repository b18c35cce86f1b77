//! Async storage manifest generator
//!
//! Prints the manifests the provisioner would create in a namespace, without
//! contacting the cluster.
//!
//! Usage: cargo run --bin manifestgen -- <namespace> [public-key-file] > async-storage.yaml

use async_storage_provisioner::{
    config::ProvisionerConfig,
    constants::{SSH_KEY_NAME, SSH_KEY_SERVICE},
    resources::{render_manifests, DesiredResourceSet},
    ssh::SshPair,
};

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let namespace = args
        .next()
        .ok_or_else(|| anyhow::anyhow!("Usage: manifestgen <namespace> [public-key-file]"))?;

    let pair = match args.next() {
        Some(path) => Some(SshPair {
            owner: String::new(),
            service: SSH_KEY_SERVICE.to_string(),
            name: SSH_KEY_NAME.to_string(),
            public_key: std::fs::read_to_string(path)?.trim_end().to_string(),
            private_key: None,
        }),
        None => None,
    };

    let config = ProvisionerConfig::load()?;
    let set = DesiredResourceSet::build(&config, &namespace, pair.as_ref());
    print!("{}", render_manifests(set)?);
    Ok(())
}
