//! Get-or-create resolution of the rsync key pair

use tracing::{debug, info};

use crate::constants::{
    NOT_ABLE_TO_PROVISION_SSH_KEYS, NOT_ABLE_TO_PROVISION_SSH_KEYS_MESSAGE, SSH_KEY_NAME,
    SSH_KEY_SERVICE,
};
use crate::error::{Error, Result};
use crate::workspace::{record_warning, Warning};

use super::store::{KeyStoreError, SshKeyStore, SshPair};

/// Return the owner's existing `internal` pairs, generating one if there are none
///
/// Existing pairs are returned untouched and in store order; callers use the
/// first one. Any store failure records a warning in `warnings` and is fatal.
pub async fn get_or_create_pairs(
    store: &dyn SshKeyStore,
    owner: &str,
    warnings: &mut Vec<Warning>,
) -> Result<Vec<SshPair>> {
    let pairs = match store.get_pairs(owner, SSH_KEY_SERVICE).await {
        Ok(pairs) => pairs,
        Err(e) => {
            let cause = format!("Unable to get SSH Keys. Cause: {}", e);
            return Err(fail(warnings, cause, e));
        }
    };

    if !pairs.is_empty() {
        debug!(owner = %owner, count = pairs.len(), "Reusing existing SSH key pairs");
        return Ok(pairs);
    }

    match store.generate_pair(owner, SSH_KEY_SERVICE, SSH_KEY_NAME).await {
        Ok(pair) => {
            info!(owner = %owner, name = %pair.name, "Generated SSH key pair for async storage");
            Ok(vec![pair])
        }
        Err(e) => {
            let cause = format!(
                "Unable to generate the SSH key for async storage service. Cause: {}",
                e
            );
            Err(fail(warnings, cause, e))
        }
    }
}

/// The pair whose public key goes into the config map
pub fn canonical_pair(pairs: &[SshPair]) -> Option<&SshPair> {
    pairs.first()
}

fn fail(warnings: &mut Vec<Warning>, cause: String, source: KeyStoreError) -> Error {
    record_warning(
        warnings,
        Warning::new(
            NOT_ABLE_TO_PROVISION_SSH_KEYS,
            format!("{}. {}", NOT_ABLE_TO_PROVISION_SSH_KEYS_MESSAGE, cause),
        ),
    );
    Error::Credential(source)
}
