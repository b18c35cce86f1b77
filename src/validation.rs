//! Workspace preconditions for async storage
//!
//! Decides whether provisioning applies to a workspace at all, and whether
//! its configuration allows it. Pure: no I/O, no warnings recorded here.

use std::collections::BTreeMap;

use crate::constants::{COMMON_STRATEGY, INVALID_CONFIGURATION_WARNING_CODE};
use crate::workspace::{is_async_persist, is_ephemeral, Warning};

/// Outcome of a successful precondition check
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Precondition {
    /// Async storage not requested; provisioning is a no-op
    Skip,
    /// Async storage requested and allowed
    Proceed,
}

/// Reason the workspace configuration rules out async storage
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rejection {
    pub code: i32,
    pub message: String,
}

impl Rejection {
    fn invalid(message: String) -> Self {
        Self {
            code: INVALID_CONFIGURATION_WARNING_CODE,
            message,
        }
    }

    /// The warning the caller must record before failing
    pub fn to_warning(&self) -> Warning {
        Warning::new(self.code, self.message.clone())
    }
}

/// Check workspace attributes against the configured PVC strategy
pub fn validate(
    attributes: &BTreeMap<String, String>,
    strategy: &str,
) -> std::result::Result<Precondition, Rejection> {
    if !is_async_persist(attributes) {
        return Ok(Precondition::Skip);
    }

    if strategy != COMMON_STRATEGY {
        return Err(Rejection::invalid(format!(
            "Workspace configuration not valid: Asynchronous storage available only for 'common' PVC strategy, but got {}",
            strategy
        )));
    }

    if !is_ephemeral(attributes) {
        return Err(Rejection::invalid(
            "Workspace configuration not valid: Asynchronous storage available only if attribute 'persistVolumes' set to false"
                .to_string(),
        ));
    }

    Ok(Precondition::Proceed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn strategy_is_checked_before_ephemeral() {
        // both violated: the strategy message wins
        let result = validate(&attrs(&[("asyncPersist", "true")]), "per-workspace");
        let rejection = result.unwrap_err();
        assert!(rejection.message.contains("but got per-workspace"));
    }

    #[test]
    fn rejection_becomes_warning_with_same_text() {
        let rejection = validate(&attrs(&[("asyncPersist", "true")]), "common").unwrap_err();
        let warning = rejection.to_warning();
        assert_eq!(warning.code, 4200);
        assert_eq!(warning.message, rejection.message);
        assert!(warning.message.contains("'persistVolumes' set to false"));
    }
}
