//! SSH key pairs securing the rsync channel
//!
//! The provisioner only needs the public half of a per-owner key pair; the
//! private half is consumed by the workspace sidecar that runs the backups.

mod resolver;
mod secret_store;
mod store;

pub use resolver::*;
pub use secret_store::*;
pub use store::*;
