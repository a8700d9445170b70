//! Managers: translate a metadata diff into local actions. Each
//! manager is a capability set `{diff, disabled, timeout, set}` drawn from
//! a closed set of variants rather than a dynamic-dispatch interface.

mod account;
mod address;
mod diagnostics;
mod wsfc;

pub use account::AccountManager;
pub use address::{compare_ips, AddressManager};
pub use diagnostics::DiagnosticsManager;
pub use wsfc::{filter_forwarded_ips, WsfcManager};

use thiserror::Error;

use crate::metadata::Descriptor;

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("account manager error: {0}")]
    Account(String),
    #[error("address manager error: {0}")]
    Address(String),
    #[error("diagnostics manager error: {0}")]
    Diagnostics(String),
    #[error("wsfc manager error: {0}")]
    Wsfc(String),
}

/// `{ diff() bool, disabled() bool, timeout() bool, set() -> Result }`.
/// Invoked by the reconciliation loop iff
/// `!disabled() && (timeout() || diff())`.
#[async_trait::async_trait]
pub trait Manager: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether `new` differs from `old` in a way this manager cares about.
    fn diff(&self, old: &Descriptor, new: &Descriptor) -> bool;

    /// Config/metadata-level opt-out, independent of `diff`.
    fn disabled(&self, descriptor: &Descriptor) -> bool;

    /// Manager-local opt-in for periodic re-application even without a
    /// metadata diff (used by the address manager on a ~70s tick).
    fn timeout(&self) -> bool;

    async fn set(&self, descriptor: &Descriptor) -> Result<(), ManagerError>;
}

/// One reconciliation-loop pass over a homogeneous sequence of managers:
/// skip disabled, skip managers with nothing to do, run the rest
/// concurrently, and never let one manager's failure affect another —
/// a failure is logged and the loop advances to the next element.
pub async fn run_all(
    managers: &[std::sync::Arc<dyn Manager>],
    old: &Descriptor,
    new: &Descriptor,
) {
    let mut tasks = Vec::with_capacity(managers.len());
    for manager in managers {
        if manager.disabled(new) {
            continue;
        }
        if !manager.timeout() && !manager.diff(old, new) {
            continue;
        }
        let manager = manager.clone();
        let new = new.clone();
        tasks.push(tokio::spawn(async move {
            let name = manager.name();
            if let Err(error) = manager.set(&new).await {
                tracing::warn!(manager = name, %error, "manager set failed");
            }
        }));
    }
    for task in tasks {
        let _ = task.await;
    }
}
