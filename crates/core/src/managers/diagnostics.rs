//! Diagnostics manager: tracks whether diagnostics are enabled via the
//! `enable-diagnostics` attribute or config-file override. Diagnostic
//! log bundle upload itself is out of scope; this manager only owns the
//! enablement gate.

use crate::metadata::Descriptor;

use super::{Manager, ManagerError};

pub struct DiagnosticsManager {
    config_enabled: bool,
}

impl Default for DiagnosticsManager {
    fn default() -> Self {
        Self::new(false)
    }
}

impl DiagnosticsManager {
    pub fn new(config_enabled: bool) -> Self {
        Self { config_enabled }
    }
}

#[async_trait::async_trait]
impl Manager for DiagnosticsManager {
    fn name(&self) -> &'static str {
        "diagnostics"
    }

    fn diff(&self, old: &Descriptor, new: &Descriptor) -> bool {
        old.enable_diagnostics() != new.enable_diagnostics()
    }

    fn disabled(&self, descriptor: &Descriptor) -> bool {
        !(self.config_enabled || descriptor.enable_diagnostics().unwrap_or(false))
    }

    fn timeout(&self) -> bool {
        false
    }

    async fn set(&self, _descriptor: &Descriptor) -> Result<(), ManagerError> {
        Ok(())
    }
}
