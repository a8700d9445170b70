//! Bridges the command-monitor's `agent.hostname.reconfigurehostname`
//! command to the core's `HostnameReconciler`, and derives the
//! hostname/fqdn/interface-address inputs it needs from the latest
//! metadata descriptor.

use std::sync::Arc;

use async_trait::async_trait;
use mds_core::hostname::HostnameReconciler;
use mds_core::metadata::{Descriptor, MetadataClient};
use mds_ipc::{Handler, HandlerOutcome};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

pub struct ReconfigureHostnameHandler {
    reconciler: Arc<HostnameReconciler>,
    metadata: Arc<MetadataClient>,
}

impl ReconfigureHostnameHandler {
    pub fn new(reconciler: Arc<HostnameReconciler>, metadata: Arc<MetadataClient>) -> Self {
        Self {
            reconciler,
            metadata,
        }
    }

    /// Runs the reconfigure operation directly (startup invocation and the
    /// metadata-long-poll trigger both call this; the IPC handler wraps it).
    pub async fn run_once(&self, descriptor: &Descriptor, token: &CancellationToken) {
        let _ = token;
        let outcome = reconfigure_from_descriptor(&self.reconciler, descriptor).await;
        tracing::info!(
            status = outcome.status as i32,
            message = outcome.status_message,
            "hostname reconfigure completed"
        );
    }
}

async fn reconfigure_from_descriptor(
    reconciler: &HostnameReconciler,
    descriptor: &Descriptor,
) -> mds_core::hostname::ReconfigureOutcome {
    let fqdn = descriptor.instance.hostname.clone();
    let hostname = fqdn.split('.').next().unwrap_or(&fqdn).to_string();
    let addrs = mds_core::netif::local_interface_addrs();
    reconciler.reconfigure(&hostname, &fqdn, &addrs).await
}

#[async_trait]
impl Handler for ReconfigureHostnameHandler {
    async fn handle(&self, _fields: &Map<String, Value>) -> Result<HandlerOutcome, String> {
        // The command carries no payload; re-derive hostname/fqdn from the
        // metadata client's own last-seen descriptor via a fresh GET so the
        // on-demand path reflects current state rather than a stale cache.
        let descriptor = self
            .metadata
            .get_key("", &[])
            .await
            .map_err(|e| e.to_string())
            .and_then(|body| serde_json::from_str::<Descriptor>(&body).map_err(|e| e.to_string()))
            .unwrap_or_default();

        let outcome = reconfigure_from_descriptor(&self.reconciler, &descriptor).await;

        let mut fields = Map::new();
        fields.insert("Hostname".to_string(), Value::String(outcome.hostname));
        fields.insert("Fqdn".to_string(), Value::String(outcome.fqdn));

        Ok(HandlerOutcome {
            status: outcome.status as i32,
            status_message: outcome.status_message,
            fields,
        })
    }
}
