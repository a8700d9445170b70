//! The metadata data model: `Descriptor` and the typed attribute subset
//! recognized by the core. The free-form attribute bag is modeled as a
//! typed record, ignoring unknown keys rather than failing on them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single secondary-IP-bearing network interface, as reported by metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct NetworkInterface {
    pub mac: String,
    #[serde(default, rename = "forwardedIps")]
    pub forwarded_ips: Vec<String>,
    #[serde(default, rename = "targetInstanceIps")]
    pub target_instance_ips: Vec<String>,
}

/// Typed projection of the recognized attribute keys. Unknown keys are
/// preserved in `extra` and never cause a parse failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct InstanceAttributes {
    #[serde(default, rename = "enable-wsfc")]
    pub enable_wsfc: Option<bool>,
    #[serde(default, rename = "wsfc-addrs")]
    pub wsfc_addrs: Option<String>,
    #[serde(default, rename = "wsfc-agent-port")]
    pub wsfc_agent_port: Option<String>,
    #[serde(default, rename = "disable-account-manager")]
    pub disable_account_manager: Option<bool>,
    #[serde(default, rename = "disable-address-manager")]
    pub disable_address_manager: Option<bool>,
    #[serde(default, rename = "enable-diagnostics")]
    pub enable_diagnostics: Option<bool>,
    #[serde(default, rename = "enable-https-mds-setup")]
    pub enable_https_mds_setup: Option<bool>,
    #[serde(default, rename = "ssh-keys")]
    pub ssh_keys: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Instance {
    #[serde(default)]
    pub attributes: InstanceAttributes,
    #[serde(default, rename = "networkInterfaces")]
    pub network_interfaces: Vec<NetworkInterface>,
    #[serde(default)]
    pub hostname: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Project {
    #[serde(default)]
    pub attributes: InstanceAttributes,
}

/// The snapshot of authoritative state pulled from the metadata endpoint.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Descriptor {
    #[serde(default)]
    pub instance: Instance,
    #[serde(default)]
    pub project: Project,
}

impl Descriptor {
    /// Instance attribute, falling back to the project attribute.
    pub fn enable_wsfc(&self) -> Option<bool> {
        self.instance
            .attributes
            .enable_wsfc
            .or(self.project.attributes.enable_wsfc)
    }

    pub fn wsfc_addrs(&self) -> Option<&str> {
        self.instance
            .attributes
            .wsfc_addrs
            .as_deref()
            .or(self.project.attributes.wsfc_addrs.as_deref())
    }

    pub fn disable_account_manager(&self) -> Option<bool> {
        self.instance
            .attributes
            .disable_account_manager
            .or(self.project.attributes.disable_account_manager)
    }

    pub fn disable_address_manager(&self) -> Option<bool> {
        self.instance
            .attributes
            .disable_address_manager
            .or(self.project.attributes.disable_address_manager)
    }

    pub fn enable_diagnostics(&self) -> Option<bool> {
        self.instance
            .attributes
            .enable_diagnostics
            .or(self.project.attributes.enable_diagnostics)
    }

    /// Three-tier override for credential-bootstrap enablement: instance
    /// attribute, then project attribute. The config-file tier is applied by
    /// the caller (`credential_job::should_enable`), which is the only place
    /// that also sees `Config`.
    pub fn enable_https_mds_setup(&self) -> Option<bool> {
        self.instance
            .attributes
            .enable_https_mds_setup
            .or(self.project.attributes.enable_https_mds_setup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_attribute_keys_are_ignored_not_fatal() {
        let json = serde_json::json!({
            "instance": {
                "attributes": {"enable-wsfc": true, "some-future-key": {"nested": 1}},
                "networkInterfaces": [],
                "hostname": "vm1.example.internal"
            },
            "project": {"attributes": {}}
        });
        let descriptor: Descriptor = serde_json::from_value(json).unwrap();
        assert_eq!(descriptor.enable_wsfc(), Some(true));
        assert!(descriptor
            .instance
            .attributes
            .extra
            .contains_key("some-future-key"));
    }

    #[test]
    fn project_attribute_is_fallback_for_instance() {
        let json = serde_json::json!({
            "instance": {"attributes": {}},
            "project": {"attributes": {"disable-address-manager": true}}
        });
        let descriptor: Descriptor = serde_json::from_value(json).unwrap();
        assert_eq!(descriptor.disable_address_manager(), Some(true));
    }
}
