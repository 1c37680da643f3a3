//! Inventory record types

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Cluster (orchestrator) records
// ============================================================================

/// Cluster node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Node name
    pub name: String,
    /// Internal IP address
    pub ip: String,
}

/// Pod placement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodRecord {
    /// Pod name
    pub name: String,
    /// Node the pod is scheduled on
    pub node: String,
    /// Namespace
    pub namespace: String,
}

/// Namespace scope of a pod listing
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PodScope {
    /// Every namespace (`-A`)
    AllNamespaces,
    /// A single namespace
    Namespace(String),
}

impl PodScope {
    /// Scope for a single namespace
    pub fn namespace(ns: impl Into<String>) -> Self {
        PodScope::Namespace(ns.into())
    }
}

impl fmt::Display for PodScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PodScope::AllNamespaces => write!(f, "all-namespaces"),
            PodScope::Namespace(ns) => write!(f, "namespace/{ns}"),
        }
    }
}

/// Structured (JSON) document queries against the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StructuredQuery {
    /// Full spec of one node
    Node(String),
    /// Full spec of one pod
    Pod {
        /// Namespace
        namespace: String,
        /// Pod name
        name: String,
    },
    /// Client configuration (clusters, users, current-context)
    ClientConfig,
}

/// Orchestrator client configuration document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Raw document
    pub document: Value,
    /// When the document was fetched
    pub fetched_at: DateTime<Utc>,
}

impl ClusterConfig {
    /// Wrap a freshly fetched document
    #[must_use]
    pub fn new(document: Value) -> Self {
        Self {
            document,
            fetched_at: Utc::now(),
        }
    }

    /// Name of the first configured cluster
    #[must_use]
    pub fn cluster_name(&self) -> Option<String> {
        first_name(&self.document, "clusters")
    }

    /// Name of the first configured user
    #[must_use]
    pub fn username(&self) -> Option<String> {
        first_name(&self.document, "users")
    }

    /// Current context
    #[must_use]
    pub fn context(&self) -> Option<String> {
        self.document
            .get("current-context")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

fn first_name(document: &Value, list: &str) -> Option<String> {
    document
        .get(list)?
        .as_array()?
        .first()?
        .get("name")?
        .as_str()
        .map(str::to_string)
}

// ============================================================================
// Virtualization records
// ============================================================================

/// Opaque handle to a managed object (e.g. `HostSystem:host-12`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManagedRef {
    /// Object type
    #[serde(rename = "type")]
    pub kind: String,
    /// Managed-object-id
    pub value: String,
}

impl ManagedRef {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for ManagedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}

/// Hypervisor host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRecord {
    /// Management IP
    pub ip: String,
    /// Inventory name
    pub name: String,
    /// Hardware UUID
    pub uuid: String,
    /// Managed-object-id
    pub moid: String,
    /// Handle for follow-up queries
    pub handle: ManagedRef,
}

/// Distributed virtual switch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchRecord {
    /// Switch UUID
    pub uuid: String,
    /// Inventory name
    pub name: String,
    /// Handle for follow-up queries
    pub handle: ManagedRef,
    /// Port groups attached to the switch
    pub port_groups: Vec<ManagedRef>,
}

/// VM returned by a backend search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmSummary {
    pub name: String,
    pub handle: ManagedRef,
    /// Raw VM configuration document
    pub config: Value,
}

/// Result of a VM substring search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmSearchResult {
    /// Names of matching VMs
    pub matched_names: Vec<String>,
    /// Configuration documents, index-aligned with `matched_names`
    pub matched_configs: Vec<Value>,
}

impl VmSearchResult {
    #[must_use]
    pub fn from_summaries(vms: Vec<VmSummary>) -> Self {
        let (matched_names, matched_configs) =
            vms.into_iter().map(|vm| (vm.name, vm.config)).unzip();
        Self {
            matched_names,
            matched_configs,
        }
    }
}

/// PCI device from a host hardware inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PciDevice {
    /// PCI address (e.g. `0000:3b:00.0`)
    pub id: String,
    pub vendor_name: String,
    pub device_name: String,
}

/// Physical NIC from a host network configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalNic {
    /// Device name (e.g. `vmnic4`)
    pub device: String,
    /// PCI address
    pub pci: String,
    pub mac: String,
    #[serde(default)]
    pub driver: Option<String>,
}

/// Hardware inventory of one host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostHardware {
    pub pci_devices: Vec<PciDevice>,
    pub physical_nics: Vec<PhysicalNic>,
}

/// PCI device joined with the physical NIC bound to it
///
/// SR-IOV virtual functions have no physical NIC, so the NIC fields are
/// optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PciDeviceInfo {
    pub pci_id: String,
    pub device_name: String,
    pub vendor_name: String,
    pub mac: Option<String>,
    pub physical_nic_name: Option<String>,
    pub driver: Option<String>,
}

impl PciDeviceInfo {
    /// Derive the info for `pci_id` from a hardware inventory
    #[must_use]
    pub fn from_hardware(hardware: &HostHardware, pci_id: &str) -> Option<Self> {
        let device = hardware.pci_devices.iter().find(|d| d.id == pci_id)?;
        let nic = hardware.physical_nics.iter().find(|n| n.pci == pci_id);

        Some(Self {
            pci_id: device.id.clone(),
            device_name: device.device_name.clone(),
            vendor_name: device.vendor_name.clone(),
            mac: nic.map(|n| n.mac.clone()),
            physical_nic_name: nic.map(|n| n.device.clone()),
            driver: nic.and_then(|n| n.driver.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cluster_config_accessors() {
        let config = ClusterConfig::new(json!({
            "clusters": [{"name": "perf-lab", "cluster": {"server": "https://api:6443"}}],
            "users": [{"name": "kube:admin"}],
            "current-context": "default/perf-lab/kube:admin"
        }));

        assert_eq!(config.cluster_name().as_deref(), Some("perf-lab"));
        assert_eq!(config.username().as_deref(), Some("kube:admin"));
        assert_eq!(
            config.context().as_deref(),
            Some("default/perf-lab/kube:admin")
        );
    }

    #[test]
    fn test_cluster_config_missing_substructure_is_none() {
        let config = ClusterConfig::new(json!({"clusters": [], "current-context": ""}));

        assert_eq!(config.cluster_name(), None);
        assert_eq!(config.username(), None);
        assert_eq!(config.context(), None);
    }

    #[test]
    fn test_pci_info_joins_physical_nic() {
        let hardware = HostHardware {
            pci_devices: vec![
                PciDevice {
                    id: "0000:3b:00.0".to_string(),
                    vendor_name: "Intel Corporation".to_string(),
                    device_name: "Ethernet Controller E810-C".to_string(),
                },
                PciDevice {
                    id: "0000:3b:01.0".to_string(),
                    vendor_name: "Intel Corporation".to_string(),
                    device_name: "Ethernet Adaptive Virtual Function".to_string(),
                },
            ],
            physical_nics: vec![PhysicalNic {
                device: "vmnic4".to_string(),
                pci: "0000:3b:00.0".to_string(),
                mac: "b4:96:91:aa:bb:cc".to_string(),
                driver: Some("icen".to_string()),
            }],
        };

        let pf = PciDeviceInfo::from_hardware(&hardware, "0000:3b:00.0").unwrap();
        assert_eq!(pf.physical_nic_name.as_deref(), Some("vmnic4"));
        assert_eq!(pf.driver.as_deref(), Some("icen"));

        let vf = PciDeviceInfo::from_hardware(&hardware, "0000:3b:01.0").unwrap();
        assert_eq!(vf.mac, None);

        assert!(PciDeviceInfo::from_hardware(&hardware, "0000:af:00.0").is_none());
    }
}
