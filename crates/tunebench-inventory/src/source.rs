//! Query source traits for the two inventory backends

use async_trait::async_trait;
use serde_json::Value;

use crate::error::InventoryError;
use crate::types::{
    HostHardware, HostRecord, ManagedRef, PodScope, StructuredQuery, SwitchRecord, VmSummary,
};

/// Read-only queries against the container orchestrator.
///
/// Text queries return the raw line-oriented listing; parsing and caching
/// belong to `ClusterInventory`.
#[async_trait]
pub trait ClusterSource: Send + Sync {
    /// One line per node: name followed by internal IP
    async fn list_nodes(&self) -> Result<String, InventoryError>;

    /// One line per pod: name, namespace, node
    async fn list_pods(&self, scope: &PodScope) -> Result<String, InventoryError>;

    /// One line per network attachment definition
    async fn list_network_attachments(&self) -> Result<String, InventoryError>;

    /// Fetch a structured document
    async fn get_structured(&self, query: &StructuredQuery) -> Result<Value, InventoryError>;
}

/// Read-only queries against the virtualization manager.
///
/// Implementations hold a session keyed by endpoint and credentials.
#[async_trait]
pub trait VirtSource: Send + Sync {
    /// VMs whose name contains `substring`
    async fn find_vms(&self, substring: &str) -> Result<Vec<VmSummary>, InventoryError>;

    /// Handle of the VM named exactly `name`
    async fn find_vm(&self, name: &str) -> Result<Option<ManagedRef>, InventoryError>;

    /// Full host inventory scan
    async fn list_hosts(&self) -> Result<Vec<HostRecord>, InventoryError>;

    /// Every distributed virtual switch
    async fn list_switches(&self) -> Result<Vec<SwitchRecord>, InventoryError>;

    /// The switch with `uuid`, if any
    async fn get_switch(&self, uuid: &str) -> Result<Option<SwitchRecord>, InventoryError> {
        Ok(self
            .list_switches()
            .await?
            .into_iter()
            .find(|s| s.uuid == uuid))
    }

    /// Hardware inventory (PCI devices, physical NICs) of one host
    async fn host_hardware(&self, host: &HostRecord) -> Result<HostHardware, InventoryError>;
}
