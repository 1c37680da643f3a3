//! tunebench-inventory: cached topology discovery
//!
//! Lazily fetches and memoizes facts about the container orchestrator
//! (nodes, pods, networks) and the virtualization layer (hosts, switches,
//! VMs, PCI devices).

pub mod cluster;
pub mod error;
pub mod govc;
pub mod index;
pub mod kubectl;
pub mod parse;
pub mod source;
pub mod types;
pub mod virt;

pub use cluster::{ClusterInventory, NodeMap, PodMap};
pub use error::InventoryError;
pub use govc::{GovcSource, VirtSession};
pub use index::{Lookup, MultiKeyIndex};
pub use kubectl::KubectlSource;
pub use source::{ClusterSource, VirtSource};
pub use types::{
    ClusterConfig, HostHardware, HostRecord, ManagedRef, NodeRecord, PciDevice, PciDeviceInfo,
    PhysicalNic, PodRecord, PodScope, StructuredQuery, SwitchRecord, VmSearchResult, VmSummary,
};
pub use virt::VirtInventory;
