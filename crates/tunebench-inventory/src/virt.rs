//! Virtualization inventory cache
//!
//! Hosts and switches live in multi-key indices so a hit by any identifier
//! avoids a backend scan. VM searches, VM handles and PCI device lookups
//! are separate maps with their own invalidation.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::error::InventoryError;
use crate::index::{Lookup, MultiKeyIndex};
use crate::source::VirtSource;
use crate::types::{HostRecord, ManagedRef, PciDeviceInfo, SwitchRecord, VmSearchResult};

fn host_ip(h: &HostRecord) -> &str {
    &h.ip
}

fn host_name(h: &HostRecord) -> &str {
    &h.name
}

fn host_uuid(h: &HostRecord) -> &str {
    &h.uuid
}

fn host_moid(h: &HostRecord) -> &str {
    &h.moid
}

fn switch_uuid(s: &SwitchRecord) -> &str {
    &s.uuid
}

fn switch_name(s: &SwitchRecord) -> &str {
    &s.name
}

/// Cached view of the virtualization manager
pub struct VirtInventory {
    source: Arc<dyn VirtSource>,
    hosts: MultiKeyIndex<HostRecord>,
    hosts_scanned: bool,
    switches: MultiKeyIndex<SwitchRecord>,
    switches_scanned: bool,
    /// Search results by exact substring
    vm_searches: HashMap<String, VmSearchResult>,
    /// VM handles by exact name
    vm_handles: HashMap<String, ManagedRef>,
    /// PCI device info by `(host moid, pci id)`
    pci_devices: HashMap<(String, String), PciDeviceInfo>,
}

impl VirtInventory {
    /// Create an empty cache over `source`
    pub fn new(source: Arc<dyn VirtSource>) -> Self {
        Self {
            source,
            hosts: MultiKeyIndex::<HostRecord>::new(&[
                ("ip", host_ip),
                ("name", host_name),
                ("uuid", host_uuid),
                ("moid", host_moid),
            ]),
            hosts_scanned: false,
            switches: MultiKeyIndex::<SwitchRecord>::new(&[
                ("uuid", switch_uuid),
                ("name", switch_name),
            ]),
            switches_scanned: false,
            vm_searches: HashMap::new(),
            vm_handles: HashMap::new(),
            pci_devices: HashMap::new(),
        }
    }

    // ------------------------------------------------------------------
    // Hosts
    // ------------------------------------------------------------------

    /// Resolve a host by ip, name, uuid or moid, scanning the backend once
    /// on a miss.
    ///
    /// # Errors
    /// Returns `InventoryError::QueryFailed` if the scan fails.
    #[instrument(skip(self))]
    pub async fn lookup_host(&mut self, key: &str) -> Result<Lookup<HostRecord>, InventoryError> {
        if let Some(host) = self.hosts.resolve(key) {
            debug!("host cache hit");
            return Ok(Lookup::Cached(host));
        }

        let scanned = self.source.list_hosts().await?;
        self.hosts.populate_from_scan(scanned);
        self.hosts_scanned = true;

        Ok(match self.hosts.resolve(key) {
            Some(host) => Lookup::Scanned(host),
            None => Lookup::Missing,
        })
    }

    /// Resolve a host or fail with `HostNotFound`
    ///
    /// # Errors
    /// Returns `HostNotFound` after a scan without a match, or
    /// `QueryFailed` if the scan fails.
    pub async fn host(&mut self, key: &str) -> Result<Arc<HostRecord>, InventoryError> {
        self.lookup_host(key)
            .await?
            .found()
            .ok_or_else(|| InventoryError::HostNotFound(key.to_string()))
    }

    /// Every host
    ///
    /// # Errors
    /// Returns `InventoryError::QueryFailed` if the scan fails.
    pub async fn hosts(
        &mut self,
        force_refresh: bool,
    ) -> Result<Vec<Arc<HostRecord>>, InventoryError> {
        if force_refresh || !self.hosts_scanned {
            let scanned = self.source.list_hosts().await?;
            let count = self.hosts.replace_from_scan(scanned);
            self.hosts_scanned = true;
            info!(count, "host inventory cached");
        }
        Ok(self.hosts.records().cloned().collect())
    }

    // ------------------------------------------------------------------
    // Switches
    // ------------------------------------------------------------------

    /// Resolve a switch by uuid or name, scanning the backend once on a miss
    ///
    /// # Errors
    /// Returns `InventoryError::QueryFailed` if the scan fails.
    #[instrument(skip(self))]
    pub async fn lookup_switch(
        &mut self,
        key: &str,
    ) -> Result<Lookup<SwitchRecord>, InventoryError> {
        if let Some(switch) = self.switches.resolve(key) {
            debug!("switch cache hit");
            return Ok(Lookup::Cached(switch));
        }

        let scanned = self.source.list_switches().await?;
        self.switches.populate_from_scan(scanned);
        self.switches_scanned = true;

        Ok(match self.switches.resolve(key) {
            Some(switch) => Lookup::Scanned(switch),
            None => Lookup::Missing,
        })
    }

    /// Resolve a switch or fail with `SwitchNotFound`
    ///
    /// # Errors
    /// Returns `SwitchNotFound` after a scan without a match, or
    /// `QueryFailed` if the scan fails.
    pub async fn switch(&mut self, key: &str) -> Result<Arc<SwitchRecord>, InventoryError> {
        self.lookup_switch(key)
            .await?
            .found()
            .ok_or_else(|| InventoryError::SwitchNotFound(key.to_string()))
    }

    /// Re-read the switch with `uuid` from the backend, replacing any
    /// cached record that shares one of its keys
    ///
    /// # Errors
    /// Returns `SwitchNotFound` if the backend has no such switch, or
    /// `QueryFailed`.
    #[instrument(skip(self))]
    pub async fn refresh_switch(&mut self, uuid: &str) -> Result<Arc<SwitchRecord>, InventoryError> {
        let Some(record) = self.source.get_switch(uuid).await? else {
            return Err(InventoryError::SwitchNotFound(uuid.to_string()));
        };
        self.switches.populate_from_scan([record]);
        self.switches
            .resolve_in("uuid", uuid)
            .ok_or_else(|| InventoryError::SwitchNotFound(uuid.to_string()))
    }

    /// Every distributed switch
    ///
    /// # Errors
    /// Returns `InventoryError::QueryFailed` if the scan fails.
    pub async fn switches(
        &mut self,
        force_refresh: bool,
    ) -> Result<Vec<Arc<SwitchRecord>>, InventoryError> {
        if force_refresh || !self.switches_scanned {
            let scanned = self.source.list_switches().await?;
            let count = self.switches.replace_from_scan(scanned);
            self.switches_scanned = true;
            info!(count, "switch inventory cached");
        }
        Ok(self.switches.records().cloned().collect())
    }

    // ------------------------------------------------------------------
    // VMs
    // ------------------------------------------------------------------

    /// VMs whose name contains `substring`.
    ///
    /// Results are cached per exact substring; overlapping substrings are
    /// separate entries.
    ///
    /// # Errors
    /// Returns `InventoryError::QueryFailed` if the search fails.
    #[instrument(skip(self))]
    pub async fn find_vms(
        &mut self,
        substring: &str,
        force_refresh: bool,
    ) -> Result<&VmSearchResult, InventoryError> {
        if force_refresh || !self.vm_searches.contains_key(substring) {
            let vms = self.source.find_vms(substring).await?;
            let result = VmSearchResult::from_summaries(vms);
            info!(count = result.matched_names.len(), "VM search cached");
            self.vm_searches.insert(substring.to_string(), result);
        }
        Ok(self
            .vm_searches
            .entry(substring.to_string())
            .or_insert_with(|| VmSearchResult::from_summaries(Vec::new())))
    }

    /// Handle of the VM named exactly `name`
    ///
    /// # Errors
    /// Returns `VmNotFound` if no VM has that name, or `QueryFailed`.
    #[instrument(skip(self))]
    pub async fn vm_handle(
        &mut self,
        name: &str,
        force_refresh: bool,
    ) -> Result<ManagedRef, InventoryError> {
        if !force_refresh && let Some(handle) = self.vm_handles.get(name) {
            return Ok(handle.clone());
        }

        let handle = self
            .source
            .find_vm(name)
            .await?
            .ok_or_else(|| InventoryError::VmNotFound(name.to_string()))?;
        self.vm_handles.insert(name.to_string(), handle.clone());
        Ok(handle)
    }

    // ------------------------------------------------------------------
    // PCI devices
    // ------------------------------------------------------------------

    /// PCI device `pci_id` on the host identified by `host_key`.
    ///
    /// One hardware scan caches every device of that host.
    ///
    /// # Errors
    /// Returns `HostNotFound`, `PciDeviceNotFound`, or `QueryFailed`.
    #[instrument(skip(self))]
    pub async fn pci_device(
        &mut self,
        host_key: &str,
        pci_id: &str,
        force_refresh: bool,
    ) -> Result<PciDeviceInfo, InventoryError> {
        let host = self.host(host_key).await?;
        let key = (host.moid.clone(), pci_id.to_string());

        if !force_refresh && let Some(info) = self.pci_devices.get(&key) {
            return Ok(info.clone());
        }

        let hardware = self.source.host_hardware(&host).await?;
        self.pci_devices.retain(|(moid, _), _| moid != &host.moid);
        for device in &hardware.pci_devices {
            if let Some(info) = PciDeviceInfo::from_hardware(&hardware, &device.id) {
                self.pci_devices
                    .insert((host.moid.clone(), device.id.clone()), info);
            }
        }
        debug!(
            host = %host.name,
            devices = hardware.pci_devices.len(),
            "host hardware cached"
        );

        self.pci_devices
            .get(&key)
            .cloned()
            .ok_or_else(|| InventoryError::PciDeviceNotFound {
                host: host_key.to_string(),
                pci_id: pci_id.to_string(),
            })
    }

    // ------------------------------------------------------------------
    // Invalidation
    // ------------------------------------------------------------------

    pub fn invalidate_hosts(&mut self) {
        self.hosts.clear();
        self.hosts_scanned = false;
        self.pci_devices.clear();
    }

    pub fn invalidate_switches(&mut self) {
        self.switches.clear();
        self.switches_scanned = false;
    }

    pub fn invalidate_vm_searches(&mut self) {
        self.vm_searches.clear();
    }

    pub fn invalidate_vm_handles(&mut self) {
        self.vm_handles.clear();
    }

    pub fn invalidate_pci_devices(&mut self) {
        self.pci_devices.clear();
    }

    /// Drop every cached fact
    pub fn clear(&mut self) {
        self.invalidate_hosts();
        self.invalidate_switches();
        self.invalidate_vm_searches();
        self.invalidate_vm_handles();
        debug!("virtualization inventory cleared");
    }
}
