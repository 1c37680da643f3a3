use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};

use tunebench_inventory::*;

// Mock implementations
#[derive(Default)]
struct MockClusterSource {
    nodes: Mutex<String>,
    pods: Mutex<String>,
    fail_nodes: Mutex<bool>,
    node_queries: AtomicUsize,
    pod_queries: AtomicUsize,
    network_queries: AtomicUsize,
    config_queries: AtomicUsize,
}

impl MockClusterSource {
    fn with_nodes(raw: &str) -> Arc<Self> {
        let source = Self::default();
        *source.nodes.lock().unwrap() = raw.to_string();
        Arc::new(source)
    }

    fn set_nodes(&self, raw: &str) {
        *self.nodes.lock().unwrap() = raw.to_string();
    }
}

#[async_trait]
impl ClusterSource for MockClusterSource {
    async fn list_nodes(&self) -> Result<String, InventoryError> {
        self.node_queries.fetch_add(1, Ordering::SeqCst);
        if *self.fail_nodes.lock().unwrap() {
            return Err(InventoryError::QueryFailed {
                command: "kubectl get nodes".to_string(),
                diagnostic: "Unable to connect to the server".to_string(),
            });
        }
        Ok(self.nodes.lock().unwrap().clone())
    }

    async fn list_pods(&self, scope: &PodScope) -> Result<String, InventoryError> {
        self.pod_queries.fetch_add(1, Ordering::SeqCst);
        let all = self.pods.lock().unwrap().clone();
        Ok(match scope {
            PodScope::AllNamespaces => all,
            PodScope::Namespace(ns) => all
                .lines()
                .filter(|l| l.split_whitespace().nth(1) == Some(ns.as_str()))
                .map(|l| format!("{l}\n"))
                .collect(),
        })
    }

    async fn list_network_attachments(&self) -> Result<String, InventoryError> {
        self.network_queries.fetch_add(1, Ordering::SeqCst);
        Ok("sriov-left\nsriov-right\n".to_string())
    }

    async fn get_structured(&self, query: &StructuredQuery) -> Result<Value, InventoryError> {
        match query {
            StructuredQuery::ClientConfig => {
                self.config_queries.fetch_add(1, Ordering::SeqCst);
                Ok(json!({
                    "clusters": [{"name": "perf-lab"}],
                    "users": [],
                    "current-context": "perf"
                }))
            }
            StructuredQuery::Pod { name, .. } => {
                Ok(json!({"metadata": {"name": name}, "status": {"podIP": "10.128.2.14"}}))
            }
            StructuredQuery::Node(name) => Ok(json!({"metadata": {"name": name}})),
        }
    }
}

const NODES: &str = "\
master-0 10.1.0.2
worker-dpdk-0 10.1.0.20
worker-dpdk-1 10.1.0.21
";

#[tokio::test]
async fn test_repeated_read_queries_once() {
    let source = MockClusterSource::with_nodes(NODES);
    let mut inventory = ClusterInventory::new(source.clone());

    let first = inventory.nodes("", false).await.unwrap().clone();
    let second = inventory.nodes("", false).await.unwrap().clone();

    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
    assert_eq!(source.node_queries.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_forced_refresh_drops_vanished_records() {
    let source = MockClusterSource::with_nodes(NODES);
    let mut inventory = ClusterInventory::new(source.clone());

    inventory.nodes("", false).await.unwrap();
    source.set_nodes("worker-dpdk-1 10.1.0.21\n");

    let refreshed = inventory.nodes("", true).await.unwrap();
    assert_eq!(refreshed.keys().collect::<Vec<_>>(), vec!["worker-dpdk-1"]);
    assert_eq!(source.node_queries.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_short_lines_are_skipped_without_error() {
    let source = MockClusterSource::with_nodes("worker-0 10.1.0.30\nNo resources\nworker-1\n");
    let mut inventory = ClusterInventory::new(source);

    let nodes = inventory.nodes("worker", false).await.unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes["worker-0"].ip, "10.1.0.30");
}

#[tokio::test]
async fn test_node_without_address_is_never_a_target() {
    let source = MockClusterSource::with_nodes("worker-0 10.1.0.20\nworker-1 <none>\n");
    let mut inventory = ClusterInventory::new(source);

    let ips = inventory.node_ips("", false).await.unwrap();
    assert_eq!(ips, vec!["10.1.0.20"]);
}

#[tokio::test]
async fn test_selectors_cache_independently() {
    let source = MockClusterSource::with_nodes(NODES);
    let mut inventory = ClusterInventory::new(source.clone());

    let ips = inventory.node_ips("worker-dpdk", false).await.unwrap();
    assert_eq!(ips, vec!["10.1.0.20", "10.1.0.21"]);

    let all = inventory.nodes("", false).await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(source.node_queries.load(Ordering::SeqCst), 2);

    // answered from cache
    assert_eq!(
        inventory.node_ip("master-0").await.unwrap().as_deref(),
        Some("10.1.0.2")
    );
    assert_eq!(source.node_queries.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_query_failure_propagates_and_caches_nothing() {
    let source = MockClusterSource::with_nodes(NODES);
    *source.fail_nodes.lock().unwrap() = true;
    let mut inventory = ClusterInventory::new(source.clone());

    let err = inventory.nodes("", false).await.unwrap_err();
    assert!(matches!(err, InventoryError::QueryFailed { .. }));

    *source.fail_nodes.lock().unwrap() = false;
    assert_eq!(inventory.nodes("", false).await.unwrap().len(), 3);
    assert_eq!(source.node_queries.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_pod_scopes_do_not_mix() {
    let source = Arc::new(MockClusterSource::default());
    *source.pods.lock().unwrap() = "\
iperf-server perf worker-dpdk-0
iperf-client perf worker-dpdk-1
dns-default openshift-dns master-0
"
    .to_string();
    let mut inventory = ClusterInventory::new(source.clone());

    let perf = inventory.pods(&PodScope::namespace("perf"), false).await.unwrap();
    assert_eq!(perf.len(), 2);

    let all = inventory.pods(&PodScope::AllNamespaces, false).await.unwrap();
    assert_eq!(all.len(), 3);

    let perf_again = inventory.pods(&PodScope::namespace("perf"), false).await.unwrap();
    assert_eq!(perf_again.len(), 2);
    assert_eq!(source.pod_queries.load(Ordering::SeqCst), 2);

    assert_eq!(
        inventory.pod_node("perf", "iperf-client").await.unwrap().as_deref(),
        Some("worker-dpdk-1")
    );
}

#[tokio::test]
async fn test_networks_cached_as_one_value() {
    let source = Arc::new(MockClusterSource::default());
    let mut inventory = ClusterInventory::new(source.clone());

    assert_eq!(
        inventory.networks(false).await.unwrap(),
        ["sriov-left", "sriov-right"]
    );
    inventory.networks(false).await.unwrap();
    assert_eq!(source.network_queries.load(Ordering::SeqCst), 1);

    inventory.invalidate_networks();
    inventory.networks(false).await.unwrap();
    assert_eq!(source.network_queries.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_config_accessors_fetch_once() {
    let source = Arc::new(MockClusterSource::default());
    let mut inventory = ClusterInventory::new(source.clone());

    assert_eq!(inventory.cluster_name().await.unwrap().as_deref(), Some("perf-lab"));
    assert_eq!(inventory.username().await.unwrap(), None);
    assert_eq!(inventory.context().await.unwrap().as_deref(), Some("perf"));
    assert_eq!(source.config_queries.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_pod_ip_from_spec() {
    let source = Arc::new(MockClusterSource::default());
    let mut inventory = ClusterInventory::new(source);

    assert_eq!(
        inventory.pod_ip("perf", "iperf-server").await.unwrap().as_deref(),
        Some("10.128.2.14")
    );
}

// ============================================================================
// Virtualization inventory
// ============================================================================

#[derive(Default)]
struct MockVirtSource {
    hosts: Mutex<Vec<HostRecord>>,
    host_scans: AtomicUsize,
    switch_scans: AtomicUsize,
    vm_searches: AtomicUsize,
    hardware_scans: AtomicUsize,
}

fn host(ip: &str, name: &str, uuid: &str, moid: &str) -> HostRecord {
    HostRecord {
        ip: ip.to_string(),
        name: name.to_string(),
        uuid: uuid.to_string(),
        moid: moid.to_string(),
        handle: ManagedRef::new("HostSystem", moid),
    }
}

impl MockVirtSource {
    fn new() -> Arc<Self> {
        let source = Self::default();
        *source.hosts.lock().unwrap() = vec![
            host("10.0.0.11", "esx01.lab", "4c4c-01", "host-12"),
            host("10.0.0.12", "esx02.lab", "4c4c-02", "host-15"),
        ];
        Arc::new(source)
    }
}

#[async_trait]
impl VirtSource for MockVirtSource {
    async fn find_vms(&self, substring: &str) -> Result<Vec<VmSummary>, InventoryError> {
        self.vm_searches.fetch_add(1, Ordering::SeqCst);
        Ok(["worker-dpdk-0", "worker-dpdk-1", "master-0"]
            .iter()
            .filter(|n| n.contains(substring))
            .map(|n| VmSummary {
                name: (*n).to_string(),
                handle: ManagedRef::new("VirtualMachine", format!("vm-{n}")),
                config: json!({"name": n}),
            })
            .collect())
    }

    async fn find_vm(&self, name: &str) -> Result<Option<ManagedRef>, InventoryError> {
        Ok((name == "master-0").then(|| ManagedRef::new("VirtualMachine", "vm-40")))
    }

    async fn list_hosts(&self) -> Result<Vec<HostRecord>, InventoryError> {
        self.host_scans.fetch_add(1, Ordering::SeqCst);
        Ok(self.hosts.lock().unwrap().clone())
    }

    async fn list_switches(&self) -> Result<Vec<SwitchRecord>, InventoryError> {
        self.switch_scans.fetch_add(1, Ordering::SeqCst);
        Ok(vec![SwitchRecord {
            uuid: "50 2a 7e 11".to_string(),
            name: "dvs-perf".to_string(),
            handle: ManagedRef::new("VmwareDistributedVirtualSwitch", "dvs-7"),
            port_groups: vec![ManagedRef::new("DistributedVirtualPortgroup", "dvportgroup-9")],
        }])
    }

    async fn host_hardware(&self, _host: &HostRecord) -> Result<HostHardware, InventoryError> {
        self.hardware_scans.fetch_add(1, Ordering::SeqCst);
        Ok(HostHardware {
            pci_devices: vec![PciDevice {
                id: "0000:3b:00.0".to_string(),
                vendor_name: "Intel Corporation".to_string(),
                device_name: "Ethernet Controller E810-C".to_string(),
            }],
            physical_nics: vec![PhysicalNic {
                device: "vmnic4".to_string(),
                pci: "0000:3b:00.0".to_string(),
                mac: "b4:96:91:aa:bb:cc".to_string(),
                driver: Some("icen".to_string()),
            }],
        })
    }
}

#[tokio::test]
async fn test_every_host_key_resolves_same_record() {
    let source = MockVirtSource::new();
    let mut inventory = VirtInventory::new(source.clone());

    let by_ip = inventory.host("10.0.0.12").await.unwrap();
    let by_name = inventory.host("esx02.lab").await.unwrap();
    let by_uuid = inventory.host("4c4c-02").await.unwrap();
    let by_moid = inventory.host("host-15").await.unwrap();

    assert!(Arc::ptr_eq(&by_ip, &by_name));
    assert!(Arc::ptr_eq(&by_ip, &by_uuid));
    assert!(Arc::ptr_eq(&by_ip, &by_moid));
    assert_eq!(source.host_scans.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_host_lookup_reports_cache_or_scan() {
    let source = MockVirtSource::new();
    let mut inventory = VirtInventory::new(source.clone());

    assert!(matches!(
        inventory.lookup_host("esx01.lab").await.unwrap(),
        Lookup::Scanned(_)
    ));
    assert!(inventory.lookup_host("host-12").await.unwrap().is_cached());
}

#[tokio::test]
async fn test_unknown_host_scans_once_per_lookup() {
    let source = MockVirtSource::new();
    let mut inventory = VirtInventory::new(source.clone());

    let err = inventory.host("esx99.lab").await.unwrap_err();
    assert!(matches!(err, InventoryError::HostNotFound(ref key) if key == "esx99.lab"));
    assert_eq!(source.host_scans.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_host_refresh_replaces_index() {
    let source = MockVirtSource::new();
    let mut inventory = VirtInventory::new(source.clone());

    assert_eq!(inventory.hosts(false).await.unwrap().len(), 2);
    source.hosts.lock().unwrap().truncate(1);

    let hosts = inventory.hosts(true).await.unwrap();
    assert_eq!(hosts.len(), 1);
    assert!(matches!(
        inventory.lookup_host("esx02.lab").await.unwrap(),
        Lookup::Missing
    ));
}

#[tokio::test]
async fn test_switch_lookup_and_not_found() {
    let source = MockVirtSource::new();
    let mut inventory = VirtInventory::new(source.clone());

    let by_uuid = inventory.switch("50 2a 7e 11").await.unwrap();
    let by_name = inventory.switch("dvs-perf").await.unwrap();
    assert!(Arc::ptr_eq(&by_uuid, &by_name));
    assert_eq!(source.switch_scans.load(Ordering::SeqCst), 1);

    let err = inventory.switch("50 00 00 00").await.unwrap_err();
    assert!(matches!(err, InventoryError::SwitchNotFound(_)));
}

#[tokio::test]
async fn test_vm_searches_cached_per_substring() {
    let source = MockVirtSource::new();
    let mut inventory = VirtInventory::new(source.clone());

    let dpdk = inventory.find_vms("dpdk", false).await.unwrap().clone();
    assert_eq!(dpdk.matched_names, vec!["worker-dpdk-0", "worker-dpdk-1"]);
    assert_eq!(dpdk.matched_configs.len(), 2);

    inventory.find_vms("dpdk", false).await.unwrap();
    inventory.find_vms("worker-dpdk", false).await.unwrap();
    assert_eq!(source.vm_searches.load(Ordering::SeqCst), 2);

    inventory.invalidate_vm_searches();
    inventory.find_vms("dpdk", false).await.unwrap();
    assert_eq!(source.vm_searches.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_vm_handle_not_found() {
    let source = MockVirtSource::new();
    let mut inventory = VirtInventory::new(source);

    assert_eq!(
        inventory.vm_handle("master-0", false).await.unwrap().value,
        "vm-40"
    );
    assert!(matches!(
        inventory.vm_handle("ghost", false).await.unwrap_err(),
        InventoryError::VmNotFound(_)
    ));
}

#[tokio::test]
async fn test_pci_device_cached_per_host() {
    let source = MockVirtSource::new();
    let mut inventory = VirtInventory::new(source.clone());

    let info = inventory
        .pci_device("esx01.lab", "0000:3b:00.0", false)
        .await
        .unwrap();
    assert_eq!(info.physical_nic_name.as_deref(), Some("vmnic4"));
    assert_eq!(info.mac.as_deref(), Some("b4:96:91:aa:bb:cc"));

    inventory
        .pci_device("10.0.0.11", "0000:3b:00.0", false)
        .await
        .unwrap();
    assert_eq!(source.hardware_scans.load(Ordering::SeqCst), 1);

    let err = inventory
        .pci_device("esx01.lab", "0000:af:00.1", false)
        .await
        .unwrap_err();
    assert!(matches!(err, InventoryError::PciDeviceNotFound { .. }));
    assert_eq!(source.hardware_scans.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_refresh_switch_by_uuid() {
    let source = MockVirtSource::new();
    let mut inventory = VirtInventory::new(source.clone());

    let cached = inventory.switch("dvs-perf").await.unwrap();
    let refreshed = inventory.refresh_switch("50 2a 7e 11").await.unwrap();
    assert!(!Arc::ptr_eq(&cached, &refreshed));
    assert_eq!(refreshed.port_groups.len(), 1);

    // the name key now points at the refreshed record
    let by_name = inventory.switch("dvs-perf").await.unwrap();
    assert!(Arc::ptr_eq(&by_name, &refreshed));
    assert_eq!(inventory.switches(false).await.unwrap().len(), 1);

    assert!(matches!(
        inventory.refresh_switch("50 ff").await.unwrap_err(),
        InventoryError::SwitchNotFound(_)
    ));
}
