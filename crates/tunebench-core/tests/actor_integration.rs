mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use kameo::actor::Spawn;
use serde_json::{Value, json};

use common::{Reply, ScriptedExecutor, fast_settings};
use tunebench_core::*;
use tunebench_inventory::{ClusterInventory, ClusterSource, InventoryError, PodScope, StructuredQuery};

// Mock implementations
#[derive(Default)]
struct MockCluster {
    node_queries: AtomicUsize,
}

#[async_trait]
impl ClusterSource for MockCluster {
    async fn list_nodes(&self) -> Result<String, InventoryError> {
        self.node_queries.fetch_add(1, Ordering::SeqCst);
        Ok("master-0 10.1.0.2\nworker-dpdk-0 10.1.0.20\nworker-dpdk-1 10.1.0.21\n".to_string())
    }

    async fn list_pods(&self, _scope: &PodScope) -> Result<String, InventoryError> {
        Ok(String::new())
    }

    async fn list_network_attachments(&self) -> Result<String, InventoryError> {
        Ok(String::new())
    }

    async fn get_structured(&self, query: &StructuredQuery) -> Result<Value, InventoryError> {
        match query {
            StructuredQuery::Pod { name, .. } if name == "iperf-server" => {
                Ok(json!({"status": {"podIP": "10.128.2.14"}}))
            }
            _ => Ok(json!({})),
        }
    }
}

fn spawn_actor(
    cluster: Arc<MockCluster>,
    nodes: Arc<ScriptedExecutor>,
    workloads: Arc<ScriptedExecutor>,
    selector: &str,
) -> kameo::actor::ActorRef<TuningActor> {
    TuningActor::spawn(TuningActorArgs {
        inventory: ClusterInventory::new(cluster),
        node_actions: ActionExecutor::new(nodes, fast_settings(3)),
        workload_actions: ActionExecutor::new(workloads, fast_settings(3)),
        workload_target: "localhost".to_string(),
        node_selector: selector.to_string(),
    })
}

#[tokio::test]
async fn test_list_nodes_is_cached() {
    let cluster = Arc::new(MockCluster::default());
    let actor = spawn_actor(
        cluster.clone(),
        Arc::new(ScriptedExecutor::new()),
        Arc::new(ScriptedExecutor::new()),
        "worker-dpdk",
    );

    let nodes = actor.ask(ListNodes::default()).await.unwrap();
    assert_eq!(nodes.len(), 2);
    actor.ask(ListNodes::default()).await.unwrap();
    assert_eq!(cluster.node_queries.load(Ordering::SeqCst), 1);

    actor.ask(InvalidateInventory).await.unwrap();
    actor.ask(ListNodes::default()).await.unwrap();
    assert_eq!(cluster.node_queries.load(Ordering::SeqCst), 2);

    actor.stop_gracefully().await.unwrap();
}

#[tokio::test]
async fn test_profile_targets_selected_nodes() {
    let nodes = Arc::new(ScriptedExecutor::new().script(
        "tuned-adm active",
        [Reply::Exit(0, "Current active profile: network-latency\n")],
    ));
    let actor = spawn_actor(
        Arc::new(MockCluster::default()),
        nodes.clone(),
        Arc::new(ScriptedExecutor::new()),
        "worker-dpdk",
    );

    let report = actor
        .ask(ApplyProfile {
            targets: None,
            profile: ProfileSpec {
                name: "network-latency".to_string(),
                path: "/usr/lib/tuned/network-latency".to_string(),
            },
        })
        .await
        .unwrap();

    let hit: Vec<&str> = report.outcomes.iter().map(|o| o.target.as_str()).collect();
    assert_eq!(hit, vec!["10.1.0.20", "10.1.0.21"]);
    assert_eq!(report.changed(), 0);

    actor.stop_gracefully().await.unwrap();
}

#[tokio::test]
async fn test_reboot_explicit_targets() {
    let nodes = Arc::new(ScriptedExecutor::new().script("uptime -s", [
        Reply::Exit(0, "2026-10-15 08:00:00"),
        Reply::Exit(0, "2026-10-15 08:03:40"),
    ]));
    let actor = spawn_actor(
        Arc::new(MockCluster::default()),
        nodes.clone(),
        Arc::new(ScriptedExecutor::new()),
        "worker-dpdk",
    );

    let report = actor
        .ask(RebootNodes {
            targets: Some(vec!["10.1.0.21".to_string()]),
        })
        .await
        .unwrap();

    assert_eq!(report.succeeded(), 1);
    assert_eq!(nodes.count("10.1.0.21", "reboot"), 1);

    actor.stop_gracefully().await.unwrap();
}

#[tokio::test]
async fn test_no_matching_nodes() {
    let actor = spawn_actor(
        Arc::new(MockCluster::default()),
        Arc::new(ScriptedExecutor::new()),
        Arc::new(ScriptedExecutor::new()),
        "gpu-node",
    );

    let result = actor.ask(RebootNodes { targets: None }).await;
    assert!(result.is_err());

    actor.stop_gracefully().await.unwrap();
}

#[tokio::test]
async fn test_env_test_resolves_server_pod_ip() {
    let workloads = Arc::new(ScriptedExecutor::new());
    let actor = spawn_actor(
        Arc::new(MockCluster::default()),
        Arc::new(ScriptedExecutor::new()),
        workloads.clone(),
        "worker-dpdk",
    );

    let spec = EnvTestSpec {
        server: ServerRole {
            workload: "iperf-server".to_string(),
            namespace: "perf".to_string(),
            command: "iperf3".to_string(),
            port: 5201,
            options: "-D".to_string(),
        },
        client: ClientRole {
            workload: "iperf-client".to_string(),
            namespace: "perf".to_string(),
            command: "iperf3".to_string(),
            port: 5201,
            duration: std::time::Duration::from_secs(5),
            parallel: 1,
            options: String::new(),
            server_address: String::new(),
        },
    };

    let report = actor.ask(RunEnvTest { spec }).await.unwrap();

    assert!(report.success());
    let commands = workloads.commands();
    assert_eq!(commands.len(), 2);
    assert!(commands[1].contains("-c '10.128.2.14'"));
    assert_eq!(workloads.count("localhost", &commands[0]), 1);

    actor.stop_gracefully().await.unwrap();
}
