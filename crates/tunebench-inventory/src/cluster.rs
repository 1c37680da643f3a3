//! Orchestrator inventory cache
//!
//! Every fact is fetched lazily on first use and kept until the caller
//! forces a refresh or invalidates it. A refresh replaces the cached map
//! wholesale.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::error::InventoryError;
use crate::parse::{parse_networks, parse_nodes, parse_pods};
use crate::source::ClusterSource;
use crate::types::{ClusterConfig, NodeRecord, PodRecord, PodScope, StructuredQuery};

/// Nodes keyed by name
pub type NodeMap = IndexMap<String, NodeRecord>;
/// Pods keyed by `(namespace, name)`
pub type PodMap = IndexMap<(String, String), PodRecord>;

/// Cached view of the orchestrator
pub struct ClusterInventory {
    source: Arc<dyn ClusterSource>,
    /// Node listings by selector (`""` is the unfiltered listing)
    nodes: HashMap<String, NodeMap>,
    /// Pod listings by scope; scopes never share a map
    pods: HashMap<PodScope, PodMap>,
    networks: Option<Vec<String>>,
    config: Option<ClusterConfig>,
    node_specs: HashMap<String, Value>,
    pod_specs: HashMap<(String, String), Value>,
}

impl ClusterInventory {
    /// Create an empty cache over `source`
    pub fn new(source: Arc<dyn ClusterSource>) -> Self {
        Self {
            source,
            nodes: HashMap::new(),
            pods: HashMap::new(),
            networks: None,
            config: None,
            node_specs: HashMap::new(),
            pod_specs: HashMap::new(),
        }
    }

    /// Nodes whose listing line contains `selector`
    ///
    /// # Errors
    /// Returns `InventoryError::QueryFailed` if the listing query fails.
    #[instrument(skip(self))]
    pub async fn nodes(
        &mut self,
        selector: &str,
        force_refresh: bool,
    ) -> Result<&NodeMap, InventoryError> {
        if force_refresh || !self.nodes.contains_key(selector) {
            let raw = self.source.list_nodes().await?;
            let parsed = parse_nodes(&raw, selector);
            info!(selector, count = parsed.len(), "node listing cached");
            self.nodes.insert(selector.to_string(), parsed);
        } else {
            debug!(selector, "node listing cache hit");
        }
        Ok(self.nodes.entry(selector.to_string()).or_default())
    }

    /// IPs of the nodes matching `selector`, in listing order
    ///
    /// # Errors
    /// Returns `InventoryError::QueryFailed` if the listing query fails.
    pub async fn node_ips(
        &mut self,
        selector: &str,
        force_refresh: bool,
    ) -> Result<Vec<String>, InventoryError> {
        let nodes = self.nodes(selector, force_refresh).await?;
        Ok(nodes.values().map(|n| n.ip.clone()).collect())
    }

    /// IP of the node named `name`
    ///
    /// Any cached listing may answer; otherwise the unfiltered listing is
    /// fetched. `None` means the node does not exist.
    ///
    /// # Errors
    /// Returns `InventoryError::QueryFailed` if the listing query fails.
    pub async fn node_ip(&mut self, name: &str) -> Result<Option<String>, InventoryError> {
        if let Some(node) = self.nodes.values().find_map(|m| m.get(name)) {
            return Ok(Some(node.ip.clone()));
        }
        let nodes = self.nodes("", false).await?;
        Ok(nodes.get(name).map(|n| n.ip.clone()))
    }

    /// Pods visible in `scope`
    ///
    /// # Errors
    /// Returns `InventoryError::QueryFailed` if the listing query fails.
    #[instrument(skip(self))]
    pub async fn pods(
        &mut self,
        scope: &PodScope,
        force_refresh: bool,
    ) -> Result<&PodMap, InventoryError> {
        if force_refresh || !self.pods.contains_key(scope) {
            let raw = self.source.list_pods(scope).await?;
            let mut parsed = parse_pods(&raw);
            if let PodScope::Namespace(ns) = scope {
                parsed.retain(|(pod_ns, _), _| pod_ns == ns);
            }
            info!(%scope, count = parsed.len(), "pod listing cached");
            self.pods.insert(scope.clone(), parsed);
        } else {
            debug!(%scope, "pod listing cache hit");
        }
        Ok(self.pods.entry(scope.clone()).or_default())
    }

    /// Node hosting pod `name` in `namespace`
    ///
    /// # Errors
    /// Returns `InventoryError::QueryFailed` if the listing query fails.
    pub async fn pod_node(
        &mut self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<String>, InventoryError> {
        let key = (namespace.to_string(), name.to_string());
        let pods = self.pods(&PodScope::namespace(namespace), false).await?;
        Ok(pods.get(&key).map(|p| p.node.clone()))
    }

    /// Network attachment definitions
    ///
    /// # Errors
    /// Returns `InventoryError::QueryFailed` if the listing query fails.
    #[instrument(skip(self))]
    pub async fn networks(&mut self, force_refresh: bool) -> Result<&[String], InventoryError> {
        if force_refresh || self.networks.is_none() {
            let raw = self.source.list_network_attachments().await?;
            let parsed = parse_networks(&raw);
            info!(count = parsed.len(), "network attachments cached");
            self.networks = Some(parsed);
        }
        Ok(self.networks.get_or_insert_with(Vec::new))
    }

    /// Full spec document of node `name`
    ///
    /// # Errors
    /// Returns `InventoryError::QueryFailed` if the query fails.
    pub async fn node_spec(
        &mut self,
        name: &str,
        force_refresh: bool,
    ) -> Result<&Value, InventoryError> {
        if force_refresh || !self.node_specs.contains_key(name) {
            let doc = self
                .source
                .get_structured(&StructuredQuery::Node(name.to_string()))
                .await?;
            self.node_specs.insert(name.to_string(), doc);
        }
        Ok(self.node_specs.entry(name.to_string()).or_insert(Value::Null))
    }

    /// Full spec document of pod `name` in `namespace`
    ///
    /// # Errors
    /// Returns `InventoryError::QueryFailed` if the query fails.
    pub async fn pod_spec(
        &mut self,
        namespace: &str,
        name: &str,
        force_refresh: bool,
    ) -> Result<&Value, InventoryError> {
        let key = (namespace.to_string(), name.to_string());
        if force_refresh || !self.pod_specs.contains_key(&key) {
            let query = StructuredQuery::Pod {
                namespace: namespace.to_string(),
                name: name.to_string(),
            };
            let doc = self.source.get_structured(&query).await?;
            self.pod_specs.insert(key.clone(), doc);
        }
        Ok(self.pod_specs.entry(key).or_insert(Value::Null))
    }

    /// Pod IP from the cached pod spec
    ///
    /// # Errors
    /// Returns `InventoryError::QueryFailed` if the query fails.
    pub async fn pod_ip(
        &mut self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<String>, InventoryError> {
        let spec = self.pod_spec(namespace, name, false).await?;
        Ok(spec
            .pointer("/status/podIP")
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    /// Client configuration document
    ///
    /// # Errors
    /// Returns `InventoryError::QueryFailed` if the query fails.
    #[instrument(skip(self))]
    pub async fn config(&mut self, force_refresh: bool) -> Result<&ClusterConfig, InventoryError> {
        if force_refresh || self.config.is_none() {
            let doc = self
                .source
                .get_structured(&StructuredQuery::ClientConfig)
                .await?;
            self.config = Some(ClusterConfig::new(doc));
        }
        Ok(self
            .config
            .get_or_insert_with(|| ClusterConfig::new(Value::Null)))
    }

    /// Name of the configured cluster
    ///
    /// # Errors
    /// Returns `InventoryError::QueryFailed` if the config query fails.
    pub async fn cluster_name(&mut self) -> Result<Option<String>, InventoryError> {
        Ok(self.config(false).await?.cluster_name())
    }

    /// Configured user name
    ///
    /// # Errors
    /// Returns `InventoryError::QueryFailed` if the config query fails.
    pub async fn username(&mut self) -> Result<Option<String>, InventoryError> {
        Ok(self.config(false).await?.username())
    }

    /// Current context
    ///
    /// # Errors
    /// Returns `InventoryError::QueryFailed` if the config query fails.
    pub async fn context(&mut self) -> Result<Option<String>, InventoryError> {
        Ok(self.config(false).await?.context())
    }

    pub fn invalidate_nodes(&mut self) {
        self.nodes.clear();
        self.node_specs.clear();
    }

    pub fn invalidate_pods(&mut self) {
        self.pods.clear();
        self.pod_specs.clear();
    }

    pub fn invalidate_networks(&mut self) {
        self.networks = None;
    }

    pub fn invalidate_config(&mut self) {
        self.config = None;
    }

    /// Drop every cached fact
    pub fn clear(&mut self) {
        self.invalidate_nodes();
        self.invalidate_pods();
        self.invalidate_networks();
        self.invalidate_config();
        debug!("cluster inventory cleared");
    }
}
