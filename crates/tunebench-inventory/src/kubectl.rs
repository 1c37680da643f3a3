//! `kubectl`-backed cluster source

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tunebench_exec::{RemoteExecutor, shell_quote};
use tracing::{debug, instrument};

use crate::error::InventoryError;
use crate::source::ClusterSource;
use crate::types::{PodScope, StructuredQuery};

const NODE_COLUMNS: &str =
    "NAME:.metadata.name,IP:.status.addresses[?(@.type==\"InternalIP\")].address";
const POD_COLUMNS: &str =
    "NAME:.metadata.name,NAMESPACE:.metadata.namespace,NODE:.spec.nodeName";

/// Runs `kubectl` through an executor (usually `LocalExecutor`)
pub struct KubectlSource {
    executor: Arc<dyn RemoteExecutor>,
    /// Where `kubectl` runs
    target: String,
    /// `kubectl` binary (or `oc`)
    binary: String,
    kubeconfig: Option<String>,
}

impl KubectlSource {
    pub fn new(executor: Arc<dyn RemoteExecutor>, target: impl Into<String>) -> Self {
        Self {
            executor,
            target: target.into(),
            binary: "kubectl".to_string(),
            kubeconfig: None,
        }
    }

    /// Use another client binary
    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Pass `--kubeconfig`
    #[must_use]
    pub fn with_kubeconfig(mut self, path: impl Into<String>) -> Self {
        self.kubeconfig = Some(path.into());
        self
    }

    /// Build a `kubectl` command line
    fn command(&self, args: &str) -> String {
        match &self.kubeconfig {
            Some(path) => format!("{} --kubeconfig {} {args}", self.binary, shell_quote(path)),
            None => format!("{} {args}", self.binary),
        }
    }

    /// Run a query, mapping non-zero exit to `QueryFailed`
    #[instrument(skip(self))]
    async fn run(&self, args: &str) -> Result<String, InventoryError> {
        let cmd = self.command(args);
        let result = self.executor.execute(&self.target, &cmd).await?;

        if !result.success() {
            return Err(InventoryError::QueryFailed {
                command: cmd,
                diagnostic: result.stderr.trim().to_string(),
            });
        }

        debug!(bytes = result.stdout.len(), "query completed");
        Ok(result.stdout)
    }
}

#[async_trait]
impl ClusterSource for KubectlSource {
    async fn list_nodes(&self) -> Result<String, InventoryError> {
        self.run(&format!(
            "get nodes --no-headers -o custom-columns={}",
            shell_quote(NODE_COLUMNS)
        ))
        .await
    }

    async fn list_pods(&self, scope: &PodScope) -> Result<String, InventoryError> {
        let scope_arg = match scope {
            PodScope::AllNamespaces => "-A".to_string(),
            PodScope::Namespace(ns) => format!("-n {}", shell_quote(ns)),
        };
        self.run(&format!(
            "get pods {scope_arg} --no-headers -o custom-columns={}",
            shell_quote(POD_COLUMNS)
        ))
        .await
    }

    async fn list_network_attachments(&self) -> Result<String, InventoryError> {
        self.run("get network-attachment-definitions -A --no-headers -o custom-columns=NAME:.metadata.name")
            .await
    }

    async fn get_structured(&self, query: &StructuredQuery) -> Result<Value, InventoryError> {
        let args = match query {
            StructuredQuery::Node(name) => format!("get node {} -o json", shell_quote(name)),
            StructuredQuery::Pod { namespace, name } => format!(
                "get pod {} -n {} -o json",
                shell_quote(name),
                shell_quote(namespace)
            ),
            StructuredQuery::ClientConfig => "config view -o json".to_string(),
        };
        let raw = self.run(&args).await?;
        serde_json::from_str(&raw).map_err(|e| InventoryError::ParseError(e.to_string()))
    }
}
