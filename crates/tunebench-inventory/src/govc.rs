//! `govc`-backed virtualization source
//!
//! Every query is a `govc object.collect -json` call. The session
//! (endpoint and credentials) travels in `GOVC_*` environment variables of
//! a dedicated local executor, so secrets never appear on a command line.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tunebench_exec::{LocalExecutor, RemoteExecutor, shell_quote};
use tracing::{debug, info, instrument, warn};

use crate::error::InventoryError;
use crate::source::VirtSource;
use crate::types::{
    HostHardware, HostRecord, ManagedRef, PciDevice, PhysicalNic, SwitchRecord, VmSummary,
};

/// Endpoint and credentials of a virtualization manager session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtSession {
    /// Endpoint URL or address
    pub endpoint: String,
    pub username: String,
    pub password: String,
    /// Skip TLS verification
    #[serde(default)]
    pub insecure: bool,
}

/// One managed object with its requested properties
#[derive(Debug, Deserialize)]
struct ObjectContent {
    obj: ManagedRef,
    #[serde(rename = "propSet", default)]
    prop_set: Vec<Property>,
}

#[derive(Debug, Deserialize)]
struct Property {
    name: String,
    #[serde(default)]
    val: Value,
}

impl ObjectContent {
    fn prop(&self, name: &str) -> Option<&Value> {
        self.prop_set.iter().find(|p| p.name == name).map(|p| &p.val)
    }

    fn prop_str(&self, name: &str) -> String {
        self.prop(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    /// Array-valued property, tolerating `{"_typeName": .., "X": [..]}` wrappers
    fn prop_list<T: DeserializeOwned>(&self, name: &str) -> Vec<T> {
        let Some(items) = self.prop(name).and_then(unwrap_array) else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(|item| match serde_json::from_value(item.clone()) {
                Ok(v) => Some(v),
                Err(e) => {
                    debug!(property = name, error = %e, "skipping unparseable entry");
                    None
                }
            })
            .collect()
    }
}

fn unwrap_array(value: &Value) -> Option<&Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(map) => map.values().find_map(Value::as_array),
        _ => None,
    }
}

/// Runs `govc` against one virtualization manager
pub struct GovcSource {
    executor: Arc<dyn RemoteExecutor>,
    endpoint: String,
}

impl GovcSource {
    /// Open a session: builds a local executor carrying the session
    /// environment and checks the endpoint answers.
    ///
    /// # Errors
    /// Returns `InventoryError::QueryFailed` if the endpoint rejects the
    /// session.
    #[instrument(skip(session), fields(endpoint = %session.endpoint))]
    pub async fn connect(session: &VirtSession) -> Result<Self, InventoryError> {
        let executor = LocalExecutor::new()
            .with_env("GOVC_URL", &session.endpoint)
            .with_env("GOVC_USERNAME", &session.username)
            .with_env("GOVC_PASSWORD", &session.password)
            .with_env("GOVC_INSECURE", if session.insecure { "1" } else { "0" });

        let source = Self::with_executor(Arc::new(executor), &session.endpoint);
        source.run("about").await?;
        info!("virtualization session established");
        Ok(source)
    }

    /// Use an executor that already carries the session environment
    pub fn with_executor(executor: Arc<dyn RemoteExecutor>, endpoint: impl Into<String>) -> Self {
        Self {
            executor,
            endpoint: endpoint.into(),
        }
    }

    async fn run(&self, args: &str) -> Result<String, InventoryError> {
        let cmd = format!("govc {args}");
        let result = self.executor.execute(&self.endpoint, &cmd).await?;

        if !result.success() {
            return Err(InventoryError::QueryFailed {
                command: cmd,
                diagnostic: result.stderr.trim().to_string(),
            });
        }
        Ok(result.stdout)
    }

    /// Collect `props` for every object of `kind` (a `govc find` type letter)
    async fn collect_all(
        &self,
        kind: &str,
        props: &[&str],
    ) -> Result<Vec<ObjectContent>, InventoryError> {
        let raw = self
            .run(&format!(
                "object.collect -json -type {kind} / {}",
                props.join(" ")
            ))
            .await?;
        parse_contents(&raw)
    }

    /// Collect `props` of a single object
    async fn collect_one(
        &self,
        obj: &ManagedRef,
        props: &[&str],
    ) -> Result<Option<ObjectContent>, InventoryError> {
        let raw = self
            .run(&format!(
                "object.collect -json {} {}",
                shell_quote(&obj.to_string()),
                props.join(" ")
            ))
            .await?;
        Ok(parse_contents(&raw)?.into_iter().next())
    }
}

fn parse_contents(raw: &str) -> Result<Vec<ObjectContent>, InventoryError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| InventoryError::ParseError(e.to_string()))?;
    let Some(items) = unwrap_array(&value) else {
        return Ok(Vec::new());
    };
    items
        .iter()
        .map(|item| {
            serde_json::from_value(item.clone())
                .map_err(|e| InventoryError::ParseError(e.to_string()))
        })
        .collect()
}

/// First VMkernel address of a host, preferring `vmk0`
fn management_ip(content: &ObjectContent) -> String {
    let vnics: Vec<Value> = content.prop_list("config.network.vnic");
    let ip_of = |vnic: &Value| {
        vnic.pointer("/spec/ip/ipAddress")
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    vnics
        .iter()
        .find(|v| v.get("device").and_then(Value::as_str) == Some("vmk0"))
        .and_then(ip_of)
        .or_else(|| vnics.iter().find_map(ip_of))
        .unwrap_or_default()
}

#[async_trait]
impl VirtSource for GovcSource {
    async fn find_vms(&self, substring: &str) -> Result<Vec<VmSummary>, InventoryError> {
        let contents = self.collect_all("m", &["name", "config"]).await?;
        Ok(contents
            .into_iter()
            .filter_map(|c| {
                let name = c.prop_str("name");
                if !name.contains(substring) {
                    return None;
                }
                let config = c.prop("config").cloned().unwrap_or(Value::Null);
                Some(VmSummary {
                    name,
                    handle: c.obj,
                    config,
                })
            })
            .collect())
    }

    async fn find_vm(&self, name: &str) -> Result<Option<ManagedRef>, InventoryError> {
        let contents = self.collect_all("m", &["name"]).await?;
        Ok(contents
            .into_iter()
            .find(|c| c.prop_str("name") == name)
            .map(|c| c.obj))
    }

    async fn list_hosts(&self) -> Result<Vec<HostRecord>, InventoryError> {
        let contents = self
            .collect_all(
                "h",
                &["name", "summary.hardware.uuid", "config.network.vnic"],
            )
            .await?;

        Ok(contents
            .into_iter()
            .map(|c| {
                let ip = management_ip(&c);
                if ip.is_empty() {
                    warn!(host = %c.obj, "host has no VMkernel address");
                }
                HostRecord {
                    ip,
                    name: c.prop_str("name"),
                    uuid: c.prop_str("summary.hardware.uuid"),
                    moid: c.obj.value.clone(),
                    handle: c.obj,
                }
            })
            .collect())
    }

    async fn list_switches(&self) -> Result<Vec<SwitchRecord>, InventoryError> {
        let contents = self.collect_all("w", &["uuid", "name", "portgroup"]).await?;

        Ok(contents
            .into_iter()
            .map(|c| SwitchRecord {
                uuid: c.prop_str("uuid"),
                name: c.prop_str("name"),
                port_groups: c.prop_list("portgroup"),
                handle: c.obj,
            })
            .collect())
    }

    async fn host_hardware(&self, host: &HostRecord) -> Result<HostHardware, InventoryError> {
        let Some(content) = self
            .collect_one(&host.handle, &["hardware.pciDevice", "config.network.pnic"])
            .await?
        else {
            return Err(InventoryError::HostNotFound(host.moid.clone()));
        };

        Ok(HostHardware {
            pci_devices: content.prop_list::<PciDevice>("hardware.pciDevice"),
            physical_nics: content.prop_list::<PhysicalNic>("config.network.pnic"),
        })
    }
}
