//! Configuration loading and types

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tunebench_core::config::secs;
use tunebench_core::{ExecutorSettings, MutationSpec};
use tunebench_inventory::VirtSession;

/// Top-level configuration for tunebench
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub ssh: SshConfig,
    #[serde(default)]
    pub cluster: ClusterConfig,
    /// Virtualization manager session, if one is used
    pub vcenter: Option<VirtSession>,
    #[serde(default)]
    pub executor: ExecutorSettings,
    /// Desired tuning state
    #[serde(default)]
    pub tuning: MutationSpec,
}

/// Process-wide settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Emit logs as JSON lines
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// SSH access to nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshConfig {
    #[serde(default = "default_user")]
    pub user: String,
    pub password: Option<String>,
    /// Private key; preferred over the password when both are set
    pub key_path: Option<PathBuf>,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(with = "secs", default = "default_connect_timeout")]
    pub connect_timeout: Duration,
    /// Public key appended to each node's `authorized_keys` before use
    pub bootstrap_public_key: Option<PathBuf>,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            user: default_user(),
            password: None,
            key_path: None,
            port: default_port(),
            connect_timeout: default_connect_timeout(),
            bootstrap_public_key: None,
        }
    }
}

fn default_user() -> String {
    "core".to_string()
}

fn default_port() -> u16 {
    22
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Orchestrator access
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    #[serde(default = "default_kubectl")]
    pub kubectl: String,
    pub kubeconfig: Option<String>,
    /// Substring selecting the nodes node-level actions apply to
    #[serde(default)]
    pub node_selector: String,
    /// Default namespace for pod listings; unset means all namespaces
    pub namespace: Option<String>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            kubectl: default_kubectl(),
            kubeconfig: None,
            node_selector: String::new(),
            namespace: None,
        }
    }
}

fn default_kubectl() -> String {
    "kubectl".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("reading {}: {e}", path.display()))?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Find the config file: explicit path, `TUNEBENCH_CONFIG`, then the
    /// standard locations. `None` means run on defaults.
    #[must_use]
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }

        if let Ok(path) = std::env::var("TUNEBENCH_CONFIG") {
            return Some(PathBuf::from(path));
        }

        [
            Some(PathBuf::from("tunebench.toml")),
            Some(PathBuf::from("/etc/tunebench/tunebench.toml")),
            dirs::config_dir().map(|p| p.join("tunebench/tunebench.toml")),
        ]
        .into_iter()
        .flatten()
        .find(|path| path.exists())
    }

    /// Load the located file, or defaults when there is none
    ///
    /// # Errors
    /// Returns error if a found file cannot be read or parsed
    pub fn load_or_default(path: Option<&Path>) -> eyre::Result<Self> {
        path.map_or_else(|| Ok(Config::default()), Self::load)
    }
}
