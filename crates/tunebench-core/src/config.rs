//! Mutation and executor configuration
//!
//! Everything here deserializes from the `[tuning]` and `[executor]`
//! sections of the daemon configuration. Durations are seconds, fractional
//! values allowed.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::exit_codes::ExitCodeTable;

/// Desired ring buffer sizes for one adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingBufferSpec {
    /// Interface name, e.g. `ens1f0`
    pub adapter: String,
    /// RX ring entries
    pub rx: u32,
    /// TX ring entries
    pub tx: u32,
}

/// Desired tuned profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSpec {
    /// Profile name as known to `tuned-adm`
    pub name: String,
    /// Profile directory that must exist before switching
    pub path: String,
}

/// Server side of an environment test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerRole {
    /// Pod running the server
    pub workload: String,
    pub namespace: String,
    /// Benchmark binary, e.g. `iperf3`
    pub command: String,
    pub port: u16,
    /// Extra arguments appended verbatim. Must daemonize the server
    /// (`-D` for iperf3) or the start command never returns.
    #[serde(default = "default_server_options")]
    pub options: String,
}

fn default_server_options() -> String {
    "-D".to_string()
}

/// Client side of an environment test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRole {
    /// Pod running the client
    pub workload: String,
    pub namespace: String,
    pub command: String,
    pub port: u16,
    /// Test length
    #[serde(with = "secs", default = "default_test_duration")]
    pub duration: Duration,
    /// Parallel streams
    #[serde(default = "default_parallel")]
    pub parallel: u32,
    #[serde(default)]
    pub options: String,
    /// Server address; empty means the server pod's IP
    #[serde(default)]
    pub server_address: String,
}

fn default_test_duration() -> Duration {
    Duration::from_secs(30)
}

fn default_parallel() -> u32 {
    1
}

/// Client/server throughput test between two workloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvTestSpec {
    pub server: ServerRole,
    pub client: ClientRole,
}

/// Declarative tuning action
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MutationSpec {
    /// Ring buffer targets, applied in order
    #[serde(default)]
    pub ring_buffers: Vec<RingBufferSpec>,
    #[serde(default)]
    pub profile: Option<ProfileSpec>,
    #[serde(default)]
    pub env_test: Option<EnvTestSpec>,
}

/// Reboot confirmation budget
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RebootPolicy {
    /// Wait after issuing the reboot before the first poll
    #[serde(with = "secs", default = "default_settle")]
    pub settle: Duration,
    /// Wait before each poll
    #[serde(with = "secs", default = "default_poll_interval")]
    pub poll_interval: Duration,
    /// Polls before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_settle() -> Duration {
    Duration::from_secs(30)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_max_attempts() -> u32 {
    30
}

impl Default for RebootPolicy {
    fn default() -> Self {
        Self {
            settle: default_settle(),
            poll_interval: default_poll_interval(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// Settings for `ActionExecutor`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorSettings {
    /// Prefix every command with `sudo`
    #[serde(default)]
    pub use_sudo: bool,
    #[serde(default)]
    pub reboot: RebootPolicy,
    /// Delay between starting the env-test server and the client
    #[serde(with = "secs", default = "default_client_delay")]
    pub client_delay: Duration,
    /// Classification of `ethtool -G` exit codes
    #[serde(default)]
    pub ring_buffer_codes: ExitCodeTable,
}

fn default_client_delay() -> Duration {
    Duration::from_secs(5)
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            use_sudo: false,
            reboot: RebootPolicy::default(),
            client_delay: default_client_delay(),
            ring_buffer_codes: ExitCodeTable::default(),
        }
    }
}

/// Serde adapter for `Duration` as (fractional) seconds
pub mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executor_defaults() {
        let settings: ExecutorSettings = toml::from_str("").unwrap();
        assert!(!settings.use_sudo);
        assert_eq!(settings.reboot.max_attempts, 30);
        assert_eq!(settings.reboot.poll_interval, Duration::from_secs(10));
        assert_eq!(settings.client_delay, Duration::from_secs(5));
    }

    #[test]
    fn test_fractional_seconds() {
        let policy: RebootPolicy = toml::from_str(
            r#"
            settle = 0.5
            poll_interval = 2
            max_attempts = 5
            "#,
        )
        .unwrap();
        assert_eq!(policy.settle, Duration::from_millis(500));
        assert_eq!(policy.poll_interval, Duration::from_secs(2));
    }

    #[test]
    fn test_negative_duration_rejected() {
        let result: Result<RebootPolicy, _> = toml::from_str("settle = -1.0");
        assert!(result.is_err());
    }

    #[test]
    fn test_server_daemonizes_by_default() {
        let server: ServerRole = toml::from_str(
            r#"
            workload = "iperf-server"
            namespace = "perf"
            command = "iperf3"
            port = 5201
            "#,
        )
        .unwrap();
        assert_eq!(server.options, "-D");
    }

    #[test]
    fn test_mutation_spec_parse() {
        let spec: MutationSpec = toml::from_str(
            r#"
            [[ring_buffers]]
            adapter = "ens1f0"
            rx = 4096
            tx = 4096

            [profile]
            name = "network-latency"
            path = "/usr/lib/tuned/network-latency"

            [env_test.server]
            workload = "iperf-server"
            namespace = "perf"
            command = "iperf3"
            port = 5201
            options = "-D"

            [env_test.client]
            workload = "iperf-client"
            namespace = "perf"
            command = "iperf3"
            port = 5201
            duration = 60
            parallel = 4
            "#,
        )
        .unwrap();

        assert_eq!(spec.ring_buffers.len(), 1);
        assert_eq!(spec.profile.unwrap().name, "network-latency");
        let env = spec.env_test.unwrap();
        assert_eq!(env.client.duration, Duration::from_secs(60));
        assert!(env.client.server_address.is_empty());
    }
}
