//! Command vocabulary for mutating actions
//!
//! Paths, namespaces, workload names and addresses are single-quoted.
//! The benchmark `command` and `options` fields are passed verbatim so
//! they can carry several arguments.

use std::time::Duration;

use tunebench_exec::shell_quote;

use crate::config::{ClientRole, RingBufferSpec, ServerRole};

const ACTIVE_PROFILE_PREFIX: &str = "Current active profile:";

/// Builds the exact command strings sent to targets
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandBuilder {
    sudo: bool,
}

impl CommandBuilder {
    #[must_use]
    pub fn new(sudo: bool) -> Self {
        Self { sudo }
    }

    fn wrap(self, cmd: String) -> String {
        if self.sudo {
            format!("sudo {cmd}")
        } else {
            cmd
        }
    }

    #[must_use]
    pub fn ring_buffers(self, spec: &RingBufferSpec) -> String {
        self.wrap(format!(
            "ethtool -G {} rx {} tx {}",
            spec.adapter, spec.rx, spec.tx
        ))
    }

    #[must_use]
    pub fn active_profile(self) -> String {
        self.wrap("tuned-adm active".to_string())
    }

    #[must_use]
    pub fn set_profile(self, name: &str) -> String {
        self.wrap(format!("tuned-adm profile {name}"))
    }

    #[must_use]
    pub fn path_exists(self, path: &str) -> String {
        self.wrap(format!("test -e {}", shell_quote(path)))
    }

    #[must_use]
    pub fn reboot(self) -> String {
        self.wrap("reboot".to_string())
    }

    /// Boot timestamp; changes only across a reboot
    #[must_use]
    pub fn boot_time(self) -> String {
        self.wrap("uptime -s".to_string())
    }

    #[must_use]
    pub fn env_server(self, role: &ServerRole) -> String {
        let cmd = format!(
            "kubectl exec -n {} {} -- {} -s -p {}",
            shell_quote(&role.namespace),
            shell_quote(&role.workload),
            role.command,
            role.port
        );
        self.wrap(with_options(cmd, &role.options))
    }

    #[must_use]
    pub fn env_client(self, role: &ClientRole, server_address: &str) -> String {
        let cmd = format!(
            "kubectl exec -n {} {} -- {} -c {} -p {} -t {} -P {}",
            shell_quote(&role.namespace),
            shell_quote(&role.workload),
            role.command,
            shell_quote(server_address),
            role.port,
            whole_seconds(role.duration),
            role.parallel
        );
        self.wrap(with_options(cmd, &role.options))
    }
}

/// Test length in whole seconds, rounded up; never 0, which iperf3
/// reads as unlimited
fn whole_seconds(duration: Duration) -> u64 {
    let secs = duration.as_secs() + u64::from(duration.subsec_nanos() > 0);
    secs.max(1)
}

fn with_options(cmd: String, options: &str) -> String {
    let options = options.trim();
    if options.is_empty() {
        cmd
    } else {
        format!("{cmd} {options}")
    }
}

/// Profile name from `tuned-adm active` output
#[must_use]
pub fn parse_active_profile(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .find_map(|line| line.trim().strip_prefix(ACTIVE_PROFILE_PREFIX))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_buffer_command() {
        let spec = RingBufferSpec {
            adapter: "ens1f0".to_string(),
            rx: 4096,
            tx: 2048,
        };
        assert_eq!(
            CommandBuilder::new(false).ring_buffers(&spec),
            "ethtool -G ens1f0 rx 4096 tx 2048"
        );
        assert_eq!(
            CommandBuilder::new(true).ring_buffers(&spec),
            "sudo ethtool -G ens1f0 rx 4096 tx 2048"
        );
    }

    #[test]
    fn test_env_commands() {
        let commands = CommandBuilder::default();
        let server = ServerRole {
            workload: "iperf-server".to_string(),
            namespace: "perf".to_string(),
            command: "iperf3".to_string(),
            port: 5201,
            options: String::new(),
        };
        assert_eq!(
            commands.env_server(&server),
            "kubectl exec -n 'perf' 'iperf-server' -- iperf3 -s -p 5201"
        );

        let client = ClientRole {
            workload: "iperf-client".to_string(),
            namespace: "perf".to_string(),
            command: "iperf3".to_string(),
            port: 5201,
            duration: Duration::from_secs(60),
            parallel: 4,
            options: "-u -b 10G".to_string(),
            server_address: String::new(),
        };
        assert_eq!(
            commands.env_client(&client, "10.128.2.14"),
            "kubectl exec -n 'perf' 'iperf-client' -- iperf3 -c '10.128.2.14' -p 5201 -t 60 -P 4 -u -b 10G"
        );
    }

    #[test]
    fn test_path_with_space_is_quoted() {
        assert_eq!(
            CommandBuilder::new(true).path_exists("/etc/tuned/low latency"),
            "sudo test -e '/etc/tuned/low latency'"
        );
        assert_eq!(
            CommandBuilder::default().path_exists("/tmp/x; reboot"),
            "test -e '/tmp/x; reboot'"
        );
    }

    #[test]
    fn test_fractional_duration_rounds_up() {
        assert_eq!(whole_seconds(Duration::from_millis(500)), 1);
        assert_eq!(whole_seconds(Duration::from_millis(2500)), 3);
        assert_eq!(whole_seconds(Duration::from_secs(60)), 60);
        assert_eq!(whole_seconds(Duration::ZERO), 1);
    }

    #[test]
    fn test_parse_active_profile() {
        assert_eq!(
            parse_active_profile("Current active profile: throughput-performance\n").as_deref(),
            Some("throughput-performance")
        );
        assert_eq!(parse_active_profile("No current active profile.\n"), None);
        assert_eq!(parse_active_profile("Current active profile: \n"), None);
    }
}
