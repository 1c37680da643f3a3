//! Builds executors and inventory sources from configuration

use std::sync::Arc;

use eyre::{Result, WrapErr};
use tracing::info;

use tunebench_exec::{
    LocalExecutor, RemoteExecutor, SshExecutor, SshExecutorBuilder, read_public_key,
};
use tunebench_inventory::{GovcSource, KubectlSource, VirtSession};

use crate::config::{ClusterConfig, SshConfig};

/// Where `kubectl` runs
pub const LOCAL_TARGET: &str = "localhost";

/// SSH executor for node-level commands
///
/// # Errors
/// Returns error if neither a key nor a password is configured, or the key
/// is unusable.
pub fn ssh_executor(config: &SshConfig) -> Result<SshExecutor> {
    let mut builder = SshExecutorBuilder::new(&config.user)
        .with_port(config.port)
        .with_connect_timeout(config.connect_timeout);
    if let Some(path) = &config.key_path {
        builder = builder.with_key_path(path);
    }
    if let Some(password) = &config.password {
        builder = builder.with_password(password);
    }
    builder.build().wrap_err("failed to create SSH executor")
}

/// Install the bootstrap public key on every target, if one is configured
///
/// # Errors
/// Returns error on the first target that cannot be prepared.
pub async fn bootstrap_keys(
    executor: &SshExecutor,
    config: &SshConfig,
    targets: &[String],
) -> Result<()> {
    let Some(path) = &config.bootstrap_public_key else {
        return Ok(());
    };
    let public_key = read_public_key(path)?;
    for target in targets {
        executor
            .ensure_authorized_key(target, &public_key)
            .await
            .wrap_err_with(|| format!("key bootstrap on {target}"))?;
    }
    info!(count = targets.len(), "public key bootstrapped");
    Ok(())
}

/// Executor for commands run on this machine
pub fn local_executor() -> Arc<dyn RemoteExecutor> {
    Arc::new(LocalExecutor::new())
}

/// Orchestrator source running `kubectl` locally
pub fn cluster_source(config: &ClusterConfig) -> KubectlSource {
    let source = KubectlSource::new(local_executor(), LOCAL_TARGET).with_binary(&config.kubectl);
    match &config.kubeconfig {
        Some(path) => source.with_kubeconfig(path),
        None => source,
    }
}

/// Virtualization source for a configured session
///
/// # Errors
/// Returns error if no `[vcenter]` section is configured or the endpoint
/// rejects the session.
pub async fn virt_source(session: Option<&VirtSession>) -> Result<GovcSource> {
    let session = session.ok_or_else(|| eyre::eyre!("no [vcenter] section configured"))?;
    GovcSource::connect(session)
        .await
        .wrap_err_with(|| format!("connecting to {}", session.endpoint))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssh_executor_needs_secret() {
        assert!(ssh_executor(&SshConfig::default()).is_err());
    }

    #[test]
    fn test_ssh_executor_with_password() {
        let config = SshConfig {
            password: Some("secret".to_string()),
            ..SshConfig::default()
        };
        let executor = ssh_executor(&config).unwrap();
        assert_eq!(executor.credentials().user, "core");
    }

    #[tokio::test]
    async fn test_bootstrap_noop_without_key() {
        let config = SshConfig {
            password: Some("secret".to_string()),
            ..SshConfig::default()
        };
        let executor = ssh_executor(&config).unwrap();
        bootstrap_keys(&executor, &config, &["10.1.0.20".to_string()])
            .await
            .unwrap();
        assert_eq!(executor.open_sessions().await, 0);
    }

    #[tokio::test]
    async fn test_virt_source_requires_session() {
        assert!(virt_source(None).await.is_err());
    }
}
