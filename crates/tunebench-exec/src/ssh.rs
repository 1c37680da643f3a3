//! SSH command execution using russh crate

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use russh::keys::ssh_key;
use russh::keys::{PrivateKeyWithHashAlg, load_secret_key};
use russh::{ChannelMsg, Disconnect, client};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::error::ExecError;
use crate::keys::{KeySource, authorized_key_command};
use crate::result::{CommandResult, Credentials};
use crate::traits::RemoteExecutor;

/// SSH client handler for russh
#[derive(Debug)]
struct SshClientHandler;

impl client::Handler for SshClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        // Lab hosts are reinstalled often; host keys are not pinned
        Ok(true)
    }
}

type Session = client::Handle<SshClientHandler>;

/// SSH command executor
///
/// Holds one session per target, opened on first use. A session that fails
/// mid-command is dropped so the next call reconnects.
pub struct SshExecutor {
    /// Shared credential set
    creds: Credentials,
    /// Authentication method
    key: KeySource,
    /// Connect timeout
    connect_timeout: Duration,
    /// Open sessions by target address
    sessions: Mutex<HashMap<String, Session>>,
}

impl std::fmt::Debug for SshExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshExecutor")
            .field("user", &self.creds.user)
            .field("port", &self.creds.port)
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}

impl SshExecutor {
    /// Create a new SSH executor
    ///
    /// # Errors
    /// Returns an error if the credential set has no usable secret
    pub fn new(creds: Credentials, connect_timeout: Duration) -> Result<Self, ExecError> {
        let key = KeySource::from_credentials(&creds)?;

        Ok(Self {
            creds,
            key,
            connect_timeout,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    /// Credential set in use
    pub fn credentials(&self) -> &Credentials {
        &self.creds
    }

    /// Open and authenticate a fresh session
    #[instrument(skip(self, key))]
    async fn open_session(&self, target: &str, key: &KeySource) -> Result<Session, ExecError> {
        info!(
            target,
            port = self.creds.port,
            user = %self.creds.user,
            "connecting to SSH"
        );

        let config = Arc::new(client::Config::default());

        let connect = client::connect(config, (target, self.creds.port), SshClientHandler);
        let mut session = timeout(self.connect_timeout, connect)
            .await
            .map_err(|_| ExecError::Timeout {
                target: target.to_string(),
                timeout: self.connect_timeout,
            })?
            .map_err(|e| ExecError::ConnectionFailed {
                target: target.to_string(),
                reason: e.to_string(),
            })?;

        let auth_res = match key {
            KeySource::Path(key_path) => {
                let key_pair = load_secret_key(key_path, None)
                    .map_err(|e| ExecError::SshKeyError(e.to_string()))?;

                let hash_alg = session
                    .best_supported_rsa_hash()
                    .await
                    .ok()
                    .flatten()
                    .flatten();
                session
                    .authenticate_publickey(
                        &self.creds.user,
                        PrivateKeyWithHashAlg::new(Arc::new(key_pair), hash_alg),
                    )
                    .await
            }
            KeySource::Password(password) => {
                session
                    .authenticate_password(&self.creds.user, password)
                    .await
            }
        }
        .map_err(|e| ExecError::AuthenticationFailed(e.to_string()))?;

        if !auth_res.success() {
            return Err(ExecError::AuthenticationFailed(format!(
                "{}@{target} rejected",
                self.creds.user
            )));
        }

        info!(target, "SSH connected and authenticated");

        Ok(session)
    }

    /// Run a command over an established session
    async fn run_on_session(
        session: &mut Session,
        cmd: &str,
    ) -> Result<CommandResult, ExecError> {
        let start = Instant::now();

        let mut channel = session
            .channel_open_session()
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;

        channel
            .exec(true, cmd)
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;

        let mut status = None;
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        loop {
            match channel.wait().await {
                Some(ChannelMsg::Data { data }) => {
                    stdout.extend_from_slice(&data);
                }
                Some(ChannelMsg::ExtendedData { data, ext }) => {
                    if ext == 1 {
                        stderr.extend_from_slice(&data);
                    }
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    status = Some(exit_status.cast_signed());
                }
                Some(ChannelMsg::Eof) if status.is_some() => break,
                None => break,
                _ => {}
            }
        }

        // Channel closed without an exit status: the remote end went away
        let status = status.ok_or_else(|| {
            ExecError::IoError("channel closed without exit status".to_string())
        })?;

        Ok(CommandResult {
            status,
            stdout: String::from_utf8_lossy(&stdout).to_string(),
            stderr: String::from_utf8_lossy(&stderr).to_string(),
            duration: start.elapsed(),
        })
    }

    /// Append a public key to the target's `authorized_keys`.
    ///
    /// Uses password authentication on a throwaway session, so it works
    /// before the key is installed. Running it twice leaves a single entry.
    ///
    /// # Errors
    /// Returns an error if no password is configured, the connection fails,
    /// or the remote command exits non-zero.
    #[instrument(skip(self, public_key))]
    pub async fn ensure_authorized_key(
        &self,
        target: &str,
        public_key: &str,
    ) -> Result<(), ExecError> {
        let password = self.creds.password.clone().ok_or_else(|| {
            ExecError::ConfigError("key bootstrap requires a password".to_string())
        })?;

        let mut session = self
            .open_session(target, &KeySource::Password(password))
            .await?;
        let result = Self::run_on_session(&mut session, &authorized_key_command(public_key)).await;

        if let Err(e) = session
            .disconnect(Disconnect::ByApplication, "", "English")
            .await
        {
            debug!(target, error = %e, "bootstrap session disconnect failed");
        }

        let result = result?;
        if !result.success() {
            return Err(ExecError::AuthenticationFailed(format!(
                "authorized_keys update on {target} exited {}: {}",
                result.status,
                result.stderr.trim()
            )));
        }

        info!(target, "public key present in authorized_keys");
        Ok(())
    }

    /// Number of open sessions
    pub async fn open_sessions(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    #[instrument(skip(self))]
    async fn execute(&self, target: &str, cmd: &str) -> Result<CommandResult, ExecError> {
        let mut sessions = self.sessions.lock().await;

        if !sessions.contains_key(target) {
            let session = self.open_session(target, &self.key).await?;
            sessions.insert(target.to_string(), session);
        }

        let Some(session) = sessions.get_mut(target) else {
            return Err(ExecError::ConnectionFailed {
                target: target.to_string(),
                reason: "session vanished".to_string(),
            });
        };

        debug!(command = %cmd, "executing remote command");

        match Self::run_on_session(session, cmd).await {
            Ok(result) => {
                debug!(
                    command = %cmd,
                    status = result.status,
                    duration = ?result.duration,
                    "remote command completed"
                );
                Ok(result)
            }
            Err(e) => {
                warn!(command = %cmd, error = %e, "dropping broken session");
                sessions.remove(target);
                Err(e)
            }
        }
    }

    #[instrument(skip(self))]
    async fn release(&self, target: &str) -> Result<(), ExecError> {
        let session = self.sessions.lock().await.remove(target);

        if let Some(session) = session {
            session
                .disconnect(Disconnect::ByApplication, "", "English")
                .await
                .map_err(|e| ExecError::IoError(e.to_string()))?;
            info!(target, "SSH disconnected");
        }
        Ok(())
    }

    fn executor_type(&self) -> &'static str {
        "ssh"
    }
}

/// Builder for `SshExecutor`
pub struct SshExecutorBuilder {
    creds: Credentials,
    connect_timeout: Duration,
}

impl SshExecutorBuilder {
    /// Create builder with required fields
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            creds: Credentials::new(user),
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Set SSH key path
    #[must_use]
    pub fn with_key_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.creds.key_path = Some(path.into());
        self
    }

    /// Set password
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.creds.password = Some(password.into());
        self
    }

    /// Set custom port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.creds.port = port;
        self
    }

    /// Set connect timeout
    #[must_use]
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Build the executor
    ///
    /// # Errors
    /// Returns an error if the credential set has no usable secret
    pub fn build(self) -> Result<SshExecutor, ExecError> {
        SshExecutor::new(self.creds, self.connect_timeout)
    }
}
