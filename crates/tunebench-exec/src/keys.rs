//! SSH key resolution and public-key bootstrap

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ExecError;
use crate::result::Credentials;

/// How an `SshExecutor` authenticates
#[derive(Debug, Clone)]
pub enum KeySource {
    /// Private key file
    Path(PathBuf),
    /// Password from the credential set
    Password(String),
}

impl KeySource {
    /// Pick the authentication method for a credential set.
    ///
    /// A key path wins over a password. The key file must not be readable by
    /// group or others.
    ///
    /// # Errors
    /// Returns `ExecError::SshKeyError` for a bad key file and
    /// `ExecError::ConfigError` when neither secret is configured.
    pub fn from_credentials(creds: &Credentials) -> Result<Self, ExecError> {
        if let Some(path) = &creds.key_path {
            validate_key_permissions(path)?;
            return Ok(KeySource::Path(path.clone()));
        }
        if let Some(password) = &creds.password {
            return Ok(KeySource::Password(password.clone()));
        }
        Err(ExecError::ConfigError(format!(
            "no key or password configured for user {}",
            creds.user
        )))
    }
}

fn validate_key_permissions(path: &Path) -> Result<(), ExecError> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::metadata(path)
        .map_err(|e| ExecError::SshKeyError(format!("{}: {e}", path.display())))?;

    // group/other bits must be clear
    if metadata.permissions().mode() & 0o77 != 0 {
        return Err(ExecError::SshKeyError(format!(
            "key file permissions too open: {} (should be 600)",
            path.display()
        )));
    }

    Ok(())
}

/// Read a local public key (e.g. `~/.ssh/id_ed25519.pub`).
///
/// # Errors
/// Returns `ExecError::SshKeyError` if the file is unreadable or empty.
pub fn read_public_key(path: &Path) -> Result<String, ExecError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ExecError::SshKeyError(format!("{}: {e}", path.display())))?;
    let key = content.trim();
    if key.is_empty() {
        return Err(ExecError::SshKeyError(format!(
            "public key file is empty: {}",
            path.display()
        )));
    }
    debug!(path = %path.display(), "read public key");
    Ok(key.to_string())
}

/// Shell command that appends `public_key` to `~/.ssh/authorized_keys`
/// unless an identical line is already present.
#[must_use]
pub fn authorized_key_command(public_key: &str) -> String {
    let quoted = shell_quote(public_key.trim());
    format!(
        "mkdir -p ~/.ssh && chmod 700 ~/.ssh && touch ~/.ssh/authorized_keys && \
         chmod 600 ~/.ssh/authorized_keys && \
         (grep -qxF {quoted} ~/.ssh/authorized_keys || echo {quoted} >> ~/.ssh/authorized_keys)"
    )
}

/// Single-quote a string for POSIX shells
#[must_use]
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\"'\"'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_fallback() {
        let creds = Credentials::new("core").with_password("secret");
        let source = KeySource::from_credentials(&creds).unwrap();
        assert!(matches!(source, KeySource::Password(ref p) if p == "secret"));
    }

    #[test]
    fn test_missing_secret_is_config_error() {
        let creds = Credentials::new("core");
        let err = KeySource::from_credentials(&creds).unwrap_err();
        assert!(matches!(err, ExecError::ConfigError(_)));
    }

    #[test]
    fn test_missing_key_file() {
        let creds = Credentials::new("core").with_key_path("/nonexistent/id_ed25519");
        let err = KeySource::from_credentials(&creds).unwrap_err();
        assert!(matches!(err, ExecError::SshKeyError(_)));
    }

    #[test]
    fn test_authorized_key_command_is_guarded() {
        let cmd = authorized_key_command("ssh-ed25519 AAAAC3Nz user@box\n");
        assert!(cmd.contains("grep -qxF 'ssh-ed25519 AAAAC3Nz user@box'"));
        assert!(cmd.contains("|| echo 'ssh-ed25519 AAAAC3Nz user@box' >>"));
    }

    #[test]
    fn test_shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("it's"), r#"'it'"'"'s'"#);
    }
}
