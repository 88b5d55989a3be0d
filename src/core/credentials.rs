//! Scoped SSH credentials for outbound git operations
//!
//! [`CredentialScope::with_credentials`] starts a private `ssh-agent`, loads
//! the configured key into it, runs exactly one operation with the agent's
//! environment, and tears everything down before returning. The agent process,
//! its socket, and the key file are owned by an [`AgentSession`] guard, so
//! they are released on every exit path including early `?` returns.
//!
//! Without key material the operation runs against the ambient environment.

use crate::core::error::{GitError, ReleaseError, ReleaseResult, ResultExt};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

/// Environment variables an operation must apply to its git subprocess
pub type AuthEnv = [(String, String)];

/// Optional private key plus the machinery to lend it to one operation at a time
#[derive(Clone, Default)]
pub struct CredentialScope {
  private_key: Option<String>,
  temp_root: Option<PathBuf>,
}

impl std::fmt::Debug for CredentialScope {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("CredentialScope")
      .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
      .field("temp_root", &self.temp_root)
      .finish()
  }
}

impl CredentialScope {
  pub fn new(private_key: Option<String>) -> Self {
    Self {
      private_key: private_key.filter(|k| !k.trim().is_empty()),
      temp_root: None,
    }
  }

  /// Scope that never touches the environment
  pub fn ambient() -> Self {
    Self::default()
  }

  /// Place agent sockets and key files under `root` instead of the system temp dir
  pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
    self.temp_root = Some(root.into());
    self
  }

  pub fn has_key(&self) -> bool {
    self.private_key.is_some()
  }

  /// Run `operation` with an agent holding the key, destroying both before returning
  pub fn with_credentials<T, F>(&self, operation: F) -> ReleaseResult<T>
  where
    F: FnOnce(&AuthEnv) -> ReleaseResult<T>,
  {
    let Some(key) = self.private_key.as_deref() else {
      return operation(&[]);
    };

    let session = AgentSession::start(key, self.temp_root.as_deref()).context("starting ssh-agent")?;
    let result = operation(session.env());
    drop(session);
    result
  }
}

/// A running ssh-agent plus the scratch directory holding its socket
struct AgentSession {
  env: Vec<(String, String)>,
  pid: u32,
  // Removed after Drop::drop has stopped the agent
  dir: TempDir,
}

impl AgentSession {
  fn start(key: &str, temp_root: Option<&Path>) -> ReleaseResult<Self> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("release-rail-agent-");
    let dir = match temp_root {
      Some(root) => builder.tempdir_in(root)?,
      None => builder.tempdir()?,
    };

    let socket = dir.path().join("agent.sock");
    let output = Command::new("ssh-agent")
      .arg("-s")
      .arg("-a")
      .arg(&socket)
      .stdin(Stdio::null())
      .output()
      .map_err(|e| GitError::Spawn {
        command: "ssh-agent".to_string(),
        reason: e.to_string(),
      })?;

    if !output.status.success() {
      return Err(ReleaseError::Git(GitError::CommandFailed {
        command: "ssh-agent -s".to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
      }));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let pid = agent_pid(&stdout)?;
    let env = vec![
      ("SSH_AUTH_SOCK".to_string(), socket.to_string_lossy().to_string()),
      ("SSH_AGENT_PID".to_string(), pid.to_string()),
    ];
    tracing::debug!(pid, "started ssh-agent");

    // From here on the guard owns the agent; any early return kills it
    let session = Self { env, pid, dir };
    session.add_key(key)?;
    Ok(session)
  }

  fn add_key(&self, key: &str) -> ReleaseResult<()> {
    // NamedTempFile is created 0600 and unlinked on drop
    let mut key_file = tempfile::Builder::new().prefix("id-").tempfile_in(self.dir.path())?;
    key_file.write_all(key.as_bytes())?;
    if !key.ends_with('\n') {
      key_file.write_all(b"\n")?;
    }
    key_file.flush()?;

    let output = Command::new("ssh-add")
      .arg(key_file.path())
      .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
      .env("SSH_ASKPASS", "false")
      .env("DISPLAY", "")
      .stdin(Stdio::null())
      .output()
      .map_err(|e| GitError::Spawn {
        command: "ssh-add".to_string(),
        reason: e.to_string(),
      })?;

    if !output.status.success() {
      return Err(ReleaseError::Git(GitError::CommandFailed {
        command: "ssh-add".to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
      }));
    }

    Ok(())
  }

  fn env(&self) -> &AuthEnv {
    &self.env
  }
}

impl Drop for AgentSession {
  fn drop(&mut self) {
    let pid = self.pid;
    let status = Command::new("ssh-agent")
      .arg("-k")
      .env("SSH_AGENT_PID", pid.to_string())
      .stdin(Stdio::null())
      .stdout(Stdio::null())
      .stderr(Stdio::null())
      .status();

    match status {
      Ok(s) if s.success() => tracing::debug!(pid, "stopped ssh-agent"),
      Ok(s) => tracing::warn!(pid, status = ?s.code(), "ssh-agent -k failed"),
      Err(e) => tracing::warn!(pid, error = %e, "could not run ssh-agent -k"),
    }
  }
}

/// Extract the agent pid from `ssh-agent -s` output
fn parse_agent_pid(output: &str) -> Option<u32> {
  output
    .split(';')
    .map(str::trim)
    .find_map(|part| part.strip_prefix("SSH_AGENT_PID="))
    .and_then(|pid| pid.trim().parse().ok())
}

/// The agent pid, or an error when `ssh-agent -s` did not report one
///
/// Without a pid the agent cannot be stopped, so no session is built for it.
fn agent_pid(output: &str) -> ReleaseResult<u32> {
  parse_agent_pid(output).ok_or_else(|| {
    tracing::warn!("ssh-agent started without reporting its pid");
    ReleaseError::Git(GitError::UnexpectedOutput {
      command: "ssh-agent -s".to_string(),
      output: output.to_string(),
    })
  })
}
