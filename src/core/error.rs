//! Error types for release-rail with contextual messages and exit codes
//!
//! Every fatal error names the stage that failed ("pulling", "parsing index",
//! "finalizing release") while keeping the underlying cause reachable through
//! [`std::error::Error::source`]. Errors also carry a help message where one
//! is useful to an operator.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Exit codes for release-rail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
  /// User error (config, invalid args, missing files)
  User = 1,
  /// System error (git, network, I/O, packaging tool)
  System = 2,
  /// Corrupt repository state (unparsable index or manifest)
  Validation = 3,
}

impl ExitCode {
  /// Convert to i32 for process exit
  pub fn as_i32(self) -> i32 {
    self as i32
  }
}

/// Main error type for release-rail
#[derive(Debug)]
pub enum ReleaseError {
  /// Configuration errors
  Config(ConfigError),

  /// Git operation errors
  Git(GitError),

  /// Version index / manifest errors
  Index(IndexError),

  /// External packaging tool errors
  Tool(ToolError),

  /// I/O errors
  Io(io::Error),

  /// A failure annotated with the stage it happened in
  Context {
    stage: String,
    source: Box<ReleaseError>,
  },

  /// Generic error with message and optional help
  Message { message: String, help: Option<String> },
}

impl ReleaseError {
  /// Create a simple error message
  pub fn message(msg: impl Into<String>) -> Self {
    ReleaseError::Message {
      message: msg.into(),
      help: None,
    }
  }

  /// Create an error with help text
  pub fn with_help(msg: impl Into<String>, help: impl Into<String>) -> Self {
    ReleaseError::Message {
      message: msg.into(),
      help: Some(help.into()),
    }
  }

  /// Annotate this error with the stage that produced it
  pub fn context(self, stage: impl Into<String>) -> Self {
    ReleaseError::Context {
      stage: stage.into(),
      source: Box::new(self),
    }
  }

  /// The innermost error, skipping any stage annotations
  pub fn root(&self) -> &ReleaseError {
    match self {
      ReleaseError::Context { source, .. } => source.root(),
      other => other,
    }
  }

  /// The git error at the root of this error, if any
  pub fn git(&self) -> Option<&GitError> {
    match self.root() {
      ReleaseError::Git(e) => Some(e),
      _ => None,
    }
  }

  /// Get the appropriate exit code for this error
  pub fn exit_code(&self) -> ExitCode {
    match self.root() {
      ReleaseError::Config(_) => ExitCode::User,
      ReleaseError::Git(_) => ExitCode::System,
      ReleaseError::Index(_) => ExitCode::Validation,
      ReleaseError::Tool(_) => ExitCode::System,
      ReleaseError::Io(_) => ExitCode::System,
      ReleaseError::Message { .. } => ExitCode::User,
      ReleaseError::Context { .. } => ExitCode::System,
    }
  }

  /// Get contextual help message for this error
  pub fn help_message(&self) -> Option<String> {
    match self.root() {
      ReleaseError::Config(e) => e.help_message(),
      ReleaseError::Git(e) => e.help_message(),
      ReleaseError::Message { help, .. } => help.clone(),
      _ => None,
    }
  }
}

impl fmt::Display for ReleaseError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ReleaseError::Config(e) => write!(f, "{}", e),
      ReleaseError::Git(e) => write!(f, "{}", e),
      ReleaseError::Index(e) => write!(f, "{}", e),
      ReleaseError::Tool(e) => write!(f, "{}", e),
      ReleaseError::Io(e) => write!(f, "I/O error: {}", e),
      ReleaseError::Context { stage, source } => write!(f, "{}: {}", stage, source),
      ReleaseError::Message { message, .. } => write!(f, "{}", message),
    }
  }
}

impl std::error::Error for ReleaseError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      ReleaseError::Io(e) => Some(e),
      ReleaseError::Context { source, .. } => Some(source.as_ref()),
      _ => None,
    }
  }
}

impl From<io::Error> for ReleaseError {
  fn from(err: io::Error) -> Self {
    ReleaseError::Io(err)
  }
}

impl From<String> for ReleaseError {
  fn from(msg: String) -> Self {
    ReleaseError::message(msg)
  }
}

impl From<&str> for ReleaseError {
  fn from(msg: &str) -> Self {
    ReleaseError::message(msg)
  }
}

impl From<ConfigError> for ReleaseError {
  fn from(err: ConfigError) -> Self {
    ReleaseError::Config(err)
  }
}

impl From<GitError> for ReleaseError {
  fn from(err: GitError) -> Self {
    ReleaseError::Git(err)
  }
}

impl From<IndexError> for ReleaseError {
  fn from(err: IndexError) -> Self {
    ReleaseError::Index(err)
  }
}

impl From<ToolError> for ReleaseError {
  fn from(err: ToolError) -> Self {
    ReleaseError::Tool(err)
  }
}

impl From<toml_edit::de::Error> for ReleaseError {
  fn from(err: toml_edit::de::Error) -> Self {
    ReleaseError::Config(ConfigError::Parse {
      message: err.to_string(),
    })
  }
}

impl From<serde_json::Error> for ReleaseError {
  fn from(err: serde_json::Error) -> Self {
    ReleaseError::message(format!("JSON error: {}", err))
  }
}

impl From<serde_yaml::Error> for ReleaseError {
  fn from(err: serde_yaml::Error) -> Self {
    ReleaseError::message(format!("YAML error: {}", err))
  }
}

impl From<glob::PatternError> for ReleaseError {
  fn from(err: glob::PatternError) -> Self {
    ReleaseError::Config(ConfigError::Invalid {
      field: "path pattern".to_string(),
      reason: err.to_string(),
    })
  }
}

impl From<std::string::FromUtf8Error> for ReleaseError {
  fn from(err: std::string::FromUtf8Error) -> Self {
    ReleaseError::message(format!("UTF-8 conversion error: {}", err))
  }
}

/// Configuration-related errors
#[derive(Debug)]
pub enum ConfigError {
  /// Config file could not be parsed
  Parse { message: String },

  /// Missing required field
  MissingField { field: String },

  /// Field present but unusable (bad constraint, bad glob, ...)
  Invalid { field: String, reason: String },
}

impl ConfigError {
  fn help_message(&self) -> Option<String> {
    match self {
      ConfigError::MissingField { field } => Some(format!(
        "Set `{}` in release-rail.toml or pass it on the command line.",
        field
      )),
      ConfigError::Invalid { field, .. } if field == "version" => {
        Some("Version constraints look like \">=1.0.0, <2.0.0\" or \"1.x\".".to_string())
      }
      _ => None,
    }
  }
}

impl fmt::Display for ConfigError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ConfigError::Parse { message } => write!(f, "Failed to parse configuration: {}", message),
      ConfigError::MissingField { field } => write!(f, "Missing required field in config: {}", field),
      ConfigError::Invalid { field, reason } => write!(f, "Invalid value for '{}': {}", field, reason),
    }
  }
}

/// Git operation errors
#[derive(Debug)]
pub enum GitError {
  /// Git command failed
  CommandFailed { command: String, stderr: String },

  /// Git (or a helper such as ssh-agent) could not be started
  Spawn { command: String, reason: String },

  /// The path does not exist at the given revision
  PathNotFound { revision: String, path: String },

  /// The revision itself does not resolve to a commit
  RevisionNotFound { revision: String },

  /// Local and remote histories diverged; a fast-forward pull is impossible
  NotFastForward { remote: String, branch: String, stderr: String },

  /// Push rejected by the remote
  PushRejected { remote: String, refspec: String, stderr: String },

  /// Push still rejected after every rebase retry
  RetriesExhausted { attempts: u32, last: Box<GitError> },

  /// Output from git could not be understood
  UnexpectedOutput { command: String, output: String },
}

impl GitError {
  /// True when a historical read missed because the file is absent at that revision
  pub fn is_path_not_found(&self) -> bool {
    matches!(self, GitError::PathNotFound { .. })
  }

  fn help_message(&self) -> Option<String> {
    match self {
      GitError::NotFastForward { .. } => Some(
        "The cached working copy diverged from the remote. Remove it from the cache directory and re-run.".to_string(),
      ),
      GitError::PushRejected { stderr, .. } | GitError::CommandFailed { stderr, .. }
        if stderr.contains("Permission denied") || stderr.contains("403") =>
      {
        Some("Check the configured private key and its access to the remote.".to_string())
      }
      GitError::RetriesExhausted { .. } => {
        Some("The branch is under heavy contention. Re-run the publish once other publishers finish.".to_string())
      }
      _ => None,
    }
  }
}

impl fmt::Display for GitError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      GitError::CommandFailed { command, stderr } => {
        write!(f, "Git command failed: {}\n{}", command, stderr.trim_end())
      }
      GitError::Spawn { command, reason } => write!(f, "Failed to run {}: {}", command, reason),
      GitError::PathNotFound { revision, path } => {
        write!(f, "Path '{}' does not exist at revision {}", path, revision)
      }
      GitError::RevisionNotFound { revision } => write!(f, "Revision not found: {}", revision),
      GitError::NotFastForward { remote, branch, stderr } => write!(
        f,
        "Cannot fast-forward {} {}: local history diverged\n{}",
        remote,
        branch,
        stderr.trim_end()
      ),
      GitError::PushRejected { remote, refspec, stderr } => {
        write!(f, "Push of {} to {} rejected\n{}", refspec, remote, stderr.trim_end())
      }
      GitError::RetriesExhausted { attempts, last } => {
        write!(f, "Push still rejected after {} rebase attempts: {}", attempts, last)
      }
      GitError::UnexpectedOutput { command, output } => {
        write!(f, "Unexpected output from {}: {}", command, output)
      }
    }
  }
}

/// Version index and release manifest errors
#[derive(Debug)]
pub enum IndexError {
  /// The document is not valid YAML of the expected shape
  Malformed { what: String, reason: String },

  /// An index entry holds a string that is not a semantic version
  BadVersion { raw: String, reason: String },

  /// The index has no builds at all
  Empty,

  /// Manifest has no commit_hash
  MissingCommitHash { path: PathBuf },
}

impl fmt::Display for IndexError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      IndexError::Malformed { what, reason } => write!(f, "Malformed {}: {}", what, reason),
      IndexError::BadVersion { raw, reason } => write!(f, "Invalid version '{}': {}", raw, reason),
      IndexError::Empty => write!(f, "Version index contains no builds"),
      IndexError::MissingCommitHash { path } => {
        write!(f, "Release manifest {} has no commit_hash", path.display())
      }
    }
  }
}

/// External packaging tool errors
#[derive(Debug)]
pub enum ToolError {
  /// The tool could not be started at all
  Spawn { tool: String, reason: String },

  /// The tool ran and exited unsuccessfully
  Failed {
    tool: String,
    args: Vec<String>,
    status: Option<i32>,
    stderr: String,
  },
}

impl fmt::Display for ToolError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ToolError::Spawn { tool, reason } => write!(f, "Failed to run {}: {}", tool, reason),
      ToolError::Failed {
        tool,
        args,
        status,
        stderr,
      } => {
        let status = status.map(|s| s.to_string()).unwrap_or_else(|| "signal".to_string());
        write!(f, "{} {} exited with {}", tool, args.join(" "), status)?;
        if !stderr.trim().is_empty() {
          write!(f, "\n{}", stderr.trim_end())?;
        }
        Ok(())
      }
    }
  }
}

/// Result type alias for release-rail
pub type ReleaseResult<T> = Result<T, ReleaseError>;

/// Helper trait to add context to Results
pub trait ResultExt<T> {
  /// Add context to an error result
  fn context(self, stage: impl Into<String>) -> ReleaseResult<T>;

  /// Add context using a closure (lazy evaluation)
  fn with_context<F>(self, f: F) -> ReleaseResult<T>
  where
    F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
  E: Into<ReleaseError>,
{
  fn context(self, stage: impl Into<String>) -> ReleaseResult<T> {
    self.map_err(|e| e.into().context(stage))
  }

  fn with_context<F>(self, f: F) -> ReleaseResult<T>
  where
    F: FnOnce() -> String,
  {
    self.map_err(|e| e.into().context(f()))
  }
}

/// Print an error to stderr with help text
pub fn print_error(error: &ReleaseError) {
  let executable = std::env::current_exe()
    .ok()
    .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
    .unwrap_or_else(|| "release-rail".to_string());

  eprintln!("{}: {}", executable, error);

  if let Some(help) = error.help_message() {
    eprintln!("help: {}", help);
  }
}
