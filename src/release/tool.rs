//! External packaging tool
//!
//! Packaging (building tarballs, finalizing them into the index) is delegated
//! to an opaque executable with a fixed argument shape. [`ReleaseTool`] is the
//! seam; [`BoshCli`] drives the real binary.

use crate::core::error::{ReleaseResult, ToolError};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};

/// Operations release-rail needs from the packaging tool
pub trait ReleaseTool {
  /// Promote a tarball to a final release named `name` at `version`
  ///
  /// Writes `releases/<name>/<name>-<version>.yml` and updates the index.
  fn finalize_release(&self, repo: &Path, name: &str, version: &str, tarball: &Path) -> ReleaseResult<()>;

  /// Build the tarball of an already finalized release from its manifest
  fn create_release(&self, repo: &Path, manifest: &Path, tarball: &Path) -> ReleaseResult<()>;

  /// Build a tarball from the working tree as it is, optionally forcing the version
  fn create_dev_release(&self, repo: &Path, version: Option<&str>, tarball: &Path) -> ReleaseResult<()>;

  /// Tool version for reporting; `unknown` when it cannot be determined
  fn version(&self) -> String;
}

/// The `bosh` CLI (or anything accepting the same arguments)
#[derive(Debug, Clone)]
pub struct BoshCli {
  program: String,
}

impl Default for BoshCli {
  fn default() -> Self {
    Self::new("bosh")
  }
}

impl BoshCli {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
    }
  }

  /// Run the tool in `dir`, streaming its output to stderr as it is written
  ///
  /// stdout belongs to release-rail's own results, so the tool's stdout is
  /// redirected to stderr. The tool's stderr is also kept for the error.
  fn run(&self, dir: &Path, args: &[String]) -> ReleaseResult<()> {
    tracing::info!(tool = %self.program, cwd = %dir.display(), "{}", args.join(" "));

    let mut child = Command::new(&self.program)
      .args(args)
      .current_dir(dir)
      .stdin(Stdio::null())
      .stdout(std::io::stderr())
      .stderr(Stdio::piped())
      .spawn()
      .map_err(|e| ToolError::Spawn {
        tool: self.program.clone(),
        reason: e.to_string(),
      })?;

    let captured = match child.stderr.take() {
      Some(pipe) => tee_lines(pipe, std::io::stderr()),
      None => Ok(Vec::new()),
    };
    let status = child.wait()?;
    let captured = captured?;

    if !status.success() {
      return Err(
        ToolError::Failed {
          tool: self.program.clone(),
          args: args.to_vec(),
          status: status.code(),
          stderr: String::from_utf8_lossy(&captured).to_string(),
        }
        .into(),
      );
    }

    Ok(())
  }
}

/// Copy `source` to `sink` line by line and return everything read
///
/// A failing sink is logged once and then skipped; reading continues so the
/// tool never blocks on a full pipe.
fn tee_lines(source: impl Read, mut sink: impl Write) -> std::io::Result<Vec<u8>> {
  let mut reader = BufReader::new(source);
  let mut captured = Vec::new();
  let mut line = Vec::new();
  let mut forwarding = true;

  while reader.read_until(b'\n', &mut line)? > 0 {
    if forwarding && let Err(e) = sink.write_all(&line).and_then(|_| sink.flush()) {
      tracing::warn!(error = %e, "could not forward packaging tool output");
      forwarding = false;
    }
    captured.append(&mut line);
  }

  Ok(captured)
}

fn path_arg(path: &Path) -> String {
  path.to_string_lossy().to_string()
}

impl ReleaseTool for BoshCli {
  fn finalize_release(&self, repo: &Path, name: &str, version: &str, tarball: &Path) -> ReleaseResult<()> {
    let args = vec![
      "finalize-release".to_string(),
      "--name".to_string(),
      name.to_string(),
      "--version".to_string(),
      version.to_string(),
      path_arg(tarball),
    ];
    self.run(repo, &args)
  }

  fn create_release(&self, repo: &Path, manifest: &Path, tarball: &Path) -> ReleaseResult<()> {
    let args = vec![
      "create-release".to_string(),
      "--tarball".to_string(),
      path_arg(tarball),
      path_arg(manifest),
    ];
    self.run(repo, &args)
  }

  fn create_dev_release(&self, repo: &Path, version: Option<&str>, tarball: &Path) -> ReleaseResult<()> {
    let mut args = vec![
      "create-release".to_string(),
      "--force".to_string(),
      "--tarball".to_string(),
      path_arg(tarball),
    ];
    if let Some(version) = version {
      args.extend(["--version".to_string(), version.to_string()]);
    }
    self.run(repo, &args)
  }

  fn version(&self) -> String {
    let output = Command::new(&self.program)
      .arg("--version")
      .stdin(Stdio::null())
      .stderr(Stdio::null())
      .output();

    match output {
      Ok(out) if out.status.success() => parse_version_output(&String::from_utf8_lossy(&out.stdout)),
      _ => "unknown".to_string(),
    }
  }
}

/// First line of `--version` output without the `version ` prefix
fn parse_version_output(stdout: &str) -> String {
  let line = stdout.trim_start().lines().next().unwrap_or("").trim();
  let line = line.strip_prefix("version ").unwrap_or(line);
  if line.is_empty() { "unknown".to_string() } else { line.to_string() }
}
