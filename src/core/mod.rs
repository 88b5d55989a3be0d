//! Core engine for release-rail
//!
//! - **config**: release-rail.toml parsing and validation
//! - **credentials**: Scoped ssh-agent credentials for network git operations
//! - **error**: Error types with stage context, help messages, and exit codes
//! - **logging**: tracing subscriber setup
//! - **sync**: Working-copy synchronization (pull, commit with rebase retry, tag)
//! - **vcs**: Git operations abstraction (SystemGit)
//! - **workspace**: Repository identities and working-copy placement

pub mod config;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod sync;
pub mod vcs;
pub mod workspace;

#[cfg(test)]
pub(crate) mod testing;
