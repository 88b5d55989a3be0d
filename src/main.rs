mod commands;
mod core;
mod release;

use clap::{Args, Parser, Subcommand};
use commands::publish::{PublishRequest, TarballSource, anchor_pattern};
use core::config::{RailConfig, SourceConfig};
use core::error::{ConfigError, ReleaseError, print_error};
use std::path::PathBuf;

/// Resolve and publish release versions from a git-hosted release repository
#[derive(Parser)]
#[command(name = "release-rail")]
#[command(version, about, long_about = None)]
#[command(styles = get_styles())]
struct Cli {
  #[command(subcommand)]
  command: Commands,

  /// Path to release-rail.toml (searched in the current directory by default)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  /// Log level used when RELEASE_RAIL_LOG is unset
  #[arg(long, global = true, default_value = "info")]
  log_level: String,

  /// Output results in JSON format
  #[arg(long, global = true)]
  json: bool,

  #[command(flatten)]
  source: SourceArgs,
}

/// Overrides for the `[source]` table
#[derive(Args)]
struct SourceArgs {
  /// Remote URL of the release repository
  #[arg(long, global = true)]
  repository: Option<String>,

  /// Branch to track
  #[arg(long, global = true)]
  branch: Option<String>,

  /// Release name (default: read from config/final.yml)
  #[arg(long, global = true)]
  name: Option<String>,

  /// Work with dev versions synthesized from commits
  #[arg(long, global = true)]
  dev_releases: bool,

  /// Root directory for cached working copies
  #[arg(long, global = true)]
  cache_dir: Option<PathBuf>,
}

impl SourceArgs {
  fn apply(self, source: &mut SourceConfig) {
    if self.repository.is_some() {
      source.repository = self.repository;
    }
    if self.branch.is_some() {
      source.branch = self.branch;
    }
    if self.name.is_some() {
      source.name = self.name;
    }
    if self.cache_dir.is_some() {
      source.cache_dir = self.cache_dir;
    }
    source.dev_releases |= self.dev_releases;
  }
}

#[derive(Subcommand)]
enum Commands {
  /// List the latest version, or every version newer than a prior one
  Check {
    /// Prior version; only newer versions are listed
    #[arg(long)]
    prior: Option<String>,
    /// Also list the prior version while it is still in the index
    #[arg(long)]
    include_prior: bool,
    /// Only consider final versions matching this constraint
    #[arg(long)]
    constraint: Option<String>,
  },

  /// Build the tarball of one version
  Fetch {
    /// Version to fetch
    version: String,
    /// Directory the tarball is written to
    #[arg(short, long, default_value = ".")]
    destination: PathBuf,
    /// Resolve the version without building a tarball
    #[arg(long)]
    skip_tarball: bool,
  },

  /// Finalize a tarball, commit it to the index, push, and tag
  Publish {
    /// Glob of the file holding the version to publish
    #[arg(long)]
    version_file: String,
    /// Glob of the tarball to finalize
    #[arg(long, required_unless_present = "from_repository", conflicts_with = "from_repository")]
    tarball: Option<String>,
    /// Build the tarball from this release directory instead
    #[arg(long)]
    from_repository: Option<PathBuf>,
    /// Glob of the file holding the commit message (default: "Version <version>")
    #[arg(long)]
    commit_file: Option<String>,
    /// Directory relative globs are resolved against
    #[arg(long, default_value = ".")]
    source_dir: PathBuf,
    /// Rebase and retry when the push is rejected
    #[arg(long)]
    rebase: bool,
    /// Do not create the v<version> tag
    #[arg(long)]
    skip_tag: bool,
  },
}

fn get_styles() -> clap::builder::Styles {
  clap::builder::Styles::styled()
    .usage(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .header(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .literal(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))))
    .invalid(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .error(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .valid(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
    )
    .placeholder(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::White))))
}

fn main() {
  let cli = Cli::parse();

  if let Err(e) = core::logging::init(&cli.log_level) {
    eprintln!("Warning: {}", e);
  }

  let cwd = match std::env::current_dir() {
    Ok(dir) => dir,
    Err(e) => {
      eprintln!("Error: Failed to get current directory: {}", e);
      std::process::exit(1);
    }
  };

  let mut config = match RailConfig::load(cli.config.as_deref(), &cwd) {
    Ok(config) => config,
    Err(e) => handle_error(e),
  };
  cli.source.apply(&mut config.source);

  let json = cli.json;
  let result = match cli.command {
    Commands::Check {
      prior,
      include_prior,
      constraint,
    } => {
      config.source.include_prior |= include_prior;
      if constraint.is_some() {
        config.source.version = constraint;
      }
      commands::run_check(&config.source, prior.as_deref(), json)
    }
    Commands::Fetch {
      version,
      destination,
      skip_tarball,
    } => commands::run_fetch(&config, &version, &destination, skip_tarball, json),
    Commands::Publish {
      version_file,
      tarball,
      from_repository,
      commit_file,
      source_dir,
      rebase,
      skip_tag,
    } => {
      config.publish.rebase |= rebase;
      config.publish.skip_tag |= skip_tag;

      let tarball = match (tarball, from_repository) {
        (_, Some(dir)) => TarballSource::Repository(dir),
        (Some(pattern), None) => TarballSource::Glob(anchor_pattern(&source_dir, &pattern)),
        (None, None) => handle_error(ReleaseError::Config(ConfigError::MissingField {
          field: "tarball".to_string(),
        })),
      };
      let request = PublishRequest {
        version_file: anchor_pattern(&source_dir, &version_file),
        commit_file: commit_file.map(|pattern| anchor_pattern(&source_dir, &pattern)),
        tarball,
      };
      commands::run_publish(&config, &request, json)
    }
  };

  if let Err(e) = result {
    handle_error(e);
  }
}

fn handle_error(err: ReleaseError) -> ! {
  print_error(&err);
  std::process::exit(err.exit_code().as_i32());
}
