//! Diagnostic logging
//!
//! Logs go to stderr so stdout only ever carries command results. The filter
//! comes from `RELEASE_RAIL_LOG` when set, otherwise from `--log-level`.

use crate::core::error::{ReleaseError, ReleaseResult};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable holding an `EnvFilter` directive string
pub const LOG_ENV: &str = "RELEASE_RAIL_LOG";

/// Install the global subscriber writing to stderr
pub fn init(default_level: &str) -> ReleaseResult<()> {
  let from_env = std::env::var(LOG_ENV).ok();
  let filter = EnvFilter::try_new(directives(from_env.as_deref(), default_level))
    .or_else(|_| EnvFilter::try_new(default_level))
    .map_err(|e| ReleaseError::with_help(format!("Invalid log filter: {}", e), "Try --log-level info"))?;

  let layer = tracing_subscriber::fmt::layer()
    .with_writer(std::io::stderr)
    .with_target(false);
  #[cfg(debug_assertions)]
  let layer = layer.with_file(true).with_line_number(true);

  tracing_subscriber::registry()
    .with(filter)
    .with(layer)
    .try_init()
    .map_err(|e| ReleaseError::message(format!("Failed to initialize logging: {}", e)))
}

/// Directive string to use: the environment wins unless it is blank
fn directives(from_env: Option<&str>, default_level: &str) -> String {
  match from_env.map(str::trim) {
    Some(env) if !env.is_empty() => env.to_string(),
    _ => format!("warn,release_rail={}", default_level),
  }
}
