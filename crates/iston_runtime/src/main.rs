//! Iston Launcher Runtime
//!
//! Minimal binary that embeds the script runtime and hands the process over
//! to `lib/iston.js`

use std::ffi::OsString;
use std::process::ExitCode;
use std::str::FromStr;

use anyhow::Result;
use iston_core::{BootstrapError, LaunchSettings};
use iston_script::QuickJsHost;
use tracing::Level;

/// Log level override, e.g. `ISTON_LOG=debug`.
const LOG_ENV: &str = "ISTON_LOG";

fn main() -> Result<ExitCode> {
    // Logs go to stderr; stdout belongs to the script
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(log_level(std::env::var(LOG_ENV).ok().as_deref()))
        .with_target(false)
        .init();

    tracing::debug!("Iston launcher v{}", iston_core::VERSION);

    let settings = LaunchSettings::default();
    let host = QuickJsHost::new(settings.limits.clone());
    let host_args: Vec<OsString> = std::env::args_os().collect();

    match iston_core::launch(&host, &settings, &host_args) {
        Ok(status) => Ok(status.into()),
        Err(BootstrapError::Allocation(err)) => {
            tracing::error!(%err, "fatal allocation failure, aborting");
            std::process::abort()
        }
        Err(err) => Err(err.into()),
    }
}

fn log_level(value: Option<&str>) -> Level {
    value
        .and_then(|value| Level::from_str(value.trim()).ok())
        .unwrap_or(Level::INFO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_defaults_to_info() {
        assert_eq!(log_level(None), Level::INFO);
        assert_eq!(log_level(Some("chatty")), Level::INFO);
    }

    #[test]
    fn log_level_reads_override() {
        assert_eq!(log_level(Some("debug")), Level::DEBUG);
        assert_eq!(log_level(Some(" WARN ")), Level::WARN);
    }
}
