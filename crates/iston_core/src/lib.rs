//! Iston Launcher Core
//!
//! The runtime bootstrap: everything between the process entry point and the
//! embedded script runtime.
//! - Argument and environment vectors handed to the runtime
//! - The construct/parse/run/destruct capability interface
//! - The single-owner lifecycle session and its teardown guarantee
//! - Launch settings

pub mod args;
pub mod env;
pub mod error;
pub mod host;
pub mod session;
pub mod settings;

pub use args::ArgumentVector;
pub use env::EnvironmentVector;
pub use error::{AllocationFailure, BootstrapError, ParseFailure};
pub use host::{ExitStatus, Interpreter, ScriptHost};
pub use session::{launch, LifecycleState, Session};
pub use settings::{EngineLimits, LaunchSettings};

/// Launcher version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
