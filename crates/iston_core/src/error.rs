use std::collections::TryReserveError;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::host::ExitStatus;

/// The runtime or one of the bootstrap buffers could not be allocated.
///
/// Non-recoverable: nothing was acquired, so there is nothing to tear down.
#[derive(Debug, Error)]
pub enum AllocationFailure {
    #[error("could not reserve {requested} slots for the argument vector")]
    ArgumentVector {
        requested: usize,
        #[source]
        source: TryReserveError,
    },

    #[error("could not reserve the environment vector")]
    EnvironmentVector(#[source] TryReserveError),

    #[error("script runtime allocation failed: {0}")]
    Runtime(String),
}

/// Errors that stop the bootstrap before the runtime has been handed anything.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("host argument list is empty; expected at least the program name")]
    MissingProgramName,

    #[error("portable marker '{0}' is not a NAME=VALUE entry")]
    MalformedMarker(String),

    #[error(transparent)]
    Allocation(#[from] AllocationFailure),
}

/// The runtime refused the invocation or could not load the entry script.
///
/// The runtime has already written its own diagnostic by the time this is
/// returned; the bootstrap only uses it to pick the exit status.
#[derive(Debug, Error)]
pub enum ParseFailure {
    #[error("unrecognized switch: {0}")]
    UnrecognizedSwitch(String),

    #[error("switch {0} requires an argument")]
    MissingSwitchArgument(String),

    #[error("no entry script given")]
    MissingScript,

    #[error("can't open script {}: {source}", .path.display())]
    ScriptUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} had compilation errors: {message}", .path.display())]
    Compile { path: PathBuf, message: String },

    #[error("runtime rejected the invocation: {0}")]
    Runtime(String),
}

impl ParseFailure {
    /// Process status for a launch that never got past parse.
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            ParseFailure::ScriptUnreadable { .. } => ExitStatus::NOT_FOUND,
            _ => ExitStatus::FAILURE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_script_file_maps_to_not_found() {
        let failure = ParseFailure::ScriptUnreadable {
            path: PathBuf::from("lib/iston.js"),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert_eq!(failure.exit_status(), ExitStatus::NOT_FOUND);
        assert!(failure.to_string().starts_with("can't open script lib/iston.js"));
    }

    #[test]
    fn other_parse_failures_are_generic_failures() {
        assert_eq!(ParseFailure::MissingScript.exit_status(), ExitStatus::FAILURE);
        assert_eq!(
            ParseFailure::UnrecognizedSwitch("-x".into()).exit_status(),
            ExitStatus::FAILURE
        );
    }
}
