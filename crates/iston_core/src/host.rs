//! Capability interface between the bootstrap and an embedded runtime
//!
//! A runtime is anything that can be constructed, handed an argument and
//! environment vector to parse, run to completion and destructed. The
//! bootstrap never looks further into it than that.

use std::fmt;
use std::process::ExitCode;

use crate::args::ArgumentVector;
use crate::env::EnvironmentVector;
use crate::error::{AllocationFailure, ParseFailure};

/// Status produced by the embedded runtime, passed through untouched.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ExitStatus(pub i32);

impl ExitStatus {
    pub const SUCCESS: ExitStatus = ExitStatus(0);
    /// Script file could not be opened.
    pub const NOT_FOUND: ExitStatus = ExitStatus(2);
    /// Uncaught error, compile error or bad switch.
    pub const FAILURE: ExitStatus = ExitStatus(255);

    pub fn code(self) -> i32 {
        self.0
    }

    pub fn is_success(self) -> bool {
        self.0 == 0
    }

    /// Processes only report the low byte, as `exit(2)` does.
    pub fn low_byte(self) -> u8 {
        (self.0 & 0xff) as u8
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status.low_byte())
    }
}

/// Allocates and constructs runtime instances.
pub trait ScriptHost {
    type Interpreter: Interpreter;

    /// UNALLOCATED -> CONSTRUCTED. An error here is fatal to the launch.
    fn construct(&self) -> Result<Self::Interpreter, AllocationFailure>;
}

/// One constructed runtime instance.
pub trait Interpreter {
    /// Reads the invocation and loads the entry script without running it.
    fn parse(
        &mut self,
        args: &ArgumentVector,
        env: &EnvironmentVector,
    ) -> Result<(), ParseFailure>;

    /// Runs the parsed program to completion, blocking the caller.
    fn run(&mut self) -> ExitStatus;

    /// Releases everything the runtime holds. Called exactly once.
    fn destruct(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_keeps_low_byte() {
        assert_eq!(ExitStatus(3).low_byte(), 3);
        assert_eq!(ExitStatus(256 + 7).low_byte(), 7);
        assert_eq!(ExitStatus::FAILURE.low_byte(), 255);
        assert_eq!(ExitStatus(-1).low_byte(), 255);
    }

    #[test]
    fn success_is_zero() {
        assert!(ExitStatus::SUCCESS.is_success());
        assert!(!ExitStatus::NOT_FOUND.is_success());
        assert_eq!(ExitStatus(42).to_string(), "42");
    }
}
