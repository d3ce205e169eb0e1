//! Launch session
//!
//! A [`Session`] owns the one runtime instance of the process together with
//! the argument vector it was given. Teardown (destruct, then release of the
//! argument buffer) happens exactly once: explicitly through
//! [`Session::teardown`], or on drop for any other exit path.

use std::ffi::OsStr;

use tracing::{debug, error, info};

use crate::args::ArgumentVector;
use crate::env::EnvironmentVector;
use crate::error::{AllocationFailure, BootstrapError, ParseFailure};
use crate::host::{ExitStatus, Interpreter, ScriptHost};
use crate::settings::LaunchSettings;

/// Where a runtime handle is in its life.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LifecycleState {
    Unallocated,
    Constructed,
    Parsed,
    Running,
    Destructed,
}

/// Exclusive owner of the runtime handle and the argument buffer.
pub struct Session<I: Interpreter> {
    interpreter: I,
    args: Option<ArgumentVector>,
    env: EnvironmentVector,
    state: LifecycleState,
}

impl<I: Interpreter> Session<I> {
    /// UNALLOCATED -> CONSTRUCTED. On failure nothing is held, so nothing is
    /// torn down.
    pub fn construct<H>(
        host: &H,
        args: ArgumentVector,
        env: EnvironmentVector,
    ) -> Result<Self, AllocationFailure>
    where
        H: ScriptHost<Interpreter = I>,
    {
        let interpreter = host.construct()?;
        debug!(state = ?LifecycleState::Constructed, "runtime constructed");

        Ok(Self {
            interpreter,
            args: Some(args),
            env,
            state: LifecycleState::Constructed,
        })
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// The argument vector, until teardown releases it.
    pub fn args(&self) -> Option<&ArgumentVector> {
        self.args.as_ref()
    }

    pub fn env(&self) -> &EnvironmentVector {
        &self.env
    }

    /// CONSTRUCTED -> PARSED. Runtime diagnostics are the runtime's business;
    /// the failure is handed back as-is.
    pub fn parse(&mut self) -> Result<(), ParseFailure> {
        let args = match (self.state, self.args.as_ref()) {
            (LifecycleState::Constructed, Some(args)) => args,
            (state, _) => {
                return Err(ParseFailure::Runtime(format!(
                    "runtime cannot parse while {state:?}"
                )))
            }
        };

        self.interpreter.parse(args, &self.env)?;
        self.state = LifecycleState::Parsed;
        debug!(state = ?self.state, "entry script parsed");
        Ok(())
    }

    /// PARSED -> RUNNING. Blocks until the script finishes and returns its
    /// status unchanged.
    pub fn run(&mut self) -> ExitStatus {
        if self.state != LifecycleState::Parsed {
            error!(state = ?self.state, "refusing to run a runtime that has not parsed");
            return ExitStatus::FAILURE;
        }

        self.state = LifecycleState::Running;
        let status = self.interpreter.run();
        debug!(%status, "entry script finished");
        status
    }

    /// Destructs the runtime and frees the argument buffer.
    pub fn teardown(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.state == LifecycleState::Destructed {
            return;
        }

        self.interpreter.destruct();
        drop(self.args.take());
        self.state = LifecycleState::Destructed;
        debug!(state = ?self.state, "runtime destructed");
    }
}

impl<I: Interpreter> Drop for Session<I> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Runs the full bootstrap sequence and returns the runtime's exit status.
///
/// `host_args` is the host process argument list, program name first.
/// Errors are only returned for failures before the runtime was constructed.
pub fn launch<H, S>(
    host: &H,
    settings: &LaunchSettings,
    host_args: &[S],
) -> Result<ExitStatus, BootstrapError>
where
    H: ScriptHost,
    S: AsRef<OsStr>,
{
    let env = EnvironmentVector::portable(settings)?;
    let args = ArgumentVector::compose(settings, host_args)?;
    debug!(settings = %settings.to_json(), argc = args.len(), "composed runtime invocation");

    info!("initializing runtime...");
    let mut session = Session::construct(host, args, env)?;

    let status = match session.parse() {
        Ok(()) => {
            info!("running entry script...");
            session.run()
        }
        Err(failure) => {
            debug!(error = %failure, "parse failed, skipping run");
            failure.exit_status()
        }
    };

    session.teardown();
    Ok(status)
}
