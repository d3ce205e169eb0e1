//! Script runtime management
//!
//! QuickJS behind the launcher's construct/parse/run/destruct interface.
//! Parse reads the runtime's own command line, binds the host globals and
//! declares the entry script as an ES module, which compiles it without
//! evaluating anything; run evaluates the module and drains pending promise
//! jobs. A promise rejected with no handler once the jobs are drained fails
//! the run.
//!
//! Top-level declarations of the entry script are module scoped. Libraries
//! loaded with `require` run in global scope and see only what the entry
//! script puts on `globalThis`.

use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use iston_core::{
    AllocationFailure, ArgumentVector, EngineLimits, EnvironmentVector, ExitStatus, Interpreter,
    ParseFailure, ScriptHost,
};
use rquickjs::{CatchResultExt, Context, Ctx, Module, Runtime, Value};
use tracing::debug;

use crate::ffi::{self, HostState, Streams};
use crate::invocation::Invocation;

/// Builds QuickJS runtimes with the configured limits and streams.
pub struct QuickJsHost {
    limits: EngineLimits,
    streams: Streams,
}

impl QuickJsHost {
    pub fn new(limits: EngineLimits) -> Self {
        Self::with_streams(limits, Streams::stdio())
    }

    pub fn with_streams(limits: EngineLimits, streams: Streams) -> Self {
        Self { limits, streams }
    }
}

impl ScriptHost for QuickJsHost {
    type Interpreter = ScriptRuntime;

    fn construct(&self) -> Result<ScriptRuntime, AllocationFailure> {
        ScriptRuntime::new(&self.limits, self.streams.clone())
    }
}

/// Entry script accepted by parse.
struct EntryScript {
    path: PathBuf,
    name: String,
    source: String,
}

/// Script execution context
pub struct ScriptRuntime {
    context: Context,
    runtime: Runtime,
    state: Rc<HostState>,
    entry: Option<EntryScript>,
}

impl ScriptRuntime {
    pub fn new(limits: &EngineLimits, streams: Streams) -> Result<Self, AllocationFailure> {
        let runtime = Runtime::new().map_err(|err| AllocationFailure::Runtime(err.to_string()))?;
        if let Some(limit) = limits.memory_limit {
            runtime.set_memory_limit(limit);
        }
        if let Some(size) = limits.max_stack_size {
            runtime.set_max_stack_size(size);
        }

        let state = HostState::new(streams);
        let rejections = state.rejections.clone();
        runtime.set_host_promise_rejection_tracker(Some(Box::new(
            move |_ctx: Ctx<'_>, promise: Value<'_>, reason: Value<'_>, is_handled: bool| {
                rejections.track(&promise, &reason, is_handled);
            },
        )));

        let context =
            Context::full(&runtime).map_err(|err| AllocationFailure::Runtime(err.to_string()))?;

        Ok(Self {
            context,
            runtime,
            state,
            entry: None,
        })
    }

    /// Script loaded by the last successful parse.
    pub fn script(&self) -> Option<&Path> {
        self.entry.as_ref().map(|entry| entry.path.as_path())
    }

    /// Writes the failure as the runtime's diagnostic and hands it back.
    fn report(&self, failure: ParseFailure) -> ParseFailure {
        self.state.streams.diagnostic(&failure.to_string());
        failure
    }

    fn compile(
        &self,
        invocation: &Invocation,
        env: &EnvironmentVector,
        entry: &EntryScript,
    ) -> Result<(), String> {
        self.context.with(|ctx| -> Result<(), String> {
            ffi::install(&ctx, &self.state, invocation, env)
                .catch(&ctx)
                .map_err(|err| err.to_string())?;
            Module::declare(ctx.clone(), entry.name.as_str(), entry.source.as_str())
                .catch(&ctx)
                .map(|_| ())
                .map_err(|err| err.to_string())
        })
    }

    fn drain_jobs(&self) -> ExitStatus {
        loop {
            match self.runtime.execute_pending_job() {
                Ok(true) => {
                    if let Some(status) = self.state.exit_requested() {
                        return status;
                    }
                }
                Ok(false) => return ExitStatus::SUCCESS,
                Err(_) => {
                    if let Some(status) = self.state.exit_requested() {
                        return status;
                    }
                    // The job's exception is still pending on our only context
                    let message = self.context.with(|ctx| ffi::describe(&ctx.catch()));
                    self.state.streams.diagnostic(&message);
                    return ExitStatus::FAILURE;
                }
            }
        }
    }
}

/// Blanks a leading `#!` line, keeping line numbers.
fn strip_shebang(source: &str) -> String {
    match source.strip_prefix("#!") {
        Some(rest) => rest.find('\n').map_or(String::new(), |newline| rest[newline..].to_string()),
        None => source.to_string(),
    }
}

impl Interpreter for ScriptRuntime {
    fn parse(
        &mut self,
        args: &ArgumentVector,
        env: &EnvironmentVector,
    ) -> Result<(), ParseFailure> {
        let invocation = Invocation::parse(args).map_err(|failure| self.report(failure))?;
        debug!(
            script = %invocation.script.display(),
            include = ?invocation.include_dirs,
            "runtime invocation"
        );

        let source = fs::read_to_string(&invocation.script).map_err(|source| {
            self.report(ParseFailure::ScriptUnreadable {
                path: invocation.script.clone(),
                source,
            })
        })?;

        let entry = EntryScript {
            path: invocation.script.clone(),
            name: invocation.script.display().to_string(),
            source: strip_shebang(&source),
        };
        self.compile(&invocation, env, &entry).map_err(|message| {
            self.report(ParseFailure::Compile {
                path: entry.path.clone(),
                message,
            })
        })?;

        self.entry = Some(entry);
        Ok(())
    }

    fn run(&mut self) -> ExitStatus {
        let Some(entry) = self.entry.as_ref() else {
            self.state.streams.diagnostic("no entry script loaded");
            return ExitStatus::FAILURE;
        };

        let outcome = self.context.with(|ctx| -> Result<(), String> {
            Module::evaluate(ctx.clone(), entry.name.as_str(), entry.source.as_str())
                .catch(&ctx)
                .map(|_| ())
                .map_err(|err| err.to_string())
        });

        if let Some(status) = self.state.exit_requested() {
            return status;
        }
        if let Err(message) = outcome {
            self.state.streams.diagnostic(&message);
            return ExitStatus::FAILURE;
        }

        let status = self.drain_jobs();
        if self.state.exit_requested().is_some() || !status.is_success() {
            return status;
        }

        let unhandled = self.state.rejections.take_unhandled();
        if unhandled.is_empty() {
            return ExitStatus::SUCCESS;
        }
        for message in &unhandled {
            self.state.streams.diagnostic(message);
        }
        ExitStatus::FAILURE
    }

    fn destruct(&mut self) {
        self.context.with(|ctx| ffi::run_end_hooks(&ctx, &self.state));
        self.runtime.run_gc();
        debug!("script runtime destructed");
    }
}
