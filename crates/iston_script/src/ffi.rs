//! FFI layer between Rust and scripts
//!
//! Globals the entry script sees: `ARGV`, `ENV`, `INC`, `PROGRAM`, and the
//! functions `print`, `say`, `warn`, `exit`, `END` and `require`. Every value
//! handed over is a copy; the script never touches the bootstrap's buffers.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use iston_core::{EnvironmentVector, ExitStatus};
use rquickjs::convert::Coerced;
use rquickjs::function::{Opt, Rest};
use rquickjs::{Array, CatchResultExt, Ctx, Exception, Function, Object, Value};
use tracing::{debug, warn};

use crate::invocation::Invocation;

/// Hidden global holding the callbacks registered with `END`.
pub(crate) const END_HOOKS_KEY: &str = "__iston_end_hooks";
/// Property stamped on a rejected promise so a later handler can be matched.
const REJECTION_ID_KEY: &str = "__iston_rejection_id";

const END_PRELUDE: &str = r#"
(function (hooks) {
    Object.defineProperty(globalThis, "__iston_end_hooks", { value: hooks });
    globalThis.END = function (hook) {
        if (typeof hook !== "function") {
            throw new TypeError("END expects a function");
        }
        hooks.push(hook);
    };
})([]);
"#;

/// Message carried by the exception `exit()` throws to unwind the script.
const EXIT_UNWIND: &str = "exit";

pub type SharedWriter = Rc<RefCell<Box<dyn Write>>>;

/// Standard output and error as the script sees them.
#[derive(Clone)]
pub struct Streams {
    out: SharedWriter,
    err: SharedWriter,
}

impl Streams {
    pub fn new(out: impl Write + 'static, err: impl Write + 'static) -> Self {
        Self {
            out: Rc::new(RefCell::new(Box::new(out))),
            err: Rc::new(RefCell::new(Box::new(err))),
        }
    }

    pub fn stdio() -> Self {
        Self::new(io::stdout(), io::stderr())
    }

    pub fn write_out(&self, text: &str) -> io::Result<()> {
        write_flushed(&self.out, text)
    }

    pub fn write_err(&self, text: &str) -> io::Result<()> {
        write_flushed(&self.err, text)
    }

    /// Diagnostics go to the script's stderr, one per line.
    pub fn diagnostic(&self, message: &str) {
        let line = if message.ends_with('\n') {
            message.to_string()
        } else {
            format!("{message}\n")
        };
        if let Err(err) = self.write_err(&line) {
            warn!(%err, "could not write runtime diagnostic");
        }
    }
}

fn write_flushed(writer: &SharedWriter, text: &str) -> io::Result<()> {
    let mut writer = writer.borrow_mut();
    writer.write_all(text.as_bytes())?;
    writer.flush()
}

/// State shared between the runtime and the functions it exposes.
pub(crate) struct HostState {
    pub(crate) streams: Streams,
    pub(crate) rejections: RejectionLog,
    exit: Cell<Option<i32>>,
    loaded: RefCell<HashSet<PathBuf>>,
}

impl HostState {
    pub(crate) fn new(streams: Streams) -> Rc<Self> {
        Rc::new(Self {
            streams,
            rejections: RejectionLog::default(),
            exit: Cell::new(None),
            loaded: RefCell::new(HashSet::new()),
        })
    }

    /// Status passed to `exit()`, if the script called it.
    pub(crate) fn exit_requested(&self) -> Option<ExitStatus> {
        self.exit.get().map(ExitStatus)
    }
}

/// Promise rejections that no handler has claimed yet.
#[derive(Clone, Default)]
pub(crate) struct RejectionLog {
    inner: Arc<Mutex<Rejections>>,
}

#[derive(Default)]
struct Rejections {
    next_id: u32,
    pending: Vec<(u32, String)>,
}

impl RejectionLog {
    /// Host rejection tracker: records a rejection without a handler and
    /// forgets it again once a handler is attached.
    pub(crate) fn track(&self, promise: &Value<'_>, reason: &Value<'_>, is_handled: bool) {
        let Ok(mut rejections) = self.inner.lock() else {
            return;
        };
        let stamp = promise.as_object();

        if is_handled {
            if let Some(id) = stamp.and_then(|p| p.get::<_, u32>(REJECTION_ID_KEY).ok()) {
                rejections.pending.retain(|(pending, _)| *pending != id);
            }
            return;
        }

        let id = rejections.next_id;
        rejections.next_id = rejections.next_id.wrapping_add(1);
        if let Some(promise) = stamp {
            if let Err(err) = promise.set(REJECTION_ID_KEY, id) {
                debug!(%err, "could not tag rejected promise");
            }
        }
        rejections.pending.push((id, describe(reason)));
    }

    /// Drains the rejections still unhandled, oldest first.
    pub(crate) fn take_unhandled(&self) -> Vec<String> {
        match self.inner.lock() {
            Ok(mut rejections) => rejections
                .pending
                .drain(..)
                .map(|(_, message)| message)
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

/// Human-readable form of a thrown or rejected value.
pub(crate) fn describe(value: &Value<'_>) -> String {
    if let Some(exception) = value.as_exception() {
        return exception.to_string();
    }
    value
        .get::<Coerced<String>>()
        .map(|text| text.0)
        .unwrap_or_else(|_| "<unprintable value>".to_string())
}

/// Defines every script-visible global on `ctx`.
pub(crate) fn install<'js>(
    ctx: &Ctx<'js>,
    state: &Rc<HostState>,
    invocation: &Invocation,
    env: &EnvironmentVector,
) -> rquickjs::Result<()> {
    let globals = ctx.globals();

    globals.set("ARGV", invocation.script_args.clone())?;
    globals.set("PROGRAM", invocation.script.display().to_string())?;
    globals.set(
        "INC",
        invocation
            .include_dirs
            .iter()
            .map(|dir| dir.display().to_string())
            .collect::<Vec<_>>(),
    )?;

    let env_object = Object::new(ctx.clone())?;
    for (name, value) in env.pairs() {
        env_object.set(name, value)?;
    }
    globals.set("ENV", env_object)?;

    let out = Rc::clone(state);
    globals.set(
        "print",
        Function::new(ctx.clone(), move |parts: Rest<Coerced<String>>| -> bool {
            out.streams.write_out(&join(parts, "")).is_ok()
        })?,
    )?;

    let out = Rc::clone(state);
    globals.set(
        "say",
        Function::new(ctx.clone(), move |parts: Rest<Coerced<String>>| -> bool {
            out.streams.write_out(&format!("{}\n", join(parts, ""))).is_ok()
        })?,
    )?;

    let err = Rc::clone(state);
    globals.set(
        "warn",
        Function::new(ctx.clone(), move |parts: Rest<Coerced<String>>| {
            err.streams.diagnostic(&join(parts, " "));
        })?,
    )?;

    let exit = Rc::clone(state);
    globals.set(
        "exit",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, code: Opt<Coerced<i32>>| -> rquickjs::Result<()> {
                exit.exit.set(Some(code.0.map_or(0, |code| code.0)));
                Err(Exception::throw_message(&ctx, EXIT_UNWIND))
            },
        )?,
    )?;

    let loader = Rc::clone(state);
    let include_dirs = invocation.include_dirs.clone();
    globals.set(
        "require",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, name: String| -> rquickjs::Result<bool> {
                require(&ctx, &loader, &include_dirs, &name)
            },
        )?,
    )?;

    ctx.eval::<(), _>(END_PRELUDE)?;
    Ok(())
}

fn join(parts: Rest<Coerced<String>>, separator: &str) -> String {
    parts
        .0
        .into_iter()
        .map(|part| part.0)
        .collect::<Vec<_>>()
        .join(separator)
}

/// Loads a library file from the search path once, in global scope.
fn require(
    ctx: &Ctx<'_>,
    state: &HostState,
    include_dirs: &[PathBuf],
    name: &str,
) -> rquickjs::Result<bool> {
    let Some(path) = resolve(include_dirs, Path::new(name)) else {
        let searched = include_dirs
            .iter()
            .map(|dir| dir.display().to_string())
            .collect::<Vec<_>>()
            .join(" ");
        return Err(Exception::throw_message(
            ctx,
            &format!("can't locate {name} in INC (INC contains: {searched})"),
        ));
    };

    if !state.loaded.borrow_mut().insert(path.clone()) {
        return Ok(true);
    }

    let source = fs::read_to_string(&path).map_err(|err| {
        Exception::throw_message(ctx, &format!("can't read {}: {err}", path.display()))
    })?;
    debug!(path = %path.display(), "loading library");
    ctx.eval::<Value, _>(source)?;
    Ok(true)
}

fn resolve(include_dirs: &[PathBuf], name: &Path) -> Option<PathBuf> {
    if name.is_absolute() || name.starts_with(".") || name.starts_with("..") {
        return name.is_file().then(|| name.to_path_buf());
    }
    include_dirs
        .iter()
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Runs `END` callbacks, most recently registered first. A failing callback
/// is reported and the rest still run.
pub(crate) fn run_end_hooks(ctx: &Ctx<'_>, state: &HostState) {
    let hooks = match ctx.globals().get::<_, Option<Array>>(END_HOOKS_KEY) {
        Ok(Some(hooks)) => hooks,
        Ok(None) => return,
        Err(err) => {
            warn!(%err, "END hook list unavailable");
            return;
        }
    };

    for index in (0..hooks.len()).rev() {
        state.exit.set(None);
        let outcome = hooks
            .get::<Function>(index)
            .and_then(|hook| hook.call::<_, Value>(()))
            .catch(ctx);
        if let Err(err) = outcome {
            // exit() inside a hook only ends that hook
            if state.exit.get().is_some() {
                continue;
            }
            let message = err.to_string();
            warn!(%message, "END hook failed");
            state.streams.diagnostic(&message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rquickjs::{Context, Runtime};

    #[test]
    fn describe_uses_message_for_errors_and_text_otherwise() {
        let runtime = Runtime::new().unwrap();
        let context = Context::full(&runtime).unwrap();
        context.with(|ctx| {
            let error: Value = ctx.eval("new Error('job failed')").unwrap();
            assert!(describe(&error).contains("job failed"));

            let number: Value = ctx.eval("42").unwrap();
            assert_eq!(describe(&number), "42");
        });
    }

    #[test]
    fn rejection_log_forgets_handled_promises() {
        let runtime = Runtime::new().unwrap();
        let context = Context::full(&runtime).unwrap();
        let log = RejectionLog::default();
        context.with(|ctx| {
            let first: Value = ctx.eval("({})").unwrap();
            let second: Value = ctx.eval("({})").unwrap();
            let reason: Value = ctx.eval("'nope'").unwrap();

            log.track(&first, &reason, false);
            log.track(&second, &reason, false);
            log.track(&first, &reason, true);
        });
        assert_eq!(log.take_unhandled(), vec!["nope".to_string()]);
        assert!(log.take_unhandled().is_empty());
    }
}
