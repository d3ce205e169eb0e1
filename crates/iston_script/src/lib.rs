//! Iston Scripting System
//!
//! JavaScript execution via QuickJS, driven by the launcher's
//! construct/parse/run/destruct interface.
//!
//! ## Architecture
//!
//! - **Invocation:** the runtime reads its own argv (`-I<dir>`, `--`, script, args)
//! - **Runtime:** parse compiles the entry script, run executes it, destruct runs `END` hooks
//! - **FFI:** the script gets copies of its argv and environment as globals

pub mod ffi;
pub mod invocation;
pub mod runtime;

pub use ffi::Streams;
pub use invocation::Invocation;
pub use runtime::{QuickJsHost, ScriptRuntime};

pub use rquickjs;
