//! # Scriptbridge
//!
//! Loads script modules from files and runs them under a host orchestration
//! system.
//!
//! Scriptbridge provides:
//!
//! - **Context state**: the host's working directory, platform and attached run
//! - **Module loading**: path resolution, sandboxed Lua VMs, one instance per load
//! - **Call convention**: `execute(params, inputs, outputs) -> result`
//! - **Cooperative cancellation**: modules poll `host.is_interrupted()`
//! - **Host bridge**: the boundary to sessions, executors and status reporting
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use scriptbridge::prelude::*;
//! use std::sync::Arc;
//!
//! let state = Arc::new(ContextState::new().with_working_dir("/work"));
//! let loader = ModuleLoader::new(Arc::clone(&state));
//! let module = loader.load_from_file("mods/a.lua", None)?;
//!
//! let runner = ModuleRunner::new(state);
//! let report = runner.run(&module, bridge, InvocationRequest::new())?;
//! println!("{:?}", report.result);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod bridge;
pub mod cancellation;
pub mod config;
pub mod context;
pub mod errors;
pub mod loader;
pub mod observability;
pub mod runtime;
pub mod specification;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::bridge::{HostBridge, LocalBridge, PlatformDescriptor, SpecificationHandle};
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{LoaderConfig, StdlibProfile};
    pub use crate::context::{
        ContextSnapshot, ContextState, ExecutionContext, FieldSet, Inputs, Outputs, Params,
        RunGuard,
    };
    pub use crate::errors::{ErrorKind, ScriptbridgeError, UndeclaredFieldError};
    pub use crate::loader::{EntryPoint, LoadedModule, ModuleLoader};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::runtime::{
        Executable, FnModule, InvocationReport, InvocationRequest, ModuleRegistry,
        ModuleRunner, WorkerKey,
    };
    pub use crate::specification::{ScriptSpecification, DEFAULT_FUNCTION, DEFAULT_OUTPUT};
}
