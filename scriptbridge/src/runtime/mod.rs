//! Invoking loaded modules.
//!
//! Anything implementing [`Executable`] follows the
//! `execute(params, inputs, outputs) -> result` convention. The
//! [`ModuleRunner`] drives one call for a host and the [`ModuleRegistry`]
//! keeps loaded modules per session.

mod executable;
mod registry;
mod runner;

pub use executable::{Executable, FnModule};
pub use registry::{ModuleRegistry, WorkerKey};
pub use runner::{InvocationReport, InvocationRequest, ModuleRunner};
