//! The call convention shared by script and native modules.

use crate::context::ExecutionContext;
use crate::errors::Result;
use crate::loader::LoadedModule;
use serde_json::Value;
use std::fmt::Debug;

/// A unit callable as `execute(params, inputs, outputs) -> result`.
///
/// Implementations read `ctx.params` and `ctx.inputs`, fill `ctx.outputs`,
/// poll `ctx.is_interrupted()` at safe points and return `Ok(None)` for "no
/// result". Errors are returned, never swallowed.
pub trait Executable: Send + Sync + Debug {
    /// Returns the module name.
    fn name(&self) -> &str;

    /// Runs one invocation.
    ///
    /// # Errors
    ///
    /// Whatever the module reports; script modules return `Callee` for
    /// errors they raise.
    fn execute(&self, ctx: &mut ExecutionContext) -> Result<Option<Value>>;
}

impl Executable for LoadedModule {
    fn name(&self) -> &str {
        LoadedModule::name(self)
    }

    fn execute(&self, ctx: &mut ExecutionContext) -> Result<Option<Value>> {
        LoadedModule::execute(self, ctx)
    }
}

/// A native module backed by a closure.
pub struct FnModule<F>
where
    F: Fn(&mut ExecutionContext) -> Result<Option<Value>> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnModule<F>
where
    F: Fn(&mut ExecutionContext) -> Result<Option<Value>> + Send + Sync,
{
    /// Creates a new function-backed module.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnModule<F>
where
    F: Fn(&mut ExecutionContext) -> Result<Option<Value>> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnModule").field("name", &self.name).finish()
    }
}

impl<F> Executable for FnModule<F>
where
    F: Fn(&mut ExecutionContext) -> Result<Option<Value>> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, ctx: &mut ExecutionContext) -> Result<Option<Value>> {
        (self.func)(ctx)
    }
}
