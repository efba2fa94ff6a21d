//! Lua VM setup for loaded modules.
//!
//! Every module gets its own VM with a restricted standard library and a
//! global `host` table:
//!
//! ```text
//! host.is_interrupted()      -> boolean
//! host.session_id()          -> string | nil
//! host.context_path()        -> string | nil
//! host.executor_id()         -> string | nil
//! host.show_status(message)
//! host.specification_name()  -> string | nil
//! host.specification_json()  -> string | nil
//! host.working_dir()         -> string | nil
//! host.platform_json()       -> string | nil
//! host.log(level, message)
//! ```
//!
//! Bridge-derived functions only answer while an invocation is active, so
//! top-level code executed at load time always sees `context_path() == nil`.

use crate::bridge::HostBridge;
use crate::cancellation::CancellationToken;
use crate::config::StdlibProfile;
use crate::context::ContextState;
use mlua::{Lua, LuaOptions, StdLib, Table, Value};
use parking_lot::RwLock;
use std::sync::Arc;

/// Base-library globals removed from sandboxed VMs.
const SANDBOX_REMOVED_GLOBALS: &[&str] = &["dofile", "loadfile", "load", "require", "collectgarbage"];

/// Name of the global host table.
pub(crate) const HOST_GLOBAL: &str = "host";

/// Creates a VM with the libraries allowed by `profile`.
pub(crate) fn create_vm(profile: StdlibProfile) -> mlua::Result<Lua> {
    let libs = match profile {
        StdlibProfile::Sandboxed => {
            StdLib::TABLE | StdLib::STRING | StdLib::MATH | StdLib::UTF8 | StdLib::COROUTINE
        }
        StdlibProfile::Full => StdLib::ALL_SAFE,
    };
    let lua = Lua::new_with(libs, LuaOptions::new())?;

    if profile == StdlibProfile::Sandboxed {
        let globals = lua.globals();
        for name in SANDBOX_REMOVED_GLOBALS {
            globals.set(*name, Value::Nil)?;
        }
    }
    Ok(lua)
}

/// Connects one module's `host` table to the host state.
///
/// The binding is inactive outside invocations.
pub(crate) struct HostBinding {
    module: String,
    state: Arc<ContextState>,
    active: RwLock<Option<Arc<CancellationToken>>>,
}

impl HostBinding {
    pub(crate) fn new(module: impl Into<String>, state: Arc<ContextState>) -> Self {
        Self {
            module: module.into(),
            state,
            active: RwLock::new(None),
        }
    }

    /// Marks an invocation as running until the guard is dropped.
    pub(crate) fn activate(&self, token: Arc<CancellationToken>) -> ActiveCall<'_> {
        *self.active.write() = Some(token);
        ActiveCall { binding: self }
    }

    fn is_active(&self) -> bool {
        self.active.read().is_some()
    }

    fn bridge(&self) -> Option<Arc<dyn HostBridge>> {
        if self.is_active() {
            self.state.bridge()
        } else {
            None
        }
    }

    fn is_interrupted(&self) -> bool {
        let token = self.active.read().clone();
        match token {
            Some(token) => token.poll() || self.state.is_interrupted(),
            None => false,
        }
    }

    fn context_path(&self) -> Option<String> {
        if self.is_active() {
            self.state.context_path()
        } else {
            None
        }
    }
}

/// Deactivates the binding when dropped.
pub(crate) struct ActiveCall<'a> {
    binding: &'a HostBinding,
}

impl Drop for ActiveCall<'_> {
    fn drop(&mut self) {
        *self.binding.active.write() = None;
    }
}

/// Registers the global `host` table and returns it.
pub(crate) fn register_host(lua: &Lua, binding: &Arc<HostBinding>) -> mlua::Result<Table> {
    let host = lua.create_table()?;

    let b = Arc::clone(binding);
    host.set(
        "is_interrupted",
        lua.create_function(move |_, ()| Ok(b.is_interrupted()))?,
    )?;

    let b = Arc::clone(binding);
    host.set(
        "session_id",
        lua.create_function(move |_, ()| Ok(b.bridge().map(|br| br.session_id())))?,
    )?;

    let b = Arc::clone(binding);
    host.set(
        "context_path",
        lua.create_function(move |_, ()| Ok(b.context_path()))?,
    )?;

    let b = Arc::clone(binding);
    host.set(
        "executor_id",
        lua.create_function(move |_, ()| Ok(b.bridge().map(|br| br.executor_id())))?,
    )?;

    let b = Arc::clone(binding);
    host.set(
        "show_status",
        lua.create_function(move |_, message: String| {
            match b.bridge() {
                Some(bridge) => bridge.show_status(&message),
                None => tracing::debug!(module = %b.module, "host.show_status outside a run: {}", message),
            }
            Ok(())
        })?,
    )?;

    let b = Arc::clone(binding);
    host.set(
        "specification_name",
        lua.create_function(move |_, ()| Ok(b.bridge().map(|br| br.specification().name())))?,
    )?;

    let b = Arc::clone(binding);
    host.set(
        "specification_json",
        lua.create_function(move |_, ()| {
            Ok(b.bridge().map(|br| br.specification().json_string()))
        })?,
    )?;

    let b = Arc::clone(binding);
    host.set(
        "working_dir",
        lua.create_function(move |_, ()| {
            Ok(b.state.working_dir().map(|d| d.display().to_string()))
        })?,
    )?;

    let b = Arc::clone(binding);
    host.set(
        "platform_json",
        lua.create_function(move |_, ()| Ok(b.state.platform().map(|p| p.json_string())))?,
    )?;

    let b = Arc::clone(binding);
    host.set(
        "log",
        lua.create_function(move |_, (level, message): (String, String)| {
            let module = b.module.as_str();
            match level.to_ascii_lowercase().as_str() {
                "error" => tracing::error!(module, "[lua] {}", message),
                "warn" | "warning" => tracing::warn!(module, "[lua] {}", message),
                "debug" => tracing::debug!(module, "[lua] {}", message),
                "trace" => tracing::trace!(module, "[lua] {}", message),
                _ => tracing::info!(module, "[lua] {}", message),
            }
            Ok(())
        })?,
    )?;

    lua.globals().set(HOST_GLOBAL, host.clone())?;
    Ok(host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::LocalBridge;
    use crate::specification::ScriptSpecification;

    fn attached_state() -> (Arc<ContextState>, Arc<LocalBridge>) {
        let spec = ScriptSpecification::new("exec-1", "Lookup", "lookup.lua");
        let bridge = Arc::new(
            LocalBridge::new(Arc::new(spec))
                .with_session_id("s-1")
                .with_context_path("chain/lookup"),
        );
        let state = Arc::new(ContextState::new().with_working_dir("/work"));
        state.attach_run(bridge.clone());
        (state, bridge)
    }

    #[test]
    fn test_sandboxed_vm_has_no_io() {
        let lua = create_vm(StdlibProfile::Sandboxed).unwrap();
        let seen: (bool, bool, bool, bool) = lua
            .load("return io == nil, os == nil, require == nil, dofile == nil")
            .eval()
            .unwrap();
        assert_eq!(seen, (true, true, true, true));

        let sum: i64 = lua.load("return math.max(1, 2) + #string.rep('a', 3)").eval().unwrap();
        assert_eq!(sum, 5);
    }

    #[test]
    fn test_full_vm_has_os() {
        let lua = create_vm(StdlibProfile::Full).unwrap();
        let has_os: bool = lua.load("return os ~= nil").eval().unwrap();
        assert!(has_os);
    }

    #[test]
    fn test_host_inactive_outside_invocation() {
        let (state, _bridge) = attached_state();
        let lua = create_vm(StdlibProfile::Sandboxed).unwrap();
        let binding = Arc::new(HostBinding::new("lookup", state));
        register_host(&lua, &binding).unwrap();

        let (path, session, interrupted, dir): (Option<String>, Option<String>, bool, String) = lua
            .load("return host.context_path(), host.session_id(), host.is_interrupted(), host.working_dir()")
            .eval()
            .unwrap();

        assert_eq!(path, None);
        assert_eq!(session, None);
        assert!(!interrupted);
        assert_eq!(dir, "/work");
    }

    #[test]
    fn test_host_active_during_invocation() {
        let (state, bridge) = attached_state();
        let lua = create_vm(StdlibProfile::Sandboxed).unwrap();
        let binding = Arc::new(HostBinding::new("lookup", state));
        register_host(&lua, &binding).unwrap();

        let token = Arc::new(CancellationToken::new());
        {
            let _call = binding.activate(token.clone());
            let (path, name): (String, String) = lua
                .load("host.show_status('working'); return host.context_path(), host.specification_name()")
                .eval()
                .unwrap();
            assert_eq!(path, "chain/lookup");
            assert_eq!(name, "Lookup");

            token.cancel("stop");
            let interrupted: bool = lua.load("return host.is_interrupted()").eval().unwrap();
            assert!(interrupted);
        }

        assert_eq!(bridge.statuses(), vec!["working".to_string()]);
        let path: Option<String> = lua.load("return host.context_path()").eval().unwrap();
        assert_eq!(path, None);
    }
}
