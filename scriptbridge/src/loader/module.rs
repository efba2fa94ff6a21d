//! A loaded module and its call convention.

use super::lua_env::{self, HostBinding};
use crate::config::StdlibProfile;
use crate::context::{ContextState, ExecutionContext};
use crate::errors::{Result, ScriptbridgeError};
use crate::specification::{ScriptConf, DEFAULT_FUNCTION};
use chrono::{DateTime, Utc};
use mlua::{Function, Lua, LuaSerdeExt, RegistryKey, Table, Value};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Pseudo path reported for modules loaded from memory.
const INLINE_PATH: &str = "<inline>";

/// How the entry point of a module is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryPoint {
    /// A plain function.
    Function(String),
    /// A method called on one instance created at load time with
    /// `class_name:new()`.
    Method {
        /// Table exposing `new()`.
        class_name: String,
        /// Method name.
        function: String,
    },
}

impl EntryPoint {
    /// A plain function entry point.
    #[must_use]
    pub fn function(name: impl Into<String>) -> Self {
        Self::Function(name.into())
    }

    /// An instance-method entry point.
    #[must_use]
    pub fn method(class_name: impl Into<String>, function: impl Into<String>) -> Self {
        Self::Method {
            class_name: class_name.into(),
            function: function.into(),
        }
    }

    /// Returns the function or method name.
    #[must_use]
    pub fn function_name(&self) -> &str {
        match self {
            Self::Function(name) | Self::Method { function: name, .. } => name,
        }
    }

    /// Builds the entry point described by a `script` section.
    #[must_use]
    pub fn from_script_conf(conf: &ScriptConf) -> Self {
        match &conf.class_name {
            Some(class_name) => Self::method(class_name, &conf.function),
            None => Self::function(&conf.function),
        }
    }
}

impl Default for EntryPoint {
    fn default() -> Self {
        Self::function(DEFAULT_FUNCTION)
    }
}

impl std::fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Function(name) => write!(f, "{name}"),
            Self::Method {
                class_name,
                function,
            } => write!(f, "{class_name}:{function}"),
        }
    }
}

/// Where a module's source came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleOrigin {
    /// A file at the resolved path.
    File(PathBuf),
    /// Source text handed to the loader directly.
    Inline(Arc<str>),
}

struct ModuleVm {
    lua: Lua,
    entry: RegistryKey,
    instance: Option<RegistryKey>,
    host: RegistryKey,
}

/// An initialized module, ready to be invoked any number of times.
///
/// Each instance owns its own Lua VM. Top-level state of the module persists
/// across calls on the same instance and is never shared with another
/// instance, even one loaded from the same file.
pub struct LoadedModule {
    name: String,
    origin: ModuleOrigin,
    digest: String,
    loaded_at: DateTime<Utc>,
    entry: EntryPoint,
    stdlib: StdlibProfile,
    vm: Mutex<ModuleVm>,
    binding: Arc<HostBinding>,
    calls: AtomicU64,
}

impl LoadedModule {
    /// Creates the VM, runs the top-level code once and locates the entry
    /// point.
    pub(crate) fn bind(
        name: String,
        origin: ModuleOrigin,
        source: &str,
        entry: EntryPoint,
        state: Arc<ContextState>,
        stdlib: StdlibProfile,
    ) -> Result<Self> {
        let path = match &origin {
            ModuleOrigin::File(path) => path.clone(),
            ModuleOrigin::Inline(_) => PathBuf::from(INLINE_PATH),
        };
        let load_err = |message: String| ScriptbridgeError::load(name.clone(), &path, message);

        let lua = lua_env::create_vm(stdlib).map_err(|e| load_err(e.to_string()))?;
        let binding = Arc::new(HostBinding::new(name.clone(), state));
        let host = lua_env::register_host(&lua, &binding).map_err(|e| load_err(e.to_string()))?;

        let chunk_name = match &origin {
            ModuleOrigin::File(path) => format!("@{}", path.display()),
            ModuleOrigin::Inline(_) => format!("={name}"),
        };
        let returned: Value = lua
            .load(source)
            .set_name(chunk_name)
            .eval()
            .map_err(|e| load_err(e.to_string()))?;

        let (entry_fn, instance) =
            find_entry(&lua, &returned, &entry).map_err(|e| load_err(e.to_string()))?;
        let entry_fn = entry_fn.ok_or_else(|| load_err(format!("entry point '{entry}' not found")))?;

        let vm = ModuleVm {
            entry: lua
                .create_registry_value(entry_fn)
                .map_err(|e| load_err(e.to_string()))?,
            instance: instance
                .map(|t| lua.create_registry_value(t))
                .transpose()
                .map_err(|e| load_err(e.to_string()))?,
            host: lua
                .create_registry_value(host)
                .map_err(|e| load_err(e.to_string()))?,
            lua,
        };

        Ok(Self {
            digest: digest_of(source),
            name,
            origin,
            loaded_at: Utc::now(),
            entry,
            stdlib,
            vm: Mutex::new(vm),
            binding,
            calls: AtomicU64::new(0),
        })
    }

    /// Returns the assigned name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the resolved path, or `None` for in-memory modules.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match &self.origin {
            ModuleOrigin::File(path) => Some(path),
            ModuleOrigin::Inline(_) => None,
        }
    }

    /// Returns where the source came from.
    #[must_use]
    pub fn origin(&self) -> &ModuleOrigin {
        &self.origin
    }

    /// Returns the hex SHA-256 digest of the source that was loaded.
    #[must_use]
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Returns when the module was loaded.
    #[must_use]
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Returns the entry point.
    #[must_use]
    pub fn entry(&self) -> &EntryPoint {
        &self.entry
    }

    /// Returns the stdlib profile the VM was created with.
    #[must_use]
    pub fn stdlib(&self) -> StdlibProfile {
        self.stdlib
    }

    /// Returns how many invocations were started on this instance.
    #[must_use]
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Checks whether the file on disk no longer matches the loaded source.
    ///
    /// Nothing is reloaded; in-memory modules are never stale.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read.
    pub fn is_stale(&self) -> Result<bool> {
        match &self.origin {
            ModuleOrigin::File(path) => {
                let source = std::fs::read_to_string(path)?;
                Ok(digest_of(&source) != self.digest)
            }
            ModuleOrigin::Inline(_) => Ok(false),
        }
    }

    /// Calls the entry point with `(params, inputs, outputs)`.
    ///
    /// Slots written by the module are copied into `ctx.outputs`. Returns
    /// the entry point's return value, `None` for `nil`.
    ///
    /// # Errors
    ///
    /// - `Callee` if the module raises an error
    /// - `UndeclaredField` if it writes an output slot the record rejects
    /// - `Serialization` if a value cannot cross the Lua boundary
    pub fn execute(&self, ctx: &mut ExecutionContext) -> Result<Option<serde_json::Value>> {
        let call = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        let vm = self.vm.lock();
        let lua = &vm.lua;
        let _active = self.binding.activate(Arc::clone(ctx.token()));

        debug!(module = %self.name, invocation_id = %ctx.invocation_id(), call, "Invoking module");

        let params = self.to_lua_table(lua, &ctx.params.to_json())?;
        if ctx.params.context().is_some() {
            let host: Table = lua.registry_value(&vm.host).map_err(internal)?;
            params.set("_sys", host).map_err(internal)?;
        }
        let inputs = self.to_lua_table(lua, &ctx.inputs.to_json())?;
        let outputs = self.to_lua_table(lua, &ctx.outputs.to_json())?;

        let entry: Function = lua.registry_value(&vm.entry).map_err(internal)?;
        let returned: Value = match &vm.instance {
            Some(key) => {
                let instance: Table = lua.registry_value(key).map_err(internal)?;
                entry.call::<Value>((instance, params, inputs, outputs.clone()))
            }
            None => entry.call::<Value>((params, inputs, outputs.clone())),
        }
        .map_err(|e| {
            warn!(module = %self.name, error = %e, "Module raised an error");
            ScriptbridgeError::callee(&self.name, e.to_string())
        })?;

        for pair in outputs.pairs::<String, Value>() {
            let (slot, value) = pair.map_err(|e| ScriptbridgeError::Serialization(e.to_string()))?;
            let value = lua_to_json(value).map_err(|e| {
                ScriptbridgeError::Serialization(format!("output '{slot}': {e}"))
            })?;
            ctx.outputs.set(slot, value)?;
        }

        if returned.is_nil() {
            return Ok(None);
        }
        lua_to_json(returned)
            .map(Some)
            .map_err(|e| ScriptbridgeError::Serialization(format!("return value: {e}")))
    }

    fn to_lua_table(&self, lua: &Lua, value: &serde_json::Value) -> Result<Table> {
        let converted = lua
            .to_value(value)
            .map_err(|e| ScriptbridgeError::Serialization(e.to_string()))?;
        match converted {
            Value::Table(table) => Ok(table),
            other => Err(ScriptbridgeError::Internal(format!(
                "module '{}': expected a table, got {}",
                self.name,
                other.type_name()
            ))),
        }
    }
}

impl std::fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModule")
            .field("name", &self.name)
            .field("path", &self.path())
            .field("entry", &self.entry)
            .field("digest", &self.digest)
            .field("loaded_at", &self.loaded_at)
            .field("calls", &self.call_count())
            .finish_non_exhaustive()
    }
}

fn internal(err: mlua::Error) -> ScriptbridgeError {
    ScriptbridgeError::Internal(err.to_string())
}

fn digest_of(source: &str) -> String {
    hex::encode(Sha256::digest(source.as_bytes()))
}

/// Looks an entry point up.
///
/// A name is searched in the chunk's return value first (the function itself
/// or a field of the returned table), then in the globals.
fn find_entry(
    lua: &Lua,
    returned: &Value,
    entry: &EntryPoint,
) -> mlua::Result<(Option<Function>, Option<Table>)> {
    match entry {
        EntryPoint::Function(name) => {
            if let Value::Function(f) = returned {
                return Ok((Some(f.clone()), None));
            }
            Ok((lookup::<Function>(lua, returned, name)?, None))
        }
        EntryPoint::Method {
            class_name,
            function,
        } => {
            let Some(class) = lookup::<Table>(lua, returned, class_name)? else {
                return Ok((None, None));
            };
            let Some(new) = class.get::<Option<Function>>("new")? else {
                return Err(mlua::Error::runtime(format!(
                    "class '{class_name}' has no new()"
                )));
            };
            let instance: Table = new.call(class.clone())?;
            let method = instance.get::<Option<Function>>(function.as_str())?;
            Ok((method, Some(instance)))
        }
    }
}

fn lookup<T: mlua::FromLua>(lua: &Lua, returned: &Value, name: &str) -> mlua::Result<Option<T>> {
    if let Value::Table(exports) = returned {
        if let Some(found) = exports.get::<Option<T>>(name)? {
            return Ok(Some(found));
        }
    }
    lua.globals().get::<Option<T>>(name)
}

/// Converts a Lua value into JSON.
///
/// Tables whose keys are exactly `1..=n` become arrays, tables with only
/// string keys become objects. Mixed or sparse tables and recursive tables
/// are rejected.
fn lua_to_json(value: Value) -> mlua::Result<serde_json::Value> {
    convert(value, &mut Vec::new())
}

fn convert(value: Value, ancestors: &mut Vec<usize>) -> mlua::Result<serde_json::Value> {
    match value {
        Value::Nil => Ok(serde_json::Value::Null),
        Value::LightUserData(ud) if ud.0.is_null() => Ok(serde_json::Value::Null),
        Value::Boolean(b) => Ok(serde_json::Value::Bool(b)),
        Value::Integer(i) => Ok(serde_json::Value::Number(i.into())),
        Value::Number(n) => serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .ok_or_else(|| mlua::Error::SerializeError(format!("{n} is not a JSON number"))),
        Value::String(s) => Ok(serde_json::Value::String(s.to_str()?.to_string())),
        Value::Table(table) => {
            let id = table.to_pointer() as usize;
            if ancestors.contains(&id) {
                return Err(mlua::Error::SerializeError(
                    "recursive table cannot be converted to JSON".to_string(),
                ));
            }
            ancestors.push(id);
            let converted = convert_table(&table, ancestors);
            ancestors.pop();
            converted
        }
        other => Err(mlua::Error::SerializeError(format!(
            "cannot convert a Lua {} to JSON",
            other.type_name()
        ))),
    }
}

fn convert_table(table: &Table, ancestors: &mut Vec<usize>) -> mlua::Result<serde_json::Value> {
    let mut indexed = Vec::new();
    let mut named = serde_json::Map::new();
    for pair in table.pairs::<Value, Value>() {
        let (key, value) = pair?;
        match key {
            Value::Integer(i) if i >= 1 => indexed.push((i, convert(value, ancestors)?)),
            Value::String(s) => {
                named.insert(s.to_str()?.to_string(), convert(value, ancestors)?);
            }
            other => {
                return Err(mlua::Error::SerializeError(format!(
                    "table key of type {} cannot be converted to JSON",
                    other.type_name()
                )))
            }
        }
    }

    match (indexed.is_empty(), named.is_empty()) {
        (true, _) => Ok(serde_json::Value::Object(named)),
        (false, true) => {
            indexed.sort_unstable_by_key(|(i, _)| *i);
            let dense = indexed
                .iter()
                .zip(1_i64..)
                .all(|((i, _), expected)| *i == expected);
            if !dense {
                return Err(mlua::Error::SerializeError(
                    "sparse array cannot be converted to JSON".to_string(),
                ));
            }
            Ok(serde_json::Value::Array(
                indexed.into_iter().map(|(_, v)| v).collect(),
            ))
        }
        (false, false) => Err(mlua::Error::SerializeError(
            "table mixes array and object keys".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn bind(source: &str, entry: EntryPoint) -> Result<LoadedModule> {
        LoadedModule::bind(
            "inline".to_string(),
            ModuleOrigin::Inline(Arc::from(source)),
            source,
            entry,
            Arc::new(ContextState::new()),
            StdlibProfile::Sandboxed,
        )
    }

    #[test]
    fn test_entry_point_display() {
        assert_eq!(EntryPoint::default().to_string(), "execute");
        assert_eq!(EntryPoint::method("Blur", "run").to_string(), "Blur:run");
        assert_eq!(EntryPoint::method("Blur", "run").function_name(), "run");
    }

    #[test]
    fn test_entry_from_returned_function() {
        let module = bind("return function(p, i, o) return 1 end", EntryPoint::default()).unwrap();
        let result = module.execute(&mut ExecutionContext::default()).unwrap();
        assert_eq!(result, Some(json!(1)));
    }

    #[test]
    fn test_entry_from_returned_table_before_global() {
        let source = r"
            function execute() return 'global' end
            return { execute = function() return 'exported' end }
        ";
        let module = bind(source, EntryPoint::default()).unwrap();
        let result = module.execute(&mut ExecutionContext::default()).unwrap();
        assert_eq!(result, Some(json!("exported")));
    }

    #[test]
    fn test_missing_entry_is_load_error() {
        let err = bind("local x = 1", EntryPoint::function("process")).unwrap_err();
        assert!(matches!(err, ScriptbridgeError::Load { ref message, .. } if message.contains("process")));
    }

    #[test]
    fn test_class_without_new_is_load_error() {
        let err = bind("Blur = {}", EntryPoint::method("Blur", "execute")).unwrap_err();
        assert!(matches!(err, ScriptbridgeError::Load { .. }));
    }

    #[test]
    fn test_values_cross_the_boundary() {
        let source = r"
            function execute(params, inputs, outputs)
                outputs.sum = inputs.values[1] + inputs.values[2]
                outputs.label = params.label
                return { ok = true, items = { 'a', 'b' } }
            end
        ";
        let module = bind(source, EntryPoint::default()).unwrap();
        let mut ctx = ExecutionContext::new(
            crate::context::Params::default().with("label", json!("x")).unwrap(),
            crate::context::Inputs::default().with("values", json!([2, 3])).unwrap(),
            crate::context::Outputs::default(),
        );

        let result = module.execute(&mut ctx).unwrap();

        assert_eq!(result, Some(json!({"ok": true, "items": ["a", "b"]})));
        assert_eq!(ctx.outputs.to_json(), json!({"sum": 5, "label": "x"}));
        assert_eq!(module.call_count(), 1);
    }

    fn returned(source: &str) -> Result<Option<serde_json::Value>> {
        bind(source, EntryPoint::default())
            .unwrap()
            .execute(&mut ExecutionContext::default())
    }

    #[test]
    fn test_recursive_return_is_serialization_error() {
        let err = returned("function execute() local t = {} t.self = t return t end").unwrap_err();
        assert!(matches!(err, ScriptbridgeError::Serialization(ref m) if m.contains("recursive")));
    }

    #[test]
    fn test_recursive_output_slot_is_serialization_error() {
        let source = r"
            function execute(params, inputs, outputs)
                local node = { name = 'a' }
                node.children = { node }
                outputs.tree = node
            end
        ";
        let err = returned(source).unwrap_err();
        assert!(matches!(err, ScriptbridgeError::Serialization(ref m) if m.starts_with("output 'tree'")));
    }

    #[test]
    fn test_shared_table_is_not_recursive() {
        let source = r"
            function execute()
                local shared = { 1, 2 }
                return { a = shared, b = shared }
            end
        ";
        assert_eq!(returned(source).unwrap(), Some(json!({"a": [1, 2], "b": [1, 2]})));
    }

    #[test]
    fn test_mixed_table_is_serialization_error() {
        let err = returned("function execute() return { 1, 2, name = 'x' } end").unwrap_err();
        assert!(matches!(err, ScriptbridgeError::Serialization(ref m) if m.contains("mixes")));
    }

    #[test]
    fn test_sparse_table_is_serialization_error() {
        let err = returned("function execute() return { 1, nil, 3 } end").unwrap_err();
        assert!(matches!(err, ScriptbridgeError::Serialization(ref m) if m.contains("sparse")));
    }

    #[test]
    fn test_table_shapes() {
        assert_eq!(returned("function execute() return {} end").unwrap(), Some(json!({})));
        assert_eq!(
            returned("function execute() local t = {} t[2] = 'b' t[1] = 'a' return t end").unwrap(),
            Some(json!(["a", "b"]))
        );
        assert_eq!(
            returned("function execute() return { x = { y = 1.5 } } end").unwrap(),
            Some(json!({"x": {"y": 1.5}}))
        );
    }

    #[test]
    fn test_digest_is_sha256_of_source() {
        let module = bind("function execute() end", EntryPoint::default()).unwrap();
        assert_eq!(module.digest().len(), 64);
        assert_eq!(module.digest(), digest_of("function execute() end"));
        assert!(!module.is_stale().unwrap());
        assert!(module.path().is_none());
    }
}
