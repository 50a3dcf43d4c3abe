//! Lua 5.4 adapter
//!
//! Projects the binding tables into Lua globals. Native references become
//! userdata whose `__index` resolves methods first and properties second,
//! so `entity:translate(1, 0, 0)` and `entity.transform.position.x = 2`
//! both work. Entity and light userdata keep their target alive until Lua
//! collects them.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use mlua::{AnyUserData, Function, Lua, MetaMethod, MultiValue, Table, UserData, UserDataMethods, Value};

use super::bindings::{self, BindingError, NativeRef, ScriptValue, FUNCTIONS};
use super::{CallbackList, ScriptAdapter, ScriptContext, ScriptError, ScriptResult};

const NAME: &str = "lua";

/// A callback together with the file that registered it
#[derive(Debug, Clone)]
struct LuaCallback {
    function: Function,
    origin: String,
}

impl LuaCallback {
    fn invoke(&self, shared: &Shared, delta_time: f64) -> Result<(), String> {
        let _origin = shared.enter(&self.origin);
        self.function
            .call::<()>(delta_time)
            .map_err(|err| format!("{}: {}", self.origin, err))
    }
}

/// State reachable from registered Rust closures
#[derive(Debug)]
struct Shared {
    update: CallbackList<LuaCallback>,
    late_update: CallbackList<LuaCallback>,
    origins: RefCell<Vec<String>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            update: CallbackList::new("update"),
            late_update: CallbackList::new("late update"),
            origins: RefCell::new(Vec::new()),
        }
    }

    /// File currently executing
    fn origin(&self) -> String {
        self.origins
            .borrow()
            .last()
            .cloned()
            .unwrap_or_else(|| NAME.to_string())
    }

    fn enter(&self, origin: &str) -> OriginGuard<'_> {
        self.origins.borrow_mut().push(origin.to_string());
        OriginGuard(self)
    }
}

struct OriginGuard<'a>(&'a Shared);

impl Drop for OriginGuard<'_> {
    fn drop(&mut self) {
        self.0.origins.borrow_mut().pop();
    }
}

/// Lua runtime driving the engine
pub struct LuaAdapter {
    lua: RefCell<Option<Lua>>,
    shared: Rc<Shared>,
}

impl Default for LuaAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl LuaAdapter {
    /// Create an adapter; the Lua state is built by `initialize`
    pub fn new() -> Self {
        Self {
            lua: RefCell::new(None),
            shared: Rc::new(Shared::new()),
        }
    }

    /// The Lua state; cloned so no borrow is held while scripts run
    fn lua(&self) -> ScriptResult<Lua> {
        self.lua
            .borrow()
            .clone()
            .ok_or_else(|| ScriptError::NotInitialized(NAME.to_string()))
    }

    fn run(&self, lua: &Lua, source: &str, origin: &str) -> ScriptResult<()> {
        let _origin = self.shared.enter(origin);
        lua.load(source)
            .set_name(format!("@{}", origin))
            .exec()
            .map_err(|err| script_error(origin, err))
    }

    fn install(&self, lua: &Lua, context: &ScriptContext) -> mlua::Result<()> {
        let globals = lua.globals();

        for native in FUNCTIONS {
            let context = context.clone();
            let function = lua.create_function(move |lua, args: MultiValue| {
                let values = from_lua_args(args)?;
                let result = native.invoke(&context, &values).map_err(binding_error)?;
                to_lua(lua, &context, result)
            })?;
            globals.set(native.name, function)?;
        }

        for (name, value) in bindings::constants() {
            globals.set(name, value)?;
        }

        let tostring: Function = globals.get("tostring")?;
        let shared = Rc::clone(&self.shared);
        let print = lua.create_function(move |_, args: MultiValue| {
            let line = join_text(&tostring, args)?;
            log::info!(target: "script", "[{}] {}", shared.origin(), line);
            Ok(())
        })?;
        globals.set("print", print)?;

        let tostring: Function = globals.get("tostring")?;
        let shared = Rc::clone(&self.shared);
        let log_error = lua.create_function(move |_, args: MultiValue| {
            let line = join_text(&tostring, args)?;
            log::error!(target: "script", "[{}] {}", shared.origin(), line);
            Ok(())
        })?;
        globals.set("logError", log_error)?;

        let shared = Rc::clone(&self.shared);
        let on_update = lua.create_function(move |_, function: Function| {
            shared.update.push(LuaCallback {
                function,
                origin: shared.origin(),
            });
            Ok(())
        })?;
        globals.set("onUpdate", on_update)?;

        let shared = Rc::clone(&self.shared);
        let on_late_update = lua.create_function(move |_, function: Function| {
            shared.late_update.push(LuaCallback {
                function,
                origin: shared.origin(),
            });
            Ok(())
        })?;
        globals.set("onLateUpdate", on_late_update)?;

        Ok(())
    }
}

impl ScriptAdapter for LuaAdapter {
    fn name(&self) -> &str {
        NAME
    }

    fn extension(&self) -> &str {
        ".lua"
    }

    fn initialize(&self) -> ScriptResult<()> {
        *self.lua.borrow_mut() = Some(Lua::new());
        log::info!("Lua runtime initialized");
        Ok(())
    }

    fn register_api(&self, context: &ScriptContext) -> ScriptResult<()> {
        let lua = self.lua()?;
        self.install(&lua, context)
            .map_err(|err| ScriptError::Setup(err.to_string()))
    }

    fn execute_file(&self, path: &Path) -> ScriptResult<()> {
        let lua = self.lua()?;
        let source = std::fs::read_to_string(path).map_err(|source| ScriptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.run(&lua, &source, &path.display().to_string())
    }

    fn execute_string(&self, code: &str) -> ScriptResult<()> {
        let lua = self.lua()?;
        self.run(&lua, code, "<string>")
    }

    fn update(&self, delta_time: f32) {
        let delta_time = f64::from(delta_time);
        let shared = &*self.shared;
        shared.update.run(NAME, |callback| callback.invoke(shared, delta_time));
        shared
            .late_update
            .run(NAME, |callback| callback.invoke(shared, delta_time));
    }

    fn shutdown(&self) {
        self.shared.update.clear();
        self.shared.late_update.clear();
        self.lua.borrow_mut().take();
    }

    fn callback_count(&self) -> usize {
        self.shared.update.len() + self.shared.late_update.len()
    }
}

/// Userdata wrapping a native reference
#[derive(Clone)]
struct LuaRef {
    target: NativeRef,
    context: ScriptContext,
}

impl UserData for LuaRef {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_meta_method(MetaMethod::Index, |lua, this, key: String| {
            if let Some(method) = bindings::method(this.target.kind(), &key) {
                let function = lua.create_function(move |lua, (receiver, args): (AnyUserData, MultiValue)| {
                    let receiver = receiver.borrow::<LuaRef>()?.clone();
                    let values = from_lua_args(args)?;
                    let result = method
                        .invoke(&receiver.context, &receiver.target, &values)
                        .map_err(binding_error)?;
                    to_lua(lua, &receiver.context, result)
                })?;
                return Ok(Value::Function(function));
            }
            let value = bindings::get_property(&this.context, &this.target, &key).map_err(binding_error)?;
            to_lua(lua, &this.context, value)
        });

        methods.add_meta_method(MetaMethod::NewIndex, |_, this, (key, value): (String, Value)| {
            let value = from_lua(value)?;
            bindings::set_property(&this.context, &this.target, &key, &value).map_err(binding_error)
        });

        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| {
            Ok(bindings::describe(&this.context, &this.target))
        });

        methods.add_meta_method(MetaMethod::Eq, |_, this, other: AnyUserData| {
            Ok(other
                .borrow::<LuaRef>()
                .is_ok_and(|other| other.target.same_target(&this.target)))
        });
    }
}

fn binding_error(err: BindingError) -> mlua::Error {
    mlua::Error::RuntimeError(err.to_string())
}

fn script_error(origin: &str, err: mlua::Error) -> ScriptError {
    match err {
        mlua::Error::SyntaxError { message, .. } => ScriptError::Syntax {
            origin: origin.to_string(),
            message,
        },
        other => ScriptError::Runtime {
            origin: origin.to_string(),
            message: other.to_string(),
        },
    }
}

fn join_text(tostring: &Function, args: MultiValue) -> mlua::Result<String> {
    let mut parts = Vec::with_capacity(args.len());
    for value in args {
        let text: mlua::String = tostring.call(value)?;
        parts.push(text.to_string_lossy().to_string());
    }
    Ok(parts.join("\t"))
}

fn from_lua_args(args: MultiValue) -> mlua::Result<Vec<ScriptValue>> {
    args.into_iter().map(from_lua).collect()
}

fn from_lua(value: Value) -> mlua::Result<ScriptValue> {
    Ok(match value {
        Value::Nil => ScriptValue::Nil,
        Value::Boolean(b) => ScriptValue::Bool(b),
        Value::Integer(i) => ScriptValue::Int(i),
        Value::Number(n) => ScriptValue::Number(n),
        Value::String(s) => ScriptValue::Str(s.to_string_lossy().to_string()),
        Value::Table(table) => from_table(&table)?,
        Value::UserData(data) => ScriptValue::Ref(data.borrow::<LuaRef>()?.target.clone()),
        other => {
            return Err(mlua::Error::RuntimeError(format!(
                "a {} cannot be passed to the engine",
                other.type_name()
            )))
        }
    })
}

/// Sequences become lists, everything else records
fn from_table(table: &Table) -> mlua::Result<ScriptValue> {
    let len = table.raw_len();
    if len > 0 {
        let mut items = Vec::with_capacity(len);
        for index in 1..=len {
            let value: Value = table.raw_get(index)?;
            items.push(from_lua(value)?);
        }
        return Ok(ScriptValue::List(items));
    }

    let mut fields = Vec::new();
    for pair in table.clone().pairs::<String, Value>() {
        let (key, value) = pair?;
        fields.push((key, from_lua(value)?));
    }
    Ok(ScriptValue::Record(fields))
}

fn to_lua(lua: &Lua, context: &ScriptContext, value: ScriptValue) -> mlua::Result<Value> {
    Ok(match value {
        ScriptValue::Nil => Value::Nil,
        ScriptValue::Bool(b) => Value::Boolean(b),
        ScriptValue::Int(i) => Value::Integer(i),
        ScriptValue::Number(n) => Value::Number(n),
        ScriptValue::Str(s) => Value::String(lua.create_string(&s)?),
        ScriptValue::List(items) => {
            let table = lua.create_table()?;
            for (index, item) in items.into_iter().enumerate() {
                table.raw_set(index + 1, to_lua(lua, context, item)?)?;
            }
            Value::Table(table)
        }
        ScriptValue::Record(fields) => {
            let table = lua.create_table()?;
            for (key, item) in fields {
                table.raw_set(key, to_lua(lua, context, item)?)?;
            }
            Value::Table(table)
        }
        ScriptValue::Ref(target) => Value::UserData(lua.create_userdata(LuaRef {
            target,
            context: context.clone(),
        })?),
    })
}
