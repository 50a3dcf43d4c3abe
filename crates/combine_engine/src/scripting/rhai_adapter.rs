//! Rhai adapter
//!
//! Free functions and methods are registered as raw functions, one per
//! accepted argument count, with `Dynamic` parameters; the binding tables
//! do the type checking. Properties become getters and setters on the
//! `Native` type.
//!
//! Constants are served by a variable resolver, so they are visible inside
//! `fn` definitions as well as at the top level.

use std::any::TypeId;
use std::cell::{Ref, RefCell};
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use rhai::{Array, Dynamic, Engine, EvalAltResult, FnPtr, Map, Scope, AST};

use super::bindings::{self, BindingError, NativeRef, ScriptValue, FUNCTIONS};
use super::{CallbackList, ScriptAdapter, ScriptContext, ScriptError, ScriptResult};

const NAME: &str = "rhai";

type RhaiResult<T> = Result<T, Box<EvalAltResult>>;

/// Script value wrapping a native reference
#[derive(Debug, Clone)]
pub struct RhaiRef {
    target: NativeRef,
    context: ScriptContext,
}

/// A callback with the program that defines it
#[derive(Debug, Clone)]
struct RhaiCallback {
    function: FnPtr,
    ast: Rc<AST>,
    origin: String,
}

#[derive(Debug)]
struct Shared {
    update: CallbackList<RhaiCallback>,
    late_update: CallbackList<RhaiCallback>,
    /// Files and programs currently executing, innermost last
    running: RefCell<Vec<(String, Rc<AST>)>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            update: CallbackList::new("update"),
            late_update: CallbackList::new("late update"),
            running: RefCell::new(Vec::new()),
        }
    }

    fn origin(&self) -> String {
        self.running
            .borrow()
            .last()
            .map_or_else(|| NAME.to_string(), |(origin, _)| origin.clone())
    }

    fn enter(&self, origin: &str, ast: Rc<AST>) -> RunningGuard<'_> {
        self.running.borrow_mut().push((origin.to_string(), ast));
        RunningGuard(self)
    }

    fn callback(&self, function: FnPtr) -> RhaiResult<RhaiCallback> {
        let running = self.running.borrow();
        let (origin, ast) = running
            .last()
            .ok_or("callbacks can only be registered while a script runs")?;
        Ok(RhaiCallback {
            function,
            ast: Rc::clone(ast),
            origin: origin.clone(),
        })
    }
}

struct RunningGuard<'a>(&'a Shared);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.running.borrow_mut().pop();
    }
}

/// Rhai runtime driving the engine
pub struct RhaiAdapter {
    engine: RefCell<Option<Engine>>,
    shared: Rc<Shared>,
}

impl Default for RhaiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl RhaiAdapter {
    /// Create an adapter; the engine is built by `initialize`
    pub fn new() -> Self {
        Self {
            engine: RefCell::new(None),
            shared: Rc::new(Shared::new()),
        }
    }

    fn engine(&self) -> ScriptResult<Ref<'_, Engine>> {
        Ref::filter_map(self.engine.borrow(), Option::as_ref)
            .map_err(|_| ScriptError::NotInitialized(NAME.to_string()))
    }

    fn run(&self, source: &str, origin: &str) -> ScriptResult<()> {
        let engine = self.engine()?;
        let ast = engine.compile(source).map_err(|err| ScriptError::Syntax {
            origin: origin.to_string(),
            message: err.to_string(),
        })?;
        let ast = Rc::new(ast);

        let _running = self.shared.enter(origin, Rc::clone(&ast));
        let mut scope = Scope::new();
        engine
            .run_ast_with_scope(&mut scope, &ast)
            .map_err(|err| ScriptError::Runtime {
                origin: origin.to_string(),
                message: err.to_string(),
            })
    }

    fn run_callbacks(&self, list: &CallbackList<RhaiCallback>, delta_time: f32) {
        let Ok(engine) = self.engine() else {
            return;
        };
        let delta_time = f64::from(delta_time);
        list.run(NAME, |callback| {
            let _running = self.shared.enter(&callback.origin, Rc::clone(&callback.ast));
            callback
                .function
                .call::<Dynamic>(&engine, &callback.ast, (delta_time,))
                .map(|_| ())
                .map_err(|err| format!("{}: {}", callback.origin, err))
        });
    }

    #[allow(deprecated)]
    fn install(&self, engine: &mut Engine, context: &ScriptContext) {
        engine.register_type_with_name::<RhaiRef>("Native");

        for native in FUNCTIONS {
            for arity in native.min_args()..=native.max_args() {
                let context = context.clone();
                engine.register_raw_fn(native.name, vec![TypeId::of::<Dynamic>(); arity], move |_, args| {
                    let values = from_args(args)?;
                    let result = native.invoke(&context, &values).map_err(binding_error)?;
                    Ok(to_dynamic(&context, result))
                });
            }
        }

        for name in bindings::method_names() {
            let (min, max) = bindings::method_arity_range(name);
            for arity in min..=max {
                let mut types = vec![TypeId::of::<RhaiRef>()];
                types.extend(std::iter::repeat(TypeId::of::<Dynamic>()).take(arity));
                engine.register_raw_fn(name, types, move |_, args| {
                    let (receiver, rest) = args.split_first_mut().ok_or("missing receiver")?;
                    let receiver = receiver.clone_cast::<RhaiRef>();
                    let values = from_args(rest)?;
                    let result = bindings::call_method(&receiver.context, &receiver.target, name, &values)
                        .map_err(binding_error)?;
                    Ok(to_dynamic(&receiver.context, result))
                });
            }
        }

        for name in bindings::property_names() {
            engine.register_get(name, move |this: &mut RhaiRef| -> RhaiResult<Dynamic> {
                let value = bindings::get_property(&this.context, &this.target, name).map_err(binding_error)?;
                Ok(to_dynamic(&this.context, value))
            });
            engine.register_set(name, move |this: &mut RhaiRef, value: Dynamic| -> RhaiResult<()> {
                let value = from_dynamic(&value)?;
                if is_write_back(&this.context, &this.target, name, &value) {
                    return Ok(());
                }
                bindings::set_property(&this.context, &this.target, name, &value).map_err(binding_error)
            });
        }

        engine.register_fn("to_string", |this: &mut RhaiRef| bindings::describe(&this.context, &this.target));
        engine.register_fn("to_debug", |this: &mut RhaiRef| bindings::describe(&this.context, &this.target));
        engine.register_fn("==", |a: &mut RhaiRef, b: RhaiRef| a.target.same_target(&b.target));
        engine.register_fn("!=", |a: &mut RhaiRef, b: RhaiRef| !a.target.same_target(&b.target));

        let constants: HashMap<String, i64> = bindings::constants().into_iter().collect();
        engine.on_var(move |name, _, _| {
            if !name.starts_with(|c: char| c.is_ascii_uppercase()) {
                return Ok(None);
            }
            Ok(constants.get(name).map(|value| Dynamic::from_int(*value)))
        });

        let shared = Rc::clone(&self.shared);
        engine.on_print(move |text| log::info!(target: "script", "[{}] {}", shared.origin(), text));
        let shared = Rc::clone(&self.shared);
        engine.on_debug(move |text, _, position| {
            log::debug!(target: "script", "[{}] {} {}", shared.origin(), position, text);
        });

        for arity in 1..=8 {
            let shared = Rc::clone(&self.shared);
            engine.register_raw_fn("logError", vec![TypeId::of::<Dynamic>(); arity], move |_, args| {
                let parts: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
                log::error!(target: "script", "[{}] {}", shared.origin(), parts.join("\t"));
                Ok(Dynamic::UNIT)
            });
        }

        let shared = Rc::clone(&self.shared);
        engine.register_raw_fn("onUpdate", [TypeId::of::<FnPtr>()], move |_, args| {
            let callback = shared.callback(args[0].clone_cast::<FnPtr>())?;
            shared.update.push(callback);
            Ok(Dynamic::UNIT)
        });
        let shared = Rc::clone(&self.shared);
        engine.register_raw_fn("onLateUpdate", [TypeId::of::<FnPtr>()], move |_, args| {
            let callback = shared.callback(args[0].clone_cast::<FnPtr>())?;
            shared.late_update.push(callback);
            Ok(Dynamic::UNIT)
        });
    }
}

impl ScriptAdapter for RhaiAdapter {
    fn name(&self) -> &str {
        NAME
    }

    fn extension(&self) -> &str {
        ".rhai"
    }

    fn initialize(&self) -> ScriptResult<()> {
        *self.engine.borrow_mut() = Some(Engine::new());
        log::info!("Rhai engine initialized");
        Ok(())
    }

    fn register_api(&self, context: &ScriptContext) -> ScriptResult<()> {
        let mut engine = self.engine.borrow_mut();
        let engine = engine
            .as_mut()
            .ok_or_else(|| ScriptError::NotInitialized(NAME.to_string()))?;
        self.install(engine, context);
        Ok(())
    }

    fn execute_file(&self, path: &Path) -> ScriptResult<()> {
        let source = std::fs::read_to_string(path).map_err(|source| ScriptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.run(&source, &path.display().to_string())
    }

    fn execute_string(&self, code: &str) -> ScriptResult<()> {
        self.run(code, "<string>")
    }

    fn update(&self, delta_time: f32) {
        self.run_callbacks(&self.shared.update, delta_time);
        self.run_callbacks(&self.shared.late_update, delta_time);
    }

    fn shutdown(&self) {
        self.shared.update.clear();
        self.shared.late_update.clear();
        self.engine.borrow_mut().take();
    }

    fn callback_count(&self) -> usize {
        self.shared.update.len() + self.shared.late_update.len()
    }
}

/// Whether an assignment stores the reference the property already yields
///
/// Rhai feeds every intermediate of `a.b.c = v` back through `set$b`, even
/// for read-only properties such as `transform`.
fn is_write_back(context: &ScriptContext, target: &NativeRef, name: &str, value: &ScriptValue) -> bool {
    let ScriptValue::Ref(assigned) = value else {
        return false;
    };
    matches!(
        bindings::get_property(context, target, name),
        Ok(ScriptValue::Ref(current)) if current.same_target(assigned)
    )
}

fn binding_error(err: BindingError) -> Box<EvalAltResult> {
    err.to_string().into()
}

fn from_args(args: &mut [&mut Dynamic]) -> RhaiResult<Vec<ScriptValue>> {
    args.iter().map(|arg| from_dynamic(arg)).collect()
}

fn from_dynamic(value: &Dynamic) -> RhaiResult<ScriptValue> {
    let value = value.flatten_clone();
    if value.is_unit() {
        return Ok(ScriptValue::Nil);
    }
    if let Ok(b) = value.as_bool() {
        return Ok(ScriptValue::Bool(b));
    }
    if let Ok(i) = value.as_int() {
        return Ok(ScriptValue::Int(i));
    }
    if let Ok(n) = value.as_float() {
        return Ok(ScriptValue::Number(n));
    }
    if let Ok(c) = value.as_char() {
        return Ok(ScriptValue::Str(c.to_string()));
    }
    if value.is_string() {
        return Ok(ScriptValue::Str(value.to_string()));
    }
    if value.is::<RhaiRef>() {
        return Ok(ScriptValue::Ref(value.cast::<RhaiRef>().target));
    }
    if value.is::<Array>() {
        let items = value.cast::<Array>();
        return items.iter().map(from_dynamic).collect::<RhaiResult<_>>().map(ScriptValue::List);
    }
    if value.is::<Map>() {
        let fields = value
            .cast::<Map>()
            .into_iter()
            .map(|(key, item)| -> RhaiResult<(String, ScriptValue)> { Ok((key.to_string(), from_dynamic(&item)?)) })
            .collect::<RhaiResult<_>>()?;
        return Ok(ScriptValue::Record(fields));
    }
    Err(format!("a {} cannot be passed to the engine", value.type_name()).into())
}

fn to_dynamic(context: &ScriptContext, value: ScriptValue) -> Dynamic {
    match value {
        ScriptValue::Nil => Dynamic::UNIT,
        ScriptValue::Bool(b) => Dynamic::from_bool(b),
        ScriptValue::Int(i) => Dynamic::from_int(i),
        ScriptValue::Number(n) => Dynamic::from_float(n),
        ScriptValue::Str(s) => Dynamic::from(s),
        ScriptValue::List(items) => Dynamic::from_array(items.into_iter().map(|item| to_dynamic(context, item)).collect()),
        ScriptValue::Record(fields) => {
            let map: Map = fields
                .into_iter()
                .map(|(key, item)| (key.into(), to_dynamic(context, item)))
                .collect();
            Dynamic::from_map(map)
        }
        ScriptValue::Ref(target) => Dynamic::from(RhaiRef {
            target,
            context: context.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Color;
    use approx::assert_relative_eq;

    fn adapter() -> (RhaiAdapter, ScriptContext) {
        let context = ScriptContext::standalone();
        let adapter = RhaiAdapter::new();
        adapter.initialize().unwrap();
        adapter.register_api(&context).unwrap();
        (adapter, context)
    }

    #[test]
    fn test_scene_is_driven_from_rhai() {
        let (rhai, ctx) = adapter();
        rhai.execute_string(
            r#"
            let cube = createCube("box");
            cube.tag = "crate";
            addEntity(cube);
            cube.translate(1, 2, 3);
            cube.transform.position.x = 4.0;
            "#,
        )
        .unwrap();

        let scene = ctx.scene();
        let id = scene.find_by_tag("crate")[0];
        let position = scene.get(id).unwrap().transform.position;
        assert_relative_eq!(position.x, 4.0);
        assert_relative_eq!(position.z, 3.0);
    }

    #[test]
    fn test_failing_callback_does_not_block_others() {
        let (rhai, ctx) = adapter();
        rhai.execute_string(
            r#"
            let count = 0;
            onUpdate(|dt| { throw "boom"; });
            onUpdate(|dt| {
                count += 1;
                setAmbientColor(count, 0, 0);
            });
            "#,
        )
        .unwrap();
        assert_eq!(rhai.callback_count(), 2);

        for _ in 0..3 {
            rhai.update(0.016);
        }
        assert_eq!(ctx.scene().ambient_color(), Color::new(3.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_constants_visible_inside_functions() {
        let (rhai, _ctx) = adapter();
        rhai.execute_string(
            r#"
            fn space() { KEY_SPACE }
            if space() != 32 { throw "bad key constant"; }
            if MOUSE_RIGHT != 1 { throw "bad button constant"; }
            "#,
        )
        .unwrap();
    }

    #[test]
    fn test_syntax_error_is_attributed() {
        let (rhai, _ctx) = adapter();
        let err = rhai.execute_string("let = ;").unwrap_err();
        assert!(matches!(err, ScriptError::Syntax { origin, .. } if origin == "<string>"));
    }

    #[test]
    fn test_unreferenced_entity_is_released_after_run() {
        let (rhai, ctx) = adapter();
        rhai.execute_string("let kept = createCube(\"kept\"); addEntity(kept); let temp = createSphere();")
            .unwrap();
        assert_eq!(ctx.scene_mut().collect_orphans(), 1);
        assert_eq!(ctx.scene().len(), 1);
    }

    #[test]
    fn test_binding_errors_become_runtime_errors() {
        let (rhai, _ctx) = adapter();
        let err = rhai.execute_string("let scene = getScene(); scene.lightCount = 3;").unwrap_err();
        assert!(matches!(err, ScriptError::Runtime { message, .. } if message.contains("read-only")));
    }
}
