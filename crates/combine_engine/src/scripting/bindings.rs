//! Script API, defined once
//!
//! Every adapter exposes the same surface:
//!
//! - the free functions in [`FUNCTIONS`], each with a parameter list used
//!   for arity checks and registration,
//! - the methods in [`METHODS`] and the properties in [`PROPERTIES`] on
//!   native references,
//! - the integer constants from [`constants`].
//!
//! Values cross the boundary as [`ScriptValue`]. Native objects cross as
//! [`NativeRef`]: entity and light references own what they point at,
//! while transform, vector and color references only name a field of a
//! parent and are checked on every access.

use std::cell::RefCell;
use std::fmt;
use std::path::PathBuf;
use std::rc::{Rc, Weak};

use rand::Rng;
use thiserror::Error;

use super::context::{RenderRequest, ScriptContext};
use crate::assets::MapData;
use crate::foundation::math::{utils, Color, Vec2, Vec3};
use crate::input::{KeyCode, MouseButton};
use crate::render::{Light, LightType, Vertex};
use crate::scene::{ObjectHandle, ObjectId, Renderable, SceneObject};

/// Errors raised by native bindings into the calling script
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    /// Wrong number of arguments
    #[error("{function} expects {expected} arguments, got {given}")]
    Arity {
        /// Script-facing function name
        function: String,
        /// Accepted count, e.g. `"1..3"`
        expected: String,
        /// Count actually passed
        given: usize,
    },

    /// An argument had the wrong type
    #[error("{function}: argument {index} must be {expected}")]
    BadArgument {
        /// Script-facing function name
        function: String,
        /// 1-based argument position
        index: usize,
        /// Description of the accepted type
        expected: &'static str,
    },

    /// A back-reference outlived the object owning the field
    #[error("{0} reference outlived its owner")]
    StaleReference(&'static str),

    /// No such property or method
    #[error("{kind} has no member '{member}'")]
    UnknownMember {
        /// Script type name
        kind: &'static str,
        /// Requested member
        member: String,
    },

    /// The property cannot be assigned
    #[error("{kind}.{member} is read-only")]
    ReadOnly {
        /// Script type name
        kind: &'static str,
        /// Assigned member
        member: String,
    },

    /// A geometry member was used on an entity without geometry
    #[error("entity '{0}' has no geometry")]
    NotRenderable(String),
}

/// Result type for binding calls
pub type BindingResult<T> = Result<T, BindingError>;

/// A value crossing the script boundary
#[derive(Debug, Clone, Default)]
pub enum ScriptValue {
    /// `nil` or unit
    #[default]
    Nil,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Number(f64),
    /// String
    Str(String),
    /// Sequence, 1-based in Lua
    List(Vec<ScriptValue>),
    /// String-keyed fields, e.g. `{x, y, z}`
    Record(Vec<(String, ScriptValue)>),
    /// Handle to a live engine object
    Ref(NativeRef),
}

impl ScriptValue {
    /// `{x, y}` record
    pub fn vec2(v: Vec2) -> Self {
        Self::Record(vec![
            ("x".to_string(), Self::Number(f64::from(v.x))),
            ("y".to_string(), Self::Number(f64::from(v.y))),
        ])
    }

    /// `{x, y, z}` record
    pub fn vec3(v: Vec3) -> Self {
        Self::Record(vec![
            ("x".to_string(), Self::Number(f64::from(v.x))),
            ("y".to_string(), Self::Number(f64::from(v.y))),
            ("z".to_string(), Self::Number(f64::from(v.z))),
        ])
    }

    /// Float from an `f32`
    pub fn number(value: f32) -> Self {
        Self::Number(f64::from(value))
    }

    /// Numeric value of an integer or float
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Int(i) => Some(i as f64),
            Self::Number(n) => Some(n),
            _ => None,
        }
    }

    /// Integer value of an integer or integral float
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Int(i) => Some(i),
            Self::Number(n) if n.fract() == 0.0 && n.is_finite() => Some(n as i64),
            _ => None,
        }
    }

    /// Lua-style truthiness: only nil and false are false
    pub fn truthy(&self) -> bool {
        !matches!(self, Self::Nil | Self::Bool(false))
    }

    /// Whether the value is `nil`
    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// Field of a record
    pub fn field(&self, key: &str) -> Option<&ScriptValue> {
        match self {
            Self::Record(fields) => fields.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Script-facing type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Number(_) => "number",
            Self::Str(_) => "string",
            Self::List(_) => "list",
            Self::Record(_) => "record",
            Self::Ref(target) => target.kind().as_str(),
        }
    }
}

impl From<bool> for ScriptValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f32> for ScriptValue {
    fn from(value: f32) -> Self {
        Self::number(value)
    }
}

impl From<String> for ScriptValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<NativeRef> for ScriptValue {
    fn from(value: NativeRef) -> Self {
        Self::Ref(value)
    }
}

/// Kinds of native reference; each has its own members
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    /// The scene
    Scene,
    /// The camera
    Camera,
    /// A scene object
    Entity,
    /// A light
    Light,
    /// An object's transform
    Transform,
    /// A vector field
    Vector,
    /// A color field
    Color,
}

impl RefKind {
    /// Script-facing name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scene => "scene",
            Self::Camera => "camera",
            Self::Entity => "entity",
            Self::Light => "light",
            Self::Transform => "transform",
            Self::Vector => "vector",
            Self::Color => "color",
        }
    }
}

/// Vector field of a transform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformField {
    /// `position`
    Position,
    /// `rotation`
    Rotation,
    /// `scale`
    Scale,
}

/// Vector field of the camera
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraField {
    /// `position`
    Position,
    /// `rotation`
    Rotation,
}

/// Vector field of a light
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightField {
    /// `position`
    Position,
    /// `direction`
    Direction,
}

/// A vector field of some parent
#[derive(Debug, Clone)]
pub enum VectorRef {
    /// Transform field of a scene object
    Entity(ObjectId, TransformField),
    /// Camera field
    Camera(CameraField),
    /// Field of a script-owned light
    Light(Weak<RefCell<Light>>, LightField),
}

/// A color field of some parent
#[derive(Debug, Clone)]
pub enum ColorRef {
    /// Renderable color of a scene object
    Entity(ObjectId),
    /// Color of a script-owned light
    Light(Weak<RefCell<Light>>),
    /// Scene ambient color
    Ambient,
    /// Camera clear color
    ClearColor,
}

/// A native object as seen by scripts
#[derive(Debug, Clone)]
pub enum NativeRef {
    /// The engine's scene
    Scene,
    /// The scene's camera
    Camera,
    /// Keeps the object alive
    Entity(ObjectHandle),
    /// A script-owned light; `scene:addLight` copies it into the scene
    Light(Rc<RefCell<Light>>),
    /// Transform of an entity, not keeping it alive
    Transform(ObjectId),
    /// A vector field, not keeping its parent alive
    Vector(VectorRef),
    /// A color field, not keeping its parent alive
    Color(ColorRef),
}

impl NativeRef {
    /// Kind used to look up members
    pub fn kind(&self) -> RefKind {
        match self {
            Self::Scene => RefKind::Scene,
            Self::Camera => RefKind::Camera,
            Self::Entity(_) => RefKind::Entity,
            Self::Light(_) => RefKind::Light,
            Self::Transform(_) => RefKind::Transform,
            Self::Vector(_) => RefKind::Vector,
            Self::Color(_) => RefKind::Color,
        }
    }

    /// Whether both refer to the same native object or field
    pub fn same_target(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Scene, Self::Scene) | (Self::Camera, Self::Camera) => true,
            (Self::Entity(a), Self::Entity(b)) => a == b,
            (Self::Light(a), Self::Light(b)) => Rc::ptr_eq(a, b),
            (Self::Transform(a), Self::Transform(b)) => a == b,
            (Self::Vector(a), Self::Vector(b)) => match (a, b) {
                (VectorRef::Entity(a, fa), VectorRef::Entity(b, fb)) => a == b && fa == fb,
                (VectorRef::Camera(a), VectorRef::Camera(b)) => a == b,
                (VectorRef::Light(a, fa), VectorRef::Light(b, fb)) => a.ptr_eq(b) && fa == fb,
                _ => false,
            },
            (Self::Color(a), Self::Color(b)) => match (a, b) {
                (ColorRef::Entity(a), ColorRef::Entity(b)) => a == b,
                (ColorRef::Light(a), ColorRef::Light(b)) => a.ptr_eq(b),
                (ColorRef::Ambient, ColorRef::Ambient) | (ColorRef::ClearColor, ColorRef::ClearColor) => true,
                _ => false,
            },
            _ => false,
        }
    }
}

/// One declared parameter
#[derive(Debug, Clone, Copy)]
pub struct Param {
    /// Name shown in signatures
    pub name: &'static str,
    /// Whether the argument may be omitted
    pub optional: bool,
}

const fn req(name: &'static str) -> Param {
    Param { name, optional: false }
}

const fn opt(name: &'static str) -> Param {
    Param { name, optional: true }
}

/// Shape of a returned value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Nothing
    Nil,
    /// Boolean
    Bool,
    /// Integer
    Int,
    /// Float
    Number,
    /// Scene object
    Entity,
    /// List of scene objects
    EntityList,
    /// Light
    Light,
    /// The scene
    Scene,
    /// The camera
    Camera,
    /// `{x, y}` record
    Vec2,
    /// `{x, y, z}` record or vector reference
    Vec3,
}

impl Shape {
    fn as_str(self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Bool => "boolean",
            Self::Int => "integer",
            Self::Number => "number",
            Self::Entity => "entity",
            Self::EntityList => "entity[]",
            Self::Light => "light",
            Self::Scene => "scene",
            Self::Camera => "camera",
            Self::Vec2 => "{x, y}",
            Self::Vec3 => "{x, y, z}",
        }
    }
}

fn check_arity(function: &str, params: &[Param], given: usize) -> BindingResult<()> {
    let min = params.iter().filter(|p| !p.optional).count();
    let max = params.len();
    if (min..=max).contains(&given) {
        return Ok(());
    }
    let expected = if min == max {
        min.to_string()
    } else {
        format!("{}..{}", min, max)
    };
    Err(BindingError::Arity {
        function: function.to_string(),
        expected,
        given,
    })
}

fn signature(name: &str, params: &[Param], returns: Shape) -> String {
    let params: Vec<String> = params
        .iter()
        .map(|p| {
            if p.optional {
                format!("{}?", p.name)
            } else {
                p.name.to_string()
            }
        })
        .collect();
    format!("{}({}) -> {}", name, params.join(", "), returns.as_str())
}

/// A free function exposed to every adapter
pub struct NativeFunction {
    /// Global name in every language
    pub name: &'static str,
    /// Declared parameters
    pub params: &'static [Param],
    /// Shape of the result
    pub returns: Shape,
    call: fn(&ScriptContext, &Args<'_>) -> BindingResult<ScriptValue>,
}

impl NativeFunction {
    /// Number of required arguments
    pub fn min_args(&self) -> usize {
        self.params.iter().filter(|p| !p.optional).count()
    }

    /// Number of declared arguments
    pub fn max_args(&self) -> usize {
        self.params.len()
    }

    /// Check arity, then call
    pub fn invoke(&self, context: &ScriptContext, values: &[ScriptValue]) -> BindingResult<ScriptValue> {
        check_arity(self.name, self.params, values.len())?;
        (self.call)(context, &Args::new(self.name, values))
    }

    /// Human-readable signature, e.g. `createPlane(name?, width?, height?) -> entity`
    pub fn signature(&self) -> String {
        signature(self.name, self.params, self.returns)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.signature())
    }
}

/// A method on one kind of native reference
pub struct NativeMethod {
    /// Receiver kind
    pub kind: RefKind,
    /// Method name
    pub name: &'static str,
    /// Declared parameters, receiver excluded
    pub params: &'static [Param],
    /// Shape of the result
    pub returns: Shape,
    call: fn(&ScriptContext, &NativeRef, &Args<'_>) -> BindingResult<ScriptValue>,
}

impl NativeMethod {
    /// Number of required arguments
    pub fn min_args(&self) -> usize {
        self.params.iter().filter(|p| !p.optional).count()
    }

    /// Number of declared arguments
    pub fn max_args(&self) -> usize {
        self.params.len()
    }

    /// Check arity, then call on `target`
    pub fn invoke(
        &self,
        context: &ScriptContext,
        target: &NativeRef,
        values: &[ScriptValue],
    ) -> BindingResult<ScriptValue> {
        check_arity(self.name, self.params, values.len())?;
        (self.call)(context, target, &Args::new(self.name, values))
    }

    /// Human-readable signature prefixed by the receiver kind
    pub fn signature(&self) -> String {
        format!("{}:{}", self.kind.as_str(), signature(self.name, self.params, self.returns))
    }
}

impl fmt::Debug for NativeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.signature())
    }
}

/// Positional arguments with typed accessors
///
/// A trailing `nil` counts as an omitted optional argument.
#[derive(Debug, Clone, Copy)]
pub struct Args<'a> {
    function: &'a str,
    values: &'a [ScriptValue],
}

impl<'a> Args<'a> {
    /// Arguments passed to `function`
    pub fn new(function: &'a str, values: &'a [ScriptValue]) -> Self {
        Self { function, values }
    }

    /// Number of values passed
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no value was passed
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn present(&self, index: usize) -> Option<&'a ScriptValue> {
        self.values.get(index).filter(|value| !value.is_nil())
    }

    fn bad(&self, index: usize, expected: &'static str) -> BindingError {
        BindingError::BadArgument {
            function: self.function.to_string(),
            index: index + 1,
            expected,
        }
    }

    /// Number argument
    pub fn number(&self, index: usize) -> BindingResult<f64> {
        self.present(index)
            .and_then(ScriptValue::as_f64)
            .ok_or_else(|| self.bad(index, "a number"))
    }

    /// Number argument, or `default` when omitted
    pub fn number_or(&self, index: usize, default: f64) -> BindingResult<f64> {
        match self.present(index) {
            None => Ok(default),
            Some(_) => self.number(index),
        }
    }

    /// Number narrowed to `f32`
    pub fn float(&self, index: usize) -> BindingResult<f32> {
        self.number(index).map(|n| n as f32)
    }

    /// `f32` argument, or `default` when omitted
    pub fn float_or(&self, index: usize, default: f32) -> BindingResult<f32> {
        self.number_or(index, f64::from(default)).map(|n| n as f32)
    }

    /// Integer argument; integral floats are accepted
    pub fn int(&self, index: usize) -> BindingResult<i64> {
        self.present(index)
            .and_then(ScriptValue::as_i64)
            .ok_or_else(|| self.bad(index, "an integer"))
    }

    /// Integer argument, or `default` when omitted
    pub fn int_or(&self, index: usize, default: i64) -> BindingResult<i64> {
        match self.present(index) {
            None => Ok(default),
            Some(_) => self.int(index),
        }
    }

    /// String argument
    pub fn string(&self, index: usize) -> BindingResult<&'a str> {
        match self.present(index) {
            Some(ScriptValue::Str(s)) => Ok(s),
            _ => Err(self.bad(index, "a string")),
        }
    }

    /// String argument, or `default` when omitted
    pub fn string_or(&self, index: usize, default: &'a str) -> BindingResult<&'a str> {
        match self.present(index) {
            None => Ok(default),
            Some(_) => self.string(index),
        }
    }

    /// Truthiness of the argument; missing is false
    pub fn truthy(&self, index: usize) -> bool {
        self.values.get(index).is_some_and(ScriptValue::truthy)
    }

    /// Entity argument
    pub fn entity(&self, index: usize) -> BindingResult<&'a ObjectHandle> {
        match self.present(index) {
            Some(ScriptValue::Ref(NativeRef::Entity(handle))) => Ok(handle),
            _ => Err(self.bad(index, "an entity")),
        }
    }

    /// Light argument
    pub fn light(&self, index: usize) -> BindingResult<&'a Rc<RefCell<Light>>> {
        match self.present(index) {
            Some(ScriptValue::Ref(NativeRef::Light(light))) => Ok(light),
            _ => Err(self.bad(index, "a light")),
        }
    }

    /// Three numbers starting at `index`
    pub fn vec3(&self, index: usize) -> BindingResult<Vec3> {
        Ok(Vec3::new(
            self.float(index)?,
            self.float(index + 1)?,
            self.float(index + 2)?,
        ))
    }
}

macro_rules! native_fn {
    ($name:literal ($($param:expr),*) -> $ret:ident, $call:expr) => {
        NativeFunction {
            name: $name,
            params: &[$($param),*],
            returns: Shape::$ret,
            call: $call,
        }
    };
}

macro_rules! native_method {
    ($kind:ident : $name:literal ($($param:expr),*) -> $ret:ident, $call:expr) => {
        NativeMethod {
            kind: RefKind::$kind,
            name: $name,
            params: &[$($param),*],
            returns: Shape::$ret,
            call: $call,
        }
    };
}

/// Free functions shared by every adapter
pub static FUNCTIONS: &[NativeFunction] = &[
    // scene
    native_fn!("getScene"() -> Scene, |_, _| Ok(NativeRef::Scene.into())),
    native_fn!("getCamera"() -> Camera, |_, _| Ok(NativeRef::Camera.into())),
    native_fn!("addEntity"(req("entity")) -> Bool, |ctx, args| {
        let id = args.entity(0)?.id();
        Ok(ctx.scene_mut().insert(id).into())
    }),
    native_fn!("removeEntity"(req("entity")) -> Bool, |ctx, args| {
        let id = args.entity(0)?.id();
        Ok(ctx.scene_mut().remove(id).into())
    }),
    native_fn!("removeEntityByName"(req("name")) -> Int, |ctx, args| {
        let removed = ctx.scene_mut().remove_by_name(args.string(0)?);
        Ok(ScriptValue::Int(removed as i64))
    }),
    native_fn!("findEntity"(req("name")) -> Entity, |ctx, args| {
        let scene = ctx.scene();
        Ok(scene
            .find_by_name(args.string(0)?)
            .and_then(|id| scene.handle(id))
            .map_or(ScriptValue::Nil, |handle| NativeRef::Entity(handle).into()))
    }),
    native_fn!("findEntitiesByTag"(req("tag")) -> EntityList, |ctx, args| {
        let scene = ctx.scene();
        let entities = scene
            .find_by_tag(args.string(0)?)
            .into_iter()
            .filter_map(|id| scene.handle(id))
            .map(|handle| NativeRef::Entity(handle).into())
            .collect();
        Ok(ScriptValue::List(entities))
    }),
    native_fn!("clearScene"() -> Nil, |ctx, _| {
        ctx.scene_mut().clear();
        Ok(ScriptValue::Nil)
    }),
    native_fn!("setAmbientColor"(req("r"), req("g"), req("b"), opt("a")) -> Nil, |ctx, args| {
        let color = Color::new(args.float(0)?, args.float(1)?, args.float(2)?, args.float_or(3, 1.0)?);
        ctx.scene_mut().set_ambient_color(color);
        Ok(ScriptValue::Nil)
    }),
    native_fn!("loadMap"(req("path")) -> Bool, |ctx, args| {
        let path = args.string(0)?;
        match MapData::load(path) {
            Ok(map) => {
                map.apply_to_scene(&mut ctx.scene_mut());
                Ok(true.into())
            }
            Err(err) => {
                log::warn!("loadMap({}) failed: {}", path, err);
                Ok(false.into())
            }
        }
    }),
    native_fn!("saveMap"(req("path")) -> Bool, |ctx, args| {
        let path = args.string(0)?;
        let map = MapData::from_scene(&ctx.scene());
        match map.save(path) {
            Ok(()) => Ok(true.into()),
            Err(err) => {
                log::warn!("saveMap({}) failed: {}", path, err);
                Ok(false.into())
            }
        }
    }),
    // factories
    native_fn!("createMesh"(opt("name")) -> Entity, |ctx, args| {
        spawn(ctx, SceneObject::with_renderable(args.string_or(0, "Mesh")?, Renderable::default()))
    }),
    native_fn!("createCube"(opt("name")) -> Entity, |ctx, args| {
        spawn(ctx, SceneObject::with_renderable(args.string_or(0, "Cube")?, Renderable::cube()))
    }),
    native_fn!("createPlane"(opt("name"), opt("width"), opt("height")) -> Entity, |ctx, args| {
        let renderable = Renderable::plane(args.float_or(1, 1.0)?, args.float_or(2, 1.0)?);
        spawn(ctx, SceneObject::with_renderable(args.string_or(0, "Plane")?, renderable))
    }),
    native_fn!("createSphere"(opt("name"), opt("segments"), opt("rings")) -> Entity, |ctx, args| {
        let segments = u32::try_from(args.int_or(1, 16)?).unwrap_or(16);
        let rings = u32::try_from(args.int_or(2, 16)?).unwrap_or(16);
        let renderable = Renderable::sphere(segments, rings);
        spawn(ctx, SceneObject::with_renderable(args.string_or(0, "Sphere")?, renderable))
    }),
    native_fn!("createLight"(opt("type")) -> Light, |_, args| {
        let light_type = LightType::from_code(args.int_or(0, 0)?).unwrap_or_default();
        Ok(NativeRef::Light(Rc::new(RefCell::new(Light::of_type(light_type)))).into())
    }),
    native_fn!("createEntity"(opt("name")) -> Entity, |ctx, args| {
        spawn(ctx, SceneObject::new(args.string_or(0, "Entity")?))
    }),
    // input
    native_fn!("isKeyDown"(req("key")) -> Bool, |ctx, args| {
        Ok(ctx.input().is_key_down(KeyCode::from_code(args.int(0)?)).into())
    }),
    native_fn!("isKeyPressed"(req("key")) -> Bool, |ctx, args| {
        Ok(ctx.input().is_key_pressed(KeyCode::from_code(args.int(0)?)).into())
    }),
    native_fn!("isKeyReleased"(req("key")) -> Bool, |ctx, args| {
        Ok(ctx.input().is_key_released(KeyCode::from_code(args.int(0)?)).into())
    }),
    native_fn!("isMouseButtonDown"(req("button")) -> Bool, |ctx, args| {
        let button = MouseButton::from_index(args.int(0)?);
        Ok(button.is_some_and(|b| ctx.input().is_mouse_button_down(b)).into())
    }),
    native_fn!("isMouseButtonPressed"(req("button")) -> Bool, |ctx, args| {
        let button = MouseButton::from_index(args.int(0)?);
        Ok(button.is_some_and(|b| ctx.input().is_mouse_button_pressed(b)).into())
    }),
    native_fn!("isMouseButtonReleased"(req("button")) -> Bool, |ctx, args| {
        let button = MouseButton::from_index(args.int(0)?);
        Ok(button.is_some_and(|b| ctx.input().is_mouse_button_released(b)).into())
    }),
    native_fn!("getMousePosition"() -> Vec2, |ctx, _| Ok(ScriptValue::vec2(ctx.input().pointer_position()))),
    native_fn!("getMouseDelta"() -> Vec2, |ctx, _| Ok(ScriptValue::vec2(ctx.input().pointer_delta()))),
    native_fn!("getScrollDelta"() -> Vec2, |ctx, _| Ok(ScriptValue::vec2(ctx.input().scroll_delta()))),
    // time
    native_fn!("deltaTime"() -> Number, |ctx, _| Ok(ctx.clock().delta_time().into())),
    native_fn!("unscaledDeltaTime"() -> Number, |ctx, _| Ok(ctx.clock().unscaled_delta_time().into())),
    native_fn!("totalTime"() -> Number, |ctx, _| Ok(ctx.clock().total_time().into())),
    native_fn!("fps"() -> Number, |ctx, _| Ok(ctx.clock().fps().into())),
    native_fn!("frameCount"() -> Int, |ctx, _| {
        Ok(ScriptValue::Int(i64::try_from(ctx.clock().frame_count()).unwrap_or(i64::MAX)))
    }),
    native_fn!("setTimeScale"(req("scale")) -> Nil, |ctx, args| {
        ctx.clock_mut().set_time_scale(args.float(0)?);
        Ok(ScriptValue::Nil)
    }),
    native_fn!("getTimeScale"() -> Number, |ctx, _| Ok(ctx.clock().time_scale().into())),
    // renderer and engine
    native_fn!("quit"() -> Nil, |ctx, _| {
        ctx.signals().request_stop();
        Ok(ScriptValue::Nil)
    }),
    native_fn!("setWireframe"(req("enabled")) -> Nil, |ctx, args| {
        ctx.signals().push(RenderRequest::SetWireframe(args.truthy(0)));
        Ok(ScriptValue::Nil)
    }),
    native_fn!("setVSync"(req("enabled")) -> Nil, |ctx, args| {
        ctx.signals().push(RenderRequest::SetVSync(args.truthy(0)));
        Ok(ScriptValue::Nil)
    }),
    native_fn!("loadShader"(req("name"), req("vertexPath"), req("fragmentPath")) -> Nil, |ctx, args| {
        ctx.signals().push(RenderRequest::LoadShader {
            name: args.string(0)?.to_string(),
            vertex_path: PathBuf::from(args.string(1)?),
            fragment_path: PathBuf::from(args.string(2)?),
        });
        Ok(ScriptValue::Nil)
    }),
    native_fn!("useShader"(req("name")) -> Nil, |ctx, args| {
        ctx.signals().push(RenderRequest::UseShader(args.string(0)?.to_string()));
        Ok(ScriptValue::Nil)
    }),
    native_fn!("require"(req("path")) -> Bool, |ctx, args| {
        let path = args.string(0)?;
        let Some(dispatcher) = ctx.dispatcher() else {
            log::warn!("require({}): no script dispatcher", path);
            return Ok(false.into());
        };
        match dispatcher.execute_file(path.as_ref()) {
            Ok(()) => Ok(true.into()),
            Err(err) => {
                log::error!("require({}) failed: {}", path, err);
                Ok(false.into())
            }
        }
    }),
    // math
    native_fn!("random"(req("min"), req("max")) -> Number, |_, args| {
        Ok(ScriptValue::Number(random_range(args.number(0)?, args.number(1)?)))
    }),
    native_fn!("clamp"(req("value"), req("min"), req("max")) -> Number, |_, args| {
        Ok(utils::clamp(args.float(0)?, args.float(1)?, args.float(2)?).into())
    }),
    native_fn!("lerp"(req("a"), req("b"), req("t")) -> Number, |_, args| {
        Ok(utils::lerp(args.float(0)?, args.float(1)?, args.float(2)?).into())
    }),
    native_fn!("radians"(req("degrees")) -> Number, |_, args| Ok(utils::deg_to_rad(args.float(0)?).into())),
    native_fn!("degrees"(req("radians")) -> Number, |_, args| Ok(utils::rad_to_deg(args.float(0)?).into())),
];

/// Methods on native references
pub static METHODS: &[NativeMethod] = &[
    native_method!(Entity: "addVertex"(req("x"), req("y"), req("z"), opt("nx"), opt("ny"), opt("nz"), opt("u"), opt("v")) -> Int, |ctx, target, args| {
        let position = args.vec3(0)?;
        let normal = Vec3::new(args.float_or(3, 0.0)?, args.float_or(4, 1.0)?, args.float_or(5, 0.0)?);
        let uv = Vec2::new(args.float_or(6, 0.0)?, args.float_or(7, 0.0)?);
        with_renderable(ctx, target, |r| {
            ScriptValue::Int(i64::from(r.add_vertex_full(Vertex::new(position, normal, uv))))
        })
    }),
    native_method!(Entity: "addIndex"(req("index")) -> Nil, |ctx, target, args| {
        let index = index_arg(args, 0)?;
        with_renderable(ctx, target, |r| {
            r.add_index(index);
            ScriptValue::Nil
        })
    }),
    native_method!(Entity: "addTriangle"(req("a"), req("b"), req("c")) -> Nil, |ctx, target, args| {
        let (a, b, c) = (index_arg(args, 0)?, index_arg(args, 1)?, index_arg(args, 2)?);
        with_renderable(ctx, target, |r| {
            r.add_triangle(a, b, c);
            ScriptValue::Nil
        })
    }),
    native_method!(Entity: "clear"() -> Nil, |ctx, target, _| {
        with_renderable(ctx, target, |r| {
            r.clear();
            ScriptValue::Nil
        })
    }),
    native_method!(Entity: "calculateNormals"() -> Nil, |ctx, target, _| {
        with_renderable(ctx, target, |r| {
            r.calculate_normals();
            ScriptValue::Nil
        })
    }),
    native_method!(Entity: "translate"(req("x"), req("y"), req("z")) -> Nil, |ctx, target, args| {
        let delta = args.vec3(0)?;
        with_entity(ctx, target, |object| {
            object.transform.translate(delta);
            ScriptValue::Nil
        })
    }),
    native_method!(Entity: "rotate"(req("x"), req("y"), req("z")) -> Nil, |ctx, target, args| {
        let delta = args.vec3(0)?;
        with_entity(ctx, target, |object| {
            object.transform.rotate(delta);
            ScriptValue::Nil
        })
    }),
    native_method!(Vector: "length"() -> Number, |ctx, target, _| {
        Ok(read_vector(ctx, vector_target(target)?)?.norm().into())
    }),
    native_method!(Vector: "normalized"() -> Vec3, |ctx, target, _| {
        let v = read_vector(ctx, vector_target(target)?)?;
        let length = v.norm();
        Ok(ScriptValue::vec3(if length > 0.0 { v / length } else { v }))
    }),
    native_method!(Camera: "forward"() -> Vec3, |ctx, _, _| Ok(ScriptValue::vec3(ctx.scene().camera().forward()))),
    native_method!(Camera: "right"() -> Vec3, |ctx, _, _| Ok(ScriptValue::vec3(ctx.scene().camera().right()))),
    native_method!(Camera: "up"() -> Vec3, |ctx, _, _| Ok(ScriptValue::vec3(ctx.scene().camera().up()))),
    native_method!(Scene: "addLight"(req("light")) -> Nil, |ctx, _, args| {
        let light = args.light(0)?.borrow().clone();
        ctx.scene_mut().add_light(light);
        Ok(ScriptValue::Nil)
    }),
    native_method!(Scene: "clear"() -> Nil, |ctx, _, _| {
        ctx.scene_mut().clear();
        Ok(ScriptValue::Nil)
    }),
    native_method!(Scene: "getCamera"() -> Camera, |_, _, _| Ok(NativeRef::Camera.into())),
];

/// A property on one kind of native reference
#[derive(Debug, Clone, Copy)]
pub struct Property {
    /// Owner kind
    pub kind: RefKind,
    /// Property name
    pub name: &'static str,
    /// Whether scripts may assign it
    pub writable: bool,
}

macro_rules! properties {
    (@access rw) => { true };
    (@access ro) => { false };
    ($($kind:ident: $($name:literal $access:ident),*;)*) => {
        &[$($(Property { kind: RefKind::$kind, name: $name, writable: properties!(@access $access) },)*)*]
    };
}

/// Properties on native references
pub static PROPERTIES: &[Property] = properties! {
    Entity: "name" rw, "tag" rw, "active" rw, "transform" ro, "color" rw, "texture" rw,
        "dirty" ro, "vertexCount" ro, "indexCount" ro;
    Transform: "position" rw, "rotation" rw, "scale" rw;
    Vector: "x" rw, "y" rw, "z" rw;
    Color: "r" rw, "g" rw, "b" rw, "a" rw;
    Camera: "position" rw, "rotation" rw, "fov" rw, "nearPlane" rw, "farPlane" rw, "clearColor" rw;
    Light: "type" rw, "position" rw, "direction" rw, "color" rw, "intensity" rw, "range" rw,
        "spotAngle" rw;
    Scene: "camera" ro, "ambientColor" rw, "lightCount" ro, "entityCount" ro;
};

/// Free function by name
pub fn function(name: &str) -> Option<&'static NativeFunction> {
    FUNCTIONS.iter().find(|f| f.name == name)
}

/// Method of a reference kind by name
pub fn method(kind: RefKind, name: &str) -> Option<&'static NativeMethod> {
    METHODS.iter().find(|m| m.kind == kind && m.name == name)
}

/// Property of a reference kind by name
pub fn property(kind: RefKind, name: &str) -> Option<&'static Property> {
    PROPERTIES.iter().find(|p| p.kind == kind && p.name == name)
}

/// Every property name, each once
pub fn property_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = PROPERTIES.iter().map(|p| p.name).collect();
    names.sort_unstable();
    names.dedup();
    names
}

/// Every method name, each once
pub fn method_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = METHODS.iter().map(|m| m.name).collect();
    names.sort_unstable();
    names.dedup();
    names
}

/// Widest argument count over every method named `name`, excluding the receiver
pub fn method_arity_range(name: &str) -> (usize, usize) {
    METHODS
        .iter()
        .filter(|m| m.name == name)
        .fold((usize::MAX, 0), |(min, max), m| {
            (min.min(m.min_args()), max.max(m.max_args()))
        })
}

/// `KEY_*`, `MOUSE_*` and `LIGHT_*` constants
pub fn constants() -> Vec<(String, i64)> {
    let keys = KeyCode::ALL
        .iter()
        .map(|key| (format!("KEY_{}", key.script_name()), i64::from(key.code())));
    let buttons = [
        ("MOUSE_LEFT", MouseButton::Left),
        ("MOUSE_RIGHT", MouseButton::Right),
        ("MOUSE_MIDDLE", MouseButton::Middle),
    ]
    .into_iter()
    .map(|(name, button)| (name.to_string(), i64::from(button.index())));
    let lights = [LightType::Directional, LightType::Point, LightType::Spot]
        .into_iter()
        .map(|t| (format!("LIGHT_{}", t.as_str().to_ascii_uppercase()), i64::from(t.code())));
    keys.chain(buttons).chain(lights).collect()
}

/// Read a property
pub fn get_property(context: &ScriptContext, target: &NativeRef, name: &str) -> BindingResult<ScriptValue> {
    let kind = target.kind();
    if property(kind, name).is_none() {
        return Err(unknown(kind, name));
    }

    match target {
        NativeRef::Entity(handle) => {
            let id = handle.id();
            with_entity(context, target, |object| match name {
                "name" => ScriptValue::Str(object.name.clone()),
                "tag" => ScriptValue::Str(object.tag.clone()),
                "active" => ScriptValue::Bool(object.active),
                "transform" => NativeRef::Transform(id).into(),
                "color" if object.is_renderable() => NativeRef::Color(ColorRef::Entity(id)).into(),
                "texture" => object
                    .renderable()
                    .and_then(Renderable::texture)
                    .map_or(ScriptValue::Nil, |t| ScriptValue::Str(t.to_string())),
                "dirty" => object.renderable().is_some_and(Renderable::is_dirty).into(),
                "vertexCount" => ScriptValue::Int(object.renderable().map_or(0, |r| r.vertex_count() as i64)),
                "indexCount" => ScriptValue::Int(object.renderable().map_or(0, |r| r.index_count() as i64)),
                _ => ScriptValue::Nil,
            })
        }
        NativeRef::Transform(id) => {
            let field = match name {
                "position" => TransformField::Position,
                "rotation" => TransformField::Rotation,
                _ => TransformField::Scale,
            };
            if !context.scene().is_alive(*id) {
                return Err(BindingError::StaleReference("transform"));
            }
            Ok(NativeRef::Vector(VectorRef::Entity(*id, field)).into())
        }
        NativeRef::Vector(vector) => {
            let v = read_vector(context, vector)?;
            Ok(match name {
                "x" => v.x,
                "y" => v.y,
                _ => v.z,
            }
            .into())
        }
        NativeRef::Color(color) => {
            let c = with_color(context, color, |c| *c)?;
            Ok(match name {
                "r" => c.r,
                "g" => c.g,
                "b" => c.b,
                _ => c.a,
            }
            .into())
        }
        NativeRef::Camera => {
            let scene = context.scene();
            let camera = scene.camera();
            Ok(match name {
                "position" => NativeRef::Vector(VectorRef::Camera(CameraField::Position)).into(),
                "rotation" => NativeRef::Vector(VectorRef::Camera(CameraField::Rotation)).into(),
                "fov" => camera.fov.into(),
                "nearPlane" => camera.near_plane.into(),
                "farPlane" => camera.far_plane.into(),
                _ => NativeRef::Color(ColorRef::ClearColor).into(),
            })
        }
        NativeRef::Light(light) => {
            let weak = Rc::downgrade(light);
            let light = light.borrow();
            Ok(match name {
                "type" => ScriptValue::Int(i64::from(light.light_type.code())),
                "position" => NativeRef::Vector(VectorRef::Light(weak, LightField::Position)).into(),
                "direction" => NativeRef::Vector(VectorRef::Light(weak, LightField::Direction)).into(),
                "color" => NativeRef::Color(ColorRef::Light(weak)).into(),
                "intensity" => light.intensity.into(),
                "range" => light.range.into(),
                _ => light.spot_angle.into(),
            })
        }
        NativeRef::Scene => {
            let scene = context.scene();
            Ok(match name {
                "camera" => NativeRef::Camera.into(),
                "ambientColor" => NativeRef::Color(ColorRef::Ambient).into(),
                "lightCount" => ScriptValue::Int(scene.lights().len() as i64),
                _ => ScriptValue::Int(scene.len() as i64),
            })
        }
    }
}

/// Assign a property
pub fn set_property(
    context: &ScriptContext,
    target: &NativeRef,
    name: &str,
    value: &ScriptValue,
) -> BindingResult<()> {
    let kind = target.kind();
    match property(kind, name) {
        None => return Err(unknown(kind, name)),
        Some(p) if !p.writable => {
            return Err(BindingError::ReadOnly {
                kind: kind.as_str(),
                member: name.to_string(),
            })
        }
        Some(_) => {}
    }
    let values = std::slice::from_ref(value);
    let args = Args::new(name, values);

    match target {
        NativeRef::Entity(_) => match name {
            "name" => {
                let text = args.string(0)?.to_string();
                with_entity(context, target, |object| object.name = text)
            }
            "tag" => {
                let text = args.string(0)?.to_string();
                with_entity(context, target, |object| object.tag = text)
            }
            "active" => {
                let active = args.truthy(0);
                with_entity(context, target, |object| object.active = active)
            }
            "color" => {
                let color = color_value(context, name, value)?;
                with_renderable(context, target, |r| r.set_color(color))
            }
            _ => {
                let texture = match value {
                    ScriptValue::Nil => None,
                    _ => Some(args.string(0)?.to_string()),
                };
                with_renderable(context, target, |r| r.set_texture(texture))
            }
        },
        NativeRef::Transform(id) => {
            let v = vector_value(context, name, value)?;
            let field = match name {
                "position" => TransformField::Position,
                "rotation" => TransformField::Rotation,
                _ => TransformField::Scale,
            };
            with_vector(context, &VectorRef::Entity(*id, field), |slot| *slot = v)
        }
        NativeRef::Vector(vector) => {
            let n = args.float(0)?;
            with_vector(context, vector, |v| match name {
                "x" => v.x = n,
                "y" => v.y = n,
                _ => v.z = n,
            })
        }
        NativeRef::Color(color) => {
            let n = args.float(0)?;
            with_color(context, color, |c| match name {
                "r" => c.r = n,
                "g" => c.g = n,
                "b" => c.b = n,
                _ => c.a = n,
            })
        }
        NativeRef::Camera => match name {
            "position" | "rotation" => {
                let v = vector_value(context, name, value)?;
                let mut scene = context.scene_mut();
                let camera = scene.camera_mut();
                if name == "position" {
                    camera.position = v;
                } else {
                    camera.rotation = v;
                }
                Ok(())
            }
            "clearColor" => {
                let color = color_value(context, name, value)?;
                context.scene_mut().camera_mut().clear_color = color;
                Ok(())
            }
            _ => {
                let n = args.float(0)?;
                let mut scene = context.scene_mut();
                let camera = scene.camera_mut();
                match name {
                    "fov" => camera.fov = n,
                    "nearPlane" => camera.near_plane = n,
                    _ => camera.far_plane = n,
                }
                Ok(())
            }
        },
        NativeRef::Light(light) => {
            match name {
                "type" => {
                    let code = args.int(0)?;
                    let light_type = LightType::from_code(code).ok_or(BindingError::BadArgument {
                        function: name.to_string(),
                        index: 1,
                        expected: "a LIGHT_* constant",
                    })?;
                    light.borrow_mut().light_type = light_type;
                }
                "position" | "direction" => {
                    let v = vector_value(context, name, value)?;
                    let mut light = light.borrow_mut();
                    if name == "position" {
                        light.position = v;
                    } else {
                        light.direction = v;
                    }
                }
                "color" => light.borrow_mut().color = color_value(context, name, value)?,
                _ => {
                    let n = args.float(0)?;
                    let mut light = light.borrow_mut();
                    match name {
                        "intensity" => light.intensity = n,
                        "range" => light.range = n,
                        _ => light.spot_angle = n,
                    }
                }
            }
            Ok(())
        }
        NativeRef::Scene => {
            let color = color_value(context, name, value)?;
            context.scene_mut().set_ambient_color(color);
            Ok(())
        }
    }
}

/// Call a method on `target`
pub fn call_method(
    context: &ScriptContext,
    target: &NativeRef,
    name: &str,
    values: &[ScriptValue],
) -> BindingResult<ScriptValue> {
    let kind = target.kind();
    method(kind, name)
        .ok_or_else(|| unknown(kind, name))?
        .invoke(context, target, values)
}

/// Text shown by `print` and `tostring`
pub fn describe(context: &ScriptContext, target: &NativeRef) -> String {
    match target {
        NativeRef::Scene => {
            let scene = context.scene();
            format!("Scene({} entities, {} lights)", scene.len(), scene.lights().len())
        }
        NativeRef::Camera => {
            let scene = context.scene();
            let p = scene.camera().position;
            format!("Camera({}, {}, {})", p.x, p.y, p.z)
        }
        NativeRef::Entity(handle) => match context.scene().get(handle.id()) {
            Some(object) => format!("Entity({})", object.name),
            None => "Entity(<destroyed>)".to_string(),
        },
        NativeRef::Light(light) => format!("Light({})", light.borrow().light_type.as_str()),
        NativeRef::Transform(_) => "Transform".to_string(),
        NativeRef::Vector(vector) => match read_vector(context, vector) {
            Ok(v) => format!("Vector3({}, {}, {})", v.x, v.y, v.z),
            Err(_) => "Vector3(<stale>)".to_string(),
        },
        NativeRef::Color(color) => match with_color(context, color, |c| *c) {
            Ok(c) => format!("Color({}, {}, {}, {})", c.r, c.g, c.b, c.a),
            Err(_) => "Color(<stale>)".to_string(),
        },
    }
}

fn unknown(kind: RefKind, member: &str) -> BindingError {
    BindingError::UnknownMember {
        kind: kind.as_str(),
        member: member.to_string(),
    }
}

fn spawn(context: &ScriptContext, object: SceneObject) -> BindingResult<ScriptValue> {
    Ok(NativeRef::Entity(context.scene_mut().spawn(object)).into())
}

fn index_arg(args: &Args<'_>, index: usize) -> BindingResult<u32> {
    u32::try_from(args.int(index)?).map_err(|_| BindingError::BadArgument {
        function: args.function.to_string(),
        index: index + 1,
        expected: "a non-negative index",
    })
}

fn random_range(min: f64, max: f64) -> f64 {
    let (mut lo, mut hi) = (min, max);
    if !lo.is_finite() || !hi.is_finite() {
        log::warn!("random received non-finite bounds; returning 0");
        return 0.0;
    }
    if lo > hi {
        std::mem::swap(&mut lo, &mut hi);
    }
    if (hi - lo).abs() <= f64::EPSILON {
        return lo;
    }
    rand::thread_rng().gen_range(lo..hi)
}

fn with_entity<T>(
    context: &ScriptContext,
    target: &NativeRef,
    f: impl FnOnce(&mut SceneObject) -> T,
) -> BindingResult<T> {
    let NativeRef::Entity(handle) = target else {
        return Err(unknown(target.kind(), "entity"));
    };
    let mut scene = context.scene_mut();
    let object = scene
        .get_mut(handle.id())
        .ok_or(BindingError::StaleReference("entity"))?;
    Ok(f(object))
}

fn with_renderable<T>(
    context: &ScriptContext,
    target: &NativeRef,
    f: impl FnOnce(&mut Renderable) -> T,
) -> BindingResult<T> {
    with_entity(context, target, |object| match object.renderable_mut() {
        Some(renderable) => Ok(f(renderable)),
        None => Err(BindingError::NotRenderable(object.name.clone())),
    })?
}

fn vector_target(target: &NativeRef) -> BindingResult<&VectorRef> {
    match target {
        NativeRef::Vector(vector) => Ok(vector),
        other => Err(unknown(other.kind(), "vector")),
    }
}

fn with_vector<T>(context: &ScriptContext, vector: &VectorRef, f: impl FnOnce(&mut Vec3) -> T) -> BindingResult<T> {
    match vector {
        VectorRef::Entity(id, field) => {
            let mut scene = context.scene_mut();
            let object = scene
                .get_mut(*id)
                .ok_or(BindingError::StaleReference("vector"))?;
            let transform = &mut object.transform;
            Ok(f(match field {
                TransformField::Position => &mut transform.position,
                TransformField::Rotation => &mut transform.rotation,
                TransformField::Scale => &mut transform.scale,
            }))
        }
        VectorRef::Camera(field) => {
            let mut scene = context.scene_mut();
            let camera = scene.camera_mut();
            Ok(f(match field {
                CameraField::Position => &mut camera.position,
                CameraField::Rotation => &mut camera.rotation,
            }))
        }
        VectorRef::Light(weak, field) => {
            let light = weak.upgrade().ok_or(BindingError::StaleReference("vector"))?;
            let mut light = light.borrow_mut();
            Ok(f(match field {
                LightField::Position => &mut light.position,
                LightField::Direction => &mut light.direction,
            }))
        }
    }
}

fn read_vector(context: &ScriptContext, vector: &VectorRef) -> BindingResult<Vec3> {
    with_vector(context, vector, |v| *v)
}

fn with_color<T>(context: &ScriptContext, color: &ColorRef, f: impl FnOnce(&mut Color) -> T) -> BindingResult<T> {
    match color {
        ColorRef::Entity(id) => {
            let mut scene = context.scene_mut();
            let renderable = scene
                .get_mut(*id)
                .and_then(SceneObject::renderable_mut)
                .ok_or(BindingError::StaleReference("color"))?;
            let mut c = renderable.color();
            let out = f(&mut c);
            renderable.set_color(c);
            Ok(out)
        }
        ColorRef::Light(weak) => {
            let light = weak.upgrade().ok_or(BindingError::StaleReference("color"))?;
            let out = f(&mut light.borrow_mut().color);
            Ok(out)
        }
        ColorRef::Ambient => {
            let mut scene = context.scene_mut();
            let mut c = scene.ambient_color();
            let out = f(&mut c);
            scene.set_ambient_color(c);
            Ok(out)
        }
        ColorRef::ClearColor => Ok(f(&mut context.scene_mut().camera_mut().clear_color)),
    }
}

fn component(value: Option<&ScriptValue>) -> Option<f32> {
    value.and_then(ScriptValue::as_f64).map(|n| n as f32)
}

/// Vector from a vector reference, an `{x, y, z}` record or a 3-element list
fn vector_value(context: &ScriptContext, member: &str, value: &ScriptValue) -> BindingResult<Vec3> {
    let parsed = match value {
        ScriptValue::Ref(NativeRef::Vector(vector)) => return read_vector(context, vector),
        ScriptValue::Record(_) => (|| {
            Some(Vec3::new(
                component(value.field("x"))?,
                component(value.field("y"))?,
                component(value.field("z"))?,
            ))
        })(),
        ScriptValue::List(items) if items.len() == 3 => (|| {
            Some(Vec3::new(
                component(items.first())?,
                component(items.get(1))?,
                component(items.get(2))?,
            ))
        })(),
        _ => None,
    };
    parsed.ok_or_else(|| BindingError::BadArgument {
        function: member.to_string(),
        index: 1,
        expected: "a vector",
    })
}

/// Color from a color reference, an `{r, g, b, a?}` record or a 3/4-element list
fn color_value(context: &ScriptContext, member: &str, value: &ScriptValue) -> BindingResult<Color> {
    let parsed = match value {
        ScriptValue::Ref(NativeRef::Color(color)) => return with_color(context, color, |c| *c),
        ScriptValue::Record(_) => (|| {
            Some(Color::new(
                component(value.field("r"))?,
                component(value.field("g"))?,
                component(value.field("b"))?,
                component(value.field("a")).unwrap_or(1.0),
            ))
        })(),
        ScriptValue::List(items) if (3..=4).contains(&items.len()) => (|| {
            Some(Color::new(
                component(items.first())?,
                component(items.get(1))?,
                component(items.get(2))?,
                component(items.get(3)).unwrap_or(1.0),
            ))
        })(),
        _ => None,
    };
    parsed.ok_or_else(|| BindingError::BadArgument {
        function: member.to_string(),
        index: 1,
        expected: "a color",
    })
}
