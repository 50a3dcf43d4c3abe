//! # Combine Engine
//!
//! Runtime core of a small real-time 3D engine driven by embedded scripts.
//!
//! ## Features
//!
//! - **Scene graph**: named objects with transforms, optional renderables
//!   and per-object components
//! - **Frame loop**: clock, input snapshots, native and script callbacks,
//!   then one draw per active renderable
//! - **Render backends**: a backend trait over a GPU device layer with a
//!   headless device for tests and tools
//! - **Scripting**: Lua and Rhai adapters over one shared API, routed by
//!   file extension and able to load each other's scripts
//! - **Maps**: a line-based text format for scenes
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use combine_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::default().with_max_frames(120);
//!     let mut engine = Engine::headless(config);
//!     engine.install_default_adapters()?;
//!     engine.execute_script_string("createCube(\"box\")", Some(".lua"))?;
//!     engine.run()?;
//!     engine.shutdown();
//!     Ok(())
//! }
//! ```

pub mod application;
pub mod assets;
pub mod config;
pub mod core;
pub mod ecs;
pub mod foundation;
pub mod input;
pub mod render;
pub mod scene;
pub mod scripting;

mod engine;

pub use engine::{CallbackResult, Engine, EngineError, NativeCallback};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        application::AppEvent,
        assets::MapData,
        config::Config,
        core::EngineConfig,
        ecs::{Component, ComponentOwner},
        foundation::{
            math::{Color, Transform, Vec2, Vec3},
            time::Clock,
        },
        input::{InputState, KeyCode, MouseButton},
        render::{Camera, HeadlessRenderer, Light, LightType, RenderBackend, Shader},
        scene::{ObjectHandle, ObjectId, Renderable, SceneGraph, SceneObject},
        scripting::{ScriptAdapter, ScriptError},
        CallbackResult, Engine, EngineError,
    };
}
