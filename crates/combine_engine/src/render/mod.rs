//! # Rendering
//!
//! The renderer contract the engine drives once per frame, plus the
//! backend-independent caching policy behind it.
//!
//! ## Architecture
//!
//! - [`RenderBackend`] is the surface the engine talks to: frame cycle,
//!   presentation flags and named shader programs.
//! - [`CachedRenderer`] implements it for any [`GpuDevice`] by routing all
//!   resource creation through a [`RenderCache`]: one mesh entry per
//!   [`RenderId`], one texture per path, one uniform table per program.
//! - [`HeadlessDevice`] is a device that records work instead of issuing it.

pub mod cache;
pub mod camera;
pub mod device;
pub mod headless;
pub mod lighting;
pub mod mesh;
pub mod renderer;
pub mod shader;

use std::fmt;

use thiserror::Error;

use crate::application::AppEvent;
use crate::foundation::math::{Color, Transform};
use crate::scene::Renderable;

pub use cache::{CacheStats, RenderCache, UniformTable};
pub use camera::Camera;
pub use device::{GpuDevice, MeshBuffers, ProgramHandle, TextureHandle, UniformLocation, UniformValue};
pub use headless::{DeviceStats, HeadlessDevice, HeadlessRenderer};
pub use lighting::{Light, LightType, MAX_LIGHTS};
pub use mesh::{Mesh, MeshShape, Vertex};
pub use renderer::CachedRenderer;
pub use shader::Shader;

/// Stable identity of a renderable's GPU cache entry
///
/// Assigned once, on first submission, and never reused for another
/// renderable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderId(u64);

impl RenderId {
    /// Wrap a raw identity
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw value
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

bitflags::bitflags! {
    /// Presentation state toggled at runtime
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RenderState: u32 {
        /// Draw triangle edges only
        const WIREFRAME = 1 << 0;
        /// Wait for vertical blank when presenting
        const VSYNC = 1 << 1;
    }
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, RenderError>;

/// Main rendering backend trait
///
/// Implemented by every output backend. All calls happen on the engine
/// thread, inside the frame loop.
pub trait RenderBackend {
    /// Create the output surface and the built-in default program
    ///
    /// # Arguments
    /// * `width` - Surface width in pixels
    /// * `height` - Surface height in pixels
    /// * `title` - Window title
    fn initialize(&mut self, width: u32, height: u32, title: &str) -> BackendResult<()>;

    /// Establish view and projection from the camera and clear the frame
    fn begin_frame(&mut self, camera: &Camera) -> BackendResult<()>;

    /// Draw one renderable
    ///
    /// Rebuilds the renderable's cache entry if its geometry is dirty or it
    /// has none yet, then clears the dirty flag. Only the first
    /// [`MAX_LIGHTS`] lights are uploaded.
    fn render_object(
        &mut self,
        transform: &Transform,
        renderable: &mut Renderable,
        lights: &[Light],
        ambient: Color,
    ) -> BackendResult<()>;

    /// Present the frame
    fn end_frame(&mut self) -> BackendResult<()>;

    /// Whether the output surface has been closed
    fn should_close(&self) -> bool;

    /// Release every GPU resource and the surface
    fn shutdown(&mut self);

    /// Surface size in pixels
    fn size(&self) -> (u32, u32);

    /// Follow a window resize; the next frame uses the new aspect ratio
    fn resize(&mut self, width: u32, height: u32);

    /// Enable or disable vertical sync
    fn set_vsync(&mut self, enabled: bool);

    /// Enable or disable wireframe drawing
    fn set_wireframe(&mut self, enabled: bool);

    /// Compile and register a named program
    ///
    /// On failure the active program is left unchanged.
    fn load_shader(
        &mut self,
        name: &str,
        vertex_source: &str,
        fragment_source: &str,
        geometry_source: Option<&str>,
    ) -> BackendResult<()>;

    /// Make a registered program active; unknown names keep the current one
    fn use_shader(&mut self, name: &str);

    /// Drop the cache entries of renderables that no longer exist
    fn release_render_ids(&mut self, _ids: &[RenderId]) {}

    /// Platform events received since the last call
    fn drain_events(&mut self) -> Vec<AppEvent> {
        Vec::new()
    }

    /// Downcast to concrete backend type for inspection
    fn as_any(&self) -> &dyn std::any::Any;
}

/// Rendering system errors
#[derive(Error, Debug)]
pub enum RenderError {
    /// Renderer initialization failed during setup
    #[error("Renderer initialization failed: {0}")]
    InitializationFailed(String),

    /// Shader source could not be read
    #[error("Shader source unavailable: {0}")]
    ShaderSource(String),

    /// Shader program failed to compile or link
    #[error("Shader compilation failed: {0}")]
    ShaderCompilation(String),

    /// A rendering operation failed during execution
    #[error("Rendering failed: {0}")]
    RenderingFailed(String),

    /// Resource creation or management failed
    #[error("Resource creation failed: {0}")]
    ResourceCreationFailed(String),
}
