//! Low-level GPU device abstraction
//!
//! The primitives a graphics API has to provide for [`super::CachedRenderer`]
//! to run: buffer and texture creation, program compilation, uniform
//! lookup and writes, and indexed draws. Handles are opaque integers owned
//! by the device.

use super::{BackendResult, RenderState, Vertex};
use crate::application::AppEvent;
use crate::assets::ImageData;
use crate::foundation::math::Color;

/// Device texture handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u64);

/// Device program handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub u64);

/// Location of a uniform within a program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub i32);

/// GPU-resident geometry for one mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshBuffers {
    /// Vertex array object or equivalent
    pub vertex_array: u64,
    /// Vertex buffer
    pub vertex_buffer: u64,
    /// Index buffer
    pub index_buffer: u64,
    /// Number of indices to draw
    pub index_count: u32,
}

/// Value written to a uniform location
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    /// Integer or sampler unit
    Int(i32),
    /// Scalar
    Float(f32),
    /// 3-component vector
    Vec3([f32; 3]),
    /// 4-component vector
    Vec4([f32; 4]),
    /// Column-major 3x3 matrix
    Mat3([[f32; 3]; 3]),
    /// Column-major 4x4 matrix
    Mat4([[f32; 4]; 4]),
}

impl From<Color> for UniformValue {
    fn from(color: Color) -> Self {
        Self::Vec4(color.to_array())
    }
}

/// Raw graphics API operations
pub trait GpuDevice {
    /// Create the surface and context
    fn create_surface(&mut self, width: u32, height: u32, title: &str) -> BackendResult<()>;

    /// Upload geometry into new buffers
    fn create_mesh_buffers(&mut self, vertices: &[Vertex], indices: &[u32]) -> BackendResult<MeshBuffers>;

    /// Free buffers created by [`GpuDevice::create_mesh_buffers`]
    fn destroy_mesh_buffers(&mut self, buffers: MeshBuffers);

    /// Upload an RGBA8 image
    fn create_texture(&mut self, image: &ImageData) -> BackendResult<TextureHandle>;

    /// Compile and link a program
    fn compile_program(
        &mut self,
        vertex_source: &str,
        fragment_source: &str,
        geometry_source: Option<&str>,
    ) -> BackendResult<ProgramHandle>;

    /// Free a program created by [`GpuDevice::compile_program`]
    fn destroy_program(&mut self, program: ProgramHandle);

    /// Look up a uniform by name; `None` if the program does not use it
    fn uniform_location(&mut self, program: ProgramHandle, name: &str) -> Option<UniformLocation>;

    /// Make a program current
    fn bind_program(&mut self, program: ProgramHandle);

    /// Write a uniform of the current program
    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue);

    /// Bind a texture to unit 0, or unbind with `None`
    fn bind_texture(&mut self, texture: Option<TextureHandle>);

    /// Draw indexed triangles
    fn draw_indexed(&mut self, buffers: &MeshBuffers);

    /// Clear color and depth
    fn clear(&mut self, color: Color);

    /// Present the back buffer
    fn present(&mut self) -> BackendResult<()>;

    /// Apply presentation flags
    fn set_render_state(&mut self, state: RenderState);

    /// Whether the surface has been closed
    fn surface_closed(&self) -> bool;

    /// Platform events received since the last poll
    fn poll_events(&mut self) -> Vec<AppEvent>;

    /// Surface size in pixels
    fn surface_size(&self) -> (u32, u32);

    /// Resize the drawable area after the window changed size
    fn resize_surface(&mut self, width: u32, height: u32);

    /// Destroy the surface and context
    fn destroy_surface(&mut self);
}
