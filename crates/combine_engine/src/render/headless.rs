//! Headless GPU device
//!
//! Performs no GPU work. Every upload, texture, uniform write and draw is
//! recorded so behaviour can be inspected, the surface can be closed after
//! a fixed number of frames, and synthetic platform events can be queued
//! for the engine to pick up.

use std::collections::{HashMap, HashSet, VecDeque};

use super::device::{GpuDevice, MeshBuffers, ProgramHandle, TextureHandle, UniformLocation, UniformValue};
use super::renderer::CachedRenderer;
use super::{BackendResult, RenderError, RenderState, Vertex};
use crate::application::AppEvent;
use crate::assets::ImageData;
use crate::foundation::math::Color;

/// Renderer backed by a [`HeadlessDevice`]
pub type HeadlessRenderer = CachedRenderer<HeadlessDevice>;

/// Counters of recorded device work
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
    /// Mesh buffer sets created
    pub buffers_created: u64,
    /// Mesh buffer sets destroyed
    pub buffers_destroyed: u64,
    /// Vertices uploaded, summed over all buffer creations
    pub vertices_uploaded: u64,
    /// Vertex bytes uploaded
    pub bytes_uploaded: u64,
    /// Textures created
    pub textures_created: u64,
    /// Programs compiled successfully
    pub programs_compiled: u64,
    /// Programs destroyed
    pub programs_destroyed: u64,
    /// Uniform writes
    pub uniform_writes: u64,
    /// Draw calls
    pub draws: u64,
    /// Frames presented
    pub frames_presented: u64,
}

/// A [`GpuDevice`] that records instead of rendering
#[derive(Debug, Default)]
pub struct HeadlessDevice {
    size: (u32, u32),
    title: String,
    surface: bool,
    closed: bool,
    frame_limit: Option<u64>,
    fail_surface: bool,
    next_handle: u64,
    live_buffers: HashSet<u64>,
    textures: HashMap<u64, ImageData>,
    programs: HashMap<u64, HashMap<String, UniformLocation>>,
    bound_program: Option<ProgramHandle>,
    bound_texture: Option<TextureHandle>,
    uniforms: HashMap<(u64, i32), UniformValue>,
    state: RenderState,
    last_clear: Option<Color>,
    pending_events: VecDeque<AppEvent>,
    stats: DeviceStats,
}

impl HeadlessDevice {
    /// Create a device with no frame limit
    pub fn new() -> Self {
        Self::default()
    }

    /// Report the surface closed once this many frames were presented
    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.frame_limit = Some(frames);
        self
    }

    /// Make [`GpuDevice::create_surface`] fail, as a missing display would
    pub fn failing() -> Self {
        Self {
            fail_surface: true,
            ..Self::default()
        }
    }

    /// Queue a platform event for the next poll
    pub fn push_event(&mut self, event: AppEvent) {
        self.pending_events.push_back(event);
    }

    /// Close the surface, as a user closing the window would
    pub fn request_close(&mut self) {
        self.closed = true;
    }

    /// Recorded work
    pub fn stats(&self) -> DeviceStats {
        self.stats
    }

    /// Number of mesh buffer sets not yet destroyed
    pub fn live_buffer_count(&self) -> usize {
        self.live_buffers.len()
    }

    /// Number of compiled programs not yet destroyed
    pub fn live_program_count(&self) -> usize {
        self.programs.len()
    }

    /// Pixels of a created texture
    pub fn texture(&self, handle: TextureHandle) -> Option<&ImageData> {
        self.textures.get(&handle.0)
    }

    /// Last value written to a uniform of a program
    pub fn uniform(&self, program: ProgramHandle, location: UniformLocation) -> Option<UniformValue> {
        self.uniforms.get(&(program.0, location.0)).copied()
    }

    /// Currently bound program
    pub fn bound_program(&self) -> Option<ProgramHandle> {
        self.bound_program
    }

    /// Currently bound texture
    pub fn bound_texture(&self) -> Option<TextureHandle> {
        self.bound_texture
    }

    /// Presentation flags last applied
    pub fn render_state(&self) -> RenderState {
        self.state
    }

    /// Color of the most recent clear
    pub fn last_clear(&self) -> Option<Color> {
        self.last_clear
    }

    /// Title the surface was created with
    pub fn title(&self) -> &str {
        &self.title
    }

    fn allocate(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

impl GpuDevice for HeadlessDevice {
    fn create_surface(&mut self, width: u32, height: u32, title: &str) -> BackendResult<()> {
        if self.fail_surface {
            return Err(RenderError::InitializationFailed(
                "no display available".to_string(),
            ));
        }
        self.size = (width, height);
        self.title = title.to_string();
        self.surface = true;
        self.closed = false;
        log::info!("Headless surface {}x{} '{}' created", width, height, title);
        Ok(())
    }

    fn create_mesh_buffers(&mut self, vertices: &[Vertex], indices: &[u32]) -> BackendResult<MeshBuffers> {
        let bytes: &[u8] = bytemuck::cast_slice(vertices);
        let index_count = u32::try_from(indices.len())
            .map_err(|_| RenderError::ResourceCreationFailed("too many indices".to_string()))?;
        let buffers = MeshBuffers {
            vertex_array: self.allocate(),
            vertex_buffer: self.allocate(),
            index_buffer: self.allocate(),
            index_count,
        };
        self.live_buffers.insert(buffers.vertex_array);
        self.stats.buffers_created += 1;
        self.stats.vertices_uploaded += vertices.len() as u64;
        self.stats.bytes_uploaded += bytes.len() as u64;
        Ok(buffers)
    }

    fn destroy_mesh_buffers(&mut self, buffers: MeshBuffers) {
        if self.live_buffers.remove(&buffers.vertex_array) {
            self.stats.buffers_destroyed += 1;
        }
    }

    fn create_texture(&mut self, image: &ImageData) -> BackendResult<TextureHandle> {
        if image.width == 0 || image.height == 0 {
            return Err(RenderError::ResourceCreationFailed(
                "texture has no pixels".to_string(),
            ));
        }
        let handle = self.allocate();
        self.textures.insert(handle, image.clone());
        self.stats.textures_created += 1;
        Ok(TextureHandle(handle))
    }

    fn compile_program(
        &mut self,
        vertex_source: &str,
        fragment_source: &str,
        geometry_source: Option<&str>,
    ) -> BackendResult<ProgramHandle> {
        let empty = |source: &str| source.trim().is_empty();
        if empty(vertex_source) || empty(fragment_source) || geometry_source.is_some_and(empty) {
            return Err(RenderError::ShaderCompilation(
                "empty shader stage".to_string(),
            ));
        }
        let handle = self.allocate();
        self.programs.insert(handle, HashMap::new());
        self.stats.programs_compiled += 1;
        Ok(ProgramHandle(handle))
    }

    fn destroy_program(&mut self, program: ProgramHandle) {
        if self.programs.remove(&program.0).is_some() {
            self.uniforms.retain(|(owner, _), _| *owner != program.0);
            if self.bound_program == Some(program) {
                self.bound_program = None;
            }
            self.stats.programs_destroyed += 1;
        }
    }

    fn uniform_location(&mut self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        let locations = self.programs.get_mut(&program.0)?;
        let next = i32::try_from(locations.len()).ok()?;
        Some(
            *locations
                .entry(name.to_string())
                .or_insert(UniformLocation(next)),
        )
    }

    fn bind_program(&mut self, program: ProgramHandle) {
        self.bound_program = Some(program);
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        if let Some(program) = self.bound_program {
            self.uniforms.insert((program.0, location.0), value);
            self.stats.uniform_writes += 1;
        }
    }

    fn bind_texture(&mut self, texture: Option<TextureHandle>) {
        self.bound_texture = texture;
    }

    fn draw_indexed(&mut self, buffers: &MeshBuffers) {
        if self.live_buffers.contains(&buffers.vertex_array) {
            self.stats.draws += 1;
        } else {
            log::warn!("Draw with destroyed buffers {:?}", buffers);
        }
    }

    fn clear(&mut self, color: Color) {
        self.last_clear = Some(color);
    }

    fn present(&mut self) -> BackendResult<()> {
        if !self.surface {
            return Err(RenderError::RenderingFailed("no surface".to_string()));
        }
        self.stats.frames_presented += 1;
        if self
            .frame_limit
            .is_some_and(|limit| self.stats.frames_presented >= limit)
        {
            self.closed = true;
        }
        Ok(())
    }

    fn set_render_state(&mut self, state: RenderState) {
        self.state = state;
    }

    fn surface_closed(&self) -> bool {
        self.closed
    }

    fn poll_events(&mut self) -> Vec<AppEvent> {
        let events: Vec<AppEvent> = self.pending_events.drain(..).collect();
        if events.contains(&AppEvent::WindowCloseRequested) {
            self.closed = true;
        }
        events
    }

    fn surface_size(&self) -> (u32, u32) {
        self.size
    }

    fn resize_surface(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    fn destroy_surface(&mut self) {
        self.surface = false;
        self.live_buffers.clear();
        self.textures.clear();
        self.programs.clear();
        self.bound_program = None;
        self.bound_texture = None;
        log::info!("Headless surface destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_limit_closes_surface() {
        let mut device = HeadlessDevice::new().with_frame_limit(2);
        device.create_surface(64, 64, "test").unwrap();
        device.present().unwrap();
        assert!(!device.surface_closed());
        device.present().unwrap();
        assert!(device.surface_closed());
    }

    #[test]
    fn test_failing_surface() {
        let mut device = HeadlessDevice::failing();
        assert!(matches!(
            device.create_surface(1, 1, "x"),
            Err(RenderError::InitializationFailed(_))
        ));
    }

    #[test]
    fn test_uniform_locations_are_stable() {
        let mut device = HeadlessDevice::new();
        let program = device.compile_program("a", "b", None).unwrap();
        let model = device.uniform_location(program, "model");
        let view = device.uniform_location(program, "view");
        assert_ne!(model, view);
        assert_eq!(device.uniform_location(program, "model"), model);
        assert!(device.uniform_location(ProgramHandle(999), "model").is_none());
    }

    #[test]
    fn test_destroyed_program_loses_uniforms() {
        let mut device = HeadlessDevice::new();
        let program = device.compile_program("a", "b", None).unwrap();
        device.destroy_program(program);
        device.destroy_program(program);
        assert_eq!(device.live_program_count(), 0);
        assert_eq!(device.stats().programs_destroyed, 1);
        assert!(device.uniform_location(program, "model").is_none());
    }

    #[test]
    fn test_events_drain_once() {
        let mut device = HeadlessDevice::new();
        device.push_event(AppEvent::WindowCloseRequested);
        assert_eq!(device.poll_events().len(), 1);
        assert!(device.poll_events().is_empty());
        assert!(device.surface_closed());
    }
}
