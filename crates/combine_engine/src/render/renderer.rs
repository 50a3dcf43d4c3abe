//! Cached renderer
//!
//! Implements [`RenderBackend`] for any [`GpuDevice`]. All resource creation
//! goes through the [`RenderCache`], so unchanged geometry is uploaded once
//! and textures are decoded once per path.

use std::time::Instant;

use super::cache::{RenderCache, UniformTable, DEFAULT_PROGRAM};
use super::device::{GpuDevice, ProgramHandle, UniformLocation, UniformValue};
use super::{BackendResult, Camera, Light, RenderBackend, RenderError, RenderId, RenderState, MAX_LIGHTS};
use crate::application::AppEvent;
use crate::foundation::math::{Color, Mat3, Mat4, Transform, Vec3};
use crate::scene::Renderable;

const DEFAULT_VERTEX_SHADER: &str = r"#version 330 core
layout(location = 0) in vec3 aPos;
layout(location = 1) in vec3 aNormal;
layout(location = 2) in vec2 aTexCoord;
layout(location = 3) in vec4 aColor;

uniform mat4 model;
uniform mat4 view;
uniform mat4 projection;
uniform mat3 normalMatrix;

out vec3 FragPos;
out vec3 Normal;
out vec2 TexCoord;
out vec4 VertexColor;

void main() {
    FragPos = vec3(model * vec4(aPos, 1.0));
    Normal = normalMatrix * aNormal;
    TexCoord = aTexCoord;
    VertexColor = aColor;
    gl_Position = projection * view * vec4(FragPos, 1.0);
}
";

const DEFAULT_FRAGMENT_SHADER: &str = r"#version 330 core
#define MAX_LIGHTS 8

struct Light {
    int type;
    vec3 position;
    vec3 direction;
    vec3 color;
    float intensity;
    float range;
    float spotAngle;
};

in vec3 FragPos;
in vec3 Normal;
in vec2 TexCoord;
in vec4 VertexColor;

uniform vec4 meshColor;
uniform vec4 ambientColor;
uniform vec3 viewPos;
uniform float time;
uniform int uHasTexture;
uniform sampler2D uTextureSampler;
uniform int numLights;
uniform Light lights[MAX_LIGHTS];

out vec4 FragColor;

void main() {
    vec4 base = meshColor * VertexColor;
    if (uHasTexture == 1) {
        base *= texture(uTextureSampler, TexCoord);
    }
    vec3 normal = normalize(Normal);
    vec3 result = ambientColor.rgb * base.rgb;
    for (int i = 0; i < numLights && i < MAX_LIGHTS; ++i) {
        vec3 toLight;
        float attenuation = 1.0;
        if (lights[i].type == 0) {
            toLight = normalize(-lights[i].direction);
        } else {
            vec3 delta = lights[i].position - FragPos;
            float dist = length(delta);
            toLight = delta / max(dist, 0.0001);
            attenuation = clamp(1.0 - (dist * dist) / (lights[i].range * lights[i].range), 0.0, 1.0);
            if (lights[i].type == 2) {
                float theta = dot(toLight, normalize(-lights[i].direction));
                float outer = cos(radians(lights[i].spotAngle));
                float inner = cos(radians(lights[i].spotAngle * 0.8));
                attenuation *= clamp((theta - outer) / max(inner - outer, 0.0001), 0.0, 1.0);
            }
        }
        float diffuse = max(dot(normal, toLight), 0.0);
        result += lights[i].color * lights[i].intensity * diffuse * attenuation * base.rgb;
    }
    FragColor = vec4(result, base.a);
}
";

/// Per-frame camera state captured by `begin_frame`
#[derive(Debug, Clone, Copy)]
struct FrameState {
    view: Mat4,
    projection: Mat4,
    camera_position: Vec3,
    time: f32,
}

/// [`RenderBackend`] over a [`GpuDevice`] with GPU resource caching
#[derive(Debug)]
pub struct CachedRenderer<D: GpuDevice> {
    device: D,
    cache: RenderCache,
    state: RenderState,
    active_program: String,
    frame: Option<FrameState>,
    started: Instant,
    initialized: bool,
}

impl<D: GpuDevice> CachedRenderer<D> {
    /// Wrap a device; call [`RenderBackend::initialize`] before rendering
    pub fn new(device: D) -> Self {
        Self {
            device,
            cache: RenderCache::new(),
            state: RenderState::VSYNC,
            active_program: DEFAULT_PROGRAM.to_string(),
            frame: None,
            started: Instant::now(),
            initialized: false,
        }
    }

    /// The underlying device
    pub fn device(&self) -> &D {
        &self.device
    }

    /// The underlying device, mutably
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// The resource cache
    pub fn cache(&self) -> &RenderCache {
        &self.cache
    }

    /// Name of the active program
    pub fn active_program(&self) -> &str {
        &self.active_program
    }

    /// Presentation flags
    pub fn render_state(&self) -> RenderState {
        self.state
    }

    fn active_program_entry(&self) -> BackendResult<(ProgramHandle, UniformTable)> {
        self.cache
            .program(&self.active_program)
            .or_else(|| self.cache.program(DEFAULT_PROGRAM))
            .map(|(handle, table)| (handle, table.clone()))
            .ok_or_else(|| RenderError::RenderingFailed("no shader program registered".to_string()))
    }

    fn set(&mut self, location: Option<UniformLocation>, value: UniformValue) {
        if let Some(location) = location {
            self.device.set_uniform(location, value);
        }
    }

    fn upload_lights(&mut self, uniforms: &UniformTable, lights: &[Light]) {
        let count = lights.len().min(MAX_LIGHTS);
        if lights.len() > MAX_LIGHTS {
            log::trace!("{} lights submitted, uploading the first {}", lights.len(), MAX_LIGHTS);
        }
        self.set(uniforms.num_lights, UniformValue::Int(count as i32));

        for (light, slots) in lights.iter().zip(uniforms.lights.iter()) {
            let color = light.color;
            self.set(slots.light_type, UniformValue::Int(light.light_type.code()));
            self.set(slots.position, UniformValue::Vec3(light.position.into()));
            self.set(slots.direction, UniformValue::Vec3(light.direction.into()));
            self.set(slots.color, UniformValue::Vec3([color.r, color.g, color.b]));
            self.set(slots.intensity, UniformValue::Float(light.intensity));
            self.set(slots.range, UniformValue::Float(light.range));
            self.set(slots.spot_angle, UniformValue::Float(light.spot_angle));
        }
    }
}

fn mat4_value(matrix: &Mat4) -> UniformValue {
    UniformValue::Mat4((*matrix).into())
}

fn mat3_value(matrix: &Mat3) -> UniformValue {
    UniformValue::Mat3((*matrix).into())
}

impl<D: GpuDevice + 'static> RenderBackend for CachedRenderer<D> {
    fn initialize(&mut self, width: u32, height: u32, title: &str) -> BackendResult<()> {
        self.device.create_surface(width, height, title)?;
        self.cache.register_program(
            &mut self.device,
            DEFAULT_PROGRAM,
            DEFAULT_VERTEX_SHADER,
            DEFAULT_FRAGMENT_SHADER,
            None,
        )?;
        self.device.set_render_state(self.state);
        self.active_program = DEFAULT_PROGRAM.to_string();
        self.started = Instant::now();
        self.initialized = true;
        log::info!("Renderer initialized ({}x{})", width, height);
        Ok(())
    }

    fn begin_frame(&mut self, camera: &Camera) -> BackendResult<()> {
        let (width, height) = self.device.surface_size();
        let aspect = if height == 0 { 1.0 } else { width as f32 / height as f32 };
        self.frame = Some(FrameState {
            view: camera.view_matrix(),
            projection: camera.projection_matrix(aspect),
            camera_position: camera.position,
            time: self.started.elapsed().as_secs_f32(),
        });
        self.device.clear(camera.clear_color);
        Ok(())
    }

    fn render_object(
        &mut self,
        transform: &Transform,
        renderable: &mut Renderable,
        lights: &[Light],
        ambient: Color,
    ) -> BackendResult<()> {
        let frame = self
            .frame
            .ok_or_else(|| RenderError::RenderingFailed("render_object outside a frame".to_string()))?;
        let buffers = self.cache.sync_mesh(&mut self.device, renderable)?;
        if buffers.index_count == 0 {
            return Ok(());
        }

        let (program, uniforms) = self.active_program_entry()?;
        self.device.bind_program(program);

        self.set(uniforms.model, mat4_value(&transform.to_matrix()));
        self.set(uniforms.view, mat4_value(&frame.view));
        self.set(uniforms.projection, mat4_value(&frame.projection));
        self.set(uniforms.normal_matrix, mat3_value(&transform.normal_matrix()));
        self.set(uniforms.view_pos, UniformValue::Vec3(frame.camera_position.into()));
        self.set(uniforms.time, UniformValue::Float(frame.time));
        self.set(uniforms.mesh_color, renderable.color().into());
        self.set(uniforms.ambient_color, ambient.into());

        let texture = match renderable.texture() {
            Some(path) => Some(self.cache.texture(&mut self.device, path)?),
            None => None,
        };
        self.device.bind_texture(texture);
        self.set(uniforms.has_texture, UniformValue::Int(i32::from(texture.is_some())));
        self.set(uniforms.texture_sampler, UniformValue::Int(0));

        self.upload_lights(&uniforms, lights);
        self.device.draw_indexed(&buffers);
        Ok(())
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        self.frame = None;
        self.device.present()
    }

    fn should_close(&self) -> bool {
        self.device.surface_closed()
    }

    fn shutdown(&mut self) {
        if !self.initialized {
            return;
        }
        self.cache.clear(&mut self.device);
        self.device.destroy_surface();
        self.initialized = false;
        log::info!("Renderer shut down");
    }

    fn size(&self) -> (u32, u32) {
        self.device.surface_size()
    }

    fn resize(&mut self, width: u32, height: u32) {
        if (width, height) == self.device.surface_size() {
            return;
        }
        self.device.resize_surface(width, height);
        log::debug!("Renderer resized to {}x{}", width, height);
    }

    fn set_vsync(&mut self, enabled: bool) {
        self.state.set(RenderState::VSYNC, enabled);
        self.device.set_render_state(self.state);
    }

    fn set_wireframe(&mut self, enabled: bool) {
        self.state.set(RenderState::WIREFRAME, enabled);
        self.device.set_render_state(self.state);
    }

    fn load_shader(
        &mut self,
        name: &str,
        vertex_source: &str,
        fragment_source: &str,
        geometry_source: Option<&str>,
    ) -> BackendResult<()> {
        self.cache
            .register_program(&mut self.device, name, vertex_source, fragment_source, geometry_source)
            .map(|_| ())
            .map_err(|e| {
                log::error!("Failed to load shader '{}': {}", name, e);
                e
            })
    }

    fn use_shader(&mut self, name: &str) {
        if self.cache.has_program(name) {
            self.active_program = name.to_string();
            log::debug!("Using shader '{}'", name);
        } else {
            log::warn!("Shader '{}' not found, keeping '{}'", name, self.active_program);
        }
    }

    fn release_render_ids(&mut self, ids: &[RenderId]) {
        self.cache.release_meshes(&mut self.device, ids);
    }

    fn drain_events(&mut self) -> Vec<AppEvent> {
        self.device.poll_events()
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::HeadlessDevice;

    fn renderer() -> CachedRenderer<HeadlessDevice> {
        let mut renderer = CachedRenderer::new(HeadlessDevice::new());
        renderer.initialize(320, 240, "test").unwrap();
        renderer
    }

    #[test]
    fn test_unchanged_geometry_uploads_once() {
        let mut renderer = renderer();
        let mut cube = Renderable::cube();
        let transform = Transform::default();

        for _ in 0..3 {
            renderer.begin_frame(&Camera::default()).unwrap();
            renderer
                .render_object(&transform, &mut cube, &[], Color::black())
                .unwrap();
            renderer.end_frame().unwrap();
        }

        assert_eq!(renderer.device().stats().buffers_created, 1);
        assert_eq!(renderer.device().stats().draws, 3);
        assert!(!cube.is_dirty());
    }

    #[test]
    fn test_only_eight_lights_uploaded() {
        let mut renderer = renderer();
        let mut cube = Renderable::cube();
        let lights = vec![Light::default(); 12];

        renderer.begin_frame(&Camera::default()).unwrap();
        renderer
            .render_object(&Transform::default(), &mut cube, &lights, Color::black())
            .unwrap();

        let (program, uniforms) = renderer.cache().program(DEFAULT_PROGRAM).unwrap();
        let count = renderer.device().uniform(program, uniforms.num_lights.unwrap());
        assert_eq!(count, Some(UniformValue::Int(8)));
    }

    #[test]
    fn test_unknown_shader_keeps_current() {
        let mut renderer = renderer();
        renderer
            .load_shader("flat", "void main() {}", "void main() {}", None)
            .unwrap();
        renderer.use_shader("flat");
        renderer.use_shader("missing");
        assert_eq!(renderer.active_program(), "flat");

        assert!(renderer.load_shader("broken", " ", "void main() {}", None).is_err());
        assert_eq!(renderer.active_program(), "flat");
    }

    #[test]
    fn test_render_outside_frame_is_an_error() {
        let mut renderer = renderer();
        let mut cube = Renderable::cube();
        let result = renderer.render_object(&Transform::default(), &mut cube, &[], Color::black());
        assert!(result.is_err());
    }

    #[test]
    fn test_flags_reach_device() {
        let mut renderer = renderer();
        renderer.set_wireframe(true);
        renderer.set_vsync(false);
        assert_eq!(renderer.device().render_state(), RenderState::WIREFRAME);
    }

    #[test]
    fn test_resize_changes_projection_aspect() {
        let mut renderer = renderer();
        let mut cube = Renderable::cube();
        let camera = Camera::default();
        renderer.resize(400, 100);
        assert_eq!(renderer.size(), (400, 100));

        renderer.begin_frame(&camera).unwrap();
        renderer
            .render_object(&Transform::default(), &mut cube, &[], Color::black())
            .unwrap();

        let (program, uniforms) = renderer.cache().program(DEFAULT_PROGRAM).unwrap();
        let uploaded = renderer.device().uniform(program, uniforms.projection.unwrap());
        assert_eq!(uploaded, Some(mat4_value(&camera.projection_matrix(4.0))));
    }

    #[test]
    fn test_replaced_and_shutdown_programs_are_destroyed() {
        let mut renderer = renderer();
        renderer
            .load_shader("flat", "void main() {}", "void main() {}", None)
            .unwrap();
        renderer
            .load_shader("flat", "void main() { }", "void main() {}", None)
            .unwrap();
        assert_eq!(renderer.device().live_program_count(), 2);

        renderer.shutdown();
        assert_eq!(renderer.device().stats().programs_destroyed, 3);
    }
}
