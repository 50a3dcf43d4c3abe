//! GPU resource cache
//!
//! Backend-independent bookkeeping for everything a renderer uploads:
//!
//! - mesh buffers, one entry per [`RenderId`], rebuilt only when the
//!   renderable is dirty or has no entry yet;
//! - textures keyed by path string, decoded on first use, with a shared
//!   1×1 white texture standing in for anything that fails to load. Files
//!   changed on disk after their first load are not picked up again;
//! - programs keyed by name, each with a [`UniformTable`] resolved once.

use std::collections::HashMap;

use super::device::{GpuDevice, MeshBuffers, ProgramHandle, TextureHandle, UniformLocation};
use super::{BackendResult, RenderError, RenderId, MAX_LIGHTS};
use crate::assets::ImageData;
use crate::scene::Renderable;

/// Name of the built-in program
pub const DEFAULT_PROGRAM: &str = "default";

/// Uniform locations for one entry of the `lights` array
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LightUniforms {
    /// `lights[i].type`
    pub light_type: Option<UniformLocation>,
    /// `lights[i].position`
    pub position: Option<UniformLocation>,
    /// `lights[i].direction`
    pub direction: Option<UniformLocation>,
    /// `lights[i].color`
    pub color: Option<UniformLocation>,
    /// `lights[i].intensity`
    pub intensity: Option<UniformLocation>,
    /// `lights[i].range`
    pub range: Option<UniformLocation>,
    /// `lights[i].spotAngle`
    pub spot_angle: Option<UniformLocation>,
}

/// Uniform locations of a program, resolved once at registration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniformTable {
    /// `model`
    pub model: Option<UniformLocation>,
    /// `view`
    pub view: Option<UniformLocation>,
    /// `projection`
    pub projection: Option<UniformLocation>,
    /// `normalMatrix`
    pub normal_matrix: Option<UniformLocation>,
    /// `viewPos`
    pub view_pos: Option<UniformLocation>,
    /// `time`
    pub time: Option<UniformLocation>,
    /// `meshColor`
    pub mesh_color: Option<UniformLocation>,
    /// `ambientColor`
    pub ambient_color: Option<UniformLocation>,
    /// `uHasTexture`
    pub has_texture: Option<UniformLocation>,
    /// `uTextureSampler`
    pub texture_sampler: Option<UniformLocation>,
    /// `numLights`
    pub num_lights: Option<UniformLocation>,
    /// `lights[0..MAX_LIGHTS]`
    pub lights: [LightUniforms; MAX_LIGHTS],
}

impl UniformTable {
    /// Resolve every known uniform through `lookup`
    pub fn build(mut lookup: impl FnMut(&str) -> Option<UniformLocation>) -> Self {
        let mut lights = [LightUniforms::default(); MAX_LIGHTS];
        for (i, light) in lights.iter_mut().enumerate() {
            let mut field = |name: &str| lookup(&format!("lights[{i}].{name}"));
            *light = LightUniforms {
                light_type: field("type"),
                position: field("position"),
                direction: field("direction"),
                color: field("color"),
                intensity: field("intensity"),
                range: field("range"),
                spot_angle: field("spotAngle"),
            };
        }

        Self {
            model: lookup("model"),
            view: lookup("view"),
            projection: lookup("projection"),
            normal_matrix: lookup("normalMatrix"),
            view_pos: lookup("viewPos"),
            time: lookup("time"),
            mesh_color: lookup("meshColor"),
            ambient_color: lookup("ambientColor"),
            has_texture: lookup("uHasTexture"),
            texture_sampler: lookup("uTextureSampler"),
            num_lights: lookup("numLights"),
            lights,
        }
    }
}

/// Counters describing cache activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Mesh entries created or rebuilt
    pub mesh_builds: u64,
    /// Mesh entries released
    pub mesh_releases: u64,
    /// Textures decoded and uploaded
    pub texture_loads: u64,
    /// Texture requests served by the white fallback
    pub texture_fallbacks: u64,
    /// Uniform tables resolved
    pub uniform_tables_built: u64,
}

#[derive(Debug, Clone)]
struct ProgramEntry {
    handle: ProgramHandle,
    uniforms: UniformTable,
}

/// Renderer-side resource cache
#[derive(Debug)]
pub struct RenderCache {
    next_id: u64,
    meshes: HashMap<RenderId, MeshBuffers>,
    textures: HashMap<String, TextureHandle>,
    fallback_texture: Option<TextureHandle>,
    programs: HashMap<String, ProgramEntry>,
    stats: CacheStats,
}

impl Default for RenderCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderCache {
    /// Create an empty cache; render identities start at 1
    pub fn new() -> Self {
        Self {
            next_id: 1,
            meshes: HashMap::new(),
            textures: HashMap::new(),
            fallback_texture: None,
            programs: HashMap::new(),
            stats: CacheStats::default(),
        }
    }

    fn allocate_id(&mut self) -> RenderId {
        let id = RenderId::new(self.next_id);
        self.next_id += 1;
        id
    }

    /// Make sure the renderable has an up-to-date mesh entry and return it
    ///
    /// Assigns a render identity on first sight. Rebuilds when the
    /// renderable is dirty or its entry is missing, then clears the dirty
    /// flag; otherwise returns the cached buffers untouched.
    pub fn sync_mesh<D: GpuDevice>(
        &mut self,
        device: &mut D,
        renderable: &mut Renderable,
    ) -> BackendResult<MeshBuffers> {
        let id = match renderable.render_id() {
            Some(id) => id,
            None => {
                let id = self.allocate_id();
                renderable.bind_render_id(id);
                id
            }
        };

        if !renderable.is_dirty() {
            if let Some(buffers) = self.meshes.get(&id) {
                return Ok(*buffers);
            }
        }

        let buffers = device.create_mesh_buffers(renderable.vertices(), renderable.indices())?;
        if let Some(previous) = self.meshes.insert(id, buffers) {
            device.destroy_mesh_buffers(previous);
        }
        renderable.mark_clean();
        self.stats.mesh_builds += 1;
        log::debug!(
            "Rebuilt mesh entry {} ({} vertices, {} indices)",
            id,
            renderable.vertex_count(),
            renderable.index_count()
        );
        Ok(buffers)
    }

    /// Drop the mesh entries of the given identities
    pub fn release_meshes<D: GpuDevice>(&mut self, device: &mut D, ids: &[RenderId]) {
        for id in ids {
            if let Some(buffers) = self.meshes.remove(id) {
                device.destroy_mesh_buffers(buffers);
                self.stats.mesh_releases += 1;
                log::debug!("Released mesh entry {}", id);
            }
        }
    }

    /// Texture for a path, loading it on first request
    ///
    /// Decode or upload failures are logged and answered with the 1×1
    /// white texture, which is then cached under that path too.
    pub fn texture<D: GpuDevice>(&mut self, device: &mut D, path: &str) -> BackendResult<TextureHandle> {
        if let Some(handle) = self.textures.get(path) {
            return Ok(*handle);
        }

        let loaded = ImageData::from_file(path)
            .map_err(|e| RenderError::ResourceCreationFailed(e.to_string()))
            .and_then(|image| device.create_texture(&image));

        let handle = match loaded {
            Ok(handle) => {
                self.stats.texture_loads += 1;
                handle
            }
            Err(e) => {
                log::warn!("Texture '{}' unavailable, using white: {}", path, e);
                self.stats.texture_fallbacks += 1;
                self.fallback_texture(device)?
            }
        };

        self.textures.insert(path.to_string(), handle);
        Ok(handle)
    }

    /// The shared 1×1 opaque white texture
    pub fn fallback_texture<D: GpuDevice>(&mut self, device: &mut D) -> BackendResult<TextureHandle> {
        if let Some(handle) = self.fallback_texture {
            return Ok(handle);
        }
        let handle = device.create_texture(&ImageData::white_pixel())?;
        self.fallback_texture = Some(handle);
        Ok(handle)
    }

    /// Compile a program and register it under `name`
    ///
    /// An existing program of the same name is kept if compilation fails
    /// and destroyed once its replacement is registered.
    pub fn register_program<D: GpuDevice>(
        &mut self,
        device: &mut D,
        name: &str,
        vertex_source: &str,
        fragment_source: &str,
        geometry_source: Option<&str>,
    ) -> BackendResult<ProgramHandle> {
        let handle = device.compile_program(vertex_source, fragment_source, geometry_source)?;
        let uniforms = UniformTable::build(|uniform| device.uniform_location(handle, uniform));
        self.stats.uniform_tables_built += 1;
        if let Some(previous) = self
            .programs
            .insert(name.to_string(), ProgramEntry { handle, uniforms })
        {
            device.destroy_program(previous.handle);
        }
        log::info!("Registered shader program '{}'", name);
        Ok(handle)
    }

    /// Program handle and uniform table registered under `name`
    pub fn program(&self, name: &str) -> Option<(ProgramHandle, &UniformTable)> {
        self.programs
            .get(name)
            .map(|entry| (entry.handle, &entry.uniforms))
    }

    /// Whether a program is registered under `name`
    pub fn has_program(&self, name: &str) -> bool {
        self.programs.contains_key(name)
    }

    /// Cached mesh buffers for an identity
    pub fn mesh(&self, id: RenderId) -> Option<&MeshBuffers> {
        self.meshes.get(&id)
    }

    /// Cached texture for a path, without loading
    pub fn cached_texture(&self, path: &str) -> Option<TextureHandle> {
        self.textures.get(path).copied()
    }

    /// Number of live mesh entries
    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    /// Number of cached texture paths
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Activity counters
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Release all mesh entries and programs, and forget every texture
    pub fn clear<D: GpuDevice>(&mut self, device: &mut D) {
        for (_, buffers) in self.meshes.drain() {
            device.destroy_mesh_buffers(buffers);
        }
        for (_, entry) in self.programs.drain() {
            device.destroy_program(entry.handle);
        }
        self.textures.clear();
        self.fallback_texture = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::HeadlessDevice;

    #[test]
    fn test_uniform_table_resolves_light_array() {
        let mut seen = Vec::new();
        let table = UniformTable::build(|name| {
            seen.push(name.to_string());
            Some(UniformLocation(seen.len() as i32))
        });

        assert!(seen.iter().any(|n| n == "lights[7].spotAngle"));
        assert!(seen.iter().any(|n| n == "uHasTexture"));
        assert!(table.lights[7].spot_angle.is_some());
        assert_eq!(seen.len(), MAX_LIGHTS * 7 + 11);
    }

    #[test]
    fn test_sync_mesh_assigns_identity_once() {
        let mut device = HeadlessDevice::new();
        let mut cache = RenderCache::new();
        let mut first = Renderable::cube();
        let mut second = Renderable::plane(1.0, 1.0);

        cache.sync_mesh(&mut device, &mut first).unwrap();
        cache.sync_mesh(&mut device, &mut second).unwrap();
        cache.sync_mesh(&mut device, &mut first).unwrap();

        assert_eq!(first.render_id(), Some(RenderId::new(1)));
        assert_eq!(second.render_id(), Some(RenderId::new(2)));
        assert_eq!(cache.stats().mesh_builds, 2);
        assert_eq!(cache.mesh_count(), 2);
    }

    #[test]
    fn test_rebuild_replaces_buffers() {
        let mut device = HeadlessDevice::new();
        let mut cache = RenderCache::new();
        let mut renderable = Renderable::cube();

        cache.sync_mesh(&mut device, &mut renderable).unwrap();
        renderable.calculate_normals();
        assert!(renderable.is_dirty());
        cache.sync_mesh(&mut device, &mut renderable).unwrap();

        assert!(!renderable.is_dirty());
        assert_eq!(cache.stats().mesh_builds, 2);
        assert_eq!(device.stats().buffers_destroyed, 1);
        assert_eq!(device.live_buffer_count(), 1);
    }

    #[test]
    fn test_release_meshes() {
        let mut device = HeadlessDevice::new();
        let mut cache = RenderCache::new();
        let mut renderable = Renderable::cube();
        cache.sync_mesh(&mut device, &mut renderable).unwrap();

        let id = renderable.render_id().unwrap();
        cache.release_meshes(&mut device, &[id]);
        assert!(cache.mesh(id).is_none());
        assert_eq!(device.live_buffer_count(), 0);
    }

    #[test]
    fn test_failed_program_keeps_previous() {
        let mut device = HeadlessDevice::new();
        let mut cache = RenderCache::new();
        let first = cache
            .register_program(&mut device, "toon", "void main() {}", "void main() {}", None)
            .unwrap();

        let result = cache.register_program(&mut device, "toon", "", "void main() {}", None);
        assert!(result.is_err());
        assert_eq!(cache.program("toon").map(|(handle, _)| handle), Some(first));
        assert_eq!(cache.stats().uniform_tables_built, 1);
    }

    #[test]
    fn test_reregistered_program_frees_previous() {
        let mut device = HeadlessDevice::new();
        let mut cache = RenderCache::new();
        let first = cache
            .register_program(&mut device, "toon", "void main() {}", "void main() {}", None)
            .unwrap();
        let second = cache
            .register_program(&mut device, "toon", "void main() {}", "void main() {}", None)
            .unwrap();

        assert_ne!(first, second);
        assert_eq!(device.live_program_count(), 1);
        assert!(device.uniform_location(first, "model").is_none());

        cache.clear(&mut device);
        assert_eq!(device.live_program_count(), 0);
        assert!(!cache.has_program("toon"));
    }
}
