//! Renderable geometry attached to a scene object
//!
//! Wraps a [`Mesh`] with the material data the renderer needs and the two
//! renderer-facing fields: a dirty flag raised by every geometry mutation
//! and a render identity assigned once by the renderer's cache.

use crate::foundation::math::{Color, Vec2, Vec3};
use crate::render::{Mesh, MeshShape, RenderId, Vertex};

/// CPU-side geometry plus renderer bookkeeping
#[derive(Debug)]
pub struct Renderable {
    mesh: Mesh,
    color: Color,
    texture: Option<String>,
    dirty: bool,
    render_id: Option<RenderId>,
}

impl Default for Renderable {
    fn default() -> Self {
        Self::new(Mesh::new())
    }
}

impl Clone for Renderable {
    /// The copy is a new renderable: no render identity, dirty
    fn clone(&self) -> Self {
        Self {
            mesh: self.mesh.clone(),
            color: self.color,
            texture: self.texture.clone(),
            dirty: true,
            render_id: None,
        }
    }
}

impl Renderable {
    /// Wrap a mesh; new renderables start dirty
    pub fn new(mesh: Mesh) -> Self {
        Self {
            mesh,
            color: Color::white(),
            texture: None,
            dirty: true,
            render_id: None,
        }
    }

    /// Unit cube
    pub fn cube() -> Self {
        Self::new(Mesh::cube())
    }

    /// XZ plane
    pub fn plane(width: f32, height: f32) -> Self {
        Self::new(Mesh::plane(width, height))
    }

    /// UV sphere of radius 0.5
    pub fn sphere(segments: u32, rings: u32) -> Self {
        Self::new(Mesh::sphere(segments, rings))
    }

    /// Geometry
    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// Mutable geometry; marks the renderable dirty
    pub fn mesh_mut(&mut self) -> &mut Mesh {
        self.dirty = true;
        &mut self.mesh
    }

    /// Vertex list
    pub fn vertices(&self) -> &[Vertex] {
        &self.mesh.vertices
    }

    /// Index list
    pub fn indices(&self) -> &[u32] {
        &self.mesh.indices
    }

    /// Number of vertices
    pub fn vertex_count(&self) -> usize {
        self.mesh.vertices.len()
    }

    /// Number of indices
    pub fn index_count(&self) -> usize {
        self.mesh.indices.len()
    }

    /// Primitive the geometry came from
    pub fn shape(&self) -> MeshShape {
        self.mesh.shape
    }

    /// Flat color
    pub fn color(&self) -> Color {
        self.color
    }

    /// Set the flat color
    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    /// Texture path, if any
    pub fn texture(&self) -> Option<&str> {
        self.texture.as_deref()
    }

    /// Set or clear the texture path
    pub fn set_texture(&mut self, path: Option<String>) {
        self.texture = path.filter(|p| !p.is_empty());
    }

    /// Append a white vertex and return its index
    pub fn add_vertex(&mut self, position: Vec3, normal: Vec3, tex_coord: Vec2) -> u32 {
        self.add_vertex_full(Vertex::new(position, normal, tex_coord))
    }

    /// Append a vertex and return its index
    pub fn add_vertex_full(&mut self, vertex: Vertex) -> u32 {
        self.dirty = true;
        self.mesh.add_vertex(vertex)
    }

    /// Append a single index
    pub fn add_index(&mut self, index: u32) {
        self.dirty = true;
        self.mesh.indices.push(index);
    }

    /// Append a triangle
    pub fn add_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.dirty = true;
        self.mesh.add_triangle(a, b, c);
    }

    /// Remove all geometry
    pub fn clear(&mut self) {
        self.dirty = true;
        self.mesh.clear();
    }

    /// Recompute smooth normals
    pub fn calculate_normals(&mut self) {
        self.dirty = true;
        self.mesh.calculate_normals();
    }

    /// Whether geometry changed since the renderer last synchronized it
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Force a re-upload on the next frame
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Called by the renderer after rebuilding this renderable's cache entry
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Render identity, once assigned
    pub fn render_id(&self) -> Option<RenderId> {
        self.render_id
    }

    /// Assign the render identity
    ///
    /// Only the first call has an effect; returns whether it did.
    pub fn bind_render_id(&mut self, id: RenderId) -> bool {
        if let Some(existing) = self.render_id {
            log::warn!("Renderable already bound to {}, ignoring {}", existing, id);
            return false;
        }
        self.render_id = Some(id);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutations_set_dirty() {
        let mut renderable = Renderable::cube();
        renderable.mark_clean();
        renderable.add_triangle(0, 1, 2);
        assert!(renderable.is_dirty());

        renderable.mark_clean();
        renderable.set_color(Color::red());
        renderable.set_texture(Some("a.png".to_string()));
        assert!(!renderable.is_dirty());

        renderable.clear();
        assert!(renderable.is_dirty());
        assert_eq!(renderable.vertex_count(), 0);
    }

    #[test]
    fn test_render_id_binds_once() {
        let mut renderable = Renderable::default();
        assert!(renderable.bind_render_id(RenderId::new(3)));
        assert!(!renderable.bind_render_id(RenderId::new(4)));
        assert_eq!(renderable.render_id(), Some(RenderId::new(3)));
    }

    #[test]
    fn test_clone_is_a_new_instance() {
        let mut original = Renderable::sphere(8, 8);
        original.bind_render_id(RenderId::new(1));
        original.mark_clean();

        let copy = original.clone();
        assert!(copy.render_id().is_none());
        assert!(copy.is_dirty());
        assert_eq!(copy.vertex_count(), original.vertex_count());
    }

    #[test]
    fn test_empty_texture_clears() {
        let mut renderable = Renderable::default();
        renderable.set_texture(Some(String::new()));
        assert!(renderable.texture().is_none());
    }
}
