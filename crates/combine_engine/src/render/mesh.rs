//! Mesh representation for 3D models
//!
//! CPU-side geometry: an interleaved vertex list, a triangle index list and
//! the primitive shape the geometry was generated from. Renderer backends
//! upload [`Mesh::vertices`] directly, so [`Vertex`] is plain old data.

use crate::foundation::math::{Vec2, Vec3};

/// Interleaved vertex layout uploaded to the GPU
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    /// Position in object space
    pub position: [f32; 3],

    /// Normal vector
    pub normal: [f32; 3],

    /// Texture coordinates
    pub tex_coord: [f32; 2],

    /// Per-vertex color, multiplied with the mesh color
    pub color: [f32; 4],
}

impl Default for Vertex {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            normal: [0.0, 1.0, 0.0],
            tex_coord: [0.0; 2],
            color: [1.0; 4],
        }
    }
}

impl Vertex {
    /// Create a white vertex
    pub fn new(position: Vec3, normal: Vec3, tex_coord: Vec2) -> Self {
        Self {
            position: position.into(),
            normal: normal.into(),
            tex_coord: tex_coord.into(),
            color: [1.0; 4],
        }
    }

    /// Position as a vector
    pub fn position(&self) -> Vec3 {
        Vec3::from(self.position)
    }

    /// Normal as a vector
    pub fn normal(&self) -> Vec3 {
        Vec3::from(self.normal)
    }
}

/// Primitive a mesh was built from
///
/// The lowercase name doubles as the object type tag in map files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MeshShape {
    /// Hand-built geometry
    #[default]
    Custom,
    /// Unit cube
    Cube,
    /// Flat XZ plane
    Plane,
    /// UV sphere
    Sphere,
}

impl MeshShape {
    /// Lowercase tag
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Custom => "mesh",
            Self::Cube => "cube",
            Self::Plane => "plane",
            Self::Sphere => "sphere",
        }
    }

    /// Parse a tag case-insensitively
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "mesh" | "custom" => Some(Self::Custom),
            "cube" => Some(Self::Cube),
            "plane" => Some(Self::Plane),
            "sphere" => Some(Self::Sphere),
            _ => None,
        }
    }
}

/// Indexed triangle mesh
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    /// Vertex data
    pub vertices: Vec<Vertex>,
    /// Triangle list indices into `vertices`
    pub indices: Vec<u32>,
    /// Primitive this mesh was generated from
    pub shape: MeshShape,
}

impl Mesh {
    /// Create an empty custom mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a vertex and return its index
    pub fn add_vertex(&mut self, vertex: Vertex) -> u32 {
        self.vertices.push(vertex);
        u32::try_from(self.vertices.len() - 1).unwrap_or(u32::MAX)
    }

    /// Append a triangle
    pub fn add_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.indices.extend_from_slice(&[a, b, c]);
    }

    /// Remove all geometry
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
    }

    /// Recompute smooth normals by accumulating face normals per vertex
    ///
    /// Triangles referencing out-of-range vertices are skipped.
    pub fn calculate_normals(&mut self) {
        for vertex in &mut self.vertices {
            vertex.normal = [0.0; 3];
        }

        let mut accumulated = vec![Vec3::zeros(); self.vertices.len()];
        for triangle in self.indices.chunks_exact(3) {
            let [i0, i1, i2] = [triangle[0] as usize, triangle[1] as usize, triangle[2] as usize];
            if i0 >= self.vertices.len() || i1 >= self.vertices.len() || i2 >= self.vertices.len() {
                continue;
            }
            let v0 = self.vertices[i0].position();
            let edge1 = self.vertices[i1].position() - v0;
            let edge2 = self.vertices[i2].position() - v0;
            let face = edge1.cross(&edge2).try_normalize(f32::EPSILON).unwrap_or_else(Vec3::zeros);

            accumulated[i0] += face;
            accumulated[i1] += face;
            accumulated[i2] += face;
        }

        for (vertex, normal) in self.vertices.iter_mut().zip(accumulated) {
            vertex.normal = normal
                .try_normalize(f32::EPSILON)
                .unwrap_or_else(Vec3::zeros)
                .into();
        }
    }

    /// Unit cube centred on the origin with per-face normals
    pub fn cube() -> Self {
        const POSITIONS: [[f32; 3]; 8] = [
            [-0.5, -0.5, -0.5],
            [0.5, -0.5, -0.5],
            [0.5, 0.5, -0.5],
            [-0.5, 0.5, -0.5],
            [-0.5, -0.5, 0.5],
            [0.5, -0.5, 0.5],
            [0.5, 0.5, 0.5],
            [-0.5, 0.5, 0.5],
        ];
        const NORMALS: [[f32; 3]; 6] = [
            [0.0, 0.0, -1.0],
            [0.0, 0.0, 1.0],
            [-1.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, -1.0, 0.0],
            [0.0, 1.0, 0.0],
        ];
        const FACES: [[usize; 4]; 6] = [
            [0, 3, 2, 1],
            [4, 5, 6, 7],
            [0, 4, 7, 3],
            [1, 2, 6, 5],
            [0, 1, 5, 4],
            [3, 7, 6, 2],
        ];

        let mut mesh = Self {
            shape: MeshShape::Cube,
            ..Self::default()
        };
        for (face, corners) in FACES.iter().enumerate() {
            let base = mesh.vertices.len() as u32;
            for (corner, &position) in corners.iter().enumerate() {
                let u = if corner == 1 || corner == 2 { 1.0 } else { 0.0 };
                let v = if corner == 2 || corner == 3 { 1.0 } else { 0.0 };
                mesh.vertices.push(Vertex {
                    position: POSITIONS[position],
                    normal: NORMALS[face],
                    tex_coord: [u, v],
                    color: [1.0; 4],
                });
            }
            mesh.add_triangle(base, base + 1, base + 2);
            mesh.add_triangle(base, base + 2, base + 3);
        }
        mesh
    }

    /// Plane in the XZ axes facing +Y
    pub fn plane(width: f32, height: f32) -> Self {
        let (hw, hh) = (width * 0.5, height * 0.5);
        let up = Vec3::y();
        let mut mesh = Self {
            shape: MeshShape::Plane,
            ..Self::default()
        };
        mesh.add_vertex(Vertex::new(Vec3::new(-hw, 0.0, -hh), up, Vec2::new(0.0, 0.0)));
        mesh.add_vertex(Vertex::new(Vec3::new(hw, 0.0, -hh), up, Vec2::new(1.0, 0.0)));
        mesh.add_vertex(Vertex::new(Vec3::new(hw, 0.0, hh), up, Vec2::new(1.0, 1.0)));
        mesh.add_vertex(Vertex::new(Vec3::new(-hw, 0.0, hh), up, Vec2::new(0.0, 1.0)));
        mesh.add_triangle(0, 1, 2);
        mesh.add_triangle(0, 2, 3);
        mesh
    }

    /// UV sphere of radius 0.5
    ///
    /// `segments` and `rings` are clamped to at least 3 and 2.
    pub fn sphere(segments: u32, rings: u32) -> Self {
        let segments = segments.max(3);
        let rings = rings.max(2);
        let mut mesh = Self {
            shape: MeshShape::Sphere,
            ..Self::default()
        };

        for ring in 0..=rings {
            let phi = std::f32::consts::PI * ring as f32 / rings as f32;
            let (ring_radius, y) = phi.sin_cos();
            for segment in 0..=segments {
                let theta = std::f32::consts::TAU * segment as f32 / segments as f32;
                let position = Vec3::new(ring_radius * theta.cos(), y, ring_radius * theta.sin()) * 0.5;
                let normal = position.try_normalize(f32::EPSILON).unwrap_or_else(Vec3::y);
                let uv = Vec2::new(segment as f32 / segments as f32, ring as f32 / rings as f32);
                mesh.add_vertex(Vertex::new(position, normal, uv));
            }
        }

        for ring in 0..rings {
            for segment in 0..segments {
                let current = ring * (segments + 1) + segment;
                let next = current + segments + 1;
                mesh.add_triangle(current, next, current + 1);
                mesh.add_triangle(current + 1, next, next + 1);
            }
        }
        mesh
    }

    /// Geometry for a shape with default parameters
    pub fn from_shape(shape: MeshShape) -> Self {
        match shape {
            MeshShape::Custom => Self::new(),
            MeshShape::Cube => Self::cube(),
            MeshShape::Plane => Self::plane(1.0, 1.0),
            MeshShape::Sphere => Self::sphere(16, 16),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_primitive_sizes() {
        let cube = Mesh::cube();
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.indices.len(), 36);
        assert_eq!(cube.shape, MeshShape::Cube);

        let plane = Mesh::plane(2.0, 4.0);
        assert_eq!(plane.vertices.len(), 4);
        assert_eq!(plane.indices.len(), 6);
        assert_relative_eq!(plane.vertices[2].position[0], 1.0);
        assert_relative_eq!(plane.vertices[2].position[2], 2.0);

        let sphere = Mesh::sphere(8, 4);
        assert_eq!(sphere.vertices.len(), 9 * 5);
        assert_eq!(sphere.indices.len(), 8 * 4 * 6);
        assert!(sphere.indices.iter().all(|&i| (i as usize) < sphere.vertices.len()));
    }

    #[test]
    fn test_calculate_normals_for_flat_triangle() {
        let mut mesh = Mesh::new();
        mesh.add_vertex(Vertex::new(Vec3::zeros(), Vec3::zeros(), Vec2::zeros()));
        mesh.add_vertex(Vertex::new(Vec3::new(0.0, 0.0, 1.0), Vec3::zeros(), Vec2::zeros()));
        mesh.add_vertex(Vertex::new(Vec3::new(1.0, 0.0, 0.0), Vec3::zeros(), Vec2::zeros()));
        mesh.add_triangle(0, 1, 2);
        mesh.calculate_normals();

        for vertex in &mesh.vertices {
            assert_relative_eq!(vertex.normal(), Vec3::y());
        }
    }

    #[test]
    fn test_calculate_normals_skips_bad_indices() {
        let mut mesh = Mesh::cube();
        mesh.add_triangle(0, 1, 999);
        mesh.calculate_normals();
        assert_eq!(mesh.vertices.len(), 24);
    }

    #[test]
    fn test_shape_tags() {
        assert_eq!(MeshShape::parse("Cube"), Some(MeshShape::Cube));
        assert_eq!(MeshShape::parse("teapot"), None);
        assert_eq!(MeshShape::Sphere.as_str(), "sphere");
    }

    #[test]
    fn test_vertex_is_pod() {
        let vertices = [Vertex::default(); 2];
        let bytes: &[u8] = bytemuck::cast_slice(&vertices);
        assert_eq!(bytes.len(), 2 * 12 * 4);
    }
}
