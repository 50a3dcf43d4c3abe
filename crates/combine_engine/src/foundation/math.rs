//! Math utilities and types
//!
//! Provides fundamental math types for 3D graphics: nalgebra aliases, an
//! RGBA color and an Euler-angle transform.

use serde::{Deserialize, Serialize};

pub use nalgebra::{Matrix3, Matrix4, Vector2, Vector3, Vector4};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Linear RGBA color with components in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    /// Red
    pub r: f32,
    /// Green
    pub g: f32,
    /// Blue
    pub b: f32,
    /// Alpha
    pub a: f32,
}

impl Color {
    /// Create a color from its four components
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque color from three components
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self::new(r, g, b, 1.0)
    }

    /// Opaque white
    pub const fn white() -> Self {
        Self::rgb(1.0, 1.0, 1.0)
    }

    /// Opaque black
    pub const fn black() -> Self {
        Self::rgb(0.0, 0.0, 0.0)
    }

    /// Opaque red
    pub const fn red() -> Self {
        Self::rgb(1.0, 0.0, 0.0)
    }

    /// Opaque green
    pub const fn green() -> Self {
        Self::rgb(0.0, 1.0, 0.0)
    }

    /// Opaque blue
    pub const fn blue() -> Self {
        Self::rgb(0.0, 0.0, 1.0)
    }

    /// Opaque yellow
    pub const fn yellow() -> Self {
        Self::rgb(1.0, 1.0, 0.0)
    }

    /// Opaque cyan
    pub const fn cyan() -> Self {
        Self::rgb(0.0, 1.0, 1.0)
    }

    /// Opaque magenta
    pub const fn magenta() -> Self {
        Self::rgb(1.0, 0.0, 1.0)
    }

    /// Components as an array, in RGBA order
    pub const fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::white()
    }
}

/// Transform representing position, rotation, and scale
///
/// Rotation is stored as Euler angles in degrees, applied X then Y then Z.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Position in 3D space
    pub position: Vec3,

    /// Euler rotation in degrees
    pub rotation: Vec3,

    /// Scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Vec3::zeros(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform with only position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Move by `delta`
    pub fn translate(&mut self, delta: Vec3) {
        self.position += delta;
    }

    /// Rotate by `delta` degrees per axis
    pub fn rotate(&mut self, delta: Vec3) {
        self.rotation += delta;
    }

    /// Rotation part only, as a homogeneous matrix
    pub fn rotation_matrix(&self) -> Mat4 {
        let rx = Mat4::from_axis_angle(&Vec3::x_axis(), utils::deg_to_rad(self.rotation.x));
        let ry = Mat4::from_axis_angle(&Vec3::y_axis(), utils::deg_to_rad(self.rotation.y));
        let rz = Mat4::from_axis_angle(&Vec3::z_axis(), utils::deg_to_rad(self.rotation.z));
        rx * ry * rz
    }

    /// Convert to a model matrix (translate, rotate, then scale)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation_matrix()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }

    /// Inverse-transpose of the upper 3x3 of the model matrix
    ///
    /// Falls back to identity for degenerate (zero-scale) transforms.
    pub fn normal_matrix(&self) -> Mat3 {
        let model = self.to_matrix().fixed_view::<3, 3>(0, 0).into_owned();
        model
            .try_inverse()
            .map_or_else(Mat3::identity, |inverse| inverse.transpose())
    }
}

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;

    /// Radians to degrees conversion factor
    pub const RAD_TO_DEG: f32 = 180.0 / PI;
}

/// Math utility functions
pub mod utils {
    use super::constants;

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// Convert radians to degrees
    pub fn rad_to_deg(radians: f32) -> f32 {
        radians * constants::RAD_TO_DEG
    }

    /// Clamp a value between min and max
    pub fn clamp(value: f32, min: f32, max: f32) -> f32 {
        if value < min {
            min
        } else if value > max {
            max
        } else {
            value
        }
    }

    /// Linear interpolation
    pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_transform_matrix_translation() {
        let transform = Transform::from_position(Vec3::new(1.0, 2.0, 3.0));
        let point = transform.to_matrix().transform_point(&Point3::origin());
        assert_relative_eq!(point.coords, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_transform_rotation_degrees() {
        let mut transform = Transform::identity();
        transform.rotate(Vec3::new(0.0, 90.0, 0.0));
        let rotated = transform.to_matrix().transform_vector(&Vec3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(rotated, Vec3::new(0.0, 0.0, -1.0), epsilon = 1e-5);
    }

    #[test]
    fn test_normal_matrix_handles_zero_scale() {
        let transform = Transform {
            scale: Vec3::zeros(),
            ..Default::default()
        };
        assert_eq!(transform.normal_matrix(), Mat3::identity());
    }

    #[test]
    fn test_utils() {
        assert_relative_eq!(utils::deg_to_rad(180.0), constants::PI);
        assert_relative_eq!(utils::rad_to_deg(constants::PI), 180.0);
        assert_relative_eq!(utils::clamp(5.0, 0.0, 1.0), 1.0);
        assert_relative_eq!(utils::lerp(0.0, 10.0, 0.25), 2.5);
    }
}
