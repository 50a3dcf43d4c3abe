//! # 3D Camera
//!
//! The scene camera: a position plus Euler rotation (pitch around X, yaw
//! around Y, both in degrees) and perspective projection parameters.
//!
//! ## Coordinate System
//! Right-handed, Y-up. With zero rotation the camera looks down -Z.

use serde::{Deserialize, Serialize};

use crate::foundation::math::{utils, Color, Mat4, Point3, Vec3};

/// Perspective camera used by the renderer's `begin_frame`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Camera position in world space
    pub position: Vec3,

    /// Euler rotation in degrees (`x` = pitch, `y` = yaw)
    pub rotation: Vec3,

    /// Vertical field of view in degrees
    pub fov: f32,

    /// Distance to near clipping plane
    pub near_plane: f32,

    /// Distance to far clipping plane
    pub far_plane: f32,

    /// Color the frame is cleared to
    pub clear_color: Color,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 3.0),
            rotation: Vec3::zeros(),
            fov: 60.0,
            near_plane: 0.1,
            far_plane: 1000.0,
            clear_color: Color::new(0.1, 0.1, 0.15, 1.0),
        }
    }
}

impl Camera {
    /// Create a perspective camera
    ///
    /// # Arguments
    /// * `position` - Camera position in world space
    /// * `fov_degrees` - Vertical field of view in degrees
    /// * `near` - Distance to near clipping plane (must be > 0)
    /// * `far` - Distance to far clipping plane (must be > near)
    pub fn perspective(position: Vec3, fov_degrees: f32, near: f32, far: f32) -> Self {
        Self {
            position,
            fov: fov_degrees,
            near_plane: near,
            far_plane: far,
            ..Self::default()
        }
    }

    /// Unit vector the camera looks along
    pub fn forward(&self) -> Vec3 {
        let pitch = utils::deg_to_rad(self.rotation.x);
        let yaw = utils::deg_to_rad(self.rotation.y);
        Vec3::new(
            yaw.sin() * pitch.cos(),
            -pitch.sin(),
            -yaw.cos() * pitch.cos(),
        )
    }

    /// Unit vector to the camera's right, kept in the horizontal plane
    pub fn right(&self) -> Vec3 {
        let yaw = utils::deg_to_rad(self.rotation.y);
        Vec3::new(yaw.cos(), 0.0, yaw.sin())
    }

    /// Unit vector above the camera
    pub fn up(&self) -> Vec3 {
        self.right()
            .cross(&self.forward())
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(Vec3::y)
    }

    /// World-to-view transformation
    ///
    /// # Mathematical Implementation
    /// Standard right-handed look-at from `position` towards
    /// `position + forward()` using [`Camera::up`].
    pub fn view_matrix(&self) -> Mat4 {
        let eye = Point3::from(self.position);
        let target = Point3::from(self.position + self.forward());
        Mat4::look_at_rh(&eye, &target, &self.up())
    }

    /// Perspective projection for a viewport aspect ratio (width / height)
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        let aspect = if aspect.is_finite() && aspect > 0.0 { aspect } else { 1.0 };
        Mat4::new_perspective(aspect, utils::deg_to_rad(self.fov), self.near_plane, self.far_plane)
    }
}
