//! Lighting system
//!
//! Light descriptors stored by the scene and uploaded by the renderer. How
//! each type is shaded is up to the backend's programs; the descriptor only
//! carries the parameters.

use serde::{Deserialize, Serialize};

use crate::foundation::math::{Color, Vec3};

/// Maximum number of lights uploaded per draw; the rest are ignored
pub const MAX_LIGHTS: usize = 8;

/// Light types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LightType {
    /// Directional light (like sunlight); range is ignored
    #[default]
    Directional = 0,
    /// Point light, attenuated within its range
    Point = 1,
    /// Spot light, a point light cut to a cone
    Spot = 2,
}

impl LightType {
    /// Integer value exposed to shaders and scripts
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Type from its integer value
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Directional),
            1 => Some(Self::Point),
            2 => Some(Self::Spot),
            _ => None,
        }
    }

    /// Lowercase name used in map files
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Directional => "directional",
            Self::Point => "point",
            Self::Spot => "spot",
        }
    }

    /// Parse a name case-insensitively; anything unknown is directional
    pub fn parse_lenient(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "point" => Self::Point,
            "spot" => Self::Spot,
            _ => Self::Directional,
        }
    }
}

/// Light source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Light {
    /// Light type
    pub light_type: LightType,
    /// Light position (for point/spot lights)
    pub position: Vec3,
    /// Light direction (for directional/spot lights)
    pub direction: Vec3,
    /// Light color
    pub color: Color,
    /// Light intensity
    pub intensity: f32,
    /// Light range (for point/spot lights)
    pub range: f32,
    /// Spot cone angle in degrees
    pub spot_angle: f32,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            light_type: LightType::Directional,
            position: Vec3::zeros(),
            direction: Vec3::new(0.0, -1.0, 0.0),
            color: Color::white(),
            intensity: 1.0,
            range: 10.0,
            spot_angle: 45.0,
        }
    }
}

impl Light {
    /// Create a directional light
    pub fn directional(direction: Vec3, color: Color, intensity: f32) -> Self {
        Self {
            direction,
            color,
            intensity,
            ..Self::default()
        }
    }

    /// Create a point light
    pub fn point(position: Vec3, color: Color, intensity: f32, range: f32) -> Self {
        Self {
            light_type: LightType::Point,
            position,
            color,
            intensity,
            range,
            ..Self::default()
        }
    }

    /// Create a spot light
    pub fn spot(position: Vec3, direction: Vec3, color: Color, intensity: f32, spot_angle: f32) -> Self {
        Self {
            light_type: LightType::Spot,
            position,
            direction,
            color,
            intensity,
            spot_angle,
            ..Self::default()
        }
    }

    /// Light of the given type with default parameters
    pub fn of_type(light_type: LightType) -> Self {
        Self {
            light_type,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let light = Light::default();
        assert_eq!(light.light_type, LightType::Directional);
        assert_eq!(light.direction, Vec3::new(0.0, -1.0, 0.0));
        assert_eq!(light.color, Color::white());
        assert!((light.range - 10.0).abs() < f32::EPSILON);
        assert!((light.spot_angle - 45.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_type_parsing() {
        assert_eq!(LightType::parse_lenient("SPOT"), LightType::Spot);
        assert_eq!(LightType::parse_lenient("Point "), LightType::Point);
        assert_eq!(LightType::parse_lenient("laser"), LightType::Directional);
        assert_eq!(LightType::from_code(2), Some(LightType::Spot));
        assert_eq!(LightType::from_code(3), None);
    }
}
