//! Map files
//!
//! A line-oriented `key: value` format. Top-level keys describe the map and
//! camera; `light:` and `object:` open blocks whose following keys belong to
//! that block until the next block starts. Blank lines and lines starting
//! with `#` are ignored and indentation carries no meaning.
//!
//! ```text
//! # Combine Map File
//! version: 1.0
//! name: Courtyard
//! ambientColor: 0.2,0.2,0.2,1
//! cameraPosition: 0,2,8
//! cameraFov: 75
//!
//! light: point
//!   position: 0,4,0
//!   range: 12
//!
//! object: cube
//!   name: crate
//!   position: 1,0,0
//!   weight: 20
//! ```
//!
//! Unknown object keys are kept, in order, as object properties.

use std::fmt;
use std::io::{BufWriter, Write as _};
use std::path::Path;

use thiserror::Error;

use crate::foundation::math::{Color, Transform, Vec3};
use crate::render::{Light, LightType, Mesh, MeshShape};
use crate::scene::{Renderable, SceneGraph, SceneObject};

/// Map file errors
#[derive(Error, Debug)]
pub enum MapError {
    /// The file could not be read or written
    #[error("Map file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// A numeric value did not parse
    #[error("Line {line}: malformed number in '{value}'")]
    MalformedNumber {
        /// 1-based line number
        line: usize,
        /// Offending value text
        value: String,
    },
}

type MapResult<T> = Result<T, MapError>;

/// An `object:` block
#[derive(Debug, Clone, PartialEq)]
pub struct MapObject {
    /// Shape tag: cube, plane, sphere or mesh
    pub object_type: String,
    /// Object name
    pub name: String,
    /// Free-form tag
    pub tag: String,
    /// Local position
    pub position: Vec3,
    /// Euler rotation
    pub rotation: Vec3,
    /// Local scale, 1,1,1 by default
    pub scale: Vec3,
    /// Renderable color
    pub color: Color,
    /// Mesh path for `mesh` objects
    pub mesh: String,
    /// Texture path, empty for none
    pub texture: String,
    /// Unrecognized keys, in file order
    pub properties: Vec<(String, String)>,
}

impl Default for MapObject {
    fn default() -> Self {
        Self {
            object_type: String::new(),
            name: String::new(),
            tag: String::new(),
            position: Vec3::zeros(),
            rotation: Vec3::zeros(),
            scale: Vec3::new(1.0, 1.0, 1.0),
            color: Color::white(),
            mesh: String::new(),
            texture: String::new(),
            properties: Vec::new(),
        }
    }
}

/// A `light:` block
#[derive(Debug, Clone, PartialEq)]
pub struct MapLight {
    /// Directional, point or spot
    pub light_type: LightType,
    /// World position
    pub position: Vec3,
    /// Direction the light points
    pub direction: Vec3,
    /// Light color
    pub color: Color,
    /// Brightness multiplier
    pub intensity: f32,
    /// Falloff distance
    pub range: f32,
    /// Spot cone angle in degrees
    pub spot_angle: f32,
}

impl Default for MapLight {
    fn default() -> Self {
        Self::from(&Light::default())
    }
}

impl From<&Light> for MapLight {
    fn from(light: &Light) -> Self {
        Self {
            light_type: light.light_type,
            position: light.position,
            direction: light.direction,
            color: light.color,
            intensity: light.intensity,
            range: light.range,
            spot_angle: light.spot_angle,
        }
    }
}

impl From<&MapLight> for Light {
    fn from(light: &MapLight) -> Self {
        Self {
            light_type: light.light_type,
            position: light.position,
            direction: light.direction,
            color: light.color,
            intensity: light.intensity,
            range: light.range,
            spot_angle: light.spot_angle,
        }
    }
}

/// Parsed contents of a map file
#[derive(Debug, Clone, PartialEq)]
pub struct MapData {
    /// Format version, "1.0" by default
    pub version: String,
    /// Map name
    pub name: String,
    /// Scene ambient color
    pub ambient_color: Color,
    /// Camera position
    pub camera_position: Vec3,
    /// Camera Euler rotation
    pub camera_rotation: Vec3,
    /// Camera vertical field of view
    pub camera_fov: f32,
    /// `object:` blocks in file order
    pub objects: Vec<MapObject>,
    /// `light:` blocks in file order
    pub lights: Vec<MapLight>,
}

impl Default for MapData {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: "Untitled Map".to_string(),
            ambient_color: Color::new(0.2, 0.2, 0.2, 1.0),
            camera_position: Vec3::new(0.0, 0.0, 3.0),
            camera_rotation: Vec3::zeros(),
            camera_fov: 60.0,
            objects: Vec::new(),
            lights: Vec::new(),
        }
    }
}

enum Block {
    None,
    Object,
    Light,
}

impl MapData {
    /// Read and parse a map file
    pub fn load(path: impl AsRef<Path>) -> MapResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let map = Self::parse(&text)?;
        log::info!(
            "Loaded map '{}' from {} ({} objects, {} lights)",
            map.name,
            path.display(),
            map.objects.len(),
            map.lights.len()
        );
        Ok(map)
    }

    /// Serialize and write a map file
    pub fn save(&self, path: impl AsRef<Path>) -> MapResult<()> {
        let path = path.as_ref();
        let mut file = BufWriter::new(std::fs::File::create(path)?);
        write!(file, "{}", self)?;
        file.flush()?;
        log::info!("Saved map '{}' to {}", self.name, path.display());
        Ok(())
    }

    /// Parse map text
    pub fn parse(text: &str) -> MapResult<Self> {
        let mut map = Self::default();
        let mut block = Block::None;

        for (index, raw) in text.lines().enumerate() {
            let line_number = index + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                log::trace!("Skipping line {} without a key", line_number);
                continue;
            };
            let (key, value) = (key.trim(), value.trim());
            let float = |v: &str| parse_float(v, line_number);

            match key {
                "object" => {
                    map.objects.push(MapObject {
                        object_type: value.to_string(),
                        ..MapObject::default()
                    });
                    block = Block::Object;
                    continue;
                }
                "light" => {
                    map.lights.push(MapLight {
                        light_type: LightType::parse_lenient(value),
                        ..MapLight::default()
                    });
                    block = Block::Light;
                    continue;
                }
                _ => {}
            }

            match block {
                Block::Object => {
                    let Some(object) = map.objects.last_mut() else {
                        continue;
                    };
                    match key {
                        "name" => object.name = value.to_string(),
                        "tag" => object.tag = value.to_string(),
                        "position" => object.position = parse_vec3(value, line_number)?,
                        "rotation" => object.rotation = parse_vec3(value, line_number)?,
                        "scale" => object.scale = parse_vec3(value, line_number)?,
                        "color" => object.color = parse_color(value, line_number)?,
                        "mesh" => object.mesh = value.to_string(),
                        "texture" => object.texture = value.to_string(),
                        _ => object.properties.push((key.to_string(), value.to_string())),
                    }
                }
                Block::Light => {
                    let Some(light) = map.lights.last_mut() else {
                        continue;
                    };
                    match key {
                        "position" => light.position = parse_vec3(value, line_number)?,
                        "direction" => light.direction = parse_vec3(value, line_number)?,
                        "color" => light.color = parse_color(value, line_number)?,
                        "intensity" => light.intensity = float(value)?,
                        "range" => light.range = float(value)?,
                        "spotAngle" => light.spot_angle = float(value)?,
                        _ => log::debug!("Ignoring light key '{}' on line {}", key, line_number),
                    }
                }
                Block::None => match key {
                    "version" => map.version = value.to_string(),
                    "name" => map.name = value.to_string(),
                    "ambientColor" => map.ambient_color = parse_color(value, line_number)?,
                    "cameraPosition" => map.camera_position = parse_vec3(value, line_number)?,
                    "cameraRotation" => map.camera_rotation = parse_vec3(value, line_number)?,
                    "cameraFov" => map.camera_fov = float(value)?,
                    _ => log::debug!("Ignoring map key '{}' on line {}", key, line_number),
                },
            }
        }

        Ok(map)
    }

    /// Render as map text; lights are written before objects
    pub fn serialize(&self) -> String {
        self.to_string()
    }

    fn write_to(&self, out: &mut impl fmt::Write) -> fmt::Result {
        writeln!(out, "# Combine Map File")?;
        writeln!(out, "version: {}", self.version)?;
        writeln!(out, "name: {}", self.name)?;
        writeln!(out, "ambientColor: {}", format_color(self.ambient_color))?;
        writeln!(out, "cameraPosition: {}", format_vec3(&self.camera_position))?;
        writeln!(out, "cameraRotation: {}", format_vec3(&self.camera_rotation))?;
        writeln!(out, "cameraFov: {}", self.camera_fov)?;
        writeln!(out)?;

        for light in &self.lights {
            writeln!(out, "light: {}", light.light_type.as_str())?;
            writeln!(out, "  position: {}", format_vec3(&light.position))?;
            writeln!(out, "  direction: {}", format_vec3(&light.direction))?;
            writeln!(out, "  color: {}", format_color(light.color))?;
            writeln!(out, "  intensity: {}", light.intensity)?;
            writeln!(out, "  range: {}", light.range)?;
            writeln!(out, "  spotAngle: {}", light.spot_angle)?;
            writeln!(out)?;
        }

        for object in &self.objects {
            writeln!(out, "object: {}", object.object_type)?;
            writeln!(out, "  name: {}", object.name)?;
            writeln!(out, "  tag: {}", object.tag)?;
            writeln!(out, "  position: {}", format_vec3(&object.position))?;
            writeln!(out, "  rotation: {}", format_vec3(&object.rotation))?;
            writeln!(out, "  scale: {}", format_vec3(&object.scale))?;
            writeln!(out, "  color: {}", format_color(object.color))?;
            if !object.mesh.is_empty() {
                writeln!(out, "  mesh: {}", object.mesh)?;
            }
            if !object.texture.is_empty() {
                writeln!(out, "  texture: {}", object.texture)?;
            }
            for (key, value) in &object.properties {
                writeln!(out, "  {}: {}", key, value)?;
            }
            writeln!(out)?;
        }
        Ok(())
    }

    /// Replace the scene's contents with this map
    ///
    /// Shader handles survive; objects of an unknown type become cubes.
    pub fn apply_to_scene(&self, scene: &mut SceneGraph) {
        scene.clear();
        scene.set_ambient_color(self.ambient_color);

        let camera = scene.camera_mut();
        camera.position = self.camera_position;
        camera.rotation = self.camera_rotation;
        camera.fov = self.camera_fov;

        for light in &self.lights {
            scene.add_light(Light::from(light));
        }

        for entry in &self.objects {
            let shape = match MeshShape::parse(&entry.object_type) {
                Some(shape @ (MeshShape::Cube | MeshShape::Plane | MeshShape::Sphere)) => shape,
                _ => {
                    log::warn!(
                        "Unknown object type '{}' for '{}', using a cube",
                        entry.object_type,
                        entry.name
                    );
                    MeshShape::Cube
                }
            };
            let mut renderable = Renderable::new(Mesh::from_shape(shape));
            renderable.set_color(entry.color);
            if !entry.texture.is_empty() {
                renderable.set_texture(Some(entry.texture.clone()));
            }

            let mut object = SceneObject::with_renderable(entry.name.clone(), renderable)
                .with_tag(entry.tag.clone())
                .with_transform(Transform {
                    position: entry.position,
                    rotation: entry.rotation,
                    scale: entry.scale,
                });
            object.properties = entry.properties.clone();
            scene.add(object);
        }
    }

    /// Capture a scene; objects without geometry are skipped
    pub fn from_scene(scene: &SceneGraph) -> Self {
        let camera = scene.camera();
        let objects = scene
            .objects()
            .filter_map(|(_, object)| {
                let renderable = object.renderable()?;
                Some(MapObject {
                    object_type: renderable.shape().as_str().to_string(),
                    name: object.name.clone(),
                    tag: object.tag.clone(),
                    position: object.transform.position,
                    rotation: object.transform.rotation,
                    scale: object.transform.scale,
                    color: renderable.color(),
                    mesh: String::new(),
                    texture: renderable.texture().unwrap_or_default().to_string(),
                    properties: object.properties.clone(),
                })
            })
            .collect();

        Self {
            ambient_color: scene.ambient_color(),
            camera_position: camera.position,
            camera_rotation: camera.rotation,
            camera_fov: camera.fov,
            objects,
            lights: scene.lights().iter().map(MapLight::from).collect(),
            ..Self::default()
        }
    }
}

impl fmt::Display for MapData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_to(f)
    }
}

fn parse_float(value: &str, line: usize) -> MapResult<f32> {
    value
        .trim()
        .parse::<f32>()
        .map_err(|_| MapError::MalformedNumber {
            line,
            value: value.to_string(),
        })
}

/// Up to the first `N` comma-separated floats written over `base`
fn parse_components<const N: usize>(value: &str, line: usize, mut base: [f32; N]) -> MapResult<[f32; N]> {
    for (slot, part) in base.iter_mut().zip(value.split(',')) {
        *slot = parse_float(part, line)?;
    }
    Ok(base)
}

fn parse_vec3(value: &str, line: usize) -> MapResult<Vec3> {
    let [x, y, z] = parse_components(value, line, [0.0; 3])?;
    Ok(Vec3::new(x, y, z))
}

fn parse_color(value: &str, line: usize) -> MapResult<Color> {
    let [r, g, b, a] = parse_components(value, line, [1.0; 4])?;
    Ok(Color::new(r, g, b, a))
}

fn format_vec3(v: &Vec3) -> String {
    format!("{},{},{}", v.x, v.y, v.z)
}

fn format_color(c: Color) -> String {
    format!("{},{},{},{}", c.r, c.g, c.b, c.a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SAMPLE: &str = "
# Combine Map File
version: 1.0
name: Courtyard
ambientColor: 0.1,0.2,0.3,1
cameraPosition: 0,2,8
cameraFov: 75

light: POINT
  position: 0,4,0
  range: 12

object: cube
  name: crate
  tag: prop
  position: 1,2,3
  weight: 20
  material: wood

object: teapot
  name: odd
";

    #[test]
    fn test_parse_sample() {
        let map = MapData::parse(SAMPLE).unwrap();
        assert_eq!(map.name, "Courtyard");
        assert_relative_eq!(map.camera_fov, 75.0);
        assert_relative_eq!(map.camera_position.y, 2.0);
        assert_relative_eq!(map.ambient_color.b, 0.3);

        assert_eq!(map.lights.len(), 1);
        assert_eq!(map.lights[0].light_type, LightType::Point);
        assert_relative_eq!(map.lights[0].range, 12.0);
        assert_relative_eq!(map.lights[0].intensity, 1.0);

        let crate_object = &map.objects[0];
        assert_eq!(crate_object.name, "crate");
        assert_eq!(crate_object.tag, "prop");
        assert_eq!(crate_object.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(crate_object.scale, Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(
            crate_object.properties,
            vec![
                ("weight".to_string(), "20".to_string()),
                ("material".to_string(), "wood".to_string())
            ]
        );
    }

    #[test]
    fn test_partial_components() {
        let map = MapData::parse("ambientColor: 0.5\ncameraPosition: 4").unwrap();
        assert_eq!(map.ambient_color, Color::new(0.5, 1.0, 1.0, 1.0));
        assert_eq!(map.camera_position, Vec3::new(4.0, 0.0, 0.0));
    }

    #[test]
    fn test_malformed_number_reports_line() {
        let err = MapData::parse("version: 1\ncameraFov: wide").unwrap_err();
        assert!(matches!(err, MapError::MalformedNumber { line: 2, .. }));
    }

    #[test]
    fn test_unknown_type_becomes_cube() {
        let map = MapData::parse(SAMPLE).unwrap();
        let mut scene = SceneGraph::new();
        map.apply_to_scene(&mut scene);

        let odd = scene.find_by_name("odd").and_then(|id| scene.get(id)).unwrap();
        assert_eq!(odd.renderable().map(Renderable::shape), Some(MeshShape::Cube));
        let crate_object = scene.find_by_name("crate").and_then(|id| scene.get(id)).unwrap();
        assert_eq!(crate_object.property("material"), Some("wood"));
    }

    #[test]
    fn test_serialize_writes_lights_first() {
        let map = MapData::parse(SAMPLE).unwrap();
        let text = map.serialize();
        assert!(text.starts_with("# Combine Map File\n"));
        let light_at = text.find("light: point").unwrap();
        let object_at = text.find("object: cube").unwrap();
        assert!(light_at < object_at);
        assert!(text.contains("  weight: 20\n"));
    }

    #[test]
    fn test_from_scene_skips_plain_objects() {
        let mut scene = SceneGraph::new();
        scene.add(SceneObject::new("spawner"));
        scene.add(SceneObject::with_renderable("floor", Renderable::plane(4.0, 4.0)));
        let map = MapData::from_scene(&scene);
        assert_eq!(map.objects.len(), 1);
        assert_eq!(map.objects[0].object_type, "plane");
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("level.cmap");
        let map = MapData::parse(SAMPLE).unwrap();
        map.save(&path).unwrap();
        assert_eq!(MapData::load(&path).unwrap(), map);
    }

    #[test]
    fn test_save_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("level.cmap");
        let map = MapData::parse(SAMPLE).unwrap();
        assert!(matches!(map.save(&path), Err(MapError::Io(_))));
        assert_eq!(map.to_string(), map.serialize());
    }
}
