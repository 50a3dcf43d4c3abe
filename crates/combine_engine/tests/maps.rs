use std::fs;

use approx::assert_relative_eq;
use combine_engine::prelude::*;

const LEVEL: &str = "\
# test level
version: 1.0
name: Yard
ambientColor: 0.1,0.1,0.2
cameraPosition: 0,3,10
cameraFov: 75

light: directional
  direction: 0,-1,0
  intensity: 0.8

object: cube
  name: crate
  tag: prop
  position: 1,2,3
  color: 1,0.5,0
  weight: 20

object: sphere
  name: ball
  scale: 2,2,2
";

fn engine() -> Engine {
    Engine::headless(
        EngineConfig::default()
            .with_fixed_timestep(0.1)
            .with_max_frames(100)
            .with_init_script(None),
    )
}

#[test]
fn test_load_map_replaces_scene() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("yard.map");
    fs::write(&path, LEVEL).unwrap();

    let mut engine = engine();
    engine.scene_mut().add(SceneObject::new("leftover"));
    engine.load_map(&path).unwrap();

    let scene = engine.scene();
    assert_relative_eq!(scene.camera().fov, 75.0);
    assert_relative_eq!(scene.camera().position.z, 10.0);
    assert_relative_eq!(scene.ambient_color().b, 0.2);
    assert_eq!(scene.lights().len(), 1);
    assert_eq!(scene.lights()[0].light_type, LightType::Directional);
    assert!(scene.find_by_name("leftover").is_none());

    let crate_id = scene.find_by_name("crate").unwrap();
    let crate_object = scene.get(crate_id).unwrap();
    assert_eq!(crate_object.tag, "prop");
    assert_eq!(crate_object.transform.position, Vec3::new(1.0, 2.0, 3.0));
    assert_eq!(crate_object.property("weight"), Some("20"));
    assert_relative_eq!(crate_object.renderable().unwrap().color().g, 0.5);

    let ball = scene.get(scene.find_by_name("ball").unwrap()).unwrap();
    assert_eq!(ball.transform.scale, Vec3::new(2.0, 2.0, 2.0));
}

#[test]
fn test_saved_map_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("yard.map");
    let saved = dir.path().join("saved.map");
    fs::write(&source, LEVEL).unwrap();

    let mut engine = engine();
    engine.load_map(&source).unwrap();
    engine.run_frames(2).unwrap();
    engine.save_map(&saved).unwrap();

    let original = MapData::parse(LEVEL).unwrap();
    let reloaded = MapData::load(&saved).unwrap();
    assert_relative_eq!(reloaded.camera_fov, original.camera_fov);
    assert_eq!(reloaded.lights.len(), original.lights.len());
    assert_eq!(reloaded.objects.len(), 2);
    let names: Vec<&str> = reloaded.objects.iter().map(|object| object.name.as_str()).collect();
    assert_eq!(names, vec!["crate", "ball"]);
    assert_eq!(reloaded.objects[0].position, original.objects[0].position);
    assert_eq!(reloaded.objects[1].object_type, "sphere");
}

#[test]
fn test_missing_map_is_an_error() {
    let mut engine = engine();
    let result = engine.load_map("no/such/level.map");
    assert!(matches!(result, Err(EngineError::Map(_))));
}

#[test]
fn test_config_round_trips_through_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("combine.toml");
    let config = EngineConfig::default()
        .with_title("Yard")
        .with_fixed_timestep(0.02)
        .with_max_frames(7);
    config.save_to_file(&path).unwrap();

    let loaded = EngineConfig::load_from_file(&path).unwrap();
    assert_eq!(loaded, config);

    let mut engine = Engine::headless(loaded);
    engine.run().unwrap();
    assert_eq!(engine.clock().frame_count(), 7);
}
