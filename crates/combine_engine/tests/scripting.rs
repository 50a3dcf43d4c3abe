use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use approx::assert_relative_eq;
use combine_engine::prelude::*;
use combine_engine::scripting::{ScriptContext, ScriptResult};

fn config(frames: u64) -> EngineConfig {
    EngineConfig::default()
        .with_fixed_timestep(0.25)
        .with_max_frames(frames)
        .with_init_script(None)
}

struct Stub {
    name: &'static str,
    extension: &'static str,
    executed: RefCell<Vec<PathBuf>>,
}

impl Stub {
    fn new(name: &'static str, extension: &'static str) -> Rc<Self> {
        Rc::new(Self {
            name,
            extension,
            executed: RefCell::new(Vec::new()),
        })
    }
}

impl ScriptAdapter for Stub {
    fn name(&self) -> &str {
        self.name
    }
    fn extension(&self) -> &str {
        self.extension
    }
    fn initialize(&self) -> ScriptResult<()> {
        Ok(())
    }
    fn register_api(&self, _context: &ScriptContext) -> ScriptResult<()> {
        Ok(())
    }
    fn execute_file(&self, path: &Path) -> ScriptResult<()> {
        self.executed.borrow_mut().push(path.to_path_buf());
        Ok(())
    }
    fn execute_string(&self, _code: &str) -> ScriptResult<()> {
        Ok(())
    }
    fn update(&self, _delta_time: f32) {}
    fn shutdown(&self) {}
}

#[test]
fn test_scripts_route_by_extension() {
    let mut engine = Engine::headless(config(10));
    let a = Stub::new("alpha", ".a");
    let b = Stub::new("beta", ".b");
    engine.add_script_adapter(a.clone()).unwrap();
    engine.add_script_adapter(b.clone()).unwrap();

    engine.execute_script("levels/x.b").unwrap();
    engine.execute_script("levels/y.a").unwrap();
    assert!(matches!(
        engine.execute_script("levels/z.c"),
        Err(EngineError::Script(ScriptError::NoAdapter(_)))
    ));

    assert_eq!(*a.executed.borrow(), vec![PathBuf::from("levels/y.a")]);
    assert_eq!(*b.executed.borrow(), vec![PathBuf::from("levels/x.b")]);
    assert_eq!(engine.script_adapter("b").unwrap().name(), "beta");
}

#[cfg(feature = "lua")]
mod lua {
    use super::*;

    fn engine(frames: u64) -> Engine {
        let mut engine = Engine::headless(config(frames));
        engine
            .add_script_adapter(Rc::new(combine_engine::scripting::LuaAdapter::new()))
            .unwrap();
        engine
    }

    #[test]
    fn test_failing_script_callback_is_isolated() {
        let mut engine = engine(10);
        engine
            .execute_script_string(
                r#"
                local frame = 0
                onUpdate(function(dt)
                    frame = frame + 1
                    if frame == 3 then error("frame three") end
                end)
                local count = 0
                onUpdate(function(dt)
                    count = count + 1
                    getCamera().fov = count
                end)
                "#,
                Some(".lua"),
            )
            .unwrap();

        engine.run().unwrap();
        assert_relative_eq!(engine.scene().camera().fov, 10.0);
    }

    #[test]
    fn test_late_callbacks_see_update_results() {
        let mut engine = engine(4);
        engine
            .execute_script_string(
                r#"
                local cube = createCube("mover")
                addEntity(cube)
                onLateUpdate(function(dt)
                    cube.color = { r = cube.transform.position.x, g = 0, b = 0 }
                end)
                onUpdate(function(dt)
                    cube:translate(dt, 0, 0)
                end)
                "#,
                None,
            )
            .unwrap();

        engine.run().unwrap();
        let scene = engine.scene();
        let id = scene.find_by_name("mover").unwrap();
        let object = scene.get(id).unwrap();
        assert_relative_eq!(object.transform.position.x, 1.0);
        assert_relative_eq!(object.renderable().unwrap().color().r, 1.0);
    }

    #[test]
    fn test_script_sees_input_edges() {
        let mut device = combine_engine::render::HeadlessDevice::new();
        device.push_event(AppEvent::KeyInput {
            key: KeyCode::Space,
            pressed: true,
        });
        let mut engine = Engine::new(config(3), Box::new(HeadlessRenderer::new(device)));
        engine
            .add_script_adapter(Rc::new(combine_engine::scripting::LuaAdapter::new()))
            .unwrap();
        engine
            .execute_script_string(
                r#"
                local presses = 0
                onUpdate(function(dt)
                    if isKeyPressed(KEY_SPACE) then presses = presses + 1 end
                    getCamera().nearPlane = presses
                end)
                "#,
                None,
            )
            .unwrap();

        engine.run().unwrap();
        assert_relative_eq!(engine.scene().camera().near_plane, 1.0);
    }

    #[test]
    fn test_quit_stops_after_the_frame() {
        let mut engine = engine(100);
        engine
            .execute_script_string("onUpdate(function(dt) if frameCount() == 2 then quit() end end)", None)
            .unwrap();
        engine.run().unwrap();
        assert_eq!(engine.clock().frame_count(), 2);
    }

    #[test]
    fn test_render_requests_apply_between_frames() {
        let mut engine = engine(100);
        engine
            .execute_script_string("setWireframe(true)", None)
            .unwrap();
        engine.run_frames(1).unwrap();

        let renderer = engine.renderer_as::<HeadlessRenderer>().unwrap();
        assert!(renderer
            .render_state()
            .contains(combine_engine::render::RenderState::WIREFRAME));
    }

    #[test]
    fn test_dropped_script_entity_is_destroyed() {
        let mut engine = engine(100);
        engine
            .execute_script_string(
                r#"
                local kept = createCube("kept")
                addEntity(kept)
                local temp = createCube("temp")
                temp = nil
                collectgarbage()
                "#,
                None,
            )
            .unwrap();
        engine.run_frames(1).unwrap();

        let scene = engine.scene();
        assert_eq!(scene.len(), 1);
        assert_eq!(scene.live_count(), 1);
    }
}

#[cfg(all(feature = "lua", feature = "rhai"))]
mod cross_language {
    use super::*;
    use combine_engine::scripting::{LuaAdapter, RhaiAdapter};

    fn engine() -> Engine {
        let mut engine = Engine::headless(config(100));
        engine.add_script_adapter(Rc::new(LuaAdapter::new())).unwrap();
        engine.add_script_adapter(Rc::new(RhaiAdapter::new())).unwrap();
        engine
    }

    #[test]
    fn test_lua_requires_rhai_and_back() {
        let dir = tempfile::tempdir().unwrap();
        let rhai_path = dir.path().join("spawn.rhai");
        let lua_path = dir.path().join("tail.lua");
        let main_path = dir.path().join("main.lua");

        fs::write(&lua_path, r#"addEntity(createCube("lua_tail"))"#).unwrap();
        fs::write(
            &rhai_path,
            format!(
                r#"
                let cube = createCube("from_rhai");
                cube.transform.position.y = 5.0;
                addEntity(cube);
                require({:?});
                "#,
                lua_path.display().to_string()
            ),
        )
        .unwrap();
        fs::write(
            &main_path,
            format!(
                r#"
                assert(require({:?}) == true)
                assert(require("missing/file.rhai") == false)
                "#,
                rhai_path.display().to_string()
            ),
        )
        .unwrap();

        let mut engine = engine();
        engine.execute_script(&main_path).unwrap();
        engine.run_frames(1).unwrap();

        let scene = engine.scene();
        let id = scene.find_by_name("from_rhai").unwrap();
        assert_relative_eq!(scene.get(id).unwrap().transform.position.y, 5.0);
        assert!(scene.find_by_name("lua_tail").is_some());
        assert_eq!(scene.len(), 2);
    }

    #[test]
    fn test_both_languages_update_each_frame() {
        let mut engine = engine();
        engine
            .execute_script_string("onUpdate(function(dt) getCamera().fov = getCamera().fov + 1 end)", Some(".lua"))
            .unwrap();
        engine
            .execute_script_string("onUpdate(|dt| { let cam = getCamera(); cam.farPlane = cam.farPlane + 1.0; });", Some(".rhai"))
            .unwrap();

        let fov = engine.scene().camera().fov;
        let far = engine.scene().camera().far_plane;
        engine.run_frames(3).unwrap();
        assert_relative_eq!(engine.scene().camera().fov, fov + 3.0);
        assert_relative_eq!(engine.scene().camera().far_plane, far + 3.0);
    }
}
