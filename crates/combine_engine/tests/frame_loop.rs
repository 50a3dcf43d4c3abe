use std::cell::{Cell, RefCell};
use std::rc::Rc;

use approx::assert_relative_eq;
use combine_engine::prelude::*;
use combine_engine::render::HeadlessDevice;

fn config(frames: u64) -> EngineConfig {
    EngineConfig::default()
        .with_fixed_timestep(1.0 / 60.0)
        .with_max_frames(frames)
        .with_init_script(None)
}

#[derive(Default)]
struct Lifecycle {
    attached: Cell<u32>,
    updates: Cell<u32>,
    late_updates: Cell<u32>,
    detached: Cell<u32>,
}

struct Spinner {
    speed: f32,
    log: Rc<Lifecycle>,
}

impl Component for Spinner {
    fn on_attach(&mut self, _owner: &mut ComponentOwner<'_>) {
        self.log.attached.set(self.log.attached.get() + 1);
    }

    fn on_detach(&mut self, _owner: &mut ComponentOwner<'_>) {
        self.log.detached.set(self.log.detached.get() + 1);
    }

    fn on_update(&mut self, owner: &mut ComponentOwner<'_>, delta_time: f32) {
        owner.transform.rotation.y += self.speed * delta_time;
        self.log.updates.set(self.log.updates.get() + 1);
    }

    fn on_late_update(&mut self, _owner: &mut ComponentOwner<'_>, _delta_time: f32) {
        self.log.late_updates.set(self.log.late_updates.get() + 1);
    }
}

#[test]
fn test_clock_advances_by_fixed_step() {
    let mut engine = Engine::headless(config(30));
    engine.run().unwrap();

    let clock = engine.clock();
    assert_eq!(clock.frame_count(), 30);
    assert_relative_eq!(clock.total_time(), 0.5, epsilon = 1e-4);
    assert_relative_eq!(clock.delta_time(), 1.0 / 60.0, epsilon = 1e-6);
}

#[test]
fn test_failing_callback_never_blocks_the_next() {
    let mut engine = Engine::headless(config(10));
    let frame = Rc::new(Cell::new(0));
    let seen = Rc::new(RefCell::new(Vec::new()));

    let counter = Rc::clone(&frame);
    engine.on_update(move |_, _| {
        counter.set(counter.get() + 1);
        if counter.get() == 3 {
            return Err("frame three".into());
        }
        Ok(())
    });
    let record = Rc::clone(&seen);
    engine.on_update(move |_, _| {
        record.borrow_mut().push(frame.get());
        Ok(())
    });

    engine.run().unwrap();
    assert_eq!(*seen.borrow(), (1..=10).collect::<Vec<_>>());
}

#[test]
fn test_component_lifecycle_follows_frames() {
    let mut engine = Engine::headless(config(100));
    let log = Rc::new(Lifecycle::default());
    let id = engine.scene_mut().add(SceneObject::new("spinner"));
    engine
        .scene_mut()
        .get_mut(id)
        .unwrap()
        .add_component(Spinner {
            speed: 60.0,
            log: Rc::clone(&log),
        })
        .unwrap();
    assert_eq!(log.attached.get(), 1);

    engine.run_frames(6).unwrap();
    assert_eq!(log.updates.get(), 6);
    assert_eq!(log.late_updates.get(), 6);
    let rotation = engine.scene().get(id).unwrap().transform.rotation.y;
    assert_relative_eq!(rotation, 6.0, epsilon = 1e-4);

    engine
        .scene_mut()
        .get_mut(id)
        .unwrap()
        .set_component_enabled::<Spinner>(false)
        .unwrap();
    engine.run_frames(2).unwrap();
    assert_eq!(log.updates.get(), 6);

    assert!(engine.scene_mut().get_mut(id).unwrap().remove_component::<Spinner>());
    assert_eq!(log.detached.get(), 1);
}

#[test]
fn test_second_component_of_a_type_is_rejected() {
    let log = Rc::new(Lifecycle::default());
    let mut object = SceneObject::new("spinner");
    let first = Spinner {
        speed: 1.0,
        log: Rc::clone(&log),
    };
    let second = Spinner {
        speed: 2.0,
        log: Rc::clone(&log),
    };
    object.add_component(first).unwrap();
    assert!(object.add_component(second).is_err());
    assert_eq!(log.attached.get(), 1);

    let third = Spinner {
        speed: 3.0,
        log: Rc::clone(&log),
    };
    object.replace_component(third).unwrap();
    assert_eq!(log.detached.get(), 1);
    assert_eq!(log.attached.get(), 2);
    assert_relative_eq!(object.component::<Spinner>().unwrap().speed, 3.0);
}

#[test]
fn test_input_edges_are_visible_for_one_frame() {
    let mut device = HeadlessDevice::new();
    device.push_event(AppEvent::KeyInput {
        key: KeyCode::Space,
        pressed: true,
    });
    let renderer = HeadlessRenderer::new(device);
    let mut engine = Engine::new(config(100), Box::new(renderer));

    engine.run_frames(1).unwrap();
    assert!(engine.input().is_key_pressed(KeyCode::Space));

    engine.run_frames(1).unwrap();
    let input = engine.input();
    assert!(input.is_key_down(KeyCode::Space));
    assert!(!input.is_key_pressed(KeyCode::Space));
}

#[test]
fn test_close_request_ends_the_loop() {
    let mut device = HeadlessDevice::new();
    device.push_event(AppEvent::WindowCloseRequested);
    let mut engine = Engine::new(config(100), Box::new(HeadlessRenderer::new(device)));

    engine.run().unwrap();
    assert_eq!(engine.clock().frame_count(), 1);
    assert!(!engine.is_running());
}

#[test]
fn test_frame_limit_holds_for_any_backend() {
    let device = HeadlessDevice::new();
    let mut engine = Engine::new(config(4), Box::new(HeadlessRenderer::new(device)));

    engine.run().unwrap();
    assert_eq!(engine.clock().frame_count(), 4);
    assert!(!engine.renderer().should_close());
}

#[test]
fn test_window_resize_reaches_renderer() {
    let mut device = HeadlessDevice::new();
    device.push_event(AppEvent::WindowResized {
        width: 400,
        height: 100,
    });
    let mut engine = Engine::new(config(100), Box::new(HeadlessRenderer::new(device)));

    engine.run_frames(2).unwrap();
    assert_eq!(engine.renderer().size(), (400, 100));
    assert!(engine.is_running());
}

#[test]
fn test_mesh_upload_is_cached_and_released() {
    let mut engine = Engine::headless(config(100));
    let id = engine
        .scene_mut()
        .add(SceneObject::with_renderable("box", Renderable::cube()));

    engine.run_frames(5).unwrap();
    {
        let renderer = engine.renderer_as::<HeadlessRenderer>().unwrap();
        let stats = renderer.device().stats();
        assert_eq!(stats.draws, 5);
        assert_eq!(stats.buffers_created, 1);
        assert_eq!(renderer.cache().mesh_count(), 1);
    }

    assert!(engine.scene_mut().remove(id));
    engine.run_frames(1).unwrap();
    let renderer = engine.renderer_as::<HeadlessRenderer>().unwrap();
    assert_eq!(renderer.device().stats().buffers_destroyed, 1);
    assert_eq!(renderer.device().live_buffer_count(), 0);
    assert_eq!(renderer.cache().mesh_count(), 0);
}

#[test]
fn test_missing_texture_falls_back_to_white() {
    let mut engine = Engine::headless(config(100));
    let mut renderable = Renderable::cube();
    renderable.set_texture(Some("does/not/exist.png".to_string()));
    engine
        .scene_mut()
        .add(SceneObject::with_renderable("textured", renderable));

    engine.run_frames(2).unwrap();

    let renderer = engine.renderer_as::<HeadlessRenderer>().unwrap();
    let handle = renderer.cache().cached_texture("does/not/exist.png").unwrap();
    let image = renderer.device().texture(handle).unwrap();
    assert_eq!((image.width, image.height), (1, 1));
    assert_eq!(image.data, vec![255, 255, 255, 255]);
    assert_eq!(renderer.device().stats().textures_created, 1);
}

#[test]
fn test_shutdown_releases_backend() {
    let mut engine = Engine::headless(config(3));
    engine.on_update(|_, _| Ok(()));
    engine.run().unwrap();
    engine.shutdown();
    assert!(!engine.is_running());
    assert!(!engine.step_frame());
}
