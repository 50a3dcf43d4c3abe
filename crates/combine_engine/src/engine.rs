//! Core engine implementation
//!
//! The engine owns the clock, input state, scene graph, one render backend
//! and the loaded script adapters, and drives the fixed frame sequence:
//!
//! 1. advance the clock,
//! 2. swap input snapshots, then apply platform events from the backend
//!    (input edges, window resize and close),
//! 3. scene update, then native update callbacks,
//! 4. script adapters,
//! 5. scene late update, then native late-update callbacks,
//! 6. renderer requests queued by scripts,
//! 7. begin frame, one draw per active renderable, end frame,
//! 8. destroy orphaned objects and release their cache entries.
//!
//! The loop ends when a stop was requested, the backend reports its
//! surface closed, or `renderer.max_frames` frames have run.

use std::cell::{Ref, RefCell, RefMut};
use std::path::Path;
use std::rc::Rc;

use thiserror::Error;

use crate::application::AppEvent;
use crate::assets::{MapData, MapError};
use crate::core::config::{ConfigError, EngineConfig};
use crate::foundation::time::Clock;
use crate::input::InputState;
use crate::render::{HeadlessDevice, HeadlessRenderer, RenderBackend, RenderError, Shader};
use crate::scene::SceneGraph;
use crate::scripting::{
    CallbackList, EngineSignals, RenderRequest, ScriptAdapter, ScriptContext, ScriptDispatcher, ScriptError,
};

/// Result of a native callback; errors are logged and the frame goes on
pub type CallbackResult = Result<(), Box<dyn std::error::Error>>;

/// Native per-frame callback
pub type NativeCallback = Rc<RefCell<dyn FnMut(&mut SceneGraph, f32) -> CallbackResult>>;

/// Name under which configured default shaders are registered
const CONFIGURED_SHADER: &str = "configured";

/// Main engine struct
///
/// Shared state lives behind `Rc<RefCell<_>>` so script adapters can reach
/// it during the script phase; the engine never holds a borrow across a
/// call into an adapter or a callback.
pub struct Engine {
    config: EngineConfig,
    scene: Rc<RefCell<SceneGraph>>,
    clock: Rc<RefCell<Clock>>,
    input: Rc<RefCell<InputState>>,
    signals: Rc<EngineSignals>,
    dispatcher: Rc<ScriptDispatcher>,
    renderer: Box<dyn RenderBackend>,
    update_callbacks: CallbackList<NativeCallback>,
    late_update_callbacks: CallbackList<NativeCallback>,
    running: bool,
    initialized: bool,
}

impl Engine {
    /// Create an engine around a render backend
    pub fn new(config: EngineConfig, renderer: Box<dyn RenderBackend>) -> Self {
        Self {
            config,
            scene: Rc::new(RefCell::new(SceneGraph::new())),
            clock: Rc::new(RefCell::new(Clock::new())),
            input: Rc::new(RefCell::new(InputState::new())),
            signals: Rc::new(EngineSignals::new()),
            dispatcher: Rc::new(ScriptDispatcher::new()),
            renderer,
            update_callbacks: CallbackList::new("update"),
            late_update_callbacks: CallbackList::new("late update"),
            running: false,
            initialized: false,
        }
    }

    /// Create an engine on the headless backend
    pub fn headless(config: EngineConfig) -> Self {
        Self::new(config, Box::new(HeadlessRenderer::new(HeadlessDevice::new())))
    }

    /// Initialize the backend and apply the configured presentation state
    pub fn initialize(&mut self) -> Result<(), EngineError> {
        if self.initialized {
            return Ok(());
        }
        log::info!("Initializing engine...");

        self.config
            .validate()
            .map_err(EngineError::InitializationFailed)?;

        let window = &self.config.window;
        self.renderer
            .initialize(window.width, window.height, &window.title)
            .map_err(|e| EngineError::InitializationFailed(format!("Renderer: {}", e)))?;
        self.renderer.set_vsync(window.vsync);
        self.renderer.set_wireframe(window.wireframe);
        self.clock
            .borrow_mut()
            .set_time_scale(self.config.time.time_scale);

        let shaders = (
            self.config.renderer.vertex_shader.clone(),
            self.config.renderer.fragment_shader.clone(),
        );
        if let (Some(vertex), Some(fragment)) = shaders {
            match self.load_shader_files(CONFIGURED_SHADER, &vertex, &fragment) {
                Ok(()) => self.renderer.use_shader(CONFIGURED_SHADER),
                Err(e) => log::warn!("Configured shaders not loaded, keeping the default program: {}", e),
            }
        }

        self.initialized = true;
        log::info!("Engine initialized");
        Ok(())
    }

    /// Initialize and register a script adapter
    pub fn add_script_adapter(&mut self, adapter: Rc<dyn ScriptAdapter>) -> Result<(), EngineError> {
        adapter.initialize()?;
        adapter.register_api(&self.context())?;
        self.dispatcher.add(adapter);
        Ok(())
    }

    /// Register every compiled-in adapter enabled in the configuration
    pub fn install_default_adapters(&mut self) -> Result<(), EngineError> {
        #[cfg(feature = "lua")]
        if self.config.scripting.is_enabled("lua") {
            self.add_script_adapter(Rc::new(crate::scripting::LuaAdapter::new()))?;
        }
        #[cfg(feature = "rhai")]
        if self.config.scripting.is_enabled("rhai") {
            self.add_script_adapter(Rc::new(crate::scripting::RhaiAdapter::new()))?;
        }
        Ok(())
    }

    /// Execute the configured init script, if one is set and exists
    ///
    /// Returns whether it ran successfully.
    pub fn run_init_script(&self) -> bool {
        let Some(path) = self.config.scripting.init_script.as_deref() else {
            return false;
        };
        if !Path::new(path).exists() {
            log::info!("No init script at {}", path);
            return false;
        }
        self.execute_script(path).is_ok()
    }

    /// Run frames until a stop is requested or the surface closes
    pub fn run(&mut self) -> Result<(), EngineError> {
        self.initialize()?;
        self.running = !self.should_stop();

        log::info!("Starting main loop...");
        while self.running {
            self.step_frame();
        }
        log::info!(
            "Main loop finished after {} frames",
            self.clock.borrow().frame_count()
        );
        Ok(())
    }

    /// Run at most `frames` frames; returns how many ran
    pub fn run_frames(&mut self, frames: usize) -> Result<usize, EngineError> {
        self.initialize()?;
        self.running = !self.should_stop();

        let mut executed = 0;
        while self.running && executed < frames {
            self.step_frame();
            executed += 1;
        }
        Ok(executed)
    }

    /// Execute one frame; returns whether the loop should continue
    pub fn step_frame(&mut self) -> bool {
        if !self.initialized {
            log::warn!("step_frame called before initialize");
            return false;
        }

        let delta_time = {
            let mut clock = self.clock.borrow_mut();
            match self.config.time.fixed_timestep {
                Some(step) => clock.advance(step),
                None => clock.tick(),
            }
            clock.delta_time()
        };
        log::trace!("Frame {} dt={:.4}", self.clock.borrow().frame_count(), delta_time);

        self.input.borrow_mut().update();
        self.apply_platform_events();

        self.scene.borrow_mut().update(delta_time);
        run_native_callbacks(&self.update_callbacks, &self.scene, delta_time);

        self.dispatcher.update(delta_time);

        self.scene.borrow_mut().late_update(delta_time);
        run_native_callbacks(&self.late_update_callbacks, &self.scene, delta_time);

        self.apply_render_requests();
        self.render();
        self.release_destroyed();

        self.running = !self.should_stop();
        self.running
    }

    fn should_stop(&self) -> bool {
        self.signals.stop_requested() || self.renderer.should_close() || self.frame_limit_reached()
    }

    fn frame_limit_reached(&self) -> bool {
        self.config
            .renderer
            .max_frames
            .is_some_and(|limit| self.clock.borrow().frame_count() >= limit)
    }

    fn apply_render_requests(&mut self) {
        for request in self.signals.drain() {
            match request {
                RenderRequest::SetWireframe(enabled) => self.renderer.set_wireframe(enabled),
                RenderRequest::SetVSync(enabled) => self.renderer.set_vsync(enabled),
                RenderRequest::LoadShader {
                    name,
                    vertex_path,
                    fragment_path,
                } => {
                    if let Err(e) = self.load_shader_files(&name, &vertex_path, &fragment_path) {
                        log::error!("Failed to load shader '{}': {}", name, e);
                    }
                }
                RenderRequest::UseShader(name) => self.renderer.use_shader(&name),
            }
        }
    }

    fn render(&mut self) {
        let mut scene = self.scene.borrow_mut();
        if let Err(e) = self.renderer.begin_frame(scene.camera()) {
            log::error!("begin_frame failed: {}", e);
            return;
        }

        let renderer = &mut self.renderer;
        scene.for_each_renderable(|transform, renderable, lights, ambient| {
            if let Err(e) = renderer.render_object(transform, renderable, lights, ambient) {
                log::error!("render_object failed: {}", e);
            }
        });

        if let Err(e) = self.renderer.end_frame() {
            log::error!("end_frame failed: {}", e);
        }
    }

    fn apply_platform_events(&mut self) {
        let events = self.renderer.drain_events();
        if events.is_empty() {
            return;
        }
        let mut input = self.input.borrow_mut();
        for event in &events {
            match *event {
                AppEvent::WindowCloseRequested => {
                    log::info!("Window close requested");
                    self.signals.request_stop();
                }
                AppEvent::WindowResized { width, height } => self.renderer.resize(width, height),
                _ => {}
            }
            event.apply_to(&mut input);
        }
    }

    fn release_destroyed(&mut self) {
        let retired = {
            let mut scene = self.scene.borrow_mut();
            let destroyed = scene.collect_orphans();
            if destroyed > 0 {
                log::trace!("Destroyed {} unreferenced objects", destroyed);
            }
            scene.take_retired_render_ids()
        };
        if !retired.is_empty() {
            self.renderer.release_render_ids(&retired);
        }
    }

    /// Register a native update callback, run after the scene update
    pub fn on_update<F>(&mut self, callback: F)
    where
        F: FnMut(&mut SceneGraph, f32) -> CallbackResult + 'static,
    {
        self.update_callbacks.push(Rc::new(RefCell::new(callback)));
    }

    /// Register a native late-update callback, run after the scene late update
    pub fn on_late_update<F>(&mut self, callback: F)
    where
        F: FnMut(&mut SceneGraph, f32) -> CallbackResult + 'static,
    {
        self.late_update_callbacks.push(Rc::new(RefCell::new(callback)));
    }

    /// Execute a script file with the adapter claiming its extension
    ///
    /// Failures are logged and returned.
    pub fn execute_script(&self, path: impl AsRef<Path>) -> Result<(), EngineError> {
        let path = path.as_ref();
        self.dispatcher.execute_file(path).map_err(|e| {
            log::error!("Script {} failed: {}", path.display(), e);
            EngineError::Script(e)
        })
    }

    /// Execute source with the adapter for `extension`; `None` or an empty
    /// extension selects the first adapter
    pub fn execute_script_string(&self, code: &str, extension: Option<&str>) -> Result<(), EngineError> {
        self.dispatcher.execute_string(code, extension).map_err(|e| {
            log::error!("Script string failed: {}", e);
            EngineError::Script(e)
        })
    }

    /// Adapter claiming `extension`
    pub fn script_adapter(&self, extension: &str) -> Option<Rc<dyn ScriptAdapter>> {
        self.dispatcher.adapter_for(extension)
    }

    /// Replace the scene with a map file
    pub fn load_map(&mut self, path: impl AsRef<Path>) -> Result<(), EngineError> {
        let map = MapData::load(path.as_ref())?;
        map.apply_to_scene(&mut self.scene.borrow_mut());
        Ok(())
    }

    /// Write the scene to a map file
    pub fn save_map(&self, path: impl AsRef<Path>) -> Result<(), EngineError> {
        MapData::from_scene(&self.scene.borrow()).save(path.as_ref())?;
        Ok(())
    }

    /// Read shader sources, compile them in the backend and register the
    /// handle with the scene
    pub fn load_shader_files(
        &mut self,
        name: &str,
        vertex_path: impl AsRef<Path>,
        fragment_path: impl AsRef<Path>,
    ) -> Result<(), EngineError> {
        let mut shader = Shader::new(name, vertex_path.as_ref(), fragment_path.as_ref());
        shader.load_from_file()?;
        self.renderer.load_shader(
            name,
            &shader.vertex_source,
            &shader.fragment_source,
            shader.geometry_source.as_deref(),
        )?;
        self.scene.borrow_mut().add_shader(shader);
        Ok(())
    }

    /// Request the loop to end after the current frame
    pub fn stop(&mut self) {
        log::info!("Engine shutdown requested");
        self.signals.request_stop();
        self.running = false;
    }

    /// Whether the frame loop is running
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Shut down adapters, then the renderer
    pub fn shutdown(&mut self) {
        self.running = false;
        self.dispatcher.shutdown();
        self.update_callbacks.clear();
        self.late_update_callbacks.clear();
        if self.initialized {
            self.renderer.shutdown();
            self.initialized = false;
        }
        log::info!("Engine shutdown complete");
    }

    /// Handles script adapters use to reach engine state
    pub fn context(&self) -> ScriptContext {
        ScriptContext::new(
            Rc::clone(&self.scene),
            Rc::clone(&self.clock),
            Rc::clone(&self.input),
            Rc::clone(&self.signals),
            Rc::downgrade(&self.dispatcher),
        )
    }

    /// Get the scene graph
    pub fn scene(&self) -> Ref<'_, SceneGraph> {
        self.scene.borrow()
    }

    /// Get mutable access to the scene graph
    pub fn scene_mut(&self) -> RefMut<'_, SceneGraph> {
        self.scene.borrow_mut()
    }

    /// Shared scene handle
    pub fn scene_handle(&self) -> Rc<RefCell<SceneGraph>> {
        Rc::clone(&self.scene)
    }

    /// Get the frame clock
    pub fn clock(&self) -> Ref<'_, Clock> {
        self.clock.borrow()
    }

    /// Get the input state
    pub fn input(&self) -> Ref<'_, InputState> {
        self.input.borrow()
    }

    /// Get mutable access to the input state
    pub fn input_mut(&self) -> RefMut<'_, InputState> {
        self.input.borrow_mut()
    }

    /// Get the render backend
    pub fn renderer(&self) -> &dyn RenderBackend {
        self.renderer.as_ref()
    }

    /// Get mutable access to the render backend
    pub fn renderer_mut(&mut self) -> &mut dyn RenderBackend {
        self.renderer.as_mut()
    }

    /// The render backend as its concrete type
    pub fn renderer_as<T: 'static>(&self) -> Option<&T> {
        self.renderer.as_any().downcast_ref::<T>()
    }

    /// Get the script dispatcher
    pub fn dispatcher(&self) -> &ScriptDispatcher {
        &self.dispatcher
    }

    /// Get the engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("objects", &self.scene.borrow().len())
            .field("dispatcher", &self.dispatcher)
            .field("running", &self.running)
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}

fn run_native_callbacks(list: &CallbackList<NativeCallback>, scene: &RefCell<SceneGraph>, delta_time: f32) {
    list.run("engine", |callback| {
        let mut callback = callback.borrow_mut();
        let mut scene = scene.borrow_mut();
        (&mut *callback)(&mut scene, delta_time)
    });
}

/// Engine-level errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Initialization error
    #[error("Engine initialization failed: {0}")]
    InitializationFailed(String),

    /// Rendering error
    #[error(transparent)]
    Renderer(#[from] RenderError),

    /// Script error
    #[error(transparent)]
    Script(#[from] ScriptError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Map file error
    #[error("Map error: {0}")]
    Map(#[from] MapError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneObject;
    use std::cell::Cell;

    fn engine(frames: u64) -> Engine {
        let config = EngineConfig::default()
            .with_fixed_timestep(0.5)
            .with_max_frames(frames)
            .with_init_script(None);
        let mut engine = Engine::headless(config);
        engine.initialize().unwrap();
        engine
    }

    #[test]
    fn test_run_stops_at_frame_limit() {
        let mut engine = engine(4);
        engine.run().unwrap();
        assert_eq!(engine.clock().frame_count(), 4);
        assert!(!engine.is_running());
    }

    #[test]
    fn test_native_callbacks_in_order() {
        let mut engine = engine(100);
        let log = Rc::new(RefCell::new(Vec::new()));

        let late = Rc::clone(&log);
        engine.on_late_update(move |_, _| {
            late.borrow_mut().push("late");
            Ok(())
        });
        let early = Rc::clone(&log);
        engine.on_update(move |_, dt| {
            assert!((dt - 0.5).abs() < f32::EPSILON);
            early.borrow_mut().push("update");
            Ok(())
        });

        engine.run_frames(2).unwrap();
        assert_eq!(*log.borrow(), vec!["update", "late", "update", "late"]);
    }

    #[test]
    fn test_failing_native_callback_is_isolated() {
        let mut engine = engine(100);
        let calls = Rc::new(Cell::new(0));
        engine.on_update(|_, _| Err("always fails".into()));
        let counter = Rc::clone(&calls);
        engine.on_update(move |_, _| {
            counter.set(counter.get() + 1);
            Ok(())
        });

        assert_eq!(engine.run_frames(5).unwrap(), 5);
        assert_eq!(calls.get(), 5);
    }

    #[test]
    fn test_stop_request_ends_loop_after_frame() {
        let mut engine = engine(100);
        let signals = Rc::clone(&engine.signals);
        engine.on_update(move |_, _| {
            signals.request_stop();
            Ok(())
        });
        assert_eq!(engine.run_frames(10).unwrap(), 1);
    }

    #[test]
    fn test_renderables_are_drawn() {
        let mut engine = engine(100);
        engine
            .scene_mut()
            .add(SceneObject::with_renderable("box", crate::scene::Renderable::cube()));
        engine.run_frames(3).unwrap();

        let renderer = engine.renderer_as::<HeadlessRenderer>().unwrap();
        assert_eq!(renderer.device().stats().draws, 3);
        assert_eq!(renderer.device().stats().buffers_created, 1);
    }

    #[test]
    fn test_failed_initialization() {
        let renderer = HeadlessRenderer::new(HeadlessDevice::failing());
        let mut engine = Engine::new(EngineConfig::default(), Box::new(renderer));
        assert!(matches!(engine.initialize(), Err(EngineError::InitializationFailed(_))));
        assert!(!engine.step_frame());
    }
}
