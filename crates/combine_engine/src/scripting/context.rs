//! Engine state shared with script adapters
//!
//! Scripts run on the engine thread while the frame loop is paused in the
//! script phase, so the shared state is reference counted and borrowed only
//! for the duration of one binding call.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::path::PathBuf;
use std::rc::{Rc, Weak};

use super::ScriptDispatcher;
use crate::foundation::time::Clock;
use crate::input::InputState;
use crate::scene::SceneGraph;

/// Renderer work requested by a script, applied by the engine after the
/// script phase of the frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderRequest {
    /// Toggle wireframe drawing
    SetWireframe(bool),
    /// Toggle vertical sync
    SetVSync(bool),
    /// Read shader sources from disk and register them under `name`
    LoadShader {
        name: String,
        vertex_path: PathBuf,
        fragment_path: PathBuf,
    },
    /// Make a registered program active
    UseShader(String),
}

/// Requests flowing from scripts back to the engine
#[derive(Debug, Default)]
pub struct EngineSignals {
    stop: Cell<bool>,
    requests: RefCell<Vec<RenderRequest>>,
}

impl EngineSignals {
    /// No stop request and an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the frame loop to end after the current frame
    pub fn request_stop(&self) {
        self.stop.set(true);
    }

    /// Whether a stop is pending
    pub fn stop_requested(&self) -> bool {
        self.stop.get()
    }

    /// Clear a pending stop request
    pub fn reset_stop(&self) {
        self.stop.set(false);
    }

    /// Queue a renderer request
    pub fn push(&self, request: RenderRequest) {
        self.requests.borrow_mut().push(request);
    }

    /// Take every queued request, oldest first
    pub fn drain(&self) -> Vec<RenderRequest> {
        std::mem::take(&mut *self.requests.borrow_mut())
    }
}

/// Handles to the engine state a binding call may touch
#[derive(Clone)]
pub struct ScriptContext {
    scene: Rc<RefCell<SceneGraph>>,
    clock: Rc<RefCell<Clock>>,
    input: Rc<RefCell<InputState>>,
    signals: Rc<EngineSignals>,
    dispatcher: Weak<ScriptDispatcher>,
}

impl ScriptContext {
    /// Context over the engine's shared state
    pub fn new(
        scene: Rc<RefCell<SceneGraph>>,
        clock: Rc<RefCell<Clock>>,
        input: Rc<RefCell<InputState>>,
        signals: Rc<EngineSignals>,
        dispatcher: Weak<ScriptDispatcher>,
    ) -> Self {
        Self {
            scene,
            clock,
            input,
            signals,
            dispatcher,
        }
    }

    /// A context over fresh state with no dispatcher; used by adapter tests
    pub fn standalone() -> Self {
        Self::new(
            Rc::new(RefCell::new(SceneGraph::new())),
            Rc::new(RefCell::new(Clock::new())),
            Rc::new(RefCell::new(InputState::new())),
            Rc::new(EngineSignals::new()),
            Weak::new(),
        )
    }

    /// The scene, borrowed
    pub fn scene(&self) -> Ref<'_, SceneGraph> {
        self.scene.borrow()
    }

    /// The scene, mutably borrowed
    pub fn scene_mut(&self) -> RefMut<'_, SceneGraph> {
        self.scene.borrow_mut()
    }

    /// The clock, borrowed
    pub fn clock(&self) -> Ref<'_, Clock> {
        self.clock.borrow()
    }

    /// The clock, mutably borrowed
    pub fn clock_mut(&self) -> RefMut<'_, Clock> {
        self.clock.borrow_mut()
    }

    /// Input state, borrowed
    pub fn input(&self) -> Ref<'_, InputState> {
        self.input.borrow()
    }

    /// Input state, mutably borrowed
    pub fn input_mut(&self) -> RefMut<'_, InputState> {
        self.input.borrow_mut()
    }

    /// Requests back to the engine
    pub fn signals(&self) -> &EngineSignals {
        &self.signals
    }

    /// The dispatcher, while the engine that owns it is alive
    pub fn dispatcher(&self) -> Option<Rc<ScriptDispatcher>> {
        self.dispatcher.upgrade()
    }
}

impl std::fmt::Debug for ScriptContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptContext")
            .field("objects", &self.scene.borrow().len())
            .field("dispatcher", &(self.dispatcher.strong_count() > 0))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requests_drain_in_order() {
        let signals = EngineSignals::new();
        signals.push(RenderRequest::SetWireframe(true));
        signals.push(RenderRequest::UseShader("toon".to_string()));
        assert_eq!(
            signals.drain(),
            vec![
                RenderRequest::SetWireframe(true),
                RenderRequest::UseShader("toon".to_string())
            ]
        );
        assert!(signals.drain().is_empty());
    }

    #[test]
    fn test_stop_flag() {
        let signals = EngineSignals::new();
        assert!(!signals.stop_requested());
        signals.request_stop();
        assert!(signals.stop_requested());
        signals.reset_stop();
        assert!(!signals.stop_requested());
    }

    #[test]
    fn test_standalone_has_no_dispatcher() {
        assert!(ScriptContext::standalone().dispatcher().is_none());
    }
}
