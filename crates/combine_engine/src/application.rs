//! Application events
//!
//! Platform events a render backend queues between frames. The engine
//! drains them at the start of each frame, right after the input snapshot
//! swap, so they are visible to that same frame. Input events update
//! [`crate::input::InputState`]; window events resize or stop the engine.

use crate::input::{InputState, KeyCode, MouseButton};

/// Application events
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// Window was resized
    WindowResized {
        /// New window width
        width: u32,
        /// New window height
        height: u32,
    },

    /// Window close requested
    WindowCloseRequested,

    /// Key input event
    KeyInput {
        /// The key that was pressed/released
        key: KeyCode,
        /// Whether the key was pressed (true) or released (false)
        pressed: bool,
    },

    /// Mouse button event
    MouseButton {
        /// The mouse button that was pressed/released
        button: MouseButton,
        /// Whether the button was pressed (true) or released (false)
        pressed: bool,
    },

    /// Mouse movement
    MouseMoved {
        /// New X coordinate
        x: f64,
        /// New Y coordinate
        y: f64,
    },

    /// Mouse wheel
    MouseWheel {
        /// Horizontal scroll delta
        delta_x: f64,
        /// Vertical scroll delta
        delta_y: f64,
    },
}

impl AppEvent {
    /// Apply an input event; window events are handled by the engine
    pub fn apply_to(&self, input: &mut InputState) {
        match *self {
            Self::KeyInput { key, pressed } => input.set_key(key, pressed),
            Self::MouseButton { button, pressed } => input.set_mouse_button(button, pressed),
            Self::MouseMoved { x, y } => input.set_pointer_position(x as f32, y as f32),
            Self::MouseWheel { delta_x, delta_y } => input.add_scroll(delta_x as f32, delta_y as f32),
            Self::WindowResized { .. } | Self::WindowCloseRequested => {}
        }
    }
}
