//! Input management system
//!
//! [`InputState`] keeps two snapshots of key and mouse-button state so edge
//! events can be derived, plus per-frame pointer and scroll deltas. The
//! engine calls [`InputState::update`] exactly once at the start of each
//! frame, before the events for that frame are applied.

use std::collections::HashSet;

use crate::foundation::math::Vec2;

macro_rules! key_codes {
    ($($variant:ident = $code:literal => $script:literal),* $(,)?) => {
        /// Keyboard key codes, carrying the platform's integer values
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(i32)]
        pub enum KeyCode {
            /// Any code the engine does not know
            Unknown = -1,
            $(
                #[allow(missing_docs)]
                $variant = $code,
            )*
        }

        impl KeyCode {
            /// Every known key, in code order
            pub const ALL: &'static [KeyCode] = &[$(KeyCode::$variant),*];

            /// Map a raw integer to a key; unknown values yield [`KeyCode::Unknown`]
            pub fn from_code(code: i64) -> Self {
                match code {
                    $($code => KeyCode::$variant,)*
                    _ => KeyCode::Unknown,
                }
            }

            /// Suffix of the `KEY_*` constant exposed to scripts
            pub fn script_name(self) -> &'static str {
                match self {
                    $(KeyCode::$variant => $script,)*
                    KeyCode::Unknown => "UNKNOWN",
                }
            }
        }
    };
}

key_codes! {
    Space = 32 => "SPACE",
    Num0 = 48 => "0",
    Num1 = 49 => "1",
    Num2 = 50 => "2",
    Num3 = 51 => "3",
    Num4 = 52 => "4",
    Num5 = 53 => "5",
    Num6 = 54 => "6",
    Num7 = 55 => "7",
    Num8 = 56 => "8",
    Num9 = 57 => "9",
    A = 65 => "A",
    B = 66 => "B",
    C = 67 => "C",
    D = 68 => "D",
    E = 69 => "E",
    F = 70 => "F",
    G = 71 => "G",
    H = 72 => "H",
    I = 73 => "I",
    J = 74 => "J",
    K = 75 => "K",
    L = 76 => "L",
    M = 77 => "M",
    N = 78 => "N",
    O = 79 => "O",
    P = 80 => "P",
    Q = 81 => "Q",
    R = 82 => "R",
    S = 83 => "S",
    T = 84 => "T",
    U = 85 => "U",
    V = 86 => "V",
    W = 87 => "W",
    X = 88 => "X",
    Y = 89 => "Y",
    Z = 90 => "Z",
    Escape = 256 => "ESCAPE",
    Enter = 257 => "ENTER",
    Tab = 258 => "TAB",
    Backspace = 259 => "BACKSPACE",
    Right = 262 => "RIGHT",
    Left = 263 => "LEFT",
    Down = 264 => "DOWN",
    Up = 265 => "UP",
    F1 = 290 => "F1",
    F2 = 291 => "F2",
    F3 = 292 => "F3",
    F4 = 293 => "F4",
    F5 = 294 => "F5",
    F6 = 295 => "F6",
    F7 = 296 => "F7",
    F8 = 297 => "F8",
    F9 = 298 => "F9",
    F10 = 299 => "F10",
    F11 = 300 => "F11",
    F12 = 301 => "F12",
    LeftShift = 340 => "LSHIFT",
    LeftControl = 341 => "LCTRL",
    LeftAlt = 342 => "LALT",
    LeftSuper = 343 => "LSUPER",
    RightShift = 344 => "RSHIFT",
    RightControl = 345 => "RCTRL",
    RightAlt = 346 => "RALT",
    RightSuper = 347 => "RSUPER",
}

impl KeyCode {
    /// Integer value of this key
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Mouse buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    /// Left mouse button
    Left,
    /// Right mouse button
    Right,
    /// Middle mouse button
    Middle,
    /// Extra buttons 4 through 8
    Other(u8),
}

impl MouseButton {
    /// Highest button index the engine tracks
    pub const MAX_INDEX: u8 = 7;

    /// Button from its index (0 = left, 1 = right, 2 = middle)
    pub fn from_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(Self::Left),
            1 => Some(Self::Right),
            2 => Some(Self::Middle),
            3..=7 => u8::try_from(index).ok().map(Self::Other),
            _ => None,
        }
    }

    /// Index of this button
    pub fn index(self) -> u8 {
        match self {
            Self::Left => 0,
            Self::Right => 1,
            Self::Middle => 2,
            Self::Other(index) => index,
        }
    }
}

/// Boolean key/button state for one frame
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Snapshot {
    keys: HashSet<KeyCode>,
    buttons: HashSet<MouseButton>,
}

/// Double-buffered input state with edge detection
#[derive(Debug, Clone, Default)]
pub struct InputState {
    current: Snapshot,
    previous: Snapshot,
    pointer_position: Vec2,
    pointer_delta: Vec2,
    scroll_delta: Vec2,
    has_pointer: bool,
}

impl InputState {
    /// Create an input state with nothing held
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new frame: the current snapshot becomes the previous one and
    /// the frame-local pointer and scroll deltas reset to zero
    pub fn update(&mut self) {
        self.previous.clone_from(&self.current);
        self.pointer_delta = Vec2::zeros();
        self.scroll_delta = Vec2::zeros();
    }

    /// Apply a key event
    pub fn set_key(&mut self, key: KeyCode, down: bool) {
        if key == KeyCode::Unknown {
            return;
        }
        if down {
            self.current.keys.insert(key);
        } else {
            self.current.keys.remove(&key);
        }
    }

    /// Apply a mouse button event
    pub fn set_mouse_button(&mut self, button: MouseButton, down: bool) {
        if down {
            self.current.buttons.insert(button);
        } else {
            self.current.buttons.remove(&button);
        }
    }

    /// Apply a pointer move; the delta accumulates from the last known position
    pub fn set_pointer_position(&mut self, x: f32, y: f32) {
        let position = Vec2::new(x, y);
        if self.has_pointer {
            self.pointer_delta += position - self.pointer_position;
        }
        self.pointer_position = position;
        self.has_pointer = true;
    }

    /// Apply a scroll event
    pub fn add_scroll(&mut self, x: f32, y: f32) {
        self.scroll_delta += Vec2::new(x, y);
    }

    /// Whether the key is held this frame
    pub fn is_key_down(&self, key: KeyCode) -> bool {
        self.current.keys.contains(&key)
    }

    /// Whether the key went down this frame
    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.current.keys.contains(&key) && !self.previous.keys.contains(&key)
    }

    /// Whether the key went up this frame
    pub fn is_key_released(&self, key: KeyCode) -> bool {
        !self.current.keys.contains(&key) && self.previous.keys.contains(&key)
    }

    /// Whether the button is held this frame
    pub fn is_mouse_button_down(&self, button: MouseButton) -> bool {
        self.current.buttons.contains(&button)
    }

    /// Whether the button went down this frame
    pub fn is_mouse_button_pressed(&self, button: MouseButton) -> bool {
        self.current.buttons.contains(&button) && !self.previous.buttons.contains(&button)
    }

    /// Whether the button went up this frame
    pub fn is_mouse_button_released(&self, button: MouseButton) -> bool {
        !self.current.buttons.contains(&button) && self.previous.buttons.contains(&button)
    }

    /// Pointer position in window coordinates
    pub fn pointer_position(&self) -> Vec2 {
        self.pointer_position
    }

    /// Pointer movement during the current frame
    pub fn pointer_delta(&self) -> Vec2 {
        self.pointer_delta
    }

    /// Scroll movement during the current frame
    pub fn scroll_delta(&self) -> Vec2 {
        self.scroll_delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_codes_match_platform_values() {
        assert_eq!(KeyCode::Space.code(), 32);
        assert_eq!(KeyCode::A.code(), 65);
        assert_eq!(KeyCode::Escape.code(), 256);
        assert_eq!(KeyCode::F12.code(), 301);
        assert_eq!(KeyCode::from_code(90), KeyCode::Z);
        assert_eq!(KeyCode::from_code(9999), KeyCode::Unknown);
        assert_eq!(KeyCode::LeftShift.script_name(), "LSHIFT");
    }

    #[test]
    fn test_pressed_only_on_transition() {
        let mut input = InputState::new();
        input.update();
        input.set_key(KeyCode::W, true);
        assert!(input.is_key_pressed(KeyCode::W));
        assert!(input.is_key_pressed(KeyCode::W));

        input.update();
        assert!(input.is_key_down(KeyCode::W));
        assert!(!input.is_key_pressed(KeyCode::W));

        input.set_key(KeyCode::W, false);
        assert!(input.is_key_released(KeyCode::W));
        input.update();
        assert!(!input.is_key_released(KeyCode::W));
    }

    #[test]
    fn test_unknown_key_never_down() {
        let mut input = InputState::new();
        input.set_key(KeyCode::Unknown, true);
        assert!(!input.is_key_down(KeyCode::Unknown));
    }

    #[test]
    fn test_pointer_delta_is_frame_local() {
        let mut input = InputState::new();
        input.set_pointer_position(10.0, 10.0);
        assert_eq!(input.pointer_delta(), Vec2::zeros());

        input.set_pointer_position(15.0, 7.0);
        input.add_scroll(0.0, 1.0);
        assert_eq!(input.pointer_delta(), Vec2::new(5.0, -3.0));
        assert_eq!(input.scroll_delta(), Vec2::new(0.0, 1.0));

        input.update();
        assert_eq!(input.pointer_delta(), Vec2::zeros());
        assert_eq!(input.scroll_delta(), Vec2::zeros());
        assert_eq!(input.pointer_position(), Vec2::new(15.0, 7.0));
    }

    #[test]
    fn test_mouse_buttons() {
        let mut input = InputState::new();
        assert_eq!(MouseButton::from_index(2), Some(MouseButton::Middle));
        assert_eq!(MouseButton::from_index(8), None);

        input.set_mouse_button(MouseButton::Left, true);
        assert!(input.is_mouse_button_pressed(MouseButton::Left));
        input.update();
        input.set_mouse_button(MouseButton::Left, false);
        assert!(input.is_mouse_button_released(MouseButton::Left));
    }
}
