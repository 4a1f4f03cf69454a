//! Domain-level input event types.
//!
//! These are the semantic values the viewer's input-capture backend produces
//! and the host's injection backend consumes. `riftcast-wire` defines the
//! fixed-layout binary encoding ("Input packet") used to carry them over
//! the wire; this module is the in-process representation on both sides of
//! that encoding.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    pub const fn tag(self) -> u8 {
        match self {
            MouseButton::Left => 0,
            MouseButton::Right => 1,
            MouseButton::Middle => 2,
        }
    }

    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(MouseButton::Left),
            1 => Some(MouseButton::Right),
            2 => Some(MouseButton::Middle),
            _ => None,
        }
    }
}

/// A user input event captured on the viewer and forwarded to the host.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputEvent {
    /// Mouse moved to normalised coordinates in `[0.0, 1.0]`.
    MouseMove { x: f32, y: f32 },

    /// A mouse button changed state.
    MouseButton { button: MouseButton, pressed: bool },

    /// A key changed state. `keycode` is a platform-neutral (X11 keyval
    /// style) code.
    Key { keycode: u16, pressed: bool },

    /// Scroll delta, in wheel notches.
    Scroll { delta_x: i16, delta_y: i16 },
}
