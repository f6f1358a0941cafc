//! Events module for intercepted keyboard transitions
//!
//! [`KeyEvent`] is what subscribers receive from the interceptor;
//! [`InterceptEvent`] tags it with the stream it was published on so the
//! daemon can move it across a channel.

use serde::{Deserialize, Serialize};

use crate::hook::{Key, KeyMessage, RawKeyEvent};

/// Whether the key went down or came up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyDirection {
    Down,
    Up,
}

/// OS-agnostic keyboard event handed to subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    /// Translated key identity
    pub key: Key,

    /// Delivered as a system key (alt-chord or menu activation)
    pub system: bool,

    pub direction: KeyDirection,

    /// OS timestamp in milliseconds
    pub timestamp: u32,

    /// Untranslated virtual key code
    pub virtual_key: u32,

    /// Hardware scan code
    pub scan_code: u32,

    /// Extended-key bit was set
    pub extended: bool,

    /// Synthesized by software rather than a physical keyboard
    pub injected: bool,
}

impl KeyEvent {
    pub fn new(key: Key, message: KeyMessage, raw: &RawKeyEvent) -> Self {
        Self {
            key,
            system: message.is_system(),
            direction: if message.is_down() {
                KeyDirection::Down
            } else {
                KeyDirection::Up
            },
            timestamp: raw.time,
            virtual_key: raw.virtual_key,
            scan_code: raw.scan_code,
            extended: raw.is_extended(),
            injected: raw.is_injected(),
        }
    }
}

/// A key event together with the stream it was published on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InterceptEvent {
    KeyDown(KeyEvent),
    KeyUp(KeyEvent),
    /// Follows `KeyDown` for non-system key presses
    KeyPress(KeyEvent),
}

impl InterceptEvent {
    pub fn key_event(&self) -> &KeyEvent {
        match self {
            InterceptEvent::KeyDown(event)
            | InterceptEvent::KeyUp(event)
            | InterceptEvent::KeyPress(event) => event,
        }
    }
}

impl std::fmt::Display for InterceptEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            InterceptEvent::KeyDown(_) => "KEY_DOWN",
            InterceptEvent::KeyUp(_) => "KEY_UP",
            InterceptEvent::KeyPress(_) => "KEY_PRESS",
        };
        let event = self.key_event();
        if event.system {
            write!(f, "{} {} (system)", label, event.key)
        } else {
            write!(f, "{} {}", label, event.key)
        }
    }
}
