//! Raw low-level keyboard payload as delivered by the OS
//!
//! Mirrors the fields of Win32 `KBDLLHOOKSTRUCT` and the four keyboard
//! window messages a `WH_KEYBOARD_LL` hook receives in `wParam`.

/// `KBDLLHOOKSTRUCT.flags` bits
pub mod flags {
    /// Extended key (right-hand Ctrl/Alt, arrows on the cursor block, ...)
    pub const EXTENDED: u32 = 0x01;
    /// Injected from a process running at lower integrity level
    pub const LOWER_IL_INJECTED: u32 = 0x02;
    /// Injected by `SendInput` or similar
    pub const INJECTED: u32 = 0x10;
    /// Alt is held
    pub const ALT_DOWN: u32 = 0x20;
    /// Transition is a key release
    pub const UP: u32 = 0x80;
}

pub const WM_KEYDOWN: u32 = 0x0100;
pub const WM_KEYUP: u32 = 0x0101;
pub const WM_SYSKEYDOWN: u32 = 0x0104;
pub const WM_SYSKEYUP: u32 = 0x0105;

/// One physical key transition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawKeyEvent {
    pub virtual_key: u32,
    pub scan_code: u32,
    pub flags: u32,
    /// Milliseconds, OS tick clock
    pub time: u32,
    pub extra_info: usize,
}

impl RawKeyEvent {
    pub fn is_extended(&self) -> bool {
        self.flags & flags::EXTENDED != 0
    }

    pub fn is_injected(&self) -> bool {
        self.flags & (flags::INJECTED | flags::LOWER_IL_INJECTED) != 0
    }
}

/// The event kind carried in the hook's `wParam`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMessage {
    KeyDown,
    SysKeyDown,
    KeyUp,
    SysKeyUp,
}

impl KeyMessage {
    /// Decode a window message id; anything else is not a keyboard transition
    pub fn from_message(message: u32) -> Option<Self> {
        match message {
            WM_KEYDOWN => Some(Self::KeyDown),
            WM_SYSKEYDOWN => Some(Self::SysKeyDown),
            WM_KEYUP => Some(Self::KeyUp),
            WM_SYSKEYUP => Some(Self::SysKeyUp),
            _ => None,
        }
    }

    /// System messages come from alt-chords and menu activation
    pub fn is_system(self) -> bool {
        matches!(self, Self::SysKeyDown | Self::SysKeyUp)
    }

    pub fn is_down(self) -> bool {
        matches!(self, Self::KeyDown | Self::SysKeyDown)
    }
}
