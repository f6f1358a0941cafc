//! Virtual-key translation
//!
//! Maps Win32 virtual-key codes onto the platform-neutral [`Key`] values
//! handed to subscribers. Codes without a mapping become [`Key::None`].
//! The generic `VK_SHIFT`, `VK_CONTROL` and `VK_MENU` codes fold onto the
//! left-hand variants, so `Key` has no side-less modifier.

use serde::{Deserialize, Serialize};

macro_rules! virtual_keys {
    ($($code:literal => $name:ident),* $(,)?) => {
        /// Abstract key identity, independent of the OS key code space
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum Key {
            /// The virtual key code has no known mapping
            #[default]
            None,
            $($name,)*
        }

        impl Key {
            /// Translate a virtual-key code. Never fails.
            pub fn from_virtual_key(vk: u32) -> Self {
                match vk {
                    0x10 => Key::LeftShift,
                    0x11 => Key::LeftCtrl,
                    0x12 => Key::LeftAlt,
                    $($code => Key::$name,)*
                    _ => Key::None,
                }
            }

            /// Canonical virtual-key code; modifiers give their left-hand code
            pub fn virtual_key(self) -> Option<u32> {
                match self {
                    Key::None => None,
                    $(Key::$name => Some($code),)*
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    Key::None => "None",
                    $(Key::$name => stringify!($name),)*
                }
            }
        }
    };
}

virtual_keys! {
    0x03 => Cancel,
    0x08 => Back,
    0x09 => Tab,
    0x0C => Clear,
    0x0D => Return,
    0x13 => Pause,
    0x14 => Capital,
    0x15 => KanaMode,
    0x17 => JunjaMode,
    0x18 => FinalMode,
    0x19 => HanjaMode,
    0x1B => Escape,
    0x1C => ImeConvert,
    0x1D => ImeNonConvert,
    0x1E => ImeAccept,
    0x1F => ImeModeChange,
    0x20 => Space,
    0x21 => PageUp,
    0x22 => PageDown,
    0x23 => End,
    0x24 => Home,
    0x25 => Left,
    0x26 => Up,
    0x27 => Right,
    0x28 => Down,
    0x29 => Select,
    0x2A => Print,
    0x2B => Execute,
    0x2C => Snapshot,
    0x2D => Insert,
    0x2E => Delete,
    0x2F => Help,
    0x30 => D0,
    0x31 => D1,
    0x32 => D2,
    0x33 => D3,
    0x34 => D4,
    0x35 => D5,
    0x36 => D6,
    0x37 => D7,
    0x38 => D8,
    0x39 => D9,
    0x41 => A,
    0x42 => B,
    0x43 => C,
    0x44 => D,
    0x45 => E,
    0x46 => F,
    0x47 => G,
    0x48 => H,
    0x49 => I,
    0x4A => J,
    0x4B => K,
    0x4C => L,
    0x4D => M,
    0x4E => N,
    0x4F => O,
    0x50 => P,
    0x51 => Q,
    0x52 => R,
    0x53 => S,
    0x54 => T,
    0x55 => U,
    0x56 => V,
    0x57 => W,
    0x58 => X,
    0x59 => Y,
    0x5A => Z,
    0x5B => LWin,
    0x5C => RWin,
    0x5D => Apps,
    0x5F => Sleep,
    0x60 => NumPad0,
    0x61 => NumPad1,
    0x62 => NumPad2,
    0x63 => NumPad3,
    0x64 => NumPad4,
    0x65 => NumPad5,
    0x66 => NumPad6,
    0x67 => NumPad7,
    0x68 => NumPad8,
    0x69 => NumPad9,
    0x6A => Multiply,
    0x6B => Add,
    0x6C => Separator,
    0x6D => Subtract,
    0x6E => Decimal,
    0x6F => Divide,
    0x70 => F1,
    0x71 => F2,
    0x72 => F3,
    0x73 => F4,
    0x74 => F5,
    0x75 => F6,
    0x76 => F7,
    0x77 => F8,
    0x78 => F9,
    0x79 => F10,
    0x7A => F11,
    0x7B => F12,
    0x7C => F13,
    0x7D => F14,
    0x7E => F15,
    0x7F => F16,
    0x80 => F17,
    0x81 => F18,
    0x82 => F19,
    0x83 => F20,
    0x84 => F21,
    0x85 => F22,
    0x86 => F23,
    0x87 => F24,
    0x90 => NumLock,
    0x91 => Scroll,
    0xA0 => LeftShift,
    0xA1 => RightShift,
    0xA2 => LeftCtrl,
    0xA3 => RightCtrl,
    0xA4 => LeftAlt,
    0xA5 => RightAlt,
    0xA6 => BrowserBack,
    0xA7 => BrowserForward,
    0xA8 => BrowserRefresh,
    0xA9 => BrowserStop,
    0xAA => BrowserSearch,
    0xAB => BrowserFavorites,
    0xAC => BrowserHome,
    0xAD => VolumeMute,
    0xAE => VolumeDown,
    0xAF => VolumeUp,
    0xB0 => MediaNextTrack,
    0xB1 => MediaPreviousTrack,
    0xB2 => MediaStop,
    0xB3 => MediaPlayPause,
    0xB4 => LaunchMail,
    0xB5 => SelectMedia,
    0xB6 => LaunchApplication1,
    0xB7 => LaunchApplication2,
    // OEM keys vary by layout; names follow the US layout
    0xBA => OemSemicolon,
    0xBB => OemPlus,
    0xBC => OemComma,
    0xBD => OemMinus,
    0xBE => OemPeriod,
    0xBF => OemQuestion,
    0xC0 => OemTilde,
    0xDB => OemOpenBrackets,
    0xDC => OemPipe,
    0xDD => OemCloseBrackets,
    0xDE => OemQuotes,
    0xDF => Oem8,
    0xE2 => OemBackslash,
    0xE5 => ImeProcessed,
    0xF0 => DbeAlphanumeric,
    0xF1 => DbeKatakana,
    0xF2 => DbeHiragana,
    0xF3 => DbeSbcsChar,
    0xF4 => DbeDbcsChar,
    0xF5 => DbeRoman,
    0xF6 => Attn,
    0xF7 => CrSel,
    0xF8 => ExSel,
    0xF9 => EraseEof,
    0xFA => Play,
    0xFB => Zoom,
    0xFC => NoName,
    0xFD => Pa1,
    0xFE => OemClear,
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
