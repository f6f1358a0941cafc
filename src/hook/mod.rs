//! Hook module for system-wide keyboard interception
//!
//! Installs a Win32 low-level keyboard hook, filters held-key repeats,
//! translates virtual keys and republishes transitions on the KeyDown,
//! KeyUp and KeyPress channels.

mod backend;
mod error;
mod interceptor;
mod keys;
mod listener;
pub mod raw;
mod repeat;
mod subscribers;
#[cfg(windows)]
mod win32;

pub use backend::{HookBackend, MessageLoop, PlatformBackend, QuitHandle};
pub use error::HookError;
pub use interceptor::{CaptureState, HookContext, Interceptor, InterceptorOptions, Propagation};
pub use keys::Key;
pub use listener::{forward_events, KeyboardListener};
pub use raw::{KeyMessage, RawKeyEvent};
pub use repeat::RepeatState;
pub use subscribers::{EventChannel, SubscriptionId};
