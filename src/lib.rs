//! keyhook: system-wide keyboard interception
//!
//! An [`Interceptor`](hook::Interceptor) installs a low-level keyboard hook
//! and republishes every transition on three channels (KeyDown, KeyUp,
//! KeyPress). It can drop held-key repeats and can swallow events so no
//! other consumer of the OS input pipeline sees them.
//!
//! ```no_run
//! use keyhook::hook::{Interceptor, MessageLoop};
//!
//! # fn main() -> Result<(), keyhook::hook::HookError> {
//! let message_loop = MessageLoop::for_current_thread();
//! let mut interceptor = Interceptor::new();
//! interceptor.set_disable_repeat(true);
//! interceptor.key_down().subscribe(|event| println!("{} down", event.key));
//! interceptor.start_capturing()?;
//! message_loop.run()?;
//! interceptor.stop_capturing()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod events;
pub mod hook;
pub mod lifecycle;
