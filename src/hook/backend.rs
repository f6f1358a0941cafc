//! OS boundary for hook registration
//!
//! The interceptor only knows this trait. The platform implementation pins
//! the [`HookContext`] for as long as the hook is registered and routes the
//! OS callback into [`HookContext::on_hook`].

use std::sync::Arc;

use super::error::HookError;
use super::interceptor::HookContext;

pub trait HookBackend {
    /// Token for one registered hook
    type Handle;

    /// Register a system-wide keyboard hook that delivers to `context`
    fn install(&mut self, context: Arc<HookContext>) -> Result<Self::Handle, HookError>;

    /// Unregister. The context must stay reachable until this returns `Ok`.
    fn uninstall(&mut self, handle: &Self::Handle) -> Result<(), HookError>;
}

#[cfg(not(windows))]
pub use unsupported::{MessageLoop, QuitHandle, UnsupportedBackend as PlatformBackend};

#[cfg(windows)]
pub use super::win32::{MessageLoop, QuitHandle, WindowsHookBackend as PlatformBackend};

#[cfg(not(windows))]
mod unsupported {
    use std::sync::mpsc;
    use std::sync::Arc;

    use super::{HookBackend, HookError};
    use crate::hook::interceptor::HookContext;

    /// Stand-in backend for targets without low-level keyboard hooks
    #[derive(Debug, Default)]
    pub struct UnsupportedBackend;

    impl HookBackend for UnsupportedBackend {
        type Handle = ();

        fn install(&mut self, _context: Arc<HookContext>) -> Result<(), HookError> {
            Err(HookError::Unsupported)
        }

        fn uninstall(&mut self, _handle: &()) -> Result<(), HookError> {
            Ok(())
        }
    }

    /// Blocks the calling thread until quit is requested
    pub struct MessageLoop {
        quit_tx: mpsc::Sender<()>,
        quit_rx: mpsc::Receiver<()>,
    }

    impl MessageLoop {
        pub fn for_current_thread() -> Self {
            let (quit_tx, quit_rx) = mpsc::channel();
            Self { quit_tx, quit_rx }
        }

        pub fn quit_handle(&self) -> QuitHandle {
            QuitHandle {
                quit_tx: self.quit_tx.clone(),
            }
        }

        pub fn run(&self) -> Result<(), HookError> {
            self.quit_rx
                .recv()
                .map_err(|e| HookError::MessageLoop(e.to_string()))
        }
    }

    #[derive(Debug, Clone)]
    pub struct QuitHandle {
        quit_tx: mpsc::Sender<()>,
    }

    impl QuitHandle {
        pub fn quit(&self) -> Result<(), HookError> {
            self.quit_tx
                .send(())
                .map_err(|e| HookError::MessageLoop(e.to_string()))
        }
    }

}
