/// Errors that can occur while installing, running or removing the hook
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("keyboard hook is already installed")]
    AlreadyCapturing,

    #[error("failed to install low-level keyboard hook: {0}")]
    Registration(String),

    #[error("failed to remove low-level keyboard hook: {0}")]
    Unregistration(String),

    #[error("this thread already hosts an active keyboard hook")]
    ThreadOccupied,

    #[error("low-level keyboard hooks are not supported on this platform")]
    Unsupported,

    #[error("keyboard listener is already running")]
    AlreadyRunning,

    #[error("failed to spawn hook thread: {0}")]
    ThreadSpawn(String),

    #[error("message loop failed: {0}")]
    MessageLoop(String),

    #[error("hook thread exited before reporting its install result")]
    ListenerExited,
}
