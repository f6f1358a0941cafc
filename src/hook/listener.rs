//! Keyboard listener thread
//!
//! Hosts an [`Interceptor`] on a dedicated thread that pumps OS messages,
//! and forwards its three streams into a tokio channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{error, info, trace, warn};

use crate::config::Config;
use crate::events::{InterceptEvent, KeyEvent};

use super::backend::{HookBackend, MessageLoop, QuitHandle};
use super::error::HookError;
use super::interceptor::Interceptor;
use super::subscribers::EventChannel;

/// Runs the keyboard hook on its own thread
pub struct KeyboardListener {
    config: Config,
    event_tx: mpsc::Sender<InterceptEvent>,
    running: Arc<AtomicBool>,
    quit: Mutex<Option<QuitHandle>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl KeyboardListener {
    /// Create a new keyboard listener
    pub fn new(config: Config, event_tx: mpsc::Sender<InterceptEvent>) -> Self {
        Self {
            config,
            event_tx,
            running: Arc::new(AtomicBool::new(false)),
            quit: Mutex::new(None),
            thread: Mutex::new(None),
        }
    }

    /// Start the listener.
    ///
    /// Spawns the hook thread and waits until it reports whether the hook
    /// was installed, so registration failures surface here.
    pub fn start(&self) -> Result<(), HookError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(HookError::AlreadyRunning);
        }

        let config = self.config.clone();
        let event_tx = self.event_tx.clone();
        let running = Arc::clone(&self.running);
        let (ready_tx, ready_rx) = std_mpsc::channel();

        let spawned = thread::Builder::new()
            .name("keyboard-hook".to_string())
            .spawn(move || {
                info!("keyboard hook thread started");
                run_hook_thread(config, event_tx, ready_tx);
                running.store(false, Ordering::SeqCst);
                info!("keyboard hook thread stopped");
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(HookError::ThreadSpawn(e.to_string()));
            }
        };

        match ready_rx.recv() {
            Ok(Ok(quit)) => {
                *self.quit.lock() = Some(quit);
                *self.thread.lock() = Some(handle);
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                self.running.store(false, Ordering::SeqCst);
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                self.running.store(false, Ordering::SeqCst);
                Err(HookError::ListenerExited)
            }
        }
    }

    /// Stop the listener and wait for the hook thread to exit
    pub fn stop(&self) {
        if let Some(quit) = self.quit.lock().take() {
            if let Err(e) = quit.quit() {
                warn!(?e, "failed to signal hook thread");
            }
        }

        if let Some(handle) = self.thread.lock().take() {
            if handle.join().is_err() {
                error!("keyboard hook thread panicked");
            }
        }

        self.running.store(false, Ordering::SeqCst);
    }

    /// Check if the listener is currently running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for KeyboardListener {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Body of the hook thread: install, pump, uninstall
fn run_hook_thread(
    config: Config,
    event_tx: mpsc::Sender<InterceptEvent>,
    ready_tx: std_mpsc::Sender<Result<QuitHandle, HookError>>,
) {
    let message_loop = MessageLoop::for_current_thread();
    let mut interceptor = Interceptor::new();
    interceptor.options().apply(&config);
    forward_events(&interceptor, &event_tx);

    if let Err(e) = interceptor.start_capturing() {
        let _ = ready_tx.send(Err(e));
        return;
    }

    if ready_tx.send(Ok(message_loop.quit_handle())).is_err() {
        warn!("listener gave up waiting for hook thread");
        return;
    }

    if let Err(e) = message_loop.run() {
        error!(?e, "message loop failed");
    }

    if let Err(e) = interceptor.stop_capturing() {
        error!(?e, "failed to remove keyboard hook on exit");
    }
}

/// Subscribe forwarders that push every stream into `event_tx`.
///
/// Uses `try_send`: the hook thread must never wait on the consumer.
pub fn forward_events<B: HookBackend>(
    interceptor: &Interceptor<B>,
    event_tx: &mpsc::Sender<InterceptEvent>,
) {
    forward_channel(interceptor.key_down(), event_tx.clone(), InterceptEvent::KeyDown);
    forward_channel(interceptor.key_up(), event_tx.clone(), InterceptEvent::KeyUp);
    forward_channel(interceptor.key_press(), event_tx.clone(), InterceptEvent::KeyPress);
}

fn forward_channel(
    channel: &EventChannel,
    event_tx: mpsc::Sender<InterceptEvent>,
    wrap: fn(KeyEvent) -> InterceptEvent,
) {
    let name = channel.name();
    channel.subscribe(move |event| match event_tx.try_send(wrap(*event)) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            warn!(channel = name, key = %event.key, "event channel full, dropping key event");
        }
        Err(TrySendError::Closed(_)) => {
            trace!(channel = name, "event receiver closed");
        }
    });
}
