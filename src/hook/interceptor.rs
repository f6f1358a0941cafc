//! Keyboard interceptor
//!
//! Owns the hook registration and the state the OS callback works on:
//! repeat baseline, option flags and the KeyDown/KeyUp/KeyPress channels.
//! The callback never blocks on its own, but every subscriber runs inside
//! it. Windows silently drops or removes a low-level hook whose callback
//! overruns `LowLevelHooksTimeout` (a few hundred ms), so slow callbacks
//! are logged.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, error, info, trace, warn};

use crate::config::Config;
use crate::events::KeyEvent;

use super::backend::{HookBackend, PlatformBackend};
use super::error::HookError;
use super::keys::Key;
use super::raw::{KeyMessage, RawKeyEvent};
use super::repeat::RepeatState;
use super::subscribers::EventChannel;

/// Capture state of an interceptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureState {
    /// No hook installed
    #[default]
    Idle,
    /// Hook installed, events are delivered
    Capturing,
}

impl std::fmt::Display for CaptureState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureState::Idle => write!(f, "Idle"),
            CaptureState::Capturing => write!(f, "Capturing"),
        }
    }
}

/// What the hook returns to the OS for one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    /// Hand the event to the next hook in the chain
    Forward,
    /// Mark the event handled so nothing else sees it
    Swallow,
}

/// Flags read on every callback; safe to change from any thread
#[derive(Debug)]
pub struct InterceptorOptions {
    disable_repeat: AtomicBool,
    suppress_windows_handling: AtomicBool,
    reset_repeat_on_start: AtomicBool,
    slow_callback_ms: AtomicU64,
}

impl Default for InterceptorOptions {
    fn default() -> Self {
        Self {
            disable_repeat: AtomicBool::new(false),
            suppress_windows_handling: AtomicBool::new(false),
            reset_repeat_on_start: AtomicBool::new(true),
            slow_callback_ms: AtomicU64::new(10),
        }
    }
}

impl InterceptorOptions {
    pub fn disable_repeat(&self) -> bool {
        self.disable_repeat.load(Ordering::Acquire)
    }

    pub fn set_disable_repeat(&self, value: bool) {
        self.disable_repeat.store(value, Ordering::Release);
    }

    pub fn suppress_windows_handling(&self) -> bool {
        self.suppress_windows_handling.load(Ordering::Acquire)
    }

    pub fn set_suppress_windows_handling(&self, value: bool) {
        self.suppress_windows_handling.store(value, Ordering::Release);
    }

    /// Whether `start_capturing` begins with an empty repeat baseline
    pub fn reset_repeat_on_start(&self) -> bool {
        self.reset_repeat_on_start.load(Ordering::Acquire)
    }

    pub fn set_reset_repeat_on_start(&self, value: bool) {
        self.reset_repeat_on_start.store(value, Ordering::Release);
    }

    /// Callback duration above which a warning is logged; zero disables it
    pub fn slow_callback(&self) -> Duration {
        Duration::from_millis(self.slow_callback_ms.load(Ordering::Relaxed))
    }

    pub fn set_slow_callback(&self, threshold: Duration) {
        let ms = u64::try_from(threshold.as_millis()).unwrap_or(u64::MAX);
        self.slow_callback_ms.store(ms, Ordering::Relaxed);
    }

    pub fn apply(&self, config: &Config) {
        self.set_disable_repeat(config.disable_repeat);
        self.set_suppress_windows_handling(config.suppress_windows_handling);
        self.set_reset_repeat_on_start(config.reset_repeat_on_start);
        self.set_slow_callback(Duration::from_millis(config.slow_callback_ms));
    }

    fn propagation(&self) -> Propagation {
        if self.suppress_windows_handling() {
            Propagation::Swallow
        } else {
            Propagation::Forward
        }
    }
}

/// Everything the OS callback touches. Pinned by the backend while capturing.
#[derive(Debug)]
pub struct HookContext {
    options: Arc<InterceptorOptions>,
    repeat: Mutex<RepeatState>,
    key_down: EventChannel,
    key_up: EventChannel,
    key_press: EventChannel,
}

impl Default for HookContext {
    fn default() -> Self {
        Self {
            options: Arc::new(InterceptorOptions::default()),
            repeat: Mutex::new(RepeatState::new()),
            key_down: EventChannel::new("key_down"),
            key_up: EventChannel::new("key_up"),
            key_press: EventChannel::new("key_press"),
        }
    }
}

impl HookContext {
    /// Entry point for the OS callback.
    ///
    /// `decode` reads the raw payload and is only called for non-negative
    /// hook codes; negative codes must reach the hook chain untouched.
    pub fn on_hook<F>(&self, code: i32, message: u32, decode: F) -> Propagation
    where
        F: FnOnce() -> RawKeyEvent,
    {
        if code >= 0 {
            let started = Instant::now();
            let raw = decode();
            self.process(message, &raw);

            let elapsed = started.elapsed();
            let threshold = self.options.slow_callback();
            if !threshold.is_zero() && elapsed > threshold {
                warn!(
                    ?elapsed,
                    vk = raw.virtual_key,
                    "keyboard hook callback is slow; the OS may drop the hook"
                );
            }
        }

        self.options.propagation()
    }

    fn process(&self, message: u32, raw: &RawKeyEvent) {
        let key = Key::from_virtual_key(raw.virtual_key);

        let is_repeat = self.repeat.lock().observe(raw);
        if is_repeat && self.options.disable_repeat() {
            trace!(%key, scan_code = raw.scan_code, "repeat suppressed");
            return;
        }

        let Some(kind) = KeyMessage::from_message(message) else {
            trace!(msg = message, "not a keyboard transition");
            return;
        };

        let event = KeyEvent::new(key, kind, raw);
        trace!(?kind, %key, is_repeat, "dispatching key event");

        let faults = match kind {
            KeyMessage::SysKeyDown => self.key_down.dispatch(&event),
            KeyMessage::KeyDown => self.key_down.dispatch(&event) + self.key_press.dispatch(&event),
            KeyMessage::KeyUp | KeyMessage::SysKeyUp => self.key_up.dispatch(&event),
        };

        if faults > 0 {
            error!(faults, %key, "subscribers failed while handling key event");
        }
    }

    fn reset_repeat(&self) {
        self.repeat.lock().reset();
    }
}

/// System-wide keyboard interceptor.
///
/// Must be started on a thread that pumps messages; the OS delivers every
/// callback on that thread.
pub struct Interceptor<B: HookBackend = PlatformBackend> {
    context: Arc<HookContext>,
    backend: B,
    handle: Option<B::Handle>,
}

impl Interceptor<PlatformBackend> {
    pub fn new() -> Self {
        Self::with_backend(PlatformBackend::default())
    }
}

impl Default for Interceptor<PlatformBackend> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: HookBackend> Interceptor<B> {
    pub fn with_backend(backend: B) -> Self {
        Self {
            context: Arc::new(HookContext::default()),
            backend,
            handle: None,
        }
    }

    /// Install the hook.
    ///
    /// Fails with [`HookError::AlreadyCapturing`] rather than replacing a
    /// live registration.
    pub fn start_capturing(&mut self) -> Result<(), HookError> {
        if self.handle.is_some() {
            warn!("start_capturing called while already capturing");
            return Err(HookError::AlreadyCapturing);
        }

        if self.context.options.reset_repeat_on_start() {
            self.context.reset_repeat();
        }

        let handle = self
            .backend
            .install(Arc::clone(&self.context))
            .map_err(|e| {
                error!(?e, "failed to install keyboard hook");
                e
            })?;
        self.handle = Some(handle);

        info!(
            disable_repeat = self.disable_repeat(),
            suppress = self.suppress_windows_handling(),
            "keyboard capture started"
        );
        Ok(())
    }

    /// Remove the hook. A no-op when idle.
    ///
    /// If the OS refuses, the hook stays registered (and its context pinned)
    /// and the interceptor remains capturing.
    pub fn stop_capturing(&mut self) -> Result<(), HookError> {
        let Some(handle) = self.handle.take() else {
            debug!("stop_capturing called while idle");
            return Ok(());
        };

        if let Err(e) = self.backend.uninstall(&handle) {
            error!(?e, "failed to remove keyboard hook");
            self.handle = Some(handle);
            return Err(e);
        }

        info!("keyboard capture stopped");
        Ok(())
    }

    pub fn is_capturing(&self) -> bool {
        self.handle.is_some()
    }

    pub fn state(&self) -> CaptureState {
        if self.is_capturing() {
            CaptureState::Capturing
        } else {
            CaptureState::Idle
        }
    }

    pub fn disable_repeat(&self) -> bool {
        self.context.options.disable_repeat()
    }

    pub fn set_disable_repeat(&self, value: bool) {
        self.context.options.set_disable_repeat(value);
    }

    pub fn suppress_windows_handling(&self) -> bool {
        self.context.options.suppress_windows_handling()
    }

    pub fn set_suppress_windows_handling(&self, value: bool) {
        self.context.options.set_suppress_windows_handling(value);
    }

    /// Shared handle to the option flags, for use from other threads
    pub fn options(&self) -> Arc<InterceptorOptions> {
        Arc::clone(&self.context.options)
    }

    pub fn key_down(&self) -> &EventChannel {
        &self.context.key_down
    }

    pub fn key_up(&self) -> &EventChannel {
        &self.context.key_up
    }

    /// Fires after `key_down` for non-system presses
    pub fn key_press(&self) -> &EventChannel {
        &self.context.key_press
    }
}

impl<B: HookBackend> Drop for Interceptor<B> {
    fn drop(&mut self) {
        if let Err(e) = self.stop_capturing() {
            warn!(?e, "keyboard hook still registered on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::backend::testing::MockBackend;
    use crate::hook::raw::{flags, WM_KEYDOWN, WM_KEYUP, WM_SYSKEYDOWN, WM_SYSKEYUP};

    type Log = Arc<Mutex<Vec<(&'static str, KeyEvent)>>>;

    fn create_interceptor() -> (Interceptor<MockBackend>, MockBackend, Log) {
        let backend = MockBackend::default();
        let interceptor = Interceptor::with_backend(backend.clone());
        let log: Log = Arc::new(Mutex::new(Vec::new()));

        for channel in [interceptor.key_down(), interceptor.key_up(), interceptor.key_press()] {
            let log = Arc::clone(&log);
            let name = channel.name();
            channel.subscribe(move |event| log.lock().push((name, *event)));
        }

        (interceptor, backend, log)
    }

    fn key_a(flags: u32) -> RawKeyEvent {
        RawKeyEvent {
            virtual_key: 0x41,
            scan_code: 30,
            flags,
            time: 100,
            extra_info: 0,
        }
    }

    fn names(log: &Log) -> Vec<&'static str> {
        log.lock().iter().map(|(name, _)| *name).collect()
    }

    #[test]
    fn test_initial_state() {
        let (interceptor, _, _) = create_interceptor();
        assert_eq!(interceptor.state(), CaptureState::Idle);
        assert!(!interceptor.is_capturing());
        assert!(!interceptor.disable_repeat());
        assert!(!interceptor.suppress_windows_handling());
    }

    #[test]
    fn test_key_down_fires_down_then_press() {
        let (mut interceptor, backend, log) = create_interceptor();
        interceptor.start_capturing().unwrap();

        let decision = backend.deliver(0, WM_KEYDOWN, key_a(0));
        assert_eq!(decision, Some(Propagation::Forward));

        let log = log.lock();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].0, "key_down");
        assert_eq!(log[1].0, "key_press");
        assert_eq!(log[0].1.key, Key::A);
        assert_eq!(log[0].1, log[1].1);
    }

    #[test]
    fn test_system_key_down_fires_only_down() {
        let (mut interceptor, backend, log) = create_interceptor();
        interceptor.start_capturing().unwrap();

        backend.deliver(0, WM_SYSKEYDOWN, key_a(flags::ALT_DOWN));

        assert_eq!(names(&log), vec!["key_down"]);
        assert!(log.lock()[0].1.system);
    }

    #[test]
    fn test_key_up_and_system_key_up_fire_up() {
        let (mut interceptor, backend, log) = create_interceptor();
        interceptor.start_capturing().unwrap();

        backend.deliver(0, WM_KEYUP, key_a(flags::UP));
        backend.deliver(0, WM_SYSKEYUP, key_a(flags::UP | flags::ALT_DOWN));

        assert_eq!(names(&log), vec!["key_up", "key_up"]);
    }

    #[test]
    fn test_unknown_message_dispatches_nothing() {
        let (mut interceptor, backend, log) = create_interceptor();
        interceptor.start_capturing().unwrap();

        assert_eq!(backend.deliver(0, 0x0102, key_a(0)), Some(Propagation::Forward));
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_unmapped_virtual_key_translates_to_none() {
        let (mut interceptor, backend, log) = create_interceptor();
        interceptor.start_capturing().unwrap();

        let raw = RawKeyEvent {
            virtual_key: 0xE8,
            scan_code: 99,
            ..Default::default()
        };
        backend.deliver(0, WM_KEYDOWN, raw);

        assert_eq!(log.lock()[0].1.key, Key::None);
        assert_eq!(log.lock()[0].1.virtual_key, 0xE8);
    }

    #[test]
    fn test_repeat_suppressed_and_swallowed() {
        let (mut interceptor, backend, log) = create_interceptor();
        interceptor.set_disable_repeat(true);
        interceptor.set_suppress_windows_handling(true);
        interceptor.start_capturing().unwrap();

        assert_eq!(backend.deliver(0, WM_KEYDOWN, key_a(0)), Some(Propagation::Swallow));
        assert_eq!(log.lock().len(), 2);

        assert_eq!(backend.deliver(0, WM_KEYDOWN, key_a(0)), Some(Propagation::Swallow));
        assert_eq!(log.lock().len(), 2);
    }

    #[test]
    fn test_repeat_baseline_updates_on_every_event() {
        let (mut interceptor, backend, log) = create_interceptor();
        interceptor.set_disable_repeat(true);
        interceptor.start_capturing().unwrap();

        backend.deliver(0, WM_KEYDOWN, key_a(0));
        backend.deliver(0, WM_KEYDOWN, key_a(0));
        backend.deliver(0, WM_KEYUP, key_a(flags::UP));

        assert_eq!(names(&log), vec!["key_down", "key_press", "key_up"]);
    }

    #[test]
    fn test_repeats_dispatch_when_filter_disabled() {
        let (mut interceptor, backend, log) = create_interceptor();
        interceptor.start_capturing().unwrap();

        backend.deliver(0, WM_KEYDOWN, key_a(0));
        backend.deliver(0, WM_KEYDOWN, key_a(0));

        assert_eq!(log.lock().len(), 4);
    }

    #[test]
    fn test_every_event_forwarded_when_not_suppressing() {
        let (mut interceptor, backend, _) = create_interceptor();
        interceptor.set_disable_repeat(true);
        interceptor.start_capturing().unwrap();

        for _ in 0..3 {
            assert_eq!(backend.deliver(0, WM_KEYDOWN, key_a(0)), Some(Propagation::Forward));
        }
    }

    #[test]
    fn test_negative_code_is_not_decoded() {
        let (mut interceptor, backend, log) = create_interceptor();
        interceptor.set_suppress_windows_handling(true);
        interceptor.start_capturing().unwrap();

        let context = backend.state.borrow().active.as_ref().map(|(_, c)| Arc::clone(c)).unwrap();
        let decoded = std::cell::Cell::new(false);
        let decision = context.on_hook(-1, WM_KEYDOWN, || {
            decoded.set(true);
            key_a(0)
        });

        assert_eq!(decision, Propagation::Swallow);
        assert!(!decoded.get());
        assert!(log.lock().is_empty());

        interceptor.set_suppress_windows_handling(false);
        assert_eq!(context.on_hook(-1, WM_KEYDOWN, || key_a(0)), Propagation::Forward);
    }

    #[test]
    fn test_negative_code_leaves_repeat_baseline_alone() {
        let (mut interceptor, backend, log) = create_interceptor();
        interceptor.set_disable_repeat(true);
        interceptor.start_capturing().unwrap();

        backend.deliver(-1, WM_KEYDOWN, key_a(0));
        backend.deliver(0, WM_KEYDOWN, key_a(0));

        assert_eq!(names(&log), vec!["key_down", "key_press"]);
    }

    #[test]
    fn test_panicking_subscriber_does_not_escape_callback() {
        let (mut interceptor, backend, log) = create_interceptor();
        interceptor.key_down().subscribe(|_| panic!("subscriber failure"));
        interceptor.set_suppress_windows_handling(true);
        interceptor.start_capturing().unwrap();

        assert_eq!(backend.deliver(0, WM_KEYDOWN, key_a(0)), Some(Propagation::Swallow));
        assert_eq!(names(&log), vec!["key_down", "key_press"]);
    }

    #[test]
    fn test_double_start_is_rejected() {
        let (mut interceptor, backend, _) = create_interceptor();
        interceptor.start_capturing().unwrap();

        assert!(matches!(interceptor.start_capturing(), Err(HookError::AlreadyCapturing)));
        assert_eq!(backend.state.borrow().installs, 1);
        assert!(interceptor.is_capturing());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (mut interceptor, backend, _) = create_interceptor();
        interceptor.start_capturing().unwrap();

        interceptor.stop_capturing().unwrap();
        assert!(!interceptor.is_capturing());
        interceptor.stop_capturing().unwrap();
        assert!(!interceptor.is_capturing());

        assert_eq!(backend.state.borrow().uninstalled, vec![1]);
    }

    #[test]
    fn test_stop_while_idle_is_noop() {
        let (mut interceptor, backend, _) = create_interceptor();
        interceptor.stop_capturing().unwrap();
        assert!(backend.state.borrow().uninstalled.is_empty());
    }

    #[test]
    fn test_restart_resumes_dispatching() {
        let (mut interceptor, backend, log) = create_interceptor();
        interceptor.start_capturing().unwrap();
        interceptor.stop_capturing().unwrap();

        assert_eq!(backend.deliver(0, WM_KEYDOWN, key_a(0)), None);

        interceptor.start_capturing().unwrap();
        assert_eq!(interceptor.state(), CaptureState::Capturing);
        backend.deliver(0, WM_KEYDOWN, key_a(0));

        assert_eq!(log.lock().len(), 2);
        let state = backend.state.borrow();
        assert_eq!(state.uninstalled, vec![1]);
        assert_eq!(state.active.as_ref().map(|(handle, _)| *handle), Some(2));
    }

    #[test]
    fn test_restart_resets_repeat_baseline() {
        let (mut interceptor, backend, log) = create_interceptor();
        interceptor.set_disable_repeat(true);

        interceptor.start_capturing().unwrap();
        backend.deliver(0, WM_KEYDOWN, key_a(0));
        interceptor.stop_capturing().unwrap();

        interceptor.start_capturing().unwrap();
        backend.deliver(0, WM_KEYDOWN, key_a(0));

        assert_eq!(log.lock().len(), 4);
    }

    #[test]
    fn test_restart_can_keep_repeat_baseline() {
        let (mut interceptor, backend, log) = create_interceptor();
        interceptor.set_disable_repeat(true);
        interceptor.options().set_reset_repeat_on_start(false);

        interceptor.start_capturing().unwrap();
        backend.deliver(0, WM_KEYDOWN, key_a(0));
        interceptor.stop_capturing().unwrap();

        interceptor.start_capturing().unwrap();
        backend.deliver(0, WM_KEYDOWN, key_a(0));

        assert_eq!(log.lock().len(), 2);
    }

    #[test]
    fn test_failed_install_stays_idle() {
        let (mut interceptor, backend, _) = create_interceptor();
        backend.state.borrow_mut().fail_install = true;

        assert!(matches!(interceptor.start_capturing(), Err(HookError::Registration(_))));
        assert_eq!(interceptor.state(), CaptureState::Idle);

        backend.state.borrow_mut().fail_install = false;
        interceptor.start_capturing().unwrap();
        assert!(interceptor.is_capturing());
    }

    #[test]
    fn test_failed_uninstall_keeps_hook() {
        let (mut interceptor, backend, _) = create_interceptor();
        interceptor.start_capturing().unwrap();
        backend.state.borrow_mut().fail_uninstall = true;

        assert!(matches!(interceptor.stop_capturing(), Err(HookError::Unregistration(_))));
        assert!(interceptor.is_capturing());
        assert!(backend.state.borrow().active.is_some());

        backend.state.borrow_mut().fail_uninstall = false;
        interceptor.stop_capturing().unwrap();
        assert!(!interceptor.is_capturing());
    }

    #[test]
    fn test_drop_uninstalls() {
        let (mut interceptor, backend, _) = create_interceptor();
        interceptor.start_capturing().unwrap();
        drop(interceptor);
        assert!(backend.state.borrow().active.is_none());
    }

    #[test]
    fn test_options_apply_config() {
        let options = InterceptorOptions::default();
        let config = Config {
            disable_repeat: true,
            suppress_windows_handling: true,
            reset_repeat_on_start: false,
            slow_callback_ms: 25,
            ..Config::default()
        };
        options.apply(&config);

        assert!(options.disable_repeat());
        assert!(options.suppress_windows_handling());
        assert!(!options.reset_repeat_on_start());
        assert_eq!(options.slow_callback(), Duration::from_millis(25));
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    /// Deliver one key-down through a subscriber that outlasts a 1 ms budget
    fn deliver_slow_key(threshold: Duration) -> String {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let (mut interceptor, backend, _) = create_interceptor();
            interceptor.options().set_slow_callback(threshold);
            interceptor
                .key_down()
                .subscribe(|_| std::thread::sleep(Duration::from_millis(20)));
            interceptor.start_capturing().unwrap();
            backend.deliver(0, WM_KEYDOWN, key_a(0));
        });

        logs.contents()
    }

    #[test]
    fn test_slow_callback_is_logged() {
        let output = deliver_slow_key(Duration::from_millis(1));
        assert!(output.contains("keyboard hook callback is slow"), "{output}");
    }

    #[test]
    fn test_zero_threshold_disables_slow_warning() {
        let output = deliver_slow_key(Duration::ZERO);
        assert!(!output.contains("keyboard hook callback is slow"), "{output}");
    }

    #[test]
    fn test_options_shared_across_threads() {
        let (mut interceptor, backend, _) = create_interceptor();
        interceptor.start_capturing().unwrap();

        let options = interceptor.options();
        std::thread::spawn(move || options.set_suppress_windows_handling(true))
            .join()
            .unwrap();

        assert_eq!(backend.deliver(0, WM_KEYDOWN, key_a(0)), Some(Propagation::Swallow));
    }
}
