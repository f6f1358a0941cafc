//! keyhook-daemon: global keyboard interceptor
//!
//! Installs a system-wide low-level keyboard hook on a dedicated thread and
//! reports the KeyDown / KeyUp / KeyPress streams:
//! - as structured log records (default), or
//! - as JSON lines on stdout (`KEYHOOK_JSON=1`)
//!
//! With `KEYHOOK_SUPPRESS=1` every key is swallowed while the daemon runs.

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use keyhook::config::Config;
use keyhook::events::InterceptEvent;
use keyhook::hook::KeyboardListener;
use keyhook::lifecycle::ShutdownSignal;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .with_writer(std::io::stderr)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "keyhook-daemon starting"
    );

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;
    info!(?config, "configuration loaded");

    // Create shutdown signal handler
    let shutdown = ShutdownSignal::new();

    // Hook thread -> main loop
    let (event_tx, mut event_rx) = mpsc::channel::<InterceptEvent>(config.event_buffer);

    let listener = KeyboardListener::new(config.clone(), event_tx);
    if let Err(e) = listener.start() {
        error!(?e, "failed to start keyboard listener");
        return Err(e).context("keyboard hook unavailable");
    }
    info!("keyboard listener started");

    tokio::select! {
        _ = async {
            while let Some(event) = event_rx.recv().await {
                report(&config, &event);
            }
        } => {
            info!("event stream closed");
        }

        // Wait for shutdown signal
        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    info!("shutting down...");
    listener.stop();
    info!("keyhook-daemon stopped");

    Ok(())
}

fn report(config: &Config, event: &InterceptEvent) {
    if config.json_output {
        match serde_json::to_string(event) {
            Ok(line) => println!("{}", line),
            Err(e) => error!(?e, "failed to serialize key event"),
        }
    } else {
        let key = event.key_event();
        info!(
            scan_code = key.scan_code,
            vk = key.virtual_key,
            injected = key.injected,
            "{}",
            event
        );
    }
}
