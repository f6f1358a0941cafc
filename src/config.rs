//! Configuration loading and management

use anyhow::{bail, Context, Result};

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Drop held-key repeats instead of dispatching them
    pub disable_repeat: bool,

    /// Swallow every intercepted event so no other consumer sees it
    pub suppress_windows_handling: bool,

    /// Start each capture session with an empty repeat baseline
    pub reset_repeat_on_start: bool,

    /// Warn when one hook callback takes longer than this (0 = never)
    pub slow_callback_ms: u64,

    /// Capacity of the channel between the hook thread and the daemon
    pub event_buffer: usize,

    /// Print events as JSON lines instead of log records
    pub json_output: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            disable_repeat: false,
            suppress_windows_handling: false,
            reset_repeat_on_start: true,
            slow_callback_ms: 10,
            event_buffer: 256,
            json_output: false,
        }
    }
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let flag = |name: &str, default: bool| -> Result<bool> {
            lookup(name).map_or(Ok(default), |value| parse_bool(name, &value))
        };

        let slow_callback_ms = match lookup("KEYHOOK_SLOW_CALLBACK_MS") {
            Some(value) => value
                .trim()
                .parse()
                .with_context(|| format!("KEYHOOK_SLOW_CALLBACK_MS: invalid value {:?}", value))?,
            None => defaults.slow_callback_ms,
        };

        let event_buffer: usize = match lookup("KEYHOOK_EVENT_BUFFER") {
            Some(value) => value
                .trim()
                .parse()
                .with_context(|| format!("KEYHOOK_EVENT_BUFFER: invalid value {:?}", value))?,
            None => defaults.event_buffer,
        };
        if event_buffer == 0 {
            bail!("KEYHOOK_EVENT_BUFFER must be at least 1");
        }

        Ok(Self {
            disable_repeat: flag("KEYHOOK_DISABLE_REPEAT", defaults.disable_repeat)?,
            suppress_windows_handling: flag(
                "KEYHOOK_SUPPRESS",
                defaults.suppress_windows_handling,
            )?,
            reset_repeat_on_start: flag(
                "KEYHOOK_RESET_REPEAT_ON_START",
                defaults.reset_repeat_on_start,
            )?,
            slow_callback_ms,
            event_buffer,
            json_output: flag("KEYHOOK_JSON", defaults.json_output)?,
        })
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("{}: expected a boolean, got {:?}", name, value),
    }
}
