//! Application-level configuration loading: scoring limits, store timings and channel sizes.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "CRICKET_SCORING_CONFIG_PATH";

const DEFAULT_SUBMIT_RETRIES: u32 = 3;
const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_SSE_CAPACITY: usize = 32;
const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
const DEFAULT_SLOT_IDLE_MS: u64 = 600_000;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Upper bound applied to the derived per-bowler over limit.
    pub bowler_over_cap: Option<u16>,
    /// How many times a ball submission is re-planned after a write conflict.
    pub submit_retries: u32,
    /// Deadline for a single store round-trip.
    pub store_timeout: Duration,
    /// Buffer size of SSE and change-notification channels.
    pub sse_capacity: usize,
    /// Interval between remote head checks of the REST store.
    pub poll_interval: Duration,
    /// How long a loaded match with no viewers stays in memory after its last use.
    pub slot_idle_timeout: Duration,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        submit_retries = app_config.submit_retries,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a JSON document; absent keys keep their default value.
    pub fn from_json(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    bowler_over_cap: Option<u16>,
    submit_retries: u32,
    store_timeout_ms: u64,
    sse_capacity: usize,
    poll_interval_ms: u64,
    slot_idle_ms: u64,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            bowler_over_cap: None,
            submit_retries: DEFAULT_SUBMIT_RETRIES,
            store_timeout_ms: DEFAULT_STORE_TIMEOUT_MS,
            sse_capacity: DEFAULT_SSE_CAPACITY,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            slot_idle_ms: DEFAULT_SLOT_IDLE_MS,
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            bowler_over_cap: value.bowler_over_cap,
            submit_retries: value.submit_retries,
            store_timeout: Duration::from_millis(value.store_timeout_ms.max(1)),
            sse_capacity: value.sse_capacity.max(1),
            poll_interval: Duration::from_millis(value.poll_interval_ms.max(100)),
            slot_idle_timeout: Duration::from_millis(value.slot_idle_ms.max(1)),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
