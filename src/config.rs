//! Application-level configuration loading, including the matchmaking and timeout policy.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "DRAW_DUEL_BACK_CONFIG_PATH";

/// Interval between two `find_oldest_waiting` polls on the guesser side.
const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
/// Random extra delay added to each poll so competing guessers drift apart.
const DEFAULT_POLL_JITTER_MS: u64 = 250;
/// Total time a guesser keeps searching before giving up.
const DEFAULT_SEARCH_WINDOW_MS: u64 = 30_000;
/// Total time a creator waits for a guesser before the match is failed.
const DEFAULT_WAITING_ROOM_WINDOW_MS: u64 = 90_000;
/// Total time both peers have to complete the ready handshake.
const DEFAULT_HANDSHAKE_WINDOW_MS: u64 = 60_000;
/// Upper bound on path points accepted in a single draw batch.
const DEFAULT_MAX_POINTS_PER_BATCH: usize = 256;
/// Per-topic broadcast channel capacity on the notification bus.
const DEFAULT_BUS_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
///
/// Every timing constant from the matchmaking and timeout policy lives here so
/// tests can shrink the windows to milliseconds instead of waiting them out.
pub struct AppConfig {
    /// Delay between consecutive waiting-match polls.
    pub poll_interval: Duration,
    /// Maximum random jitter added on top of [`AppConfig::poll_interval`].
    pub poll_jitter: Duration,
    /// Bound on the guesser's whole search loop.
    pub search_window: Duration,
    /// Bound on the creator's wait for a guesser to join.
    pub waiting_room_window: Duration,
    /// Bound on the pre-match ready handshake.
    pub handshake_window: Duration,
    /// Largest accepted draw batch, in path points.
    pub max_points_per_batch: usize,
    /// Capacity of each per-topic broadcast channel.
    pub bus_capacity: usize,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(path = %path.display(), "loaded configuration");
                    config
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
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Default, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
///
/// All durations are expressed in milliseconds. Absent fields keep their defaults.
struct RawConfig {
    poll_interval_ms: Option<u64>,
    poll_jitter_ms: Option<u64>,
    search_window_ms: Option<u64>,
    waiting_room_window_ms: Option<u64>,
    handshake_window_ms: Option<u64>,
    max_points_per_batch: Option<usize>,
    bus_capacity: Option<usize>,
}

impl From<RawConfig> for AppConfig {
    fn from(raw: RawConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(
                raw.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS),
            ),
            poll_jitter: Duration::from_millis(raw.poll_jitter_ms.unwrap_or(DEFAULT_POLL_JITTER_MS)),
            search_window: Duration::from_millis(
                raw.search_window_ms.unwrap_or(DEFAULT_SEARCH_WINDOW_MS),
            ),
            waiting_room_window: Duration::from_millis(
                raw.waiting_room_window_ms
                    .unwrap_or(DEFAULT_WAITING_ROOM_WINDOW_MS),
            ),
            handshake_window: Duration::from_millis(
                raw.handshake_window_ms.unwrap_or(DEFAULT_HANDSHAKE_WINDOW_MS),
            ),
            max_points_per_batch: raw
                .max_points_per_batch
                .unwrap_or(DEFAULT_MAX_POINTS_PER_BATCH),
            bus_capacity: raw.bus_capacity.unwrap_or(DEFAULT_BUS_CAPACITY),
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
