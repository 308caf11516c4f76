// Session configuration
//
// Plain owned struct passed into the controllers — no global SDK state.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use huelink_api::{DEFAULT_DISCOVERY_ENDPOINT, TransportConfig};

/// Heartbeat period for refreshing the bridge's light cache.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);
/// Minimum delay between two color emissions from the sampler.
pub const MIN_UPDATE_INTERVAL: Duration = Duration::from_millis(100);
/// Fade duration for light updates, in device ticks (1 tick = 100 ms).
pub const TRANSITION_TIME: u16 = 1;

/// Configuration for one Hue session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Application name sent during registration.
    pub app_name: String,
    /// Device name sent during registration.
    pub device_name: String,
    /// Location of the known-bridge cache file.
    pub cache_path: PathBuf,
    /// Discovery portal endpoint.
    pub discovery_endpoint: Url,
    /// Heartbeat period for refreshing the light cache.
    pub heartbeat_interval: Duration,
    /// Sampler emission throttle.
    pub min_update_interval: Duration,
    /// Fade duration applied to every light update, in device ticks.
    pub transition_time: u16,
    /// HTTP transport settings shared by discovery and the bridge client.
    pub transport: TransportConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            app_name: "huelink".into(),
            device_name: "handheld".into(),
            cache_path: PathBuf::from("known_bridges.json"),
            discovery_endpoint: Url::parse(DEFAULT_DISCOVERY_ENDPOINT)
                .expect("default discovery endpoint is a valid URL"),
            heartbeat_interval: HEARTBEAT_INTERVAL,
            min_update_interval: MIN_UPDATE_INTERVAL,
            transition_time: TRANSITION_TIME,
            transport: TransportConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn new(app_name: impl Into<String>, device_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            device_name: device_name.into(),
            ..Self::default()
        }
    }

    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = path.into();
        self
    }

    pub fn with_discovery_endpoint(mut self, endpoint: Url) -> Self {
        self.discovery_endpoint = endpoint;
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }
}
