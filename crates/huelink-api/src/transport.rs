// Shared transport configuration for building reqwest::Client instances.
//
// The bridge client and portal discovery share timeout and user-agent
// settings through this module, avoiding duplicated builder logic.
// CLIP v1 speaks plain HTTP on the LAN, so there is no TLS knob here;
// the discovery portal is HTTPS with a publicly trusted certificate.

use std::time::Duration;

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(8),
            user_agent: concat!("huelink/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, crate::error::Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(&self.user_agent)
            .build()
            .map_err(crate::error::Error::Transport)
    }
}
