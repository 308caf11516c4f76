// Portal-based bridge discovery
//
// Queries the vendor discovery portal, which tracks which bridges have
// phoned home from the caller's public IP. One `search()` call delivers
// exactly one terminal outcome: a candidate list (possibly empty) or an
// error. Cancellation is imposed by the caller racing the future against
// its own token.

use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::DiscoveredBridge;
use crate::transport::TransportConfig;

/// Default discovery portal endpoint.
pub const DEFAULT_DISCOVERY_ENDPOINT: &str = "https://discovery.meethue.com/";

/// Active network search for bridges.
#[derive(Debug, Clone)]
pub struct BridgeDiscovery {
    http: reqwest::Client,
    endpoint: Url,
}

impl BridgeDiscovery {
    /// Create a discovery handle against `endpoint`.
    pub fn new(transport: &TransportConfig, endpoint: Url) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self { http, endpoint })
    }

    /// Create a discovery handle with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, endpoint: Url) -> Self {
        Self { http, endpoint }
    }

    /// Search for bridges on the local network.
    ///
    /// Returns zero or more candidates; an empty list means no bridges
    /// were found, which is a valid outcome rather than an error.
    pub async fn search(&self) -> Result<Vec<DiscoveredBridge>, Error> {
        debug!("GET {}", self.endpoint);

        let resp = self.http.get(self.endpoint.clone()).send().await?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Http {
                status: status.as_u16(),
                message: body[..body.len().min(200)].to_owned(),
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;
        let results: Vec<DiscoveredBridge> =
            serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: format!("{e} (body preview: {:?})", &body[..body.len().min(200)]),
                body,
            })?;

        debug!(count = results.len(), "bridge discovery finished");
        Ok(results)
    }
}
