// CLIP v1 HTTP client
//
// Wraps `reqwest::Client` with bridge-specific URL construction and
// envelope unwrapping. The bridge reports application-level failures as
// HTTP 200 with a `[{"error": {...}}]` body, so every response goes
// through the same envelope check before the payload is parsed.

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{BridgeConfig, Lights, StateUpdate};
use crate::transport::TransportConfig;

/// One element of the CLIP response array. Success entries carry the
/// confirmed attribute, error entries the structured CLIP error.
#[derive(serde::Deserialize)]
struct ClipResult {
    #[serde(default)]
    success: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<ClipError>,
}

#[derive(serde::Deserialize)]
struct ClipError {
    #[serde(rename = "type")]
    error_type: i32,
    address: String,
    description: String,
}

impl From<ClipError> for Error {
    fn from(e: ClipError) -> Self {
        Error::Clip {
            error_type: e.error_type,
            address: e.address,
            description: e.description,
        }
    }
}

/// Raw HTTP client for one bridge's CLIP v1 API.
///
/// Cheaply cloneable — `reqwest::Client` is an `Arc` internally, so the
/// heartbeat task and per-light update tasks share one connection pool.
#[derive(Debug, Clone)]
pub struct BridgeClient {
    http: reqwest::Client,
    base_url: Url,
}

impl BridgeClient {
    /// Create a client for the bridge at `address` (IP, optionally with
    /// a port, e.g. `"10.0.0.5"`).
    pub fn new(address: &str, transport: &TransportConfig) -> Result<Self, Error> {
        let base_url = Url::parse(&format!("http://{address}/api/"))?;
        let http = transport.build_client()?;
        Ok(Self { http, base_url })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, address: &str) -> Result<Self, Error> {
        let base_url = Url::parse(&format!("http://{address}/api/"))?;
        Ok(Self { http, base_url })
    }

    /// The bridge base URL (always ends in `/api/`).
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build an unauthenticated URL: `{base}/api/{path}`.
    fn api_url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    /// Build a key-scoped URL: `{base}/api/{key}/{path}`.
    fn keyed_url(&self, key: &SecretString, path: &str) -> Result<Url, Error> {
        self.api_url(&format!("{}/{path}", key.expose_secret()))
    }

    // ── Operations ───────────────────────────────────────────────────

    /// Register a new application with the bridge.
    ///
    /// Returns the whitelisted application key. Fails with a CLIP 101
    /// error when the bridge's physical link button has not been pressed
    /// within the pairing window — check
    /// [`Error::is_link_button_not_pressed`].
    pub async fn register(
        &self,
        app_name: &str,
        device_name: &str,
    ) -> Result<SecretString, Error> {
        let url = self.api_url("")?;
        debug!("POST {url}");

        let body = serde_json::json!({ "devicetype": format!("{app_name}#{device_name}") });
        let resp = self.http.post(url).json(&body).send().await?;
        let results: Vec<ClipResult> = parse_body(resp).await?;

        let username = results
            .into_iter()
            .find_map(|r| r.success)
            .and_then(|s| {
                s.get("username")
                    .and_then(|v| v.as_str())
                    .map(String::from)
            })
            .ok_or_else(|| Error::Deserialization {
                message: "registration response missing username".into(),
                body: String::new(),
            })?;

        Ok(username.into())
    }

    /// Fetch the unauthenticated bridge configuration (name, versions).
    pub async fn get_config(&self) -> Result<BridgeConfig, Error> {
        let url = self.api_url("config")?;
        debug!("GET {url}");

        let resp = self.http.get(url).send().await?;
        parse_body(resp).await
    }

    /// Fetch the full lights resource as cached by the bridge.
    ///
    /// Doubles as application-key verification: a stale or unknown key
    /// yields a CLIP 1 error — check [`Error::is_unauthorized`].
    pub async fn list_lights(&self, key: &SecretString) -> Result<Lights, Error> {
        let url = self.keyed_url(key, "lights")?;
        debug!("GET {url}");

        let resp = self.http.get(url).send().await?;
        parse_body(resp).await
    }

    /// Apply a partial state update to one light.
    pub async fn set_light_state(
        &self,
        key: &SecretString,
        light_id: &str,
        update: &StateUpdate,
    ) -> Result<(), Error> {
        let url = self.keyed_url(key, &format!("lights/{light_id}/state"))?;
        debug!("PUT {url}");

        let resp = self.http.put(url).json(update).send().await?;
        // The bridge confirms each attribute separately; the envelope
        // check surfaces the first error entry.
        let _confirmed: Vec<ClipResult> = parse_body(resp).await?;
        Ok(())
    }
}

// ── Envelope handling ───────────────────────────────────────────────

/// Check the HTTP status, extract a CLIP error envelope if present, and
/// otherwise parse the payload.
async fn parse_body<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();

    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Http {
            status: status.as_u16(),
            message: body[..body.len().min(200)].to_owned(),
        });
    }

    let body = resp.text().await.map_err(Error::Transport)?;

    // Application-level failures come back as HTTP 200 with an error array.
    if let Ok(results) = serde_json::from_str::<Vec<ClipResult>>(&body) {
        if let Some(err) = results.into_iter().find_map(|r| r.error) {
            return Err(err.into());
        }
    }

    serde_json::from_str(&body).map_err(|e| {
        let preview = &body[..body.len().min(200)];
        Error::Deserialization {
            message: format!("{e} (body preview: {preview:?})"),
            body: body.clone(),
        }
    })
}
