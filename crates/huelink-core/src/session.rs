// Session facade
//
// Composes the connection orchestrator and the lights engine behind one
// start/stop surface. Owns the wiring rule between them: a session only
// gets a lights engine once `Connected` arrives, and loses it again on
// `stop()` or a connection error.

use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use huelink_api::{BridgeConfig, Lights};

use crate::bridge::{BridgeController, BridgeEvent, ConnectionState};
use crate::color::Rgb;
use crate::config::SessionConfig;
use crate::error::CoreError;
use crate::lights::LightsController;

const EVENT_CHANNEL_SIZE: usize = 8;

/// Lifecycle notifications delivered to the listener passed into
/// [`HueController::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// A bridge session is established; color and brightness calls now
    /// reach the lights.
    Connected,
    /// Discovery finished without finding a bridge.
    NoBridgesFound,
    /// The bridge requires its link button to be pressed.
    NotAuthenticated,
    /// The connection failed or was lost.
    ConnectionError,
}

/// Top-level controller for one Hue session.
///
/// Cheaply cloneable; all clones share the same underlying session.
#[derive(Clone)]
pub struct HueController {
    inner: Arc<HueInner>,
}

struct HueInner {
    config: SessionConfig,
    bridge: BridgeController,
    lights: Mutex<Option<LightsController>>,
}

impl HueController {
    pub fn new(config: SessionConfig) -> Self {
        let bridge = BridgeController::new(config.clone());
        Self {
            inner: Arc::new(HueInner {
                config,
                bridge,
                lights: Mutex::new(None),
            }),
        }
    }

    /// Subscribe to connection state changes.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.bridge.state()
    }

    /// Start connecting to a bridge. Lifecycle outcomes arrive on
    /// `listener`; calling `start` again supersedes the previous
    /// listener and attempt.
    pub async fn start(&self, listener: mpsc::Sender<SessionEvent>) {
        info!("starting hue session");

        let (tx, mut rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
        self.inner.bridge.connect(tx).await;

        // Forward bridge outcomes, installing/clearing the lights engine
        // as sessions come and go. Exits when the bridge drops this
        // attempt's sender (superseded) or the listener goes away.
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let out = match event {
                    BridgeEvent::Connected(session) => {
                        let engine = LightsController::new(session, &inner.config);
                        *inner.lights.lock().expect("lights lock poisoned") = Some(engine);
                        SessionEvent::Connected
                    }
                    BridgeEvent::NoBridgesFound => SessionEvent::NoBridgesFound,
                    BridgeEvent::NotAuthenticated => SessionEvent::NotAuthenticated,
                    BridgeEvent::ConnectionError => {
                        // A dropped link invalidates the lights engine.
                        inner.lights.lock().expect("lights lock poisoned").take();
                        SessionEvent::ConnectionError
                    }
                };

                if listener.send(out).await.is_err() {
                    debug!("session listener dropped");
                    break;
                }
            }
        });
    }

    /// The lights of the active session, as of the last heartbeat.
    pub async fn lights(&self) -> Result<Arc<Lights>, CoreError> {
        let session = self
            .inner
            .bridge
            .session()
            .await
            .ok_or(CoreError::Disconnected)?;
        Ok(session.lights_snapshot())
    }

    /// Fetch the connected bridge's configuration (name, versions).
    pub async fn bridge_info(&self) -> Result<BridgeConfig, CoreError> {
        let session = self
            .inner
            .bridge
            .session()
            .await
            .ok_or(CoreError::Disconnected)?;
        Ok(session.client().get_config().await?)
    }

    /// Disconnect and release the lights engine. Idempotent.
    pub async fn stop(&self) {
        info!("stopping hue session");
        self.inner.lights.lock().expect("lights lock poisoned").take();
        self.inner.bridge.disconnect().await;
    }

    /// Push a color to all powered-on lights. No-op without an active
    /// session.
    pub fn set_color(&self, color: Rgb) {
        if let Some(lights) = self
            .inner
            .lights
            .lock()
            .expect("lights lock poisoned")
            .as_ref()
        {
            lights.set_color(color);
        }
    }

    /// Push a brightness to all powered-on lights. No-op without an
    /// active session.
    pub fn set_brightness(&self, brightness: u8) {
        if let Some(lights) = self
            .inner
            .lights
            .lock()
            .expect("lights lock poisoned")
            .as_ref()
        {
            lights.set_brightness(brightness);
        }
    }
}
