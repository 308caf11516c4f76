// ── Connection orchestrator ──
//
// Full lifecycle management for one bridge connection. Sequences the
// known-bridge cache, network discovery, connect, registration, and
// heartbeat, and delivers exactly one terminal event per connect
// attempt. Starting a new phase always cancels or releases the previous
// one, so overlapping discovery searches or duplicate sessions never
// occur.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use secrecy::SecretString;
use tokio::sync::{Mutex, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use huelink_api::{BridgeClient, BridgeDirectory, BridgeDiscovery, Lights};

use crate::config::SessionConfig;

/// Consecutive heartbeat failures treated as a dropped link.
const MAX_HEARTBEAT_FAILURES: u32 = 3;

// ── ConnectionState ──────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    ResolvingCache,
    Discovering,
    Connecting,
    Connected,
}

// ── Events ───────────────────────────────────────────────────────

/// Terminal outcomes of a connect attempt, delivered to the listener
/// channel passed into [`BridgeController::connect`].
#[derive(Debug, Clone)]
pub enum BridgeEvent {
    /// Session established and initialized; light updates may flow.
    Connected(BridgeHandle),
    /// Discovery finished without any candidate.
    NoBridgesFound,
    /// Bridge reachable but the link button was not pressed.
    NotAuthenticated,
    /// Transport-level failure during discovery, connect, or an
    /// established session.
    ConnectionError,
}

// ── BridgeHandle ─────────────────────────────────────────────────

/// An established, authenticated session with one bridge.
///
/// Cheaply cloneable. Created and replaced only by the
/// [`BridgeController`]; the lights engine reads from it.
#[derive(Debug, Clone)]
pub struct BridgeHandle {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    client: BridgeClient,
    app_key: SecretString,
    lights: watch::Receiver<Arc<Lights>>,
    cancel: CancellationToken,
}

impl BridgeHandle {
    pub fn new(
        client: BridgeClient,
        app_key: SecretString,
        lights: watch::Receiver<Arc<Lights>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                client,
                app_key,
                lights,
                cancel,
            }),
        }
    }

    pub fn client(&self) -> &BridgeClient {
        &self.inner.client
    }

    pub fn app_key(&self) -> &SecretString {
        &self.inner.app_key
    }

    /// The light list as of the last heartbeat (cheap `Arc` clone).
    pub fn lights_snapshot(&self) -> Arc<Lights> {
        self.inner.lights.borrow().clone()
    }

    /// Subscribe to heartbeat snapshots.
    pub fn subscribe_lights(&self) -> watch::Receiver<Arc<Lights>> {
        self.inner.lights.clone()
    }

    /// Cancelled when the session is torn down — in-flight per-light
    /// work must stop then.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.inner.cancel
    }

    fn shutdown(&self) {
        self.inner.cancel.cancel();
    }
}

// ── BridgeController ─────────────────────────────────────────────

/// The bridge-connection state machine.
///
/// `connect()` begins (re)establishing a session — cache lookup, then
/// discovery if needed, then registration and heartbeat — and fires
/// exactly one terminal [`BridgeEvent`] per attempt unless superseded
/// by a newer `connect()` or `disconnect()`. `disconnect()` is
/// idempotent.
#[derive(Clone)]
pub struct BridgeController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: SessionConfig,
    directory: BridgeDirectory,
    state: watch::Sender<ConnectionState>,
    /// Attempt counter — events from superseded attempts are dropped.
    attempt: AtomicU64,
    listener: Mutex<Option<mpsc::Sender<BridgeEvent>>>,
    /// Token for the current attempt — cancelled on disconnect,
    /// replaced on reconnect.
    attempt_cancel: Mutex<CancellationToken>,
    session: Mutex<Option<BridgeHandle>>,
}

impl BridgeController {
    pub fn new(config: SessionConfig) -> Self {
        let directory = BridgeDirectory::new(&config.cache_path);
        let (state, _) = watch::channel(ConnectionState::Idle);

        Self {
            inner: Arc::new(ControllerInner {
                config,
                directory,
                state,
                attempt: AtomicU64::new(0),
                listener: Mutex::new(None),
                attempt_cancel: Mutex::new(CancellationToken::new()),
                session: Mutex::new(None),
            }),
        }
    }

    /// Begin (re)establishing a session, superseding any in-flight
    /// attempt. Terminal outcomes arrive on `listener`.
    pub async fn connect(&self, listener: mpsc::Sender<BridgeEvent>) {
        let attempt = self.inner.attempt.fetch_add(1, Ordering::SeqCst) + 1;
        *self.inner.listener.lock().await = Some(listener);

        // Cancel any prior discovery/session before starting a new phase.
        let cancel = CancellationToken::new();
        {
            let mut guard = self.inner.attempt_cancel.lock().await;
            guard.cancel();
            *guard = cancel.clone();
        }
        self.teardown_session().await;

        let _ = self.inner.state.send(ConnectionState::ResolvingCache);
        let ctrl = self.clone();
        tokio::spawn(async move {
            ctrl.run_connect(attempt, &cancel).await;
        });
    }

    /// Cancel any in-flight discovery, tear down any session, and clear
    /// the listener. Safe to call when already disconnected; no event
    /// is emitted for the aborted attempt.
    pub async fn disconnect(&self) {
        *self.inner.listener.lock().await = None;
        self.inner.attempt_cancel.lock().await.cancel();
        self.teardown_session().await;

        let _ = self.inner.state.send(ConnectionState::Idle);
        debug!("disconnected");
    }

    /// Subscribe to connection state changes.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// The current session, if any.
    pub async fn session(&self) -> Option<BridgeHandle> {
        self.inner.session.lock().await.clone()
    }

    async fn teardown_session(&self) {
        if let Some(session) = self.inner.session.lock().await.take() {
            debug!("disconnecting from bridge");
            session.shutdown();
        }
    }

    /// Deliver an event to the listener, unless the attempt has been
    /// superseded or the listener was cleared — a late callback after
    /// `disconnect()` must not act.
    async fn emit(&self, attempt: u64, event: BridgeEvent) {
        if !self.is_current(attempt) {
            debug!(attempt, "dropping event from superseded attempt");
            return;
        }

        let tx = self.inner.listener.lock().await.clone();
        if let Some(tx) = tx {
            if tx.send(event).await.is_err() {
                debug!("listener dropped");
            }
        }
    }

    fn is_current(&self, attempt: u64) -> bool {
        self.inner.attempt.load(Ordering::SeqCst) == attempt
    }

    /// Emit a terminal failure event and fall back to `Idle`.
    async fn fail(&self, attempt: u64, event: BridgeEvent) {
        self.emit(attempt, event).await;
        let _ = self.inner.state.send(ConnectionState::Idle);
    }

    // ── Connect flow ─────────────────────────────────────────────

    /// Resolve a target bridge (cache first, discovery second) and hand
    /// it to [`Self::establish`].
    async fn run_connect(&self, attempt: u64, cancel: &CancellationToken) {
        let config = &self.inner.config;

        // Cache resolution: most recently connected bridge wins.
        let known = match self.inner.directory.last_connected() {
            Ok(known) => known,
            Err(e) => {
                warn!(error = %e, "bridge cache unreadable, falling back to discovery");
                None
            }
        };

        let target = known.and_then(|k| {
            if k.ip_address.is_empty() {
                debug!(bridge = %k.unique_id, "cached bridge has no address");
                None
            } else {
                debug!(bridge = %k.unique_id, ip = %k.ip_address, "using cached bridge");
                Some((k.ip_address, k.unique_id, k.app_key))
            }
        });

        let (ip, bridge_id, cached_key) = if let Some(target) = target {
            target
        } else {
            let _ = self.inner.state.send(ConnectionState::Discovering);
            info!("starting bridge discovery");

            let discovery =
                match BridgeDiscovery::new(&config.transport, config.discovery_endpoint.clone()) {
                    Ok(discovery) => discovery,
                    Err(e) => {
                        error!(error = %e, "bridge discovery setup failed");
                        self.fail(attempt, BridgeEvent::ConnectionError).await;
                        return;
                    }
                };

            let results = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!("bridge discovery stopped");
                    return;
                }
                res = discovery.search() => match res {
                    Ok(results) => results,
                    Err(e) => {
                        error!(error = %e, "bridge discovery failed");
                        self.fail(attempt, BridgeEvent::ConnectionError).await;
                        return;
                    }
                }
            };

            // Only the first candidate is used; the rest are ignored.
            let Some(first) = results.into_iter().next() else {
                warn!("no bridges found");
                self.fail(attempt, BridgeEvent::NoBridgesFound).await;
                return;
            };

            debug!(bridge = %first.id, ip = %first.internal_ip_address, "bridge discovered");
            let cached_key = self
                .inner
                .directory
                .find(&first.id)
                .ok()
                .flatten()
                .and_then(|b| b.app_key);
            (first.internal_ip_address, first.id, cached_key)
        };

        if cancel.is_cancelled() {
            return;
        }

        self.establish(attempt, cancel, &ip, &bridge_id, cached_key)
            .await;
    }

    /// Connect and authenticate against one resolved bridge, then start
    /// the session and its heartbeat.
    async fn establish(
        &self,
        attempt: u64,
        cancel: &CancellationToken,
        ip: &str,
        bridge_id: &str,
        cached_key: Option<SecretString>,
    ) {
        // A late discovery result after disconnect must not open a
        // session.
        if self.inner.listener.lock().await.is_none() {
            return;
        }

        let _ = self.inner.state.send(ConnectionState::Connecting);
        let config = &self.inner.config;

        let client = match BridgeClient::new(ip, &config.transport) {
            Ok(client) => client,
            Err(e) => {
                error!(error = %e, "bridge client setup failed");
                self.fail(attempt, BridgeEvent::ConnectionError).await;
                return;
            }
        };
        info!(ip, "connecting to bridge");

        // Authenticate: verify the cached key, fall back to a single
        // registration attempt. The lights fetch doubles as key
        // verification and first snapshot.
        let (app_key, lights) = match authenticate(&client, cached_key, config).await {
            Ok(pair) => pair,
            Err(AuthFailure::NotAuthorized(e)) => {
                warn!(error = %e, "bridge not authenticated");
                self.fail(attempt, BridgeEvent::NotAuthenticated).await;
                return;
            }
            Err(AuthFailure::Connection(e)) => {
                error!(error = %e, "bridge connection failed");
                self.fail(attempt, BridgeEvent::ConnectionError).await;
                return;
            }
        };

        if cancel.is_cancelled() {
            debug!("connection attempt cancelled");
            return;
        }

        if let Err(e) = self
            .inner
            .directory
            .record_connected(bridge_id, ip, &app_key)
        {
            warn!(error = %e, "bridge cache update failed");
        }

        match client.get_config().await {
            Ok(info) => info!(bridge = %info.name, "connected to bridge"),
            Err(e) => debug!(error = %e, "bridge config fetch failed"),
        }

        // Session + heartbeat. The authentication fetch already produced
        // the initialized snapshot, so the session is immediately usable.
        debug!("starting heartbeat");
        let (lights_tx, lights_rx) = watch::channel(Arc::new(lights));
        let session_cancel = cancel.child_token();
        let session = BridgeHandle::new(
            client.clone(),
            app_key.clone(),
            lights_rx,
            session_cancel.clone(),
        );

        // Store the session and publish Connected atomically with respect
        // to teardown: a disconnect that landed during the awaits above
        // cancelled the attempt token and must not be undone here.
        {
            let mut slot = self.inner.session.lock().await;
            if cancel.is_cancelled() {
                debug!("connection attempt cancelled");
                return;
            }
            *slot = Some(session.clone());
            let _ = self.inner.state.send(ConnectionState::Connected);
        }

        let ctrl = self.clone();
        tokio::spawn(async move {
            ctrl.run_heartbeat(attempt, &client, &app_key, &lights_tx, &session_cancel)
                .await;
        });

        self.emit(attempt, BridgeEvent::Connected(session)).await;
    }

    // ── Heartbeat ────────────────────────────────────────────────

    /// Periodic background refresh of the bridge's light cache. Keeps
    /// the session's snapshot current; repeated failures are treated as
    /// a dropped link and reported once.
    async fn run_heartbeat(
        &self,
        attempt: u64,
        client: &BridgeClient,
        app_key: &SecretString,
        lights_tx: &watch::Sender<Arc<Lights>>,
        cancel: &CancellationToken,
    ) {
        let mut interval = tokio::time::interval(self.inner.config.heartbeat_interval);
        interval.tick().await; // the authentication fetch was the first snapshot
        let mut failures: u32 = 0;

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = interval.tick() => match client.list_lights(app_key).await {
                    Ok(lights) => {
                        failures = 0;
                        trace!(count = lights.len(), "light cache refreshed");
                        lights_tx.send_replace(Arc::new(lights));
                    }
                    Err(e) => {
                        failures += 1;
                        warn!(error = %e, failures, "heartbeat refresh failed");
                        if failures >= MAX_HEARTBEAT_FAILURES && self.is_current(attempt) {
                            error!("bridge connection lost");
                            self.teardown_session().await;
                            let _ = self.inner.state.send(ConnectionState::Idle);
                            self.emit(attempt, BridgeEvent::ConnectionError).await;
                            break;
                        }
                    }
                }
            }
        }
    }
}

// ── Authentication ───────────────────────────────────────────────

enum AuthFailure {
    /// Link button not pressed, or no way to obtain a key.
    NotAuthorized(huelink_api::Error),
    /// Transport-level failure while talking to the bridge.
    Connection(huelink_api::Error),
}

async fn authenticate(
    client: &BridgeClient,
    cached_key: Option<SecretString>,
    config: &SessionConfig,
) -> Result<(SecretString, Lights), AuthFailure> {
    if let Some(key) = cached_key {
        match client.list_lights(&key).await {
            Ok(lights) => {
                debug!("cached application key accepted");
                return Ok((key, lights));
            }
            Err(e) if e.is_unauthorized() => {
                debug!("cached application key is stale, re-registering");
            }
            Err(e) => return Err(AuthFailure::Connection(e)),
        }
    }

    let key = match client.register(&config.app_name, &config.device_name).await {
        Ok(key) => key,
        Err(e) if e.is_link_button_not_pressed() => return Err(AuthFailure::NotAuthorized(e)),
        Err(e) => return Err(AuthFailure::Connection(e)),
    };
    debug!("application registered with bridge");

    let lights = client
        .list_lights(&key)
        .await
        .map_err(AuthFailure::Connection)?;
    Ok((key, lights))
}
