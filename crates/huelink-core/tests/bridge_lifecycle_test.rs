#![allow(clippy::unwrap_used)]
// Integration tests for the bridge connection lifecycle using wiremock.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::timeout;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use huelink_api::BridgeDirectory;
use huelink_core::{BridgeController, BridgeEvent, ConnectionState, SessionConfig};

// ── Helpers ─────────────────────────────────────────────────────────

fn config(dir: &tempfile::TempDir, discovery: &MockServer) -> SessionConfig {
    SessionConfig::new("Hue Link", "wrist")
        .with_cache_path(dir.path().join("known_bridges.json"))
        .with_discovery_endpoint(Url::parse(&discovery.uri()).unwrap())
}

fn seed_cache(config: &SessionConfig, bridge_id: &str, address: &str, key: &str) {
    BridgeDirectory::new(&config.cache_path)
        .record_connected(bridge_id, address, &SecretString::from(key))
        .unwrap();
}

fn lights_body() -> serde_json::Value {
    json!({
        "1": {
            "name": "Desk",
            "modelid": "LCT010",
            "swversion": "1.46.13",
            "state": { "on": true, "bri": 200, "reachable": true }
        }
    })
}

fn clip_error(error_type: i32, description: &str) -> serde_json::Value {
    json!([{
        "error": { "type": error_type, "address": "/", "description": description }
    }])
}

async fn mock_lights(server: &MockServer, key: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/api/{key}/lights")))
        .respond_with(ResponseTemplate::new(200).set_body_json(lights_body()))
        .mount(server)
        .await;
}

async fn mock_register(server: &MockServer, username: &str) {
    Mock::given(method("POST"))
        .and(path("/api/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "success": { "username": username } }
        ])))
        .mount(server)
        .await;
}

async fn next_event(rx: &mut mpsc::Receiver<BridgeEvent>) -> BridgeEvent {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for bridge event")
        .expect("event channel closed")
}

/// Assert nothing further arrives within `window` — neither an event
/// nor anything after the channel closes.
async fn assert_no_event(rx: &mut mpsc::Receiver<BridgeEvent>, window: Duration) {
    let res = timeout(window, rx.recv()).await;
    assert!(matches!(res, Err(_) | Ok(None)), "unexpected event: {res:?}");
}

// ── Cached bridge ───────────────────────────────────────────────────

#[tokio::test]
async fn cached_bridge_connects_without_discovery() {
    let bridge = MockServer::start().await;
    let discovery = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    let config = config(&dir, &discovery);
    seed_cache(&config, "BRIDGE-1", &bridge.address().to_string(), "cached-key");
    mock_lights(&bridge, "cached-key").await;

    let controller = BridgeController::new(config);
    let (tx, mut rx) = mpsc::channel(8);
    controller.connect(tx).await;

    let event = next_event(&mut rx).await;
    let BridgeEvent::Connected(session) = event else {
        panic!("expected Connected, got: {event:?}");
    };

    // The authentication fetch doubles as the initial snapshot.
    let lights = session.lights_snapshot();
    assert_eq!(lights.len(), 1);
    assert!(lights["1"].state.on);

    // The discovery portal was never consulted.
    assert!(discovery.received_requests().await.unwrap().is_empty());
    assert_eq!(*controller.state().borrow(), ConnectionState::Connected);
}

#[tokio::test]
async fn stale_cached_key_falls_back_to_registration() {
    let bridge = MockServer::start().await;
    let discovery = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    let config = config(&dir, &discovery);
    let cache_path = config.cache_path.clone();
    seed_cache(&config, "BRIDGE-1", &bridge.address().to_string(), "stale-key");

    Mock::given(method("GET"))
        .and(path("/api/stale-key/lights"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(clip_error(1, "unauthorized user")),
        )
        .mount(&bridge)
        .await;
    mock_register(&bridge, "fresh-key").await;
    mock_lights(&bridge, "fresh-key").await;

    let controller = BridgeController::new(config);
    let (tx, mut rx) = mpsc::channel(8);
    controller.connect(tx).await;

    let event = next_event(&mut rx).await;
    assert!(matches!(event, BridgeEvent::Connected(_)), "got: {event:?}");

    // The fresh key replaced the stale one in the cache.
    let cached = BridgeDirectory::new(cache_path)
        .find("BRIDGE-1")
        .unwrap()
        .unwrap();
    assert_eq!(cached.app_key.unwrap().expose_secret(), "fresh-key");
}

// ── Discovery ───────────────────────────────────────────────────────

#[tokio::test]
async fn discovery_uses_first_candidate_and_registers() {
    let bridge = MockServer::start().await;
    let discovery = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir, &discovery);
    let cache_path = config.cache_path.clone();

    // Two candidates; only the first may be contacted.
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "BRIDGE-A", "internalipaddress": bridge.address().to_string() },
            { "id": "BRIDGE-B", "internalipaddress": "127.0.0.1:1" }
        ])))
        .mount(&discovery)
        .await;
    mock_register(&bridge, "new-key").await;
    mock_lights(&bridge, "new-key").await;

    let controller = BridgeController::new(config);
    let (tx, mut rx) = mpsc::channel(8);
    controller.connect(tx).await;

    let event = next_event(&mut rx).await;
    assert!(matches!(event, BridgeEvent::Connected(_)), "got: {event:?}");

    // The first candidate was recorded; the second was never touched.
    let directory = BridgeDirectory::new(cache_path);
    assert!(directory.find("BRIDGE-A").unwrap().is_some());
    assert!(directory.find("BRIDGE-B").unwrap().is_none());
}

#[tokio::test]
async fn cached_bridge_without_address_falls_back_to_discovery() {
    let bridge = MockServer::start().await;
    let discovery = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir, &discovery);

    // A bridge seen before but never reached directly: no address, but a
    // usable application key.
    std::fs::write(
        &config.cache_path,
        json!([{
            "unique_id": "BRIDGE-1",
            "ip_address": "",
            "last_connected": "2026-08-01T00:00:00Z",
            "app_key": "cached-key"
        }])
        .to_string(),
    )
    .unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "BRIDGE-1", "internalipaddress": bridge.address().to_string() }
        ])))
        .expect(1)
        .mount(&discovery)
        .await;
    mock_lights(&bridge, "cached-key").await;

    let controller = BridgeController::new(config);
    let (tx, mut rx) = mpsc::channel(8);
    controller.connect(tx).await;

    let event = next_event(&mut rx).await;
    assert!(matches!(event, BridgeEvent::Connected(_)), "got: {event:?}");

    // The key cached under the discovered bridge's id was reused, so no
    // registration happened.
    assert!(
        !bridge
            .received_requests()
            .await
            .unwrap()
            .iter()
            .any(|r| r.url.path() == "/api/")
    );
}

#[tokio::test]
async fn empty_discovery_reports_no_bridges_once() {
    let discovery = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&discovery)
        .await;

    let controller = BridgeController::new(config(&dir, &discovery));
    let (tx, mut rx) = mpsc::channel(8);
    controller.connect(tx).await;

    let event = next_event(&mut rx).await;
    assert!(matches!(event, BridgeEvent::NoBridgesFound), "got: {event:?}");

    // Exactly one terminal event per attempt.
    assert_no_event(&mut rx, Duration::from_millis(200)).await;
    assert_eq!(*controller.state().borrow(), ConnectionState::Idle);
}

#[tokio::test]
async fn discovery_failure_reports_connection_error() {
    let discovery = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&discovery)
        .await;

    let controller = BridgeController::new(config(&dir, &discovery));
    let (tx, mut rx) = mpsc::channel(8);
    controller.connect(tx).await;

    let event = next_event(&mut rx).await;
    assert!(matches!(event, BridgeEvent::ConnectionError), "got: {event:?}");
}

// ── Authentication ──────────────────────────────────────────────────

#[tokio::test]
async fn link_button_not_pressed_reports_not_authenticated() {
    let bridge = MockServer::start().await;
    let discovery = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "BRIDGE-A", "internalipaddress": bridge.address().to_string() }
        ])))
        .mount(&discovery)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(clip_error(101, "link button not pressed")),
        )
        .mount(&bridge)
        .await;

    let controller = BridgeController::new(config(&dir, &discovery));
    let (tx, mut rx) = mpsc::channel(8);
    controller.connect(tx).await;

    let event = next_event(&mut rx).await;
    assert!(matches!(event, BridgeEvent::NotAuthenticated), "got: {event:?}");
}

// ── Heartbeat ───────────────────────────────────────────────────────

#[tokio::test]
async fn repeated_heartbeat_failures_tear_down_session() {
    let bridge = MockServer::start().await;
    let discovery = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    let config = config(&dir, &discovery)
        .with_heartbeat_interval(Duration::from_millis(50));
    seed_cache(&config, "BRIDGE-1", &bridge.address().to_string(), "cached-key");

    // The first lights fetch (authentication) succeeds; every heartbeat
    // after it fails.
    Mock::given(method("GET"))
        .and(path("/api/cached-key/lights"))
        .respond_with(ResponseTemplate::new(200).set_body_json(lights_body()))
        .up_to_n_times(1)
        .mount(&bridge)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/cached-key/lights"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&bridge)
        .await;

    let controller = BridgeController::new(config);
    let (tx, mut rx) = mpsc::channel(8);
    controller.connect(tx).await;

    let event = next_event(&mut rx).await;
    assert!(matches!(event, BridgeEvent::Connected(_)), "got: {event:?}");

    // Three consecutive failures drop the link and report it once.
    let event = next_event(&mut rx).await;
    assert!(matches!(event, BridgeEvent::ConnectionError), "got: {event:?}");
    assert_no_event(&mut rx, Duration::from_millis(300)).await;

    assert!(controller.session().await.is_none());
    assert_eq!(*controller.state().borrow(), ConnectionState::Idle);
}

// ── Disconnect ──────────────────────────────────────────────────────

#[tokio::test]
async fn disconnect_is_idempotent() {
    let bridge = MockServer::start().await;
    let discovery = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    let config = config(&dir, &discovery);
    seed_cache(&config, "BRIDGE-1", &bridge.address().to_string(), "cached-key");
    mock_lights(&bridge, "cached-key").await;

    let controller = BridgeController::new(config);
    let (tx, mut rx) = mpsc::channel(8);
    controller.connect(tx).await;
    let event = next_event(&mut rx).await;
    assert!(matches!(event, BridgeEvent::Connected(_)), "got: {event:?}");

    controller.disconnect().await;
    controller.disconnect().await;

    assert!(controller.session().await.is_none());
    assert_eq!(*controller.state().borrow(), ConnectionState::Idle);
}

#[tokio::test]
async fn disconnect_during_connect_does_not_resurrect_session() {
    let bridge = MockServer::start().await;
    let discovery = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    let config = config(&dir, &discovery);
    seed_cache(&config, "BRIDGE-1", &bridge.address().to_string(), "cached-key");
    mock_lights(&bridge, "cached-key").await;

    // The config fetch answers slowly; disconnect lands while the
    // connect attempt is parked on it.
    Mock::given(method("GET"))
        .and(path("/api/config"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "name": "Living room bridge" }))
                .set_delay(Duration::from_millis(400)),
        )
        .mount(&bridge)
        .await;

    let controller = BridgeController::new(config);
    let (tx, mut rx) = mpsc::channel(8);
    controller.connect(tx).await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    controller.disconnect().await;

    // Let the parked attempt finish: it must not store a session, flip
    // the state watch, or emit anything.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(controller.session().await.is_none());
    assert_eq!(*controller.state().borrow(), ConnectionState::Idle);
    assert_no_event(&mut rx, Duration::from_millis(100)).await;
}

#[tokio::test]
async fn disconnect_aborts_inflight_discovery() {
    let bridge = MockServer::start().await;
    let discovery = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    // Discovery answers slowly; disconnect lands while it is in flight.
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([
                    { "id": "BRIDGE-A", "internalipaddress": bridge.address().to_string() }
                ]))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&discovery)
        .await;

    let controller = BridgeController::new(config(&dir, &discovery));
    let (tx, mut rx) = mpsc::channel(8);
    controller.connect(tx).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    controller.disconnect().await;

    // The aborted attempt emits nothing and never contacts the bridge.
    assert_no_event(&mut rx, Duration::from_millis(600)).await;
    assert!(bridge.received_requests().await.unwrap().is_empty());
}
