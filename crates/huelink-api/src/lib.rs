//! Async Rust client for the Philips Hue bridge's CLIP v1 API.
//!
//! This crate is the device-communication layer of the huelink workspace.
//! It owns every wire concern — portal discovery, application
//! registration, the lights resource, partial state updates, and the
//! persisted known-bridge cache — and exposes them as plain async
//! methods. Lifecycle sequencing (discovery vs. cache, heartbeat,
//! retries) lives in `huelink-core`.
//!
//! - **[`BridgeDiscovery`]** — portal-based search for bridges on the
//!   local network; one terminal outcome per call.
//! - **[`BridgeClient`]** — the CLIP v1 client for one bridge:
//!   [`register()`](BridgeClient::register),
//!   [`list_lights()`](BridgeClient::list_lights),
//!   [`set_light_state()`](BridgeClient::set_light_state).
//! - **[`BridgeDirectory`]** — JSON cache of previously connected
//!   bridges (address, unique id, last-connected timestamp, app key).
//! - **[`Error`]** — unified error type with CLIP-aware classification
//!   helpers (`is_link_button_not_pressed`, `is_unauthorized`,
//!   `is_cancelled`).

pub mod client;
pub mod directory;
pub mod discovery;
pub mod error;
pub mod models;
pub mod transport;

pub use client::BridgeClient;
pub use directory::{BridgeDirectory, KnownBridge};
pub use discovery::{BridgeDiscovery, DEFAULT_DISCOVERY_ENDPOINT};
pub use error::Error;
pub use models::{BridgeConfig, DiscoveredBridge, Light, LightState, Lights, StateUpdate};
pub use transport::TransportConfig;
