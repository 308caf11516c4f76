//! Wire types for the CLIP v1 API and the discovery portal.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ── Discovery ───────────────────────────────────────────────────────

/// One bridge candidate reported by the discovery portal.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveredBridge {
    /// Bridge unique id (serial-derived, e.g. `001788fffe23a1b2`).
    pub id: String,
    /// LAN address the bridge is reachable on.
    #[serde(rename = "internalipaddress")]
    pub internal_ip_address: String,
}

// ── Bridge configuration ────────────────────────────────────────────

/// Unauthenticated subset of the bridge configuration resource.
///
/// `GET /api/config` works without an application key and is used for
/// logging and identification during connect.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    pub name: String,
    #[serde(rename = "bridgeid", default)]
    pub bridge_id: Option<String>,
    #[serde(rename = "swversion", default)]
    pub sw_version: Option<String>,
    #[serde(rename = "apiversion", default)]
    pub api_version: Option<String>,
}

// ── Lights ──────────────────────────────────────────────────────────

/// Live state of one light as cached by the bridge.
#[derive(Debug, Clone, Deserialize)]
pub struct LightState {
    pub on: bool,
    #[serde(default)]
    pub bri: u8,
    #[serde(default)]
    pub reachable: bool,
}

/// One light fixture exposed by the bridge.
#[derive(Debug, Clone, Deserialize)]
pub struct Light {
    pub name: String,
    pub state: LightState,
    /// Hardware model, keys the supported color gamut (e.g. `LCT010`).
    #[serde(rename = "modelid")]
    pub model_id: String,
    #[serde(rename = "swversion", default)]
    pub sw_version: String,
    #[serde(rename = "uniqueid", default)]
    pub unique_id: Option<String>,
}

/// The full lights resource: CLIP id -> light.
pub type Lights = HashMap<String, Light>;

// ── State updates ───────────────────────────────────────────────────

/// A partial state update for one light.
///
/// Unset fields are omitted from the serialized body, so the bridge
/// leaves the corresponding attributes untouched — a brightness-only
/// update keeps the previously set color.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct StateUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bri: Option<u8>,
    /// Chromaticity point in the light's own gamut.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xy: Option<[f64; 2]>,
    /// Fade duration in device ticks (1 tick = 100 ms).
    #[serde(rename = "transitiontime", skip_serializing_if = "Option::is_none")]
    pub transition_time: Option<u16>,
}
