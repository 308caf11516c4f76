//! Session, connection, and light-sync logic for Hue bridges.
//!
//! This crate layers the stateful parts of a Hue integration on top of
//! [`huelink_api`]'s stateless HTTP surface:
//!
//! - [`BridgeController`] — the connection state machine: cache lookup,
//!   discovery, registration, heartbeat, teardown.
//! - [`LightsController`] — rate-limited color/brightness fan-out to
//!   powered-on lights, with per-model gamut conversion.
//! - [`HueController`] — the start/stop facade composing the two.
//! - [`ColorSampler`] — throttled palette sampling for pointer-driven
//!   color picking.
//!
//! Consumers talk to [`HueController`] and receive [`SessionEvent`]s on
//! an `mpsc` channel; the lower-level controllers are exported for
//! callers that need finer control.

pub mod bridge;
pub mod color;
pub mod config;
pub mod error;
pub mod lights;
pub mod sampler;
pub mod session;

pub use bridge::{BridgeController, BridgeEvent, BridgeHandle, ConnectionState};
pub use color::{Gamut, Rgb, XyPoint, gamut_for_model};
pub use config::{HEARTBEAT_INTERVAL, MIN_UPDATE_INTERVAL, SessionConfig, TRANSITION_TIME};
pub use error::CoreError;
pub use lights::LightsController;
pub use sampler::{ColorSampler, DisplayTransform, PaletteImage};
pub use session::{HueController, SessionEvent};
