// Light synchronization engine
//
// Fans one color or brightness change out to every powered-on light of
// the active session. Updates are fire-and-forget: failures are logged,
// never propagated, and a shed update (the bridge's queue was full) is
// retried with the same payload until it lands or the retry cap trips.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use huelink_api::{Light, StateUpdate};

use crate::bridge::BridgeHandle;
use crate::color::{Rgb, gamut_for_model};
use crate::config::SessionConfig;

/// Retry cap for updates the bridge sheds under load.
const MAX_UPDATE_RETRIES: u32 = 8;
const RETRY_DELAY: Duration = Duration::from_millis(50);

/// Streams state changes to the lights of one session.
///
/// All methods are synchronous and non-blocking — each affected light
/// gets its own background task. Dropping the controller does not stop
/// in-flight updates; session teardown does, via the cancel token.
pub struct LightsController {
    session: BridgeHandle,
    transition_time: u16,
    cancel: CancellationToken,
}

impl LightsController {
    pub fn new(session: BridgeHandle, config: &SessionConfig) -> Self {
        let cancel = session.cancel_token().child_token();
        Self {
            session,
            transition_time: config.transition_time,
            cancel,
        }
    }

    /// Push `color` to every powered-on light, converted per light into
    /// its model's gamut.
    pub fn set_color(&self, color: Rgb) {
        trace!(?color, "setting color");
        let transition_time = self.transition_time;

        self.update_lights(move |light: &Light| StateUpdate {
            xy: Some(
                gamut_for_model(&light.model_id, &light.sw_version)
                    .xy_from_rgb(color)
                    .into(),
            ),
            transition_time: Some(transition_time),
            ..StateUpdate::default()
        });
    }

    /// Push `brightness` to every powered-on light, unchanged — no
    /// per-model conversion applies to brightness.
    pub fn set_brightness(&self, brightness: u8) {
        debug!(brightness, "setting brightness");
        let transition_time = self.transition_time;

        self.update_lights(move |_: &Light| StateUpdate {
            bri: Some(brightness),
            transition_time: Some(transition_time),
            ..StateUpdate::default()
        });
    }

    /// Issue one immutable update per powered-on light from the current
    /// snapshot. Powered-off lights are skipped entirely.
    fn update_lights(&self, build: impl Fn(&Light) -> StateUpdate) {
        let lights = self.session.lights_snapshot();

        for (id, light) in lights.iter().filter(|(_, l)| l.state.on) {
            let update = build(light);
            let session = self.session.clone();
            let light_id = id.clone();
            let cancel = self.cancel.clone();

            tokio::spawn(async move {
                apply_update(&session, &light_id, &update, &cancel).await;
            });
        }
    }
}

/// Deliver one update to one light, retrying shed requests with the
/// exact same payload. Later updates for the same light are independent
/// tasks — the bridge applies whichever lands last.
async fn apply_update(
    session: &BridgeHandle,
    light_id: &str,
    update: &StateUpdate,
    cancel: &CancellationToken,
) {
    let mut attempts: u32 = 0;

    loop {
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            res = session
                .client()
                .set_light_state(session.app_key(), light_id, update) => res,
        };

        match result {
            Ok(()) => return,
            Err(e) if e.is_cancelled() => {
                attempts += 1;
                if attempts >= MAX_UPDATE_RETRIES {
                    warn!(light = %light_id, attempts, "light update kept being shed, giving up");
                    return;
                }

                trace!(light = %light_id, "light update shed by bridge, retrying");
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return,
                    () = tokio::time::sleep(RETRY_DELAY) => {}
                }
            }
            Err(e) => {
                error!(light = %light_id, error = %e, "light update failed");
                return;
            }
        }
    }
}
