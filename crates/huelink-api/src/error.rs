use thiserror::Error;

/// CLIP error type for "unauthorized user".
const CLIP_UNAUTHORIZED: i32 = 1;
/// CLIP error type for "link button not pressed".
const CLIP_LINK_BUTTON_NOT_PRESSED: i32 = 101;
/// CLIP error type for "internal error" — the bridge sheds queued state
/// updates under load and reports the dropped request with this code.
const CLIP_INTERNAL_ERROR: i32 = 901;

/// Top-level error type for the `huelink-api` crate.
///
/// Covers every failure mode across all bridge surfaces: portal discovery,
/// registration, the lights resource, and the known-bridge cache.
/// `huelink-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Non-success HTTP status outside the CLIP error envelope.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    // ── CLIP API ────────────────────────────────────────────────────
    /// Structured error from the bridge (parsed from the
    /// `[{"error": {"type", "address", "description"}}]` envelope).
    #[error("Bridge error {error_type} at {address}: {description}")]
    Clip {
        error_type: i32,
        address: String,
        description: String,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Bridge cache ────────────────────────────────────────────────
    /// The known-bridge cache file could not be read or written.
    #[error("Bridge cache error: {0}")]
    Cache(String),
}

impl Error {
    /// Returns `true` if the bridge rejected the request because the
    /// link button has not been pressed during registration.
    pub fn is_link_button_not_pressed(&self) -> bool {
        matches!(
            self,
            Self::Clip {
                error_type: CLIP_LINK_BUTTON_NOT_PRESSED,
                ..
            }
        )
    }

    /// Returns `true` if the application key was rejected (stale or
    /// never whitelisted).
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::Clip {
                error_type: CLIP_UNAUTHORIZED,
                ..
            }
        )
    }

    /// Returns `true` for a cancellation outcome: the bridge aborted the
    /// request before applying it (queue shedding under a flood of state
    /// updates, or HTTP 503). Requests with this outcome are safe to
    /// reissue with the identical payload.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Clip {
                error_type: CLIP_INTERNAL_ERROR,
                ..
            } | Self::Http { status: 503, .. }
        )
    }
}
