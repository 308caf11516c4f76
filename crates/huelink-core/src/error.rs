// Core error types
//
// User-facing errors from huelink-core. These are NOT wire-specific --
// consumers never see HTTP status codes or CLIP error numbers directly.
// The `From<huelink_api::Error>` impl translates device-layer errors
// into domain-appropriate variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection lifecycle ─────────────────────────────────────────
    #[error("No bridges found on the network")]
    NoBridgesFound,

    #[error("Bridge reachable but not authorized: {message}")]
    NotAuthenticated { message: String },

    #[error("Bridge connection failed: {reason}")]
    ConnectionFailed { reason: String },

    #[error("No active bridge session")]
    Disconnected,

    // ── Local state ──────────────────────────────────────────────────
    #[error("Bridge cache error: {message}")]
    Cache { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl From<huelink_api::Error> for CoreError {
    fn from(err: huelink_api::Error) -> Self {
        if err.is_link_button_not_pressed() || err.is_unauthorized() {
            return CoreError::NotAuthenticated {
                message: err.to_string(),
            };
        }

        match err {
            huelink_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            huelink_api::Error::Cache(message) => CoreError::Cache { message },
            other => CoreError::ConnectionFailed {
                reason: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(error_type: i32) -> huelink_api::Error {
        huelink_api::Error::Clip {
            error_type,
            address: "/".into(),
            description: "test".into(),
        }
    }

    #[test]
    fn authorization_failures_map_to_not_authenticated() {
        assert!(matches!(
            CoreError::from(clip(101)),
            CoreError::NotAuthenticated { .. }
        ));
        assert!(matches!(
            CoreError::from(clip(1)),
            CoreError::NotAuthenticated { .. }
        ));
    }

    #[test]
    fn other_device_errors_map_to_connection_failed() {
        assert!(matches!(
            CoreError::from(clip(901)),
            CoreError::ConnectionFailed { .. }
        ));
        assert!(matches!(
            CoreError::from(huelink_api::Error::Http {
                status: 500,
                message: String::new()
            }),
            CoreError::ConnectionFailed { .. }
        ));
    }
}
