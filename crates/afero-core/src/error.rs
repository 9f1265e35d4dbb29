// ── Core error types ──
//
// Domain errors from afero-core. Consumers never see HTTP status codes
// or JSON parse failures directly; the `From<afero_api::Error>` impl
// translates transport-layer errors into domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Device errors ────────────────────────────────────────────────
    /// The id is not tracked by the addressed controller (or by any
    /// controller, when raised by the bridge). No I/O was attempted.
    #[error("Device not found: {device_id}")]
    DeviceNotFound { device_id: String },

    /// The device does not advertise `value` for `field`. No I/O was
    /// attempted.
    #[error("Device {device_id} does not support {field} '{value}'")]
    UnsupportedValue {
        device_id: String,
        field: String,
        value: String,
    },

    // ── Transport errors ─────────────────────────────────────────────
    #[error("Exceeded maximum number of retries ({attempts})")]
    RetriesExhausted { attempts: u32 },

    #[error("Authentication no longer valid: {message}")]
    AuthInvalid { message: String },

    #[error("Payload rejected by the cloud: {message}")]
    InvalidPayload { message: String },

    #[error("Access forbidden: {url}")]
    Forbidden { url: String },

    #[error("Cannot reach the Afero cloud at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Returns `true` when the token must be replaced before any further
    /// request can succeed.
    pub fn is_auth_invalid(&self) -> bool {
        matches!(self, Self::AuthInvalid { .. })
    }

    pub(crate) fn not_found(device_id: &str) -> Self {
        Self::DeviceNotFound {
            device_id: device_id.to_owned(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<afero_api::Error> for CoreError {
    fn from(err: afero_api::Error) -> Self {
        match err {
            afero_api::Error::InvalidAuth { message } => CoreError::AuthInvalid { message },
            afero_api::Error::MissingAccount => CoreError::AuthInvalid {
                message: "no account is associated with this token".into(),
            },
            afero_api::Error::Forbidden { url } => CoreError::Forbidden { url },
            afero_api::Error::RetriesExhausted { attempts, .. } => {
                CoreError::RetriesExhausted { attempts }
            }
            afero_api::Error::InvalidPayload { message, .. } => {
                CoreError::InvalidPayload { message }
            }
            afero_api::Error::UnexpectedStatus { status, url } => CoreError::Api {
                message: format!("unexpected HTTP {status} from {url}"),
                status: Some(status),
            },
            afero_api::Error::Transport(ref e) => {
                if e.is_connect() || e.is_timeout() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map(ToString::to_string)
                            .unwrap_or_else(|| "<unknown>".into()),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            afero_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            afero_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            afero_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_map_to_auth_invalid() {
        let err = CoreError::from(afero_api::Error::InvalidAuth {
            message: "expired".into(),
        });
        assert!(err.is_auth_invalid());
    }

    #[test]
    fn rejected_write_maps_to_invalid_payload() {
        let err = CoreError::from(afero_api::Error::InvalidPayload {
            status: 400,
            message: "bad".into(),
        });
        assert!(matches!(err, CoreError::InvalidPayload { .. }));
    }
}
