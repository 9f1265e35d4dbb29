use thiserror::Error;

/// Top-level error type for the `afero-api` crate.
///
/// Covers every failure mode of the Afero cloud surface: token rejection,
/// transport, retry exhaustion, and payload rejection. `afero-core` maps
/// these into its own domain taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The bearer token was rejected (HTTP 401). Re-authentication is
    /// required before any further request can succeed.
    #[error("Authentication rejected: {message}")]
    InvalidAuth { message: String },

    /// The token is valid but not allowed to touch this resource (HTTP 403).
    #[error("Forbidden: {url}")]
    Forbidden { url: String },

    /// No account is associated with the token.
    #[error("No account access found for the current token")]
    MissingAccount,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS or HTTP client construction error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// The cloud kept answering 429/503 until the retry budget ran out.
    #[error("Exceeded maximum number of retries ({attempts}) for {url}")]
    RetriesExhausted { attempts: u32, url: String },

    // ── Payload ─────────────────────────────────────────────────────
    /// The cloud refused a state write (HTTP 400).
    #[error("Invalid payload rejected with HTTP {status}: {message}")]
    InvalidPayload { status: u16, message: String },

    /// Any other non-success status.
    #[error("Unexpected HTTP {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the token is no longer accepted.
    pub fn is_auth_invalid(&self) -> bool {
        matches!(self, Self::InvalidAuth { .. })
    }

    /// Returns `true` if this is a transient error worth retrying on a
    /// later poll.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::RetriesExhausted { .. } => true,
            _ => false,
        }
    }
}
