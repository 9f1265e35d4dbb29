//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use afero_config::ConfigError;
use afero_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const PERMISSION: i32 = 5;
    pub const REJECTED: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const THROTTLED: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not reach the Afero cloud at {url}")]
    #[diagnostic(
        code(afero::connection_failed),
        help("Check your network connection, or the profile's api_base override.\nReason: {reason}")
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Gave up after {attempts} throttled attempts")]
    #[diagnostic(
        code(afero::throttled),
        help("The cloud is rate limiting this account. Raise --interval and try again later.")
    )]
    Throttled { attempts: u32 },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Token rejected by the Afero cloud")]
    #[diagnostic(
        code(afero::auth_invalid),
        help(
            "Obtain a fresh token and store it with:\n  \
             afero config set-token <TOKEN> --profile {profile}\n\
             Or pass it with --token / AFERO_TOKEN."
        )
    )]
    AuthInvalid { profile: String },

    #[error("No token configured for profile '{profile}'")]
    #[diagnostic(
        code(afero::no_credentials),
        help(
            "Store one with: afero config set-token <TOKEN> --profile {profile}\n\
             Or set AFERO_TOKEN."
        )
    )]
    NoCredentials { profile: String },

    #[error("Access forbidden: {url}")]
    #[diagnostic(code(afero::forbidden))]
    Forbidden { url: String },

    // ── Devices ──────────────────────────────────────────────────────

    #[error("Device '{device_id}' not found")]
    #[diagnostic(
        code(afero::not_found),
        help("Run: afero devices  to see tracked devices")
    )]
    DeviceNotFound { device_id: String },

    #[error("Write to '{device_id}' was rejected and rolled back")]
    #[diagnostic(
        code(afero::rolled_back),
        help("The cloud refused the value. Check the function class, instance and value.")
    )]
    RolledBack { device_id: String },

    // ── API ──────────────────────────────────────────────────────────

    #[error("Payload rejected by the cloud: {message}")]
    #[diagnostic(code(afero::invalid_payload))]
    InvalidPayload { message: String },

    #[error("API error: {message}")]
    #[diagnostic(code(afero::api_error))]
    ApiError { message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(afero::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(afero::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: afero config add-profile {name}"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error(transparent)]
    #[diagnostic(code(afero::config))]
    Config(Box<figment::Error>),

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render output: {0}")]
    #[diagnostic(code(afero::render))]
    Render(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Throttled { .. } => exit_code::THROTTLED,
            Self::AuthInvalid { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::Forbidden { .. } => exit_code::PERMISSION,
            Self::DeviceNotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::RolledBack { .. } | Self::InvalidPayload { .. } => exit_code::REJECTED,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    /// Fill in the active profile name for auth errors raised below the CLI.
    pub fn with_profile(self, profile: &str) -> Self {
        match self {
            Self::AuthInvalid { .. } => Self::AuthInvalid {
                profile: profile.into(),
            },
            other => other,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::DeviceNotFound { device_id } => CliError::DeviceNotFound { device_id },

            CoreError::UnsupportedValue {
                device_id,
                field,
                value,
            } => CliError::Validation {
                field,
                reason: format!("'{value}' is not supported by {device_id}"),
            },

            CoreError::RetriesExhausted { attempts } => CliError::Throttled { attempts },

            CoreError::AuthInvalid { message: _ } => CliError::AuthInvalid {
                profile: "current".into(),
            },

            CoreError::InvalidPayload { message } => CliError::InvalidPayload { message },

            CoreError::Forbidden { url } => CliError::Forbidden { url },

            CoreError::ConnectionFailed { url, reason } => {
                CliError::ConnectionFailed { url, reason }
            }

            CoreError::Api { message, .. } => CliError::ApiError { message },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::ApiError { message },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::UnknownProfile { profile } => CliError::ProfileNotFound {
                name: profile,
                available: String::new(),
            },
            ConfigError::Serialization(e) => CliError::Render(e.to_string()),
            ConfigError::Figment(e) => CliError::Config(e),
            ConfigError::Io(e) => CliError::Io(e),
        }
    }
}
