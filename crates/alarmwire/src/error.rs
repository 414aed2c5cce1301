//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use alarmwire_config::ConfigError;
use alarmwire_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not reach the alarm server{}: {reason}", url_suffix(.url))]
    #[diagnostic(
        code(alarmwire::connection_failed),
        help(
            "Check that the alarm server is running and reachable.\n\
             Self-signed certificate? Try --insecure (-k) or set ca_cert in your profile."
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Push channel is not connected")]
    #[diagnostic(
        code(alarmwire::not_connected),
        help("The push channel is still retrying. Run with -v to see connection attempts.")
    )]
    NotConnected,

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(alarmwire::auth_failed),
        help(
            "Verify your bearer token.\n\
             Run: alarmwire config set-token --profile <name>\n\
             Or set ALARMWIRE_TOKEN."
        )
    )]
    AuthFailed { message: String },

    // ── Resources ────────────────────────────────────────────────────

    #[error("Alarm occurrence '{occurrence_id}' not found")]
    #[diagnostic(
        code(alarmwire::not_found),
        help("Run: alarmwire alarms list to see open alarms")
    )]
    NotFound { occurrence_id: String },

    // ── API ──────────────────────────────────────────────────────────

    #[error("API error ({code}): {message}")]
    #[diagnostic(code(alarmwire::api_error))]
    ApiError { code: String, message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(alarmwire::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(alarmwire::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: alarmwire config set origin <url> --profile {name}"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No alarm server configured")]
    #[diagnostic(
        code(alarmwire::no_config),
        help(
            "Pass --origin, --api-url or --push-url, or create a profile:\n\
             alarmwire config set origin https://scada.example.com\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("Keyring error: {message}")]
    #[diagnostic(
        code(alarmwire::keyring),
        help("Store the token in the profile's token_env variable instead.")
    )]
    Keyring { message: String },

    #[error(transparent)]
    #[diagnostic(code(alarmwire::config))]
    Config(Box<ConfigError>),

    // ── Interactive ──────────────────────────────────────────────────

    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(alarmwire::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Timeout ──────────────────────────────────────────────────────

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(alarmwire::timeout),
        help("Increase timeout with --timeout or check server responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── IO ───────────────────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn url_suffix(url: &str) -> String {
    if url.is_empty() {
        String::new()
    } else {
        format!(" at {url}")
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::NotConnected => exit_code::CONNECTION,
            Self::AuthFailed { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed { url, reason },
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },
            CoreError::NotConnected => CliError::NotConnected,
            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },
            CoreError::OccurrenceNotFound { occurrence_id } => CliError::NotFound {
                occurrence_id: occurrence_id.to_string(),
            },
            CoreError::InvalidPayload { message } => CliError::ApiError {
                code: "invalid_payload".into(),
                message,
            },
            CoreError::Api { message, status } => CliError::ApiError {
                code: status.map_or_else(|| "unknown".into(), |s| s.to_string()),
                message,
            },
            CoreError::Config { message } => CliError::Validation {
                field: "endpoint".into(),
                reason: message,
            },
            CoreError::AlreadyInitialized => CliError::ApiError {
                code: "internal".into(),
                message: "alarm monitor started twice".into(),
            },
            CoreError::Internal(message) => CliError::ApiError {
                code: "internal".into(),
                message,
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::Keyring(message) => CliError::Keyring { message },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config(Box::new(other)),
        }
    }
}
