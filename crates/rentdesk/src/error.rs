//! CLI error types with miette diagnostics.
//!
//! Config, cache and HTTP failures map into user-facing errors with
//! actionable help text and a stable exit code.

use miette::Diagnostic;
use thiserror::Error;

use rentdesk_cache::CacheError;
use rentdesk_config::ConfigError;

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

    #[error("Could not reach the API at {url}: {reason}")]
    #[diagnostic(
        code(rentdesk::connection_failed),
        help("Check api.base_url in your config and that the API is running.")
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Request to {url} timed out")]
    #[diagnostic(
        code(rentdesk::timeout),
        help("Increase api.timeout in your config or check API responsiveness.")
    )]
    Timeout { url: String },

    #[error("API returned {status} for {url}")]
    #[diagnostic(code(rentdesk::api_error))]
    Api { url: String, status: u16 },

    // ── Authentication ───────────────────────────────────────────────

    #[error("No API token configured")]
    #[diagnostic(
        code(rentdesk::no_credentials),
        help(
            "Export ${env}, or set api.token in the config file.\n\
             Run: rentdesk config path"
        )
    )]
    NoCredentials { env: String },

    #[error("Authentication failed for {url}")]
    #[diagnostic(code(rentdesk::auth_failed), help("Verify the API token."))]
    AuthFailed { url: String },

    // ── Resources ────────────────────────────────────────────────────

    #[error("Cache slot '{slot}' not found")]
    #[diagnostic(
        code(rentdesk::unknown_slot),
        help("Configured slots: {available}")
    )]
    UnknownSlot { slot: String, available: String },

    #[error("Column '{column}' not found in grid definition")]
    #[diagnostic(code(rentdesk::unknown_column), help("Defined columns: {available}"))]
    UnknownColumn { column: String, available: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(rentdesk::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Configuration file already exists")]
    #[diagnostic(
        code(rentdesk::config_exists),
        help("Use --force to overwrite: {path}")
    )]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(code(rentdesk::config))]
    Config(ConfigError),

    // ── Cache / Grid ─────────────────────────────────────────────────

    #[error(transparent)]
    #[diagnostic(code(rentdesk::cache))]
    Cache(CacheError),

    #[error(transparent)]
    #[diagnostic(code(rentdesk::grid))]
    Grid(#[from] rentdesk_grid::GridConfigError),

    #[error(transparent)]
    #[diagnostic(code(rentdesk::export))]
    Export(#[from] rentdesk_grid::ExportError),

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(rentdesk::json), help("Rows must be a JSON array of objects."))]
    Json(#[from] serde_json::Error),

    #[error("Invalid grid definition: {0}")]
    #[diagnostic(
        code(rentdesk::grid_definition),
        help("Declare columns as [[columns]] tables with at least `key` and `label`.")
    )]
    GridDefinition(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    #[diagnostic(code(rentdesk::toml))]
    TomlSer(#[from] toml::ser::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::NoCredentials { .. } | Self::AuthFailed { .. } => exit_code::AUTH,
            Self::UnknownSlot { .. } | Self::UnknownColumn { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. }
            | Self::ConfigExists { .. }
            | Self::Grid(_)
            | Self::GridDefinition(_) => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    /// Classify a transport or status failure for `url`.
    pub fn from_http(url: &str, err: &reqwest::Error) -> Self {
        HttpFailure::new(url, err).to_cli_error()
    }
}

// ── Library error mapping ────────────────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { env } => Self::NoCredentials { env },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(other),
        }
    }
}

impl From<CacheError> for CliError {
    /// Unwraps HTTP failures so they keep their own exit codes.
    fn from(err: CacheError) -> Self {
        if let CacheError::Fetch { ref key, ref source } = err {
            if let Some(http) = source.downcast_ref::<HttpFailure>() {
                return http.to_cli_error();
            }
            tracing::debug!(slot = %key, "fetch failed without an HTTP cause");
        }
        Self::Cache(err)
    }
}

/// An HTTP failure carried through the cache's shared fetch error.
#[derive(Debug, Error)]
#[error("{url}: {kind}")]
pub struct HttpFailure {
    pub url: String,
    pub kind: HttpFailureKind,
    reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpFailureKind {
    Timeout,
    Connect,
    Status(u16),
}

impl std::fmt::Display for HttpFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => f.write_str("timed out"),
            Self::Connect => f.write_str("connection failed"),
            Self::Status(code) => write!(f, "HTTP {code}"),
        }
    }
}

impl HttpFailure {
    pub fn new(url: &str, err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            HttpFailureKind::Timeout
        } else if let Some(status) = err.status() {
            HttpFailureKind::Status(status.as_u16())
        } else {
            HttpFailureKind::Connect
        };
        Self {
            url: url.to_owned(),
            kind,
            reason: err.to_string(),
        }
    }

    fn to_cli_error(&self) -> CliError {
        let url = self.url.clone();
        match self.kind {
            HttpFailureKind::Timeout => CliError::Timeout { url },
            HttpFailureKind::Status(401 | 403) => CliError::AuthFailed { url },
            HttpFailureKind::Status(status) => CliError::Api { url, status },
            HttpFailureKind::Connect => CliError::ConnectionFailed {
                url,
                reason: self.reason.clone(),
            },
        }
    }
}
