//! Error types for the speed test pipeline.
//!
//! Every fallible operation in the crate reports a [`SpeedTestError`],
//! which pairs a coarse [`ErrorKind`] with a user-facing message and an
//! optional suggestion for how to resolve it.

use std::error::Error;
use std::fmt;

/// Exit codes for the application.
pub mod exit_codes {
    /// Successful execution.
    pub const SUCCESS: i32 = 0;
    /// Network error (connection failed, timeout, no reachable server).
    pub const NETWORK_ERROR: i32 = 1;
    /// API error (server returned an error or an unreadable response).
    pub const API_ERROR: i32 = 2;
    /// Configuration error (invalid arguments, unknown server id).
    pub const CONFIG_ERROR: i32 = 3;
    /// Partial failure (a probe failed but the test produced a result).
    pub const PARTIAL_FAILURE: i32 = 4;
    /// History file could not be read or written.
    pub const PERSISTENCE_ERROR: i32 = 5;
    /// Unknown/unexpected error.
    pub const UNKNOWN_ERROR: i32 = 99;
}

/// Categories of errors that can occur during speed testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network connectivity issues.
    Network,
    /// Request timed out.
    Timeout,
    /// Server returned an error status or a malformed body.
    Api,
    /// Invalid configuration, arguments or caller input.
    Config,
    /// No server could be discovered or reached.
    NoServers,
    /// A probe produced no usable measurement.
    Measurement,
    /// History file I/O.
    Persistence,
    /// Unknown or unexpected errors.
    Unknown,
}

impl ErrorKind {
    /// Get the exit code for this error kind.
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorKind::Network | ErrorKind::Timeout | ErrorKind::NoServers => {
                exit_codes::NETWORK_ERROR
            }
            ErrorKind::Api => exit_codes::API_ERROR,
            ErrorKind::Config => exit_codes::CONFIG_ERROR,
            ErrorKind::Measurement => exit_codes::PARTIAL_FAILURE,
            ErrorKind::Persistence => exit_codes::PERSISTENCE_ERROR,
            ErrorKind::Unknown => exit_codes::UNKNOWN_ERROR,
        }
    }

    /// Get a user-friendly description of this error kind.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorKind::Network => "Network error",
            ErrorKind::Timeout => "Connection timeout",
            ErrorKind::Api => "API error",
            ErrorKind::Config => "Configuration error",
            ErrorKind::NoServers => "No servers available",
            ErrorKind::Measurement => "Measurement error",
            ErrorKind::Persistence => "History error",
            ErrorKind::Unknown => "Unknown error",
        }
    }

    /// Whether an operation failing with this kind is worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, ErrorKind::Network | ErrorKind::Timeout)
    }
}

/// A user-friendly error type for speed test operations.
#[derive(Debug)]
pub struct SpeedTestError {
    /// The kind of error.
    pub kind: ErrorKind,
    /// User-friendly error message.
    pub message: String,
    /// Optional suggestion for how to resolve the error.
    pub suggestion: Option<String>,
    /// The underlying error, if any.
    pub source: Option<Box<dyn Error + Send + Sync>>,
}

impl SpeedTestError {
    /// Create a new SpeedTestError.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), suggestion: None, source: None }
    }

    /// Add a suggestion for how to resolve the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add the underlying error source.
    pub fn with_source(
        mut self,
        source: impl Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the exit code for this error.
    pub fn exit_code(&self) -> i32 {
        self.kind.exit_code()
    }

    /// Whether retrying the failed operation may succeed.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_transient()
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
            .with_suggestion("Check your internet connection and try again.")
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message).with_suggestion(
            "The server may be slow or unreachable. Try again later.",
        )
    }

    pub fn api(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Api, message).with_suggestion(
            "The speedtest.net service may be experiencing issues. Try again later.",
        )
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    pub fn no_servers(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NoServers, message).with_suggestion(
            "Check your connection, or list servers with `speedcheck servers`.",
        )
    }

    pub fn measurement(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Measurement, message)
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Persistence, message).with_suggestion(
            "Check that the history file location is writable.",
        )
    }
}

impl fmt::Display for SpeedTestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.description(), self.message)?;

        if let Some(ref suggestion) = self.suggestion {
            write!(f, "\n  Suggestion: {}", suggestion)?;
        }

        Ok(())
    }
}

impl Error for SpeedTestError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn Error + 'static))
    }
}

impl From<reqwest::Error> for SpeedTestError {
    fn from(error: reqwest::Error) -> Self {
        let message = error.to_string();

        let speed_error = if error.is_timeout() {
            Self::timeout(message)
        } else if error.is_connect() {
            Self::network(message)
        } else if let Some(status) = error.status() {
            Self::api(format!("server responded with status {}", status))
        } else if error.is_decode() || error.is_body() {
            Self::api(message)
        } else {
            match classify_error(&error) {
                ErrorKind::Timeout => Self::timeout(message),
                ErrorKind::Network => Self::network(message),
                kind => Self::new(kind, message),
            }
        };

        speed_error.with_source(error)
    }
}

impl From<url::ParseError> for SpeedTestError {
    fn from(error: url::ParseError) -> Self {
        Self::config(format!("invalid URL: {}", error)).with_source(error)
    }
}

impl From<serde_json::Error> for SpeedTestError {
    fn from(error: serde_json::Error) -> Self {
        Self::api(format!("malformed response: {}", error)).with_source(error)
    }
}

/// Classify an error into an ErrorKind based on its message.
pub fn classify_error(error: &dyn Error) -> ErrorKind {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("timeout")
        || error_str.contains("timed out")
        || error_str.contains("deadline")
    {
        return ErrorKind::Timeout;
    }

    if error_str.contains("dns")
        || error_str.contains("resolve")
        || error_str.contains("connection refused")
        || error_str.contains("connection reset")
        || error_str.contains("network unreachable")
        || error_str.contains("host unreachable")
        || error_str.contains("no route")
        || error_str.contains("broken pipe")
    {
        return ErrorKind::Network;
    }

    if error_str.contains("status: 4")
        || error_str.contains("status: 5")
        || error_str.contains("server error")
    {
        return ErrorKind::Api;
    }

    ErrorKind::Unknown
}

/// Format an error for user display.
pub fn format_error_for_display(error: &SpeedTestError) -> String {
    let mut output = format!("Error: {}", error.message);

    if let Some(ref suggestion) = error.suggestion {
        output.push_str(&format!("\n\nSuggestion: {}", suggestion));
    }

    output
}
