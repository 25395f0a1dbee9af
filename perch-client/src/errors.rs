//! Error types for perch-client.

use std::{fmt, io, time::Duration};

use perch_codec::FrameError;

// ─── ApiError ─────────────────────────────────────────────────────────────────

/// A request the Bot API answered with `"ok": false`.
///
/// # Example
/// `{"ok":false,"error_code":429,"description":"Too Many Requests: retry after 7","parameters":{"retry_after":7}}`
/// → `ApiError { code: 429, description: "Too Many Requests: retry after 7", retry_after: Some(7) }`
#[derive(Clone, Debug, PartialEq)]
pub struct ApiError {
    /// HTTP-like status code (`0` if the backend did not send one).
    pub code: i32,
    /// Human-readable description sent by the backend.
    pub description: String,
    /// Seconds to wait before retrying, sent with 429 responses.
    pub retry_after: Option<u64>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "API {}: {}", self.code, self.description)?;
        if let Some(secs) = self.retry_after {
            write!(f, " (retry after {secs}s)")?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    /// Match on the description, with optional wildcard prefix/suffix `'*'`.
    ///
    /// # Examples
    /// - `err.is("Unauthorized")` — exact match
    /// - `err.is("Bad Request: *")` — starts-with match
    /// - `err.is("*chat not found")` — ends-with match
    pub fn is(&self, pattern: &str) -> bool {
        if let Some(prefix) = pattern.strip_suffix('*') {
            self.description.starts_with(prefix)
        } else if let Some(suffix) = pattern.strip_prefix('*') {
            self.description.ends_with(suffix)
        } else {
            self.description == pattern
        }
    }
}

// ─── InvocationError ──────────────────────────────────────────────────────────

/// The error type returned from any [`crate::Client`] method that talks to the backend.
#[derive(Debug)]
pub enum InvocationError {
    /// Neither the host name nor the fixed address accepted a connection.
    Connect(io::Error),
    /// I/O failure after the connection was established.
    Io(io::Error),
    /// The backend did not finish its response within the server timeout.
    Timeout(Duration),
    /// The response did not contain one complete JSON object.
    Frame(FrameError),
    /// The backend rejected the request.
    Api(ApiError),
    /// The response was framed but is not the expected JSON shape.
    Deserialize(String),
    /// A local argument was rejected before anything was sent.
    Validation(&'static str),
}

impl fmt::Display for InvocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect(e)     => write!(f, "unable to connect: {e}"),
            Self::Io(e)          => write!(f, "I/O error: {e}"),
            Self::Timeout(d)     => write!(f, "no complete response within {d:?}"),
            Self::Frame(e)       => write!(f, "framing error: {e}"),
            Self::Api(e)         => write!(f, "{e}"),
            Self::Deserialize(s) => write!(f, "deserialize error: {s}"),
            Self::Validation(s)  => write!(f, "invalid argument: {s}"),
        }
    }
}

impl std::error::Error for InvocationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Connect(e) | Self::Io(e) => Some(e),
            Self::Frame(e) => Some(e),
            Self::Api(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for InvocationError {
    fn from(e: io::Error) -> Self { Self::Io(e) }
}

impl From<FrameError> for InvocationError {
    fn from(e: FrameError) -> Self { Self::Frame(e) }
}

impl From<serde_json::Error> for InvocationError {
    fn from(e: serde_json::Error) -> Self { Self::Deserialize(e.to_string()) }
}

impl From<ApiError> for InvocationError {
    fn from(e: ApiError) -> Self { Self::Api(e) }
}

impl InvocationError {
    /// Returns `true` if this is an API error whose description matches (supports `'*'` wildcards).
    pub fn is(&self, pattern: &str) -> bool {
        match self {
            Self::Api(e) => e.is(pattern),
            _            => false,
        }
    }

    /// `true` for connect, I/O, timeout and framing failures. The request
    /// may not have reached the backend, or its answer was lost.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Connect(_) | Self::Io(_) | Self::Timeout(_) | Self::Frame(_))
    }

    /// If the backend asked us to slow down, returns how many seconds to wait.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::Api(e) => e.retry_after,
            _            => None,
        }
    }
}

// ─── KeyboardError ────────────────────────────────────────────────────────────

/// Errors returned by the keyboard builders in [`crate::keyboard`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyboardError {
    /// Button labels must not be empty.
    EmptyLabel,
    /// The button's action payload (callback data, URL, …) was empty.
    EmptyAction,
    /// Callback data longer than the backend's 64-byte limit.
    CallbackDataTooLong(usize),
}

impl fmt::Display for KeyboardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyLabel             => write!(f, "button label is empty"),
            Self::EmptyAction            => write!(f, "button action is empty"),
            Self::CallbackDataTooLong(n) => write!(f, "callback data is {n} bytes (max 64)"),
        }
    }
}

impl std::error::Error for KeyboardError {}

// ─── ConfigError ──────────────────────────────────────────────────────────────

/// Errors returned while building a [`crate::Config`] or TLS setup.
#[derive(Debug)]
pub enum ConfigError {
    /// No bot token was configured.
    MissingToken,
    /// An environment variable or value could not be parsed.
    Invalid {
        /// Name of the offending setting.
        key:    &'static str,
        /// What was wrong with it.
        reason: String,
    },
    /// The TLS client configuration could not be built.
    Tls(rustls::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingToken            => write!(f, "bot token not set: set PERCH_BOT_TOKEN or Config::token"),
            Self::Invalid { key, reason } => write!(f, "invalid {key}: {reason}"),
            Self::Tls(e)                  => write!(f, "TLS setup failed: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Tls(e) => Some(e),
            _ => None,
        }
    }
}

impl From<rustls::Error> for ConfigError {
    fn from(e: rustls::Error) -> Self { Self::Tls(e) }
}
