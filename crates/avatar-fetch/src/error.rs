//! Error types for avatar-fetch.

/// Failure of a single network exchange.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// DNS, TCP, TLS handshake or certificate rejection.
    #[error("connection failed: {message}")]
    Connection { message: String },

    #[error("request timed out: {message}")]
    Timeout { message: String },

    #[error("HTTP status {code}: {message}")]
    Status { code: u16, message: String },

    /// The transfer broke off after the response headers arrived.
    #[error("failed to read response body (status {code}): {message}")]
    Body { code: u16, message: String },

    /// The URL or a header could not form a request; nothing was sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

impl TransportError {
    /// Response status carried by the failure, `0` when no response arrived.
    pub fn code(&self) -> u16 {
        match self {
            Self::Status { code, .. } | Self::Body { code, .. } => *code,
            Self::Connection { .. }
            | Self::Timeout { .. }
            | Self::InvalidRequest(_)
            | Self::Unavailable(_) => 0,
        }
    }

    /// Returns `true` for the failure classes that earn a fallback attempt:
    /// connection errors, including a body transfer cut off after the status
    /// arrived, and anything that ended without a status code. HTTP error
    /// statuses, timeouts and requests that were never sent are terminal.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection { .. } | Self::Body { .. } => true,
            Self::Timeout { .. } | Self::InvalidRequest(_) | Self::Unavailable(_) => false,
            Self::Status { code, .. } => *code == 0,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        let message = e.to_string();
        if e.is_builder() {
            Self::InvalidRequest(message)
        } else if e.is_timeout() {
            Self::Timeout { message }
        } else if let Some(status) = e.status() {
            Self::Status {
                code: status.as_u16(),
                message,
            }
        } else if e.is_body() || e.is_decode() {
            Self::Body { code: 0, message }
        } else {
            Self::Connection { message }
        }
    }
}

/// Why a payload could not become an image.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("empty")]
    Empty,

    #[error("malformed: {0}")]
    Malformed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("TLS configuration failed: {0}")]
    Tls(#[from] rustls::Error),

    #[error("TLS verifier could not be built: {0}")]
    Verifier(#[from] rustls::client::VerifierBuilderError),

    #[error("HTTP client could not be built: {0}")]
    Client(#[source] reqwest::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("image decode failed: {0}")]
    Decode(#[from] DecodeError),
}

pub type Result<T> = std::result::Result<T, Error>;
