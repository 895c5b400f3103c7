//! Shared error type across otelgate crates.

use thiserror::Error;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Content type not accepted, or protobuf declared without a body.
    UnsupportedMediaType,
    /// Payload exceeds the configured body limit.
    PayloadTooLarge,
    /// Invalid input / malformed payload or configuration.
    BadRequest,
    /// Per-principal request quota exhausted.
    RateLimited,
    /// Per-principal in-flight cap reached.
    TooManyConcurrent,
    /// Unsupported config version.
    UnsupportedVersion,
    /// Internal server error.
    Internal,
}

impl ClientCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::UnsupportedMediaType => "UNSUPPORTED_MEDIA_TYPE",
            ClientCode::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::RateLimited => "RATE_LIMITED",
            ClientCode::TooManyConcurrent => "TOO_MANY_CONCURRENT",
            ClientCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ClientCode::Internal => "INTERNAL",
        }
    }

    /// HTTP status the outer layer should answer with.
    pub fn http_status(self) -> u16 {
        match self {
            ClientCode::UnsupportedMediaType => 415,
            ClientCode::PayloadTooLarge => 413,
            ClientCode::BadRequest | ClientCode::UnsupportedVersion => 400,
            ClientCode::RateLimited | ClientCode::TooManyConcurrent => 429,
            ClientCode::Internal => 500,
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, OtelGateError>;

/// Unified error type used by core and gateway.
#[derive(Debug, Error)]
pub enum OtelGateError {
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),
    #[error("payload too large: {len} bytes (max {max})")]
    PayloadTooLarge { len: usize, max: usize },
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("Rate limit exceeded. Try again later.")]
    RateLimitExceeded,
    #[error("Too many concurrent requests. Try again later.")]
    ConcurrencyExceeded,
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl OtelGateError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            OtelGateError::UnsupportedMediaType(_) => ClientCode::UnsupportedMediaType,
            OtelGateError::PayloadTooLarge { .. } => ClientCode::PayloadTooLarge,
            OtelGateError::Malformed(_) => ClientCode::BadRequest,
            OtelGateError::RateLimitExceeded => ClientCode::RateLimited,
            OtelGateError::ConcurrencyExceeded => ClientCode::TooManyConcurrent,
            OtelGateError::InvalidConfig(_) => ClientCode::BadRequest,
            OtelGateError::UnsupportedVersion => ClientCode::UnsupportedVersion,
            OtelGateError::Internal(_) => ClientCode::Internal,
        }
    }

    /// Shorthand for `client_code().http_status()`.
    pub fn http_status(&self) -> u16 {
        self.client_code().http_status()
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        OtelGateError::Malformed(msg.into())
    }
}

impl From<prost::DecodeError> for OtelGateError {
    fn from(e: prost::DecodeError) -> Self {
        OtelGateError::Malformed(e.to_string())
    }
}
