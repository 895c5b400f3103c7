//! Content-type negotiation for OTLP/HTTP payloads.

use crate::error::{OtelGateError, Result};

/// Media type for binary protobuf payloads.
pub const PROTOBUF: &str = "application/x-protobuf";
/// Media type for JSON payloads.
pub const JSON: &str = "application/json";

/// Accepted payload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    Json,
    Protobuf,
}

impl PayloadFormat {
    /// Resolve a raw `Content-Type` header value.
    ///
    /// Parameters after `;` are ignored and the essence is compared
    /// case-insensitively. A missing or blank value means JSON.
    pub fn from_content_type(content_type: Option<&str>) -> Result<Self> {
        let essence = normalize(content_type.unwrap_or_default());
        match essence.as_str() {
            "" | JSON => Ok(PayloadFormat::Json),
            PROTOBUF => Ok(PayloadFormat::Protobuf),
            _ => Err(OtelGateError::UnsupportedMediaType(format!(
                "unsupported content type: {essence}"
            ))),
        }
    }

    /// Label used in logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            PayloadFormat::Json => "json",
            PayloadFormat::Protobuf => "protobuf",
        }
    }
}

/// Strip parameters, trim and lowercase a media type.
pub fn normalize(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_blank_is_json() {
        assert_eq!(PayloadFormat::from_content_type(None).ok(), Some(PayloadFormat::Json));
        assert_eq!(PayloadFormat::from_content_type(Some("")).ok(), Some(PayloadFormat::Json));
        assert_eq!(PayloadFormat::from_content_type(Some("  ; x=y")).ok(), Some(PayloadFormat::Json));
    }

    #[test]
    fn parameters_and_case_are_ignored() {
        assert_eq!(
            PayloadFormat::from_content_type(Some("Application/JSON; charset=utf-8")).ok(),
            Some(PayloadFormat::Json)
        );
        assert_eq!(
            PayloadFormat::from_content_type(Some(" application/x-protobuf ")).ok(),
            Some(PayloadFormat::Protobuf)
        );
    }

    #[test]
    fn other_types_are_rejected_by_name() {
        let err = PayloadFormat::from_content_type(Some("Text/Plain; charset=utf-8"))
            .err()
            .map(|e| e.to_string())
            .unwrap_or_default();
        assert!(err.contains("text/plain"), "{err}");
    }
}
