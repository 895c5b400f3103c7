//! OTLP payload decoder.
//!
//! Construct once at startup, then share via `Arc`. Decoding never mutates the
//! decoder or its registry, so concurrent calls across signals and threads are safe.

use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;

use crate::error::{OtelGateError, Result};
use crate::model::{LogsExportRequest, MetricsExportRequest, TraceExportRequest};
use crate::protocol::{decode, encode, BytesEncoding, MessageId, PayloadFormat, SchemaRegistry};
use crate::signal::Signal;

/// Default upper bound for protobuf bodies (16 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Copy)]
pub struct DecoderOptions {
    pub bytes_encoding: BytesEncoding,
    pub max_body_bytes: usize,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            bytes_encoding: BytesEncoding::Base64,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

pub struct Decoder {
    registry: Arc<SchemaRegistry>,
    roots: [MessageId; 3],
    options: DecoderOptions,
}

impl Decoder {
    /// Build a decoder over an existing registry.
    pub fn new(registry: Arc<SchemaRegistry>, options: DecoderOptions) -> Result<Self> {
        let roots = [
            registry.root(Signal::Traces)?,
            registry.root(Signal::Metrics)?,
            registry.root(Signal::Logs)?,
        ];
        Ok(Self {
            registry,
            roots,
            options,
        })
    }

    /// Build a decoder over the process-wide OTLP v1 registry.
    pub fn otlp(options: DecoderOptions) -> Result<Self> {
        Self::new(SchemaRegistry::shared()?, options)
    }

    pub fn options(&self) -> &DecoderOptions {
        &self.options
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    fn root(&self, signal: Signal) -> MessageId {
        match signal {
            Signal::Traces => self.roots[0],
            Signal::Metrics => self.roots[1],
            Signal::Logs => self.roots[2],
        }
    }

    /// Decode one export request.
    ///
    /// JSON (or a missing content type) returns `parsed_body` untouched. Protobuf
    /// decodes `raw` against the signal's root message and ignores `parsed_body`.
    pub fn decode(
        &self,
        signal: Signal,
        content_type: Option<&str>,
        parsed_body: Value,
        raw: Option<Bytes>,
    ) -> Result<Value> {
        match PayloadFormat::from_content_type(content_type)? {
            PayloadFormat::Json => Ok(parsed_body),
            PayloadFormat::Protobuf => {
                let raw = match raw {
                    Some(raw) if !raw.is_empty() => raw,
                    _ => {
                        return Err(OtelGateError::UnsupportedMediaType(
                            "empty protobuf body".into(),
                        ))
                    }
                };
                if raw.len() > self.options.max_body_bytes {
                    return Err(OtelGateError::PayloadTooLarge {
                        len: raw.len(),
                        max: self.options.max_body_bytes,
                    });
                }

                tracing::debug!(%signal, bytes = raw.len(), "decoding protobuf payload");
                decode::decode_message(
                    &self.registry,
                    self.root(signal),
                    raw,
                    self.options.bytes_encoding,
                )
            }
        }
    }

    pub fn decode_traces(
        &self,
        content_type: Option<&str>,
        parsed_body: Value,
        raw: Option<Bytes>,
    ) -> Result<TraceExportRequest> {
        self.decode(Signal::Traces, content_type, parsed_body, raw)
            .map(TraceExportRequest::from_value)
    }

    pub fn decode_metrics(
        &self,
        content_type: Option<&str>,
        parsed_body: Value,
        raw: Option<Bytes>,
    ) -> Result<MetricsExportRequest> {
        self.decode(Signal::Metrics, content_type, parsed_body, raw)
            .map(MetricsExportRequest::from_value)
    }

    pub fn decode_logs(
        &self,
        content_type: Option<&str>,
        parsed_body: Value,
        raw: Option<Bytes>,
    ) -> Result<LogsExportRequest> {
        self.decode(Signal::Logs, content_type, parsed_body, raw)
            .map(LogsExportRequest::from_value)
    }

    /// Encode a canonical export request back to protobuf.
    pub fn encode(&self, signal: Signal, canonical: &Value) -> Result<Vec<u8>> {
        encode::encode_message(
            &self.registry,
            self.root(signal),
            canonical,
            self.options.bytes_encoding,
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn decoder() -> Decoder {
        Decoder::otlp(DecoderOptions::default()).unwrap()
    }

    #[test]
    fn json_body_is_returned_unchanged() {
        let body = json!({ "resourceSpans": [{ "scopeSpans": [] }], "anything": 1 });
        for signal in Signal::ALL {
            let out = decoder().decode(signal, None, body.clone(), None).unwrap();
            assert_eq!(out, body);
        }
        let out = decoder()
            .decode(Signal::Logs, Some("application/json; charset=utf-8"), body.clone(), None)
            .unwrap();
        assert_eq!(out, body);
    }

    #[test]
    fn empty_protobuf_body_is_unsupported_media_type() {
        for raw in [None, Some(Bytes::new())] {
            let err = decoder()
                .decode_traces(Some("application/x-protobuf"), json!({}), raw)
                .unwrap_err();
            assert_eq!(err.http_status(), 415);
            assert!(err.to_string().contains("empty protobuf body"));
        }
    }

    #[test]
    fn oversized_protobuf_body_is_rejected() {
        let decoder = Decoder::otlp(DecoderOptions {
            max_body_bytes: 4,
            ..DecoderOptions::default()
        })
        .unwrap();
        let err = decoder
            .decode_logs(Some("application/x-protobuf"), Value::Null, Some(Bytes::from_static(&[0; 5])))
            .unwrap_err();
        assert!(matches!(err, OtelGateError::PayloadTooLarge { len: 5, max: 4 }));
    }

    #[test]
    fn text_plain_is_rejected_whatever_the_body() {
        let err = decoder()
            .decode_traces(Some("text/plain"), json!({ "resourceSpans": [] }), Some(Bytes::from_static(b"x")))
            .unwrap_err();
        assert!(matches!(err, OtelGateError::UnsupportedMediaType(ref m) if m.contains("text/plain")));
    }
}
