//! Protobuf -> canonical object conversion.
//!
//! Canonical objects use OTLP/JSON field names. 64-bit integers become decimal strings,
//! bytes become base64 or hex strings, and only fields present on the wire are emitted.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::{Buf, Bytes};
use prost::encoding::{self as pb, DecodeContext, WireType};
use serde::Deserialize;
use serde_json::{Map, Number, Value};

use crate::error::{OtelGateError, Result};

use super::schema::{Cardinality, FieldDescriptor, FieldKind, MessageId, ScalarKind, SchemaRegistry};

/// Nesting limit for messages, shared with `encode`.
pub const RECURSION_LIMIT: usize = 100;

/// String form of `bytes` fields in canonical objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BytesEncoding {
    #[default]
    Base64,
    Hex,
}

impl BytesEncoding {
    pub fn encode(self, raw: &[u8]) -> String {
        match self {
            BytesEncoding::Base64 => STANDARD.encode(raw),
            BytesEncoding::Hex => hex::encode(raw),
        }
    }

    pub fn decode(self, s: &str) -> Result<Vec<u8>> {
        match self {
            BytesEncoding::Base64 => STANDARD
                .decode(s)
                .map_err(|e| OtelGateError::malformed(format!("invalid base64: {e}"))),
            BytesEncoding::Hex => {
                hex::decode(s).map_err(|e| OtelGateError::malformed(format!("invalid hex: {e}")))
            }
        }
    }
}

/// Decode `buf` as message `id` into a canonical JSON object.
pub fn decode_message(
    registry: &SchemaRegistry,
    id: MessageId,
    buf: Bytes,
    encoding: BytesEncoding,
) -> Result<Value> {
    let decoder = MessageDecoder { registry, encoding };
    let mut out = Map::new();
    decoder.merge(id, buf, 0, &mut out)?;
    Ok(Value::Object(out))
}

/// Read one field value with a `prost::encoding` codec module.
macro_rules! read {
    ($codec:ident, $init:expr, $wire_type:expr, $buf:expr) => {{
        let mut v = $init;
        pb::$codec::merge($wire_type, &mut v, $buf, DecodeContext::default())?;
        v
    }};
}

struct MessageDecoder<'a> {
    registry: &'a SchemaRegistry,
    encoding: BytesEncoding,
}

impl MessageDecoder<'_> {
    /// Merge the fields in `buf` into `out`, following protobuf merge rules:
    /// singular scalars overwrite, repeated fields append, and a singular
    /// message seen twice is merged field by field.
    fn merge(&self, id: MessageId, mut buf: Bytes, depth: usize, out: &mut Map<String, Value>) -> Result<()> {
        if depth > RECURSION_LIMIT {
            return Err(OtelGateError::malformed("message nesting too deep"));
        }

        let desc = self.registry.message(id)?;

        while buf.has_remaining() {
            let (tag, wire_type) = pb::decode_key(&mut buf)?;
            let Some(field) = desc.field_by_number(tag) else {
                pb::skip_field(wire_type, tag, &mut buf, DecodeContext::default())?;
                continue;
            };

            match field.cardinality {
                Cardinality::Repeated => {
                    let slot = out
                        .entry(field.json_name.clone())
                        .or_insert_with(|| Value::Array(Vec::new()));
                    let Value::Array(items) = slot else {
                        return Err(OtelGateError::Internal(format!(
                            "{}.{} is not an array",
                            desc.full_name(),
                            field.name
                        )));
                    };

                    if wire_type == WireType::LengthDelimited && field.kind.is_packable() {
                        let mut packed = length_delimited(&mut buf)?;
                        while packed.has_remaining() {
                            items.push(self.packed_item(field, &mut packed)?);
                        }
                    } else {
                        items.push(self.value(desc.full_name(), field, wire_type, &mut buf, depth, None)?);
                    }
                }
                Cardinality::Singular => {
                    let earlier = match field.kind {
                        FieldKind::Message(_) => match out.remove(&field.json_name) {
                            Some(Value::Object(prev)) => Some(prev),
                            _ => None,
                        },
                        _ => None,
                    };
                    let v = self.value(desc.full_name(), field, wire_type, &mut buf, depth, earlier)?;
                    for sibling in desc.oneof_siblings(field) {
                        out.remove(&sibling.json_name);
                    }
                    out.insert(field.json_name.clone(), v);
                }
            }
        }

        // A packed field with an empty payload leaves an empty array behind.
        out.retain(|_, v| !matches!(v, Value::Array(items) if items.is_empty()));
        Ok(())
    }

    /// `earlier` is a previous occurrence of the same singular message field.
    fn value(
        &self,
        message: &str,
        field: &FieldDescriptor,
        wire_type: WireType,
        buf: &mut Bytes,
        depth: usize,
        earlier: Option<Map<String, Value>>,
    ) -> Result<Value> {
        let expected = field.kind.wire_type();
        if wire_type != expected {
            return Err(OtelGateError::malformed(format!(
                "{message}.{}: wire type {wire_type:?}, expected {expected:?}",
                field.name
            )));
        }

        match field.kind {
            FieldKind::Message(id) => {
                let payload = length_delimited(buf)?;
                let mut nested = earlier.unwrap_or_default();
                self.merge(id, payload, depth + 1, &mut nested)?;
                Ok(Value::Object(nested))
            }
            FieldKind::Enum => Ok(Value::from(read!(int32, 0i32, wire_type, buf))),
            FieldKind::Scalar(kind) => self.scalar(kind, wire_type, buf),
        }
    }

    fn packed_item(&self, field: &FieldDescriptor, buf: &mut Bytes) -> Result<Value> {
        match field.kind {
            FieldKind::Enum => Ok(Value::from(read!(int32, 0i32, WireType::Varint, buf))),
            FieldKind::Scalar(kind) => self.scalar(kind, kind.wire_type(), buf),
            FieldKind::Message(_) => Err(OtelGateError::malformed(format!(
                "{}: messages cannot be packed",
                field.name
            ))),
        }
    }

    fn scalar(&self, kind: ScalarKind, wire_type: WireType, buf: &mut Bytes) -> Result<Value> {
        let v = match kind {
            ScalarKind::Double => float_value(read!(double, 0f64, wire_type, buf)),
            ScalarKind::Float => float_value(f64::from(read!(float, 0f32, wire_type, buf))),
            ScalarKind::Int32 => integer_value(kind, read!(int32, 0i32, wire_type, buf)),
            ScalarKind::Int64 => integer_value(kind, read!(int64, 0i64, wire_type, buf)),
            ScalarKind::Uint32 => integer_value(kind, read!(uint32, 0u32, wire_type, buf)),
            ScalarKind::Uint64 => integer_value(kind, read!(uint64, 0u64, wire_type, buf)),
            ScalarKind::Sint32 => integer_value(kind, read!(sint32, 0i32, wire_type, buf)),
            ScalarKind::Sint64 => integer_value(kind, read!(sint64, 0i64, wire_type, buf)),
            ScalarKind::Fixed32 => integer_value(kind, read!(fixed32, 0u32, wire_type, buf)),
            ScalarKind::Fixed64 => integer_value(kind, read!(fixed64, 0u64, wire_type, buf)),
            ScalarKind::Sfixed32 => integer_value(kind, read!(sfixed32, 0i32, wire_type, buf)),
            ScalarKind::Sfixed64 => integer_value(kind, read!(sfixed64, 0i64, wire_type, buf)),
            ScalarKind::Bool => Value::Bool(read!(bool, false, wire_type, buf)),
            ScalarKind::String => Value::String(read!(string, String::new(), wire_type, buf)),
            ScalarKind::Bytes => {
                let raw: Vec<u8> = read!(bytes, Vec::<u8>::new(), wire_type, buf);
                Value::String(self.encoding.encode(&raw))
            }
        };
        Ok(v)
    }
}

/// Split off a length-delimited payload without copying.
fn length_delimited(buf: &mut Bytes) -> Result<Bytes> {
    let len = pb::decode_varint(buf)?;
    match usize::try_from(len) {
        Ok(len) if len <= buf.remaining() => Ok(buf.split_to(len)),
        _ => Err(OtelGateError::malformed(format!(
            "length prefix {len} exceeds remaining {} bytes",
            buf.remaining()
        ))),
    }
}

/// 64-bit integers become decimal strings; narrower ones stay JSON numbers.
fn integer_value<N: ToString + Into<Value>>(kind: ScalarKind, n: N) -> Value {
    if kind.is_64bit_integer() {
        Value::String(n.to_string())
    } else {
        n.into()
    }
}

/// JSON number, or the protobuf JSON spelling of a non-finite float.
pub(crate) fn float_value(v: f64) -> Value {
    match Number::from_f64(v) {
        Some(n) => Value::Number(n),
        None if v.is_nan() => Value::String("NaN".into()),
        None if v.is_sign_positive() => Value::String("Infinity".into()),
        None => Value::String("-Infinity".into()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::protocol::otlp;

    fn decode(msg: &str, raw: &[u8]) -> Result<Value> {
        let registry = SchemaRegistry::otlp_v1().unwrap();
        let id = registry.lookup(msg).unwrap();
        decode_message(&registry, id, Bytes::copy_from_slice(raw), BytesEncoding::Base64)
    }

    #[test]
    fn any_value_int_is_decimal_string() {
        // int_value (3) = -1 as a 10-byte varint
        let raw = [0x18, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01];
        assert_eq!(decode(otlp::ANY_VALUE, &raw).unwrap(), json!({ "intValue": "-1" }));
    }

    #[test]
    fn only_64bit_integers_become_strings() {
        // Span: dropped_attributes_count (uint32) = 3, start_time_unix_nano (fixed64) = 7
        let raw = [0x50, 0x03, 0x39, 0x07, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(
            decode(otlp::SPAN, &raw).unwrap(),
            json!({ "droppedAttributesCount": 3, "startTimeUnixNano": "7" })
        );
    }

    #[test]
    fn later_oneof_member_replaces_earlier() {
        // string_value "a", then bool_value true
        let raw = [0x0a, 0x01, b'a', 0x10, 0x01];
        assert_eq!(decode(otlp::ANY_VALUE, &raw).unwrap(), json!({ "boolValue": true }));
    }

    #[test]
    fn repeated_singular_message_is_merged() {
        // Span.status sent twice: first { message: "m" }, then { code: 2 }
        let raw = [0x7a, 0x03, 0x12, 0x01, b'm', 0x7a, 0x02, 0x18, 0x02];
        assert_eq!(
            decode(otlp::SPAN, &raw).unwrap(),
            json!({ "status": { "message": "m", "code": 2 } })
        );
    }

    #[test]
    fn merged_message_appends_repeated_and_overwrites_scalars() {
        // ResourceSpans.resource sent twice, each with one attribute and a dropped count
        let raw = [
            0x0a, 0x07, 0x0a, 0x03, 0x0a, 0x01, b'a', 0x10, 0x01,
            0x0a, 0x07, 0x0a, 0x03, 0x0a, 0x01, b'b', 0x10, 0x02,
        ];
        assert_eq!(
            decode(otlp::RESOURCE_SPANS, &raw).unwrap(),
            json!({ "resource": {
                "attributes": [{ "key": "a" }, { "key": "b" }],
                "droppedAttributesCount": 2
            } })
        );
    }

    #[test]
    fn truncated_input_is_malformed() {
        // length prefix 5 with two bytes left
        let err = decode(otlp::KEY_VALUE, &[0x0a, 0x05, b'a', b'b']).unwrap_err();
        assert!(matches!(err, OtelGateError::Malformed(_)), "{err}");
        // varint cut short
        let err = decode(otlp::RESOURCE, &[0x10, 0x80]).unwrap_err();
        assert!(matches!(err, OtelGateError::Malformed(_)), "{err}");
    }

    #[test]
    fn unknown_groups_are_skipped() {
        // start group 50, varint field 1 = 5, end group 50, then key = "k"
        let raw = [0x93, 0x03, 0x08, 0x05, 0x94, 0x03, 0x0a, 0x01, b'k'];
        assert_eq!(decode(otlp::KEY_VALUE, &raw).unwrap(), json!({ "key": "k" }));
    }

    #[test]
    fn bytes_use_configured_encoding() {
        let registry = SchemaRegistry::otlp_v1().unwrap();
        let id = registry.lookup(otlp::ANY_VALUE).unwrap();
        let raw = Bytes::from_static(&[0x3a, 0x02, 0xca, 0xfe]);
        let b64 = decode_message(&registry, id, raw.clone(), BytesEncoding::Base64).unwrap();
        let hex = decode_message(&registry, id, raw, BytesEncoding::Hex).unwrap();
        assert_eq!(b64, json!({ "bytesValue": "yv4=" }));
        assert_eq!(hex, json!({ "bytesValue": "cafe" }));
    }

    #[test]
    fn packed_and_unpacked_repeated_scalars_are_accepted() {
        // bucket_counts (2, uint64): packed [1, 2] followed by an unpacked 3
        let raw = [0x12, 0x02, 0x01, 0x02, 0x10, 0x03];
        let v = decode(otlp::EXPONENTIAL_HISTOGRAM_BUCKETS, &raw).unwrap();
        assert_eq!(v, json!({ "bucketCounts": ["1", "2", "3"] }));
    }

    #[test]
    fn unknown_fields_are_skipped() {
        // field 99 (varint) then key = "k"
        let raw = [0x98, 0x06, 0x07, 0x0a, 0x01, b'k'];
        assert_eq!(decode(otlp::KEY_VALUE, &raw).unwrap(), json!({ "key": "k" }));
    }

    #[test]
    fn wire_type_mismatch_is_malformed() {
        // key (1) sent as varint
        let err = decode(otlp::KEY_VALUE, &[0x08, 0x01]).unwrap_err();
        assert!(matches!(err, OtelGateError::Malformed(_)), "{err}");
    }

    #[test]
    fn invalid_utf8_is_malformed() {
        let err = decode(otlp::KEY_VALUE, &[0x0a, 0x01, 0xff]).unwrap_err();
        assert!(matches!(err, OtelGateError::Malformed(_)));
    }

    #[test]
    fn deep_nesting_is_rejected() {
        // AnyValue { array_value { values [ AnyValue { array_value { ... } } ] } } nested past the limit
        let mut inner: Vec<u8> = Vec::new();
        for _ in 0..(RECURSION_LIMIT + 5) {
            let mut array = vec![0x0a];
            push_len(&mut array, inner.len());
            array.extend_from_slice(&inner);
            let mut any = vec![0x2a];
            push_len(&mut any, array.len());
            any.extend_from_slice(&array);
            inner = any;
        }
        let err = decode(otlp::ANY_VALUE, &inner).unwrap_err();
        assert!(err.to_string().contains("too deep"), "{err}");
    }

    fn push_len(out: &mut Vec<u8>, mut len: usize) {
        while len >= 0x80 {
            out.push((len as u8 & 0x7f) | 0x80);
            len >>= 7;
        }
        out.push(len as u8);
    }

    #[test]
    fn non_finite_doubles_use_string_spelling() {
        assert_eq!(float_value(f64::NAN), json!("NaN"));
        assert_eq!(float_value(f64::INFINITY), json!("Infinity"));
        assert_eq!(float_value(f64::NEG_INFINITY), json!("-Infinity"));
        assert_eq!(float_value(1.5), json!(1.5));
    }
}
