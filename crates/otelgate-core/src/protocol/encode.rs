//! Canonical object -> protobuf conversion.
//!
//! Accepts what `decode` produces (and a little more: JSON numbers for 64-bit integers,
//! numeric strings for 32-bit ones, snake_case field names). Fields are written in
//! field-number order; repeated numeric scalars are written packed.

use bytes::{BufMut, BytesMut};
use prost::encoding::{self as pb, WireType};
use serde_json::{Map, Value};

use crate::error::{OtelGateError, Result};

use super::decode::{BytesEncoding, RECURSION_LIMIT};
use super::schema::{
    Cardinality, FieldDescriptor, FieldKind, MessageDescriptor, MessageId, ScalarKind,
    SchemaRegistry,
};

/// Encode a canonical object as message `id`.
pub fn encode_message(
    registry: &SchemaRegistry,
    id: MessageId,
    value: &Value,
    encoding: BytesEncoding,
) -> Result<Vec<u8>> {
    let Value::Object(obj) = value else {
        return Err(OtelGateError::malformed(format!(
            "{}: expected a JSON object",
            registry.message(id)?.full_name()
        )));
    };
    let encoder = MessageEncoder { registry, encoding };
    let mut out = BytesMut::new();
    encoder.message(id, obj, &mut out, 0)?;
    Ok(out.to_vec())
}

struct MessageEncoder<'a> {
    registry: &'a SchemaRegistry,
    encoding: BytesEncoding,
}

impl MessageEncoder<'_> {
    fn message(
        &self,
        id: MessageId,
        obj: &Map<String, Value>,
        out: &mut BytesMut,
        depth: usize,
    ) -> Result<()> {
        if depth > RECURSION_LIMIT {
            return Err(OtelGateError::malformed("message nesting too deep"));
        }

        let desc = self.registry.message(id)?;
        let mut oneof_seen: Vec<usize> = Vec::new();

        for field in desc.fields() {
            let Some(v) = lookup(obj, field) else {
                continue;
            };

            if let Some(group) = field.oneof {
                if oneof_seen.contains(&group) {
                    return Err(OtelGateError::malformed(format!(
                        "{}: more than one member of oneof '{}' is set",
                        desc.full_name(),
                        desc.oneof_name(group).unwrap_or_default()
                    )));
                }
                oneof_seen.push(group);
            }

            match field.cardinality {
                Cardinality::Singular => self.field(desc, field, v, out, depth)?,
                Cardinality::Repeated => {
                    let Value::Array(items) = v else {
                        return Err(mismatch(desc, field, "an array"));
                    };
                    if field.kind.is_packable() {
                        put_packed(desc, field, items, out)?;
                    } else {
                        for item in items {
                            self.field(desc, field, item, out, depth)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn field(
        &self,
        desc: &MessageDescriptor,
        field: &FieldDescriptor,
        v: &Value,
        out: &mut BytesMut,
        depth: usize,
    ) -> Result<()> {
        let tag = field.number;
        match field.kind {
            FieldKind::Message(id) => {
                let Value::Object(obj) = v else {
                    return Err(mismatch(desc, field, "an object"));
                };
                let mut nested = BytesMut::new();
                self.message(id, obj, &mut nested, depth + 1)?;
                pb::encode_key(tag, WireType::LengthDelimited, out);
                pb::encode_varint(nested.len() as u64, out);
                out.put_slice(&nested);
            }
            FieldKind::Enum => pb::int32::encode(tag, &int32(desc, field, v)?, out),
            FieldKind::Scalar(ScalarKind::String) => {
                let Value::String(s) = v else {
                    return Err(mismatch(desc, field, "a string"));
                };
                pb::string::encode(tag, s, out);
            }
            FieldKind::Scalar(ScalarKind::Bytes) => {
                let Value::String(s) = v else {
                    return Err(mismatch(desc, field, "an encoded byte string"));
                };
                let raw = self.encoding.decode(s).map_err(|e| {
                    OtelGateError::malformed(format!("{}.{}: {e}", desc.full_name(), field.name))
                })?;
                pb::bytes::encode(tag, &raw, out);
            }
            FieldKind::Scalar(kind) => match kind {
                ScalarKind::Double => pb::double::encode(tag, &float(desc, field, v)?, out),
                ScalarKind::Float => pb::float::encode(tag, &(float(desc, field, v)? as f32), out),
                ScalarKind::Int32 => pb::int32::encode(tag, &int32(desc, field, v)?, out),
                ScalarKind::Int64 => pb::int64::encode(tag, &signed64(desc, field, v)?, out),
                ScalarKind::Uint32 => pb::uint32::encode(tag, &uint32(desc, field, v)?, out),
                ScalarKind::Uint64 => pb::uint64::encode(tag, &unsigned64(desc, field, v)?, out),
                ScalarKind::Sint32 => pb::sint32::encode(tag, &int32(desc, field, v)?, out),
                ScalarKind::Sint64 => pb::sint64::encode(tag, &signed64(desc, field, v)?, out),
                ScalarKind::Fixed32 => pb::fixed32::encode(tag, &uint32(desc, field, v)?, out),
                ScalarKind::Fixed64 => pb::fixed64::encode(tag, &unsigned64(desc, field, v)?, out),
                ScalarKind::Sfixed32 => pb::sfixed32::encode(tag, &int32(desc, field, v)?, out),
                ScalarKind::Sfixed64 => pb::sfixed64::encode(tag, &signed64(desc, field, v)?, out),
                ScalarKind::Bool => pb::bool::encode(tag, &boolean(desc, field, v)?, out),
                ScalarKind::String | ScalarKind::Bytes => {
                    return Err(OtelGateError::Internal(format!(
                        "{}.{}: length-delimited scalar reached the numeric path",
                        desc.full_name(),
                        field.name
                    )));
                }
            },
        }
        Ok(())
    }
}

fn lookup<'v>(obj: &'v Map<String, Value>, field: &FieldDescriptor) -> Option<&'v Value> {
    obj.get(&field.json_name)
        .or_else(|| obj.get(field.name))
        .filter(|v| !v.is_null())
}

/// Write a repeated numeric field as one packed record. Empty arrays write nothing.
fn put_packed(
    desc: &MessageDescriptor,
    field: &FieldDescriptor,
    items: &[Value],
    out: &mut BytesMut,
) -> Result<()> {
    let tag = field.number;
    let kind = match field.kind {
        FieldKind::Enum => ScalarKind::Int32,
        FieldKind::Scalar(kind) => kind,
        FieldKind::Message(_) => return Err(mismatch(desc, field, "a packable scalar")),
    };
    match kind {
        ScalarKind::Double => packed(items, |v| float(desc, field, v), |vs| pb::double::encode_packed(tag, vs, out)),
        ScalarKind::Float => packed(
            items,
            |v| float(desc, field, v).map(|f| f as f32),
            |vs| pb::float::encode_packed(tag, vs, out),
        ),
        ScalarKind::Int32 => packed(items, |v| int32(desc, field, v), |vs| pb::int32::encode_packed(tag, vs, out)),
        ScalarKind::Int64 => packed(items, |v| signed64(desc, field, v), |vs| pb::int64::encode_packed(tag, vs, out)),
        ScalarKind::Uint32 => packed(items, |v| uint32(desc, field, v), |vs| pb::uint32::encode_packed(tag, vs, out)),
        ScalarKind::Uint64 => {
            packed(items, |v| unsigned64(desc, field, v), |vs| pb::uint64::encode_packed(tag, vs, out))
        }
        ScalarKind::Sint32 => packed(items, |v| int32(desc, field, v), |vs| pb::sint32::encode_packed(tag, vs, out)),
        ScalarKind::Sint64 => packed(items, |v| signed64(desc, field, v), |vs| pb::sint64::encode_packed(tag, vs, out)),
        ScalarKind::Fixed32 => packed(items, |v| uint32(desc, field, v), |vs| pb::fixed32::encode_packed(tag, vs, out)),
        ScalarKind::Fixed64 => {
            packed(items, |v| unsigned64(desc, field, v), |vs| pb::fixed64::encode_packed(tag, vs, out))
        }
        ScalarKind::Sfixed32 => packed(items, |v| int32(desc, field, v), |vs| pb::sfixed32::encode_packed(tag, vs, out)),
        ScalarKind::Sfixed64 => {
            packed(items, |v| signed64(desc, field, v), |vs| pb::sfixed64::encode_packed(tag, vs, out))
        }
        ScalarKind::Bool => packed(items, |v| boolean(desc, field, v), |vs| pb::bool::encode_packed(tag, vs, out)),
        ScalarKind::String | ScalarKind::Bytes => Err(mismatch(desc, field, "a packable scalar")),
    }
}

fn packed<T>(
    items: &[Value],
    parse: impl Fn(&Value) -> Result<T>,
    write: impl FnOnce(&[T]),
) -> Result<()> {
    let values = items.iter().map(parse).collect::<Result<Vec<T>>>()?;
    write(&values);
    Ok(())
}

fn boolean(desc: &MessageDescriptor, field: &FieldDescriptor, v: &Value) -> Result<bool> {
    v.as_bool().ok_or_else(|| mismatch(desc, field, "a bool"))
}

fn int32(desc: &MessageDescriptor, field: &FieldDescriptor, v: &Value) -> Result<i32> {
    int_in_range(desc, field, v, i64::from(i32::MIN), i64::from(i32::MAX)).map(|n| n as i32)
}

fn uint32(desc: &MessageDescriptor, field: &FieldDescriptor, v: &Value) -> Result<u32> {
    int_in_range(desc, field, v, 0, i64::from(u32::MAX)).map(|n| n as u32)
}

fn signed64(desc: &MessageDescriptor, field: &FieldDescriptor, v: &Value) -> Result<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
    .ok_or_else(|| mismatch(desc, field, "a signed 64-bit integer"))
}

fn unsigned64(desc: &MessageDescriptor, field: &FieldDescriptor, v: &Value) -> Result<u64> {
    match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
    .ok_or_else(|| mismatch(desc, field, "an unsigned 64-bit integer"))
}

fn int_in_range(
    desc: &MessageDescriptor,
    field: &FieldDescriptor,
    v: &Value,
    min: i64,
    max: i64,
) -> Result<i64> {
    signed64(desc, field, v)
        .ok()
        .filter(|n| (min..=max).contains(n))
        .ok_or_else(|| mismatch(desc, field, &format!("an integer in {min}..={max}")))
}

fn float(desc: &MessageDescriptor, field: &FieldDescriptor, v: &Value) -> Result<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => match s.as_str() {
            "NaN" => Some(f64::NAN),
            "Infinity" => Some(f64::INFINITY),
            "-Infinity" => Some(f64::NEG_INFINITY),
            other => other.trim().parse::<f64>().ok(),
        },
        _ => None,
    }
    .ok_or_else(|| mismatch(desc, field, "a number"))
}

fn mismatch(desc: &MessageDescriptor, field: &FieldDescriptor, expected: &str) -> OtelGateError {
    OtelGateError::malformed(format!(
        "{}.{}: expected {expected}",
        desc.full_name(),
        field.json_name
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::protocol::otlp;

    fn encode(msg: &str, v: Value) -> Result<Vec<u8>> {
        let registry = SchemaRegistry::otlp_v1().unwrap();
        let id = registry.lookup(msg).unwrap();
        encode_message(&registry, id, &v, BytesEncoding::Base64)
    }

    #[test]
    fn key_value_matches_hand_encoding() {
        let raw = encode(otlp::KEY_VALUE, json!({ "key": "k", "value": { "intValue": "5" } })).unwrap();
        assert_eq!(raw, vec![0x0a, 0x01, b'k', 0x12, 0x02, 0x18, 0x05]);
    }

    #[test]
    fn snake_case_names_are_accepted() {
        let camel = encode(otlp::ANY_VALUE, json!({ "stringValue": "x" })).unwrap();
        let snake = encode(otlp::ANY_VALUE, json!({ "string_value": "x" })).unwrap();
        assert_eq!(camel, snake);
    }

    #[test]
    fn two_oneof_members_are_rejected() {
        let err = encode(otlp::ANY_VALUE, json!({ "stringValue": "x", "boolValue": true })).unwrap_err();
        assert!(err.to_string().contains("oneof"), "{err}");
    }

    #[test]
    fn repeated_numbers_are_packed() {
        let raw = encode(otlp::EXPONENTIAL_HISTOGRAM_BUCKETS, json!({ "offset": -1, "bucketCounts": ["1", 2] }))
            .unwrap();
        assert_eq!(raw, vec![0x08, 0x01, 0x12, 0x02, 0x01, 0x02]);
    }

    #[test]
    fn signed_varints_use_zigzag_and_sign_extension() {
        // ExponentialHistogramDataPoint.scale (sint32) = -1, zero_threshold unset
        let raw = encode(otlp::EXPONENTIAL_HISTOGRAM_DATA_POINT, json!({ "scale": -1 })).unwrap();
        assert_eq!(raw, vec![0x30, 0x01]);
        // Span.kind (enum) = -1 is sign-extended to ten bytes
        let raw = encode(otlp::SPAN, json!({ "kind": -1 })).unwrap();
        assert_eq!(raw.len(), 11);
        assert_eq!(raw[0], 0x30);
    }

    #[test]
    fn empty_repeated_numbers_write_nothing() {
        let raw = encode(otlp::EXPONENTIAL_HISTOGRAM_BUCKETS, json!({ "bucketCounts": [] })).unwrap();
        assert!(raw.is_empty());
    }

    #[test]
    fn out_of_range_uint32_is_rejected() {
        let err = encode(otlp::RESOURCE, json!({ "droppedAttributesCount": -1 })).unwrap_err();
        assert!(matches!(err, OtelGateError::Malformed(_)));
    }

    #[test]
    fn null_and_unknown_keys_are_ignored() {
        let raw = encode(otlp::KEY_VALUE, json!({ "key": "k", "value": null, "extra": 1 })).unwrap();
        assert_eq!(raw, vec![0x0a, 0x01, b'k']);
    }
}
