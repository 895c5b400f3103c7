//! Typed views over canonical export requests.
//!
//! The decoder hands out canonical JSON objects; this module turns them into records
//! downstream code can match on: `AnyValue` is a sum type, and each export request
//! flattens into one record per span / metric / log record with its resource and
//! instrumentation scope attached.

use serde_json::{json, Map, Value};

use crate::error::{OtelGateError, Result};
use crate::protocol::decode::float_value;

/// Attribute value. Exactly one variant, never several.
///
/// `Bytes` keeps the canonical string form (base64 or hex, depending on how the
/// payload was decoded).
#[derive(Debug, Clone, PartialEq)]
pub enum AnyValue {
    String(String),
    Bool(bool),
    Int(i64),
    Double(f64),
    Array(Vec<AnyValue>),
    KvList(Vec<KeyValue>),
    Bytes(String),
}

const ANY_VALUE_VARIANTS: [&str; 7] = [
    "stringValue",
    "boolValue",
    "intValue",
    "doubleValue",
    "arrayValue",
    "kvlistValue",
    "bytesValue",
];

impl AnyValue {
    /// Convert a canonical AnyValue object. An object with no variant set is `None`.
    pub fn from_canonical(v: &Value) -> Result<Option<AnyValue>> {
        let obj = object(v, "AnyValue")?;

        let mut found: Option<(&str, &Value)> = None;
        for (key, val) in obj {
            if val.is_null() || !ANY_VALUE_VARIANTS.contains(&key.as_str()) {
                continue;
            }
            if let Some((prev, _)) = found {
                return Err(OtelGateError::malformed(format!(
                    "AnyValue carries more than one variant ({prev}, {key})"
                )));
            }
            found = Some((key.as_str(), val));
        }
        let Some((key, val)) = found else {
            return Ok(None);
        };

        let any = match key {
            "stringValue" => AnyValue::String(as_string(val, key)?),
            "boolValue" => AnyValue::Bool(
                val.as_bool()
                    .ok_or_else(|| OtelGateError::malformed("boolValue must be a bool"))?,
            ),
            "intValue" => AnyValue::Int(as_i64(val, key)?),
            "doubleValue" => AnyValue::Double(as_f64(val, key)?),
            "arrayValue" => {
                let values = array(object(val, key)?, "values")?;
                let mut items = Vec::with_capacity(values.len());
                for item in values {
                    if let Some(any) = AnyValue::from_canonical(item)? {
                        items.push(any);
                    }
                }
                AnyValue::Array(items)
            }
            "kvlistValue" => AnyValue::KvList(attributes(object(val, key)?, "values")?),
            "bytesValue" => AnyValue::Bytes(as_string(val, key)?),
            other => {
                return Err(OtelGateError::Internal(format!("unhandled AnyValue variant {other}")))
            }
        };
        Ok(Some(any))
    }

    /// Canonical object form (inverse of `from_canonical`).
    pub fn to_canonical(&self) -> Value {
        match self {
            AnyValue::String(s) => json!({ "stringValue": s }),
            AnyValue::Bool(b) => json!({ "boolValue": b }),
            AnyValue::Int(i) => json!({ "intValue": i.to_string() }),
            AnyValue::Double(d) => json!({ "doubleValue": float_value(*d) }),
            AnyValue::Array(items) => {
                let values: Vec<Value> = items.iter().map(AnyValue::to_canonical).collect();
                json!({ "arrayValue": { "values": values } })
            }
            AnyValue::KvList(kvs) => {
                let values: Vec<Value> = kvs.iter().map(KeyValue::to_canonical).collect();
                json!({ "kvlistValue": { "values": values } })
            }
            AnyValue::Bytes(b) => json!({ "bytesValue": b }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyValue {
    pub key: String,
    pub value: Option<AnyValue>,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: AnyValue) -> Self {
        Self {
            key: key.into(),
            value: Some(value),
        }
    }

    pub fn from_canonical(v: &Value) -> Result<Self> {
        let obj = object(v, "KeyValue")?;
        let value = match obj.get("value") {
            Some(val) if !val.is_null() => AnyValue::from_canonical(val)?,
            _ => None,
        };
        Ok(Self {
            key: string(obj, "key")?,
            value,
        })
    }

    pub fn to_canonical(&self) -> Value {
        match &self.value {
            Some(v) => json!({ "key": self.key, "value": v.to_canonical() }),
            None => json!({ "key": self.key }),
        }
    }
}

/// Producer attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resource {
    pub attributes: Vec<KeyValue>,
    pub dropped_attributes_count: u32,
}

impl Resource {
    fn from_parent(parent: &Map<String, Value>) -> Result<Self> {
        let Some(v) = parent.get("resource").filter(|v| !v.is_null()) else {
            return Ok(Self::default());
        };
        let obj = object(v, "resource")?;
        Ok(Self {
            attributes: attributes(obj, "attributes")?,
            dropped_attributes_count: uint32(obj, "droppedAttributesCount")?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstrumentationScope {
    pub name: String,
    pub version: String,
    pub attributes: Vec<KeyValue>,
}

impl InstrumentationScope {
    fn from_parent(parent: &Map<String, Value>) -> Result<Self> {
        let Some(v) = parent.get("scope").filter(|v| !v.is_null()) else {
            return Ok(Self::default());
        };
        let obj = object(v, "scope")?;
        Ok(Self {
            name: string(obj, "name")?,
            version: string(obj, "version")?,
            attributes: attributes(obj, "attributes")?,
        })
    }
}

// --------------------
// Signal records
// --------------------

#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalSpan {
    pub resource: Resource,
    pub scope: InstrumentationScope,
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: String,
    pub name: String,
    pub kind: i32,
    pub start_time_unix_nano: Option<u64>,
    pub end_time_unix_nano: Option<u64>,
    pub attributes: Vec<KeyValue>,
    pub status_code: i32,
    pub status_message: String,
}

/// Which member of `Metric.data` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Gauge,
    Sum,
    Histogram,
    ExponentialHistogram,
    Summary,
}

impl MetricKind {
    const ALL: [(&'static str, MetricKind); 5] = [
        ("gauge", MetricKind::Gauge),
        ("sum", MetricKind::Sum),
        ("histogram", MetricKind::Histogram),
        ("exponentialHistogram", MetricKind::ExponentialHistogram),
        ("summary", MetricKind::Summary),
    ];
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalMetric {
    pub resource: Resource,
    pub scope: InstrumentationScope,
    pub name: String,
    pub description: String,
    pub unit: String,
    pub kind: Option<MetricKind>,
    pub data_points: usize,
    /// `Metric.metadata`.
    pub attributes: Vec<KeyValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalLogRecord {
    pub resource: Resource,
    pub scope: InstrumentationScope,
    pub time_unix_nano: Option<u64>,
    pub observed_time_unix_nano: Option<u64>,
    pub severity_number: i32,
    pub severity_text: String,
    pub body: Option<AnyValue>,
    pub attributes: Vec<KeyValue>,
    pub trace_id: String,
    pub span_id: String,
    pub event_name: String,
}

// --------------------
// Export requests
// --------------------

/// Decoded `ExportTraceServiceRequest`.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceExportRequest(Value);

impl TraceExportRequest {
    pub fn from_value(v: Value) -> Self {
        Self(v)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn spans(&self) -> Result<Vec<CanonicalSpan>> {
        flatten(&self.0, "resourceSpans", "scopeSpans", "spans", |resource, scope, span| {
            let status = match span.get("status").filter(|v| !v.is_null()) {
                Some(v) => Some(object(v, "status")?),
                None => None,
            };
            Ok(CanonicalSpan {
                resource: resource.clone(),
                scope: scope.clone(),
                trace_id: string(span, "traceId")?,
                span_id: string(span, "spanId")?,
                parent_span_id: string(span, "parentSpanId")?,
                name: string(span, "name")?,
                kind: int32(span, "kind")?,
                start_time_unix_nano: uint64(span, "startTimeUnixNano")?,
                end_time_unix_nano: uint64(span, "endTimeUnixNano")?,
                attributes: attributes(span, "attributes")?,
                status_code: status.map(|s| int32(s, "code")).transpose()?.unwrap_or_default(),
                status_message: status.map(|s| string(s, "message")).transpose()?.unwrap_or_default(),
            })
        })
    }
}

/// Decoded `ExportMetricsServiceRequest`.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsExportRequest(Value);

impl MetricsExportRequest {
    pub fn from_value(v: Value) -> Self {
        Self(v)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn metrics(&self) -> Result<Vec<CanonicalMetric>> {
        flatten(&self.0, "resourceMetrics", "scopeMetrics", "metrics", |resource, scope, metric| {
            let mut data: Option<(MetricKind, &Map<String, Value>)> = None;
            for (key, kind) in MetricKind::ALL {
                let Some(v) = metric.get(key).filter(|v| !v.is_null()) else {
                    continue;
                };
                if data.is_some() {
                    return Err(OtelGateError::malformed("Metric carries more than one data variant"));
                }
                data = Some((kind, object(v, key)?));
            }
            let data_points = match data {
                Some((_, body)) => array(body, "dataPoints")?.len(),
                None => 0,
            };

            Ok(CanonicalMetric {
                resource: resource.clone(),
                scope: scope.clone(),
                name: string(metric, "name")?,
                description: string(metric, "description")?,
                unit: string(metric, "unit")?,
                kind: data.map(|(kind, _)| kind),
                data_points,
                attributes: attributes(metric, "metadata")?,
            })
        })
    }
}

/// Decoded `ExportLogsServiceRequest`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogsExportRequest(Value);

impl LogsExportRequest {
    pub fn from_value(v: Value) -> Self {
        Self(v)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn log_records(&self) -> Result<Vec<CanonicalLogRecord>> {
        flatten(&self.0, "resourceLogs", "scopeLogs", "logRecords", |resource, scope, record| {
            let body = match record.get("body").filter(|v| !v.is_null()) {
                Some(v) => AnyValue::from_canonical(v)?,
                None => None,
            };
            Ok(CanonicalLogRecord {
                resource: resource.clone(),
                scope: scope.clone(),
                time_unix_nano: uint64(record, "timeUnixNano")?,
                observed_time_unix_nano: uint64(record, "observedTimeUnixNano")?,
                severity_number: int32(record, "severityNumber")?,
                severity_text: string(record, "severityText")?,
                body,
                attributes: attributes(record, "attributes")?,
                trace_id: string(record, "traceId")?,
                span_id: string(record, "spanId")?,
                event_name: string(record, "eventName")?,
            })
        })
    }
}

macro_rules! into_value {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Value {
            fn from(req: $ty) -> Value {
                req.into_value()
            }
        })*
    };
}

into_value!(TraceExportRequest, MetricsExportRequest, LogsExportRequest);

/// Walk `root[resource_key][*][scope_key][*][item_key][*]`.
fn flatten<'a, T>(
    root: &'a Value,
    resource_key: &str,
    scope_key: &str,
    item_key: &str,
    mut f: impl FnMut(&Resource, &InstrumentationScope, &'a Map<String, Value>) -> Result<T>,
) -> Result<Vec<T>> {
    let root = object(root, "export request")?;
    let mut out = Vec::new();
    for entry in array(root, resource_key)? {
        let entry = object(entry, resource_key)?;
        let resource = Resource::from_parent(entry)?;
        for scoped in array(entry, scope_key)? {
            let scoped = object(scoped, scope_key)?;
            let scope = InstrumentationScope::from_parent(scoped)?;
            for item in array(scoped, item_key)? {
                out.push(f(&resource, &scope, object(item, item_key)?)?);
            }
        }
    }
    Ok(out)
}

// --------------------
// Field accessors (absent == proto3 default)
// --------------------

fn object<'a>(v: &'a Value, what: &str) -> Result<&'a Map<String, Value>> {
    v.as_object()
        .ok_or_else(|| OtelGateError::malformed(format!("{what} must be an object")))
}

fn array<'a>(obj: &'a Map<String, Value>, key: &str) -> Result<&'a [Value]> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(OtelGateError::malformed(format!("{key} must be an array"))),
    }
}

fn string(obj: &Map<String, Value>, key: &str) -> Result<String> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(v) => as_string(v, key),
    }
}

fn as_string(v: &Value, key: &str) -> Result<String> {
    v.as_str()
        .map(str::to_owned)
        .ok_or_else(|| OtelGateError::malformed(format!("{key} must be a string")))
}

fn as_i64(v: &Value, key: &str) -> Result<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
    .ok_or_else(|| OtelGateError::malformed(format!("{key} must be a 64-bit integer")))
}

fn as_f64(v: &Value, key: &str) -> Result<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => match s.as_str() {
            "NaN" => Some(f64::NAN),
            "Infinity" => Some(f64::INFINITY),
            "-Infinity" => Some(f64::NEG_INFINITY),
            other => other.parse().ok(),
        },
        _ => None,
    }
    .ok_or_else(|| OtelGateError::malformed(format!("{key} must be a number")))
}

fn uint64(obj: &Map<String, Value>, key: &str) -> Result<Option<u64>> {
    let v = match obj.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(v) => v,
    };
    match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
    .map(Some)
    .ok_or_else(|| OtelGateError::malformed(format!("{key} must be an unsigned 64-bit integer")))
}

fn int32(obj: &Map<String, Value>, key: &str) -> Result<i32> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(0),
        Some(v) => as_i64(v, key)?
            .try_into()
            .map_err(|_| OtelGateError::malformed(format!("{key} out of range"))),
    }
}

fn uint32(obj: &Map<String, Value>, key: &str) -> Result<u32> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(0),
        Some(v) => as_i64(v, key)?
            .try_into()
            .map_err(|_| OtelGateError::malformed(format!("{key} out of range"))),
    }
}

fn attributes(obj: &Map<String, Value>, key: &str) -> Result<Vec<KeyValue>> {
    array(obj, key)?.iter().map(KeyValue::from_canonical).collect()
}
