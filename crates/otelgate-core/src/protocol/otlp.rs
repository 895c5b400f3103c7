//! OTLP v1 message definitions.
//!
//! Mirrors `opentelemetry/proto/{common,resource,trace,metrics,logs,collector}/v1/*.proto`
//! field for field: numbers, scalar types and oneof groups must match the upstream
//! protos exactly, otherwise attribute values decode into the wrong variant.
//! Deprecated and reserved fields (e.g. `instrumentation_library_*` = 1000) are omitted
//! and therefore skipped as unknown fields.

use super::schema::{FieldDef as F, MessageDef, ScalarKind::*};

// common.v1
pub const ANY_VALUE: &str = "opentelemetry.proto.common.v1.AnyValue";
pub const ARRAY_VALUE: &str = "opentelemetry.proto.common.v1.ArrayValue";
pub const KEY_VALUE_LIST: &str = "opentelemetry.proto.common.v1.KeyValueList";
pub const KEY_VALUE: &str = "opentelemetry.proto.common.v1.KeyValue";
pub const INSTRUMENTATION_SCOPE: &str = "opentelemetry.proto.common.v1.InstrumentationScope";

// resource.v1
pub const RESOURCE: &str = "opentelemetry.proto.resource.v1.Resource";

// trace.v1
pub const RESOURCE_SPANS: &str = "opentelemetry.proto.trace.v1.ResourceSpans";
pub const SCOPE_SPANS: &str = "opentelemetry.proto.trace.v1.ScopeSpans";
pub const SPAN: &str = "opentelemetry.proto.trace.v1.Span";
pub const SPAN_EVENT: &str = "opentelemetry.proto.trace.v1.Span.Event";
pub const SPAN_LINK: &str = "opentelemetry.proto.trace.v1.Span.Link";
pub const STATUS: &str = "opentelemetry.proto.trace.v1.Status";

// metrics.v1
pub const RESOURCE_METRICS: &str = "opentelemetry.proto.metrics.v1.ResourceMetrics";
pub const SCOPE_METRICS: &str = "opentelemetry.proto.metrics.v1.ScopeMetrics";
pub const METRIC: &str = "opentelemetry.proto.metrics.v1.Metric";
pub const GAUGE: &str = "opentelemetry.proto.metrics.v1.Gauge";
pub const SUM: &str = "opentelemetry.proto.metrics.v1.Sum";
pub const HISTOGRAM: &str = "opentelemetry.proto.metrics.v1.Histogram";
pub const EXPONENTIAL_HISTOGRAM: &str = "opentelemetry.proto.metrics.v1.ExponentialHistogram";
pub const SUMMARY: &str = "opentelemetry.proto.metrics.v1.Summary";
pub const NUMBER_DATA_POINT: &str = "opentelemetry.proto.metrics.v1.NumberDataPoint";
pub const HISTOGRAM_DATA_POINT: &str = "opentelemetry.proto.metrics.v1.HistogramDataPoint";
pub const EXPONENTIAL_HISTOGRAM_DATA_POINT: &str =
    "opentelemetry.proto.metrics.v1.ExponentialHistogramDataPoint";
pub const EXPONENTIAL_HISTOGRAM_BUCKETS: &str =
    "opentelemetry.proto.metrics.v1.ExponentialHistogramDataPoint.Buckets";
pub const SUMMARY_DATA_POINT: &str = "opentelemetry.proto.metrics.v1.SummaryDataPoint";
pub const VALUE_AT_QUANTILE: &str =
    "opentelemetry.proto.metrics.v1.SummaryDataPoint.ValueAtQuantile";
pub const EXEMPLAR: &str = "opentelemetry.proto.metrics.v1.Exemplar";

// logs.v1
pub const RESOURCE_LOGS: &str = "opentelemetry.proto.logs.v1.ResourceLogs";
pub const SCOPE_LOGS: &str = "opentelemetry.proto.logs.v1.ScopeLogs";
pub const LOG_RECORD: &str = "opentelemetry.proto.logs.v1.LogRecord";

// collector
pub const EXPORT_TRACE_REQUEST: &str =
    "opentelemetry.proto.collector.trace.v1.ExportTraceServiceRequest";
pub const EXPORT_METRICS_REQUEST: &str =
    "opentelemetry.proto.collector.metrics.v1.ExportMetricsServiceRequest";
pub const EXPORT_LOGS_REQUEST: &str =
    "opentelemetry.proto.collector.logs.v1.ExportLogsServiceRequest";

pub const MESSAGES: &[MessageDef] = &[
    // ---- common.v1 ----
    MessageDef {
        name: ANY_VALUE,
        fields: &[
            F::scalar(1, "string_value", String).in_oneof("value"),
            F::scalar(2, "bool_value", Bool).in_oneof("value"),
            F::scalar(3, "int_value", Int64).in_oneof("value"),
            F::scalar(4, "double_value", Double).in_oneof("value"),
            F::message(5, "array_value", ARRAY_VALUE).in_oneof("value"),
            F::message(6, "kvlist_value", KEY_VALUE_LIST).in_oneof("value"),
            F::scalar(7, "bytes_value", Bytes).in_oneof("value"),
        ],
    },
    MessageDef {
        name: ARRAY_VALUE,
        fields: &[F::message(1, "values", ANY_VALUE).repeated()],
    },
    MessageDef {
        name: KEY_VALUE_LIST,
        fields: &[F::message(1, "values", KEY_VALUE).repeated()],
    },
    MessageDef {
        name: KEY_VALUE,
        fields: &[
            F::scalar(1, "key", String),
            F::message(2, "value", ANY_VALUE),
        ],
    },
    MessageDef {
        name: INSTRUMENTATION_SCOPE,
        fields: &[
            F::scalar(1, "name", String),
            F::scalar(2, "version", String),
            F::message(3, "attributes", KEY_VALUE).repeated(),
            F::scalar(4, "dropped_attributes_count", Uint32),
        ],
    },
    // ---- resource.v1 ----
    MessageDef {
        name: RESOURCE,
        fields: &[
            F::message(1, "attributes", KEY_VALUE).repeated(),
            F::scalar(2, "dropped_attributes_count", Uint32),
        ],
    },
    // ---- trace.v1 ----
    MessageDef {
        name: RESOURCE_SPANS,
        fields: &[
            F::message(1, "resource", RESOURCE),
            F::message(2, "scope_spans", SCOPE_SPANS).repeated(),
            F::scalar(3, "schema_url", String),
        ],
    },
    MessageDef {
        name: SCOPE_SPANS,
        fields: &[
            F::message(1, "scope", INSTRUMENTATION_SCOPE),
            F::message(2, "spans", SPAN).repeated(),
            F::scalar(3, "schema_url", String),
        ],
    },
    MessageDef {
        name: SPAN,
        fields: &[
            F::scalar(1, "trace_id", Bytes),
            F::scalar(2, "span_id", Bytes),
            F::scalar(3, "trace_state", String),
            F::scalar(4, "parent_span_id", Bytes),
            F::scalar(16, "flags", Fixed32),
            F::scalar(5, "name", String),
            F::enumeration(6, "kind"),
            F::scalar(7, "start_time_unix_nano", Fixed64),
            F::scalar(8, "end_time_unix_nano", Fixed64),
            F::message(9, "attributes", KEY_VALUE).repeated(),
            F::scalar(10, "dropped_attributes_count", Uint32),
            F::message(11, "events", SPAN_EVENT).repeated(),
            F::scalar(12, "dropped_events_count", Uint32),
            F::message(13, "links", SPAN_LINK).repeated(),
            F::scalar(14, "dropped_links_count", Uint32),
            F::message(15, "status", STATUS),
        ],
    },
    MessageDef {
        name: SPAN_EVENT,
        fields: &[
            F::scalar(1, "time_unix_nano", Fixed64),
            F::scalar(2, "name", String),
            F::message(3, "attributes", KEY_VALUE).repeated(),
            F::scalar(4, "dropped_attributes_count", Uint32),
        ],
    },
    MessageDef {
        name: SPAN_LINK,
        fields: &[
            F::scalar(1, "trace_id", Bytes),
            F::scalar(2, "span_id", Bytes),
            F::scalar(3, "trace_state", String),
            F::message(4, "attributes", KEY_VALUE).repeated(),
            F::scalar(5, "dropped_attributes_count", Uint32),
            F::scalar(6, "flags", Fixed32),
        ],
    },
    MessageDef {
        name: STATUS,
        fields: &[
            F::scalar(2, "message", String),
            F::enumeration(3, "code"),
        ],
    },
    // ---- metrics.v1 ----
    MessageDef {
        name: RESOURCE_METRICS,
        fields: &[
            F::message(1, "resource", RESOURCE),
            F::message(2, "scope_metrics", SCOPE_METRICS).repeated(),
            F::scalar(3, "schema_url", String),
        ],
    },
    MessageDef {
        name: SCOPE_METRICS,
        fields: &[
            F::message(1, "scope", INSTRUMENTATION_SCOPE),
            F::message(2, "metrics", METRIC).repeated(),
            F::scalar(3, "schema_url", String),
        ],
    },
    MessageDef {
        name: METRIC,
        fields: &[
            F::scalar(1, "name", String),
            F::scalar(2, "description", String),
            F::scalar(3, "unit", String),
            F::message(5, "gauge", GAUGE).in_oneof("data"),
            F::message(7, "sum", SUM).in_oneof("data"),
            F::message(9, "histogram", HISTOGRAM).in_oneof("data"),
            F::message(10, "exponential_histogram", EXPONENTIAL_HISTOGRAM).in_oneof("data"),
            F::message(11, "summary", SUMMARY).in_oneof("data"),
            F::message(12, "metadata", KEY_VALUE).repeated(),
        ],
    },
    MessageDef {
        name: GAUGE,
        fields: &[F::message(1, "data_points", NUMBER_DATA_POINT).repeated()],
    },
    MessageDef {
        name: SUM,
        fields: &[
            F::message(1, "data_points", NUMBER_DATA_POINT).repeated(),
            F::enumeration(2, "aggregation_temporality"),
            F::scalar(3, "is_monotonic", Bool),
        ],
    },
    MessageDef {
        name: HISTOGRAM,
        fields: &[
            F::message(1, "data_points", HISTOGRAM_DATA_POINT).repeated(),
            F::enumeration(2, "aggregation_temporality"),
        ],
    },
    MessageDef {
        name: EXPONENTIAL_HISTOGRAM,
        fields: &[
            F::message(1, "data_points", EXPONENTIAL_HISTOGRAM_DATA_POINT).repeated(),
            F::enumeration(2, "aggregation_temporality"),
        ],
    },
    MessageDef {
        name: SUMMARY,
        fields: &[F::message(1, "data_points", SUMMARY_DATA_POINT).repeated()],
    },
    MessageDef {
        name: NUMBER_DATA_POINT,
        fields: &[
            F::message(7, "attributes", KEY_VALUE).repeated(),
            F::scalar(2, "start_time_unix_nano", Fixed64),
            F::scalar(3, "time_unix_nano", Fixed64),
            F::scalar(4, "as_double", Double).in_oneof("value"),
            F::scalar(6, "as_int", Sfixed64).in_oneof("value"),
            F::message(5, "exemplars", EXEMPLAR).repeated(),
            F::scalar(8, "flags", Uint32),
        ],
    },
    MessageDef {
        name: HISTOGRAM_DATA_POINT,
        fields: &[
            F::message(9, "attributes", KEY_VALUE).repeated(),
            F::scalar(2, "start_time_unix_nano", Fixed64),
            F::scalar(3, "time_unix_nano", Fixed64),
            F::scalar(4, "count", Fixed64),
            F::scalar(5, "sum", Double),
            F::scalar(6, "bucket_counts", Fixed64).repeated(),
            F::scalar(7, "explicit_bounds", Double).repeated(),
            F::message(8, "exemplars", EXEMPLAR).repeated(),
            F::scalar(10, "flags", Uint32),
            F::scalar(11, "min", Double),
            F::scalar(12, "max", Double),
        ],
    },
    MessageDef {
        name: EXPONENTIAL_HISTOGRAM_DATA_POINT,
        fields: &[
            F::message(1, "attributes", KEY_VALUE).repeated(),
            F::scalar(2, "start_time_unix_nano", Fixed64),
            F::scalar(3, "time_unix_nano", Fixed64),
            F::scalar(4, "count", Fixed64),
            F::scalar(5, "sum", Double),
            F::scalar(6, "scale", Sint32),
            F::scalar(7, "zero_count", Fixed64),
            F::message(8, "positive", EXPONENTIAL_HISTOGRAM_BUCKETS),
            F::message(9, "negative", EXPONENTIAL_HISTOGRAM_BUCKETS),
            F::scalar(10, "flags", Uint32),
            F::message(11, "exemplars", EXEMPLAR).repeated(),
            F::scalar(12, "min", Double),
            F::scalar(13, "max", Double),
            F::scalar(14, "zero_threshold", Double),
        ],
    },
    MessageDef {
        name: EXPONENTIAL_HISTOGRAM_BUCKETS,
        fields: &[
            F::scalar(1, "offset", Sint32),
            F::scalar(2, "bucket_counts", Uint64).repeated(),
        ],
    },
    MessageDef {
        name: SUMMARY_DATA_POINT,
        fields: &[
            F::message(7, "attributes", KEY_VALUE).repeated(),
            F::scalar(2, "start_time_unix_nano", Fixed64),
            F::scalar(3, "time_unix_nano", Fixed64),
            F::scalar(4, "count", Fixed64),
            F::scalar(5, "sum", Double),
            F::message(6, "quantile_values", VALUE_AT_QUANTILE).repeated(),
            F::scalar(8, "flags", Uint32),
        ],
    },
    MessageDef {
        name: VALUE_AT_QUANTILE,
        fields: &[
            F::scalar(1, "quantile", Double),
            F::scalar(2, "value", Double),
        ],
    },
    MessageDef {
        name: EXEMPLAR,
        fields: &[
            F::message(7, "filtered_attributes", KEY_VALUE).repeated(),
            F::scalar(2, "time_unix_nano", Fixed64),
            F::scalar(3, "as_double", Double).in_oneof("value"),
            F::scalar(6, "as_int", Sfixed64).in_oneof("value"),
            F::scalar(4, "span_id", Bytes),
            F::scalar(5, "trace_id", Bytes),
        ],
    },
    // ---- logs.v1 ----
    MessageDef {
        name: RESOURCE_LOGS,
        fields: &[
            F::message(1, "resource", RESOURCE),
            F::message(2, "scope_logs", SCOPE_LOGS).repeated(),
            F::scalar(3, "schema_url", String),
        ],
    },
    MessageDef {
        name: SCOPE_LOGS,
        fields: &[
            F::message(1, "scope", INSTRUMENTATION_SCOPE),
            F::message(2, "log_records", LOG_RECORD).repeated(),
            F::scalar(3, "schema_url", String),
        ],
    },
    MessageDef {
        name: LOG_RECORD,
        fields: &[
            F::scalar(1, "time_unix_nano", Fixed64),
            F::scalar(11, "observed_time_unix_nano", Fixed64),
            F::enumeration(2, "severity_number"),
            F::scalar(3, "severity_text", String),
            F::message(5, "body", ANY_VALUE),
            F::message(6, "attributes", KEY_VALUE).repeated(),
            F::scalar(7, "dropped_attributes_count", Uint32),
            F::scalar(8, "flags", Fixed32),
            F::scalar(9, "trace_id", Bytes),
            F::scalar(10, "span_id", Bytes),
            F::scalar(12, "event_name", String),
        ],
    },
    // ---- collector ----
    MessageDef {
        name: EXPORT_TRACE_REQUEST,
        fields: &[F::message(1, "resource_spans", RESOURCE_SPANS).repeated()],
    },
    MessageDef {
        name: EXPORT_METRICS_REQUEST,
        fields: &[F::message(1, "resource_metrics", RESOURCE_METRICS).repeated()],
    },
    MessageDef {
        name: EXPORT_LOGS_REQUEST,
        fields: &[F::message(1, "resource_logs", RESOURCE_LOGS).repeated()],
    },
];

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::protocol::schema::{FieldKind, ScalarKind, SchemaRegistry};

    fn field_kind(registry: &SchemaRegistry, msg: &str, field: &str) -> FieldKind {
        let id = registry.lookup(msg).unwrap();
        registry.message(id).unwrap().field_by_name(field).unwrap().kind
    }

    #[test]
    fn any_value_oneof_tags_match_upstream() {
        let registry = SchemaRegistry::otlp_v1().unwrap();
        let any = registry.message(registry.lookup(ANY_VALUE).unwrap()).unwrap();
        let tags: Vec<(u32, &str)> = any.fields().iter().map(|f| (f.number, f.name)).collect();
        assert_eq!(
            tags,
            vec![
                (1, "string_value"),
                (2, "bool_value"),
                (3, "int_value"),
                (4, "double_value"),
                (5, "array_value"),
                (6, "kvlist_value"),
                (7, "bytes_value"),
            ]
        );
        assert!(any.fields().iter().all(|f| f.oneof == Some(0)));
    }

    #[test]
    fn metric_data_oneof_tags_match_upstream() {
        let registry = SchemaRegistry::otlp_v1().unwrap();
        let metric = registry.message(registry.lookup(METRIC).unwrap()).unwrap();
        let data: Vec<u32> = metric
            .fields()
            .iter()
            .filter(|f| f.oneof.is_some())
            .map(|f| f.number)
            .collect();
        assert_eq!(data, vec![5, 7, 9, 10, 11]);
    }

    #[test]
    fn integer_encodings_match_upstream() {
        let registry = SchemaRegistry::otlp_v1().unwrap();
        assert_eq!(
            field_kind(&registry, NUMBER_DATA_POINT, "as_int"),
            FieldKind::Scalar(ScalarKind::Sfixed64)
        );
        assert_eq!(
            field_kind(&registry, SPAN, "startTimeUnixNano"),
            FieldKind::Scalar(ScalarKind::Fixed64)
        );
        assert_eq!(
            field_kind(&registry, EXPONENTIAL_HISTOGRAM_DATA_POINT, "scale"),
            FieldKind::Scalar(ScalarKind::Sint32)
        );
        assert_eq!(
            field_kind(&registry, EXPONENTIAL_HISTOGRAM_BUCKETS, "bucket_counts"),
            FieldKind::Scalar(ScalarKind::Uint64)
        );
        assert_eq!(
            field_kind(&registry, LOG_RECORD, "flags"),
            FieldKind::Scalar(ScalarKind::Fixed32)
        );
    }
}
