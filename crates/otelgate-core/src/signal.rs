//! OTLP signal kinds.

use std::fmt;
use std::str::FromStr;

use crate::error::OtelGateError;

/// One of the three OTLP signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Traces,
    Metrics,
    Logs,
}

impl Signal {
    pub const ALL: [Signal; 3] = [Signal::Traces, Signal::Metrics, Signal::Logs];

    /// Label used in logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Signal::Traces => "traces",
            Signal::Metrics => "metrics",
            Signal::Logs => "logs",
        }
    }

    /// Fully-qualified name of the collector request message for this signal.
    pub fn root_message(self) -> &'static str {
        match self {
            Signal::Traces => "opentelemetry.proto.collector.trace.v1.ExportTraceServiceRequest",
            Signal::Metrics => {
                "opentelemetry.proto.collector.metrics.v1.ExportMetricsServiceRequest"
            }
            Signal::Logs => "opentelemetry.proto.collector.logs.v1.ExportLogsServiceRequest",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Signal {
    type Err = OtelGateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "traces" | "trace" => Ok(Signal::Traces),
            "metrics" | "metric" => Ok(Signal::Metrics),
            "logs" | "log" => Ok(Signal::Logs),
            other => Err(OtelGateError::InvalidConfig(format!("unknown signal: {other}"))),
        }
    }
}
