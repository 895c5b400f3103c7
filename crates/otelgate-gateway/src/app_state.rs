//! Shared application state for the otelgate gateway.
//!
//! Bundles the decoder, the admission controller and the metrics registry, and
//! exposes `ingest` as the single per-request entrypoint for an HTTP layer.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use serde_json::Value;

use otelgate_core::error::Result;
use otelgate_core::protocol::PayloadFormat;
use otelgate_core::{Decoder, Signal};

use crate::admission::{AdmissionController, SlotGuard};
use crate::config::GatewayConfig;
use crate::obs::metrics::GatewayMetrics;

#[derive(Clone)]
pub struct GatewayState {
    inner: Arc<GatewayStateInner>,
}

struct GatewayStateInner {
    cfg: GatewayConfig,
    decoder: Decoder,
    admission: AdmissionController,
    metrics: GatewayMetrics,
}

/// A request that passed admission and decoded cleanly.
///
/// `guard` holds the principal's in-flight slot until the caller finishes
/// downstream work and drops it.
#[derive(Debug)]
pub struct Admitted {
    pub signal: Signal,
    pub payload: Value,
    pub guard: SlotGuard,
}

impl GatewayState {
    /// Build application state from a validated config.
    pub fn new(cfg: GatewayConfig) -> Result<Self> {
        let decoder = Decoder::otlp(cfg.decoder.options())?;
        let admission = AdmissionController::new(cfg.admission);

        Ok(Self {
            inner: Arc::new(GatewayStateInner {
                cfg,
                decoder,
                admission,
                metrics: GatewayMetrics::default(),
            }),
        })
    }

    pub fn cfg(&self) -> &GatewayConfig {
        &self.inner.cfg
    }

    pub fn decoder(&self) -> &Decoder {
        &self.inner.decoder
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.inner.admission
    }

    pub fn metrics(&self) -> &GatewayMetrics {
        &self.inner.metrics
    }

    /// Rate check, then slot acquisition, then decode.
    ///
    /// Any failure after the slot is taken releases it before returning.
    pub fn ingest(
        &self,
        signal: Signal,
        principal: &str,
        content_type: Option<&str>,
        body: Value,
        raw: Option<Bytes>,
    ) -> Result<Admitted> {
        let inner = &self.inner;

        if let Err(e) = inner.admission.check_limit(principal) {
            inner.metrics.admission_decisions.inc(&[("stage", "rate"), ("outcome", "rejected")]);
            return Err(e);
        }
        inner.metrics.admission_decisions.inc(&[("stage", "rate"), ("outcome", "admitted")]);

        let guard = match inner.admission.acquire(principal) {
            Ok(guard) => guard,
            Err(e) => {
                inner
                    .metrics
                    .admission_decisions
                    .inc(&[("stage", "concurrency"), ("outcome", "rejected")]);
                return Err(e);
            }
        };
        inner
            .metrics
            .admission_decisions
            .inc(&[("stage", "concurrency"), ("outcome", "admitted")]);

        let format = PayloadFormat::from_content_type(content_type)
            .map(PayloadFormat::as_str)
            .unwrap_or("unsupported");
        inner
            .metrics
            .decode_requests
            .inc(&[("signal", signal.as_str()), ("format", format)]);

        let started = Instant::now();
        let decoded = inner.decoder.decode(signal, content_type, body, raw);
        inner
            .metrics
            .decode_duration
            .observe(&[("signal", signal.as_str())], started.elapsed());

        match decoded {
            Ok(payload) => Ok(Admitted {
                signal,
                payload,
                guard,
            }),
            Err(e) => {
                let code = e.client_code();
                inner
                    .metrics
                    .decode_errors
                    .inc(&[("signal", signal.as_str()), ("code", code.as_str())]);
                tracing::warn!(%signal, principal, code = code.as_str(), error = %e, "decode failed");
                Err(e)
            }
        }
    }

    pub fn metrics_extra(&self) -> Vec<(&'static str, u64)> {
        let admission = &self.inner.admission;
        vec![
            ("otelgate_rate_entries", admission.rate_entries() as u64),
            ("otelgate_concurrency_entries", admission.concurrency_entries() as u64),
        ]
    }

    /// Prometheus text exposition of every gateway metric.
    pub fn render_metrics(&self) -> String {
        self.inner.metrics.render(&self.metrics_extra())
    }
}
