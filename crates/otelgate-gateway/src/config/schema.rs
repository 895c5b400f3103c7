use std::time::Duration;

use serde::Deserialize;

use otelgate_core::decoder::{DecoderOptions, DEFAULT_MAX_BODY_BYTES};
use otelgate_core::error::{OtelGateError, Result};
use otelgate_core::protocol::BytesEncoding;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    pub version: u32,

    #[serde(default)]
    pub admission: AdmissionSection,

    #[serde(default)]
    pub decoder: DecoderSection,
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(OtelGateError::UnsupportedVersion);
        }

        self.admission.validate()?;
        self.decoder.validate()?;

        Ok(())
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            version: 1,
            admission: AdmissionSection::default(),
            decoder: DecoderSection::default(),
        }
    }
}

/// Per-principal rate and concurrency limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdmissionSection {
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: u32,

    /// Upper bound on tracked principals, per table.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

impl Default for AdmissionSection {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            max_requests: default_max_requests(),
            max_concurrent: default_max_concurrent(),
            max_entries: default_max_entries(),
            sweep_interval_ms: default_sweep_interval_ms(),
        }
    }
}

impl AdmissionSection {
    pub fn validate(&self) -> Result<()> {
        if self.window_ms == 0 {
            return Err(OtelGateError::InvalidConfig(
                "admission.window_ms must be greater than 0".into(),
            ));
        }
        if self.max_requests == 0 {
            return Err(OtelGateError::InvalidConfig(
                "admission.max_requests must be greater than 0".into(),
            ));
        }
        if self.max_concurrent == 0 {
            return Err(OtelGateError::InvalidConfig(
                "admission.max_concurrent must be greater than 0".into(),
            ));
        }
        if self.max_entries == 0 {
            return Err(OtelGateError::InvalidConfig(
                "admission.max_entries must be greater than 0".into(),
            ));
        }
        if self.sweep_interval_ms < 1000 {
            return Err(OtelGateError::InvalidConfig(
                "admission.sweep_interval_ms must be at least 1000".into(),
            ));
        }
        Ok(())
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

fn default_window_ms() -> u64 {
    60_000
}
fn default_max_requests() -> u32 {
    60
}
fn default_max_concurrent() -> u32 {
    10
}
fn default_max_entries() -> usize {
    50_000
}
fn default_sweep_interval_ms() -> u64 {
    60_000
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DecoderSection {
    #[serde(default)]
    pub bytes_encoding: BytesEncoding,

    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for DecoderSection {
    fn default() -> Self {
        Self {
            bytes_encoding: BytesEncoding::default(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl DecoderSection {
    pub fn validate(&self) -> Result<()> {
        if self.max_body_bytes == 0 {
            return Err(OtelGateError::InvalidConfig(
                "decoder.max_body_bytes must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub fn options(&self) -> DecoderOptions {
        DecoderOptions {
            bytes_encoding: self.bytes_encoding,
            max_body_bytes: self.max_body_bytes,
        }
    }
}

fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}
