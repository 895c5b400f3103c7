//! In-process observability.
//!
//! Counters and histograms are stored as atomics behind `DashMap` label sets and
//! rendered in Prometheus text exposition format by the embedding HTTP layer.

pub mod metrics;
