//! otelgate gateway library entry.
//!
//! Wires the YAML config, the admission controller, the OTLP decoder and the
//! metrics registry into `GatewayState`. Consumed by the `otelgate` binary, by an
//! embedding HTTP layer and by integration tests.

pub mod admission;
pub mod app_state;
pub mod config;
pub mod obs;

pub use admission::{AdmissionController, SlotGuard, SweepHandle};
pub use app_state::{Admitted, GatewayState};
