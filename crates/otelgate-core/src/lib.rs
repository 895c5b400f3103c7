//! otelgate core: OTLP protocol decoding, the schema registry, and the shared error surface.
//!
//! This crate turns OTLP export requests (traces, metrics, logs) arriving as JSON or
//! binary protobuf into canonical JSON objects, and back. It carries no runtime or
//! transport dependencies so the gateway, tools and tests can all reuse it.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as `OtelGateError`/`Result` so hostile payloads
//! cannot take the process down.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod decoder;
pub mod error;
pub mod model;
pub mod protocol;
pub mod signal;

pub use decoder::{Decoder, DecoderOptions};
/// Shared result type.
pub use error::{OtelGateError, Result};
pub use signal::Signal;
