//! OTLP wire protocol.
//!
//! - `media`: content-type negotiation (JSON vs binary protobuf).
//! - `schema` / `otlp`: the compiled message registry and the OTLP v1 definitions.
//! - `decode` / `encode`: registry-driven conversion between protobuf and canonical objects,
//!   reading and writing the wire format through `prost::encoding`.
//!
//! All parsers are panic-free: malformed input is reported as `OtelGateError`
//! instead of panicking or indexing raw buffers.

pub mod decode;
pub mod encode;
pub mod media;
pub mod otlp;
pub mod schema;

pub use decode::BytesEncoding;
pub use media::PayloadFormat;
pub use schema::{MessageId, SchemaRegistry};
