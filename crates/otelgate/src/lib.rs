//! Top-level facade crate for otelgate.
//!
//! Re-exports the protocol core and the gateway library so users can depend on a single crate.

pub mod core {
    pub use otelgate_core::*;
}

pub mod gateway {
    pub use otelgate_gateway::*;
}
