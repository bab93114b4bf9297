//! Tool capability registry and execution engine.
//!
//! Capabilities are discovered once at startup, advertised to an AI model as
//! function declarations and to a UI as components, and invoked through one
//! engine that enforces access levels, validates arguments and streams
//! progress. This crate bundles the runtime crates behind feature flags.

#![warn(missing_docs, clippy::pedantic)]

/// Re-export shared primitives for convenience.
pub use forge_primitives as primitives;

/// Descriptors, validation, registry and discovery.
pub use forge_tools as tools;

/// Execution engine and exporters (enabled by `kernel` feature).
#[cfg(feature = "kernel")]
pub use forge_kernel as kernel;

/// Operator policy rules (enabled by `policy` feature).
#[cfg(feature = "policy")]
pub use forge_policy as policy;

/// Configuration loading (enabled by `config` feature).
#[cfg(feature = "config")]
pub use forge_config as config;

/// Tracing setup and readiness (enabled by `telemetry` feature).
#[cfg(feature = "telemetry")]
pub use forge_telemetry as telemetry;

/// Built-in capabilities (enabled by `capabilities` feature).
#[cfg(feature = "capabilities")]
pub use forge_capabilities as capabilities;

#[cfg(all(feature = "kernel", feature = "config", feature = "telemetry"))]
mod runtime;

#[cfg(all(feature = "kernel", feature = "config", feature = "telemetry"))]
pub use runtime::{Runtime, RuntimeBuilder};
