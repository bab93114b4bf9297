//! Observability utilities for the toolforge runtime.

#![warn(missing_docs, clippy::pedantic)]

pub mod health;
pub mod tracing_support;

pub use health::{Readiness, ReadinessStatus};
pub use tracing_support::{TelemetryError, init};
