//! Core shared types for the toolforge capability runtime.

#![warn(missing_docs, clippy::pedantic)]

mod access;
mod capability;
mod error;
mod ids;

/// Access levels and invocation origins.
pub use access::{AccessLevel, Origin};
/// Validated capability names.
pub use capability::CapabilityName;
/// Error type and result alias shared across the workspace.
pub use error::{Error, Result};
/// Identifiers for callers and individual invocations.
pub use ids::{CallerId, InvocationId};
