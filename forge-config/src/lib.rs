//! Configuration for the toolforge runtime.
//!
//! Settings are read from a TOML document, every field has a default, and
//! `FORGE_*` environment variables override individual keys.

#![warn(missing_docs, clippy::pedantic)]

mod error;
pub mod loader;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, ENV_PREFIX, apply_overrides};
pub use schema::{
    DEFAULT_LOG_FILTER, DEFAULT_MAX_CONCURRENCY, DiscoverySettings, ForgeConfig,
    InvocationSettings, SchedulerSettings, TelemetrySettings,
};
