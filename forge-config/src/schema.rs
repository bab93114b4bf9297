//! Strongly typed configuration schema.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default number of concurrently running invocations.
pub const DEFAULT_MAX_CONCURRENCY: NonZeroUsize = match NonZeroUsize::new(32) {
    Some(value) => value,
    None => unreachable!(),
};

/// Default tracing filter directive.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForgeConfig {
    /// Which plugin sources are loaded.
    pub discovery: DiscoverySettings,
    /// Execution concurrency.
    pub scheduler: SchedulerSettings,
    /// Per-invocation limits.
    pub invocation: InvocationSettings,
    /// Logging setup.
    pub telemetry: TelemetrySettings,
}

/// `[discovery]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiscoverySettings {
    /// When non-empty, only these source ids or capability names load.
    pub allow: Vec<String>,
    /// Source ids or capability names that never load.
    pub deny: Vec<String>,
}

/// `[scheduler]` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerSettings {
    /// Maximum invocations executing at once.
    pub max_concurrency: NonZeroUsize,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

/// `[invocation]` table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InvocationSettings {
    /// Deadline applied to invocations that carry none, in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl InvocationSettings {
    /// Returns the configured timeout, if any.
    #[must_use]
    pub fn timeout(self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// `[telemetry]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetrySettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_LOG_FILTER.to_owned(),
        }
    }
}
