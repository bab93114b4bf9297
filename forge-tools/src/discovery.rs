//! Best-effort construction of capabilities from registration sources.
//!
//! Capability modules announce themselves with [`inventory::submit!`]:
//!
//! ```ignore
//! inventory::submit! {
//!     forge_tools::CapabilitySource::new("echo", build_echo)
//! }
//! ```
//!
//! The loader also accepts explicit sources, which is what tests use.

use std::any::Any;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::capability::SharedCapability;
use crate::descriptor::RegistrationWarning;
use crate::error::{ToolError, ToolResult};
use crate::registry::{CapabilityRegistry, RegistrationOutcome, RegistryBuilder};

/// Source identifiers that never denote a capability.
pub const RESERVED_SOURCE_IDS: [&str; 3] = ["base", "index", "mod"];

/// Constructor registered for one capability module.
#[derive(Clone, Copy, Debug)]
pub struct CapabilitySource {
    id: &'static str,
    construct: fn() -> ToolResult<SharedCapability>,
}

impl CapabilitySource {
    /// Creates a source. Usable in `inventory::submit!`.
    #[must_use]
    pub const fn new(id: &'static str, construct: fn() -> ToolResult<SharedCapability>) -> Self {
        Self { id, construct }
    }

    /// Returns the source identifier.
    #[must_use]
    pub const fn id(&self) -> &'static str {
        self.id
    }

    /// Returns `true` for identifiers the loader always skips.
    #[must_use]
    pub fn is_reserved(&self) -> bool {
        RESERVED_SOURCE_IDS.contains(&self.id)
    }
}

inventory::collect!(CapabilitySource);

/// Sources submitted through the link-time plugin table.
pub fn plugin_sources() -> impl Iterator<Item = &'static CapabilitySource> {
    inventory::iter::<CapabilitySource>.into_iter()
}

/// Why a single source failed to load.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The constructor returned an error.
    #[error("constructor failed: {source}")]
    Construct {
        /// Error returned by the constructor.
        #[from]
        source: ToolError,
    },

    /// The constructor panicked.
    #[error("constructor panicked: {message}")]
    Panicked {
        /// Panic payload, when it was a string.
        message: String,
    },
}

/// A source whose construction failed.
#[derive(Debug)]
pub struct DiscoveryFailure {
    /// Identifier of the failing source.
    pub source_id: String,
    /// What went wrong.
    pub error: DiscoveryError,
}

/// Why a source was not loaded even though it did not fail.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SkipReason {
    /// The identifier is reserved.
    Reserved,
    /// The source or capability is on the deny list.
    Denied,
    /// An allow list is configured and does not name the source or capability.
    NotAllowed,
    /// The capability is disabled.
    Disabled,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Reserved => "reserved",
            Self::Denied => "denied",
            Self::NotAllowed => "not allowed",
            Self::Disabled => "disabled",
        })
    }
}

/// A source that was deliberately left out.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SkippedSource {
    /// Source identifier.
    pub source_id: String,
    /// Reason for skipping.
    pub reason: SkipReason,
}

/// Outcome of a discovery pass.
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    /// Identifiers of the sources that produced an active capability.
    pub loaded: Vec<String>,
    /// Sources deliberately left out.
    pub skipped: Vec<SkippedSource>,
    /// Sources whose construction failed.
    pub failures: Vec<DiscoveryFailure>,
    /// Registration warnings raised along the way.
    pub warnings: Vec<RegistrationWarning>,
    /// Number of capabilities in the resulting registry.
    pub registered: usize,
}

impl DiscoveryReport {
    /// Returns `true` when every source constructed cleanly.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Allow/deny lists applied to source identifiers and capability names.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceFilter {
    allow: HashSet<String>,
    deny: HashSet<String>,
}

impl SourceFilter {
    /// Creates a filter from allow and deny lists. An empty allow list admits
    /// everything that is not denied.
    #[must_use]
    pub fn new<A, D, S>(allow: A, deny: D) -> Self
    where
        A: IntoIterator<Item = S>,
        D: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allow: allow.into_iter().map(Into::into).collect(),
            deny: deny.into_iter().map(Into::into).collect(),
        }
    }

    fn check(&self, keys: &[&str]) -> Option<SkipReason> {
        if keys.iter().any(|key| self.deny.contains(*key)) {
            return Some(SkipReason::Denied);
        }
        if !self.allow.is_empty() && !keys.iter().any(|key| self.allow.contains(*key)) {
            return Some(SkipReason::NotAllowed);
        }
        None
    }
}

/// Builds a registry from capability sources.
#[derive(Debug, Default)]
pub struct DiscoveryLoader {
    sources: Vec<CapabilitySource>,
    plugins: bool,
    filter: SourceFilter,
}

impl DiscoveryLoader {
    /// Creates a loader with no sources.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a loader over the link-time plugin table.
    #[must_use]
    pub fn with_plugins() -> Self {
        Self {
            plugins: true,
            ..Self::default()
        }
    }

    /// Adds an explicit source.
    #[must_use]
    pub fn source(mut self, source: CapabilitySource) -> Self {
        self.sources.push(source);
        self
    }

    /// Adds several explicit sources.
    #[must_use]
    pub fn sources<I>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = CapabilitySource>,
    {
        self.sources.extend(sources);
        self
    }

    /// Applies allow/deny lists.
    #[must_use]
    pub fn filter(mut self, filter: SourceFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Constructs every source and returns the resulting registry.
    ///
    /// Each source is isolated: an error or panic in one constructor is
    /// recorded in the report and the remaining sources still load.
    #[must_use]
    pub fn load(&self) -> (CapabilityRegistry, DiscoveryReport) {
        let mut builder = RegistryBuilder::new();
        let mut report = self.load_into(&mut builder);
        let registry = builder.build();
        report.registered = registry.len();

        info!(
            registered = report.registered,
            loaded = report.loaded.len(),
            skipped = report.skipped.len(),
            failed = report.failures.len(),
            "capability discovery finished"
        );
        (registry, report)
    }

    /// Constructs every source into an existing builder.
    pub fn load_into(&self, builder: &mut RegistryBuilder) -> DiscoveryReport {
        let mut report = DiscoveryReport::default();

        for source in self.ordered_sources() {
            let id = source.id();

            if source.is_reserved() {
                debug!(source = id, "reserved source identifier; skipping");
                report.skipped.push(skipped(id, SkipReason::Reserved));
                continue;
            }
            // Allow lists may name the capability rather than the source, so
            // only the deny list can be checked before construction.
            if self.filter.check(&[id]) == Some(SkipReason::Denied) {
                info!(source = id, "source denied by configuration");
                report.skipped.push(skipped(id, SkipReason::Denied));
                continue;
            }

            let capability = match construct(&source) {
                Ok(capability) => capability,
                Err(error) => {
                    warn!(source = id, error = %error, "failed to load capability source");
                    report.failures.push(DiscoveryFailure {
                        source_id: id.to_owned(),
                        error,
                    });
                    continue;
                }
            };

            let name = capability.descriptor().name().as_str().to_owned();
            if let Some(reason) = self.filter.check(&[id, name.as_str()]) {
                info!(source = id, capability = %name, ?reason, "capability filtered out");
                report.skipped.push(skipped(id, reason));
                continue;
            }

            let registration = builder.register_shared(capability);
            report.warnings.extend(registration.warnings);
            if registration.outcome == RegistrationOutcome::SkippedDisabled {
                report.skipped.push(skipped(id, SkipReason::Disabled));
            } else {
                debug!(source = id, capability = %name, "capability source loaded");
                report.loaded.push(id.to_owned());
            }
        }

        report.registered = builder.len();
        report
    }

    fn ordered_sources(&self) -> Vec<CapabilitySource> {
        let mut sources = self.sources.clone();
        if self.plugins {
            sources.extend(plugin_sources().copied());
        }
        sources.sort_by_key(CapabilitySource::id);
        sources
    }
}

fn skipped(id: &str, reason: SkipReason) -> SkippedSource {
    SkippedSource {
        source_id: id.to_owned(),
        reason,
    }
}

fn construct(source: &CapabilitySource) -> Result<SharedCapability, DiscoveryError> {
    let build = source.construct;
    match panic::catch_unwind(AssertUnwindSafe(build)) {
        Ok(result) => result.map_err(DiscoveryError::from),
        Err(payload) => Err(DiscoveryError::Panicked {
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
