//! Capabilities shipped with toolforge.
//!
//! Each module registers a [`forge_tools::CapabilitySource`] in the plugin
//! table, so a `DiscoveryLoader::with_plugins()` pass picks them up without
//! further wiring.

#![warn(missing_docs, clippy::pedantic)]

mod echo;
mod system_status;

use forge_tools::CapabilitySource;

pub use echo::{ECHO, echo};
pub use system_status::{SYSTEM_STATUS_CHECK, SystemStatus};

static BUILTINS: [CapabilitySource; 2] = [
    CapabilitySource::new(ECHO, echo::construct),
    CapabilitySource::new(SYSTEM_STATUS_CHECK, system_status::construct),
];

/// Sources of the built-in capabilities.
///
/// The same sources are in the plugin table. Referencing them keeps this
/// crate's registrations linked into binaries that never name it otherwise.
#[must_use]
#[inline(never)]
pub fn builtin_sources() -> &'static [CapabilitySource] {
    &BUILTINS
}

/// Names of the built-in capabilities.
#[must_use]
pub fn builtin_names() -> Vec<&'static str> {
    builtin_sources().iter().map(CapabilitySource::id).collect()
}
